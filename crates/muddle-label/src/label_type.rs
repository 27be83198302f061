use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ParseLabelError;

/// The fixed vocabulary of label types, plus the wildcard `*`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LabelType {
    Checkout,
    Package,
    Deployment,
    Synth,
    Wildcard,
}

impl LabelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelType::Checkout => "checkout",
            LabelType::Package => "package",
            LabelType::Deployment => "deployment",
            LabelType::Synth => "synth",
            LabelType::Wildcard => "*",
        }
    }
}

impl fmt::Display for LabelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LabelType {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "checkout" => Ok(LabelType::Checkout),
            "package" => Ok(LabelType::Package),
            "deployment" => Ok(LabelType::Deployment),
            "synth" => Ok(LabelType::Synth),
            "*" => Ok(LabelType::Wildcard),
            other => Err(ParseLabelError::UnknownType(other.to_string())),
        }
    }
}
