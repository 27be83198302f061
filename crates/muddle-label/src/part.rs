use std::fmt;

use serde::{Deserialize, Serialize};

/// A label field that may be concrete or the wildcard `*`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Part {
    Wildcard,
    Value(String),
}

impl Part {
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Part::Wildcard)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Part::Wildcard => None,
            Part::Value(s) => Some(s),
        }
    }

    pub fn parse(text: &str) -> Part {
        if text == "*" {
            Part::Wildcard
        } else {
            Part::Value(text.to_string())
        }
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Part::Wildcard => write!(f, "*"),
            Part::Value(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for Part {
    fn from(value: &str) -> Self {
        Part::parse(value)
    }
}

impl From<String> for Part {
    fn from(value: String) -> Self {
        Part::parse(&value)
    }
}
