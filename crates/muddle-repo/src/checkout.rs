use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use muddle_errors::give_up;
use muddle_label::Label;
use serde::{Deserialize, Serialize};

use crate::{OptionValue, Repository};

/// The on-disk leaf name for a checkout: either an explicit override or
/// "defaults to the checkout's name" (§3).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Leaf {
    Default,
    Named(String),
}

impl Leaf {
    pub fn resolve(&self, checkout_name: &str) -> String {
        match self {
            Leaf::Default => checkout_name.to_string(),
            Leaf::Named(name) => name.clone(),
        }
    }
}

/// Per-checkout registry data: where it lives, how it's fetched, and its
/// licensing (§3, C3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutData {
    /// The checkout label, tag-normalised to `*` — checkout *data* is a
    /// property of the checkout, not of any one of its lifecycle tags.
    pub label: Label,
    pub repo: Repository,
    pub dir: Option<String>,
    pub leaf: Leaf,
    pub options: BTreeMap<String, OptionValue>,
    pub license: Option<String>,
    pub license_file: Option<PathBuf>,
}

impl CheckoutData {
    pub fn new(label: Label, repo: Repository) -> Self {
        CheckoutData {
            label,
            repo,
            dir: None,
            leaf: Leaf::Default,
            options: BTreeMap::new(),
            license: None,
            license_file: None,
        }
    }

    pub fn with_dir(mut self, dir: impl Into<String>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn with_leaf(mut self, leaf: impl Into<String>) -> Self {
        self.leaf = Leaf::Named(leaf.into());
        self
    }

    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.license = Some(license.into());
        self
    }

    /// The checkout's name, taken from its label.
    pub fn name(&self) -> &str {
        self.label.name.as_str().unwrap_or("*")
    }

    /// `src/[<dir>/]<leaf>`, relative to the build tree root (§3, §6).
    pub fn location(&self) -> PathBuf {
        let mut path = PathBuf::from("src");
        if let Some(dir) = &self.dir {
            path.push(dir);
        }
        path.push(self.leaf.resolve(self.name()));
        path
    }

    /// Set an option, rejecting names not on the VCS's allow-list.
    pub fn set_option(&mut self, name: &str, value: OptionValue) -> Result<()> {
        if !self.repo.vcs_kind.allowed_options().contains(&name) {
            give_up!(
                "option {name:?} is not valid for VCS {}",
                self.repo.vcs_kind
            );
        }
        self.options.insert(name.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muddle_label::LabelType;

    fn sample() -> CheckoutData {
        let label = Label::new(LabelType::Checkout, "widget", "*");
        let repo = Repository::new(VcsKindAlias::Git, "https://example.test/widget.git");
        CheckoutData::new(label, repo)
    }

    // local alias so this test module doesn't need a second `use` line
    use crate::VcsKind as VcsKindAlias;

    #[test]
    fn location_defaults_to_src_name() {
        let co = sample();
        assert_eq!(co.location(), PathBuf::from("src/widget"));
    }

    #[test]
    fn location_honours_dir_and_leaf() {
        let co = sample().with_dir("vendor").with_leaf("widget-lib");
        assert_eq!(co.location(), PathBuf::from("src/vendor/widget-lib"));
    }

    #[test]
    fn set_option_rejects_unknown_name() {
        let mut co = sample();
        let err = co.set_option("bogus", OptionValue::Bool(true)).unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn set_option_accepts_allow_listed_name() {
        let mut co = sample();
        co.set_option("shallow", OptionValue::Bool(true)).unwrap();
        assert_eq!(co.options.get("shallow"), Some(&OptionValue::Bool(true)));
    }
}
