//! The build description this CLI registers with its [`Builder`].
//!
//! The core crate's [`BuildDescription`] trait is meant to be implemented
//! by whatever binary embeds muddle for a specific product (§9: "the
//! embedding binary" registers it before `load_description()` runs). This
//! CLI is generic over products, so it carries no product-specific
//! checkouts or rules of its own — `EmptyDescription` is the honest
//! degenerate case: an empty ruleset, exercised the same way a real one
//! would be.

use anyhow::Result;
use muddle::{BuildDescription, Builder};

/// Registers nothing. A product-specific CLI built against this crate's
/// `Builder` would supply its own `BuildDescription` here instead.
pub struct EmptyDescription;

impl BuildDescription for EmptyDescription {
    fn describe(&self, _builder: &mut Builder) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muddle_config::Config;
    use tempfile::tempdir;

    #[test]
    fn empty_description_leaves_the_ruleset_empty() {
        let dir = tempdir().unwrap();
        let mut builder = Builder::new(dir.path(), Config::default());
        builder.load_description(&EmptyDescription).unwrap();
        assert!(builder.rules().is_empty());
        assert!(builder.checkouts().is_empty());
    }
}
