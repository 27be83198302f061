//! The `Action` contract (§4.2, §9 "dynamic dispatch on actions") and the
//! restricted view of the builder an action is handed when it runs.
//!
//! Concrete actions (VCS checkout, make, cpio, …) live outside this crate;
//! this module only fixes the seam. `BuildContext` is the non-owning
//! reference the design notes describe: an action can read the tree root,
//! report progress, and register further rules, but cannot reach into the
//! scheduler or tag store directly.

use std::path::Path;

use anyhow::Result;
use muddle_config::{Config, Reporter};
use muddle_label::Label;

use crate::Rule;

/// What an `Action` is allowed to do to the builder that's driving it.
pub trait BuildContext {
    /// The build tree root (the directory containing `.muddle/`).
    fn root(&self) -> &Path;

    fn config(&self) -> &Config;

    fn reporter(&self) -> &dyn Reporter;

    /// Register an additional rule discovered while building `target`
    /// (§4.5: actions "may register more rules or instructions").
    fn register_rule(&mut self, rule: Rule) -> Result<()>;
}

/// One realisable transition: how to make `target` true.
///
/// `requires_master` defaults to `false`; actions that must not run
/// concurrently with any other rule (typically because they mutate the
/// build description itself) override it to request the scheduler's
/// master-only lane (§4.4).
pub trait Action: std::fmt::Debug + Send + Sync {
    fn build_label(&self, ctx: &mut dyn BuildContext, target: &Label) -> Result<()>;

    fn requires_master(&self) -> bool {
        false
    }
}

/// An action that does nothing but succeed; used for `synth` labels and
/// tags that exist only to gather dependencies together.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpAction;

impl Action for NoOpAction {
    fn build_label(&self, _ctx: &mut dyn BuildContext, _target: &Label) -> Result<()> {
        Ok(())
    }
}

/// Wraps a closure as an `Action`, for build descriptions and tests that
/// don't want to name a dedicated type for a one-off transition.
pub struct FnAction<F>(pub F)
where
    F: Fn(&mut dyn BuildContext, &Label) -> Result<()> + Send + Sync;

impl<F> std::fmt::Debug for FnAction<F>
where
    F: Fn(&mut dyn BuildContext, &Label) -> Result<()> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnAction").finish_non_exhaustive()
    }
}

impl<F> Action for FnAction<F>
where
    F: Fn(&mut dyn BuildContext, &Label) -> Result<()> + Send + Sync,
{
    fn build_label(&self, ctx: &mut dyn BuildContext, target: &Label) -> Result<()> {
        (self.0)(ctx, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muddle_label::LabelType;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullContext {
        root: std::path::PathBuf,
        config: Config,
    }

    impl BuildContext for NullContext {
        fn root(&self) -> &Path {
            &self.root
        }
        fn config(&self) -> &Config {
            &self.config
        }
        fn reporter(&self) -> &dyn Reporter {
            &muddle_config::SilentReporter
        }
        fn register_rule(&mut self, _rule: Rule) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn noop_action_succeeds() {
        let mut ctx = NullContext {
            root: std::path::PathBuf::from("/tmp"),
            config: Config::default(),
        };
        let target = Label::new(LabelType::Synth, "gather", "loaded");
        NoOpAction.build_label(&mut ctx, &target).unwrap();
        assert!(!NoOpAction.requires_master());
    }

    #[test]
    fn fn_action_invokes_closure() {
        let calls = AtomicUsize::new(0);
        let action = FnAction(|_ctx: &mut dyn BuildContext, _target: &Label| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let mut ctx = NullContext {
            root: std::path::PathBuf::from("/tmp"),
            config: Config::default(),
        };
        let target = Label::new(LabelType::Package, "pkg_1", "built");
        action.build_label(&mut ctx, &target).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
