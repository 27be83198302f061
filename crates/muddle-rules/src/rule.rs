use std::collections::BTreeSet;

use muddle_label::Label;

use crate::Action;

/// `(target, action, deps)` — "to reach `target`, first satisfy every
/// label in `deps`, then run `action`" (§3, §4.2).
///
/// `action` is `None` for a rule that exists purely to gather
/// dependencies (a synth label used as a barrier, or a tag nobody
/// actually builds, such as the top of a role).
pub struct Rule {
    pub target: Label,
    pub action: Option<Box<dyn Action>>,
    pub deps: BTreeSet<Label>,
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("target", &self.target)
            .field("has_action", &self.action.is_some())
            .field("deps", &self.deps)
            .finish()
    }
}

impl Rule {
    pub fn new(target: Label, action: Option<Box<dyn Action>>, deps: BTreeSet<Label>) -> Self {
        Rule {
            target,
            action,
            deps,
        }
    }

    /// A rule with no action, just a set of deps to gather — the common
    /// shape for synth "barrier" labels.
    pub fn gather(target: Label, deps: BTreeSet<Label>) -> Self {
        Rule {
            target,
            action: None,
            deps,
        }
    }

    pub fn requires_master(&self) -> bool {
        self.action
            .as_ref()
            .is_some_and(|action| action.requires_master())
    }
}
