//! Rules, rulesets, and the dependency engine (C4/C6, §4.2).
//!
//! A [`Rule`] says "to reach this target, first satisfy these deps, then
//! run this action". A [`RuleSet`] indexes rules by target and answers
//! the graph questions the scheduler and CLI need: what must happen
//! before a label, what depends on it, which wildcard targets match a
//! pattern, which registered targets nothing actually needs.

mod action;
mod rule;
mod ruleset;

pub use action::{Action, BuildContext, FnAction, NoOpAction};
pub use rule::Rule;
pub use ruleset::RuleSet;
