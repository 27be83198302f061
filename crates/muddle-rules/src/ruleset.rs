//! `RuleSet` (C4) and the dependency engine built on top of it (C6, §4.2).

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use muddle_errors::give_up;
use muddle_label::{Label, Part};

use crate::Rule;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// An indexed collection of rules keyed by target label.
///
/// Targets are keyed by `Label` identity (flags ignored, per I3/I4), so at
/// most one rule exists per exact target; `add` unions deps when a rule
/// for the same target is registered twice, matching §4.2's contract.
#[derive(Default)]
pub struct RuleSet {
    rules: BTreeMap<Label, Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        RuleSet::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Insert `rule`, unioning its deps into any existing rule for the
    /// same target and replacing the action if the new rule supplies one.
    pub fn add(&mut self, rule: Rule) {
        match self.rules.get_mut(&rule.target) {
            Some(existing) => {
                existing.deps.extend(rule.deps);
                if rule.action.is_some() {
                    existing.action = rule.action;
                }
            }
            None => {
                self.rules.insert(rule.target.clone(), rule);
            }
        }
    }

    /// Rules whose target is `label` (`use_match = false`, exact identity)
    /// or whose target matches `label` (`use_match = true`).
    pub fn rules_for_target(&self, label: &Label, use_match: bool) -> Vec<&Rule> {
        if use_match {
            self.rules
                .values()
                .filter(|rule| rule.target.match_against(label).is_some())
                .collect()
        } else {
            self.rules.get(label).into_iter().collect()
        }
    }

    /// A single unambiguous rule matching `label`, or `None` if zero or
    /// more than one rule matches.
    pub fn rule_for_target(&self, label: &Label) -> Option<&Rule> {
        let matches = self.rules_for_target(label, true);
        match matches.len() {
            1 => Some(matches[0]),
            _ => None,
        }
    }

    /// All known (registered) target labels matching `label`.
    pub fn targets_match(&self, label: &Label) -> Vec<Label> {
        let mut matches: Vec<Label> = self
            .rules
            .keys()
            .filter(|target| label.match_against(target).is_some())
            .cloned()
            .collect();
        matches.sort();
        matches
    }

    /// Substitute `pattern`'s wildcarded fields against the set of known
    /// (registered) target labels, returning every definite label that
    /// results. If `pattern.tag` is itself wildcarded and `required_tag`
    /// is given, the resolved label's tag is rewritten to `required_tag`
    /// rather than left at the matched target's own tag (§4.2).
    pub fn expand_wildcards(&self, pattern: &Label, required_tag: Option<&str>) -> BTreeSet<Label> {
        self.rules
            .keys()
            .filter(|known| known.is_definite())
            .filter_map(|known| {
                pattern.match_against(known)?;
                let mut resolved = known.clone();
                if pattern.tag.is_wildcard()
                    && let Some(tag) = required_tag
                {
                    resolved.tag = Part::Value(tag.to_string());
                }
                Some(resolved)
            })
            .collect()
    }

    /// `rule`'s deps with any wildcard entries expanded against known
    /// targets — the same resolution `needed_to_build` traverses, exposed
    /// for callers (the scheduler) that need to check dep satisfaction
    /// directly rather than compute a full build order.
    pub fn resolved_deps(&self, rule: &Rule) -> BTreeSet<Label> {
        self.expand_rule_deps(rule)
    }

    fn expand_rule_deps(&self, rule: &Rule) -> BTreeSet<Label> {
        let mut expanded = BTreeSet::new();
        for dep in &rule.deps {
            if dep.is_wildcard() {
                expanded.extend(self.expand_wildcards(dep, None));
            } else {
                expanded.insert(dep.clone());
            }
        }
        expanded
    }

    /// Topologically ordered target labels of the transitive prerequisites
    /// of `target` (`target`'s own resolved label(s) last). Wildcard deps
    /// are expanded against known targets before traversal; a dependency
    /// with no backing rule is treated as an externally-satisfied leaf and
    /// does not appear in the output. Cycles are a user error (§4.2, §7).
    pub fn needed_to_build(&self, target: &Label, use_match: bool) -> Result<Vec<Label>> {
        let roots: Vec<Label> = if use_match {
            self.targets_match(target)
        } else {
            match self.rules.get(target) {
                Some(rule) => vec![rule.target.clone()],
                None => Vec::new(),
            }
        };
        if roots.is_empty() {
            give_up!("no rule matches target {target}");
        }

        let mut state: BTreeMap<Label, Mark> = BTreeMap::new();
        let mut order = Vec::new();
        for root in &roots {
            self.visit(root, &mut state, &mut order)?;
        }
        Ok(order)
    }

    fn visit(
        &self,
        label: &Label,
        state: &mut BTreeMap<Label, Mark>,
        order: &mut Vec<Label>,
    ) -> Result<()> {
        match state.get(label) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => give_up!("dependency cycle detected at {label}"),
            None => {}
        }
        let Some(rule) = self.rules.get(label) else {
            // A dep with no backing rule is an externally-satisfied leaf.
            return Ok(());
        };
        state.insert(label.clone(), Mark::Visiting);
        for dep in self.expand_rule_deps(rule) {
            self.visit(&dep, state, order)?;
        }
        state.insert(label.clone(), Mark::Done);
        order.push(label.clone());
        Ok(())
    }

    /// All labels that (transitively) depend on `label` — the reverse of
    /// `needed_to_build` (§4.2, tested by `K ∈ needed_to_build(L) <=> L ∈
    /// required_by(K)`).
    pub fn required_by(&self, label: &Label) -> BTreeSet<Label> {
        let reverse = self.reverse_adjacency();
        let mut seen = BTreeSet::new();
        let mut queue = std::collections::VecDeque::new();
        if let Some(direct) = reverse.get(label) {
            for successor in direct {
                if seen.insert(successor.clone()) {
                    queue.push_back(successor.clone());
                }
            }
        }
        while let Some(current) = queue.pop_front() {
            if let Some(successors) = reverse.get(&current) {
                for successor in successors {
                    if seen.insert(successor.clone()) {
                        queue.push_back(successor.clone());
                    }
                }
            }
        }
        seen
    }

    fn reverse_adjacency(&self) -> BTreeMap<Label, BTreeSet<Label>> {
        let mut reverse: BTreeMap<Label, BTreeSet<Label>> = BTreeMap::new();
        for rule in self.rules.values() {
            for dep in self.expand_rule_deps(rule) {
                reverse.entry(dep).or_default().insert(rule.target.clone());
            }
        }
        reverse
    }

    /// Rule targets that are never reachable as a (transitive) dependency
    /// of any of `default_targets` — surfaced by `query unused` (§4.2 ADDED).
    pub fn unused_labels(&self, default_targets: &[Label]) -> BTreeSet<Label> {
        let mut reachable = BTreeSet::new();
        for target in default_targets {
            if let Ok(needed) = self.needed_to_build(target, true) {
                reachable.extend(needed);
            }
        }
        self.rules
            .keys()
            .filter(|target| target.is_definite() && !reachable.contains(target))
            .cloned()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    /// Move every rule from `other` into `self`, unioning deps for any
    /// target both already know about. Used to absorb a (already
    /// domain-rewritten) sub-builder's ruleset into the root's (C10).
    pub fn merge_from(&mut self, other: RuleSet) {
        for (_, rule) in other.rules {
            self.add(rule);
        }
    }

    /// Consume this ruleset, rewriting every target and dep label with
    /// `rewrite` — used when including a sub-builder as a subdomain
    /// (C10): every label the sub-builder knows about, not just its
    /// checkouts, moves under the new domain prefix. Actions are carried
    /// over unchanged; they receive their target label as an argument at
    /// build time rather than storing one themselves, so none of this
    /// sub-builder's labels survive buried inside a `Box<dyn Action>`.
    pub fn rewrite_domains(self, rewrite: impl Fn(&Label) -> Label) -> RuleSet {
        let mut rewritten = RuleSet::new();
        for (_, rule) in self.rules {
            let target = rewrite(&rule.target);
            let deps = rule.deps.iter().map(&rewrite).collect();
            rewritten.add(Rule::new(target, rule.action, deps));
        }
        rewritten
    }

    /// Consume this ruleset, replacing every occurrence of `source` (as a
    /// target or a dep) with `target` — `unify`'s total substitution
    /// (§4.5, §9 open question (b)): after this call no rule references
    /// `source` any more.
    pub fn substitute_label(self, source: &Label, target: &Label) -> RuleSet {
        self.rewrite_domains(|l| if l == source { target.clone() } else { l.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::NoOpAction;
    use muddle_label::LabelType;

    fn label(lt: LabelType, name: &str, role: Option<&str>, tag: &str) -> Label {
        let mut l = Label::new(lt, name, tag);
        if let Some(r) = role {
            l = l.with_role(r);
        }
        l
    }

    fn gather(target: Label, deps: &[Label]) -> Rule {
        Rule::gather(target, deps.iter().cloned().collect())
    }

    /// Scenario 1 from §8: `needed_to_build(L4)` must yield `[L1, L2, L3, L4]`.
    #[test]
    fn basic_ruleset_yields_topological_order() {
        let l1 = label(LabelType::Checkout, "co_1", Some("role_1"), "checked_out");
        let l2 = label(LabelType::Checkout, "co_1", Some("role_1"), "pulled");
        let l3 = label(LabelType::Package, "pkg_1", Some("role_1"), "preconfig");
        let l4 = label(LabelType::Deployment, "dep_1", Some("role_2"), "built");

        let mut rules = RuleSet::new();
        rules.add(gather(l1.clone(), &[]));
        rules.add(gather(l2.clone(), &[l1.clone()]));
        rules.add(gather(l3.clone(), &[l2.clone()]));
        rules.add(gather(l4.clone(), &[l3.clone(), l2.clone()]));

        let order = rules.needed_to_build(&l4, false).unwrap();
        assert_eq!(order, vec![l1, l2, l3, l4]);
    }

    #[test]
    fn required_by_is_inverse_of_needed_to_build() {
        let l1 = label(LabelType::Checkout, "co_1", None, "checked_out");
        let l2 = label(LabelType::Package, "pkg_1", None, "built");
        let l3 = label(LabelType::Deployment, "dep_1", None, "deployed");

        let mut rules = RuleSet::new();
        rules.add(gather(l1.clone(), &[]));
        rules.add(gather(l2.clone(), &[l1.clone()]));
        rules.add(gather(l3.clone(), &[l2.clone()]));

        let needed = rules.needed_to_build(&l3, false).unwrap();
        assert!(needed.contains(&l1));
        assert!(rules.required_by(&l1).contains(&l3));
    }

    #[test]
    fn cycle_is_reported_as_give_up() {
        let a = label(LabelType::Package, "a", None, "built");
        let b = label(LabelType::Package, "b", None, "built");

        let mut rules = RuleSet::new();
        rules.add(gather(a.clone(), &[b.clone()]));
        rules.add(gather(b.clone(), &[a.clone()]));

        let err = rules.needed_to_build(&a, false).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn add_unions_deps_for_same_target() {
        let target = label(LabelType::Package, "pkg_1", None, "built");
        let dep_a = label(LabelType::Checkout, "co_a", None, "pulled");
        let dep_b = label(LabelType::Checkout, "co_b", None, "pulled");

        let mut rules = RuleSet::new();
        rules.add(gather(target.clone(), &[dep_a.clone()]));
        rules.add(Rule::new(target.clone(), Some(Box::new(NoOpAction)), [dep_b.clone()].into()));

        let rule = rules.rules_for_target(&target, false);
        assert_eq!(rule.len(), 1);
        assert!(rule[0].deps.contains(&dep_a));
        assert!(rule[0].deps.contains(&dep_b));
        assert!(rule[0].action.is_some());
    }

    #[test]
    fn expand_wildcards_matches_and_rewrites_tag() {
        let pkg_a = label(LabelType::Package, "pkg_a", Some("role_1"), "built");
        let pkg_b = label(LabelType::Package, "pkg_b", Some("role_1"), "built");

        let mut rules = RuleSet::new();
        rules.add(gather(pkg_a.clone(), &[]));
        rules.add(gather(pkg_b.clone(), &[]));

        let pattern = Label::new(LabelType::Package, "*", "*").with_role("role_1");
        let resolved = rules.expand_wildcards(&pattern, Some("installed"));
        assert_eq!(resolved.len(), 2);
        for label in &resolved {
            assert_eq!(label.tag, Part::Value("installed".to_string()));
        }
    }

    #[test]
    fn wildcard_dep_expands_to_all_matching_definite_rules() {
        let pkg_a = label(LabelType::Package, "pkg_a", Some("role_1"), "installed");
        let pkg_b = label(LabelType::Package, "pkg_b", Some("role_1"), "installed");
        let deploy = label(LabelType::Deployment, "dep_1", None, "deployed");
        let wildcard_dep = Label::new(LabelType::Package, "*", "installed").with_role("role_1");

        let mut rules = RuleSet::new();
        rules.add(gather(pkg_a.clone(), &[]));
        rules.add(gather(pkg_b.clone(), &[]));
        rules.add(gather(deploy.clone(), &[wildcard_dep]));

        let order = rules.needed_to_build(&deploy, false).unwrap();
        assert!(order.contains(&pkg_a));
        assert!(order.contains(&pkg_b));
        assert_eq!(order.last(), Some(&deploy));
    }

    #[test]
    fn unused_labels_excludes_unreachable_targets() {
        let reachable = label(LabelType::Package, "used", None, "built");
        let unreachable = label(LabelType::Package, "dead", None, "built");

        let mut rules = RuleSet::new();
        rules.add(gather(reachable.clone(), &[]));
        rules.add(gather(unreachable.clone(), &[]));

        let unused = rules.unused_labels(&[reachable]);
        assert!(unused.contains(&unreachable));
    }

    #[test]
    fn rewrite_domains_moves_every_target_and_dep() {
        let a = label(LabelType::Checkout, "a", None, "checked_out");
        let b = label(LabelType::Package, "b", None, "built");

        let mut rules = RuleSet::new();
        rules.add(gather(a.clone(), &[]));
        rules.add(gather(b.clone(), &[a.clone()]));

        let rewritten = rules.rewrite_domains(|l| l.clone().with_domain("sub".to_string()));

        let new_a = a.with_domain("sub".to_string());
        let new_b = b.with_domain("sub".to_string());
        assert!(rewritten.rule_for_target(&new_b).is_some());
        assert!(rewritten.rule_for_target(&new_b).unwrap().deps.contains(&new_a));
        assert!(rewritten.rule_for_target(&a).is_none());
    }

    #[test]
    fn substitute_label_leaves_no_trace_of_the_source() {
        let old = label(LabelType::Package, "old_name", None, "built");
        let new = label(LabelType::Package, "new_name", None, "built");
        let dependent = label(LabelType::Deployment, "dep_1", None, "deployed");

        let mut rules = RuleSet::new();
        rules.add(gather(old.clone(), &[]));
        rules.add(gather(dependent.clone(), &[old.clone()]));

        let rewritten = rules.substitute_label(&old, &new);
        assert!(rewritten.rule_for_target(&old).is_none());
        assert!(rewritten.rule_for_target(&new).is_some());
        assert!(rewritten.rule_for_target(&dependent).unwrap().deps.contains(&new));
        assert!(!rewritten.rule_for_target(&dependent).unwrap().deps.contains(&old));
    }

    #[test]
    fn merge_from_absorbs_another_rulesets_rules() {
        let a = label(LabelType::Checkout, "a", None, "checked_out");
        let b = label(LabelType::Package, "b", None, "built");

        let mut root = RuleSet::new();
        root.add(gather(a.clone(), &[]));

        let mut sub = RuleSet::new();
        sub.add(gather(b.clone(), &[a.clone()]));

        root.merge_from(sub);
        assert!(root.rule_for_target(&a).is_some());
        assert!(root.rule_for_target(&b).is_some());
    }

    #[test]
    fn dep_with_no_backing_rule_is_treated_as_a_leaf() {
        let target = label(LabelType::Package, "pkg_1", None, "built");
        let external = label(LabelType::Checkout, "co_1", None, "checked_out");

        let mut rules = RuleSet::new();
        rules.add(gather(target.clone(), &[external]));

        let order = rules.needed_to_build(&target, false).unwrap();
        assert_eq!(order, vec![target]);
    }
}
