//! The `Builder` façade (C8, §4.5): the thing a [`BuildDescription`]
//! populates and a driver program (CLI or embedder) then builds against.
//!
//! A `Builder` owns one build tree's worth of rules, checkout registry,
//! license bookkeeping, upstream table and default-role/deployment
//! lists. Loading a description that requests a subdomain spins up a
//! fresh, domain-less sub-`Builder`, runs the subdomain's own
//! description against it, then folds the result back in with every
//! label rewritten to carry the subdomain's name.

mod description;
mod location;
mod vcs;

pub use description::BuildDescription;
pub use location::{DirType, Location};
pub use vcs::VcsPlugin;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use muddle_config::{Config, ConsoleReporter, Reporter, SilentReporter};
use muddle_domain::{LoadedDescription, compose_domain, include_subdomain, subdomain_path};
use muddle_label::{Label, LabelType};
use muddle_license::{License, LicenseRegistry};
use muddle_repo::{CheckoutData, UpstreamTable};
use muddle_rules::{BuildContext, Rule, RuleSet};
use muddle_scheduler::BuildReport;
use muddle_store::TagStore;

pub struct Builder {
    root: PathBuf,
    /// `None` for the top-level tree; `Some(d)` for a sub-builder created
    /// by [`Builder::include_subdomain`] while it loads `d`'s description.
    domain: Option<String>,
    config: Config,
    loaded: LoadedDescription,
    default_roles: Vec<String>,
    default_deployments: Vec<String>,
    /// `unify`'s record of `source -> target`, so a lookup of a label
    /// that's since been unified away redirects before it ever reaches
    /// the ruleset or tag store (§9 open question (b)).
    unification: BTreeMap<Label, Label>,
}

impl Builder {
    /// A fresh builder for the top-level build tree rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, config: Config) -> Self {
        Builder {
            root: root.into(),
            domain: None,
            config,
            loaded: LoadedDescription::new(RuleSet::new()),
            default_roles: Vec::new(),
            default_deployments: Vec::new(),
            unification: BTreeMap::new(),
        }
    }

    fn for_subdomain(root: PathBuf, domain: String, config: Config) -> Self {
        Builder {
            root,
            domain: Some(domain),
            config,
            loaded: LoadedDescription::new(RuleSet::new()),
            default_roles: Vec::new(),
            default_deployments: Vec::new(),
            unification: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn rules(&self) -> &RuleSet {
        &self.loaded.rules
    }

    pub fn checkouts(&self) -> &BTreeMap<Label, CheckoutData> {
        &self.loaded.checkouts
    }

    pub fn licenses(&self) -> &LicenseRegistry {
        &self.loaded.licenses
    }

    pub fn upstreams(&self) -> &UpstreamTable {
        &self.loaded.upstreams
    }

    pub fn default_roles(&self) -> &[String] {
        &self.default_roles
    }

    pub fn default_deployments(&self) -> &[String] {
        &self.default_deployments
    }

    // -- Registration, called by a BuildDescription while it describes --

    pub fn add_rule(&mut self, rule: Rule) {
        self.loaded.rules.add(rule);
    }

    pub fn register_checkout(&mut self, data: CheckoutData) {
        self.loaded.checkouts.insert(data.label.clone(), data);
    }

    pub fn mark_just_pulled(&mut self, label: Label) {
        self.loaded.just_pulled.insert(label);
    }

    pub fn register_license(&mut self, label: Label, license: License) {
        self.loaded.licenses.register(label, license);
    }

    pub fn register_license_file(&mut self, label: Label, path: PathBuf) {
        self.loaded.licenses.register_license_file(label, path);
    }

    pub fn add_license_exception(&mut self, dependent: Label, gpl_checkout: Label) {
        self.loaded.licenses.add_exception(dependent, gpl_checkout);
    }

    pub fn add_nothing_builds_against(&mut self, checkout: Label) {
        self.loaded.licenses.add_nothing_builds_against(checkout);
    }

    pub fn add_upstream(
        &mut self,
        repo: impl Into<String>,
        upstream_repo: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<()> {
        self.loaded.upstreams.add_upstream(repo, upstream_repo, name)
    }

    pub fn add_default_role(&mut self, role: impl Into<String>) {
        self.default_roles.push(role.into());
    }

    pub fn add_default_deployment(&mut self, deployment: impl Into<String>) {
        self.default_deployments.push(deployment.into());
    }

    pub fn set_domain_build_desc_label(&mut self, label: Label) {
        self.loaded.domain_build_desc_label = Some(label);
    }

    // -- Operations (§4.5) ------------------------------------------------

    /// Invoke `description` against this builder.
    pub fn load_description(&mut self, description: &dyn BuildDescription) -> Result<()> {
        description.describe(self)
    }

    /// Check out and load another build description as subdomain
    /// `child_name` (§4.7). The absolute domain is composed from this
    /// builder's own — a root builder names the child `child_name`
    /// directly; a builder itself mid-inclusion under domain `d` names
    /// it `d/child_name`, so nesting composes all the way down no
    /// matter how many levels deep `include_subdomain` is called.
    pub fn include_subdomain(&mut self, child_name: &str, description: &dyn BuildDescription) -> Result<()> {
        let absolute_domain = compose_domain(self.domain.as_deref(), child_name);
        let sub_root = subdomain_path(&self.root, &absolute_domain);
        let mut sub_builder = Builder::for_subdomain(sub_root, absolute_domain.clone(), self.config.clone());
        sub_builder.load_description(description)?;
        include_subdomain(&mut self.loaded, sub_builder.loaded, &absolute_domain)
    }

    /// Total substitution (§4.5, §9 open question (b)): every occurrence
    /// of `source`, as a rule target or a dep, becomes `target`. Also
    /// records `source -> target` in the unification table, so a later
    /// lookup of `source` redirects before touching the ruleset or store.
    pub fn unify(&mut self, source: &Label, target: &Label) {
        let rules = std::mem::take(&mut self.loaded.rules);
        self.loaded.rules = rules.substitute_label(source, target);
        self.unification.insert(source.clone(), target.clone());
        debug_assert!(
            self.loaded
                .rules
                .iter()
                .all(|rule| &rule.target != source && !rule.deps.contains(source)),
            "unify left {source} still referenced in the ruleset"
        );
    }

    /// Follow the unification table to whatever label `label` now stands
    /// for — a no-op unless `label` (or something it was unified into)
    /// was itself the source of an earlier `unify` call.
    pub fn resolve_unified(&self, label: &Label) -> Label {
        let mut current = label.clone();
        let mut seen = std::collections::BTreeSet::new();
        while let Some(next) = self.unification.get(&current) {
            if !seen.insert(current.clone()) {
                break;
            }
            current = next.clone();
        }
        current
    }

    /// Drive the scheduler toward `label`. `silent` picks between a
    /// console reporter and one that discards progress output.
    pub fn build_label(&self, label: &Label, silent: bool) -> Result<BuildReport> {
        let label = self.resolve_unified(label);
        let reporter: Arc<dyn Reporter> = if silent {
            Arc::new(SilentReporter)
        } else {
            Arc::new(ConsoleReporter)
        };

        let mut store = TagStore::open(&self.root)?;
        let order = muddle_scheduler::populate_frontier(&self.loaded.rules, &mut store, &label, true)?;
        drop(store);

        let root = self.root.clone();
        let config = self.config.clone();
        muddle_scheduler::run_scheduler(
            &self.loaded.rules,
            &root,
            &order,
            config.worker_count,
            false,
            move || {
                Box::new(SchedulerContext {
                    root: root.clone(),
                    config: config.clone(),
                    reporter: reporter.clone(),
                }) as Box<dyn BuildContext>
            },
        )
    }

    /// Clear `label`'s tag and transitively mark its successors not-done
    /// (§4.5): anything that transitively depended on `label` can no
    /// longer be considered built either.
    pub fn kill_label(&self, label: &Label) -> Result<()> {
        let label = self.resolve_unified(label);
        let mut store = TagStore::open(&self.root)?;
        store.clear_tag(&label)?;
        for successor in self.loaded.rules.required_by(&label) {
            store.clear_tag(&successor)?;
        }
        Ok(())
    }

    /// Resolve `path` to a [`Location`] within this tree.
    pub fn find_location_in_tree(&self, path: &Path) -> Location {
        location::find_location_in_tree(&self.root, &self.loaded.checkouts, path)
    }

    /// The targets `build`/`deploy` default to when invoked with no
    /// explicit label: every default role's installed packages, and
    /// every default deployment (§4.5, §6).
    pub fn default_targets(&self) -> Vec<Label> {
        let mut targets = Vec::new();
        for role in &self.default_roles {
            targets.push(Label::new(LabelType::Package, "*", "installed").with_role(role.clone()));
        }
        for deployment in &self.default_deployments {
            targets.push(Label::new(LabelType::Deployment, deployment.clone(), "deployed"));
        }
        targets
    }
}

struct SchedulerContext {
    root: PathBuf,
    config: Config,
    reporter: Arc<dyn Reporter>,
}

impl BuildContext for SchedulerContext {
    fn root(&self) -> &Path {
        &self.root
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn reporter(&self) -> &dyn Reporter {
        self.reporter.as_ref()
    }

    fn register_rule(&mut self, _rule: Rule) -> Result<()> {
        // Each worker thread holds its own context over a ruleset shared
        // read-only across the pool; a rule discovered mid-build has
        // nowhere to go back into. Actions that need this should register
        // everything reachable up front, during `describe`.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muddle_repo::{Repository, VcsKind};
    use muddle_rules::NoOpAction;
    use tempfile::tempdir;

    struct SingleCheckout;

    impl BuildDescription for SingleCheckout {
        fn describe(&self, builder: &mut Builder) -> Result<()> {
            let label = Label::new(LabelType::Checkout, "widget", "checked_out");
            let repo = Repository::new(VcsKind::Git, "https://example.test/widget.git");
            builder.register_checkout(CheckoutData::new(label.clone(), repo));
            builder.add_rule(Rule::new(label, Some(Box::new(NoOpAction)), Default::default()));
            Ok(())
        }
    }

    struct NestedSubdomain;

    impl BuildDescription for NestedSubdomain {
        fn describe(&self, builder: &mut Builder) -> Result<()> {
            let label = Label::new(LabelType::Checkout, "gadget", "checked_out");
            builder.add_rule(Rule::new(label, Some(Box::new(NoOpAction)), Default::default()));
            builder.include_subdomain("inner", &SingleCheckout)
        }
    }

    #[test]
    fn load_description_populates_the_builder() {
        let dir = tempdir().unwrap();
        let mut builder = Builder::new(dir.path(), Config::default());
        builder.load_description(&SingleCheckout).unwrap();

        let label = Label::new(LabelType::Checkout, "widget", "checked_out");
        assert!(builder.rules().rule_for_target(&label).is_some());
        assert!(builder.checkouts().contains_key(&label));
    }

    #[test]
    fn include_subdomain_rewrites_every_label() {
        let dir = tempdir().unwrap();
        let mut builder = Builder::new(dir.path(), Config::default());
        builder.include_subdomain("sub1", &SingleCheckout).unwrap();

        let plain = Label::new(LabelType::Checkout, "widget", "checked_out");
        let rewritten = plain.with_domain("sub1".to_string());
        assert!(builder.rules().rule_for_target(&plain).is_none());
        assert!(builder.rules().rule_for_target(&rewritten).is_some());
        assert!(builder.checkouts().contains_key(&rewritten));
    }

    #[test]
    fn nested_inclusion_composes_domain_two_levels_deep() {
        let dir = tempdir().unwrap();
        let mut builder = Builder::new(dir.path(), Config::default());
        builder.include_subdomain("sub1", &NestedSubdomain).unwrap();

        let gadget = Label::new(LabelType::Checkout, "gadget", "checked_out").with_domain("sub1".to_string());
        let widget = Label::new(LabelType::Checkout, "widget", "checked_out").with_domain("sub1/inner".to_string());
        assert!(builder.rules().rule_for_target(&gadget).is_some());
        assert!(builder.rules().rule_for_target(&widget).is_some());
    }

    #[test]
    fn unify_leaves_no_trace_of_the_source_label() {
        let dir = tempdir().unwrap();
        let mut builder = Builder::new(dir.path(), Config::default());
        let old = Label::new(LabelType::Package, "old", "built");
        let new = Label::new(LabelType::Package, "new", "built");
        let dependent = Label::new(LabelType::Deployment, "dep", "deployed");
        builder.add_rule(Rule::gather(old.clone(), Default::default()));
        builder.add_rule(Rule::gather(dependent.clone(), [old.clone()].into()));

        builder.unify(&old, &new);

        assert!(builder.rules().rule_for_target(&old).is_none());
        assert!(builder.rules().rule_for_target(&dependent).unwrap().deps.contains(&new));
        assert_eq!(builder.resolve_unified(&old), new);
    }

    #[test]
    fn kill_label_redirects_through_a_unified_label() {
        let dir = tempdir().unwrap();
        let mut builder = Builder::new(dir.path(), Config::default());
        let old = Label::new(LabelType::Package, "old", "built");
        let new = Label::new(LabelType::Package, "new", "built");
        builder.add_rule(Rule::new(new.clone(), Some(Box::new(NoOpAction)), Default::default()));
        builder.unify(&old, &new);
        builder.build_label(&new, true).unwrap();

        let mut store = TagStore::open(dir.path()).unwrap();
        assert!(store.is_tag_done(&new).unwrap());
        drop(store);

        builder.kill_label(&old).unwrap();
        let mut store = TagStore::open(dir.path()).unwrap();
        assert!(!store.is_tag_done(&new).unwrap());
    }

    #[test]
    fn build_label_runs_a_simple_chain() {
        let dir = tempdir().unwrap();
        let mut builder = Builder::new(dir.path(), Config::default());
        let target = Label::new(LabelType::Package, "pkg_1", "built");
        builder.add_rule(Rule::new(target.clone(), Some(Box::new(NoOpAction)), Default::default()));

        let report = builder.build_label(&target, true).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.completed, vec![target]);
    }

    #[test]
    fn kill_label_clears_the_label_and_its_successors() {
        let dir = tempdir().unwrap();
        let mut builder = Builder::new(dir.path(), Config::default());
        let base = Label::new(LabelType::Checkout, "co_1", "checked_out");
        let dependent = Label::new(LabelType::Package, "pkg_1", "built");
        builder.add_rule(Rule::new(base.clone(), Some(Box::new(NoOpAction)), Default::default()));
        builder.add_rule(Rule::new(dependent.clone(), Some(Box::new(NoOpAction)), [base.clone()].into()));

        builder.build_label(&dependent, true).unwrap();
        let mut store = TagStore::open(dir.path()).unwrap();
        assert!(store.is_tag_done(&base).unwrap());
        assert!(store.is_tag_done(&dependent).unwrap());
        drop(store);

        builder.kill_label(&base).unwrap();
        let mut store = TagStore::open(dir.path()).unwrap();
        assert!(!store.is_tag_done(&base).unwrap());
        assert!(!store.is_tag_done(&dependent).unwrap());
    }

    #[test]
    fn find_location_in_tree_delegates_to_the_checkout_registry() {
        let dir = tempdir().unwrap();
        let mut builder = Builder::new(dir.path(), Config::default());
        builder.load_description(&SingleCheckout).unwrap();

        let loc = builder.find_location_in_tree(&dir.path().join("src/widget"));
        assert_eq!(loc.dir_type, DirType::Checkout);
        assert_eq!(loc.label.unwrap().name.as_str(), Some("widget"));
    }

    #[test]
    fn default_targets_cover_roles_and_deployments() {
        let dir = tempdir().unwrap();
        let mut builder = Builder::new(dir.path(), Config::default());
        builder.add_default_role("role_1");
        builder.add_default_deployment("prod");

        let targets = builder.default_targets();
        assert_eq!(targets.len(), 2);
        assert!(targets.iter().any(|l| l.label_type == LabelType::Package));
        assert!(targets.iter().any(|l| l.label_type == LabelType::Deployment));
    }
}
