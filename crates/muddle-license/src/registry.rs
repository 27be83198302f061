//! The license registry (C11, §4.8): per-label license assignment, the
//! propagation-exception tables, and the implicit-GPL/clash computations
//! built on top of [`RuleSet`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use muddle_label::Label;
use muddle_rules::RuleSet;

use crate::license::{License, LicenseCategory};

/// A label whose implicit GPL status clashes with its own registered
/// license.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LicenseClash {
    /// The target that combines GPL and restricted-license dependencies.
    pub target: Label,
    /// The binary/private-licensed dependency responsible for the clash.
    pub offender: Label,
}

/// Per-checkout licenses, propagation exceptions, and the data needed to
/// compute GPL propagation and detect clashes.
#[derive(Default)]
pub struct LicenseRegistry {
    licenses: BTreeMap<Label, License>,
    license_files: BTreeMap<Label, PathBuf>,
    /// `dependent -> set<gpl checkout>` the dependent is asserted not to
    /// be affected by, despite depending on it.
    not_affected_by: BTreeMap<Label, BTreeSet<Label>>,
    /// Checkouts from which GPL never propagates, full stop.
    nothing_builds_against: BTreeSet<Label>,
}

impl LicenseRegistry {
    pub fn new() -> Self {
        LicenseRegistry::default()
    }

    pub fn register(&mut self, label: Label, license: License) {
        self.licenses.insert(label, license);
    }

    pub fn register_license_file(&mut self, label: Label, path: PathBuf) {
        self.license_files.insert(label, path);
    }

    pub fn license_for(&self, label: &Label) -> Option<&License> {
        self.licenses.get(label)
    }

    pub fn license_file_for(&self, label: &Label) -> Option<&PathBuf> {
        self.license_files.get(label)
    }

    /// Assert that `dependent` is not affected by GPL propagating from
    /// `gpl_checkout`, even though it depends on it.
    pub fn add_exception(&mut self, dependent: Label, gpl_checkout: Label) {
        self.not_affected_by.entry(dependent).or_default().insert(gpl_checkout);
    }

    /// Mark `checkout` as a root from which GPL never propagates to
    /// anything that depends on it.
    pub fn add_nothing_builds_against(&mut self, checkout: Label) {
        self.nothing_builds_against.insert(checkout);
    }

    fn is_excepted(&self, dependent: &Label, gpl_checkout: &Label) -> bool {
        self.not_affected_by.get(dependent).is_some_and(|set| set.contains(gpl_checkout))
    }

    /// Every GPL-propagating checkout itself, plus everything that
    /// (transitively) depends on one, minus labels excepted via
    /// `license_not_affected_by` and checkouts rooted in
    /// `nothing_builds_against`.
    pub fn implicit_gpl(&self, ruleset: &RuleSet) -> BTreeSet<Label> {
        let mut result = BTreeSet::new();
        for (label, license) in &self.licenses {
            if !license.is_gpl() || self.nothing_builds_against.contains(label) {
                continue;
            }
            result.insert(label.clone());
            for dependent in ruleset.required_by(label) {
                if !self.is_excepted(&dependent, label) {
                    result.insert(dependent);
                }
            }
        }
        result
    }

    /// Targets that combine an implicit-GPL dependency with a directly
    /// depended-on checkout or package licensed `binary`/`private` —
    /// i.e. GPL code and undistributable code built into the same thing.
    pub fn report_license_clashes(&self, ruleset: &RuleSet) -> Vec<LicenseClash> {
        let implicit = self.implicit_gpl(ruleset);
        let mut clashes = Vec::new();
        for target in &implicit {
            let Some(rule) = ruleset.rule_for_target(target) else {
                continue;
            };
            for dep in ruleset.resolved_deps(rule) {
                if let Some(license) = self.licenses.get(&dep)
                    && matches!(license.category, LicenseCategory::Binary | LicenseCategory::Private)
                {
                    clashes.push(LicenseClash {
                        target: target.clone(),
                        offender: dep,
                    });
                }
            }
        }
        clashes.sort();
        clashes.dedup();
        clashes
    }

    /// Whether `role_labels` mixes `binary`- and `private`-licensed
    /// members — a hard error when installed together under one role
    /// (§4.8). Returns the first offending pair found, if any.
    pub fn mixed_restrictive_licenses(&self, role_labels: &[Label]) -> Option<(Label, Label)> {
        let mut binary = None;
        let mut private = None;
        for label in role_labels {
            match self.licenses.get(label).map(|license| license.category) {
                Some(LicenseCategory::Binary) if binary.is_none() => binary = Some(label.clone()),
                Some(LicenseCategory::Private) if private.is_none() => private = Some(label.clone()),
                _ => {}
            }
        }
        binary.zip(private)
    }

    /// Absorb another registry's data, as when including a subdomain
    /// (C10). Labels are assumed already domain-rewritten and therefore
    /// disjoint from this registry's own, so entries are simply unioned.
    pub fn merge_from(&mut self, other: LicenseRegistry) {
        self.licenses.extend(other.licenses);
        self.license_files.extend(other.license_files);
        for (dependent, gpl_checkouts) in other.not_affected_by {
            self.not_affected_by.entry(dependent).or_default().extend(gpl_checkouts);
        }
        self.nothing_builds_against.extend(other.nothing_builds_against);
    }

    /// Consume this registry, rewriting every label it mentions — the
    /// keys of every table, and the GPL-checkout labels recorded inside
    /// `license_not_affected_by` — with `rewrite`. A sub-builder's
    /// registry is domain-less until it's included as a subdomain (C10);
    /// this is what gives its entries the new domain before `merge_from`
    /// unions them into the parent.
    pub fn rewrite_domains(self, rewrite: impl Fn(&Label) -> Label) -> LicenseRegistry {
        LicenseRegistry {
            licenses: self.licenses.into_iter().map(|(label, license)| (rewrite(&label), license)).collect(),
            license_files: self
                .license_files
                .into_iter()
                .map(|(label, path)| (rewrite(&label), path))
                .collect(),
            not_affected_by: self
                .not_affected_by
                .into_iter()
                .map(|(dependent, gpl_checkouts)| {
                    (rewrite(&dependent), gpl_checkouts.iter().map(&rewrite).collect())
                })
                .collect(),
            nothing_builds_against: self.nothing_builds_against.iter().map(&rewrite).collect(),
        }
    }
}
