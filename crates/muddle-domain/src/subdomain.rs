//! Including a sub-builder's loaded description as a subdomain (C10,
//! §4.7): rewriting every label it knows about and merging its data into
//! the root.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use muddle_label::Label;
use muddle_license::LicenseRegistry;
use muddle_repo::{CheckoutData, UpstreamTable};
use muddle_rules::RuleSet;

use crate::naming::rewrite_label_domain;

/// Everything a loaded build description owns, gathered in one place so
/// inclusion can rewrite and merge it as a unit.
pub struct LoadedDescription {
    pub rules: RuleSet,
    pub checkouts: BTreeMap<Label, CheckoutData>,
    pub licenses: LicenseRegistry,
    pub upstreams: UpstreamTable,
    pub just_pulled: BTreeSet<Label>,
    /// The label of the synth rule that gathers "this domain's
    /// description is loaded", if this description is itself a
    /// subdomain being folded into a further parent.
    pub domain_build_desc_label: Option<Label>,
}

impl LoadedDescription {
    pub fn new(rules: RuleSet) -> Self {
        LoadedDescription {
            rules,
            checkouts: BTreeMap::new(),
            licenses: LicenseRegistry::new(),
            upstreams: UpstreamTable::new(),
            just_pulled: BTreeSet::new(),
            domain_build_desc_label: None,
        }
    }

    /// Rewrite every label this description owns — rule targets and deps,
    /// checkout keys and each `CheckoutData::label`, `just_pulled`
    /// entries, and `domain_build_desc_label` — to carry `domain`.
    fn rewrite_domain(self, domain: &str) -> LoadedDescription {
        let rewrite = |label: &Label| rewrite_label_domain(label, domain);

        let rules = self.rules.rewrite_domains(&rewrite);

        let checkouts = self
            .checkouts
            .into_iter()
            .map(|(label, mut data)| {
                let new_label = rewrite(&label);
                data.label = new_label.clone();
                (new_label, data)
            })
            .collect();

        let just_pulled = self.just_pulled.iter().map(&rewrite).collect();
        let domain_build_desc_label = self.domain_build_desc_label.as_ref().map(&rewrite);

        LoadedDescription {
            rules,
            checkouts,
            licenses: self.licenses.rewrite_domains(&rewrite),
            upstreams: self.upstreams,
            just_pulled,
            domain_build_desc_label,
        }
    }
}

/// Fold `child` (a sub-builder's fully-loaded description, checked out at
/// `<root>/domains/<domain>/…`) into `parent`, rewriting every one of
/// `child`'s labels to carry `domain` first.
///
/// Fails if `child`'s upstream table conflicts with `parent`'s — a
/// subdomain adding a new upstream-repo entry under a repo the parent
/// already tracks (§4.7).
pub fn include_subdomain(parent: &mut LoadedDescription, child: LoadedDescription, domain: &str) -> Result<()> {
    let child = child.rewrite_domain(domain);

    parent.upstreams.merge_from(&child.upstreams)?;
    parent.rules.merge_from(child.rules);
    parent.checkouts.extend(child.checkouts);
    parent.licenses.merge_from(child.licenses);
    parent.just_pulled.extend(child.just_pulled);
    if let Some(label) = child.domain_build_desc_label {
        parent.domain_build_desc_label = Some(label);
    }

    Ok(())
}
