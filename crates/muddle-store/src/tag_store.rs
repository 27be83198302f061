//! Coordinates tag lookups and rule bookkeeping across the root store
//! and every subdomain store touched so far, plus the process-local
//! transient set (§4.3, I3).
//!
//! A [`TagStore`] is the thing a worker actually holds: it owns the
//! root [`Store`], lazily opens a [`Store`] for each subdomain a label
//! names, and keeps completed transient labels in memory only — they
//! are never written to any `tag_db`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::Result;
use muddle_label::Label;

use crate::store::{Store, StoreKind};
use crate::RuleStatus;

pub struct TagStore {
    root: PathBuf,
    root_store: Store,
    subdomain_stores: BTreeMap<String, Store>,
    transient_done: BTreeSet<Label>,
    /// This process's identity for claim/master bookkeeping.
    pub uuid: String,
    pub pid: u32,
}

impl TagStore {
    pub fn open(tree_root: &Path) -> Result<TagStore> {
        let root_store = Store::open_as(tree_root, StoreKind::Root)?;
        Ok(TagStore {
            root: tree_root.to_path_buf(),
            root_store,
            subdomain_stores: BTreeMap::new(),
            transient_done: BTreeSet::new(),
            uuid: uuid::Uuid::new_v4().to_string(),
            pid: std::process::id(),
        })
    }

    /// The store that owns `label`'s tag: the root store when
    /// `label.domain` is `None`, otherwise the (lazily opened) store
    /// rooted at `<root>/domains/<domain>`.
    fn store_for(&mut self, label: &Label) -> Result<&mut Store> {
        match &label.domain {
            None => Ok(&mut self.root_store),
            Some(domain) => {
                if !self.subdomain_stores.contains_key(domain) {
                    let path = self.subdomain_tree(domain);
                    let store = Store::open_as(&path, StoreKind::Subdomain)?;
                    self.subdomain_stores.insert(domain.clone(), store);
                }
                Ok(self.subdomain_stores.get_mut(domain).expect("just inserted"))
            }
        }
    }

    fn subdomain_tree(&self, domain: &str) -> PathBuf {
        let mut path = self.root.join("domains");
        for segment in domain.split('/') {
            path.push(segment);
        }
        path
    }

    // -- Tag operations (§4.3) -------------------------------------------

    /// Record `label` as done. Transient labels (I3) never reach a
    /// database; they live only in this process's memory.
    pub fn set_tag(&mut self, label: &Label) -> Result<()> {
        if label.transient {
            self.transient_done.insert(label.clone());
            return Ok(());
        }
        self.store_for(label)?.set_tag(label)
    }

    pub fn clear_tag(&mut self, label: &Label) -> Result<()> {
        if label.transient {
            self.transient_done.remove(label);
            return Ok(());
        }
        self.store_for(label)?.clear_tag(label)
    }

    pub fn is_tag_done(&mut self, label: &Label) -> Result<bool> {
        if label.transient {
            return Ok(self.transient_done.contains(label));
        }
        self.store_for(label)?.is_tag_done(label)
    }

    pub fn clear_tags_type(&mut self, domain: Option<&str>, label_type: &str) -> Result<()> {
        match domain {
            None => self.root_store.clear_tags_type(label_type),
            Some(domain) => {
                let needle = Label::new(muddle_label::LabelType::Wildcard, "*", "*")
                    .with_domain(domain.to_string());
                self.store_for(&needle)?.clear_tags_type(label_type)
            }
        }
    }

    // -- Rule bookkeeping (root-only, §4.3) -------------------------------

    pub fn upsert_rule(&mut self, target: &Label, req_master: bool, transient: bool) -> Result<()> {
        self.root_store.upsert_rule(target, req_master, transient)
    }

    pub fn replace_rule_deps(&mut self, target: &Label, deps: &[Label]) -> Result<()> {
        self.root_store.replace_rule_deps(target, deps)
    }

    pub fn add_to_frontier(&mut self, target: &Label, req_master: bool) -> Result<()> {
        self.root_store.add_to_frontier(target, req_master)
    }

    pub fn frontier(&self) -> Result<Vec<(String, bool)>> {
        self.root_store.frontier()
    }

    pub fn rule_status(&self, target: &Label) -> Result<Option<RuleStatus>> {
        self.root_store.rule_status(target)
    }

    /// Attempt to claim `target` for this process. For a transient
    /// target there is no database row to claim; ownership is implicit
    /// to whichever process reaches it, so this always succeeds unless
    /// it is already marked done in-process.
    pub fn try_claim(&mut self, target: &Label) -> Result<bool> {
        if target.transient {
            return Ok(!self.transient_done.contains(target));
        }
        let (uuid, pid) = (self.uuid.clone(), self.pid);
        self.root_store.try_claim(target, &uuid, pid)
    }

    pub fn mark_done(&mut self, target: &Label) -> Result<()> {
        if target.transient {
            self.transient_done.insert(target.clone());
            return Ok(());
        }
        self.root_store.mark_done(target)
    }

    pub fn mark_clear(&mut self, target: &Label) -> Result<()> {
        if target.transient {
            return Ok(());
        }
        self.root_store.mark_clear(target)
    }

    // -- Process roster & pause protocol (root-only, §4.3) ----------------

    pub fn register_process(&mut self) -> Result<()> {
        let (uuid, pid) = (self.uuid.clone(), self.pid);
        self.root_store.register_process(&uuid, pid)
    }

    pub fn unregister_process(&mut self) -> Result<()> {
        let uuid = self.uuid.clone();
        self.root_store.unregister_process(&uuid)
    }

    pub fn attempt_become_master(&mut self) -> Result<bool> {
        let uuid = self.uuid.clone();
        self.root_store.attempt_set_master(&uuid)
    }

    pub fn is_master(&self) -> Result<bool> {
        self.root_store.is_master(&self.uuid)
    }

    pub fn request_pause(&mut self) -> Result<()> {
        let uuid = self.uuid.clone();
        self.root_store.request_pause(&uuid)
    }

    pub fn release_pause(&mut self) -> Result<()> {
        self.root_store.release_pause()
    }

    pub fn is_pause_requested(&self) -> Result<bool> {
        self.root_store.is_pause_requested(&self.uuid)
    }

    pub fn set_paused(&mut self, paused: bool) -> Result<()> {
        let uuid = self.uuid.clone();
        self.root_store.set_paused(&uuid, paused)
    }

    pub fn are_others_paused(&self) -> Result<bool> {
        self.root_store.are_others_paused(&self.uuid)
    }

    pub fn process_count(&self) -> Result<i64> {
        self.root_store.process_count()
    }

    pub fn processing_count(&self) -> Result<i64> {
        self.root_store.processing_count()
    }

    // -- Just-pulled set (root-only, §4.3) --------------------------------

    pub fn mark_just_pulled(&mut self, label: &Label) -> Result<()> {
        self.root_store.mark_just_pulled(label)
    }

    pub fn just_pulled(&self) -> Result<Vec<String>> {
        self.root_store.just_pulled()
    }

    pub fn clear_just_pulled(&mut self) -> Result<()> {
        self.root_store.clear_just_pulled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muddle_label::LabelType;
    use tempfile::tempdir;

    #[test]
    fn transient_labels_never_touch_the_database() {
        let dir = tempdir().unwrap();
        let mut store = TagStore::open(dir.path()).unwrap();
        let l = Label::new(LabelType::Package, "pkg", "built").transient();

        assert!(!store.is_tag_done(&l).unwrap());
        store.set_tag(&l).unwrap();
        assert!(store.is_tag_done(&l).unwrap());

        // A fresh TagStore over the same tree sees no trace of it.
        drop(store);
        let mut reopened = TagStore::open(dir.path()).unwrap();
        assert!(!reopened.is_tag_done(&l).unwrap());
    }

    #[test]
    fn non_transient_tag_survives_reopen() {
        let dir = tempdir().unwrap();
        let mut store = TagStore::open(dir.path()).unwrap();
        let l = Label::new(LabelType::Package, "pkg", "built");
        store.set_tag(&l).unwrap();
        drop(store);

        let mut reopened = TagStore::open(dir.path()).unwrap();
        assert!(reopened.is_tag_done(&l).unwrap());
    }

    #[test]
    fn subdomain_label_routes_to_its_own_store() {
        let dir = tempdir().unwrap();
        let mut store = TagStore::open(dir.path()).unwrap();
        let l = Label::new(LabelType::Package, "pkg", "built").with_domain("sub1");
        store.set_tag(&l).unwrap();
        assert!(store.is_tag_done(&l).unwrap());

        let root_only = Label::new(LabelType::Package, "pkg", "built");
        assert!(!store.is_tag_done(&root_only).unwrap());
    }

    #[test]
    fn claim_and_done_round_trip() {
        let dir = tempdir().unwrap();
        let mut store = TagStore::open(dir.path()).unwrap();
        let target = Label::new(LabelType::Package, "pkg", "built");
        store.upsert_rule(&target, false, false).unwrap();

        assert!(store.try_claim(&target).unwrap());
        store.mark_done(&target).unwrap();
        assert_eq!(store.rule_status(&target).unwrap(), Some(RuleStatus::Done));
    }

    #[test]
    fn transient_claim_is_idempotent_per_process() {
        let dir = tempdir().unwrap();
        let mut store = TagStore::open(dir.path()).unwrap();
        let target = Label::new(LabelType::Package, "pkg", "built").transient();

        assert!(store.try_claim(&target).unwrap());
        store.mark_done(&target).unwrap();
        assert!(!store.try_claim(&target).unwrap());
    }
}
