use std::collections::{BTreeMap, BTreeSet};

use anyhow::Result;
use muddle_errors::give_up;
use serde::{Deserialize, Serialize};

/// `repo -> { upstream-repo -> set<name> }` (§3).
///
/// Names are expected to match `[A-Za-z0-9_-]+`; this is enforced by
/// `add_upstream`, not by the stored representation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UpstreamTable {
    entries: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl UpstreamTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_upstream(
        &mut self,
        repo: impl Into<String>,
        upstream_repo: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<()> {
        let name = name.into();
        if !is_valid_name(&name) {
            give_up!("upstream name {name:?} is not of the form [A-Za-z0-9_-]+");
        }
        self.entries
            .entry(repo.into())
            .or_default()
            .entry(upstream_repo.into())
            .or_default()
            .insert(name);
        Ok(())
    }

    pub fn upstreams_for(&self, repo: &str) -> Option<&BTreeMap<String, BTreeSet<String>>> {
        self.entries.get(repo)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge `other` (typically a subdomain's table) into `self` (the
    /// parent). Identical upstreams are unioned by name; a subdomain
    /// adding an upstream for a repo the parent already tracks, under an
    /// upstream-repo the parent doesn't already have, is a hard conflict
    /// (§4.7).
    pub fn merge_from(&mut self, other: &UpstreamTable) -> Result<()> {
        for (repo, upstreams) in &other.entries {
            let existing_repo_entry = self.entries.get(repo).cloned();
            let target = self.entries.entry(repo.clone()).or_default();
            for (upstream_repo, names) in upstreams {
                match target.get_mut(upstream_repo) {
                    Some(existing_names) => {
                        existing_names.extend(names.iter().cloned());
                    }
                    None => {
                        if existing_repo_entry.is_some() {
                            give_up!(
                                "subdomain adds upstream {upstream_repo:?} for repo {repo:?}, \
                                 which the parent already tracks under different upstream(s)"
                            );
                        }
                        target.insert(upstream_repo.clone(), names.clone());
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_upstream_rejects_bad_names() {
        let mut table = UpstreamTable::new();
        let err = table
            .add_upstream("repo_a", "repo_b", "has spaces")
            .unwrap_err();
        assert!(err.to_string().contains("has spaces"));
    }

    #[test]
    fn merge_unions_identical_upstream_by_name() {
        let mut parent = UpstreamTable::new();
        parent.add_upstream("repo_a", "mirror", "mirror1").unwrap();

        let mut sub = UpstreamTable::new();
        sub.add_upstream("repo_a", "mirror", "mirror2").unwrap();

        parent.merge_from(&sub).unwrap();
        let names = &parent.upstreams_for("repo_a").unwrap()["mirror"];
        assert!(names.contains("mirror1"));
        assert!(names.contains("mirror2"));
    }

    #[test]
    fn merge_conflicting_new_upstream_is_an_error() {
        let mut parent = UpstreamTable::new();
        parent.add_upstream("repo_a", "mirror", "mirror1").unwrap();

        let mut sub = UpstreamTable::new();
        sub.add_upstream("repo_a", "other_mirror", "x").unwrap();

        let err = parent.merge_from(&sub).unwrap_err();
        assert!(err.to_string().contains("repo_a"));
    }

    #[test]
    fn merge_into_untouched_repo_is_not_a_conflict() {
        let mut parent = UpstreamTable::new();
        let mut sub = UpstreamTable::new();
        sub.add_upstream("repo_c", "mirror", "m").unwrap();

        parent.merge_from(&sub).unwrap();
        assert!(parent.upstreams_for("repo_c").is_some());
    }
}
