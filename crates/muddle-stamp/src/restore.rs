//! Verifying an `unstamp` restoration (§4.6).
//!
//! Actually materialising the tree (creating `.muddle`, driving each
//! checkout) is VCS-plugin work outside this crate; what belongs here is
//! the check that runs afterwards: does the freshly loaded build
//! description's checkout set match what the stamp recorded?

use std::collections::BTreeMap;

use crate::stamp::CheckoutSection;

/// What didn't match after restoring a stamp and reloading the build
/// description.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DiscrepancyReport {
    /// Recorded in the stamp but absent from the restored tree.
    pub missing: Vec<String>,
    /// Present in the restored tree but not recorded in the stamp.
    pub unexpected: Vec<String>,
    /// Present in both, but at a different revision.
    pub revision_mismatch: Vec<(String, String, String)>,
}

impl DiscrepancyReport {
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty() && self.revision_mismatch.is_empty()
    }
}

fn key(domain: &Option<String>, name: &str) -> String {
    match domain {
        Some(d) => format!("{d}/{name}"),
        None => name.to_string(),
    }
}

/// Compare the checkouts a stamp recorded against those the restored
/// tree's reloaded build description actually produced.
pub fn verify_restoration(expected: &[CheckoutSection], actual: &[CheckoutSection]) -> DiscrepancyReport {
    let expected_by_key: BTreeMap<String, &CheckoutSection> =
        expected.iter().map(|c| (key(&c.domain, &c.name), c)).collect();
    let actual_by_key: BTreeMap<String, &CheckoutSection> =
        actual.iter().map(|c| (key(&c.domain, &c.name), c)).collect();

    let mut report = DiscrepancyReport::default();
    for (name, exp) in &expected_by_key {
        match actual_by_key.get(name) {
            None => report.missing.push(name.clone()),
            Some(act) if act.revision != exp.revision => {
                report.revision_mismatch.push((name.clone(), exp.revision.clone(), act.revision.clone()));
            }
            Some(_) => {}
        }
    }
    for name in actual_by_key.keys() {
        if !expected_by_key.contains_key(name) {
            report.unexpected.push(name.clone());
        }
    }
    report.missing.sort();
    report.unexpected.sort();
    report.revision_mismatch.sort();
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkout(name: &str, revision: &str) -> CheckoutSection {
        CheckoutSection {
            domain: None,
            name: name.to_string(),
            repo_url: "git+https://example.test/repo.git".to_string(),
            vcs: "git".to_string(),
            revision: revision.to_string(),
            relative_path: None,
            directory: None,
            leaf: name.to_string(),
            branch: None,
            options: BTreeMap::new(),
        }
    }

    #[test]
    fn matching_checkouts_are_clean() {
        let expected = vec![checkout("widget", "abc")];
        let actual = vec![checkout("widget", "abc")];
        assert!(verify_restoration(&expected, &actual).is_clean());
    }

    #[test]
    fn missing_checkout_is_reported() {
        let expected = vec![checkout("widget", "abc")];
        let report = verify_restoration(&expected, &[]);
        assert_eq!(report.missing, vec!["widget".to_string()]);
    }

    #[test]
    fn unexpected_checkout_is_reported() {
        let actual = vec![checkout("widget", "abc")];
        let report = verify_restoration(&[], &actual);
        assert_eq!(report.unexpected, vec!["widget".to_string()]);
    }

    #[test]
    fn revision_mismatch_is_reported() {
        let expected = vec![checkout("widget", "abc")];
        let actual = vec![checkout("widget", "def")];
        let report = verify_restoration(&expected, &actual);
        assert_eq!(
            report.revision_mismatch,
            vec![("widget".to_string(), "abc".to_string(), "def".to_string())]
        );
    }
}
