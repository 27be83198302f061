//! `Label::match_against` — wildcard-aware label matching (§3, §4.1).
//!
//! Each of `type`/`name`/`role`/`tag` contributes to the score
//! independently: two equal concrete values cost nothing, a wildcard
//! standing in for the other side's value costs one step, and two
//! concrete values that differ are an outright mismatch. `domain` is
//! never wildcarded and must match exactly.

use crate::{Label, Part};

/// The result of a successful match: zero for an exact match, negative
/// for each wildcarded field that had to give way.
pub type MatchScore = i32;

fn score_label_type(a: crate::LabelType, b: crate::LabelType) -> Option<i32> {
    use crate::LabelType::Wildcard;
    match (a, b) {
        (x, y) if x == y => Some(0),
        (Wildcard, _) | (_, Wildcard) => Some(-1),
        _ => None,
    }
}

fn score_part(a: &Part, b: &Part) -> Option<i32> {
    match (a, b) {
        (Part::Value(x), Part::Value(y)) => {
            if x == y {
                Some(0)
            } else {
                None
            }
        }
        (Part::Wildcard, _) | (_, Part::Wildcard) => Some(-1),
    }
}

fn score_role(a: &Option<Part>, b: &Option<Part>) -> Option<i32> {
    match (a, b) {
        (None, None) => Some(0),
        (None, Some(_)) | (Some(_), None) => None,
        (Some(x), Some(y)) => score_part(x, y),
    }
}

pub(crate) fn score(a: &Label, b: &Label) -> Option<MatchScore> {
    if a.domain != b.domain {
        return None;
    }
    let type_score = score_label_type(a.label_type, b.label_type)?;
    let name_score = score_part(&a.name, &b.name)?;
    let role_score = score_role(&a.role, &b.role)?;
    let tag_score = score_part(&a.tag, &b.tag)?;
    Some(type_score + name_score + role_score + tag_score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LabelType;

    #[test]
    fn wildcard_name_matches_concrete_symmetrically() {
        let a = Label::new(LabelType::Package, "*", "preconfig").with_role("role_1");
        let b = Label::new(LabelType::Package, "pkg_1", "preconfig").with_role("role_1");
        assert_eq!(a.match_against(&b), Some(-1));
        assert_eq!(b.match_against(&a), Some(-1));
        assert!(a.is_wildcard());
        assert!(b.is_definite());
    }

    #[test]
    fn concrete_mismatch_is_no_match() {
        let a = Label::new(LabelType::Package, "pkg_1", "built");
        let b = Label::new(LabelType::Package, "pkg_2", "built");
        assert_eq!(a.match_against(&b), None);
    }

    #[test]
    fn exact_match_scores_zero() {
        let a = Label::new(LabelType::Checkout, "co_1", "checked_out");
        let b = a.clone();
        assert_eq!(a.match_against(&b), Some(0));
    }

    #[test]
    fn differing_domain_never_matches() {
        let a = Label::new(LabelType::Checkout, "co_1", "checked_out").with_domain("sub1");
        let b = Label::new(LabelType::Checkout, "co_1", "checked_out");
        assert_eq!(a.match_against(&b), None);
    }

    #[test]
    fn unset_role_only_matches_unset_role() {
        let a = Label::new(LabelType::Checkout, "co_1", "checked_out");
        let b = Label::new(LabelType::Checkout, "co_1", "checked_out").with_role("role_1");
        assert_eq!(a.match_against(&b), None);
    }
}
