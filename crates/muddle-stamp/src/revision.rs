//! Revision selection for `stamp save` (§4.6 "Flags `force` and
//! `just_use_head`").

/// What's known about a checkout's revision when a stamp is being saved.
#[derive(Clone, Copy, Debug, Default)]
pub struct RevisionInput<'a> {
    pub description_revision: Option<&'a str>,
    pub working_copy_revision: Option<&'a str>,
}

/// `force` and `just_use_head` are orthogonal flags on `stamp save`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RevisionPolicy {
    pub force: bool,
    pub just_use_head: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedRevision {
    Revision(String),
    /// No revision could be determined; the stamp is `.partial` and this
    /// text is listed among its problems.
    Problem(String),
}

/// Pick the revision to record for a checkout named `name`.
///
/// `just_use_head` wins outright. Otherwise `force` prefers the build
/// description's recorded revision over the working copy's; without
/// `force`, the working copy wins (it reflects what's actually checked
/// out). If neither is known, the checkout is a stamp problem.
pub fn resolve_revision(name: &str, input: RevisionInput, policy: RevisionPolicy) -> ResolvedRevision {
    if policy.just_use_head {
        return ResolvedRevision::Revision("HEAD".to_string());
    }
    if policy.force && let Some(desc) = input.description_revision {
        return ResolvedRevision::Revision(desc.to_string());
    }
    if let Some(wc) = input.working_copy_revision {
        return ResolvedRevision::Revision(wc.to_string());
    }
    if let Some(desc) = input.description_revision {
        return ResolvedRevision::Revision(desc.to_string());
    }
    ResolvedRevision::Problem(format!("no revision could be determined for checkout {name:?}"))
}
