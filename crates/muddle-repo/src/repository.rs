use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The version-control systems a repository may live under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VcsKind {
    Git,
    Bzr,
    Svn,
    Cvs,
}

impl VcsKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VcsKind::Git => "git",
            VcsKind::Bzr => "bzr",
            VcsKind::Svn => "svn",
            VcsKind::Cvs => "cvs",
        }
    }

    /// The option names this VCS recognises in a checkout's `options` map
    /// (§3, "only allow-listed option names per VCS").
    pub fn allowed_options(&self) -> &'static [&'static str] {
        match self {
            VcsKind::Git => &["shallow", "no_follow_tags", "unfrozen", "merge"],
            VcsKind::Bzr => &["unfrozen"],
            VcsKind::Svn => &["no_checkout_area", "revision_in_leaf"],
            VcsKind::Cvs => &["module"],
        }
    }
}

impl fmt::Display for VcsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VcsKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "git" => Ok(VcsKind::Git),
            "bzr" => Ok(VcsKind::Bzr),
            "svn" => Ok(VcsKind::Svn),
            "cvs" => Ok(VcsKind::Cvs),
            other => Err(format!("unknown VCS kind {other:?}")),
        }
    }
}

/// An immutable description of a source location.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub vcs_kind: VcsKind,
    pub base_url: String,
    pub relative_path: Option<String>,
    pub branch: Option<String>,
    pub revision: Option<String>,
}

impl Repository {
    pub fn new(vcs_kind: VcsKind, base_url: impl Into<String>) -> Self {
        Repository {
            vcs_kind,
            base_url: base_url.into(),
            relative_path: None,
            branch: None,
            revision: None,
        }
    }

    pub fn with_relative_path(mut self, path: impl Into<String>) -> Self {
        self.relative_path = Some(path.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    /// The canonical `<vcs>+<url>` form used in stamps and diagnostics.
    pub fn canonical_url(&self) -> String {
        let mut url = format!("{}+{}", self.vcs_kind, self.base_url);
        if let Some(path) = &self.relative_path {
            url.push('/');
            url.push_str(path);
        }
        url
    }
}

impl fmt::Display for Repository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_url())
    }
}
