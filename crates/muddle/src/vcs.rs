//! The VCS-mutating-verb seam (§6, §9(c)).
//!
//! `commit`, `push`, `pull`, `merge`, `status`, `reparent`,
//! `checkout`/`uncheckout` and `import` are named in the CLI's command
//! catalogue, but talking to an actual repository is per-VCS and
//! peripheral to the core (§1). This trait is what a driver program
//! registers to back those verbs; the core defines it and implements
//! nothing against it.

use std::path::Path;

use anyhow::Result;
use muddle_label::Label;
use muddle_repo::CheckoutData;

/// What backs the CLI's VCS-mutating verbs for one checkout's VCS kind.
///
/// No implementation ships in this crate — a driver program wires up
/// one plugin per `VcsKind` it supports and registers it before running
/// any of the verbs above.
pub trait VcsPlugin: Send + Sync {
    /// Commit any local changes in `checkout` with `message`.
    fn commit(&self, checkout: &CheckoutData, message: &str) -> Result<()>;

    /// Push local commits to the checkout's configured remote.
    fn push(&self, checkout: &CheckoutData) -> Result<()>;

    /// Pull from the checkout's configured remote. Returns whether
    /// anything new was fetched.
    fn pull(&self, checkout: &CheckoutData) -> Result<bool>;

    /// Merge `from_revision` into the checkout's working copy.
    fn merge(&self, checkout: &CheckoutData, from_revision: &str) -> Result<()>;

    /// A short human-readable status line for the checkout's working copy.
    fn status(&self, checkout: &CheckoutData) -> Result<String>;

    /// Repoint `checkout` at a different upstream repository URL.
    fn reparent(&self, checkout: &CheckoutData, new_repo_url: &str) -> Result<()>;

    /// Materialise `checkout` on disk at `at`.
    fn checkout(&self, checkout: &CheckoutData, at: &Path) -> Result<()>;

    /// Remove a checkout's working copy from disk without touching its
    /// registration.
    fn uncheckout(&self, checkout: &CheckoutData) -> Result<()>;

    /// Import an externally-created tree at `at` as the checkout named by
    /// `label`, bringing it under VCS control for the first time.
    fn import(&self, label: &Label, at: &Path) -> Result<()>;
}
