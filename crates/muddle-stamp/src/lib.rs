//! The version stamp (C9, §4.6): a canonical snapshot of a build tree's
//! exact checkout revisions, saved, compared, and restored.

mod diff;
mod restore;
mod revision;
mod stamp;

pub use diff::diff_stamps;
pub use restore::{DiscrepancyReport, verify_restoration};
pub use revision::{ResolvedRevision, RevisionInput, RevisionPolicy, resolve_revision};
pub use stamp::{CheckoutSection, DomainSection, RootSection, Stamp};
