//! The persistent tag/rule store (C5, §4.3).
//!
//! Each domain tree keeps a SQLite file at `.muddle/tag_db`. A root
//! tree's database owns the full schema: which labels are done, which
//! rules exist and their claim status, the build frontier, the process
//! roster (for master election and cooperative pause), and the
//! just-pulled set. A subdomain tree's database owns only its own
//! `labels` table — rule bookkeeping always lives at the root.

mod status;
mod store;
mod tag_store;

pub use status::RuleStatus;
pub use store::{Store, StoreKind, SUBDOMAIN_MARKER_FILE, TAG_DB_FILE};
pub use tag_store::TagStore;
