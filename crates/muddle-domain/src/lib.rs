//! Subdomain inclusion (C10, §4.7): checking out another build tree
//! under `<root>/domains/<D>/…` and folding its loaded description into
//! the root's.

mod naming;
mod subdomain;

pub use naming::{compose_domain, display_domain, rewrite_label_domain, subdomain_path};
pub use subdomain::{LoadedDescription, include_subdomain};
