//! The `BuildDescription` plug-in seam (§9): the host-language
//! replacement for dynamically loading a user build script. An embedding
//! binary implements this trait and registers an instance before calling
//! [`crate::Builder::load_description`].

use anyhow::Result;

use crate::Builder;

/// Registers labels, dependencies, and actions against a builder.
///
/// `describe` is called once for the root build tree and once more for
/// every subdomain a description requests via
/// [`Builder::include_subdomain`] — each call receives a fresh `Builder`
/// scoped to that subdomain's own (initially domain-less) labels.
pub trait BuildDescription {
    fn describe(&self, builder: &mut Builder) -> Result<()>;
}
