//! Domain-name composition and the on-disk layout for subdomains (§4.7).

use std::path::{Path, PathBuf};

use muddle_label::Label;

/// The domain name a freshly-included subdomain gets, given the domain
/// (if any) it's being included under. Nested inclusion composes with
/// `/`, matching the path segments a `TagStore` splits a domain name on.
pub fn compose_domain(parent: Option<&str>, child: &str) -> String {
    match parent {
        Some(parent) => format!("{parent}/{child}"),
        None => child.to_string(),
    }
}

/// Where a subdomain's checkouts live on disk: `<root>/domains/<D>/…`,
/// one path segment per `/`-separated component of `domain`.
pub fn subdomain_path(root: &Path, domain: &str) -> PathBuf {
    let mut path = root.join("domains");
    for segment in domain.split('/') {
        path.push(segment);
    }
    path
}

/// Rewrite `label` to carry `domain`, unless it already carries one.
///
/// A sub-builder's own labels start out domain-less, so a single
/// inclusion stamps them with exactly the new domain. But a sub-builder
/// that itself included a deeper subdomain already carries the fully
/// composed domain on those labels (it knew its own prefix before
/// recursing) — re-stamping here would flatten that nesting back down
/// to this level, so a label that already has a domain is left alone.
pub fn rewrite_label_domain(label: &Label, domain: &str) -> Label {
    if label.domain.is_some() {
        label.clone()
    } else {
        label.with_domain_copy(domain.to_string())
    }
}

/// `sub1/sub2` rendered as `sub1(sub2)` for humans — the nested-domain
/// notation commands print, kept distinct from the `/`-joined key the
/// store and filesystem layout actually use.
pub fn display_domain(domain: &str) -> String {
    let mut segments = domain.split('/');
    let Some(first) = segments.next() else {
        return String::new();
    };
    let mut rendered = first.to_string();
    for segment in segments {
        rendered.push('(');
        rendered.push_str(segment);
    }
    for _ in 1..domain.split('/').count() {
        rendered.push(')');
    }
    rendered
}
