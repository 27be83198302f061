//! Resolving a filesystem path to a label (§4.5 `find_location_in_tree`):
//! lets commands default to "whatever's at the current directory" the
//! way `whereami`/bare invocations do.

use std::path::{Component, Path, PathBuf};

use muddle_domain::compose_domain;
use muddle_label::{Label, LabelType};
use muddle_repo::CheckoutData;

/// Which part of the on-disk layout (§6) a path falls under.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DirType {
    Root,
    Checkout,
    PackageObject,
    Install,
    Deploy,
    SubdomainRoot,
    Muddle,
    Versions,
    Unexpected,
}

/// `find_location_in_tree`'s result: which kind of directory `path` is,
/// the best-effort label it corresponds to (if any), and the domain it
/// falls under (if any, composed for nested subdomains).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub dir_type: DirType,
    pub label: Option<Label>,
    pub domain: Option<String>,
}

impl Location {
    fn new(dir_type: DirType) -> Self {
        Location {
            dir_type,
            label: None,
            domain: None,
        }
    }

    fn with_label(mut self, label: Label) -> Self {
        self.label = Some(label);
        self
    }

    fn with_domain(mut self, domain: String) -> Self {
        self.domain = Some(domain);
        self
    }
}

fn components_of(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// Find the checkout whose `location()` (relative to its own domain's
/// root) matches `relative`, among checkouts belonging to `domain`.
fn checkout_at<'a>(
    checkouts: &'a std::collections::BTreeMap<Label, CheckoutData>,
    domain: Option<&str>,
    relative: &Path,
) -> Option<&'a Label> {
    checkouts.iter().find_map(|(label, data)| {
        if label.domain.as_deref() != domain {
            return None;
        }
        (data.location() == relative).then_some(label)
    })
}

/// Resolve `path` (anywhere under or equal to `root`) to a `Location`.
/// `path` must already be made relative to `root` by the caller walking
/// into nested `domains/<D>/…` roots as it goes; this function only
/// needs the top-level tree's checkout registry and the remaining
/// relative path.
pub fn find_location_in_tree(
    root: &Path,
    checkouts: &std::collections::BTreeMap<Label, CheckoutData>,
    path: &Path,
) -> Location {
    let Ok(relative) = path.strip_prefix(root) else {
        return Location::new(DirType::Unexpected);
    };
    resolve(checkouts, None, relative)
}

fn resolve(
    checkouts: &std::collections::BTreeMap<Label, CheckoutData>,
    domain: Option<&str>,
    relative: &Path,
) -> Location {
    let parts = components_of(relative);
    let Some(first) = parts.first() else {
        return match domain {
            Some(d) => Location::new(DirType::SubdomainRoot).with_domain(d.to_string()),
            None => Location::new(DirType::Root),
        };
    };

    match first.as_str() {
        ".muddle" => Location::new(DirType::Muddle).maybe_domain(domain),
        "versions" => Location::new(DirType::Versions).maybe_domain(domain),
        "src" => {
            let rest: PathBuf = parts[1..].iter().collect();
            let mut location = Location::new(DirType::Checkout).maybe_domain(domain);
            if let Some(label) = checkout_at(checkouts, domain, &PathBuf::from("src").join(&rest)) {
                location = location.with_label(label.clone());
            }
            location
        }
        "obj" if parts.len() >= 2 => {
            let mut label = Label::new(LabelType::Package, parts[1].clone(), "*");
            if let Some(role) = parts.get(2) {
                label = label.with_role(role.clone());
            }
            if let Some(d) = domain {
                label = label.with_domain(d.to_string());
            }
            Location::new(DirType::PackageObject).maybe_domain(domain).with_label(label)
        }
        "install" if parts.len() >= 2 => Location::new(DirType::Install).maybe_domain(domain),
        "deploy" if parts.len() >= 2 => {
            let mut label = Label::new(LabelType::Deployment, parts[1].clone(), "*");
            if let Some(d) = domain {
                label = label.with_domain(d.to_string());
            }
            Location::new(DirType::Deploy).maybe_domain(domain).with_label(label)
        }
        "domains" if parts.len() >= 2 => {
            let child_domain = compose_domain(domain, &parts[1]);
            let rest: PathBuf = parts[2..].iter().collect();
            resolve(checkouts, Some(&child_domain), &rest)
        }
        _ => Location::new(DirType::Unexpected).maybe_domain(domain),
    }
}

impl Location {
    fn maybe_domain(mut self, domain: Option<&str>) -> Self {
        self.domain = domain.map(str::to_string);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muddle_repo::{Repository, VcsKind};
    use std::collections::BTreeMap;

    fn sample_checkouts() -> BTreeMap<Label, CheckoutData> {
        let label = Label::new(LabelType::Checkout, "widget", "*");
        let repo = Repository::new(VcsKind::Git, "https://example.test/widget.git");
        let mut map = BTreeMap::new();
        map.insert(label.clone(), CheckoutData::new(label, repo));
        map
    }

    #[test]
    fn root_itself_is_root() {
        let checkouts = BTreeMap::new();
        let loc = find_location_in_tree(Path::new("/tree"), &checkouts, Path::new("/tree"));
        assert_eq!(loc.dir_type, DirType::Root);
    }

    #[test]
    fn dot_muddle_is_recognised() {
        let checkouts = BTreeMap::new();
        let loc = find_location_in_tree(Path::new("/tree"), &checkouts, Path::new("/tree/.muddle"));
        assert_eq!(loc.dir_type, DirType::Muddle);
    }

    #[test]
    fn src_checkout_resolves_to_its_label() {
        let checkouts = sample_checkouts();
        let loc = find_location_in_tree(Path::new("/tree"), &checkouts, Path::new("/tree/src/widget"));
        assert_eq!(loc.dir_type, DirType::Checkout);
        assert_eq!(loc.label.unwrap().name.as_str(), Some("widget"));
    }

    #[test]
    fn nested_domain_composes_and_recurses() {
        let checkouts = BTreeMap::new();
        let loc = find_location_in_tree(
            Path::new("/tree"),
            &checkouts,
            Path::new("/tree/domains/sub1/domains/sub2"),
        );
        assert_eq!(loc.dir_type, DirType::SubdomainRoot);
        assert_eq!(loc.domain.as_deref(), Some("sub1/sub2"));
    }

    #[test]
    fn unrelated_path_is_unexpected() {
        let checkouts = BTreeMap::new();
        let loc = find_location_in_tree(Path::new("/tree"), &checkouts, Path::new("/tree/README.md"));
        assert_eq!(loc.dir_type, DirType::Unexpected);
    }

    #[test]
    fn path_outside_the_tree_is_unexpected() {
        let checkouts = BTreeMap::new();
        let loc = find_location_in_tree(Path::new("/tree"), &checkouts, Path::new("/elsewhere"));
        assert_eq!(loc.dir_type, DirType::Unexpected);
    }
}
