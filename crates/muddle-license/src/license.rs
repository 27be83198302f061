//! License data (C11, spec line 71): the `License` value type and the
//! standard catalogue.

use std::collections::BTreeMap;

/// Which of the five buckets a license falls into. `Binary` and `Private`
/// are not licenses in the legal sense so much as markers: "this checkout
/// ships pre-built, no source available" and "this checkout is internal,
/// never redistributed".
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LicenseCategory {
    Gpl,
    OpenSource,
    PropSource,
    Binary,
    Private,
}

/// A license, as attached to a checkout or package.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct License {
    pub name: String,
    pub category: LicenseCategory,
    pub version: Option<String>,
    /// The exception clause this GPL license carries, if any (e.g. a
    /// classpath or linking exception). Descriptive only — whether GPL
    /// propagates past a given checkout is governed by the registry's
    /// `license_not_affected_by`/`nothing_builds_against` data, not by
    /// this field.
    pub with_exception: Option<String>,
}

impl License {
    pub fn new(name: impl Into<String>, category: LicenseCategory) -> Self {
        License {
            name: name.into(),
            category,
            version: None,
            with_exception: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.with_exception = Some(exception.into());
        self
    }

    /// Whether this license is the kind that propagates to whatever
    /// depends on it, absent a recorded exception.
    pub fn is_gpl(&self) -> bool {
        self.category == LicenseCategory::Gpl
    }
}

/// The built-in license table (§4.8 ADDED): the common licenses a build
/// tree is likely to need without every project hand-registering them.
pub fn standard_licenses() -> BTreeMap<String, License> {
    let mut table = BTreeMap::new();
    let mut add = |license: License| {
        table.insert(license.name.clone(), license);
    };

    add(License::new("GPL", LicenseCategory::Gpl));
    add(License::new("GPL-2.0", LicenseCategory::Gpl).with_version("2.0"));
    add(License::new("GPL-2.0+", LicenseCategory::Gpl).with_version("2.0+"));
    add(License::new("GPL-3.0", LicenseCategory::Gpl).with_version("3.0"));
    add(License::new("GPL-3.0+", LicenseCategory::Gpl).with_version("3.0+"));
    add(License::new("GPL-2.0-with-classpath-exception", LicenseCategory::Gpl)
        .with_version("2.0")
        .with_exception("classpath"));
    add(License::new("GPL-2.0-with-font-exception", LicenseCategory::Gpl)
        .with_version("2.0")
        .with_exception("font"));
    add(License::new("GPL-3.0-with-gcc-exception", LicenseCategory::Gpl)
        .with_version("3.0")
        .with_exception("gcc"));

    // LGPL permits linking without propagating GPL obligations to the
    // whole program, so it lives under open-source rather than gpl.
    add(License::new("LGPL", LicenseCategory::OpenSource));
    add(License::new("LGPL-2.1", LicenseCategory::OpenSource).with_version("2.1"));
    add(License::new("LGPL-2.1+", LicenseCategory::OpenSource).with_version("2.1+"));

    add(License::new("Apache-2.0", LicenseCategory::OpenSource).with_version("2.0"));
    add(License::new("BSD", LicenseCategory::OpenSource));
    add(License::new("MIT", LicenseCategory::OpenSource));

    add(License::new("Proprietary", LicenseCategory::PropSource));

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_catalogue_has_the_gpl_family() {
        let table = standard_licenses();
        assert_eq!(table["GPL-2.0"].category, LicenseCategory::Gpl);
        assert_eq!(table["GPL-3.0+"].category, LicenseCategory::Gpl);
        assert!(table["GPL-2.0-with-classpath-exception"].with_exception.is_some());
    }

    #[test]
    fn lgpl_and_permissive_licenses_are_open_source() {
        let table = standard_licenses();
        assert_eq!(table["LGPL-2.1"].category, LicenseCategory::OpenSource);
        assert_eq!(table["MIT"].category, LicenseCategory::OpenSource);
        assert_eq!(table["Apache-2.0"].category, LicenseCategory::OpenSource);
    }

    #[test]
    fn proprietary_is_prop_source() {
        let table = standard_licenses();
        assert_eq!(table["Proprietary"].category, LicenseCategory::PropSource);
    }

    #[test]
    fn is_gpl_ignores_the_exception_clause() {
        let with_exception = License::new("GPL-2.0-with-classpath-exception", LicenseCategory::Gpl)
            .with_exception("classpath");
        assert!(with_exception.is_gpl());
    }
}
