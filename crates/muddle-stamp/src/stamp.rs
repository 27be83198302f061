//! The version stamp document (§4.6): a canonical, sorted, line-oriented
//! text capturing the root repository, every subdomain, and every
//! checkout's exact revision, hashed with SHA-1 to give it an identity.

use std::collections::BTreeMap;

use anyhow::Result;
use muddle_errors::give_up;
use muddle_repo::CheckoutData;
use sha1::{Digest, Sha1};

/// The top-level repository a stamp was saved from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RootSection {
    pub repo_url: String,
    pub description_path: String,
    pub description_branch: Option<String>,
}

/// One subdomain, as recorded in `[DOMAIN <name>]`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct DomainSection {
    pub name: String,
    pub repo_url: String,
    pub description_path: String,
}

/// One checkout, as recorded in `[CHECKOUT <domain>/<name>]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutSection {
    pub domain: Option<String>,
    pub name: String,
    pub repo_url: String,
    pub vcs: String,
    pub revision: String,
    pub relative_path: Option<String>,
    pub directory: Option<String>,
    pub leaf: String,
    pub branch: Option<String>,
    pub options: BTreeMap<String, String>,
}

impl CheckoutSection {
    fn sort_key(&self) -> (&Option<String>, &str) {
        (&self.domain, &self.name)
    }

    /// Flatten a registry's [`CheckoutData`] plus a resolved revision
    /// into the record a stamp saves — the bridge between the checkout
    /// registry (C2/C3) and the stamp document (C9).
    pub fn from_checkout_data(data: &CheckoutData, revision: String) -> CheckoutSection {
        CheckoutSection {
            domain: data.label.domain.clone(),
            name: data.name().to_string(),
            repo_url: data.repo.canonical_url(),
            vcs: data.repo.vcs_kind.to_string(),
            revision,
            relative_path: data.repo.relative_path.clone(),
            directory: data.dir.clone(),
            leaf: data.leaf.resolve(data.name()),
            branch: data.repo.branch.clone(),
            options: data
                .options
                .iter()
                .map(|(key, value)| (key.clone(), value.to_string()))
                .collect(),
        }
    }
}

/// A saved version stamp.
///
/// `problems` is non-empty exactly when this stamp is partial: one or
/// more checkouts had no determinable revision (§4.6).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stamp {
    pub root: RootSection,
    pub domains: Vec<DomainSection>,
    pub checkouts: Vec<CheckoutSection>,
    pub problems: Vec<String>,
}

impl Stamp {
    pub fn new(
        root: RootSection,
        mut domains: Vec<DomainSection>,
        mut checkouts: Vec<CheckoutSection>,
        problems: Vec<String>,
    ) -> Self {
        domains.sort();
        checkouts.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Stamp {
            root,
            domains,
            checkouts,
            problems,
        }
    }

    pub fn is_partial(&self) -> bool {
        !self.problems.is_empty()
    }

    /// `"stamp"` or `"partial"`, the extension a saved stamp file takes.
    pub fn extension(&self) -> &'static str {
        if self.is_partial() { "partial" } else { "stamp" }
    }

    /// The canonical text: stable under re-serialisation of an unchanged
    /// build, which is what makes the SHA-1 hash meaningful as identity.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("[ROOT]\n");
        out.push_str(&format!("repo_url={}\n", self.root.repo_url));
        out.push_str(&format!("description_path={}\n", self.root.description_path));
        if let Some(branch) = &self.root.description_branch {
            out.push_str(&format!("description_branch={branch}\n"));
        }

        for domain in &self.domains {
            out.push_str(&format!("\n[DOMAIN {}]\n", domain.name));
            out.push_str(&format!("repo_url={}\n", domain.repo_url));
            out.push_str(&format!("description_path={}\n", domain.description_path));
        }

        for checkout in &self.checkouts {
            let domain_label = checkout.domain.as_deref().unwrap_or("");
            out.push_str(&format!("\n[CHECKOUT {domain_label}/{}]\n", checkout.name));
            out.push_str(&format!("name={}\n", checkout.name));
            out.push_str(&format!("repo_url={}\n", checkout.repo_url));
            out.push_str(&format!("vcs={}\n", checkout.vcs));
            out.push_str(&format!("revision={}\n", checkout.revision));
            if let Some(path) = &checkout.relative_path {
                out.push_str(&format!("relative_path={path}\n"));
            }
            if let Some(dir) = &checkout.directory {
                out.push_str(&format!("directory={dir}\n"));
            }
            out.push_str(&format!("leaf={}\n", checkout.leaf));
            if let Some(branch) = &checkout.branch {
                out.push_str(&format!("branch={branch}\n"));
            }
            if let Some(domain) = &checkout.domain {
                out.push_str(&format!("domain={domain}\n"));
            }
            for (key, value) in &checkout.options {
                out.push_str(&format!("option.{key}={value}\n"));
            }
        }

        out
    }

    /// The stamp's identifier: the SHA-1 hash of its canonical text, hex
    /// encoded.
    pub fn sha1_hex(&self) -> String {
        let mut hasher = Sha1::new();
        hasher.update(self.render().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// The filename this stamp would be saved under, given its hash.
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.sha1_hex(), self.extension())
    }

    /// Parse a stamp previously produced by [`Stamp::render`]. `unstamp`
    /// reads a saved `.stamp`/`.partial` file this way before driving
    /// each recorded checkout.
    pub fn parse(text: &str) -> Result<Stamp> {
        let mut blocks = text.split("\n\n").map(str::trim).filter(|b| !b.is_empty());

        let Some(root_block) = blocks.next() else {
            give_up!("stamp file is empty");
        };
        let mut root_lines = root_block.lines();
        if root_lines.next() != Some("[ROOT]") {
            give_up!("stamp file must begin with a [ROOT] section");
        }
        let fields = parse_fields(root_lines)?;
        let root = RootSection {
            repo_url: require_field(&fields, "repo_url")?,
            description_path: require_field(&fields, "description_path")?,
            description_branch: fields.get("description_branch").cloned(),
        };

        let mut domains = Vec::new();
        let mut checkouts = Vec::new();
        for block in blocks {
            let mut lines = block.lines();
            let Some(header) = lines.next() else { continue };
            if let Some(name) = header.strip_prefix("[DOMAIN ").and_then(|rest| rest.strip_suffix(']')) {
                let fields = parse_fields(lines)?;
                domains.push(DomainSection {
                    name: name.to_string(),
                    repo_url: require_field(&fields, "repo_url")?,
                    description_path: require_field(&fields, "description_path")?,
                });
            } else if header.strip_prefix("[CHECKOUT ").is_some() {
                let fields = parse_fields(lines)?;
                let options = fields
                    .iter()
                    .filter_map(|(key, value)| key.strip_prefix("option.").map(|name| (name.to_string(), value.clone())))
                    .collect();
                checkouts.push(CheckoutSection {
                    domain: fields.get("domain").cloned(),
                    name: require_field(&fields, "name")?,
                    repo_url: require_field(&fields, "repo_url")?,
                    vcs: require_field(&fields, "vcs")?,
                    revision: require_field(&fields, "revision")?,
                    relative_path: fields.get("relative_path").cloned(),
                    directory: fields.get("directory").cloned(),
                    leaf: require_field(&fields, "leaf")?,
                    branch: fields.get("branch").cloned(),
                    options,
                });
            } else {
                give_up!("unrecognised stamp section header {header:?}");
            }
        }

        Ok(Stamp::new(root, domains, checkouts, Vec::new()))
    }
}

fn parse_fields<'a>(lines: impl Iterator<Item = &'a str>) -> Result<BTreeMap<String, String>> {
    let mut fields = BTreeMap::new();
    for line in lines {
        let Some((key, value)) = line.split_once('=') else {
            give_up!("malformed stamp line {line:?}, expected key=value");
        };
        fields.insert(key.to_string(), value.to_string());
    }
    Ok(fields)
}

fn require_field(fields: &BTreeMap<String, String>, key: &str) -> Result<String> {
    match fields.get(key) {
        Some(value) => Ok(value.clone()),
        None => give_up!("stamp section is missing required field {key:?}"),
    }
}
