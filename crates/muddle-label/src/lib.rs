//! The label value type: the identifier for every artifact and lifecycle
//! position muddle tracks.
//!
//! A label is a 5-tuple `(type, name, role, tag, domain)` plus two flags
//! (`transient`, `system`) that are not part of its identity. Any of
//! `type`/`name`/`role`/`tag` may be the wildcard `*`; a label with no
//! wildcarded field is "definite".

mod label_type;
mod matching;
mod parse;
mod part;

pub use label_type::LabelType;
pub use part::Part;

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Checkout/package/deployment/synth tag vocabularies (§6).
pub mod tags {
    pub const CHECKOUT: &[&str] = &[
        "checked_out",
        "pulled",
        "merged",
        "changes_committed",
        "changes_pushed",
    ];
    pub const PACKAGE: &[&str] = &[
        "preconfig",
        "configured",
        "built",
        "installed",
        "postinstalled",
        "clean",
        "distclean",
    ];
    pub const DEPLOYMENT: &[&str] = &["deployed", "instructions_applied"];
    pub const UNIVERSAL: &[&str] = &["loaded", "temporary", "runtime_env", "distributed"];
}

/// An identifier for an artifact and its lifecycle position.
///
/// Equality, hashing and ordering consider only the five identifying
/// fields (`label_type`, `name`, `role`, `tag`, `domain`); `transient` and
/// `system` are informational flags (I3/I4) and never affect identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Label {
    pub label_type: LabelType,
    pub name: Part,
    pub role: Option<Part>,
    pub tag: Part,
    /// `None` is the top-level tree; `Some("sub1/sub2")` a nested domain
    /// (one path segment per level — `sub1(sub2)` is how this renders for
    /// humans, not how it's stored).
    pub domain: Option<String>,
    pub transient: bool,
    pub system: bool,
}

impl Label {
    /// Build a definite label with no role and no domain.
    pub fn new(
        label_type: LabelType,
        name: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Label {
            label_type,
            name: Part::parse(&name.into()),
            role: None,
            tag: Part::parse(&tag.into()),
            domain: None,
            transient: false,
            system: false,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(Part::Value(role.into()));
        self
    }

    pub fn with_wildcard_role(mut self) -> Self {
        self.role = Some(Part::Wildcard);
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Part::Value(tag.into());
        self
    }

    pub fn transient(mut self) -> Self {
        self.transient = true;
        self
    }

    pub fn system(mut self) -> Self {
        self.system = true;
        self
    }

    /// A copy with only `tag` changed; the common case of "same artifact,
    /// next lifecycle position".
    pub fn with_tag_copy(&self, tag: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.tag = Part::Value(tag.into());
        copy
    }

    /// A copy with only `domain` changed; used when rewriting labels during
    /// subdomain inclusion (§4.7).
    pub fn with_domain_copy(&self, domain: impl Into<String>) -> Self {
        let mut copy = self.clone();
        copy.domain = Some(domain.into());
        copy
    }

    /// True iff none of type/name/role/tag is wildcarded.
    pub fn is_definite(&self) -> bool {
        self.label_type != LabelType::Wildcard
            && !self.name.is_wildcard()
            && !self.tag.is_wildcard()
            && self
                .role
                .as_ref()
                .is_none_or(|r| !r.is_wildcard())
    }

    pub fn is_wildcard(&self) -> bool {
        !self.is_definite()
    }

    /// Equality ignoring flags — identical to `==` since flags are not
    /// part of `Label`'s identity, provided for parity with the spec's
    /// named operation.
    pub fn just_match(&self, other: &Label) -> bool {
        self == other
    }

    fn identity(&self) -> (&LabelType, &Part, &Option<Part>, &Part, &Option<String>) {
        (
            &self.label_type,
            &self.name,
            &self.role,
            &self.tag,
            &self.domain,
        )
    }
}

impl PartialEq for Label {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for Label {}

impl std::hash::Hash for Label {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl PartialOrd for Label {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Label {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity().cmp(&other.identity())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        parse::render(self, f)
    }
}

pub use matching::MatchScore;
pub use parse::ParseLabelError;

impl Label {
    /// Parse a fully-specified label: `type:[(domain)]name[{role}]/tag[flags]`.
    pub fn parse(text: &str) -> Result<Label, ParseLabelError> {
        parse::parse(text, None)
    }

    /// Parse a possibly-partial label, filling missing fields from `defaults`.
    pub fn parse_fragment(text: &str, defaults: &Label) -> Result<Label, ParseLabelError> {
        parse::parse(text, Some(defaults))
    }

    /// Score how well `self` (the pattern, which may carry wildcards)
    /// matches `other` (typically a concrete label). `None` means no
    /// match; lower (more negative) scores mean more wildcards had to
    /// give way.
    pub fn match_against(&self, other: &Label) -> Option<MatchScore> {
        matching::score(self, other)
    }
}
