//! Textual label parsing and rendering (§3, §4.1).
//!
//! Full form: `type:[(domain)]name[{role}]/tag[flags]` — `type` and `/tag`
//! are mandatory. Fragment form additionally allows omitting `type:` and
//! `/tag`, in which case they (and `domain`/`role` if absent) are taken
//! from a caller-supplied default label.

use std::fmt;
use std::str::FromStr;

use crate::{Label, LabelType, Part};

#[derive(Debug, thiserror::Error)]
pub enum ParseLabelError {
    #[error("unknown label type {0:?}")]
    UnknownType(String),
    #[error("label {0:?} is missing a type and no default was supplied")]
    MissingType(String),
    #[error("label {0:?} is missing a name")]
    MissingName(String),
    #[error("label {0:?} is missing a tag and no default was supplied")]
    MissingTag(String),
    #[error("label {0:?} has an unterminated {1}")]
    Unterminated(String, &'static str),
    #[error("label {0:?} has mismatched domain parentheses")]
    MismatchedParens(String),
    #[error("label {0:?} has an unrecognised flag {1:?}")]
    UnknownFlag(String, char),
}

struct Cursor<'a> {
    original: &'a str,
    rest: &'a str,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Cursor {
            original: text,
            rest: text,
        }
    }

    /// Consume a `(...)` group with balanced nesting, returning its inner
    /// text. Domains may themselves contain parens, e.g. `sub1(sub2)`.
    fn take_paren_group(&mut self) -> Result<Option<&'a str>, ParseLabelError> {
        if !self.rest.starts_with('(') {
            return Ok(None);
        }
        let bytes = self.rest.as_bytes();
        let mut depth = 0i32;
        for (i, &b) in bytes.iter().enumerate() {
            match b {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        let inner = &self.rest[1..i];
                        self.rest = &self.rest[i + 1..];
                        return Ok(Some(inner));
                    }
                }
                _ => {}
            }
        }
        Err(ParseLabelError::MismatchedParens(self.original.to_string()))
    }

    fn take_brace_group(&mut self) -> Result<Option<&'a str>, ParseLabelError> {
        if !self.rest.starts_with('{') {
            return Ok(None);
        }
        match self.rest.find('}') {
            Some(end) => {
                let inner = &self.rest[1..end];
                self.rest = &self.rest[end + 1..];
                Ok(Some(inner))
            }
            None => Err(ParseLabelError::Unterminated(
                self.original.to_string(),
                "role",
            )),
        }
    }

    fn take_bracket_group(&mut self) -> Result<Option<&'a str>, ParseLabelError> {
        if !self.rest.starts_with('[') {
            return Ok(None);
        }
        match self.rest.find(']') {
            Some(end) => {
                let inner = &self.rest[1..end];
                self.rest = &self.rest[end + 1..];
                Ok(Some(inner))
            }
            None => Err(ParseLabelError::Unterminated(
                self.original.to_string(),
                "flags",
            )),
        }
    }

    /// Consume up to (not including) the next `{`, `/` or `[`, or the end
    /// of input.
    fn take_until_delimiter(&mut self) -> &'a str {
        let end = self
            .rest
            .find(['{', '/', '['])
            .unwrap_or(self.rest.len());
        let taken = &self.rest[..end];
        self.rest = &self.rest[end..];
        taken
    }

    fn take_tag(&mut self) -> Option<&'a str> {
        if !self.rest.starts_with('/') {
            return None;
        }
        self.rest = &self.rest[1..];
        let end = self.rest.find('[').unwrap_or(self.rest.len());
        let taken = &self.rest[..end];
        self.rest = &self.rest[end..];
        Some(taken)
    }
}

fn is_type_token(text: &str) -> bool {
    LabelType::from_str(text).is_ok()
}

pub(crate) fn parse(text: &str, defaults: Option<&Label>) -> Result<Label, ParseLabelError> {
    let mut cursor = Cursor::new(text);

    // `type:` prefix. Only consumed if what precedes the first `:` (before
    // any of the other delimiters) is a recognised type token.
    let colon_idx = cursor.rest.find(':');
    let delimiter_idx = cursor.rest.find(['(', '{', '/', '[']);
    let type_prefix_present = match (colon_idx, delimiter_idx) {
        (Some(c), Some(d)) => c < d && is_type_token(&cursor.rest[..c]),
        (Some(c), None) => is_type_token(&cursor.rest[..c]),
        (None, _) => false,
    };

    let label_type = if type_prefix_present {
        let idx = colon_idx.unwrap();
        let t = LabelType::from_str(&cursor.rest[..idx]).expect("checked by is_type_token");
        cursor.rest = &cursor.rest[idx + 1..];
        t
    } else if let Some(d) = defaults {
        d.label_type
    } else {
        return Err(ParseLabelError::MissingType(text.to_string()));
    };

    let domain = match cursor.take_paren_group()? {
        Some(d) => Some(d.to_string()),
        None => defaults.and_then(|d| d.domain.clone()),
    };

    let name_text = cursor.take_until_delimiter();
    if name_text.is_empty() {
        return Err(ParseLabelError::MissingName(text.to_string()));
    }
    let name = Part::parse(name_text);

    let role = match cursor.take_brace_group()? {
        Some(r) => Some(Part::parse(r)),
        None => defaults.and_then(|d| d.role.clone()),
    };

    let tag = match cursor.take_tag() {
        Some(t) => Part::parse(t),
        None => match defaults {
            Some(d) => d.tag.clone(),
            None => return Err(ParseLabelError::MissingTag(text.to_string())),
        },
    };

    let mut transient = defaults.is_some_and(|d| d.transient);
    let mut system = defaults.is_some_and(|d| d.system);
    if let Some(flags) = cursor.take_bracket_group()? {
        // Flags are additive over any default; a fragment never *clears* a
        // flag the default already set.
        for ch in flags.chars() {
            match ch {
                'T' => transient = true,
                'S' => system = true,
                other => return Err(ParseLabelError::UnknownFlag(text.to_string(), other)),
            }
        }
    }

    Ok(Label {
        label_type,
        name,
        role,
        tag,
        domain,
        transient,
        system,
    })
}

pub(crate) fn render(label: &Label, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:", label.label_type)?;
    if let Some(domain) = &label.domain {
        write!(f, "({domain})")?;
    }
    write!(f, "{}", label.name)?;
    if let Some(role) = &label.role {
        write!(f, "{{{role}}}")?;
    }
    write!(f, "/{}", label.tag)?;
    if label.transient || label.system {
        write!(f, "[")?;
        if label.transient {
            write!(f, "T")?;
        }
        if label.system {
            write!(f, "S")?;
        }
        write!(f, "]")?;
    }
    Ok(())
}
