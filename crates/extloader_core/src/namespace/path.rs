//! Dotted namespace paths (`tizen.contact`, `tizen.AddressBook`).
//!
//! # Invariants
//! - A path has at least one segment.
//! - Every segment is a valid identifier (`[A-Za-z_$][A-Za-z0-9_$]*`).
//! - Paths order and hash by their dotted string form, so a
//!   `BTreeMap<NamespacePath, _>` can be queried with `&str`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Borrow;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

static SEGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("valid segment regex"));

/// Validated dotted namespace path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NamespacePath {
    raw: String,
}

impl NamespacePath {
    /// Parses and validates a dotted path. Surrounding whitespace is ignored.
    pub fn parse(value: &str) -> Result<Self, PathError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(PathError::Empty);
        }
        for segment in trimmed.split('.') {
            if segment.is_empty() {
                return Err(PathError::EmptySegment(trimmed.to_string()));
            }
            if !SEGMENT_RE.is_match(segment) {
                return Err(PathError::InvalidSegment {
                    path: trimmed.to_string(),
                    segment: segment.to_string(),
                });
            }
        }
        Ok(Self {
            raw: trimmed.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.raw.split('.')
    }

    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Last segment, e.g. `AddressBook` for `tizen.AddressBook`.
    pub fn base_name(&self) -> &str {
        match self.raw.rfind('.') {
            Some(index) => &self.raw[index + 1..],
            None => &self.raw,
        }
    }

    /// Parent path, `None` for top-level paths.
    pub fn parent(&self) -> Option<NamespacePath> {
        self.raw.rfind('.').map(|index| Self {
            raw: self.raw[..index].to_string(),
        })
    }

    /// All prefixes from the top-level segment down to `self` (inclusive).
    pub fn ancestors_and_self(&self) -> Vec<NamespacePath> {
        let mut prefixes = Vec::with_capacity(self.depth());
        for (index, ch) in self.raw.char_indices() {
            if ch == '.' {
                prefixes.push(Self {
                    raw: self.raw[..index].to_string(),
                });
            }
        }
        prefixes.push(self.clone());
        prefixes
    }
}

impl Display for NamespacePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for NamespacePath {
    type Err = PathError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Borrow<str> for NamespacePath {
    fn borrow(&self) -> &str {
        &self.raw
    }
}

impl AsRef<str> for NamespacePath {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

/// Path parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    Empty,
    EmptySegment(String),
    InvalidSegment { path: String, segment: String },
}

impl Display for PathError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "namespace path must not be empty"),
            Self::EmptySegment(path) => write!(f, "namespace path has an empty segment: `{path}`"),
            Self::InvalidSegment { path, segment } => {
                write!(f, "namespace path `{path}` has invalid segment `{segment}`")
            }
        }
    }
}

impl Error for PathError {}
