//! Path patterns and segment matching.
//!
//! Declared patterns and request paths are both compared after stripping leading
//! and trailing slashes, then split on `/`. A `{name}` segment binds whatever
//! non-empty text sits at the same position in the request path; every other
//! segment must match byte-for-byte.

use crate::error::{ServerError, ServerResult};
use std::collections::HashSet;
use std::fmt;
use std::ops::Index;

/// Strips every leading and trailing `/`.
pub fn strip_slashes(path: &str) -> &str {
    path.trim_matches('/')
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Left behind by consecutive slashes.
    Empty,
    Literal(String),
    Param(String),
}

impl Segment {
    fn from_declared(part: &str) -> Segment {
        if part.is_empty() {
            Segment::Empty
        } else if let Some(rest) = part.strip_prefix('{') {
            let name = rest.strip_suffix('}').unwrap_or(rest);
            Segment::Param(name.to_owned())
        } else {
            Segment::Literal(part.to_owned())
        }
    }
}

/// Path parameters bound by a match, kept in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, name: &str, value: &str) {
        match self.entries.iter_mut().find(|(key, _)| key == name) {
            Some(entry) => entry.1 = value.to_owned(),
            None => self.entries.push((name.to_owned(), value.to_owned())),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Positional access, in the order the placeholders were declared.
    pub fn at(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Index<usize> for Params {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        &self.entries[index].1
    }
}

/// A declared route path, parsed once at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    normalized: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parses a declaration such as `/users/{id}/`.
    ///
    /// Repeating a placeholder name inside one pattern is rejected, since the
    /// second binding would silently shadow the first.
    pub fn parse(pattern: &str) -> ServerResult<Self> {
        let normalized = strip_slashes(pattern);
        let segments: Vec<Segment> = normalized.split('/').map(Segment::from_declared).collect();

        let mut seen = HashSet::new();
        for segment in &segments {
            if let Segment::Param(name) = segment {
                if !seen.insert(name.as_str()) {
                    return Err(ServerError::MalformedRoute(format!(
                        "placeholder `{{{}}}` appears twice in `{}`",
                        name, pattern
                    )));
                }
            }
        }

        Ok(Self {
            normalized: normalized.to_owned(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn param_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Param(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn matches(&self, path: &str) -> Option<Params> {
        match_segments(&self.segments, path)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.normalized)
    }
}

/// Matches a raw declared pattern against an actual path.
///
/// Unlike [`PathPattern::parse`] this does not validate the declaration; a
/// repeated placeholder keeps the last value bound to it.
pub fn match_path(declared: &str, actual: &str) -> Option<Params> {
    let segments: Vec<Segment> = strip_slashes(declared)
        .split('/')
        .map(Segment::from_declared)
        .collect();
    match_segments(&segments, actual)
}

fn match_segments(declared: &[Segment], path: &str) -> Option<Params> {
    let actual: Vec<&str> = strip_slashes(path).split('/').collect();
    if actual.len() != declared.len() {
        return None;
    }

    let mut params = Params::new();
    for (segment, actual) in declared.iter().zip(actual) {
        match segment {
            Segment::Empty if actual.is_empty() => continue,
            Segment::Empty => return None,
            Segment::Literal(text) if text == actual => {}
            Segment::Literal(_) => return None,
            Segment::Param(_) if actual.is_empty() => return None,
            Segment::Param(name) => params.insert(name, actual),
        }
    }
    Some(params)
}
