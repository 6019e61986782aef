//! Branch addresses.

use crate::tree::{TreeError, TreeResult};
use crate::value::Value;
use std::fmt;
use std::ops::Deref;

/// Absolute address of a branch: a sequence of non-negative integers.
///
/// Displayed the way editors show it, e.g. `{0;1;2}`. The persisted key form
/// (see [`TreePath::key`]) drops the braces: `0;1;2`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TreePath(Vec<u32>);

impl TreePath {
    pub fn new(segments: Vec<u32>) -> Self {
        Self(segments)
    }

    /// The conventional first branch, `{0}`.
    pub fn first() -> Self {
        Self(vec![0])
    }

    pub fn segments(&self) -> &[u32] {
        &self.0
    }

    pub fn into_segments(self) -> Vec<u32> {
        self.0
    }

    /// This path extended by one segment.
    pub fn child(&self, segment: u32) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment);
        Self(segments)
    }

    /// The next sibling path: last segment plus one. An empty path becomes `{0}`.
    pub fn incremented(&self) -> Self {
        let mut segments = self.0.clone();
        match segments.last_mut() {
            Some(last) => *last = last.saturating_add(1),
            None => segments.push(0),
        }
        Self(segments)
    }

    /// `0;1;2` form used as persisted flat-map keys.
    pub fn key(&self) -> String {
        self.0
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Parse `0;1;2` or `{0;1;2}`.
    pub fn parse(text: &str) -> TreeResult<Self> {
        let trimmed = text.trim();
        let inner = trimmed
            .strip_prefix('{')
            .and_then(|t| t.strip_suffix('}'))
            .unwrap_or(trimmed);
        if inner.trim().is_empty() {
            return Err(TreeError::invalid_path(text, "path has no segments"));
        }
        inner
            .split(';')
            .map(|segment| {
                segment.trim().parse::<u32>().map_err(|_| {
                    TreeError::invalid_path(
                        text,
                        format!("segment '{}' is not a non-negative integer", segment.trim()),
                    )
                })
            })
            .collect::<TreeResult<Vec<_>>>()
            .map(Self)
    }

    /// Build a path from numeric values, e.g. the contents of a path-typed input.
    pub fn from_values(values: &[Value]) -> TreeResult<Self> {
        let describe = || {
            values
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(";")
        };
        if values.is_empty() {
            return Err(TreeError::invalid_path(describe(), "path has no segments"));
        }
        values
            .iter()
            .map(|v| match v.as_f64() {
                Some(n) if n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 => Ok(n as u32),
                _ => Err(TreeError::invalid_path(
                    describe(),
                    format!("segment '{}' is not a non-negative integer", v),
                )),
            })
            .collect::<TreeResult<Vec<_>>>()
            .map(Self)
    }
}

impl Deref for TreePath {
    type Target = [u32];

    fn deref(&self) -> &[u32] {
        &self.0
    }
}

impl AsRef<[u32]> for TreePath {
    fn as_ref(&self) -> &[u32] {
        &self.0
    }
}

impl From<Vec<u32>> for TreePath {
    fn from(segments: Vec<u32>) -> Self {
        Self(segments)
    }
}

impl From<&[u32]> for TreePath {
    fn from(segments: &[u32]) -> Self {
        Self(segments.to_vec())
    }
}

impl<const N: usize> From<[u32; N]> for TreePath {
    fn from(segments: [u32; N]) -> Self {
        Self(segments.to_vec())
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.key())
    }
}

impl fmt::Debug for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
