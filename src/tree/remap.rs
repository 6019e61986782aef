//! Lexical path remapping, e.g. `{A;B}(i):{B;i}(A)`.
//!
//! Upper-case tokens inside braces name path positions; the token in
//! parentheses names the item index within a branch (`(i)` when omitted).
//! When both sides share the same index token, whole branches move and keep
//! their values. Otherwise every item is routed on its own: the destination
//! braces give its new branch and the destination index token gives its slot.
//!
//! Branch moves that only reorder the source tokens use positional offsets:
//! the segment at position `i` of the result is read from the position the
//! `i`-th source token takes in the destination. `{A;B;C}:{B;C;A}` therefore
//! sends `{0;1;2}` to `{2;0;1}`, which is how saved graphs expect it. Every
//! other pattern binds tokens by name.

use crate::tree::{DataTree, TreeError, TreePath, TreeResult};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
struct PatternSide {
    path: Vec<String>,
    index: String,
}

impl PatternSide {
    fn parse(text: &str) -> TreeResult<Self> {
        let mut side = text.trim().to_string();
        if !side.contains('(') {
            side.push_str("(i)");
        }

        let open = side.find('{');
        let close = side.rfind('}');
        let (open, close) = match (open, close) {
            (Some(o), Some(c)) if o < c => (o, c),
            _ => {
                return Err(TreeError::InvalidPattern(format!(
                    "'{}' has no {{...}} path section",
                    text
                )))
            }
        };
        let path = tokens(&side[open + 1..close]);

        let paren = side[close..].find('(').map(|p| p + close).ok_or_else(|| {
            TreeError::InvalidPattern(format!("'{}' has no (index) section", text))
        })?;
        let index = tokens(&side[paren + 1..])
            .into_iter()
            .next()
            .ok_or_else(|| TreeError::InvalidPattern(format!("'{}' names no index", text)))?;

        Ok(Self { path, index })
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_alphabetic())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parsed source/destination pair for [`DataTree::remap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemapPattern {
    source: PatternSide,
    dest: PatternSide,
}

impl RemapPattern {
    /// Parse the combined `source:dest` form.
    pub fn parse(mapping: &str) -> TreeResult<Self> {
        let (source, dest) = mapping.split_once(':').ok_or_else(|| {
            TreeError::InvalidPattern(format!("'{}' must have the form source:dest", mapping))
        })?;
        Self::new(source, dest)
    }

    pub fn new(source: &str, dest: &str) -> TreeResult<Self> {
        let pattern = Self {
            source: PatternSide::parse(source)?,
            dest: PatternSide::parse(dest)?,
        };
        pattern.validate()?;
        Ok(pattern)
    }

    /// True when items are redistributed individually rather than whole branches.
    pub fn remaps_items(&self) -> bool {
        self.source.index != self.dest.index
    }

    /// Destination position of each source token, when the destination
    /// names exactly the source tokens in some order.
    fn permutation(&self) -> Option<Vec<usize>> {
        if self.remaps_items() || self.source.path.len() != self.dest.path.len() {
            return None;
        }
        let mut seen = vec![false; self.dest.path.len()];
        self.source
            .path
            .iter()
            .map(|token| {
                let at = self.dest.path.iter().position(|t| t == token)?;
                (!std::mem::replace(&mut seen[at], true)).then_some(at)
            })
            .collect()
    }

    fn validate(&self) -> TreeResult<()> {
        let known = |token: &String| {
            self.source.path.contains(token)
                || (self.remaps_items() && *token == self.source.index)
        };
        let mut wanted: Vec<&String> = self.dest.path.iter().collect();
        if self.remaps_items() {
            wanted.push(&self.dest.index);
        }
        match wanted.into_iter().find(|t| !known(t)) {
            Some(unknown) => Err(TreeError::InvalidPattern(format!(
                "destination token '{}' does not appear in the source",
                unknown
            ))),
            None => Ok(()),
        }
    }

    /// Token values for one branch path. Missing positions read as 0; path
    /// segments beyond the pattern are returned separately.
    fn bind<'a>(&'a self, path: &[u32]) -> (HashMap<&'a str, u32>, Vec<u32>) {
        let mut bound = HashMap::new();
        for (i, token) in self.source.path.iter().enumerate() {
            bound.insert(token.as_str(), path.get(i).copied().unwrap_or(0));
        }
        let rest = path.get(self.source.path.len()..).unwrap_or(&[]).to_vec();
        (bound, rest)
    }

    fn resolve(&self, bound: &HashMap<&str, u32>, rest: &[u32]) -> TreePath {
        let mut segments: Vec<u32> = self
            .dest
            .path
            .iter()
            .map(|t| bound.get(t.as_str()).copied().unwrap_or(0))
            .collect();
        segments.extend_from_slice(rest);
        TreePath::new(segments)
    }
}

impl DataTree {
    /// Rearrange branches or items according to `pattern`. Returns a new tree.
    pub fn remap(&self, pattern: &RemapPattern) -> TreeResult<DataTree> {
        let mut remapped = DataTree::new();
        let offsets = pattern.permutation();
        for (path, values) in self.branches() {
            if let Some(offsets) = &offsets {
                let segments = offsets
                    .iter()
                    .map(|&at| path.get(at).copied().unwrap_or(0))
                    .chain(path.get(offsets.len()..).unwrap_or(&[]).iter().copied())
                    .collect();
                remapped.append_at_path(values.to_vec(), &TreePath::new(segments))?;
                continue;
            }

            let (mut bound, rest) = pattern.bind(&path);
            if !pattern.remaps_items() {
                let dest = pattern.resolve(&bound, &rest);
                remapped.append_at_path(values.to_vec(), &dest)?;
                continue;
            }
            for (index, value) in values.iter().enumerate() {
                bound.insert(pattern.source.index.as_str(), index as u32);
                let dest = pattern.resolve(&bound, &rest);
                let slot = bound
                    .get(pattern.dest.index.as_str())
                    .copied()
                    .unwrap_or(0);
                remapped.set_item_at(value.clone(), &dest, slot as usize)?;
            }
        }
        Ok(remapped)
    }
}
