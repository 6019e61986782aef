//! Hierarchical, path-addressed container of value lists.
//!
//! A `DataTree` is an ordered set of branches. Each branch is addressed by a
//! [`TreePath`] and holds a list of values; intermediate branches may be
//! empty and the root never holds data. Branches are stored in a flat `Vec`
//! with parent/child/sibling links, so siblings keep insertion order and
//! traversal needs no recursion.
//!
//! ```text
//! root
//! +-- {0}        []
//! |   +-- {0;0}  [a, b]
//! |   +-- {0;1}  [c]
//! +-- {1}        [d]
//! ```
//!
//! Whole-tree operations (`map`, `flatten`, `graft`, `remap`) return new trees
//! and leave the receiver untouched.

mod flat_map;
mod path;
mod remap;

pub use flat_map::FlatMap;
pub use path::TreePath;
pub use remap::RemapPattern;

use crate::resource::ResourceHandle;
use crate::value::Value;
use thiserror::Error;

/// Errors raised by tree addressing and restructuring.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Invalid remap pattern: {0}")]
    InvalidPattern(String),
}

impl TreeError {
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        TreeError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type TreeResult<T> = std::result::Result<T, TreeError>;

/// Highest slot [`DataTree::set_item_at`] will pad a branch out to.
pub const MAX_ITEM_INDEX: usize = 1_000_000;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct BranchId(u32);

impl BranchId {
    const ROOT: BranchId = BranchId(0);
    const INVALID: BranchId = BranchId(u32::MAX);

    #[inline]
    fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone)]
struct Branch {
    segment: u32,
    depth: u32,
    parent: BranchId,
    first_child: BranchId,
    last_child: BranchId,
    next_sibling: BranchId,
    values: Vec<Value>,
}

impl Branch {
    fn new(segment: u32, depth: u32, parent: BranchId) -> Self {
        Self {
            segment,
            depth,
            parent,
            first_child: BranchId::INVALID,
            last_child: BranchId::INVALID,
            next_sibling: BranchId::INVALID,
            values: Vec::new(),
        }
    }
}

/// Path-addressed tree of value lists.
///
/// Cloning is the structural copy: branches are duplicated and values are
/// cloned, which for resource handles means sharing the same resource.
#[derive(Debug, Clone)]
pub struct DataTree {
    branches: Vec<Branch>,
}

impl Default for DataTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for DataTree {
    /// Two trees are equal when they traverse identically.
    fn eq(&self, other: &Self) -> bool {
        self.branches().eq(other.branches())
    }
}

impl DataTree {
    pub fn new() -> Self {
        Self {
            branches: vec![Branch::new(0, 0, BranchId::INVALID)],
        }
    }

    /// A tree holding `values` at `{0}`.
    pub fn from_values(values: Vec<Value>) -> Self {
        let mut tree = Self::new();
        let id = tree.ensure_branch(&[0]);
        tree.branches[id.index()].values = values;
        tree
    }

    /// Replace the values at `path`, creating any missing branches.
    pub fn set_data_at_path(&mut self, values: Vec<Value>, path: &[u32]) -> TreeResult<()> {
        let id = self.branch_for_write(path)?;
        self.branches[id.index()].values = values;
        Ok(())
    }

    /// Concatenate `values` onto the values at `path`, creating any missing branches.
    pub fn append_at_path(&mut self, values: Vec<Value>, path: &[u32]) -> TreeResult<()> {
        let id = self.branch_for_write(path)?;
        self.branches[id.index()].values.extend(values);
        Ok(())
    }

    /// Place a single value at `index` within the branch at `path`.
    ///
    /// Gaps before `index` are filled with `Value::Null`; an occupied slot is
    /// overwritten. Indices above [`MAX_ITEM_INDEX`] are rejected.
    pub fn set_item_at(&mut self, value: Value, path: &[u32], index: usize) -> TreeResult<()> {
        if index > MAX_ITEM_INDEX {
            return Err(TreeError::invalid_path(
                TreePath::new(path.to_vec()).to_string(),
                format!("item index {} exceeds {}", index, MAX_ITEM_INDEX),
            ));
        }
        let id = self.branch_for_write(path)?;
        let values = &mut self.branches[id.index()].values;
        if values.len() <= index {
            values.resize(index + 1, Value::Null);
        }
        values[index] = value;
        Ok(())
    }

    /// Values at `path`, or an empty slice when the branch does not exist.
    pub fn data_at_path(&self, path: &[u32]) -> &[Value] {
        self.find_branch(path)
            .map(|id| self.branches[id.index()].values.as_slice())
            .unwrap_or(&[])
    }

    /// Values at `path` with nulls removed.
    pub fn data_at_path_filtered(&self, path: &[u32]) -> impl Iterator<Item = &Value> {
        self.data_at_path(path).iter().filter(|v| !v.is_null())
    }

    /// Lazy pre-order traversal of branches holding data.
    pub fn branches(&self) -> Branches<'_> {
        let mut stack = Vec::new();
        self.push_children_reversed(BranchId::ROOT, &mut stack);
        Branches { tree: self, stack }
    }

    /// Call `visit` for every branch holding data, in traversal order.
    pub fn recurse(&self, mut visit: impl FnMut(&[Value], &TreePath)) {
        for (path, values) in self.branches() {
            visit(values, &path);
        }
    }

    /// Every value, in traversal order.
    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.branches().flat_map(|(_, values)| values.iter())
    }

    pub fn copy(&self) -> DataTree {
        self.clone()
    }

    /// Copy of the tree with `transform` applied to every value.
    ///
    /// When a branch's first transformed value is a list, every transformed value
    /// is fanned out into its own sub-branch `path + [index]`, so a calculation
    /// returning several results per item yields one branch per item.
    pub fn map(&self, mut transform: impl FnMut(&Value) -> Value) -> DataTree {
        let mut mapped = DataTree::new();
        for (path, values) in self.branches() {
            let transformed: Vec<Value> = values.iter().map(&mut transform).collect();
            if matches!(transformed.first(), Some(Value::List(_))) {
                for (index, item) in transformed.into_iter().enumerate() {
                    let items = match item {
                        Value::List(items) => items,
                        other => vec![other],
                    };
                    mapped.write_unchecked(items, &path.child(index as u32));
                }
            } else {
                mapped.write_unchecked(transformed, &path);
            }
        }
        mapped
    }

    /// All values collected into `{0}`, in traversal order.
    pub fn flatten(&self) -> DataTree {
        DataTree::from_values(self.values().cloned().collect())
    }

    /// All values collected into the branch at `path`.
    pub fn flatten_to(&self, path: &[u32]) -> TreeResult<DataTree> {
        let mut flat = DataTree::new();
        flat.set_data_at_path(self.values().cloned().collect(), path)?;
        Ok(flat)
    }

    /// Flatten the receiver itself; no values are released.
    pub fn flatten_in_place(&mut self) {
        *self = self.flatten();
    }

    /// One sub-branch per value: `{p}=[a,b]` becomes `{p;0}=[a]`, `{p;1}=[b]`.
    pub fn graft(&self) -> DataTree {
        let mut grafted = DataTree::new();
        for (path, values) in self.branches() {
            for (index, value) in values.iter().enumerate() {
                grafted.write_unchecked(vec![value.clone()], &path.child(index as u32));
            }
        }
        grafted
    }

    /// Concatenate each branch of `other` onto the same path in this tree.
    pub fn concat_from(&mut self, other: &DataTree) {
        for (path, values) in other.branches() {
            let id = self.ensure_branch(&path);
            self.branches[id.index()].values.extend_from_slice(values);
        }
    }

    /// True when no branch holds data.
    pub fn is_empty(&self) -> bool {
        self.branches().next().is_none()
    }

    /// Number of branches holding data.
    pub fn branch_count(&self) -> usize {
        self.branches().count()
    }

    pub fn value_count(&self) -> usize {
        self.branches().map(|(_, values)| values.len()).sum()
    }

    /// Depth of the deepest childless branch, empty branches included. At least 1.
    pub fn max_path_depth(&self) -> usize {
        self.branches
            .iter()
            .filter(|b| !b.first_child.is_valid())
            .map(|b| b.depth as usize)
            .max()
            .unwrap_or(0)
            .max(1)
    }

    pub fn to_flat_map(&self) -> FlatMap {
        let mut flat = FlatMap::new();
        for (path, values) in self.branches() {
            flat.insert(path.key(), values.to_vec());
        }
        flat
    }

    pub fn from_flat_map(flat: &FlatMap) -> TreeResult<DataTree> {
        let mut tree = DataTree::new();
        for (key, values) in flat.iter() {
            let path = TreePath::parse(key)?;
            tree.set_data_at_path(values.to_vec(), &path)?;
        }
        Ok(tree)
    }

    /// Release every resource handle held by this tree, then drop all branches.
    ///
    /// Returns how many handles were actually released by this call.
    pub fn release_resources(&mut self) -> usize {
        let mut released = 0;
        let mut release = |h: &ResourceHandle| {
            if h.release() {
                released += 1;
            }
        };
        for branch in &self.branches {
            for value in &branch.values {
                value.for_each_handle(&mut release);
            }
        }
        *self = DataTree::new();
        released
    }

    fn branch_for_write(&mut self, path: &[u32]) -> TreeResult<BranchId> {
        if path.is_empty() {
            return Err(TreeError::invalid_path(
                "{}",
                "the root branch cannot hold data",
            ));
        }
        Ok(self.ensure_branch(path))
    }

    /// Replace values at a path known to be non-empty.
    fn write_unchecked(&mut self, values: Vec<Value>, path: &[u32]) {
        let id = self.ensure_branch(path);
        self.branches[id.index()].values = values;
    }

    fn find_child(&self, parent: BranchId, segment: u32) -> Option<BranchId> {
        let mut cur = self.branches[parent.index()].first_child;
        while cur.is_valid() {
            let branch = &self.branches[cur.index()];
            if branch.segment == segment {
                return Some(cur);
            }
            cur = branch.next_sibling;
        }
        None
    }

    fn find_branch(&self, path: &[u32]) -> Option<BranchId> {
        path.iter()
            .try_fold(BranchId::ROOT, |id, &segment| self.find_child(id, segment))
    }

    fn ensure_branch(&mut self, path: &[u32]) -> BranchId {
        let mut id = BranchId::ROOT;
        for &segment in path {
            id = match self.find_child(id, segment) {
                Some(child) => child,
                None => self.add_child(id, segment),
            };
        }
        id
    }

    fn add_child(&mut self, parent: BranchId, segment: u32) -> BranchId {
        let id = BranchId(self.branches.len() as u32);
        let depth = self.branches[parent.index()].depth + 1;
        self.branches.push(Branch::new(segment, depth, parent));

        // Link at the end of the parent's child list
        let last = self.branches[parent.index()].last_child;
        if last.is_valid() {
            self.branches[last.index()].next_sibling = id;
        } else {
            self.branches[parent.index()].first_child = id;
        }
        self.branches[parent.index()].last_child = id;
        id
    }

    fn push_children_reversed(&self, parent: BranchId, stack: &mut Vec<BranchId>) {
        let start = stack.len();
        let mut cur = self.branches[parent.index()].first_child;
        while cur.is_valid() {
            stack.push(cur);
            cur = self.branches[cur.index()].next_sibling;
        }
        stack[start..].reverse();
    }

    fn path_of(&self, id: BranchId) -> TreePath {
        let mut segments = Vec::with_capacity(self.branches[id.index()].depth as usize);
        let mut cur = id;
        while cur.is_valid() && cur != BranchId::ROOT {
            let branch = &self.branches[cur.index()];
            segments.push(branch.segment);
            cur = branch.parent;
        }
        segments.reverse();
        TreePath::new(segments)
    }
}

/// Pre-order iterator over non-empty branches. See [`DataTree::branches`].
pub struct Branches<'a> {
    tree: &'a DataTree,
    stack: Vec<BranchId>,
}

impl<'a> Iterator for Branches<'a> {
    type Item = (TreePath, &'a [Value]);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            self.tree.push_children_reversed(id, &mut self.stack);
            let values = &self.tree.branches[id.index()].values;
            if !values.is_empty() {
                return Some((self.tree.path_of(id), values.as_slice()));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nums(values: &[f64]) -> Vec<Value> {
        values.iter().map(|&n| Value::from(n)).collect()
    }

    fn traversal(tree: &DataTree) -> Vec<(String, Vec<Value>)> {
        tree.branches()
            .map(|(p, v)| (p.key(), v.to_vec()))
            .collect()
    }

    #[test]
    fn test_from_values_lives_at_first_branch() {
        let tree = DataTree::from_values(nums(&[1.0, 2.0]));
        assert_eq!(tree.data_at_path(&[0]), nums(&[1.0, 2.0]).as_slice());
        assert_eq!(tree.branch_count(), 1);
    }

    #[test]
    fn test_set_replaces_append_concatenates() {
        let mut tree = DataTree::new();
        tree.set_data_at_path(nums(&[1.0]), &[0, 1]).unwrap();
        tree.append_at_path(nums(&[2.0]), &[0, 1]).unwrap();
        assert_eq!(tree.data_at_path(&[0, 1]), nums(&[1.0, 2.0]).as_slice());

        tree.set_data_at_path(nums(&[9.0]), &[0, 1]).unwrap();
        assert_eq!(tree.data_at_path(&[0, 1]), nums(&[9.0]).as_slice());
        // intermediate branch exists but holds nothing
        assert!(tree.data_at_path(&[0]).is_empty());
    }

    #[test]
    fn test_root_cannot_hold_data() {
        let mut tree = DataTree::new();
        assert!(matches!(
            tree.set_data_at_path(nums(&[1.0]), &[]),
            Err(TreeError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_absent_path_is_empty() {
        let tree = DataTree::from_values(nums(&[1.0]));
        assert!(tree.data_at_path(&[4, 2]).is_empty());
    }

    #[test]
    fn test_traversal_is_preorder_in_insertion_order() {
        let mut tree = DataTree::new();
        tree.set_data_at_path(nums(&[1.0]), &[1]).unwrap();
        tree.set_data_at_path(nums(&[2.0]), &[0, 5]).unwrap();
        tree.set_data_at_path(nums(&[3.0]), &[0]).unwrap();
        tree.set_data_at_path(nums(&[4.0]), &[0, 2]).unwrap();
        tree.set_data_at_path(nums(&[5.0]), &[1, 0]).unwrap();

        let keys: Vec<String> = traversal(&tree).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["1", "1;0", "0", "0;5", "0;2"]);
    }

    #[test]
    fn test_flatten_then_graft() {
        let mut tree = DataTree::new();
        tree.set_data_at_path(nums(&[1.0, 2.0]), &[0]).unwrap();
        tree.set_data_at_path(nums(&[3.0]), &[1]).unwrap();

        let flat = tree.flatten();
        assert_eq!(traversal(&flat), vec![("0".to_string(), nums(&[1.0, 2.0, 3.0]))]);

        let grafted = flat.graft();
        assert_eq!(
            traversal(&grafted),
            vec![
                ("0;0".to_string(), nums(&[1.0])),
                ("0;1".to_string(), nums(&[2.0])),
                ("0;2".to_string(), nums(&[3.0])),
            ]
        );
        // receiver untouched
        assert_eq!(tree.branch_count(), 2);
    }

    #[test]
    fn test_flatten_to_path() {
        let tree = DataTree::from_values(nums(&[1.0]));
        let flat = tree.flatten_to(&[2, 1]).unwrap();
        assert_eq!(flat.data_at_path(&[2, 1]), nums(&[1.0]).as_slice());
        assert!(tree.flatten_to(&[]).is_err());
    }

    #[test]
    fn test_map_fans_out_lists() {
        let tree = DataTree::from_values(nums(&[1.0, 2.0]));
        let mapped = tree.map(|v| {
            let n = v.as_f64().unwrap_or_default();
            Value::List(vec![Value::from(n), Value::from(n * 10.0)])
        });
        assert_eq!(
            traversal(&mapped),
            vec![
                ("0;0".to_string(), nums(&[1.0, 10.0])),
                ("0;1".to_string(), nums(&[2.0, 20.0])),
            ]
        );

        let doubled = tree.map(|v| Value::from(v.as_f64().unwrap_or_default() * 2.0));
        assert_eq!(traversal(&doubled), vec![("0".to_string(), nums(&[2.0, 4.0]))]);
    }

    #[test]
    fn test_max_path_depth_counts_empty_leaves() {
        let mut tree = DataTree::new();
        assert_eq!(tree.max_path_depth(), 1);
        tree.set_data_at_path(nums(&[1.0]), &[0]).unwrap();
        assert_eq!(tree.max_path_depth(), 1);
        tree.set_data_at_path(Vec::new(), &[0, 0, 0]).unwrap();
        assert_eq!(tree.max_path_depth(), 3);
    }

    #[test]
    fn test_flat_map_round_trip() {
        let mut tree = DataTree::new();
        tree.set_data_at_path(nums(&[1.0]), &[1, 0]).unwrap();
        tree.set_data_at_path(nums(&[2.0, 3.0]), &[0]).unwrap();
        let restored = DataTree::from_flat_map(&tree.to_flat_map()).unwrap();
        assert_eq!(traversal(&restored), traversal(&tree));
    }

    #[test]
    fn test_from_flat_map_rejects_bad_key() {
        let mut flat = FlatMap::new();
        flat.insert("0;x", nums(&[1.0]));
        assert!(DataTree::from_flat_map(&flat).is_err());
    }

    #[test]
    fn test_set_item_pads_with_null() {
        let mut tree = DataTree::new();
        tree.set_item_at(Value::from("z"), &[0], 2).unwrap();
        assert_eq!(
            tree.data_at_path(&[0]),
            &[Value::Null, Value::Null, Value::from("z")]
        );
        assert_eq!(tree.data_at_path_filtered(&[0]).count(), 1);
    }

    #[test]
    fn test_concat_from() {
        let mut a = DataTree::from_values(nums(&[1.0]));
        let mut b = DataTree::from_values(nums(&[2.0]));
        b.set_data_at_path(nums(&[3.0]), &[1]).unwrap();
        a.concat_from(&b);
        assert_eq!(
            traversal(&a),
            vec![
                ("0".to_string(), nums(&[1.0, 2.0])),
                ("1".to_string(), nums(&[3.0])),
            ]
        );
    }
}
