//! The public tree surface: construction, lookup, insert, delete.
//!
//! Algorithms here are translated from `examples/original_source/src/btree.h`
//! case-by-case, per spec.md §4.3 — the delete rebalance loop in particular
//! mirrors the C source's sibling-choice and borrow/merge logic directly,
//! since the near-symmetric cases are exactly where a from-scratch rewrite
//! would be most likely to drift from the reference behavior.

use tracing::{instrument, trace};

use crate::error::BtreeError;
use crate::node::Slot;
use crate::order::{KeyOrder, NaturalOrder};
use crate::pool::{NodeId, Pool};

/// Bound on parent-stack depth during descent, matching the C source's
/// `BTREE_MAX_HEIGHT`. With `MIN_DEGREE >= 2` this is astronomically more
/// height than any real tree will ever reach.
const MAX_HEIGHT: usize = 128;

/// A balanced, pool-allocated multi-way search tree.
///
/// `K` is the key type, `V` the opaque value handle, `C` the comparator
/// (defaults to [`NaturalOrder`] for `K: Ord`).
pub struct Tree<K, V, C = NaturalOrder> {
    pool: Pool<K, V>,
    root: NodeId,
    max_degree: usize,
    min_degree: usize,
    len: usize,
    cmp: C,
}

impl<K: Clone + Ord, V> Tree<K, V, NaturalOrder> {
    /// Creates an empty tree ordered by `K`'s native [`Ord`] impl.
    pub fn new(max_degree: usize) -> Result<Self, BtreeError> {
        Self::with_comparator(max_degree, NaturalOrder)
    }
}

impl<K: Clone, V, C: KeyOrder<K>> Tree<K, V, C> {
    /// Creates an empty tree using a caller-supplied comparator.
    pub fn with_comparator(max_degree: usize, cmp: C) -> Result<Self, BtreeError> {
        if max_degree < 4 || max_degree % 2 != 0 {
            return Err(BtreeError::InvalidMaxDegree(max_degree));
        }
        let mut pool = Pool::new(max_degree);
        let root = pool.acquire()?;
        Ok(Tree {
            pool,
            root,
            max_degree,
            min_degree: max_degree / 2,
            len: 0,
            cmp,
        })
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` iff the tree holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The root node's height tag (0 for a leaf-only tree).
    pub fn height(&self) -> u16 {
        self.pool.get(self.root).height
    }

    /// Checks the five structural invariants from spec.md §8 against the
    /// current tree, for use by tests. Not part of the normal operational
    /// surface — gated behind `cfg(test)` (inline unit tests) or the
    /// `test-introspection` feature (black-box integration tests, which
    /// build as their own crate and so don't inherit `cfg(test)` from here).
    #[cfg(any(test, feature = "test-introspection"))]
    pub fn check_invariants(&self) -> Result<(), String> {
        let mut visited = std::collections::HashSet::new();
        let mut leaf_depth: Option<usize> = None;
        self.check_node(self.root, 0, &mut visited, &mut leaf_depth, None, None)
    }

    #[cfg(any(test, feature = "test-introspection"))]
    fn check_node(
        &self,
        id: NodeId,
        depth: usize,
        visited: &mut std::collections::HashSet<NodeId>,
        leaf_depth: &mut Option<usize>,
        lower: Option<K>,
        upper: Option<K>,
    ) -> Result<(), String> {
        if !visited.insert(id) {
            return Err(format!("{id:?} is reachable via more than one path"));
        }
        let is_root = id == self.root;
        let degree = self.pool.get(id).degree as usize;
        if !is_root && !(self.min_degree..=self.max_degree).contains(&degree) {
            return Err(format!(
                "non-root node has degree {degree}, expected [{}, {}]",
                self.min_degree, self.max_degree
            ));
        }

        if self.pool.get(id).is_leaf() {
            match *leaf_depth {
                None => *leaf_depth = Some(depth),
                Some(d) if d != depth => {
                    return Err(format!("leaf at depth {depth}, expected depth {d}"));
                }
                _ => {}
            }
            let mut prev: Option<&K> = None;
            for k in self.pool.get(id).keys.iter() {
                if let Some(p) = prev {
                    if !self.cmp.less_than(p, k) {
                        return Err("leaf keys are not strictly ascending".into());
                    }
                }
                if let Some(ref lo) = lower {
                    if self.cmp.less_than(k, lo) {
                        return Err("leaf key falls below its subtree's lower bound".into());
                    }
                }
                if let Some(ref hi) = upper {
                    if !self.cmp.less_than(k, hi) {
                        return Err("leaf key does not fall below its subtree's upper bound".into());
                    }
                }
                prev = Some(k);
            }
            return Ok(());
        }

        for i in 0..degree {
            let child = self.pool.get(id).children[i].as_child();
            let child_lower = if i == 0 {
                lower.clone()
            } else {
                Some(self.pool.get(id).keys[i].clone())
            };
            let child_upper = if i + 1 < degree {
                Some(self.pool.get(id).keys[i + 1].clone())
            } else {
                upper.clone()
            };
            self.check_node(child, depth + 1, visited, leaf_depth, child_lower, child_upper)?;
        }
        Ok(())
    }

    /// Looks up `key`, returning its value if present.
    #[instrument(level = "trace", skip(self, key))]
    pub fn get(&self, key: &K) -> Option<&V> {
        let mut current = self.root;
        loop {
            let node = self.pool.get(current);
            if node.degree == 0 {
                return None;
            }
            let idx = node.locate(key, &self.cmp);
            if node.is_leaf() {
                return if self.cmp.equals(key, &node.keys[idx]) {
                    Some(node.children[idx].as_value_ref())
                } else {
                    None
                };
            }
            current = node.children[idx].as_child();
        }
    }

    /// Inserts `(key, value)`. Behavior when `key` is already present is
    /// undefined by spec (see DESIGN.md) — the tree will not corrupt itself,
    /// but a later `get` may return either copy.
    #[instrument(level = "trace", skip(self, key, value))]
    pub fn insert(&mut self, key: K, value: V) -> Result<(), BtreeError> {
        // Fast path: empty tree.
        {
            let root = self.pool.get(self.root);
            if root.height == 0 && root.degree == 0 {
                let root = self.pool.get_mut(self.root);
                root.keys.push(key);
                root.children.push(Slot::Value(value));
                root.degree = 1;
                self.len += 1;
                return Ok(());
            }
        }

        // Descend to a leaf, remembering the path.
        let mut stack: Vec<NodeId> = Vec::new();
        let mut current = self.root;
        while self.pool.get(current).height > 0 {
            if stack.len() >= MAX_HEIGHT {
                return Err(BtreeError::HeightOverflow { max: MAX_HEIGHT });
            }
            let idx = self.pool.get(current).locate(&key, &self.cmp);
            stack.push(current);
            current = self.pool.get(current).children[idx].as_child();
        }

        let mut insert_key = key;
        let mut insert_slot: Slot<V> = Slot::Value(value);

        loop {
            let (is_leaf, start, degree) = {
                let node = self.pool.get(current);
                (node.is_leaf(), if node.is_leaf() { 0 } else { 1 }, node.degree)
            };

            if (degree as usize) < self.max_degree {
                let node = self.pool.get(current);
                let i = node.insertion_index(&insert_key, start, &self.cmp);
                let node = self.pool.get_mut(current);
                node.keys.insert(i, insert_key);
                node.children.insert(i, insert_slot);
                node.degree += 1;
                self.len += 1;
                trace!(leaf = is_leaf, degree = node.degree, "inserted without split");
                return Ok(());
            }

            // Full: split. Compute where the new entry would land among the
            // node's current (full) entries, then split the conceptual
            // (max_degree + 1)-length sequence in two.
            let i = {
                let node = self.pool.get(current);
                node.insertion_index(&insert_key, start, &self.cmp)
            };
            let sibling_id = self.pool.acquire()?;

            let node = self.pool.get_mut(current);
            node.keys.insert(i, insert_key);
            node.children.insert(i, insert_slot);

            let total = self.max_degree + 1;
            let lower_count = total - total / 2;
            let upper_keys = node.keys.split_off(lower_count);
            let upper_children = node.children.split_off(lower_count);
            let height = node.height;
            node.degree = node.keys.len() as u16;

            let sibling = self.pool.get_mut(sibling_id);
            sibling.height = height;
            sibling.degree = upper_keys.len() as u16;
            sibling.keys = upper_keys;
            sibling.children = upper_children;

            trace!(
                lower = self.pool.get(current).degree,
                upper = self.pool.get(sibling_id).degree,
                "split node"
            );

            insert_key = self.pool.get(sibling_id).keys[0].clone();
            insert_slot = Slot::Child(sibling_id);

            match stack.pop() {
                Some(parent) => {
                    current = parent;
                    continue;
                }
                None => {
                    // Splitting the root: copy its contents into a fresh
                    // node so the root's own identity (NodeId) survives.
                    let copy_id = self.pool.acquire()?;
                    let (old_keys, old_children, old_height, old_degree) = {
                        let root = self.pool.get_mut(current);
                        (
                            std::mem::take(&mut root.keys),
                            std::mem::take(&mut root.children),
                            root.height,
                            root.degree,
                        )
                    };
                    {
                        let copy = self.pool.get_mut(copy_id);
                        copy.height = old_height;
                        copy.degree = old_degree;
                        copy.keys = old_keys;
                        copy.children = old_children;
                    }
                    let root = self.pool.get_mut(current);
                    root.height = old_height + 1;
                    root.degree = 2;
                    // keys[0] is don't-care; duplicating the promoted key is
                    // cheap and never read back (spec.md §3/§9).
                    root.keys = vec![insert_key.clone(), insert_key];
                    root.children = vec![Slot::Child(copy_id), Slot::Child(sibling_id)];
                    self.len += 1;
                    trace!(height = root.height, "root split, height increased");
                    return Ok(());
                }
            }
        }
    }

    /// Removes `key`, returning its value if present.
    #[instrument(level = "trace", skip(self, key))]
    pub fn delete(&mut self, key: &K) -> Option<V> {
        let mut stack: Vec<(NodeId, usize)> = Vec::new();
        let mut current = self.root;
        while self.pool.get(current).height > 0 {
            let idx = self.pool.get(current).locate(key, &self.cmp);
            stack.push((current, idx));
            current = self.pool.get(current).children[idx].as_child();
        }

        let leaf = self.pool.get(current);
        if leaf.degree == 0 {
            return None;
        }
        let i = leaf.locate(key, &self.cmp);
        if !self.cmp.equals(key, &leaf.keys[i]) {
            return None;
        }

        let node = self.pool.get_mut(current);
        node.keys.remove(i);
        let removed = node.children.remove(i).into_value();
        node.degree -= 1;
        self.len -= 1;

        self.rebalance(current, stack);
        trace!("deleted key");
        Some(removed)
    }

    /// The rebalance loop run after a leaf removal: borrow/merge/root
    /// collapse, walking up `stack` until some node is no longer underfull
    /// (spec.md §4.3.3).
    fn rebalance(&mut self, mut current: NodeId, mut stack: Vec<(NodeId, usize)>) {
        loop {
            if self.pool.get(current).degree >= self.min_degree as u16 {
                return;
            }

            let Some((parent, idx)) = stack.pop() else {
                // Root case.
                let root = self.pool.get(current);
                if root.degree >= 2 || root.height == 0 {
                    return;
                }
                self.collapse_root(current);
                return;
            };

            let parent_degree = self.pool.get(parent).degree as usize;
            if idx < parent_degree - 1 {
                let sibling = self.pool.get(parent).children[idx + 1].as_child();
                if self.pool.get(sibling).degree > self.min_degree as u16 {
                    self.borrow_from_right(current, parent, idx, sibling);
                    return;
                }
                self.merge_with_right(current, parent, idx, sibling);
            } else {
                let sibling = self.pool.get(parent).children[idx - 1].as_child();
                if self.pool.get(sibling).degree > self.min_degree as u16 {
                    self.borrow_from_left(current, parent, idx, sibling);
                    return;
                }
                self.merge_with_left(current, parent, idx, sibling);
            }
            current = parent;
        }
    }

    /// Collapses a one-child internal root into its sole child, in place,
    /// preserving the root's own `NodeId`.
    fn collapse_root(&mut self, root: NodeId) {
        let only_child = self.pool.get(root).children[0].as_child();
        let (keys, children, height, degree) = {
            let child = self.pool.get_mut(only_child);
            (
                std::mem::take(&mut child.keys),
                std::mem::take(&mut child.children),
                child.height,
                child.degree,
            )
        };
        let node = self.pool.get_mut(root);
        node.keys = keys;
        node.children = children;
        node.height = height;
        node.degree = degree;
        self.pool.release(only_child);
        trace!(height, "collapsed root");
    }

    /// Right sibling has spare entries: move one across and fix up the
    /// parent separator (spec.md §4.3.3, "Borrow").
    fn borrow_from_right(&mut self, current: NodeId, parent: NodeId, idx: usize, sibling: NodeId) {
        if self.pool.get(current).is_leaf() {
            let (key, value) = {
                let sib = self.pool.get_mut(sibling);
                (sib.keys.remove(0), sib.children.remove(0))
            };
            let new_sep = self.pool.get(sibling).keys[0].clone();
            let cur = self.pool.get_mut(current);
            cur.keys.push(key);
            cur.children.push(value);
            cur.degree += 1;
            self.pool.get_mut(parent).keys[idx + 1] = new_sep;
        } else {
            let old_sep = self.pool.get(parent).keys[idx + 1].clone();
            let moved_child = self.pool.get_mut(sibling).children.remove(0);
            let new_sep = self.pool.get_mut(sibling).keys.remove(1);
            let cur = self.pool.get_mut(current);
            cur.keys.push(old_sep);
            cur.children.push(moved_child);
            cur.degree += 1;
            self.pool.get_mut(parent).keys[idx + 1] = new_sep;
        }
        let sib = self.pool.get_mut(sibling);
        sib.degree -= 1;
    }

    /// Left sibling has spare entries: move one across and fix up the
    /// parent separator.
    fn borrow_from_left(&mut self, current: NodeId, parent: NodeId, idx: usize, sibling: NodeId) {
        if self.pool.get(current).is_leaf() {
            let (key, value) = {
                let sib = self.pool.get_mut(sibling);
                let key = sib.keys.pop().unwrap();
                let value = sib.children.pop().unwrap();
                (key, value)
            };
            let cur = self.pool.get_mut(current);
            cur.keys.insert(0, key.clone());
            cur.children.insert(0, value);
            cur.degree += 1;
            self.pool.get_mut(parent).keys[idx] = key;
        } else {
            let (last_key, last_child) = {
                let sib = self.pool.get_mut(sibling);
                let key = sib.keys.pop().unwrap();
                let child = sib.children.pop().unwrap();
                (key, child)
            };
            let old_sep = self.pool.get(parent).keys[idx].clone();
            let cur = self.pool.get_mut(current);
            cur.keys.insert(0, last_key.clone());
            cur.keys[1] = old_sep;
            cur.children.insert(0, last_child);
            cur.degree += 1;
            self.pool.get_mut(parent).keys[idx] = last_key;
        }
        let sib = self.pool.get_mut(sibling);
        sib.degree -= 1;
    }

    /// Right sibling has exactly `MIN_DEGREE` entries: fuse it into
    /// `current` and drop the separator from the parent (spec.md §4.3.3,
    /// "Merge").
    fn merge_with_right(&mut self, current: NodeId, parent: NodeId, idx: usize, sibling: NodeId) {
        let is_leaf = self.pool.get(current).is_leaf();
        if is_leaf {
            let (sib_keys, sib_children) = {
                let sib = self.pool.get_mut(sibling);
                (
                    std::mem::take(&mut sib.keys),
                    std::mem::take(&mut sib.children),
                )
            };
            let cur = self.pool.get_mut(current);
            let sib_degree = sib_keys.len() as u16;
            cur.keys.extend(sib_keys);
            cur.children.extend(sib_children);
            cur.degree += sib_degree;
        } else {
            let sep = self.pool.get(parent).keys[idx + 1].clone();
            let (mut sib_keys, sib_children) = {
                let sib = self.pool.get_mut(sibling);
                (
                    std::mem::take(&mut sib.keys),
                    std::mem::take(&mut sib.children),
                )
            };
            let sib_degree = sib_keys.len() as u16;
            // slot 0 of the sibling is its own don't-care separator.
            sib_keys.remove(0);
            let cur = self.pool.get_mut(current);
            cur.keys.push(sep);
            cur.keys.extend(sib_keys);
            cur.children.extend(sib_children);
            cur.degree += sib_degree;
        }
        self.pool.release(sibling);

        let par = self.pool.get_mut(parent);
        par.keys.remove(idx + 1);
        par.children.remove(idx + 1);
        par.degree -= 1;
        trace!("merged with right sibling");
    }

    /// Left sibling has exactly `MIN_DEGREE` entries: fuse `current` into it
    /// and drop the separator from the parent.
    fn merge_with_left(&mut self, current: NodeId, parent: NodeId, idx: usize, sibling: NodeId) {
        let is_leaf = self.pool.get(current).is_leaf();
        let cur_degree = self.pool.get(current).degree;
        if is_leaf {
            let (cur_keys, cur_children) = {
                let cur = self.pool.get_mut(current);
                (
                    std::mem::take(&mut cur.keys),
                    std::mem::take(&mut cur.children),
                )
            };
            let sib = self.pool.get_mut(sibling);
            sib.keys.extend(cur_keys);
            sib.children.extend(cur_children);
            sib.degree += cur_degree;
        } else {
            let sep = self.pool.get(parent).keys[idx].clone();
            let (mut cur_keys, cur_children) = {
                let cur = self.pool.get_mut(current);
                (
                    std::mem::take(&mut cur.keys),
                    std::mem::take(&mut cur.children),
                )
            };
            // slot 0 of current is its own don't-care separator.
            cur_keys.remove(0);
            let sib = self.pool.get_mut(sibling);
            sib.keys.push(sep);
            sib.keys.extend(cur_keys);
            sib.children.extend(cur_children);
            sib.degree += cur_degree;
        }
        self.pool.release(current);

        let par = self.pool.get_mut(parent);
        // `current` was the parent's last child (that's why we borrowed
        // from the left in the first place) — just drop the last slot.
        par.keys.remove(idx);
        par.children.remove(idx);
        par.degree -= 1;
        trace!("merged with left sibling");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_tree_get_and_delete_are_not_found() {
        let tree: Tree<u32, &'static str> = Tree::new(4).unwrap();
        assert_eq!(tree.get(&1), None);
        assert!(tree.is_empty());
    }

    #[test]
    fn single_insert_then_delete_round_trips() {
        let mut tree: Tree<u32, &'static str> = Tree::new(4).unwrap();
        tree.insert(7, "d").unwrap();
        assert_eq!(tree.get(&7), Some(&"d"));
        assert_eq!(tree.height(), 0);
        assert_eq!(tree.delete(&7), Some("d"));
        assert_eq!(tree.height(), 0);
        assert!(tree.is_empty());
    }

    #[test]
    fn invalid_max_degree_rejected() {
        let tree: Result<Tree<u32, ()>, _> = Tree::new(3);
        assert!(matches!(tree, Err(BtreeError::InvalidMaxDegree(3))));
        let tree: Result<Tree<u32, ()>, _> = Tree::new(5);
        assert!(matches!(tree, Err(BtreeError::InvalidMaxDegree(5))));
    }

    #[test]
    fn scenario_s1_root_splits_after_five_inserts() {
        let mut tree: Tree<u32, &'static str> = Tree::new(4).unwrap();
        for (k, v) in [(1, "a"), (3, "b"), (5, "c"), (7, "d"), (9, "e")] {
            tree.insert(k, v).unwrap();
        }
        assert_eq!(tree.height(), 1);
        for (k, v) in [(1, "a"), (3, "b"), (5, "c"), (7, "d"), (9, "e")] {
            assert_eq!(tree.get(&k), Some(&v));
        }
    }

    #[test]
    fn scenario_s2_deleting_everything_empties_the_tree() {
        let mut tree: Tree<u32, &'static str> = Tree::new(4).unwrap();
        for (k, v) in [(1, "a"), (3, "b"), (5, "c"), (7, "d"), (9, "e")] {
            tree.insert(k, v).unwrap();
        }
        for (k, v) in [(1, "a"), (3, "b"), (9, "e"), (5, "c"), (7, "d")] {
            assert_eq!(tree.delete(&k), Some(v));
        }
        assert_eq!(tree.height(), 0);
        assert!(tree.is_empty());
    }
}
