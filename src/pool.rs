//! Node pool: a single-owner, bump-plus-freelist allocator for [`Node`]s.
//!
//! One pool belongs to exactly one tree. `acquire` hands out a fresh,
//! zeroed-equivalent node (either reused from the freelist or newly grown
//! into the arena); `release` returns a node's storage to the freelist.
//! Nodes are addressed by [`NodeId`], a stable index into the arena rather
//! than a pointer — the arena `Vec` is free to reallocate on growth without
//! invalidating any `NodeId` a tree is holding onto, which is what lets the
//! tree keep its root reference stable across splits and collapses without
//! `unsafe`.

use crate::error::BtreeError;
use crate::node::Node;

/// A stable handle to a node owned by a [`Pool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Arena allocator for `Node<K, V>` records.
#[derive(Debug)]
pub struct Pool<K, V> {
    slots: Vec<Node<K, V>>,
    free: Vec<NodeId>,
    max_degree: usize,
}

impl<K, V> Pool<K, V> {
    pub(crate) fn new(max_degree: usize) -> Self {
        Pool {
            slots: Vec::new(),
            free: Vec::new(),
            max_degree,
        }
    }

    /// Hands out a fresh, empty leaf node (`degree = 0, height = 0`).
    pub(crate) fn acquire(&mut self) -> Result<NodeId, BtreeError> {
        if let Some(id) = self.free.pop() {
            self.slots[id.index()] = Node::empty(self.max_degree);
            return Ok(id);
        }

        if self.slots.len() == self.slots.capacity() {
            self.slots
                .try_reserve(1)
                .map_err(|_| BtreeError::AllocationFailed)?;
        }
        let id = NodeId(self.slots.len() as u32);
        self.slots.push(Node::empty(self.max_degree));
        Ok(id)
    }

    /// Returns a node's storage to the freelist, dropping its contents.
    pub(crate) fn release(&mut self, id: NodeId) {
        self.slots[id.index()] = Node::empty(self.max_degree);
        self.free.push(id);
    }

    pub(crate) fn get(&self, id: NodeId) -> &Node<K, V> {
        &self.slots[id.index()]
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut Node<K, V> {
        &mut self.slots[id.index()]
    }

    /// Number of live (non-freed) node slots, for diagnostics/tests.
    #[cfg(test)]
    pub(crate) fn live_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}
