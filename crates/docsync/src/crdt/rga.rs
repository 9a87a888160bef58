//! RGA (Replicated Growable Array) list backing [`ArrayElement`].
//!
//! Uses a linear `Vec<RgaNode>` with a dummy head at index 0 rather than a
//! balanced tree. Every operation is O(n) in the number of nodes, tombstones
//! included, which is correct but not optimised for very large arrays.
//!
//! Nodes are addressed by the `created_at` ticket of the element they hold.
//! Removal never touches this list: a removed element keeps its node so it
//! stays a valid anchor for later inserts.
//!
//! [`ArrayElement`]: super::element::ArrayElement

use crate::error::ApplyError;
use crate::time::{Ticket, INITIAL_TICKET};

// ── RgaNode ────────────────────────────────────────────────────────────────

/// One link in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgaNode {
    /// Identity of the element held by this node.
    pub created_at: Ticket,
    /// Ticket of the move that last placed this node, if any.
    pub moved_at: Option<Ticket>,
}

impl RgaNode {
    fn new(created_at: Ticket) -> Self {
        Self {
            created_at,
            moved_at: None,
        }
    }

    /// Ticket that decides the order among siblings inserted after the same
    /// anchor.
    pub fn positioned_at(&self) -> Ticket {
        self.moved_at.unwrap_or(self.created_at)
    }
}

// ── RgaList ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RgaList {
    /// `nodes[0]` is the head, identified by [`INITIAL_TICKET`].
    nodes: Vec<RgaNode>,
}

impl Default for RgaList {
    fn default() -> Self {
        Self::new()
    }
}

impl RgaList {
    pub fn new() -> Self {
        Self {
            nodes: vec![RgaNode::new(INITIAL_TICKET)],
        }
    }

    /// Ticket that addresses the position before the first element.
    pub const fn head() -> Ticket {
        INITIAL_TICKET
    }

    fn position_of(&self, created_at: &Ticket) -> Option<usize> {
        self.nodes.iter().position(|n| n.created_at == *created_at)
    }

    /// `true` if `created_at` is the head or a node of this list.
    pub fn contains(&self, created_at: &Ticket) -> bool {
        self.position_of(created_at).is_some()
    }

    pub fn node(&self, created_at: &Ticket) -> Option<&RgaNode> {
        self.position_of(created_at)
            .filter(|&i| i > 0)
            .map(|i| &self.nodes[i])
    }

    /// Index right after `prev_created_at` at which an event stamped
    /// `executed_at` lands.
    ///
    /// Successors positioned after `executed_at` were concurrent with it and
    /// win the spot closest to the anchor, so they are skipped.
    fn insertion_index(&self, prev_created_at: &Ticket, executed_at: &Ticket) -> Result<usize, ApplyError> {
        let anchor = self
            .position_of(prev_created_at)
            .ok_or(ApplyError::NotFound(*prev_created_at))?;
        let mut pos = anchor + 1;
        while pos < self.nodes.len() && self.nodes[pos].positioned_at().after(executed_at) {
            pos += 1;
        }
        Ok(pos)
    }

    /// Link `created_at` right after `prev_created_at`.
    ///
    /// A missing anchor means a causally earlier operation has not been
    /// applied yet and is reported as [`ApplyError::NotFound`].
    pub fn insert_after(
        &mut self,
        prev_created_at: &Ticket,
        created_at: Ticket,
        executed_at: &Ticket,
    ) -> Result<(), ApplyError> {
        let pos = self.insertion_index(prev_created_at, executed_at)?;
        self.nodes.insert(pos, RgaNode::new(created_at));
        Ok(())
    }

    /// Re-link `created_at` after `prev_created_at`.
    ///
    /// Last mover wins by ticket: a move older than the node's current
    /// `moved_at` is ignored. Returns whether the node moved.
    pub fn move_after(
        &mut self,
        prev_created_at: &Ticket,
        created_at: &Ticket,
        executed_at: &Ticket,
    ) -> Result<bool, ApplyError> {
        let from = self
            .position_of(created_at)
            .filter(|&i| i > 0)
            .ok_or(ApplyError::NotFound(*created_at))?;
        if !self.contains(prev_created_at) {
            return Err(ApplyError::NotFound(*prev_created_at));
        }
        if prev_created_at == created_at {
            return Ok(false);
        }
        let mut node = self.nodes[from];
        if node.moved_at.is_some_and(|moved| !executed_at.after(&moved)) {
            return Ok(false);
        }
        self.nodes.remove(from);
        let pos = self.insertion_index(prev_created_at, executed_at)?;
        node.moved_at = Some(*executed_at);
        self.nodes.insert(pos, node);
        Ok(true)
    }

    /// Drop the node for a purged element. Returns whether it was present.
    pub fn purge(&mut self, created_at: &Ticket) -> bool {
        match self.position_of(created_at).filter(|&i| i > 0) {
            Some(i) => {
                self.nodes.remove(i);
                true
            }
            None => false,
        }
    }

    /// Element tickets in chain order, tombstones included, head excluded.
    pub fn iter(&self) -> impl Iterator<Item = Ticket> + '_ {
        self.nodes[1..].iter().map(|n| n.created_at)
    }

    /// Ticket of the last node in the chain (the head when empty).
    pub fn last_created_at(&self) -> Ticket {
        self.nodes.last().map_or(INITIAL_TICKET, |n| n.created_at)
    }

    /// Number of nodes, tombstones included.
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1
    }
}
