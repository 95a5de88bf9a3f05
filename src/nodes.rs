use std::collections::HashMap;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

/// Canonical electrical node. Node 0 is always ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The ground node (always index 0).
    pub const GROUND: NodeId = NodeId(0);

    pub fn is_ground(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ground() {
            write!(f, "gnd")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Union-find over terminal slots with union-by-rank and path compression.
///
/// Every terminal of every component occupies one slot and slot 0 is ground.
/// [`NodeResolver::assign`] numbers the sets by walking the slots in order, so
/// the numbering never depends on the order in which unions were applied.
#[derive(Debug, Clone)]
pub struct NodeResolver {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl Default for NodeResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeResolver {
    /// Slot reserved for ground.
    pub const GROUND_SLOT: usize = 0;

    pub fn new() -> Self {
        NodeResolver {
            parent: vec![Self::GROUND_SLOT],
            rank: vec![0],
        }
    }

    /// Allocate `count` fresh singleton slots and return the first one.
    pub fn add_slots(&mut self, count: usize) -> usize {
        let first = self.parent.len();
        for slot in first..first + count {
            self.parent.push(slot);
            self.rank.push(0);
        }
        first
    }

    /// Number of slots including ground.
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.len() == 1
    }

    /// Representative of `slot`, compressing the path on the way.
    pub fn find(&mut self, slot: usize) -> usize {
        let root = self.root(slot);
        let mut current = slot;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    /// Representative of `slot` without mutating the forest.
    pub fn root(&self, slot: usize) -> usize {
        let mut current = slot;
        while self.parent[current] != current {
            current = self.parent[current];
        }
        current
    }

    /// Merge the sets of `a` and `b`. Returns false if they were already merged.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return false;
        }

        match self.rank[root_a].cmp(&self.rank[root_b]) {
            std::cmp::Ordering::Less => self.parent[root_a] = root_b,
            std::cmp::Ordering::Greater => self.parent[root_b] = root_a,
            std::cmp::Ordering::Equal => {
                self.parent[root_b] = root_a;
                self.rank[root_a] += 1;
            }
        }
        true
    }

    pub fn same(&self, a: usize, b: usize) -> bool {
        self.root(a) == self.root(b)
    }

    /// Number every set: ground's set is 0, the others are numbered from 1 in
    /// slot order.
    pub fn assign(&self) -> NodeAssignment {
        let mut ids: HashMap<usize, NodeId> = HashMap::new();
        ids.insert(self.root(Self::GROUND_SLOT), NodeId::GROUND);

        let mut next = 1;
        let mut nodes = Vec::with_capacity(self.len());
        nodes.push(NodeId::GROUND);

        for slot in 1..self.len() {
            let root = self.root(slot);
            let id = *ids.entry(root).or_insert_with(|| {
                let id = NodeId(next);
                next += 1;
                id
            });
            nodes.push(id);
        }

        debug!("Assigned {} non-ground nodes over {} terminals", next - 1, self.len() - 1);

        NodeAssignment {
            nodes,
            node_count: next - 1,
        }
    }
}

/// Result of node assignment: the node of every slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAssignment {
    nodes: Vec<NodeId>,
    node_count: usize,
}

impl NodeAssignment {
    pub fn node(&self, slot: usize) -> Option<NodeId> {
        self.nodes.get(slot).copied()
    }

    /// Nodes of `count` consecutive slots starting at `first`.
    pub fn nodes(&self, first: usize, count: usize) -> &[NodeId] {
        &self.nodes[first..first + count]
    }

    /// Number of non-ground nodes
    pub fn node_count(&self) -> usize {
        self.node_count
    }
}
