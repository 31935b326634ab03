//! Hash-consed node store.
//!
//! The store owns every node of every diagram and hands out stable
//! [`NodeId`]s. Interning guarantees the global sharing invariant: no two
//! distinct internal nodes have the same `(decision, low, high)` triple, and
//! no two leaves carry the same expression. The store is append-only; ids
//! are never reused and never dangle.

use hashbrown::HashMap;
use log::debug;

use crate::node::Node;
use crate::types::{DecisionId, ExprId, NodeId};

pub struct NodeStore {
    nodes: Vec<Node>,
    index: HashMap<Node, NodeId>,
}

impl Default for NodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStore {
    pub fn new() -> Self {
        NodeStore { nodes: Vec::new(), index: HashMap::new() }
    }

    /// Number of nodes ever created.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Node {
        self.nodes[id.index() as usize]
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.get(id).is_leaf()
    }

    /// Decision at the root of `id`, `None` for leaves.
    pub fn decision(&self, id: NodeId) -> Option<DecisionId> {
        self.get(id).decision()
    }

    /// Interns the terminal carrying `expr`.
    pub fn intern_leaf(&mut self, expr: ExprId) -> NodeId {
        self.intern(Node::Leaf(expr))
    }

    /// Interns an internal node. The caller (always the reduction layer)
    /// must have collapsed `low == high` already.
    pub fn intern_internal(&mut self, dec: DecisionId, low: NodeId, high: NodeId) -> NodeId {
        assert_ne!(low, high, "internal node with equal children");
        self.intern(Node::Internal { dec, low, high })
    }

    fn intern(&mut self, node: Node) -> NodeId {
        if let Some(&id) = self.index.get(&node) {
            return id;
        }
        let id = NodeId::new(self.nodes.len() as u32);
        debug!("intern {:?} -> {}", node, id);
        self.nodes.push(node);
        self.index.insert(node, id);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DecisionId;

    #[test]
    fn test_leaf_interning_is_stable() {
        let mut store = NodeStore::new();
        let a = store.intern_leaf(ExprId::new(0));
        let b = store.intern_leaf(ExprId::new(1));
        let c = store.intern_leaf(ExprId::new(0));
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_internal_interning_is_stable() {
        let mut store = NodeStore::new();
        let zero = store.intern_leaf(ExprId::new(0));
        let one = store.intern_leaf(ExprId::new(1));
        let d = DecisionId::new(0);

        let n1 = store.intern_internal(d, zero, one);
        let n2 = store.intern_internal(d, zero, one);
        assert_eq!(n1, n2);
        assert_eq!(store.len(), 3);

        let n3 = store.intern_internal(d, one, zero);
        assert_ne!(n1, n3);
    }

    #[test]
    #[should_panic(expected = "equal children")]
    fn test_equal_children_rejected() {
        let mut store = NodeStore::new();
        let zero = store.intern_leaf(ExprId::new(0));
        store.intern_internal(DecisionId::new(0), zero, zero);
    }
}
