//! Type-safe identifier wrappers for nodes, decisions, expressions, and variables.
//!
//! All four id spaces are append-only: an id, once handed out, stays valid for
//! the lifetime of the owning [`Xadd`][crate::xadd::Xadd] manager and is never
//! reused.

use std::fmt;

/// Identifier of a node in the diagram (leaf or internal).
///
/// Ids 0 and 1 are reserved for the constant-zero and constant-one leaves,
/// which exist from manager construction onward.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// The constant-zero leaf.
    pub const ZERO: NodeId = NodeId(0);
    /// The constant-one leaf.
    pub const ONE: NodeId = NodeId(1);

    pub(crate) const fn new(index: u32) -> Self {
        NodeId(index)
    }

    /// Raw index into the node store.
    pub const fn index(self) -> u32 {
        self.0
    }

    pub const fn is_const(self) -> bool {
        self.0 <= 1
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Identifier of a registered decision.
///
/// Decisions are ordered by registration index; that order is the diagram's
/// variable order. On every root-to-leaf path, decision ids strictly increase.
///
/// For printing and debugging, decision ids are shown offset by
/// [`DecisionId::DISPLAY_BASE`] so they cannot be confused with node ids.
/// The offset is cosmetic only.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DecisionId(u32);

impl DecisionId {
    /// Offset applied when displaying a decision id.
    pub const DISPLAY_BASE: u32 = 10_000;

    pub(crate) const fn new(index: u32) -> Self {
        DecisionId(index)
    }

    /// Raw registration index.
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DecisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d{}", self.0 + Self::DISPLAY_BASE)
    }
}

/// Identifier of an interned canonical expression.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ExprId(u32);

impl ExprId {
    pub(crate) const fn new(index: u32) -> Self {
        ExprId(index)
    }

    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Identifier of a declared variable (Boolean or continuous).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VarId(u32);

impl VarId {
    pub(crate) const fn new(index: u32) -> Self {
        VarId(index)
    }

    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_constants() {
        assert_eq!(NodeId::ZERO.index(), 0);
        assert_eq!(NodeId::ONE.index(), 1);
        assert!(NodeId::ZERO.is_const());
        assert!(NodeId::ONE.is_const());
        assert!(!NodeId::new(2).is_const());
    }

    #[test]
    fn test_decision_id_display_offset() {
        let d = DecisionId::new(3);
        assert_eq!(d.index(), 3);
        assert_eq!(d.to_string(), "d10003");
    }

    #[test]
    fn test_id_ordering() {
        assert!(DecisionId::new(1) < DecisionId::new(2));
        assert!(NodeId::ZERO < NodeId::ONE);
    }
}
