//! Binary composition of two diagrams.
//!
//! `apply(f, g, op)` recurses over both operands simultaneously, splitting on
//! the smaller root decision, and combines leaf expressions with the scalar
//! operation at the bottom. Results are memoized per `(op, f, g)`; for
//! commutative operators the operand pair is ordered before the lookup so
//! both orientations share one entry.
//!
//! `min`/`max` and the relational operators may introduce new decisions at
//! the leaves. A reused decision can sit above the current split point, so
//! node emission repairs ordering on the fly, and the whole result is passed
//! through `make_canonical` for the operators that can introduce decisions.

use std::str::FromStr;

use log::debug;

use crate::decision::Rel;
use crate::error::{Result, XaddError};
use crate::node::Node;
use crate::types::{DecisionId, ExprId, NodeId};
use crate::xadd::Xadd;

/// The closed binary operator set.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Prod,
    Div,
    Min,
    Max,
    And,
    Or,
    Eq,
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
}

impl BinOp {
    pub fn name(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "subtract",
            BinOp::Prod => "prod",
            BinOp::Div => "div",
            BinOp::Min => "min",
            BinOp::Max => "max",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Eq => "==",
            BinOp::Neq => "!=",
            BinOp::Lt => "<",
            BinOp::Leq => "<=",
            BinOp::Gt => ">",
            BinOp::Geq => ">=",
        }
    }

    /// Operators for which `apply(f, g, op) == apply(g, f, op)`.
    pub fn is_commutative(self) -> bool {
        matches!(
            self,
            BinOp::Add
                | BinOp::Prod
                | BinOp::Min
                | BinOp::Max
                | BinOp::And
                | BinOp::Or
                | BinOp::Eq
                | BinOp::Neq
        )
    }

    /// Operators whose leaf cases can mint or reuse decisions, requiring a
    /// canonicalization pass over the final result.
    pub(crate) fn introduces_decisions(self) -> bool {
        matches!(
            self,
            BinOp::Min
                | BinOp::Max
                | BinOp::And
                | BinOp::Or
                | BinOp::Eq
                | BinOp::Neq
                | BinOp::Lt
                | BinOp::Leq
                | BinOp::Gt
                | BinOp::Geq
        )
    }

    pub(crate) fn code(self) -> u64 {
        self as u64
    }
}

impl FromStr for BinOp {
    type Err = XaddError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "add" => BinOp::Add,
            "subtract" => BinOp::Sub,
            "prod" => BinOp::Prod,
            "div" => BinOp::Div,
            "min" => BinOp::Min,
            "max" => BinOp::Max,
            "and" => BinOp::And,
            "or" => BinOp::Or,
            "==" => BinOp::Eq,
            "!=" => BinOp::Neq,
            "<" => BinOp::Lt,
            "<=" => BinOp::Leq,
            ">" => BinOp::Gt,
            ">=" => BinOp::Geq,
            _ => return Err(XaddError::UnknownOperator(s.to_string())),
        })
    }
}

impl Xadd {
    /// Composes two diagrams under `op`.
    pub fn apply(&mut self, f: NodeId, g: NodeId, op: BinOp) -> Result<NodeId> {
        debug!("apply(f = {}, g = {}, op = {})", f, g, op.name());
        let res = self.apply_rec(f, g, op)?;
        if op.introduces_decisions() {
            self.make_canonical(res)
        } else {
            Ok(res)
        }
    }

    pub fn apply_add(&mut self, f: NodeId, g: NodeId) -> Result<NodeId> {
        self.apply(f, g, BinOp::Add)
    }

    pub fn apply_sub(&mut self, f: NodeId, g: NodeId) -> Result<NodeId> {
        self.apply(f, g, BinOp::Sub)
    }

    pub fn apply_prod(&mut self, f: NodeId, g: NodeId) -> Result<NodeId> {
        self.apply(f, g, BinOp::Prod)
    }

    pub fn apply_min(&mut self, f: NodeId, g: NodeId) -> Result<NodeId> {
        self.apply(f, g, BinOp::Min)
    }

    pub fn apply_max(&mut self, f: NodeId, g: NodeId) -> Result<NodeId> {
        self.apply(f, g, BinOp::Max)
    }

    pub fn apply_and(&mut self, f: NodeId, g: NodeId) -> Result<NodeId> {
        self.apply(f, g, BinOp::And)
    }

    pub fn apply_or(&mut self, f: NodeId, g: NodeId) -> Result<NodeId> {
        self.apply(f, g, BinOp::Or)
    }

    pub(crate) fn apply_rec(&mut self, f: NodeId, g: NodeId, op: BinOp) -> Result<NodeId> {
        if let Some(res) = self.apply_shortcut(f, g, op) {
            debug!("apply_rec(f = {}, g = {}, op = {}): shortcut -> {}", f, g, op.name(), res);
            return Ok(res);
        }

        // Canonical operand order for commutative operators, before both the
        // memo lookup and the leaf case, so either orientation produces the
        // same decisions and shares one cache entry. Newest operand first:
        // a min/max between a derived value and one of its inputs then tests
        // `derived - input`, keeping the guard in the derived term's frame.
        let (f, g) = if op.is_commutative() && f < g { (g, f) } else { (f, g) };

        let key = (op.code(), f.index() as u64, g.index() as u64);
        if let Some(res) = self.apply_cache.get(&key) {
            return Ok(res);
        }

        let nf = self.store.get(f);
        let ng = self.store.get(g);
        if let (Node::Leaf(ea), Node::Leaf(eb)) = (nf, ng) {
            return self.apply_leaves(f, ea, g, eb, op);
        }

        // Split on the smaller root decision.
        let d = match (nf.decision(), ng.decision()) {
            (Some(df), Some(dg)) => df.min(dg),
            (Some(df), None) => df,
            (None, Some(dg)) => dg,
            (None, None) => unreachable!("leaf/leaf handled above"),
        };
        let (fl, fh) = self.cofactors(f, d);
        let (gl, gh) = self.cofactors(g, d);

        let lo = self.apply_rec(fl, gl, op)?;
        let hi = self.apply_rec(fh, gh, op)?;
        let res = self.emit(d, lo, hi)?;
        debug!(
            "apply_rec(f = {}, g = {}, op = {}) -> {}",
            f,
            g,
            op.name(),
            res
        );

        self.apply_cache.insert(key, res);
        Ok(res)
    }

    /// Cofactors of `f` with respect to decision `d`: the children when `d`
    /// is the root decision, the node itself otherwise.
    pub(crate) fn cofactors(&self, f: NodeId, d: DecisionId) -> (NodeId, NodeId) {
        match self.store.get(f) {
            Node::Internal { dec, low, high } if dec == d => (low, high),
            _ => (f, f),
        }
    }

    /// Emits `(d ? high : low)`, repairing ordering when a reused decision
    /// from a leaf case surfaced above `d`.
    pub(crate) fn emit(&mut self, d: DecisionId, low: NodeId, high: NodeId) -> Result<NodeId> {
        let low_ok = self.store.decision(low).map_or(true, |c| c > d);
        let high_ok = self.store.decision(high).map_or(true, |c| c > d);
        if low_ok && high_ok {
            return Ok(self.make_node(d, low, high));
        }
        debug!("emit({}, {}, {}): reordering", d, low, high);
        let ind = self.indicator(d);
        self.ite(ind, high, low)
    }

    /// Identities that hold without inspecting leaf contents.
    fn apply_shortcut(&self, f: NodeId, g: NodeId, op: BinOp) -> Option<NodeId> {
        let res = match op {
            BinOp::Add => {
                if f == self.zero {
                    g
                } else if g == self.zero {
                    f
                } else {
                    return None;
                }
            }
            BinOp::Sub => {
                if g == self.zero {
                    f
                } else if f == g {
                    self.zero
                } else {
                    return None;
                }
            }
            BinOp::Prod => {
                if f == self.zero || g == self.zero {
                    self.zero
                } else if f == self.one {
                    g
                } else if g == self.one {
                    f
                } else {
                    return None;
                }
            }
            BinOp::Div => {
                if g == self.one {
                    f
                } else {
                    return None;
                }
            }
            BinOp::Min | BinOp::Max => {
                if f == g {
                    f
                } else {
                    return None;
                }
            }
            BinOp::And => {
                if f == self.zero || g == self.zero {
                    self.zero
                } else {
                    return None;
                }
            }
            BinOp::Or => {
                if f == self.one || g == self.one {
                    self.one
                } else {
                    return None;
                }
            }
            BinOp::Eq | BinOp::Leq | BinOp::Geq => {
                if f == g {
                    self.one
                } else {
                    return None;
                }
            }
            BinOp::Neq | BinOp::Lt | BinOp::Gt => {
                if f == g {
                    self.zero
                } else {
                    return None;
                }
            }
        };
        Some(res)
    }

    /// Leaf-leaf base case: scalar or symbolic combination.
    fn apply_leaves(
        &mut self,
        f: NodeId,
        ea: ExprId,
        g: NodeId,
        eb: ExprId,
        op: BinOp,
    ) -> Result<NodeId> {
        match op {
            BinOp::Add => {
                let e = self.pool.add(&[ea, eb]);
                Ok(self.leaf(e))
            }
            BinOp::Sub => {
                let e = self.pool.sub(ea, eb);
                Ok(self.leaf(e))
            }
            BinOp::Prod => {
                let e = self.pool.mul(&[ea, eb]);
                Ok(self.leaf(e))
            }
            BinOp::Div => {
                let e = self.pool.div(ea, eb)?;
                Ok(self.leaf(e))
            }
            BinOp::Min | BinOp::Max => {
                if let (Some(a), Some(b)) = (self.pool.as_const(ea), self.pool.as_const(eb)) {
                    let pick_f = if op == BinOp::Min { a <= b } else { a >= b };
                    return Ok(if pick_f { f } else { g });
                }
                // Fresh decision `lhs - rhs <= 0`; min keeps lhs on the true
                // branch, max the other way around.
                let zero = self.pool.zero();
                let diff = self.pool.sub(ea, eb);
                let (d, reversed) = self
                    .register_decision(diff, Rel::Leq, zero, true)?
                    .expect("create = true always yields a decision");
                let (mut lo, mut hi) = if op == BinOp::Min { (g, f) } else { (f, g) };
                if reversed {
                    std::mem::swap(&mut lo, &mut hi);
                }
                Ok(self.make_node(d, lo, hi))
            }
            BinOp::And | BinOp::Or => {
                let ta = self.leaf_truth(ea)?;
                let tb = self.leaf_truth(eb)?;
                let res = if op == BinOp::And { ta && tb } else { ta || tb };
                Ok(if res { self.one } else { self.zero })
            }
            BinOp::Lt | BinOp::Leq | BinOp::Gt | BinOp::Geq => {
                if let (Some(a), Some(b)) = (self.pool.as_const(ea), self.pool.as_const(eb)) {
                    let res = match op {
                        BinOp::Lt => a < b,
                        BinOp::Leq => a <= b,
                        BinOp::Gt => a > b,
                        BinOp::Geq => a >= b,
                        _ => unreachable!(),
                    };
                    return Ok(if res { self.one } else { self.zero });
                }
                let rel = match op {
                    BinOp::Lt => Rel::Lt,
                    BinOp::Leq => Rel::Leq,
                    BinOp::Gt => Rel::Gt,
                    BinOp::Geq => Rel::Geq,
                    _ => unreachable!(),
                };
                self.cmp_indicator(ea, rel, eb)
            }
            BinOp::Eq | BinOp::Neq => {
                if let (Some(a), Some(b)) = (self.pool.as_const(ea), self.pool.as_const(eb)) {
                    let res = if op == BinOp::Eq { a == b } else { a != b };
                    return Ok(if res { self.one } else { self.zero });
                }
                // Equality is the conjunction of the two half-spaces; it is
                // not a single canonical decision.
                let le = self.cmp_indicator(ea, Rel::Leq, eb)?;
                let ge = self.cmp_indicator(eb, Rel::Leq, ea)?;
                let eq = self.apply_rec(le, ge, BinOp::And)?;
                if op == BinOp::Eq {
                    Ok(eq)
                } else {
                    self.apply_rec(self.one, eq, BinOp::Sub)
                }
            }
        }
    }

    /// Truthiness of a leaf under the nonzero-is-true coercion.
    fn leaf_truth(&self, e: ExprId) -> Result<bool> {
        self.pool.truth_value(e).ok_or_else(|| {
            XaddError::LeafEvaluation(format!(
                "Boolean operator on non-constant leaf `{}`",
                self.pool.display(e)
            ))
        })
    }

    /// The 0/1 indicator of a comparison decision.
    pub(crate) fn cmp_indicator(&mut self, lhs: ExprId, rel: Rel, rhs: ExprId) -> Result<NodeId> {
        let (d, reversed) = self
            .register_decision(lhs, rel, rhs, true)?
            .expect("create = true always yields a decision");
        let (lo, hi) = if reversed {
            (self.one, self.zero)
        } else {
            (self.zero, self.one)
        };
        Ok(self.make_node(d, lo, hi))
    }
}
