//! Canonicalization: rebuilding a diagram under the current decision order.
//!
//! External perturbations — substitution rewriting a guard, a leaf case
//! reusing a decision registered long ago — can leave a freshly built
//! diagram violating the ordering invariant. `make_canonical` reconstructs
//! the diagram bottom-up: each internal node `(d, lo, hi)` is re-inserted as
//! `ite(indicator(d), hi, lo)`, and the `apply`-based if-then-else merges
//! `d` back at its proper depth.

use log::debug;

use crate::apply::BinOp;
use crate::error::Result;
use crate::node::Node;
use crate::types::NodeId;
use crate::xadd::Xadd;

impl Xadd {
    /// If-then-else over a 0/1 guard diagram: `i·t + (1 − i)·e`.
    ///
    /// The guard must be Boolean-valued (0/1 leaves); the branches may carry
    /// arbitrary expressions. The composition runs entirely through `apply`,
    /// so the result is reduced and ordered no matter where the guard's
    /// decisions sit relative to the branches.
    pub fn ite(&mut self, i: NodeId, t: NodeId, e: NodeId) -> Result<NodeId> {
        if i == self.one {
            return Ok(t);
        }
        if i == self.zero {
            return Ok(e);
        }
        if t == e {
            return Ok(t);
        }
        let then_part = self.apply_rec(i, t, BinOp::Prod)?;
        let not_i = self.apply_rec(self.one, i, BinOp::Sub)?;
        let else_part = self.apply_rec(not_i, e, BinOp::Prod)?;
        self.apply_rec(then_part, else_part, BinOp::Add)
    }

    /// Rebuilds `f` so it satisfies sharing, reducedness, and ordering under
    /// the current decision order. Idempotent, memoized.
    pub fn make_canonical(&mut self, f: NodeId) -> Result<NodeId> {
        if let Some(res) = self.canonical_cache.get(&f) {
            return Ok(res);
        }
        let res = match self.store.get(f) {
            Node::Leaf(_) => f,
            Node::Internal { dec, low, high } => {
                let lo = self.make_canonical(low)?;
                let hi = self.make_canonical(high)?;
                let ind = self.indicator(dec);
                self.ite(ind, hi, lo)?
            }
        };
        if res != f {
            debug!("make_canonical({}) -> {}", f, res);
        }
        self.canonical_cache.insert(f, res);
        Ok(res)
    }
}
