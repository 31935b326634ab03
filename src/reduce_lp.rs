//! LP-backed path pruning.
//!
//! `reduce_lp` walks the DAG carrying the conjunction of linear decisions
//! taken along the path. A branch whose guard is incompatible with that
//! context can never be reached and is replaced by its sibling. Boolean
//! atoms contribute no linear constraint and recurse structurally.
//!
//! Feasibility is tested over *open* half-spaces: a branch whose guard
//! region degenerates to a measure-zero boundary slice is pruned as well.
//! The pruned diagram therefore agrees with the original everywhere except
//! possibly on boundaries of touching regions.
//!
//! The pass never invents decisions and never reorders, so the result stays
//! canonical. Results are memoized per `(node, context)`; the context is a
//! sorted list of `(decision, polarity)` pairs, and feasibility verdicts are
//! cached per context. A solver failure is logged and the branch is kept:
//! degraded output is still semantically correct, just less pruned.

use log::{debug, warn};

use crate::decision::Decision;
use crate::lp::Constraint;
use crate::node::Node;
use crate::types::{DecisionId, NodeId};
use crate::xadd::Xadd;

impl Xadd {
    /// Prunes provably unreachable branches of `f`.
    pub fn reduce_lp(&mut self, f: NodeId) -> NodeId {
        self.reduce_lp_under(f, &[])
    }

    /// Prunes `f` under externally supplied preconditions: each entry fixes
    /// a registered decision to a polarity.
    pub fn reduce_lp_under(&mut self, f: NodeId, context: &[(DecisionId, bool)]) -> NodeId {
        if self.solver.is_none() {
            warn!("reduce_lp({}): no LP backend, degrading to the identity reduction", f);
            return f;
        }
        let mut ctx: Vec<(DecisionId, bool)> = context.to_vec();
        ctx.sort_unstable();
        ctx.dedup();
        self.reduce_lp_rec(f, &ctx)
    }

    fn reduce_lp_rec(&mut self, f: NodeId, ctx: &[(DecisionId, bool)]) -> NodeId {
        let (dec, low, high) = match self.store.get(f) {
            Node::Leaf(_) => return f,
            Node::Internal { dec, low, high } => (dec, low, high),
        };

        let key = (f, ctx.to_vec());
        if let Some(&res) = self.lp_cache.get(&key) {
            return res;
        }

        let is_atom = matches!(self.registry.get(dec), Decision::Bool(_));
        let res = if is_atom {
            // Atoms add no linear constraint; both branches recurse.
            let lo = self.reduce_lp_rec(low, ctx);
            let hi = self.reduce_lp_rec(high, ctx);
            self.make_node(dec, lo, hi)
        } else {
            let ctx_true = extend(ctx, dec, true);
            let ctx_false = extend(ctx, dec, false);

            if !self.context_feasible(&ctx_true) {
                debug!("reduce_lp({}): guard {} unreachable, keeping low", f, dec);
                self.reduce_lp_rec(low, &ctx_false)
            } else if !self.context_feasible(&ctx_false) {
                debug!("reduce_lp({}): guard {} implied, keeping high", f, dec);
                self.reduce_lp_rec(high, &ctx_true)
            } else {
                let lo = self.reduce_lp_rec(low, &ctx_false);
                let hi = self.reduce_lp_rec(high, &ctx_true);
                self.make_node(dec, lo, hi)
            }
        };

        self.lp_cache.insert(key, res);
        res
    }

    /// Whether the conjunction of decisions in `ctx` has an interior point.
    /// Cached per context; solver failures conservatively report feasible.
    fn context_feasible(&mut self, ctx: &[(DecisionId, bool)]) -> bool {
        if let Some(&known) = self.feasible_cache.get(ctx) {
            return known;
        }

        let constraints: Vec<Constraint> = ctx
            .iter()
            .filter_map(|&(d, polarity)| self.open_constraint(d, polarity))
            .collect();

        let solver = self.solver.as_mut().expect("checked at the entry point");
        match solver.is_feasible(&constraints) {
            Ok(feasible) => {
                self.feasible_cache.insert(ctx.to_vec(), feasible);
                feasible
            }
            Err(err) => {
                warn!("LP solver failed ({}); keeping the branch", err);
                true
            }
        }
    }

    /// The open half-space of a decision polarity. Pruning intentionally
    /// ignores the boundary: a guard satisfiable only on a measure-zero
    /// slice of the context still counts as unreachable.
    fn open_constraint(&self, d: DecisionId, polarity: bool) -> Option<Constraint> {
        let ineq = match self.registry.get(d) {
            Decision::Linear(ineq) => ineq,
            Decision::Bool(_) => return None,
        };
        let base = Constraint {
            terms: ineq.lin.terms.clone(),
            constant: ineq.lin.constant,
            strict: true,
        };
        Some(if polarity {
            base
        } else {
            let mut negated = base.negated();
            negated.strict = true;
            negated
        })
    }
}

fn extend(ctx: &[(DecisionId, bool)], d: DecisionId, polarity: bool) -> Vec<(DecisionId, bool)> {
    let mut out = Vec::with_capacity(ctx.len() + 1);
    let entry = (d, polarity);
    let pos = ctx.partition_point(|&e| e < entry);
    out.extend_from_slice(&ctx[..pos]);
    if ctx.get(pos) != Some(&entry) {
        out.push(entry);
    }
    out.extend_from_slice(&ctx[pos..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::Rel;
    use crate::lp::{FeasibilitySolver, SolverError};
    use test_log::test;

    /// `( [x <= 0] ( [x <= -1] A B ) C )` with the true branch first.
    fn nested(xadd: &mut Xadd) -> (NodeId, NodeId, NodeId, NodeId, DecisionId) {
        let x = xadd.declare_cont("x");
        let xe = xadd.pool_mut().var(x);
        let zero = xadd.pool().zero();
        let minus_one = xadd.pool_mut().int_const(-1);

        let (d_outer, rev1) =
            xadd.register_decision(xe, Rel::Leq, zero, true).unwrap().unwrap();
        let (d_inner, rev2) =
            xadd.register_decision(xe, Rel::Leq, minus_one, true).unwrap().unwrap();
        assert!(!rev1 && !rev2);

        let a = xadd.int_leaf(10);
        let b = xadd.int_leaf(20);
        let c = xadd.int_leaf(30);
        let inner = xadd.make_node(d_inner, b, a);
        let f = xadd.make_node(d_outer, c, inner);
        (f, a, b, c, d_outer)
    }

    #[test]
    fn test_no_context_no_pruning() {
        let mut xadd = Xadd::new();
        let (f, ..) = nested(&mut xadd);
        assert_eq!(xadd.reduce_lp(f), f);
    }

    #[test]
    fn test_nested_guard_implied() {
        let mut xadd = Xadd::new();
        let x = xadd.declare_cont("x");
        let xe = xadd.pool_mut().var(x);
        let zero = xadd.pool().zero();
        let one_c = xadd.pool_mut().int_const(1);

        // ( [x <= 0] ( [x <= 1] A B ) C ): inside x <= 0, x <= 1 always
        // holds, so B is unreachable.
        let (d_outer, _) = xadd.register_decision(xe, Rel::Leq, zero, true).unwrap().unwrap();
        let (d_inner, _) = xadd.register_decision(xe, Rel::Leq, one_c, true).unwrap().unwrap();
        let a = xadd.int_leaf(10);
        let b = xadd.int_leaf(20);
        let c = xadd.int_leaf(30);
        let inner = xadd.make_node(d_inner, b, a);
        let f = xadd.make_node(d_outer, c, inner);

        let g = xadd.reduce_lp(f);
        let expected = xadd.make_node(d_outer, c, a);
        assert_eq!(g, expected);
    }

    #[test]
    fn test_precondition_prunes_to_leaf() {
        let mut xadd = Xadd::new();
        let (f, _, _, c, _) = nested(&mut xadd);

        // Precondition x >= 0: registered as the complement of [x < 0].
        let x = xadd.pool().var_named("x").unwrap();
        let xe = xadd.pool_mut().var(x);
        let zero = xadd.pool().zero();
        let (d, rev) = xadd.register_decision(xe, Rel::Geq, zero, true).unwrap().unwrap();
        assert!(rev);

        let g = xadd.reduce_lp_under(f, &[(d, false)]);
        assert_eq!(g, c);
    }

    #[test]
    fn test_idempotent() {
        let mut xadd = Xadd::new();
        let (f, ..) = nested(&mut xadd);
        let x = xadd.pool().var_named("x").unwrap();
        let xe = xadd.pool_mut().var(x);
        let zero = xadd.pool().zero();
        let (d, _) = xadd.register_decision(xe, Rel::Geq, zero, true).unwrap().unwrap();

        let g1 = xadd.reduce_lp_under(f, &[(d, false)]);
        let g2 = xadd.reduce_lp_under(g1, &[(d, false)]);
        assert_eq!(g1, g2);
    }

    #[test]
    fn test_boolean_atoms_recurse_structurally() {
        let mut xadd = Xadd::new();
        let b = xadd.declare_bool("b");
        let db = xadd.register_bool_decision(b).unwrap();
        let x = xadd.declare_cont("x");
        let xe = xadd.pool_mut().var(x);
        let zero = xadd.pool().zero();
        let minus_one = xadd.pool_mut().int_const(-1);
        let (d1, _) = xadd.register_decision(xe, Rel::Leq, zero, true).unwrap().unwrap();
        let (d2, _) = xadd.register_decision(xe, Rel::Leq, minus_one, true).unwrap().unwrap();

        // ( b ( [x<=0] ( [x<=-1] A B ) C ) D ): the linear context crosses
        // the Boolean node transparently.
        let a = xadd.int_leaf(1);
        let bb = xadd.int_leaf(2);
        let c = xadd.int_leaf(3);
        let dd = xadd.int_leaf(4);
        let inner = xadd.make_node(d2, bb, a);
        let mid = xadd.make_node(d1, c, inner);
        let f = xadd.make_node(db, dd, mid);

        // Inside x <= -1, x <= 0 is implied... but here the outer guard is
        // x <= 0 and the inner x <= -1 is not implied; nothing prunes.
        assert_eq!(xadd.reduce_lp(f), f);
    }

    #[test]
    fn test_contradictory_nested_guards_prune() {
        let mut xadd = Xadd::new();
        let x = xadd.declare_cont("x");
        let xe = xadd.pool_mut().var(x);
        let zero = xadd.pool().zero();
        let one_c = xadd.pool_mut().int_const(1);

        // ( [x <= 0] ( [x >= 1] A B ) C ): A needs x <= 0 and x >= 1.
        let (d_outer, _) = xadd.register_decision(xe, Rel::Leq, zero, true).unwrap().unwrap();
        let (d_inner, rev) =
            xadd.register_decision(xe, Rel::Geq, one_c, true).unwrap().unwrap();
        assert!(rev); // x >= 1 is the complement of x < 1

        let a = xadd.int_leaf(10);
        let b = xadd.int_leaf(20);
        let c = xadd.int_leaf(30);
        // reversed: swap branches so "decision true" still selects A's side
        let inner = xadd.make_node(d_inner, a, b);
        let f = xadd.make_node(d_outer, c, inner);

        let g = xadd.reduce_lp(f);
        let expected = xadd.make_node(d_outer, c, b);
        assert_eq!(g, expected);
    }

    #[test]
    fn test_without_solver_degrades() {
        let mut xadd = Xadd::without_solver();
        let (f, ..) = nested(&mut xadd);
        assert_eq!(xadd.reduce_lp(f), f);
    }

    /// A backend that always errors, to exercise the conservative path.
    struct Broken;

    impl FeasibilitySolver for Broken {
        fn is_feasible(&mut self, _: &[Constraint]) -> Result<bool, SolverError> {
            Err(SolverError("backend offline".into()))
        }
    }

    #[test]
    fn test_solver_error_keeps_branches() {
        let mut xadd = Xadd::new();
        let (f, ..) = nested(&mut xadd);
        xadd.set_solver(Some(Box::new(Broken)));

        let x = xadd.pool().var_named("x").unwrap();
        let xe = xadd.pool_mut().var(x);
        let zero = xadd.pool().zero();
        let (d, _) = xadd.register_decision(xe, Rel::Geq, zero, true).unwrap().unwrap();

        // Every feasibility query fails, so nothing is pruned.
        assert_eq!(xadd.reduce_lp_under(f, &[(d, false)]), f);
    }

    #[test]
    fn test_cleared_caches_do_not_change_results() {
        let mut xadd = Xadd::new();
        let (f, ..) = nested(&mut xadd);
        let x = xadd.pool().var_named("x").unwrap();
        let xe = xadd.pool_mut().var(x);
        let zero = xadd.pool().zero();
        let (d, _) = xadd.register_decision(xe, Rel::Geq, zero, true).unwrap().unwrap();

        let g1 = xadd.reduce_lp_under(f, &[(d, false)]);
        xadd.clear_caches();
        let g2 = xadd.reduce_lp_under(f, &[(d, false)]);
        assert_eq!(g1, g2);
    }
}
