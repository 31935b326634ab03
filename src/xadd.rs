//! The XADD manager.
//!
//! [`Xadd`] owns the expression pool, the decision registry, the node store,
//! and every operation cache. All diagram construction and manipulation goes
//! through the manager; clients hold [`NodeId`] handles.
//!
//! Construction is centralized in [`Xadd::make_node`], which collapses
//! redundant tests before interning. Together with hash-consing in the store
//! and canonical decisions in the registry, this keeps every diagram reduced
//! and maximally shared at all times.

use std::collections::BTreeSet;
use std::fmt::Debug;

use hashbrown::HashMap;
use log::debug;
use num_bigint::BigUint;
use num_rational::Rational64;
use num_traits::One;

use crate::cache::OpCache;
use crate::decision::{Decision, DecisionRegistry, Rel};
use crate::error::Result;
use crate::expr::ExprPool;
use crate::lp::FeasibilitySolver;
use crate::node::Node;
use crate::store::NodeStore;
use crate::types::{DecisionId, ExprId, NodeId, VarId};

/// Set of free variables reachable from a node.
pub type VarSet = BTreeSet<VarId>;

pub struct Xadd {
    pub(crate) pool: ExprPool,
    pub(crate) registry: DecisionRegistry,
    pub(crate) store: NodeStore,

    pub(crate) apply_cache: OpCache<(u64, u64, u64), NodeId>,
    pub(crate) unary_cache: OpCache<(u64, u64, u64), NodeId>,
    pub(crate) canonical_cache: OpCache<NodeId, NodeId>,
    pub(crate) reduce_cache: OpCache<NodeId, NodeId>,
    pub(crate) lp_cache: HashMap<(NodeId, Vec<(DecisionId, bool)>), NodeId>,
    pub(crate) feasible_cache: HashMap<Vec<(DecisionId, bool)>, bool>,
    vars_cache: HashMap<NodeId, VarSet>,

    pub(crate) solver: Option<Box<dyn FeasibilitySolver>>,

    /// The constant-zero leaf, id 0.
    pub zero: NodeId,
    /// The constant-one leaf, id 1.
    pub one: NodeId,
}

impl Default for Xadd {
    fn default() -> Self {
        Xadd::new()
    }
}

impl Debug for Xadd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Xadd")
            .field("nodes", &self.store.len())
            .field("decisions", &self.registry.len())
            .field("exprs", &self.pool.len())
            .finish()
    }
}

impl Xadd {
    /// Creates a manager with the built-in LP backend installed.
    pub fn new() -> Self {
        Self::with_solver(Some(Box::new(crate::lp::FourierMotzkin::default())))
    }

    /// Creates a manager without an LP backend; `reduce_lp` degrades to the
    /// identity reduction.
    pub fn without_solver() -> Self {
        Self::with_solver(None)
    }

    pub fn with_solver(solver: Option<Box<dyn FeasibilitySolver>>) -> Self {
        let pool = ExprPool::new();
        let mut store = NodeStore::new();
        let zero = store.intern_leaf(pool.zero());
        let one = store.intern_leaf(pool.one());
        assert_eq!(zero, NodeId::ZERO);
        assert_eq!(one, NodeId::ONE);

        Xadd {
            pool,
            registry: DecisionRegistry::new(),
            store,
            apply_cache: OpCache::new(16),
            unary_cache: OpCache::new(14),
            canonical_cache: OpCache::new(14),
            reduce_cache: OpCache::new(14),
            lp_cache: HashMap::new(),
            feasible_cache: HashMap::new(),
            vars_cache: HashMap::new(),
            solver,
            zero,
            one,
        }
    }

    /// Installs (or removes) the LP backend used by `reduce_lp`.
    pub fn set_solver(&mut self, solver: Option<Box<dyn FeasibilitySolver>>) {
        self.solver = solver;
        self.feasible_cache.clear();
        self.lp_cache.clear();
    }

    // ---- expression and variable plumbing --------------------------------

    pub fn pool(&self) -> &ExprPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ExprPool {
        &mut self.pool
    }

    pub fn declare_cont(&mut self, name: &str) -> VarId {
        self.pool.declare_cont(name)
    }

    pub fn declare_bool(&mut self, name: &str) -> VarId {
        self.pool.declare_bool(name)
    }

    // ---- node access -----------------------------------------------------

    pub fn node(&self, id: NodeId) -> Node {
        self.store.get(id)
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.store.is_leaf(id)
    }

    /// Decision at the root, `None` for leaves.
    pub fn decision_of(&self, id: NodeId) -> Option<DecisionId> {
        self.store.decision(id)
    }

    pub fn decision(&self, id: DecisionId) -> &Decision {
        self.registry.get(id)
    }

    /// Total number of nodes ever interned.
    pub fn num_nodes(&self) -> usize {
        self.store.len()
    }

    // ---- leaf construction -----------------------------------------------

    /// Interns the terminal carrying `expr`.
    pub fn leaf(&mut self, expr: ExprId) -> NodeId {
        self.store.intern_leaf(expr)
    }

    /// Leaf holding a rational constant.
    pub fn constant(&mut self, c: Rational64) -> NodeId {
        let e = self.pool.constant(c);
        self.leaf(e)
    }

    /// Leaf holding an integer constant.
    pub fn int_leaf(&mut self, n: i64) -> NodeId {
        let e = self.pool.int_const(n);
        self.leaf(e)
    }

    /// Leaf holding a single variable.
    pub fn var_leaf(&mut self, v: VarId) -> NodeId {
        let e = self.pool.var(v);
        self.leaf(e)
    }

    // ---- decisions -------------------------------------------------------

    /// Registers the comparison `lhs ⋈ rhs` as a decision.
    ///
    /// Returns the canonical decision id and whether canonicalization
    /// complemented the test; when it did, swap low/high before building a
    /// node on it. With `create = false` nothing is allocated and `Ok(None)`
    /// reports absence.
    pub fn register_decision(
        &mut self,
        lhs: ExprId,
        rel: Rel,
        rhs: ExprId,
        create: bool,
    ) -> Result<Option<(DecisionId, bool)>> {
        self.registry.register_cmp(&mut self.pool, lhs, rel, rhs, create)
    }

    /// Registers a Boolean atom decision. Atoms are never reversed.
    pub fn register_bool_decision(&mut self, v: VarId) -> Result<DecisionId> {
        self.registry.register_bool(&self.pool, v)
    }

    /// The indicator diagram `(d ? 1 : 0)`.
    pub fn indicator(&mut self, d: DecisionId) -> NodeId {
        self.make_node(d, self.zero, self.one)
    }

    // ---- reduction -------------------------------------------------------

    /// The single construction entry point: collapses a redundant test, then
    /// interns. Assumes `low` and `high` are themselves reduced and ordered
    /// below `dec`.
    pub fn make_node(&mut self, dec: DecisionId, low: NodeId, high: NodeId) -> NodeId {
        if low == high {
            debug!("make_node({}, {}, {}): collapse", dec, low, high);
            return low;
        }
        debug_assert!(
            self.store.decision(low).map_or(true, |d| d > dec),
            "low child out of order"
        );
        debug_assert!(
            self.store.decision(high).map_or(true, |d| d > dec),
            "high child out of order"
        );
        self.store.intern_internal(dec, low, high)
    }

    /// Bottom-up structural reduction: re-interns every reachable node,
    /// collapsing tests whose branches became equal. Ordering must already
    /// hold; use [`make_canonical`][Xadd::make_canonical] when it may not.
    pub fn reduce(&mut self, f: NodeId) -> NodeId {
        if let Some(res) = self.reduce_cache.get(&f) {
            return res;
        }
        let res = match self.store.get(f) {
            Node::Leaf(_) => f,
            Node::Internal { dec, low, high } => {
                let low = self.reduce(low);
                let high = self.reduce(high);
                self.make_node(dec, low, high)
            }
        };
        self.reduce_cache.insert(f, res);
        res
    }

    // ---- traversal utilities ---------------------------------------------

    /// All nodes reachable from `roots`, in discovery order.
    pub fn descendants(&self, roots: impl IntoIterator<Item = NodeId>) -> Vec<NodeId> {
        let mut visited: BTreeSet<NodeId> = BTreeSet::new();
        let mut order = Vec::new();
        let mut stack: Vec<NodeId> = roots.into_iter().collect();
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            order.push(id);
            if let Node::Internal { low, high, .. } = self.store.get(id) {
                stack.push(low);
                stack.push(high);
            }
        }
        order
    }

    /// Number of root-to-leaf paths. Grows exponentially in the depth, hence
    /// the big integer result.
    pub fn num_paths(&self, f: NodeId) -> BigUint {
        let mut cache: HashMap<NodeId, BigUint> = HashMap::new();
        self.num_paths_rec(f, &mut cache)
    }

    fn num_paths_rec(&self, f: NodeId, cache: &mut HashMap<NodeId, BigUint>) -> BigUint {
        if let Some(count) = cache.get(&f) {
            return count.clone();
        }
        let count = match self.store.get(f) {
            Node::Leaf(_) => BigUint::one(),
            Node::Internal { low, high, .. } => {
                self.num_paths_rec(low, cache) + self.num_paths_rec(high, cache)
            }
        };
        cache.insert(f, count.clone());
        count
    }

    /// Free variables in decisions and leaves reachable from `f`. Memoized.
    pub fn collect_vars(&mut self, f: NodeId) -> VarSet {
        if let Some(vars) = self.vars_cache.get(&f) {
            return vars.clone();
        }
        let vars = match self.store.get(f) {
            Node::Leaf(e) => self.pool.free_vars(e),
            Node::Internal { dec, low, high } => {
                let mut vars = self.collect_vars(low);
                vars.extend(self.collect_vars(high));
                match self.registry.get(dec) {
                    Decision::Bool(v) => {
                        vars.insert(*v);
                    }
                    Decision::Linear(ineq) => {
                        vars.extend(ineq.lin.terms.iter().map(|&(v, _)| v));
                    }
                }
                vars
            }
        };
        self.vars_cache.insert(f, vars.clone());
        vars
    }

    // ---- cache maintenance -----------------------------------------------

    /// Drops every memo table. Safe at any point between top-level
    /// operations; interned nodes, decisions, and expressions are untouched.
    pub fn clear_caches(&mut self) {
        self.apply_cache.clear();
        self.unary_cache.clear();
        self.canonical_cache.clear();
        self.reduce_cache.clear();
        self.lp_cache.clear();
        self.feasible_cache.clear();
        self.vars_cache.clear();
    }

    // ---- printing --------------------------------------------------------

    /// Compact single-line rendering for logs and tests.
    pub fn to_bracket_string(&mut self, f: NodeId) -> String {
        match self.store.get(f) {
            Node::Leaf(e) => format!("{}:[{}]", f, self.pool.display(e)),
            Node::Internal { dec, low, high } => {
                let guard = self.registry.display(&mut self.pool, dec);
                format!(
                    "{}:({}, {}, {})",
                    f,
                    guard,
                    self.to_bracket_string(high),
                    self.to_bracket_string(low)
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants_are_reserved() {
        let xadd = Xadd::new();
        assert_eq!(xadd.zero, NodeId::ZERO);
        assert_eq!(xadd.one, NodeId::ONE);
        assert!(xadd.is_leaf(xadd.zero));
        assert!(xadd.is_leaf(xadd.one));
    }

    #[test]
    fn test_make_node_collapses() {
        let mut xadd = Xadd::new();
        let x = xadd.declare_cont("x");
        let xe = xadd.pool_mut().var(x);
        let zero = xadd.pool().zero();
        let (d, _) = xadd.register_decision(xe, Rel::Leq, zero, true).unwrap().unwrap();

        let five = xadd.int_leaf(5);
        assert_eq!(xadd.make_node(d, five, five), five);
    }

    #[test]
    fn test_make_node_hash_consing() {
        let mut xadd = Xadd::new();
        let x = xadd.declare_cont("x");
        let xe = xadd.pool_mut().var(x);
        let zero = xadd.pool().zero();
        let (d, _) = xadd.register_decision(xe, Rel::Leq, zero, true).unwrap().unwrap();

        let n1 = xadd.make_node(d, xadd.zero, xadd.one);
        let n2 = xadd.make_node(d, xadd.zero, xadd.one);
        assert_eq!(n1, n2);
    }

    #[test]
    fn test_collect_vars() {
        let mut xadd = Xadd::new();
        let b = xadd.declare_bool("b");
        let x = xadd.declare_cont("x");
        let y = xadd.declare_cont("y");

        let db = xadd.register_bool_decision(b).unwrap();
        let xe = xadd.pool_mut().var(x);
        let zero = xadd.pool().zero();
        let (d, _) = xadd.register_decision(xe, Rel::Leq, zero, true).unwrap().unwrap();

        let y_leaf = xadd.var_leaf(y);
        let two = xadd.int_leaf(2);
        let inner = xadd.make_node(d, y_leaf, two);
        let f = xadd.make_node(db, inner, two);

        let vars = xadd.collect_vars(f);
        assert!(vars.contains(&b));
        assert!(vars.contains(&x));
        assert!(vars.contains(&y));
        assert_eq!(vars.len(), 3);
    }

    #[test]
    fn test_num_paths() {
        let mut xadd = Xadd::new();
        let x = xadd.declare_cont("x");
        let y = xadd.declare_cont("y");
        let xe = xadd.pool_mut().var(x);
        let ye = xadd.pool_mut().var(y);
        let zero = xadd.pool().zero();
        let (d1, _) = xadd.register_decision(xe, Rel::Leq, zero, true).unwrap().unwrap();
        let (d2, _) = xadd.register_decision(ye, Rel::Leq, zero, true).unwrap().unwrap();

        let five = xadd.int_leaf(5);
        let seven = xadd.int_leaf(7);
        let inner = xadd.make_node(d2, five, seven);
        let f = xadd.make_node(d1, inner, five);

        assert_eq!(xadd.num_paths(f), BigUint::from(3u32));
    }

    #[test]
    fn test_reduce_is_identity_on_reduced() {
        let mut xadd = Xadd::new();
        let x = xadd.declare_cont("x");
        let xe = xadd.pool_mut().var(x);
        let zero = xadd.pool().zero();
        let (d, _) = xadd.register_decision(xe, Rel::Leq, zero, true).unwrap().unwrap();
        let f = xadd.make_node(d, xadd.zero, xadd.one);
        assert_eq!(xadd.reduce(f), f);
    }
}
