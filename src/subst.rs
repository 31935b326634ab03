//! Substitution and evaluation.
//!
//! Substitution rewrites both leaves and decision guards and returns a new
//! diagram. A rewritten guard may collapse to a constant (the branch is
//! short-circuited), or canonicalize to a different decision, possibly
//! complemented (the branches are swapped). Because a re-registered decision
//! can land anywhere in the order, every internal node is re-inserted through
//! the `apply`-based if-then-else.
//!
//! Evaluation walks a single path. Decision truth is decided in exact
//! rational arithmetic; only the final leaf value lowers to `f64`.

use hashbrown::HashMap;
use log::debug;
use num_rational::Rational64;
use num_traits::ToPrimitive;

use crate::decision::{Classified, Decision};
use crate::error::{Result, XaddError};
use crate::expr::Expr;
use crate::node::Node;
use crate::types::{DecisionId, ExprId, NodeId, VarId};
use crate::xadd::Xadd;

impl Xadd {
    /// Substitutes expressions for variables throughout `f`.
    ///
    /// Values may be concrete constants or arbitrary symbolic expressions;
    /// unmentioned variables are left alone. The result is canonical.
    pub fn substitute(&mut self, f: NodeId, map: &HashMap<VarId, ExprId>) -> Result<NodeId> {
        debug!("substitute(f = {}, {} bindings)", f, map.len());
        let mut memo: HashMap<NodeId, NodeId> = HashMap::new();
        let res = self.subst_rec(f, map, &mut memo)?;
        self.make_canonical(res)
    }

    fn subst_rec(
        &mut self,
        f: NodeId,
        map: &HashMap<VarId, ExprId>,
        memo: &mut HashMap<NodeId, NodeId>,
    ) -> Result<NodeId> {
        if let Some(&res) = memo.get(&f) {
            return Ok(res);
        }

        let res = match self.store.get(f) {
            Node::Leaf(e) => {
                let rewritten = self.pool.substitute(e, map)?;
                self.leaf(rewritten)
            }
            Node::Internal { dec, low, high } => {
                let lo = self.subst_rec(low, map, memo)?;
                let hi = self.subst_rec(high, map, memo)?;
                self.subst_guard(dec, lo, hi, map)?
            }
        };

        memo.insert(f, res);
        Ok(res)
    }

    /// Rebuilds one internal node under a substituted guard.
    fn subst_guard(
        &mut self,
        dec: DecisionId,
        lo: NodeId,
        hi: NodeId,
        map: &HashMap<VarId, ExprId>,
    ) -> Result<NodeId> {
        match self.registry.get(dec).clone() {
            Decision::Bool(v) => match map.get(&v) {
                None => {
                    let ind = self.indicator(dec);
                    self.ite(ind, hi, lo)
                }
                Some(&value) => match self.pool.get(value).clone() {
                    Expr::Const(c) if c == Rational64::from_integer(1) => Ok(hi),
                    Expr::Const(c) if c == Rational64::from_integer(0) => Ok(lo),
                    Expr::Var(v2) if self.pool.is_bool_var(v2) => {
                        let d2 = self.register_bool_decision(v2)?;
                        let ind = self.indicator(d2);
                        self.ite(ind, hi, lo)
                    }
                    _ => Err(XaddError::MalformedDecision(format!(
                        "Boolean variable `{}` substituted by non-Boolean `{}`",
                        self.pool.var_name(v),
                        self.pool.display(value)
                    ))),
                },
            },
            Decision::Linear(ineq) => {
                let guard = self.pool.linear_to_expr(&ineq.lin);
                let rewritten = self.pool.substitute(guard, map)?;
                let zero = self.pool.zero();
                let rel = ineq.rel();
                match self.registry.classify_cmp(&mut self.pool, rewritten, rel, zero)? {
                    Classified::TriviallyTrue => Ok(hi),
                    Classified::TriviallyFalse => Ok(lo),
                    Classified::Decision(Decision::Linear(new_ineq), reversed) => {
                        let d2 = self.registry.intern_linear(new_ineq);
                        let ind = self.indicator(d2);
                        if reversed {
                            self.ite(ind, lo, hi)
                        } else {
                            self.ite(ind, hi, lo)
                        }
                    }
                    Classified::Decision(Decision::Bool(_), _) => Err(
                        XaddError::InvariantViolation(
                            "comparison classified as a Boolean atom".into(),
                        ),
                    ),
                }
            }
        }
    }

    /// Evaluates `f` under a full assignment.
    ///
    /// Every free variable of the diagram must be bound: Boolean variables in
    /// `bools`, continuous ones in `cont`. A missing binding yields
    /// `Ok(None)`, or `PartialAssignment` when `strict`.
    pub fn evaluate(
        &mut self,
        f: NodeId,
        bools: &HashMap<VarId, bool>,
        cont: &HashMap<VarId, Rational64>,
        strict: bool,
    ) -> Result<Option<f64>> {
        for v in self.collect_vars(f) {
            let bound = if self.pool.is_bool_var(v) {
                bools.contains_key(&v)
            } else {
                cont.contains_key(&v)
            };
            if !bound {
                let name = self.pool.var_name(v).to_string();
                debug!("evaluate(f = {}): `{}` unbound", f, name);
                if strict {
                    return Err(XaddError::PartialAssignment(name));
                }
                return Ok(None);
            }
        }

        let mut cur = f;
        loop {
            match self.store.get(cur) {
                Node::Internal { dec, low, high } => {
                    let taken = match self.registry.get(dec) {
                        Decision::Bool(v) => *bools.get(v).expect("coverage checked"),
                        Decision::Linear(ineq) => {
                            ineq.eval(cont).expect("coverage checked")
                        }
                    };
                    cur = if taken { high } else { low };
                }
                Node::Leaf(e) => {
                    let mut assign: HashMap<VarId, f64> = HashMap::new();
                    for (&v, &c) in cont {
                        assign.insert(v, c.to_f64().unwrap_or(f64::NAN));
                    }
                    for (&v, &b) in bools {
                        assign.insert(v, if b { 1.0 } else { 0.0 });
                    }
                    let value = self.pool.eval_f64(e, &assign)?;
                    return Ok(Some(value));
                }
            }
        }
    }
}
