//! Decisions and the decision registry.
//!
//! A decision is the test placed at an internal node: either a Boolean atom
//! or a linear inequality over continuous variables. The registry interns
//! every decision behind a stable [`DecisionId`]; ids are append-only, and
//! their order is the diagram's variable order.
//!
//! Inequalities are canonicalized before interning: everything is moved to
//! the left-hand side, the relation is rewritten to `≤ 0` or `< 0`, and the
//! coefficients are scaled so the leading (lowest-id) variable has
//! coefficient exactly one. Rewrites that complement the test — turning
//! `>`/`≥` into the negation of `≤`/`<`, or flipping the inequality while
//! scaling by a negative factor — are reported to the caller as `reversed`.
//! A caller that receives `reversed = true` must swap its low/high branches
//! before interning a node on the decision. This is the only place polarity
//! is handled; everything downstream assumes `high` is the branch taken when
//! the canonical decision holds.

use std::fmt;

use hashbrown::HashMap;
use log::debug;
use num_rational::Rational64;
use num_traits::Signed;

use crate::error::{Result, XaddError};
use crate::expr::{ExprPool, LinearExpr};
use crate::types::{DecisionId, ExprId, VarId};

/// Comparison relation accepted at the decision boundary.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Rel {
    Leq,
    Lt,
    Geq,
    Gt,
    Eq,
    Neq,
}

impl Rel {
    pub fn symbol(self) -> &'static str {
        match self {
            Rel::Leq => "<=",
            Rel::Lt => "<",
            Rel::Geq => ">=",
            Rel::Gt => ">",
            Rel::Eq => "==",
            Rel::Neq => "!=",
        }
    }

    pub fn from_symbol(s: &str) -> Option<Rel> {
        Some(match s {
            "<=" => Rel::Leq,
            "<" => Rel::Lt,
            ">=" => Rel::Geq,
            ">" => Rel::Gt,
            "==" => Rel::Eq,
            "!=" => Rel::Neq,
            _ => return None,
        })
    }
}

/// A canonical linear inequality `Σ aᵢ·xᵢ + c ⋈ 0` with `⋈ ∈ {≤, <}`.
///
/// Terms are sorted by variable id, the leading coefficient is one, and at
/// least one term is present.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct LinearIneq {
    pub lin: LinearExpr,
    /// `true` for `< 0`, `false` for `≤ 0`.
    pub strict: bool,
}

impl LinearIneq {
    pub fn rel(&self) -> Rel {
        if self.strict {
            Rel::Lt
        } else {
            Rel::Leq
        }
    }

    /// Truth of the inequality under a full rational assignment.
    pub fn eval(&self, assign: &HashMap<VarId, Rational64>) -> Option<bool> {
        let value = self.lin.eval(assign)?;
        Some(if self.strict {
            value.is_negative()
        } else {
            !value.is_positive()
        })
    }
}

/// A registered decision.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Decision {
    /// A single Boolean variable.
    Bool(VarId),
    /// A canonical linear inequality over continuous variables.
    Linear(LinearIneq),
}

/// Outcome of classifying an expression that is about to become a decision.
/// `TriviallyTrue`/`TriviallyFalse` arise when substitution collapses an
/// inequality to a constant comparison; no id is allocated for those.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Decision(Decision, bool),
    TriviallyTrue,
    TriviallyFalse,
}

/// Interning table for decisions.
pub struct DecisionRegistry {
    decisions: Vec<Decision>,
    index: HashMap<Decision, DecisionId>,
}

impl Default for DecisionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionRegistry {
    pub fn new() -> Self {
        DecisionRegistry { decisions: Vec::new(), index: HashMap::new() }
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    pub fn get(&self, id: DecisionId) -> &Decision {
        &self.decisions[id.index() as usize]
    }

    /// Interns a Boolean atom. Atoms are never reversed.
    pub fn register_bool(&mut self, pool: &ExprPool, v: VarId) -> Result<DecisionId> {
        if !pool.is_bool_var(v) {
            return Err(XaddError::MalformedDecision(format!(
                "variable `{}` is not declared Boolean",
                pool.var_name(v)
            )));
        }
        Ok(self.intern(Decision::Bool(v)))
    }

    /// Classifies and interns a comparison `lhs ⋈ rhs`, returning the
    /// decision id and whether canonicalization complemented the test.
    ///
    /// With `create = false` the canonical form is computed but nothing is
    /// allocated; `Ok(None)` reports "not present".
    pub fn register_cmp(
        &mut self,
        pool: &mut ExprPool,
        lhs: ExprId,
        rel: Rel,
        rhs: ExprId,
        create: bool,
    ) -> Result<Option<(DecisionId, bool)>> {
        match self.classify_cmp(pool, lhs, rel, rhs)? {
            Classified::Decision(decision, reversed) => {
                if create {
                    let id = self.intern(decision);
                    Ok(Some((id, reversed)))
                } else {
                    Ok(self.index.get(&decision).map(|&id| (id, reversed)))
                }
            }
            Classified::TriviallyTrue | Classified::TriviallyFalse => {
                Err(XaddError::MalformedDecision(
                    "comparison of constants is not a decision".into(),
                ))
            }
        }
    }

    /// Canonicalizes a comparison without touching the table. Used by
    /// substitution, where a rewritten decision may collapse to a constant.
    pub fn classify_cmp(
        &self,
        pool: &mut ExprPool,
        lhs: ExprId,
        rel: Rel,
        rhs: ExprId,
    ) -> Result<Classified> {
        if matches!(rel, Rel::Eq | Rel::Neq) {
            return Err(XaddError::MalformedDecision(format!(
                "`{}` cannot be a single decision; use the relational apply operators",
                rel.symbol()
            )));
        }

        let diff = pool.sub(lhs, rhs);

        // `e > 0` is the complement of `e ≤ 0`; `e ≥ 0` of `e < 0`.
        let (mut strict, mut reversed) = match rel {
            Rel::Leq => (false, false),
            Rel::Lt => (true, false),
            Rel::Gt => (false, true),
            Rel::Geq => (true, true),
            Rel::Eq | Rel::Neq => unreachable!(),
        };

        let mut lin = pool.as_linear(diff).ok_or_else(|| {
            XaddError::MalformedDecision(format!(
                "`{}` is not linear in the continuous variables",
                pool.display(diff)
            ))
        })?;

        for &(v, _) in &lin.terms {
            if pool.is_bool_var(v) {
                return Err(XaddError::MalformedDecision(format!(
                    "Boolean variable `{}` used arithmetically in a decision",
                    pool.var_name(v)
                )));
            }
        }

        if lin.is_constant() {
            let holds = if strict {
                lin.constant.is_negative()
            } else {
                !lin.constant.is_positive()
            };
            // `reversed` complements the test.
            return Ok(if holds != reversed {
                Classified::TriviallyTrue
            } else {
                Classified::TriviallyFalse
            });
        }

        // Scale so the leading coefficient is exactly one. A negative leading
        // coefficient flips the inequality, which complements the canonical
        // test: `e ≤ 0` becomes `-e ≥ 0`, i.e. the negation of `-e < 0`.
        let leading = lin.terms[0].1;
        if leading.is_negative() {
            strict = !strict;
            reversed = !reversed;
        }
        lin = lin.scale(leading.recip());

        debug!(
            "classify_cmp: {} {} 0 -> {} 0, reversed = {}",
            pool.display(diff),
            rel.symbol(),
            if strict { "<" } else { "<=" },
            reversed
        );

        Ok(Classified::Decision(Decision::Linear(LinearIneq { lin, strict }), reversed))
    }

    /// Interns an already-canonical linear inequality (substitution path).
    pub fn intern_linear(&mut self, ineq: LinearIneq) -> DecisionId {
        self.intern(Decision::Linear(ineq))
    }

    fn intern(&mut self, decision: Decision) -> DecisionId {
        if let Some(&id) = self.index.get(&decision) {
            return id;
        }
        let id = DecisionId::new(self.decisions.len() as u32);
        debug!("register decision {} as {}", id, id.index());
        self.decisions.push(decision.clone());
        self.index.insert(decision, id);
        id
    }

    /// Renders a decision in the textual grammar.
    pub fn display(&self, pool: &mut ExprPool, id: DecisionId) -> String {
        match self.get(id).clone() {
            Decision::Bool(v) => pool.var_name(v).to_string(),
            Decision::Linear(ineq) => {
                let expr = pool.linear_to_expr(&ineq.lin);
                format!("[{} {} 0]", pool.display(expr), ineq.rel().symbol())
            }
        }
    }
}

impl fmt::Debug for DecisionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionRegistry")
            .field("decisions", &self.decisions.len())
            .finish()
    }
}
