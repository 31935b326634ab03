//! Linear feasibility backend for path pruning.
//!
//! The pruning pass only needs one question answered: does a conjunction of
//! linear inequalities have a solution over the reals? The
//! [`FeasibilitySolver`] trait is that seam; [`FourierMotzkin`] is the
//! built-in exact backend. An external LP solver can be plugged in through
//! [`Xadd::set_solver`][crate::xadd::Xadd::set_solver].
//!
//! Arithmetic is exact rational throughout, so there are no tolerance
//! artifacts: a system is infeasible here exactly when it is infeasible
//! mathematically.

use std::collections::BTreeMap;

use num_rational::Rational64;
use num_traits::{Signed, Zero};
use thiserror::Error;

use crate::types::VarId;

/// One linear constraint `Σ aᵢ·xᵢ + c ⋈ 0`, `⋈ ∈ {≤, <}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    /// Sorted by variable id; zero coefficients are not stored.
    pub terms: Vec<(VarId, Rational64)>,
    pub constant: Rational64,
    /// `true` for `< 0`.
    pub strict: bool,
}

impl Constraint {
    /// The complementary half-space: `¬(e ≤ 0) = -e < 0`, `¬(e < 0) = -e ≤ 0`.
    pub fn negated(&self) -> Constraint {
        Constraint {
            terms: self.terms.iter().map(|&(v, a)| (v, -a)).collect(),
            constant: -self.constant,
            strict: !self.strict,
        }
    }

    fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// A variable-free constraint is violated when its constant fails the
    /// comparison with zero.
    fn constant_violated(&self) -> bool {
        debug_assert!(self.is_constant());
        if self.strict {
            !self.constant.is_negative()
        } else {
            self.constant.is_positive()
        }
    }

    fn coefficient(&self, v: VarId) -> Rational64 {
        self.terms
            .iter()
            .find(|&&(tv, _)| tv == v)
            .map(|&(_, a)| a)
            .unwrap_or_else(Rational64::zero)
    }

    /// `self + other.scale(k)` with the variable `v` cancelled by
    /// construction; strictness is inherited from either side.
    fn eliminate_with(&self, other: &Constraint, v: VarId) -> Constraint {
        let a_self = self.coefficient(v);
        let a_other = other.coefficient(v);
        debug_assert!(a_self.is_positive() && a_other.is_negative());

        // (-a_other)·self + a_self·other cancels v with positive multipliers.
        let k_self = -a_other;
        let k_other = a_self;

        let mut terms: BTreeMap<VarId, Rational64> = BTreeMap::new();
        for &(tv, a) in &self.terms {
            *terms.entry(tv).or_insert_with(Rational64::zero) += a * k_self;
        }
        for &(tv, a) in &other.terms {
            *terms.entry(tv).or_insert_with(Rational64::zero) += a * k_other;
        }
        terms.remove(&v);

        Constraint {
            terms: terms.into_iter().filter(|(_, a)| !a.is_zero()).collect(),
            constant: self.constant * k_self + other.constant * k_other,
            strict: self.strict || other.strict,
        }
    }
}

/// Error reported by a feasibility backend.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SolverError(pub String);

/// Decides satisfiability of a conjunction of linear constraints over the
/// reals. Implementations may be incomplete in the `Err` direction only: an
/// `Ok(false)` must be a proof of infeasibility.
pub trait FeasibilitySolver {
    fn is_feasible(&mut self, constraints: &[Constraint]) -> Result<bool, SolverError>;
}

/// Exact Fourier–Motzkin elimination.
///
/// Worst-case the derived system grows quadratically per eliminated
/// variable; `max_constraints` bounds the blowup, and hitting the bound
/// reports a solver error rather than a wrong answer (the reducer then keeps
/// the branch).
pub struct FourierMotzkin {
    pub max_constraints: usize,
}

impl Default for FourierMotzkin {
    fn default() -> Self {
        FourierMotzkin { max_constraints: 50_000 }
    }
}

impl FeasibilitySolver for FourierMotzkin {
    fn is_feasible(&mut self, constraints: &[Constraint]) -> Result<bool, SolverError> {
        let mut system: Vec<Constraint> = constraints.to_vec();

        loop {
            // Variable-free constraints are decided immediately.
            let mut next: Vec<Constraint> = Vec::with_capacity(system.len());
            for c in system {
                if c.is_constant() {
                    if c.constant_violated() {
                        return Ok(false);
                    }
                } else {
                    next.push(c);
                }
            }
            system = next;

            let v = match system.first().and_then(|c| c.terms.first()) {
                Some(&(v, _)) => v,
                None => return Ok(true),
            };

            let mut uppers: Vec<Constraint> = Vec::new();
            let mut lowers: Vec<Constraint> = Vec::new();
            let mut rest: Vec<Constraint> = Vec::new();
            for c in system {
                let a = c.coefficient(v);
                if a.is_positive() {
                    uppers.push(c);
                } else if a.is_negative() {
                    lowers.push(c);
                } else {
                    rest.push(c);
                }
            }

            // A variable bounded on one side only never blocks feasibility.
            let derived = uppers.len() * lowers.len();
            if rest.len() + derived > self.max_constraints {
                return Err(SolverError(format!(
                    "elimination blowup: {} constraints exceeds the {} cap",
                    rest.len() + derived,
                    self.max_constraints
                )));
            }
            for u in &uppers {
                for l in &lowers {
                    rest.push(u.eliminate_with(l, v));
                }
            }
            system = rest;
        }
    }
}
