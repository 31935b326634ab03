//! Leaf-wise unary transforms.
//!
//! A unary operation descends to the leaves, rewrites each leaf expression,
//! and rebuilds the diagram bottom-up. The shape of the diagram is preserved
//! for every operator except `sgn`, which wraps each leaf in fresh sign
//! decisions, and `not`, which inverts the 0/1 leaves of a Boolean-valued
//! diagram.

use log::debug;
use num_traits::{Signed, Zero};

use crate::decision::Rel;
use crate::error::{Result, XaddError};
use crate::expr::Func;
use crate::node::Node;
use crate::types::{ExprId, NodeId};
use crate::xadd::Xadd;

/// The closed unary operator set.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum UnaryOp {
    Sin,
    Cos,
    Tan,
    Sinh,
    Cosh,
    Tanh,
    Exp,
    Log,
    Log2,
    Log10,
    Log1p,
    Floor,
    Ceil,
    Sqrt,
    /// Power with a symbolic or constant exponent.
    Pow(ExprId),
    Neg,
    Pos,
    Sgn,
    Not,
}

impl UnaryOp {
    pub fn name(self) -> &'static str {
        match self {
            UnaryOp::Sin => "sin",
            UnaryOp::Cos => "cos",
            UnaryOp::Tan => "tan",
            UnaryOp::Sinh => "sinh",
            UnaryOp::Cosh => "cosh",
            UnaryOp::Tanh => "tanh",
            UnaryOp::Exp => "exp",
            UnaryOp::Log => "log",
            UnaryOp::Log2 => "log2",
            UnaryOp::Log10 => "log10",
            UnaryOp::Log1p => "log1p",
            UnaryOp::Floor => "floor",
            UnaryOp::Ceil => "ceil",
            UnaryOp::Sqrt => "sqrt",
            UnaryOp::Pow(_) => "pow",
            UnaryOp::Neg => "neg",
            UnaryOp::Pos => "pos",
            UnaryOp::Sgn => "sgn",
            UnaryOp::Not => "not",
        }
    }

    /// Resolves an operator name; `pow` requires the exponent argument.
    pub fn from_name(name: &str, arg: Option<ExprId>) -> Result<UnaryOp> {
        let op = match name {
            "sin" => UnaryOp::Sin,
            "cos" => UnaryOp::Cos,
            "tan" => UnaryOp::Tan,
            "sinh" => UnaryOp::Sinh,
            "cosh" => UnaryOp::Cosh,
            "tanh" => UnaryOp::Tanh,
            "exp" => UnaryOp::Exp,
            "log" => UnaryOp::Log,
            "log2" => UnaryOp::Log2,
            "log10" => UnaryOp::Log10,
            "log1p" => UnaryOp::Log1p,
            "floor" => UnaryOp::Floor,
            "ceil" => UnaryOp::Ceil,
            "sqrt" => UnaryOp::Sqrt,
            "pow" => {
                return arg.map(UnaryOp::Pow).ok_or_else(|| {
                    XaddError::UnknownOperator("pow requires an exponent argument".into())
                })
            }
            "neg" => UnaryOp::Neg,
            "pos" => UnaryOp::Pos,
            "sgn" => UnaryOp::Sgn,
            "not" => UnaryOp::Not,
            _ => return Err(XaddError::UnknownOperator(name.to_string())),
        };
        Ok(op)
    }

    /// The expression-level function behind a plain leaf-wise operator.
    fn func(self) -> Option<Func> {
        Some(match self {
            UnaryOp::Sin => Func::Sin,
            UnaryOp::Cos => Func::Cos,
            UnaryOp::Tan => Func::Tan,
            UnaryOp::Sinh => Func::Sinh,
            UnaryOp::Cosh => Func::Cosh,
            UnaryOp::Tanh => Func::Tanh,
            UnaryOp::Exp => Func::Exp,
            UnaryOp::Log => Func::Log,
            UnaryOp::Log2 => Func::Log2,
            UnaryOp::Log10 => Func::Log10,
            UnaryOp::Log1p => Func::Log1p,
            UnaryOp::Floor => Func::Floor,
            UnaryOp::Ceil => Func::Ceil,
            UnaryOp::Sqrt => Func::Sqrt,
            _ => return None,
        })
    }

    fn cache_key(self) -> (u64, u64) {
        match self {
            UnaryOp::Pow(arg) => (14, arg.index() as u64),
            UnaryOp::Sin => (0, u64::MAX),
            UnaryOp::Cos => (1, u64::MAX),
            UnaryOp::Tan => (2, u64::MAX),
            UnaryOp::Sinh => (3, u64::MAX),
            UnaryOp::Cosh => (4, u64::MAX),
            UnaryOp::Tanh => (5, u64::MAX),
            UnaryOp::Exp => (6, u64::MAX),
            UnaryOp::Log => (7, u64::MAX),
            UnaryOp::Log2 => (8, u64::MAX),
            UnaryOp::Log10 => (9, u64::MAX),
            UnaryOp::Log1p => (10, u64::MAX),
            UnaryOp::Floor => (11, u64::MAX),
            UnaryOp::Ceil => (12, u64::MAX),
            UnaryOp::Sqrt => (13, u64::MAX),
            UnaryOp::Neg => (15, u64::MAX),
            UnaryOp::Pos => (16, u64::MAX),
            UnaryOp::Sgn => (17, u64::MAX),
            UnaryOp::Not => (18, u64::MAX),
        }
    }
}

impl Xadd {
    /// Applies a unary operator to every leaf of `f`.
    pub fn unary(&mut self, f: NodeId, op: UnaryOp) -> Result<NodeId> {
        debug!("unary(f = {}, op = {})", f, op.name());
        if op == UnaryOp::Pos {
            return Ok(f);
        }
        self.unary_rec(f, op)
    }

    fn unary_rec(&mut self, f: NodeId, op: UnaryOp) -> Result<NodeId> {
        let (c0, c1) = op.cache_key();
        let key = (c0, c1, f.index() as u64);
        if let Some(res) = self.unary_cache.get(&key) {
            return Ok(res);
        }

        let res = match self.store.get(f) {
            Node::Internal { dec, low, high } => {
                let lo = self.unary_rec(low, op)?;
                let hi = self.unary_rec(high, op)?;
                self.emit(dec, lo, hi)?
            }
            Node::Leaf(e) => self.unary_leaf(e, op)?,
        };

        self.unary_cache.insert(key, res);
        Ok(res)
    }

    fn unary_leaf(&mut self, e: ExprId, op: UnaryOp) -> Result<NodeId> {
        match op {
            UnaryOp::Neg => {
                let out = self.pool.neg(e);
                Ok(self.leaf(out))
            }
            UnaryOp::Pow(exp) => {
                let out = self.pool.pow(e, exp)?;
                Ok(self.leaf(out))
            }
            UnaryOp::Not => {
                // Boolean-valued diagrams only: flip the 0/1 leaves.
                match self.pool.truth_value(e) {
                    Some(true) => Ok(self.zero),
                    Some(false) => Ok(self.one),
                    None => Err(XaddError::LeafEvaluation(format!(
                        "`not` on non-constant leaf `{}`",
                        self.pool.display(e)
                    ))),
                }
            }
            UnaryOp::Sgn => self.sgn_leaf(e),
            UnaryOp::Pos => unreachable!("pos returns its input at the top level"),
            _ => {
                let func = op.func().expect("remaining operators are function-backed");
                let out = self.pool.func(func, e)?;
                Ok(self.leaf(out))
            }
        }
    }

    /// Sign of a leaf: `-1` where it is negative, `0` where it is zero, `+1`
    /// where it is positive. Non-constant leaves are wrapped in the decision
    /// `leaf <= 0`, with the zero branch nested under `leaf >= 0`.
    fn sgn_leaf(&mut self, e: ExprId) -> Result<NodeId> {
        if let Some(c) = self.pool.as_const(e) {
            let sign = if c.is_negative() {
                -1
            } else if c.is_zero() {
                0
            } else {
                1
            };
            return Ok(self.int_leaf(sign));
        }

        let zero_e = self.pool.zero();
        let neg_e = self.pool.neg(e);

        // leaf <= 0 and leaf >= 0; the overlap is exactly leaf == 0.
        let nonpos = self.cmp_indicator(e, Rel::Leq, zero_e)?;
        let nonneg = self.cmp_indicator(neg_e, Rel::Leq, zero_e)?;

        let minus_one = self.int_leaf(-1);
        let one = self.one;
        let zero = self.zero;

        let at_most = self.ite(nonneg, zero, minus_one)?;
        self.ite(nonpos, at_most, one)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_unknown_operator_name() {
        assert!(matches!(
            UnaryOp::from_name("cbrt", None),
            Err(XaddError::UnknownOperator(_))
        ));
        assert!(matches!(
            UnaryOp::from_name("pow", None),
            Err(XaddError::UnknownOperator(_))
        ));
    }

    #[test]
    fn test_neg_leaf() {
        let mut xadd = Xadd::new();
        let x = xadd.declare_cont("x");
        let fx = xadd.var_leaf(x);
        let neg = xadd.unary(fx, UnaryOp::Neg).unwrap();

        let xe = xadd.pool_mut().var(x);
        let neg_e = xadd.pool_mut().neg(xe);
        let expected = xadd.leaf(neg_e);
        assert_eq!(neg, expected);
    }

    #[test]
    fn test_neg_distributes_over_branches() {
        let mut xadd = Xadd::new();
        let x = xadd.declare_cont("x");
        let y = xadd.declare_cont("y");
        let fx = xadd.var_leaf(x);
        let fy = xadd.var_leaf(y);
        let m = xadd.apply_min(fx, fy).unwrap();

        let neg = xadd.unary(m, UnaryOp::Neg).unwrap();
        match (xadd.node(m), xadd.node(neg)) {
            (Node::Internal { dec: dm, .. }, Node::Internal { dec: dn, low, high }) => {
                assert_eq!(dm, dn);
                assert!(xadd.is_leaf(low));
                assert!(xadd.is_leaf(high));
            }
            _ => panic!("expected decision nodes"),
        }
    }

    #[test]
    fn test_exp_of_zero_folds() {
        let mut xadd = Xadd::new();
        let res = xadd.unary(xadd.zero, UnaryOp::Exp).unwrap();
        assert_eq!(res, xadd.one);
    }

    #[test]
    fn test_log_of_nonpositive_constant_fails() {
        let mut xadd = Xadd::new();
        let neg = xadd.int_leaf(-3);
        assert!(matches!(
            xadd.unary(neg, UnaryOp::Log),
            Err(XaddError::LeafEvaluation(_))
        ));
    }

    #[test]
    fn test_pow_with_constant_exponent() {
        let mut xadd = Xadd::new();
        let three = xadd.int_leaf(3);
        let two = xadd.pool_mut().int_const(2);
        let res = xadd.unary(three, UnaryOp::Pow(two)).unwrap();
        assert_eq!(res, xadd.int_leaf(9));
    }

    #[test]
    fn test_not_flips_indicator() {
        use crate::apply::BinOp;

        let mut xadd = Xadd::new();
        let x = xadd.declare_cont("x");
        let fx = xadd.var_leaf(x);
        let two = xadd.int_leaf(2);

        let ind = xadd.apply(fx, two, BinOp::Leq).unwrap();
        let flipped = xadd.unary(ind, UnaryOp::Not).unwrap();
        let back = xadd.unary(flipped, UnaryOp::Not).unwrap();
        assert_eq!(back, ind);
        assert_ne!(flipped, ind);
    }

    #[test]
    fn test_not_on_arithmetic_leaf_fails() {
        let mut xadd = Xadd::new();
        let x = xadd.declare_cont("x");
        let fx = xadd.var_leaf(x);
        assert!(matches!(
            xadd.unary(fx, UnaryOp::Not),
            Err(XaddError::LeafEvaluation(_))
        ));
    }

    #[test]
    fn test_sgn_of_constants() {
        let mut xadd = Xadd::new();
        let five = xadd.int_leaf(5);
        let neg = xadd.int_leaf(-2);
        assert_eq!(xadd.unary(five, UnaryOp::Sgn).unwrap(), xadd.one);
        let minus_one = xadd.int_leaf(-1);
        assert_eq!(xadd.unary(neg, UnaryOp::Sgn).unwrap(), minus_one);
        assert_eq!(xadd.unary(xadd.zero, UnaryOp::Sgn).unwrap(), xadd.zero);
    }

    #[test]
    fn test_sgn_of_variable() {
        let mut xadd = Xadd::new();
        let x = xadd.declare_cont("x");
        let fx = xadd.var_leaf(x);
        let s = xadd.unary(fx, UnaryOp::Sgn).unwrap();

        // Evaluate at a few points through the structure: x = -1, 0, 1.
        use hashbrown::HashMap;
        use num_rational::Rational64;
        for (value, expected) in [(-1i64, -1.0), (0, 0.0), (1, 1.0)] {
            let bools = HashMap::new();
            let mut cont = HashMap::new();
            cont.insert(x, Rational64::from_integer(value));
            let got = xadd.evaluate(s, &bools, &cont, true).unwrap().unwrap();
            assert_eq!(got, expected, "sgn at x = {}", value);
        }
    }

    #[test]
    fn test_pos_is_identity() {
        let mut xadd = Xadd::new();
        let x = xadd.declare_cont("x");
        let fx = xadd.var_leaf(x);
        assert_eq!(xadd.unary(fx, UnaryOp::Pos).unwrap(), fx);
    }

    #[test]
    fn test_unary_memoized() {
        let mut xadd = Xadd::new();
        let x = xadd.declare_cont("x");
        let fx = xadd.var_leaf(x);
        let a = xadd.unary(fx, UnaryOp::Exp).unwrap();
        let b = xadd.unary(fx, UnaryOp::Exp).unwrap();
        assert_eq!(a, b);
    }
}
