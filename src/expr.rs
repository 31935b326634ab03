//! Symbolic expression layer: the algebra behind leaves and decisions.
//!
//! All expressions live in an [`ExprPool`] and are referenced by [`ExprId`].
//! The pool hash-conses canonical forms, so structural equality of two
//! expressions is id equality. Canonicalization happens in the smart
//! constructors: sums are flattened with like terms merged, products are
//! flattened, constant-folded, and distributed over sums, and trivial powers
//! and function applications fold away. The resulting normal form is a sum of
//! monomials over the atoms `Var`, `Pow`, and `Func`.
//!
//! Arithmetic is exact: coefficients and constants are [`Rational64`].
//! Numeric evaluation lowers to `f64` only at the very end, in
//! [`ExprPool::eval_f64`].

use std::collections::{BTreeMap, BTreeSet};

use hashbrown::HashMap;
use itertools::Itertools;
use log::debug;
use num_rational::Rational64;
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::error::{Result, XaddError};
use crate::types::{ExprId, VarId};

/// Unary function atoms understood by the expression layer.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Func {
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
}

impl Func {
    pub fn name(self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Sinh => "sinh",
            Func::Cosh => "cosh",
            Func::Tanh => "tanh",
            Func::Exp => "exp",
            Func::Log => "log",
            Func::Log2 => "log2",
            Func::Log10 => "log10",
            Func::Log1p => "log1p",
            Func::Floor => "floor",
            Func::Ceil => "ceil",
            Func::Sqrt => "sqrt",
        }
    }

    pub fn from_name(name: &str) -> Option<Func> {
        Some(match name {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "sinh" => Func::Sinh,
            "cosh" => Func::Cosh,
            "tanh" => Func::Tanh,
            "exp" => Func::Exp,
            "log" => Func::Log,
            "log2" => Func::Log2,
            "log10" => Func::Log10,
            "log1p" => Func::Log1p,
            "floor" => Func::Floor,
            "ceil" => Func::Ceil,
            "sqrt" => Func::Sqrt,
            _ => return None,
        })
    }
}

/// An interned expression. Children are pool ids; `Add` and `Mul` are n-ary,
/// flattened, and kept in canonical order by the smart constructors.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum Expr {
    Const(Rational64),
    Var(VarId),
    Add(Vec<ExprId>),
    Mul(Vec<ExprId>),
    Pow(ExprId, ExprId),
    Func(Func, ExprId),
}

/// A linear view of an expression: `Σ aᵢ·xᵢ + c`.
///
/// Terms are sorted by variable id and carry nonzero coefficients.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct LinearExpr {
    pub terms: Vec<(VarId, Rational64)>,
    pub constant: Rational64,
}

impl LinearExpr {
    pub fn constant(c: Rational64) -> Self {
        LinearExpr { terms: Vec::new(), constant: c }
    }

    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// Multiplies every coefficient and the constant by `k`.
    pub fn scale(&self, k: Rational64) -> Self {
        if k.is_zero() {
            return LinearExpr::constant(Rational64::zero());
        }
        LinearExpr {
            terms: self.terms.iter().map(|&(v, a)| (v, a * k)).collect(),
            constant: self.constant * k,
        }
    }

    /// Term-wise sum of two linear views.
    pub fn sum(&self, other: &LinearExpr) -> Self {
        let mut terms: BTreeMap<VarId, Rational64> = BTreeMap::new();
        for &(v, a) in self.terms.iter().chain(other.terms.iter()) {
            *terms.entry(v).or_insert_with(Rational64::zero) += a;
        }
        LinearExpr {
            terms: terms.into_iter().filter(|(_, a)| !a.is_zero()).collect(),
            constant: self.constant + other.constant,
        }
    }

    /// Evaluates the linear form exactly under a rational assignment.
    /// Returns `None` if a variable is unbound.
    pub fn eval(&self, assign: &HashMap<VarId, Rational64>) -> Option<Rational64> {
        let mut acc = self.constant;
        for &(v, a) in &self.terms {
            acc += a * *assign.get(&v)?;
        }
        Some(acc)
    }
}

struct VarInfo {
    name: String,
    boolean: bool,
}

/// Interning pool for variables and canonical expressions.
pub struct ExprPool {
    exprs: Vec<Expr>,
    index: HashMap<Expr, ExprId>,
    vars: Vec<VarInfo>,
    var_index: HashMap<String, VarId>,
    zero: ExprId,
    one: ExprId,
}

impl Default for ExprPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ExprPool {
    pub fn new() -> Self {
        let mut pool = ExprPool {
            exprs: Vec::new(),
            index: HashMap::new(),
            vars: Vec::new(),
            var_index: HashMap::new(),
            zero: ExprId::new(0),
            one: ExprId::new(0),
        };
        pool.zero = pool.intern(Expr::Const(Rational64::zero()));
        pool.one = pool.intern(Expr::Const(Rational64::one()));
        pool
    }

    fn intern(&mut self, expr: Expr) -> ExprId {
        if let Some(&id) = self.index.get(&expr) {
            return id;
        }
        let id = ExprId::new(self.exprs.len() as u32);
        self.exprs.push(expr.clone());
        self.index.insert(expr, id);
        id
    }

    pub fn get(&self, id: ExprId) -> &Expr {
        &self.exprs[id.index() as usize]
    }

    pub fn len(&self) -> usize {
        self.exprs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exprs.is_empty()
    }

    // ---- variables -------------------------------------------------------

    /// Declares (or re-resolves) a continuous variable.
    pub fn declare_cont(&mut self, name: &str) -> VarId {
        self.declare(name, false)
    }

    /// Declares (or re-resolves) a Boolean variable.
    pub fn declare_bool(&mut self, name: &str) -> VarId {
        self.declare(name, true)
    }

    fn declare(&mut self, name: &str, boolean: bool) -> VarId {
        if let Some(&v) = self.var_index.get(name) {
            assert_eq!(
                self.vars[v.index() as usize].boolean,
                boolean,
                "Variable `{}` re-declared with a different kind",
                name
            );
            return v;
        }
        let v = VarId::new(self.vars.len() as u32);
        debug!("declare(name = {}, boolean = {}) -> {}", name, boolean, v);
        self.vars.push(VarInfo { name: name.to_string(), boolean });
        self.var_index.insert(name.to_string(), v);
        v
    }

    pub fn var_named(&self, name: &str) -> Option<VarId> {
        self.var_index.get(name).copied()
    }

    pub fn var_name(&self, v: VarId) -> &str {
        &self.vars[v.index() as usize].name
    }

    pub fn is_bool_var(&self, v: VarId) -> bool {
        self.vars[v.index() as usize].boolean
    }

    // ---- constructors ----------------------------------------------------

    pub fn zero(&self) -> ExprId {
        self.zero
    }

    pub fn one(&self) -> ExprId {
        self.one
    }

    pub fn constant(&mut self, c: Rational64) -> ExprId {
        self.intern(Expr::Const(c))
    }

    pub fn int_const(&mut self, n: i64) -> ExprId {
        self.constant(Rational64::from_integer(n))
    }

    pub fn var(&mut self, v: VarId) -> ExprId {
        self.intern(Expr::Var(v))
    }

    /// Canonical n-ary sum: flattens nested sums, merges like terms, folds
    /// constants, and orders monomials deterministically.
    pub fn add(&mut self, terms: &[ExprId]) -> ExprId {
        let mut constant = Rational64::zero();
        let mut coeffs: BTreeMap<ExprId, Rational64> = BTreeMap::new();
        for &t in terms {
            self.accumulate_sum(t, &mut constant, &mut coeffs);
        }

        let mut items = Vec::with_capacity(coeffs.len() + 1);
        for (core, coeff) in coeffs {
            if coeff.is_zero() {
                continue;
            }
            items.push(self.mul_coeff(coeff, core));
        }
        if !constant.is_zero() {
            items.push(self.constant(constant));
        }

        match items.len() {
            0 => self.zero,
            1 => items[0],
            _ => self.intern(Expr::Add(items)),
        }
    }

    fn accumulate_sum(
        &mut self,
        e: ExprId,
        constant: &mut Rational64,
        coeffs: &mut BTreeMap<ExprId, Rational64>,
    ) {
        match self.get(e).clone() {
            Expr::Const(c) => *constant += c,
            Expr::Add(items) => {
                for item in items {
                    self.accumulate_sum(item, constant, coeffs);
                }
            }
            _ => {
                let (c, core) = self.split_coeff(e);
                *coeffs.entry(core).or_insert_with(Rational64::zero) += c;
            }
        }
    }

    /// Splits `e` into `(coefficient, monomial)`; the monomial carries no
    /// constant factor.
    fn split_coeff(&mut self, e: ExprId) -> (Rational64, ExprId) {
        if let Expr::Mul(factors) = self.get(e) {
            if let Expr::Const(c) = self.get(factors[0]) {
                let c = *c;
                let rest = factors[1..].to_vec();
                let core = if rest.len() == 1 {
                    rest[0]
                } else {
                    self.intern(Expr::Mul(rest))
                };
                return (c, core);
            }
        }
        (Rational64::one(), e)
    }

    /// `coeff * core` with a canonical monomial layout.
    fn mul_coeff(&mut self, coeff: Rational64, core: ExprId) -> ExprId {
        if coeff.is_zero() {
            return self.zero;
        }
        if coeff.is_one() {
            return core;
        }
        let mut items = vec![self.constant(coeff)];
        match self.get(core).clone() {
            Expr::Mul(factors) => items.extend(factors),
            _ => items.push(core),
        }
        self.intern(Expr::Mul(items))
    }

    /// Canonical n-ary product: flattens, folds constants, sorts factors, and
    /// distributes over sums so the result is a sum of monomials.
    pub fn mul(&mut self, factors: &[ExprId]) -> ExprId {
        let mut coeff = Rational64::one();
        let mut plain: Vec<ExprId> = Vec::new();
        let mut sums: Vec<Vec<ExprId>> = Vec::new();
        let mut pending: Vec<ExprId> = factors.to_vec();
        pending.reverse();

        while let Some(f) = pending.pop() {
            match self.get(f).clone() {
                Expr::Const(c) => coeff *= c,
                Expr::Mul(items) => {
                    for item in items.into_iter().rev() {
                        pending.push(item);
                    }
                }
                Expr::Add(items) => sums.push(items),
                _ => plain.push(f),
            }
        }

        if coeff.is_zero() {
            return self.zero;
        }

        if !sums.is_empty() {
            // Distribute over every sum factor.
            let coeff_expr = self.constant(coeff);
            let combos: Vec<Vec<ExprId>> = sums
                .iter()
                .multi_cartesian_product()
                .map(|picked| {
                    let mut combo = plain.clone();
                    combo.push(coeff_expr);
                    combo.extend(picked.into_iter().copied());
                    combo
                })
                .collect();
            let terms: Vec<ExprId> =
                combos.into_iter().map(|combo| self.mul(&combo)).collect();
            return self.add(&terms);
        }

        plain.sort();
        if plain.is_empty() {
            return self.constant(coeff);
        }
        if coeff.is_one() && plain.len() == 1 {
            return plain[0];
        }
        let mut items = Vec::with_capacity(plain.len() + 1);
        if !coeff.is_one() {
            items.push(self.constant(coeff));
        }
        items.push(plain[0]);
        items.extend_from_slice(&plain[1..]);
        self.intern(Expr::Mul(items))
    }

    pub fn neg(&mut self, e: ExprId) -> ExprId {
        let minus_one = self.constant(-Rational64::one());
        self.mul(&[minus_one, e])
    }

    pub fn sub(&mut self, lhs: ExprId, rhs: ExprId) -> ExprId {
        let neg_rhs = self.neg(rhs);
        self.add(&[lhs, neg_rhs])
    }

    /// Division. Fails on the literal zero divisor; a symbolic divisor is
    /// kept as a reciprocal power.
    pub fn div(&mut self, lhs: ExprId, rhs: ExprId) -> Result<ExprId> {
        if let Expr::Const(c) = self.get(rhs) {
            if c.is_zero() {
                return Err(XaddError::LeafEvaluation("division by zero".into()));
            }
            let inv = self.constant(c.recip());
            return Ok(self.mul(&[lhs, inv]));
        }
        let minus_one = self.int_const(-1);
        let recip = self.pow(rhs, minus_one)?;
        Ok(self.mul(&[lhs, recip]))
    }

    /// Power with constant folding for small integer exponents.
    pub fn pow(&mut self, base: ExprId, exp: ExprId) -> Result<ExprId> {
        if let Expr::Const(x) = self.get(exp) {
            let x = *x;
            if x.is_zero() {
                return Ok(self.one);
            }
            if x.is_one() {
                return Ok(base);
            }
            if let Expr::Const(b) = self.get(base) {
                let b = *b;
                if x.is_integer() {
                    let n = *x.numer();
                    if b.is_zero() && n < 0 {
                        return Err(XaddError::LeafEvaluation(
                            "zero raised to a negative power".into(),
                        ));
                    }
                    if n.unsigned_abs() <= 64 {
                        return Ok(self.constant(b.pow(n as i32)));
                    }
                }
            }
        }
        if let Expr::Const(b) = self.get(base) {
            if b.is_one() {
                return Ok(self.one);
            }
        }
        Ok(self.intern(Expr::Pow(base, exp)))
    }

    /// Unary function application with exact folding where defined.
    pub fn func(&mut self, f: Func, arg: ExprId) -> Result<ExprId> {
        if let Expr::Const(c) = self.get(arg) {
            let c = *c;
            match f {
                Func::Floor => return Ok(self.constant(c.floor())),
                Func::Ceil => return Ok(self.constant(c.ceil())),
                Func::Sqrt => {
                    if c.is_negative() {
                        return Err(XaddError::LeafEvaluation(
                            "sqrt of a negative constant".into(),
                        ));
                    }
                    if let Some(root) = rational_sqrt(c) {
                        return Ok(self.constant(root));
                    }
                }
                Func::Log | Func::Log2 | Func::Log10 => {
                    if !c.is_positive() {
                        return Err(XaddError::LeafEvaluation(
                            "log of a non-positive constant".into(),
                        ));
                    }
                    if c.is_one() {
                        return Ok(self.zero);
                    }
                }
                Func::Log1p => {
                    if c <= -Rational64::one() {
                        return Err(XaddError::LeafEvaluation(
                            "log1p of a constant at or below -1".into(),
                        ));
                    }
                    if c.is_zero() {
                        return Ok(self.zero);
                    }
                }
                Func::Exp | Func::Sin | Func::Tan | Func::Sinh | Func::Tanh => {
                    if c.is_zero() {
                        return Ok(match f {
                            Func::Exp => self.one,
                            _ => self.zero,
                        });
                    }
                }
                Func::Cos | Func::Cosh => {
                    if c.is_zero() {
                        return Ok(self.one);
                    }
                }
            }
        }
        Ok(self.intern(Expr::Func(f, arg)))
    }

    // ---- queries ---------------------------------------------------------

    pub fn as_const(&self, e: ExprId) -> Option<Rational64> {
        match self.get(e) {
            Expr::Const(c) => Some(*c),
            _ => None,
        }
    }

    /// Truth value of a leaf under the nonzero-is-true coercion, when it is
    /// decidable without an assignment.
    pub fn truth_value(&self, e: ExprId) -> Option<bool> {
        self.as_const(e).map(|c| !c.is_zero())
    }

    /// Extracts the linear view `Σ aᵢ·xᵢ + c`, or `None` if the expression
    /// is not linear in the variables.
    pub fn as_linear(&self, e: ExprId) -> Option<LinearExpr> {
        match self.get(e) {
            Expr::Const(c) => Some(LinearExpr::constant(*c)),
            Expr::Var(v) => Some(LinearExpr {
                terms: vec![(*v, Rational64::one())],
                constant: Rational64::zero(),
            }),
            Expr::Add(items) => {
                let mut acc = LinearExpr::constant(Rational64::zero());
                for &item in items {
                    acc = acc.sum(&self.as_linear(item)?);
                }
                Some(acc)
            }
            Expr::Mul(items) => {
                // Canonical products are monomials; the only linear shape is
                // `constant * variable`.
                if items.len() != 2 {
                    return None;
                }
                match (self.get(items[0]), self.get(items[1])) {
                    (Expr::Const(c), Expr::Var(v)) => Some(LinearExpr {
                        terms: vec![(*v, *c)],
                        constant: Rational64::zero(),
                    }),
                    _ => None,
                }
            }
            Expr::Pow(..) | Expr::Func(..) => None,
        }
    }

    /// Rebuilds the pool expression for a linear view.
    pub fn linear_to_expr(&mut self, lin: &LinearExpr) -> ExprId {
        let mut terms = Vec::with_capacity(lin.terms.len() + 1);
        for &(v, a) in &lin.terms {
            let var = self.var(v);
            let coeff = self.constant(a);
            terms.push(self.mul(&[coeff, var]));
        }
        if !lin.constant.is_zero() {
            terms.push(self.constant(lin.constant));
        }
        self.add(&terms)
    }

    /// Free variables of an expression.
    pub fn free_vars(&self, e: ExprId) -> BTreeSet<VarId> {
        let mut out = BTreeSet::new();
        self.collect_free_vars(e, &mut out);
        out
    }

    fn collect_free_vars(&self, e: ExprId, out: &mut BTreeSet<VarId>) {
        match self.get(e) {
            Expr::Const(_) => {}
            Expr::Var(v) => {
                out.insert(*v);
            }
            Expr::Add(items) | Expr::Mul(items) => {
                for &item in items {
                    self.collect_free_vars(item, out);
                }
            }
            Expr::Pow(b, x) => {
                self.collect_free_vars(*b, out);
                self.collect_free_vars(*x, out);
            }
            Expr::Func(_, a) => self.collect_free_vars(*a, out),
        }
    }

    /// Whether any Boolean variable occurs in the expression.
    pub fn contains_bool_var(&self, e: ExprId) -> bool {
        self.free_vars(e).iter().any(|&v| self.is_bool_var(v))
    }

    // ---- substitution and evaluation -------------------------------------

    /// Replaces variables by expressions, re-canonicalizing bottom-up.
    pub fn substitute(&mut self, e: ExprId, map: &HashMap<VarId, ExprId>) -> Result<ExprId> {
        let mut memo: HashMap<ExprId, ExprId> = HashMap::new();
        self.subst_rec(e, map, &mut memo)
    }

    fn subst_rec(
        &mut self,
        e: ExprId,
        map: &HashMap<VarId, ExprId>,
        memo: &mut HashMap<ExprId, ExprId>,
    ) -> Result<ExprId> {
        if let Some(&res) = memo.get(&e) {
            return Ok(res);
        }
        let res = match self.get(e).clone() {
            Expr::Const(_) => e,
            Expr::Var(v) => map.get(&v).copied().unwrap_or(e),
            Expr::Add(items) => {
                let rewritten = items
                    .into_iter()
                    .map(|item| self.subst_rec(item, map, memo))
                    .collect::<Result<Vec<_>>>()?;
                self.add(&rewritten)
            }
            Expr::Mul(items) => {
                let rewritten = items
                    .into_iter()
                    .map(|item| self.subst_rec(item, map, memo))
                    .collect::<Result<Vec<_>>>()?;
                self.mul(&rewritten)
            }
            Expr::Pow(b, x) => {
                let b = self.subst_rec(b, map, memo)?;
                let x = self.subst_rec(x, map, memo)?;
                self.pow(b, x)?
            }
            Expr::Func(f, a) => {
                let a = self.subst_rec(a, map, memo)?;
                self.func(f, a)?
            }
        };
        memo.insert(e, res);
        Ok(res)
    }

    /// Numeric evaluation under a full `f64` assignment.
    pub fn eval_f64(&self, e: ExprId, assign: &HashMap<VarId, f64>) -> Result<f64> {
        match self.get(e) {
            Expr::Const(c) => Ok(ratio_to_f64(*c)),
            Expr::Var(v) => assign
                .get(v)
                .copied()
                .ok_or_else(|| XaddError::PartialAssignment(self.var_name(*v).to_string())),
            Expr::Add(items) => {
                let mut acc = 0.0;
                for &item in items {
                    acc += self.eval_f64(item, assign)?;
                }
                Ok(acc)
            }
            Expr::Mul(items) => {
                let mut acc = 1.0;
                for &item in items {
                    acc *= self.eval_f64(item, assign)?;
                }
                Ok(acc)
            }
            Expr::Pow(b, x) => {
                let b = self.eval_f64(*b, assign)?;
                let x = self.eval_f64(*x, assign)?;
                if b == 0.0 && x < 0.0 {
                    return Err(XaddError::LeafEvaluation("division by zero".into()));
                }
                let val = b.powf(x);
                if val.is_nan() {
                    return Err(XaddError::LeafEvaluation(format!(
                        "{}^{} is undefined over the reals",
                        b, x
                    )));
                }
                Ok(val)
            }
            Expr::Func(f, a) => {
                let a = self.eval_f64(*a, assign)?;
                eval_func(*f, a)
            }
        }
    }

    // ---- printing --------------------------------------------------------

    /// Renders the expression in the textual grammar accepted by the parser.
    pub fn display(&self, e: ExprId) -> String {
        let mut out = String::new();
        self.fmt_expr(e, 0, &mut out);
        out
    }

    /// Precedence levels: 0 sum, 1 product, 2 power/atom.
    fn fmt_expr(&self, e: ExprId, prec: u8, out: &mut String) {
        match self.get(e) {
            Expr::Const(c) => {
                let negative = c.is_negative();
                if negative && prec >= 1 {
                    out.push('(');
                }
                out.push_str(&fmt_ratio(*c));
                if negative && prec >= 1 {
                    out.push(')');
                }
            }
            Expr::Var(v) => out.push_str(self.var_name(*v)),
            Expr::Add(items) => {
                if prec >= 1 {
                    out.push('(');
                }
                for (i, &item) in items.iter().enumerate() {
                    let (sign, body) = self.render_term(item);
                    if i == 0 {
                        if sign {
                            out.push('-');
                        }
                    } else {
                        out.push_str(if sign { " - " } else { " + " });
                    }
                    out.push_str(&body);
                }
                if prec >= 1 {
                    out.push(')');
                }
            }
            Expr::Mul(items) => {
                if let Expr::Const(c) = self.get(items[0]) {
                    if c.is_negative() {
                        // Sign-extracted form: print `-x`, not `(-1)*x`.
                        if prec >= 1 {
                            out.push('(');
                        }
                        out.push('-');
                        let positive = -*c;
                        if !positive.is_one() {
                            out.push_str(&fmt_ratio(positive));
                            out.push('*');
                        }
                        self.fmt_mul_body(&items[1..], out);
                        if prec >= 1 {
                            out.push(')');
                        }
                        return;
                    }
                }
                if prec >= 2 {
                    out.push('(');
                }
                self.fmt_mul_body(items, out);
                if prec >= 2 {
                    out.push(')');
                }
            }
            Expr::Pow(b, x) => {
                self.fmt_expr(*b, 2, out);
                out.push('^');
                self.fmt_expr(*x, 2, out);
            }
            Expr::Func(f, a) => {
                out.push_str(f.name());
                out.push('(');
                self.fmt_expr(*a, 0, out);
                out.push(')');
            }
        }
    }

    /// Factors joined with `*`, each at atom precedence.
    fn fmt_mul_body(&self, factors: &[ExprId], out: &mut String) {
        for (i, &factor) in factors.iter().enumerate() {
            if i > 0 {
                out.push('*');
            }
            self.fmt_expr(factor, 2, out);
        }
    }

    /// Renders a summand as an explicit sign plus an unsigned body, so sums
    /// print as `a - b` rather than `a + -1*b`.
    fn render_term(&self, e: ExprId) -> (bool, String) {
        match self.get(e) {
            Expr::Const(c) if c.is_negative() => (true, fmt_ratio(-*c)),
            Expr::Mul(factors) => {
                if let Expr::Const(c) = self.get(factors[0]) {
                    if c.is_negative() {
                        let mut out = String::new();
                        let positive = -*c;
                        if !positive.is_one() {
                            out.push_str(&fmt_ratio(positive));
                            out.push('*');
                        }
                        self.fmt_mul_body(&factors[1..], &mut out);
                        return (true, out);
                    }
                }
                let mut out = String::new();
                self.fmt_mul_body(factors, &mut out);
                (false, out)
            }
            _ => {
                let mut out = String::new();
                self.fmt_expr(e, 1, &mut out);
                (false, out)
            }
        }
    }
}

fn fmt_ratio(c: Rational64) -> String {
    if c.is_integer() {
        format!("{}", c.numer())
    } else {
        format!("{}/{}", c.numer(), c.denom())
    }
}

fn ratio_to_f64(c: Rational64) -> f64 {
    c.to_f64().unwrap_or_else(|| *c.numer() as f64 / *c.denom() as f64)
}

fn eval_func(f: Func, a: f64) -> Result<f64> {
    let val = match f {
        Func::Sin => a.sin(),
        Func::Cos => a.cos(),
        Func::Tan => a.tan(),
        Func::Sinh => a.sinh(),
        Func::Cosh => a.cosh(),
        Func::Tanh => a.tanh(),
        Func::Exp => a.exp(),
        Func::Log => {
            if a <= 0.0 {
                return Err(XaddError::LeafEvaluation("log of a non-positive value".into()));
            }
            a.ln()
        }
        Func::Log2 => {
            if a <= 0.0 {
                return Err(XaddError::LeafEvaluation("log2 of a non-positive value".into()));
            }
            a.log2()
        }
        Func::Log10 => {
            if a <= 0.0 {
                return Err(XaddError::LeafEvaluation("log10 of a non-positive value".into()));
            }
            a.log10()
        }
        Func::Log1p => {
            if a <= -1.0 {
                return Err(XaddError::LeafEvaluation("log1p of a value at or below -1".into()));
            }
            a.ln_1p()
        }
        Func::Floor => a.floor(),
        Func::Ceil => a.ceil(),
        Func::Sqrt => {
            if a < 0.0 {
                return Err(XaddError::LeafEvaluation("sqrt of a negative value".into()));
            }
            a.sqrt()
        }
    };
    Ok(val)
}

/// Exact square root of a rational, when both numerator and denominator are
/// perfect squares.
fn rational_sqrt(c: Rational64) -> Option<Rational64> {
    fn isqrt(n: i64) -> Option<i64> {
        if n < 0 {
            return None;
        }
        let r = (n as f64).sqrt().round() as i64;
        for cand in [r - 1, r, r + 1] {
            if cand >= 0 && cand * cand == n {
                return Some(cand);
            }
        }
        None
    }
    Some(Rational64::new(isqrt(*c.numer())?, isqrt(*c.denom())?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_xy() -> (ExprPool, ExprId, ExprId) {
        let mut pool = ExprPool::new();
        let x = pool.declare_cont("x");
        let y = pool.declare_cont("y");
        let xe = pool.var(x);
        let ye = pool.var(y);
        (pool, xe, ye)
    }

    #[test]
    fn test_sum_is_commutative() {
        let (mut pool, x, y) = pool_xy();
        let a = pool.add(&[x, y]);
        let b = pool.add(&[y, x]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_like_terms_merge() {
        let (mut pool, x, _) = pool_xy();
        let two_x = pool.add(&[x, x]);
        let two = pool.int_const(2);
        let expected = pool.mul(&[two, x]);
        assert_eq!(two_x, expected);
    }

    #[test]
    fn test_sub_cancels() {
        let (mut pool, x, y) = pool_xy();
        let s = pool.add(&[x, y]);
        let d = pool.sub(s, y);
        assert_eq!(d, x);
        let z = pool.sub(s, s);
        assert_eq!(z, pool.zero());
    }

    #[test]
    fn test_distribution() {
        let (mut pool, x, _) = pool_xy();
        let one = pool.one();
        let x_plus_1 = pool.add(&[x, one]);
        let two = pool.int_const(2);
        let twice = pool.mul(&[two, x_plus_1]);

        let two_x = pool.mul(&[two, x]);
        let expected = pool.add(&[two_x, two]);
        assert_eq!(twice, expected);
    }

    #[test]
    fn test_product_is_commutative() {
        let (mut pool, x, y) = pool_xy();
        let a = pool.mul(&[x, y]);
        let b = pool.mul(&[y, x]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_linear_extraction() {
        let (mut pool, x, y) = pool_xy();
        let three = pool.int_const(3);
        let three_x = pool.mul(&[three, x]);
        let seven = pool.int_const(7);
        let e = pool.add(&[three_x, y, seven]);

        let lin = pool.as_linear(e).unwrap();
        assert_eq!(lin.constant, Rational64::from_integer(7));
        assert_eq!(lin.terms.len(), 2);
        assert_eq!(lin.terms[0].1, Rational64::from_integer(3));
        assert_eq!(lin.terms[1].1, Rational64::from_integer(1));
    }

    #[test]
    fn test_nonlinear_is_rejected() {
        let (mut pool, x, y) = pool_xy();
        let xy = pool.mul(&[x, y]);
        assert!(pool.as_linear(xy).is_none());
        let e = pool.func(Func::Exp, x).unwrap();
        assert!(pool.as_linear(e).is_none());
    }

    #[test]
    fn test_substitute_constant() {
        let (mut pool, x, y) = pool_xy();
        let e = pool.add(&[x, y]);
        let vx = pool.var_named("x").unwrap();
        let mut map = HashMap::new();
        map.insert(vx, pool.int_const(1));
        let result = pool.substitute(e, &map).unwrap();

        let one = pool.one();
        let expected = pool.add(&[y, one]);
        assert_eq!(result, expected);
    }

    #[test]
    fn test_substitute_expression() {
        let (mut pool, x, y) = pool_xy();
        // x := y + 1 in 2*x  =>  2*y + 2
        let two = pool.int_const(2);
        let e = pool.mul(&[two, x]);
        let one = pool.one();
        let y_plus_1 = pool.add(&[y, one]);
        let vx = pool.var_named("x").unwrap();
        let mut map = HashMap::new();
        map.insert(vx, y_plus_1);
        let result = pool.substitute(e, &map).unwrap();

        let two_y = pool.mul(&[two, y]);
        let expected = pool.add(&[two_y, two]);
        assert_eq!(result, expected);
    }

    #[test]
    fn test_eval_f64() {
        let (mut pool, x, y) = pool_xy();
        let vx = pool.var_named("x").unwrap();
        let vy = pool.var_named("y").unwrap();
        let prod = pool.mul(&[x, y]);
        let e = pool.add(&[prod, x]);

        let mut assign = HashMap::new();
        assign.insert(vx, 2.0);
        assign.insert(vy, 3.0);
        assert_eq!(pool.eval_f64(e, &assign).unwrap(), 8.0);
    }

    #[test]
    fn test_eval_log_domain_error() {
        let mut pool = ExprPool::new();
        let x = pool.declare_cont("x");
        let xe = pool.var(x);
        let e = pool.func(Func::Log, xe).unwrap();
        let mut assign = HashMap::new();
        assign.insert(x, -1.0);
        assert!(matches!(
            pool.eval_f64(e, &assign),
            Err(XaddError::LeafEvaluation(_))
        ));
    }

    #[test]
    fn test_div_by_zero_const() {
        let (mut pool, x, _) = pool_xy();
        let zero = pool.zero();
        assert!(matches!(
            pool.div(x, zero),
            Err(XaddError::LeafEvaluation(_))
        ));
    }

    #[test]
    fn test_func_folding() {
        let mut pool = ExprPool::new();
        let half = pool.constant(Rational64::new(3, 2));
        let floored = pool.func(Func::Floor, half).unwrap();
        assert_eq!(floored, pool.one());

        let four = pool.int_const(4);
        let root = pool.func(Func::Sqrt, four).unwrap();
        assert_eq!(root, pool.int_const(2));
    }

    #[test]
    fn test_pow_folding() {
        let mut pool = ExprPool::new();
        let x = pool.declare_cont("x");
        let xe = pool.var(x);
        let one = pool.one();
        let zero = pool.zero();
        assert_eq!(pool.pow(xe, one).unwrap(), xe);
        assert_eq!(pool.pow(xe, zero).unwrap(), pool.one());

        let three = pool.int_const(3);
        let two = pool.int_const(2);
        assert_eq!(pool.pow(three, two).unwrap(), pool.int_const(9));
    }

    #[test]
    fn test_display_round_shape() {
        let (mut pool, x, y) = pool_xy();
        let neg_y = pool.neg(y);
        let e = pool.add(&[x, neg_y]);
        assert_eq!(pool.display(e), "x - y");

        let two = pool.int_const(2);
        let two_x = pool.mul(&[two, x]);
        let e = pool.add(&[two_x, y]);
        assert_eq!(pool.display(e), "2*x + y");
    }

    #[test]
    fn test_display_rational() {
        let mut pool = ExprPool::new();
        let c = pool.constant(Rational64::new(3, 2));
        assert_eq!(pool.display(c), "3/2");
    }

    #[test]
    fn test_free_vars() {
        let (mut pool, x, y) = pool_xy();
        let vx = pool.var_named("x").unwrap();
        let vy = pool.var_named("y").unwrap();
        let e = pool.mul(&[x, y]);
        let vars = pool.free_vars(e);
        assert!(vars.contains(&vx));
        assert!(vars.contains(&vy));
        assert_eq!(vars.len(), 2);
    }
}
