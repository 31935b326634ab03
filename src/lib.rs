//! # xadd-rs: eXtended Algebraic Decision Diagrams in Rust
//!
//! **`xadd-rs`** is a manager-centric library for building and manipulating
//! **XADDs**: decision diagrams whose internal nodes test linear
//! inequalities or Boolean atoms and whose leaves carry symbolic algebraic
//! expressions. An XADD is a compact, canonical representation of a
//! piecewise function over a mixed set of Boolean and continuous variables.
//!
//! ## What is an XADD?
//!
//! Where a BDD represents a Boolean function, an XADD represents a
//! *piecewise symbolic* one: each root-to-leaf path is a conjunction of
//! linear tests carving out a region, and the leaf holds the expression the
//! function takes there. For a fixed decision order the representation is
//! canonical, so structural equality is function equality.
//!
//! ## Key Features
//!
//! - **Manager-Centric Architecture**: all operations go through the
//!   [`Xadd`][crate::xadd::Xadd] manager, which hash-conses nodes,
//!   expressions, and decisions behind stable integer ids.
//! - **Canonical Decisions**: inequalities are normalized (`Σ aᵢ·xᵢ + c ⋈ 0`
//!   with the leading coefficient scaled to one) before interning, so
//!   algebraically equal tests collide to one id.
//! - **Rich Operation Set**: binary `apply` over arithmetic, min/max,
//!   Boolean, and relational operators; leaf-wise unary transforms;
//!   substitution; exact evaluation.
//! - **LP-Backed Pruning**: [`reduce_lp`][crate::xadd::Xadd::reduce_lp]
//!   removes branches whose guards are unreachable under the constraints
//!   accumulated along the path, backed by an exact rational
//!   Fourier–Motzkin feasibility check.
//! - **Textual Format**: an S-expression importer/exporter with round-trip
//!   stability, plus Graphviz export.
//!
//! ## Basic Usage
//!
//! ```rust
//! use xadd_rs::xadd::Xadd;
//!
//! // 1. Initialize the manager
//! let mut xadd = Xadd::new();
//!
//! // 2. Declare variables and build leaves
//! let x = xadd.declare_cont("x");
//! let y = xadd.declare_cont("y");
//! let fx = xadd.var_leaf(x);
//! let fy = xadd.var_leaf(y);
//!
//! // 3. Compose: s = x + y, then m = min(s, y)
//! let s = xadd.apply_add(fx, fy).unwrap();
//! let m = xadd.apply_min(s, fy).unwrap();
//!
//! // 4. The min introduced the decision [x <= 0]
//! assert_eq!(xadd.export(m), "( [x <= 0] ( [x + y] ) ( [y] ) )");
//!
//! // 5. Evaluate at x = -1, y = 5
//! use hashbrown::HashMap;
//! use num_rational::Rational64;
//! let bools = HashMap::new();
//! let mut cont = HashMap::new();
//! cont.insert(x, Rational64::from_integer(-1));
//! cont.insert(y, Rational64::from_integer(5));
//! assert_eq!(xadd.evaluate(m, &bools, &cont, true).unwrap(), Some(4.0));
//! ```
//!
//! ## Core Components
//!
//! - **[`xadd`]**: the [`Xadd`][crate::xadd::Xadd] manager and the reduction
//!   layer.
//! - **[`apply`]** / **[`unary`]**: diagram composition and leaf-wise
//!   transforms.
//! - **[`expr`]**: the interned symbolic expression pool behind leaves and
//!   decisions.
//! - **[`decision`]**: decision canonicalization and the registry.
//! - **[`reduce_lp`]** / **[`lp`]**: feasibility-based path pruning.
//! - **[`parse`]** / **[`dot`]**: textual import/export and visualization.

pub mod apply;
pub mod cache;
pub mod canonical;
pub mod decision;
pub mod dot;
pub mod error;
pub mod expr;
pub mod lp;
pub mod node;
pub mod parse;
pub mod reduce_lp;
pub mod store;
pub mod subst;
pub mod types;
pub mod unary;
pub mod utils;
pub mod xadd;

pub use apply::BinOp;
pub use error::{Result, XaddError};
pub use types::{DecisionId, ExprId, NodeId, VarId};
pub use unary::UnaryOp;
pub use xadd::Xadd;
