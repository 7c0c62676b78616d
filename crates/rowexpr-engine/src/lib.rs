#![forbid(unsafe_code)]
#![deny(unreachable_patterns)]

//! A typed expression evaluation engine over columnar row data.
//!
//! Hosts hand the engine an already-parsed [`Expression`] tree plus an
//! [`ExpressionContext`] describing the available functions, constants and
//! row-bound variables. Compilation type-checks the tree bottom-up and
//! produces an [`Evaluator`]: a deferred, possibly-constant computation over
//! exactly one value type.
//!
//! Compiled evaluators are used two ways:
//! - invoked once for scalar results (`Evaluator::evaluate`), or
//! - driven once per row by [`materialize`] to produce a full [`Column`].
//!
//! Constant subexpressions are folded at compile time: an evaluator whose
//! inputs are all constant is itself constant and caches its value, so large
//! constant subtrees are never re-walked per row. Missing values (NaN for
//! numeric types, absent for everything else) propagate through every
//! function without raising.
//!
//! One context owns the mutable row cursor that dynamic variables read, so a
//! context (and the evaluators compiled against it) must stay on one thread;
//! hosts wanting parallel row processing compile one expression per worker.
//! The types are `Rc`/`Cell`-based, which makes cross-thread sharing a
//! compile error rather than a data race.

pub mod context;
pub mod error;
pub mod evaluator;
pub mod expression;
pub mod function;
pub mod functions;
pub mod materialize;
pub mod resolver;
pub mod value;

pub use crate::context::ExpressionContext;
pub use crate::error::{ExprError, ExprResult};
pub use crate::evaluator::Evaluator;
pub use crate::expression::{compile, Expression};
pub use crate::materialize::{materialize, Column};
pub use crate::resolver::{ConstantResolver, DynamicResolver, StaticResolver, TableResolver};
pub use crate::value::{Constant, ExpressionType, Value};
