//! The function protocol: registration specs, argument type checking, and
//! the fold combinators every built-in compiles through.
//!
//! A function contributes a [`FunctionSpec`] naming its arity bounds, its
//! volatility, a `compute_type` pass (child types in, result type or a user
//! error out) and a `compile` pass (child evaluators in, one evaluator out).
//! The fold combinators implement the shared compilation discipline:
//!
//! - constant folding: all-constant inputs are computed exactly once at
//!   compile time and replayed from a cached closure;
//! - missing-value short-circuit: a constant child holding its missing
//!   sentinel collapses the whole call to a constant missing result without
//!   invoking the function's logic;
//! - shape specialization: binary folds build four explicit closures
//!   (both/left/right/neither constant); wider folds capture each constant
//!   child's value individually so constant subtrees are never re-read per
//!   row.

use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};

use crate::context::ExpressionContext;
use crate::error::{ExprError, ExprResult};
use crate::evaluator::{Evaluator, EvaluatorKind};
use crate::value::ExpressionType;

/// Upper bound used by variadic functions.
pub const VAR_ARGS: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Volatility {
    /// Constant inputs produce a constant output (the default).
    NonVolatile,
    /// Must re-evaluate even with constant (or zero) inputs, e.g. the
    /// current-time and row-position functions.
    Volatile,
}

pub type TypeFn = fn(name: &'static str, args: &[ExpressionType]) -> ExprResult<ExpressionType>;
pub type CompileFn = fn(ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator>;

/// A registered function. Specs are plain statics gathered into explicit
/// per-module lists; the registry is built once from those lists.
#[derive(Clone, Copy)]
pub struct FunctionSpec {
    pub name: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub volatility: Volatility,
    pub compute_type: TypeFn,
    pub compile: CompileFn,
}

impl FunctionSpec {
    /// Central arity gate, applied before `compute_type` sees the arguments.
    pub fn check_arity(&self, actual: usize) -> ExprResult<()> {
        if actual >= self.min_args && actual <= self.max_args {
            return Ok(());
        }
        let expected = if self.min_args == self.max_args {
            self.min_args.to_string()
        } else if self.max_args == VAR_ARGS {
            format!("at least {}", self.min_args)
        } else {
            format!("{} to {}", self.min_args, self.max_args)
        };
        Err(ExprError::WrongArity {
            function: self.name.to_string(),
            expected,
            actual,
        })
    }
}

pub fn wrong_type(name: &str, position: usize, expected: &str) -> ExprError {
    ExprError::WrongType {
        function: name.to_string(),
        position,
        expected: expected.to_string(),
    }
}

/// `position` is 1-based, matching the reported error.
pub fn check_numeric(name: &str, position: usize, ty: ExpressionType) -> ExprResult<()> {
    if ty.is_numeric() {
        Ok(())
    } else {
        Err(wrong_type(name, position, "a numerical value"))
    }
}

pub fn check_type(
    name: &str,
    position: usize,
    expected: ExpressionType,
    ty: ExpressionType,
) -> ExprResult<()> {
    if ty == expected {
        Ok(())
    } else {
        Err(wrong_type(name, position, &expected.to_string()))
    }
}

/// Integer is preserved only when every argument is Integer; any Double
/// widens the result. This is the shared numeric widening rule.
pub fn widen_numeric(args: &[ExpressionType]) -> ExpressionType {
    if args.iter().all(|t| *t == ExpressionType::Integer) {
        ExpressionType::Integer
    } else {
        ExpressionType::Double
    }
}

/// One runtime representation usable by the fold combinators.
///
/// `Inner` is the payload handed to compute closures once missingness has
/// been peeled off; `Repr` itself still carries the sentinel so compute
/// closures can *return* missing (e.g. `parse` on unparseable text).
pub trait EvalRepr: Clone + 'static {
    type Inner: Clone + 'static;

    fn callable(ev: &Evaluator) -> ExprResult<Rc<dyn Fn() -> ExprResult<Self>>>;
    fn missing() -> Self;
    fn present(self) -> Option<Self::Inner>;
    fn into_kind(f: Rc<dyn Fn() -> ExprResult<Self>>) -> EvaluatorKind;
}

impl EvalRepr for f64 {
    type Inner = f64;

    fn callable(ev: &Evaluator) -> ExprResult<Rc<dyn Fn() -> ExprResult<Self>>> {
        ev.as_double_fn()
    }

    fn missing() -> Self {
        f64::NAN
    }

    fn present(self) -> Option<f64> {
        if self.is_nan() {
            None
        } else {
            Some(self)
        }
    }

    fn into_kind(f: Rc<dyn Fn() -> ExprResult<Self>>) -> EvaluatorKind {
        EvaluatorKind::Double(f)
    }
}

macro_rules! option_repr {
    ($repr:ty, $inner:ty, $getter:ident, $variant:ident) => {
        impl EvalRepr for $repr {
            type Inner = $inner;

            fn callable(ev: &Evaluator) -> ExprResult<Rc<dyn Fn() -> ExprResult<Self>>> {
                ev.$getter()
            }

            fn missing() -> Self {
                None
            }

            fn present(self) -> Option<$inner> {
                self
            }

            fn into_kind(f: Rc<dyn Fn() -> ExprResult<Self>>) -> EvaluatorKind {
                EvaluatorKind::$variant(f)
            }
        }
    };
}

option_repr!(Option<Arc<str>>, Arc<str>, as_string_fn, String);
option_repr!(Option<bool>, bool, as_boolean_fn, Boolean);
option_repr!(Option<DateTime<Utc>>, DateTime<Utc>, as_instant_fn, Instant);
option_repr!(Option<NaiveTime>, NaiveTime, as_local_time_fn, LocalTime);
option_repr!(
    Option<Arc<BTreeSet<String>>>,
    Arc<BTreeSet<String>>,
    as_string_set_fn,
    StringSet
);
option_repr!(
    Option<Arc<Vec<String>>>,
    Arc<Vec<String>>,
    as_string_list_fn,
    StringList
);

fn constant_result<R: EvalRepr>(ty: ExpressionType, value: R) -> ExprResult<Evaluator> {
    Evaluator::new(ty, true, R::into_kind(Rc::new(move || Ok(value.clone()))))
}

fn constant_missing(ty: ExpressionType) -> Evaluator {
    Evaluator::constant(ty.missing())
}

/// One child of a 3-/4-ary fold after the constant pre-pass: either a value
/// captured at compile time or the child's deferred callable.
enum Arg<T: EvalRepr> {
    Captured(T::Inner),
    Deferred(Rc<dyn Fn() -> ExprResult<T>>),
}

enum Resolved<T: EvalRepr> {
    Arg(Arg<T>),
    /// A constant child evaluated to its missing sentinel; the whole call
    /// collapses to a constant missing result.
    ConstantMissing,
}

impl<T: EvalRepr> Arg<T> {
    fn resolve(ev: &Evaluator) -> ExprResult<Resolved<T>> {
        let f = T::callable(ev)?;
        if ev.is_constant() {
            match f()?.present() {
                Some(inner) => Ok(Resolved::Arg(Arg::Captured(inner))),
                None => Ok(Resolved::ConstantMissing),
            }
        } else {
            Ok(Resolved::Arg(Arg::Deferred(f)))
        }
    }

    fn is_captured(&self) -> bool {
        matches!(self, Arg::Captured(_))
    }

    /// Per-row read: `None` means the input is missing for this row.
    fn get(&self) -> ExprResult<Option<T::Inner>> {
        match self {
            Arg::Captured(v) => Ok(Some(v.clone())),
            Arg::Deferred(f) => Ok(f()?.present()),
        }
    }
}

/// Unary fold: two shapes (constant input folded at compile time, or a
/// per-invocation closure that propagates missing before calling `f`).
pub fn fold1<A, R, F>(ty: ExpressionType, a: &Evaluator, f: F) -> ExprResult<Evaluator>
where
    A: EvalRepr,
    R: EvalRepr,
    F: Fn(A::Inner) -> ExprResult<R> + 'static,
{
    let fa = A::callable(a)?;
    if a.is_constant() {
        return match fa()?.present() {
            None => Ok(constant_missing(ty)),
            Some(inner) => constant_result(ty, f(inner)?),
        };
    }
    Evaluator::new(
        ty,
        false,
        R::into_kind(Rc::new(move || match fa()?.present() {
            None => Ok(R::missing()),
            Some(inner) => f(inner),
        })),
    )
}

/// Binary fold with the four explicit compilation shapes.
pub fn fold2<A, B, R, F>(
    ty: ExpressionType,
    a: &Evaluator,
    b: &Evaluator,
    f: F,
) -> ExprResult<Evaluator>
where
    A: EvalRepr,
    B: EvalRepr,
    R: EvalRepr,
    F: Fn(A::Inner, B::Inner) -> ExprResult<R> + 'static,
{
    let fa = A::callable(a)?;
    let fb = B::callable(b)?;
    match (a.is_constant(), b.is_constant()) {
        // Both constant: compute once at compile time.
        (true, true) => match (fa()?.present(), fb()?.present()) {
            (Some(va), Some(vb)) => constant_result(ty, f(va, vb)?),
            _ => Ok(constant_missing(ty)),
        },
        // Left constant: capture the left value, re-read only the right.
        (true, false) => match fa()?.present() {
            None => Ok(constant_missing(ty)),
            Some(va) => Evaluator::new(
                ty,
                false,
                R::into_kind(Rc::new(move || match fb()?.present() {
                    None => Ok(R::missing()),
                    Some(vb) => f(va.clone(), vb),
                })),
            ),
        },
        // Right constant: mirror image.
        (false, true) => match fb()?.present() {
            None => Ok(constant_missing(ty)),
            Some(vb) => Evaluator::new(
                ty,
                false,
                R::into_kind(Rc::new(move || match fa()?.present() {
                    None => Ok(R::missing()),
                    Some(va) => f(va, vb.clone()),
                })),
            ),
        },
        // Neither constant: read both per invocation.
        (false, false) => Evaluator::new(
            ty,
            false,
            R::into_kind(Rc::new(move || match (fa()?.present(), fb()?.present()) {
                (Some(va), Some(vb)) => f(va, vb),
                _ => Ok(R::missing()),
            })),
        ),
    }
}

/// Ternary fold; each constant child is captured individually.
pub fn fold3<A, B, C, R, F>(
    ty: ExpressionType,
    a: &Evaluator,
    b: &Evaluator,
    c: &Evaluator,
    f: F,
) -> ExprResult<Evaluator>
where
    A: EvalRepr,
    B: EvalRepr,
    C: EvalRepr,
    R: EvalRepr,
    F: Fn(A::Inner, B::Inner, C::Inner) -> ExprResult<R> + 'static,
{
    let a = match Arg::<A>::resolve(a)? {
        Resolved::ConstantMissing => return Ok(constant_missing(ty)),
        Resolved::Arg(arg) => arg,
    };
    let b = match Arg::<B>::resolve(b)? {
        Resolved::ConstantMissing => return Ok(constant_missing(ty)),
        Resolved::Arg(arg) => arg,
    };
    let c = match Arg::<C>::resolve(c)? {
        Resolved::ConstantMissing => return Ok(constant_missing(ty)),
        Resolved::Arg(arg) => arg,
    };

    if a.is_captured() && b.is_captured() && c.is_captured() {
        let (va, vb, vc) = (a.get()?, b.get()?, c.get()?);
        // Captured args are present by construction.
        match (va, vb, vc) {
            (Some(va), Some(vb), Some(vc)) => return constant_result(ty, f(va, vb, vc)?),
            _ => return Err(ExprError::internal("captured fold argument was missing")),
        }
    }

    Evaluator::new(
        ty,
        false,
        R::into_kind(Rc::new(move || match (a.get()?, b.get()?, c.get()?) {
            (Some(va), Some(vb), Some(vc)) => f(va, vb, vc),
            _ => Ok(R::missing()),
        })),
    )
}

/// Quaternary fold; same capture discipline as [`fold3`].
#[allow(clippy::too_many_arguments)]
pub fn fold4<A, B, C, D, R, F>(
    ty: ExpressionType,
    a: &Evaluator,
    b: &Evaluator,
    c: &Evaluator,
    d: &Evaluator,
    f: F,
) -> ExprResult<Evaluator>
where
    A: EvalRepr,
    B: EvalRepr,
    C: EvalRepr,
    D: EvalRepr,
    R: EvalRepr,
    F: Fn(A::Inner, B::Inner, C::Inner, D::Inner) -> ExprResult<R> + 'static,
{
    let a = match Arg::<A>::resolve(a)? {
        Resolved::ConstantMissing => return Ok(constant_missing(ty)),
        Resolved::Arg(arg) => arg,
    };
    let b = match Arg::<B>::resolve(b)? {
        Resolved::ConstantMissing => return Ok(constant_missing(ty)),
        Resolved::Arg(arg) => arg,
    };
    let c = match Arg::<C>::resolve(c)? {
        Resolved::ConstantMissing => return Ok(constant_missing(ty)),
        Resolved::Arg(arg) => arg,
    };
    let d = match Arg::<D>::resolve(d)? {
        Resolved::ConstantMissing => return Ok(constant_missing(ty)),
        Resolved::Arg(arg) => arg,
    };

    if a.is_captured() && b.is_captured() && c.is_captured() && d.is_captured() {
        match (a.get()?, b.get()?, c.get()?, d.get()?) {
            (Some(va), Some(vb), Some(vc), Some(vd)) => {
                return constant_result(ty, f(va, vb, vc, vd)?)
            }
            _ => return Err(ExprError::internal("captured fold argument was missing")),
        }
    }

    Evaluator::new(
        ty,
        false,
        R::into_kind(Rc::new(
            move || match (a.get()?, b.get()?, c.get()?, d.get()?) {
                (Some(va), Some(vb), Some(vc), Some(vd)) => f(va, vb, vc, vd),
                _ => Ok(R::missing()),
            },
        )),
    )
}

/// Variadic numeric fold used by min/max/sum/avg. Constant children are
/// checked for the NaN sentinel up front; if all children are constant the
/// aggregate is computed once.
pub fn fold_n_double<F>(ty: ExpressionType, args: &[Evaluator], f: F) -> ExprResult<Evaluator>
where
    F: Fn(&[f64]) -> ExprResult<f64> + 'static,
{
    let mut callables = Vec::with_capacity(args.len());
    let mut all_constant = true;
    for arg in args {
        let fa = arg.as_double_fn()?;
        if arg.is_constant() {
            if fa()?.is_nan() {
                return Ok(constant_missing(ty));
            }
        } else {
            all_constant = false;
        }
        callables.push(fa);
    }

    if all_constant {
        let values = callables
            .iter()
            .map(|fa| fa())
            .collect::<ExprResult<Vec<f64>>>()?;
        let v = f(&values)?;
        return constant_result(ty, v);
    }

    Evaluator::new(
        ty,
        false,
        EvaluatorKind::Double(Rc::new(move || {
            let mut values = Vec::with_capacity(callables.len());
            for fa in &callables {
                let v = fa()?;
                if v.is_nan() {
                    return Ok(f64::NAN);
                }
                values.push(v);
            }
            f(&values)
        })),
    )
}

/// Variadic string fold used by `concat`. Missing inputs are skipped rather
/// than propagated, matching text-concatenation semantics, so the constant
/// pre-pass only folds, it never short-circuits.
pub fn fold_n_string<F>(args: &[Evaluator], f: F) -> ExprResult<Evaluator>
where
    F: Fn(&[Option<Arc<str>>]) -> ExprResult<Option<Arc<str>>> + 'static,
{
    let mut callables = Vec::with_capacity(args.len());
    let all_constant = args.iter().all(|a| a.is_constant());
    for arg in args {
        callables.push(arg.as_string_fn()?);
    }

    if all_constant {
        let values = callables
            .iter()
            .map(|fa| fa())
            .collect::<ExprResult<Vec<_>>>()?;
        return constant_result(ExpressionType::String, f(&values)?);
    }

    Evaluator::new(
        ExpressionType::String,
        false,
        EvaluatorKind::String(Rc::new(move || {
            let values = callables
                .iter()
                .map(|fa| fa())
                .collect::<ExprResult<Vec<_>>>()?;
            f(&values)
        })),
    )
}
