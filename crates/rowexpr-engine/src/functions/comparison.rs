//! Comparison operators.
//!
//! Equality is defined for any pair of equal-typed (or both-numeric)
//! operands and is missing-aware: two missing values of the same type are
//! equal, a missing and a present value are not. Ordering comparisons are
//! numeric only and propagate missing.

use std::rc::Rc;

use crate::context::ExpressionContext;
use crate::error::{ExprError, ExprResult};
use crate::evaluator::{Evaluator, EvaluatorKind};
use crate::function::{check_numeric, fold2, wrong_type, FunctionSpec, Volatility};
use crate::value::ExpressionType;

pub(super) const FUNCTIONS: &[FunctionSpec] = &[
    FunctionSpec {
        name: "==",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: equality_type,
        compile: compile_eq,
    },
    FunctionSpec {
        name: "!=",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: equality_type,
        compile: compile_neq,
    },
    FunctionSpec {
        name: "<",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: ordering_type,
        compile: compile_lt,
    },
    FunctionSpec {
        name: "<=",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: ordering_type,
        compile: compile_le,
    },
    FunctionSpec {
        name: ">",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: ordering_type,
        compile: compile_gt,
    },
    FunctionSpec {
        name: ">=",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: ordering_type,
        compile: compile_ge,
    },
];

fn equality_type(name: &'static str, args: &[ExpressionType]) -> ExprResult<ExpressionType> {
    let compatible =
        args[0] == args[1] || (args[0].is_numeric() && args[1].is_numeric());
    if compatible {
        Ok(ExpressionType::Boolean)
    } else {
        Err(wrong_type(name, 2, &args[0].to_string()))
    }
}

fn ordering_type(name: &'static str, args: &[ExpressionType]) -> ExprResult<ExpressionType> {
    check_numeric(name, 1, args[0])?;
    check_numeric(name, 2, args[1])?;
    Ok(ExpressionType::Boolean)
}

/// Missing-aware equality over one optional representation: two missing
/// values are equal, a missing and a present value are not.
fn option_eq_probe<T: PartialEq + Clone + 'static>(
    fa: Rc<dyn Fn() -> ExprResult<Option<T>>>,
    fb: Rc<dyn Fn() -> ExprResult<Option<T>>>,
) -> Rc<dyn Fn() -> ExprResult<bool>> {
    Rc::new(move || {
        Ok(match (fa()?, fb()?) {
            (Some(x), Some(y)) => x == y,
            (None, None) => true,
            _ => false,
        })
    })
}

/// Builds the missing-aware equality probe for two same-kind evaluators.
fn equality_probe(a: &Evaluator, b: &Evaluator) -> ExprResult<Rc<dyn Fn() -> ExprResult<bool>>> {
    Ok(match (a.kind(), b.kind()) {
        (EvaluatorKind::Double(fa), EvaluatorKind::Double(fb)) => {
            let (fa, fb) = (fa.clone(), fb.clone());
            Rc::new(move || {
                let (x, y) = (fa()?, fb()?);
                // Missing numerics (NaN) compare equal to each other only.
                Ok(x == y || (x.is_nan() && y.is_nan()))
            })
        }
        (EvaluatorKind::String(fa), EvaluatorKind::String(fb)) => {
            option_eq_probe(fa.clone(), fb.clone())
        }
        (EvaluatorKind::Boolean(fa), EvaluatorKind::Boolean(fb)) => {
            option_eq_probe(fa.clone(), fb.clone())
        }
        (EvaluatorKind::Instant(fa), EvaluatorKind::Instant(fb)) => {
            option_eq_probe(fa.clone(), fb.clone())
        }
        (EvaluatorKind::LocalTime(fa), EvaluatorKind::LocalTime(fb)) => {
            option_eq_probe(fa.clone(), fb.clone())
        }
        (EvaluatorKind::StringSet(fa), EvaluatorKind::StringSet(fb)) => {
            option_eq_probe(fa.clone(), fb.clone())
        }
        (EvaluatorKind::StringList(fa), EvaluatorKind::StringList(fb)) => {
            option_eq_probe(fa.clone(), fb.clone())
        }
        _ => {
            return Err(ExprError::internal(
                "equality compiled over mismatched evaluator kinds",
            ))
        }
    })
}

fn compile_equality(args: Vec<Evaluator>, negate: bool) -> ExprResult<Evaluator> {
    let probe = equality_probe(&args[0], &args[1])?;
    if args[0].is_constant() && args[1].is_constant() {
        let v = probe()? != negate;
        return Ok(Evaluator::constant(crate::value::Value::Boolean(Some(v))));
    }
    Evaluator::new(
        ExpressionType::Boolean,
        false,
        EvaluatorKind::Boolean(Rc::new(move || Ok(Some(probe()? != negate)))),
    )
}

fn compile_eq(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    compile_equality(args, false)
}

fn compile_neq(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    compile_equality(args, true)
}

fn compile_lt(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold2::<f64, f64, Option<bool>, _>(ExpressionType::Boolean, &args[0], &args[1], |a, b| {
        Ok(Some(a < b))
    })
}

fn compile_le(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold2::<f64, f64, Option<bool>, _>(ExpressionType::Boolean, &args[0], &args[1], |a, b| {
        Ok(Some(a <= b))
    })
}

fn compile_gt(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold2::<f64, f64, Option<bool>, _>(ExpressionType::Boolean, &args[0], &args[1], |a, b| {
        Ok(Some(a > b))
    })
}

fn compile_ge(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold2::<f64, f64, Option<bool>, _>(ExpressionType::Boolean, &args[0], &args[1], |a, b| {
        Ok(Some(a >= b))
    })
}
