//! Bitwise functions over Integer-typed values. The f64-backed integers are
//! converted through i64; values outside the i64 range raise a numeric
//! overflow error (NaN inputs propagate as missing before conversion).

use crate::context::ExpressionContext;
use crate::error::{ExprError, ExprResult};
use crate::evaluator::Evaluator;
use crate::function::{check_type, fold1, fold2, FunctionSpec, Volatility};
use crate::value::ExpressionType;

pub(super) const FUNCTIONS: &[FunctionSpec] = &[
    FunctionSpec {
        name: "bit_and",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: all_integer,
        compile: compile_bit_and,
    },
    FunctionSpec {
        name: "bit_or",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: all_integer,
        compile: compile_bit_or,
    },
    FunctionSpec {
        name: "bit_xor",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: all_integer,
        compile: compile_bit_xor,
    },
    FunctionSpec {
        name: "bit_not",
        min_args: 1,
        max_args: 1,
        volatility: Volatility::NonVolatile,
        compute_type: all_integer,
        compile: compile_bit_not,
    },
];

fn all_integer(name: &'static str, args: &[ExpressionType]) -> ExprResult<ExpressionType> {
    for (i, ty) in args.iter().enumerate() {
        check_type(name, i + 1, ExpressionType::Integer, *ty)?;
    }
    Ok(ExpressionType::Integer)
}

pub(crate) fn to_i64(function: &str, v: f64) -> ExprResult<i64> {
    // Finite and exactly representable in i64; fractional parts truncate.
    if v.is_finite() && v >= i64::MIN as f64 && v <= i64::MAX as f64 {
        Ok(v as i64)
    } else {
        Err(ExprError::NumericOverflow {
            function: function.to_string(),
        })
    }
}

fn compile_bit_and(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold2::<f64, f64, f64, _>(ExpressionType::Integer, &args[0], &args[1], |a, b| {
        Ok((to_i64("bit_and", a)? & to_i64("bit_and", b)?) as f64)
    })
}

fn compile_bit_or(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold2::<f64, f64, f64, _>(ExpressionType::Integer, &args[0], &args[1], |a, b| {
        Ok((to_i64("bit_or", a)? | to_i64("bit_or", b)?) as f64)
    })
}

fn compile_bit_xor(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold2::<f64, f64, f64, _>(ExpressionType::Integer, &args[0], &args[1], |a, b| {
        Ok((to_i64("bit_xor", a)? ^ to_i64("bit_xor", b)?) as f64)
    })
}

fn compile_bit_not(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold1::<f64, f64, _>(ExpressionType::Integer, &args[0], |a| {
        Ok(!to_i64("bit_not", a)? as f64)
    })
}
