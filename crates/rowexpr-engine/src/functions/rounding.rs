//! Rounding functions. `round`, `floor` and `ceil` produce Integer-tagged
//! results; `rint` (round half to even) keeps the Double tag, matching the
//! IEEE `rint` contract. Infinities pass through unchanged.

use crate::context::ExpressionContext;
use crate::error::ExprResult;
use crate::evaluator::Evaluator;
use crate::function::{fold1, FunctionSpec, Volatility};
use crate::functions::{all_numeric_double, all_numeric_integer};
use crate::value::ExpressionType;

pub(super) const FUNCTIONS: &[FunctionSpec] = &[
    FunctionSpec {
        name: "round",
        min_args: 1,
        max_args: 1,
        volatility: Volatility::NonVolatile,
        compute_type: all_numeric_integer,
        compile: compile_round,
    },
    FunctionSpec {
        name: "floor",
        min_args: 1,
        max_args: 1,
        volatility: Volatility::NonVolatile,
        compute_type: all_numeric_integer,
        compile: compile_floor,
    },
    FunctionSpec {
        name: "ceil",
        min_args: 1,
        max_args: 1,
        volatility: Volatility::NonVolatile,
        compute_type: all_numeric_integer,
        compile: compile_ceil,
    },
    FunctionSpec {
        name: "rint",
        min_args: 1,
        max_args: 1,
        volatility: Volatility::NonVolatile,
        compute_type: all_numeric_double,
        compile: compile_rint,
    },
];

fn compile_round(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    // Half away from zero.
    fold1::<f64, f64, _>(ExpressionType::Integer, &args[0], |a| Ok(a.round()))
}

fn compile_floor(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold1::<f64, f64, _>(ExpressionType::Integer, &args[0], |a| Ok(a.floor()))
}

fn compile_ceil(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold1::<f64, f64, _>(ExpressionType::Integer, &args[0], |a| Ok(a.ceil()))
}

fn compile_rint(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold1::<f64, f64, _>(ExpressionType::Double, &args[0], |a| Ok(round_ties_even(a)))
}

fn round_ties_even(v: f64) -> f64 {
    let r = v.round();
    if (v - v.trunc()).abs() == 0.5 && r % 2.0 != 0.0 {
        r - v.signum()
    } else {
        r
    }
}
