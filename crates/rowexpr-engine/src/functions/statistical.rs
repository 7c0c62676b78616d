//! Statistical aggregations over their argument lists. `sum` preserves
//! Integer when every argument is Integer; `avg` always widens to Double.

use crate::context::ExpressionContext;
use crate::error::ExprResult;
use crate::evaluator::Evaluator;
use crate::function::{fold_n_double, widen_numeric, FunctionSpec, Volatility, VAR_ARGS};
use crate::functions::{all_numeric_double, all_numeric_widen};
use crate::value::ExpressionType;

pub(super) const FUNCTIONS: &[FunctionSpec] = &[
    FunctionSpec {
        name: "sum",
        min_args: 1,
        max_args: VAR_ARGS,
        volatility: Volatility::NonVolatile,
        compute_type: all_numeric_widen,
        compile: compile_sum,
    },
    FunctionSpec {
        name: "avg",
        min_args: 1,
        max_args: VAR_ARGS,
        volatility: Volatility::NonVolatile,
        compute_type: all_numeric_double,
        compile: compile_avg,
    },
];

fn compile_sum(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    let types: Vec<_> = args.iter().map(|a| a.ty()).collect();
    fold_n_double(widen_numeric(&types), &args, |values| {
        Ok(values.iter().sum())
    })
}

fn compile_avg(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold_n_double(ExpressionType::Double, &args, |values| {
        Ok(values.iter().sum::<f64>() / values.len() as f64)
    })
}
