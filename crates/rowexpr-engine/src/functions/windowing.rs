//! Row-position functions. `row_index` is volatile: it reads the shared row
//! cursor on every invocation, so it is never folded even though it takes no
//! arguments.

use std::rc::Rc;

use crate::context::ExpressionContext;
use crate::error::{ExprError, ExprResult};
use crate::evaluator::{Evaluator, EvaluatorKind};
use crate::function::{FunctionSpec, Volatility};
use crate::value::ExpressionType;

pub(super) const FUNCTIONS: &[FunctionSpec] = &[FunctionSpec {
    name: "row_index",
    min_args: 0,
    max_args: 0,
    volatility: Volatility::Volatile,
    compute_type: row_index_type,
    compile: compile_row_index,
}];

fn row_index_type(_name: &'static str, _args: &[ExpressionType]) -> ExprResult<ExpressionType> {
    Ok(ExpressionType::Integer)
}

fn compile_row_index(ctx: &ExpressionContext, _args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    let row = ctx.row_cell();
    Evaluator::new(
        ExpressionType::Integer,
        false,
        EvaluatorKind::Double(Rc::new(move || {
            let current = row.get();
            if current < 0 {
                return Err(ExprError::internal(
                    "row_index evaluated outside a row scan",
                ));
            }
            Ok(current as f64)
        })),
    )
}
