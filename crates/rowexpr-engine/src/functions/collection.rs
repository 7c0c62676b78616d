//! Functions over text sets and text lists.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::context::ExpressionContext;
use crate::error::ExprResult;
use crate::evaluator::Evaluator;
use crate::function::{check_type, fold1, fold2, wrong_type, FunctionSpec, Volatility};
use crate::functions::bitwise::to_i64;
use crate::value::ExpressionType;

pub(super) const FUNCTIONS: &[FunctionSpec] = &[
    FunctionSpec {
        name: "size",
        min_args: 1,
        max_args: 1,
        volatility: Volatility::NonVolatile,
        compute_type: size_type,
        compile: compile_size,
    },
    FunctionSpec {
        name: "element",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: element_type,
        compile: compile_element,
    },
    FunctionSpec {
        name: "in_set",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: in_set_type,
        compile: compile_in_set,
    },
];

fn size_type(name: &'static str, args: &[ExpressionType]) -> ExprResult<ExpressionType> {
    match args[0] {
        ExpressionType::StringSet | ExpressionType::StringList => Ok(ExpressionType::Integer),
        _ => Err(wrong_type(name, 1, "a text set or text list")),
    }
}

fn compile_size(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    match args[0].ty() {
        ExpressionType::StringSet => fold1::<Option<Arc<BTreeSet<String>>>, f64, _>(
            ExpressionType::Integer,
            &args[0],
            |set| Ok(set.len() as f64),
        ),
        _ => fold1::<Option<Arc<Vec<String>>>, f64, _>(
            ExpressionType::Integer,
            &args[0],
            |list| Ok(list.len() as f64),
        ),
    }
}

fn element_type(name: &'static str, args: &[ExpressionType]) -> ExprResult<ExpressionType> {
    check_type(name, 1, ExpressionType::StringList, args[0])?;
    crate::function::check_numeric(name, 2, args[1])?;
    Ok(ExpressionType::String)
}

fn compile_element(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold2::<Option<Arc<Vec<String>>>, f64, Option<Arc<str>>, _>(
        ExpressionType::String,
        &args[0],
        &args[1],
        |list, index| {
            let index = to_i64("element", index)?;
            // Out-of-bounds access yields missing, not an error.
            let item = usize::try_from(index)
                .ok()
                .and_then(|i| list.get(i))
                .map(|s| Arc::from(s.as_str()));
            Ok(item)
        },
    )
}

fn in_set_type(name: &'static str, args: &[ExpressionType]) -> ExprResult<ExpressionType> {
    check_type(name, 1, ExpressionType::String, args[0])?;
    check_type(name, 2, ExpressionType::StringSet, args[1])?;
    Ok(ExpressionType::Boolean)
}

fn compile_in_set(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold2::<Option<Arc<str>>, Option<Arc<BTreeSet<String>>>, Option<bool>, _>(
        ExpressionType::Boolean,
        &args[0],
        &args[1],
        |needle, set| Ok(Some(set.contains(needle.as_ref()))),
    )
}
