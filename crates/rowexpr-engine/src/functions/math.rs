//! Arithmetic operators and elementary math functions.
//!
//! `+ - * %` preserve the Integer tag when every operand is Integer; `/`
//! and `^` always widen to Double. `+` doubles as string concatenation when
//! both operands are strings. Out-of-domain inputs (`ln` of a negative,
//! `0/0`) follow IEEE-754 and come out as NaN, i.e. missing.

use std::sync::Arc;

use crate::context::ExpressionContext;
use crate::error::ExprResult;
use crate::evaluator::Evaluator;
use crate::function::{
    check_numeric, fold1, fold2, fold_n_double, widen_numeric, wrong_type, FunctionSpec,
    Volatility, VAR_ARGS,
};
use crate::functions::{all_numeric_double, all_numeric_widen};
use crate::value::ExpressionType;

pub(super) const FUNCTIONS: &[FunctionSpec] = &[
    FunctionSpec {
        name: "+",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: plus_type,
        compile: compile_plus,
    },
    FunctionSpec {
        name: "-",
        min_args: 1,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: all_numeric_widen,
        compile: compile_minus,
    },
    FunctionSpec {
        name: "*",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: all_numeric_widen,
        compile: compile_multiply,
    },
    FunctionSpec {
        name: "/",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: all_numeric_double,
        compile: compile_divide,
    },
    FunctionSpec {
        name: "%",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: all_numeric_widen,
        compile: compile_modulus,
    },
    FunctionSpec {
        name: "mod",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: all_numeric_widen,
        compile: compile_modulus,
    },
    FunctionSpec {
        name: "^",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: all_numeric_double,
        compile: compile_power,
    },
    FunctionSpec {
        name: "pow",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: all_numeric_double,
        compile: compile_power,
    },
    FunctionSpec {
        name: "sqrt",
        min_args: 1,
        max_args: 1,
        volatility: Volatility::NonVolatile,
        compute_type: all_numeric_double,
        compile: compile_sqrt,
    },
    FunctionSpec {
        name: "exp",
        min_args: 1,
        max_args: 1,
        volatility: Volatility::NonVolatile,
        compute_type: all_numeric_double,
        compile: compile_exp,
    },
    FunctionSpec {
        name: "ln",
        min_args: 1,
        max_args: 1,
        volatility: Volatility::NonVolatile,
        compute_type: all_numeric_double,
        compile: compile_ln,
    },
    FunctionSpec {
        name: "log",
        min_args: 1,
        max_args: 1,
        volatility: Volatility::NonVolatile,
        compute_type: all_numeric_double,
        compile: compile_log10,
    },
    FunctionSpec {
        name: "log2",
        min_args: 1,
        max_args: 1,
        volatility: Volatility::NonVolatile,
        compute_type: all_numeric_double,
        compile: compile_log2,
    },
    FunctionSpec {
        name: "abs",
        min_args: 1,
        max_args: 1,
        volatility: Volatility::NonVolatile,
        compute_type: all_numeric_widen,
        compile: compile_abs,
    },
    FunctionSpec {
        name: "sgn",
        min_args: 1,
        max_args: 1,
        volatility: Volatility::NonVolatile,
        compute_type: all_numeric_widen,
        compile: compile_sgn,
    },
    FunctionSpec {
        name: "min",
        min_args: 1,
        max_args: VAR_ARGS,
        volatility: Volatility::NonVolatile,
        compute_type: all_numeric_widen,
        compile: compile_min,
    },
    FunctionSpec {
        name: "max",
        min_args: 1,
        max_args: VAR_ARGS,
        volatility: Volatility::NonVolatile,
        compute_type: all_numeric_widen,
        compile: compile_max,
    },
];

fn plus_type(name: &'static str, args: &[ExpressionType]) -> ExprResult<ExpressionType> {
    if args[0] == ExpressionType::String && args[1] == ExpressionType::String {
        return Ok(ExpressionType::String);
    }
    if args[0] == ExpressionType::String || args[1] == ExpressionType::String {
        // Mixing a string with anything else is a type error on the
        // non-string side.
        let position = if args[0] == ExpressionType::String { 2 } else { 1 };
        return Err(wrong_type(name, position, "nominal"));
    }
    check_numeric(name, 1, args[0])?;
    check_numeric(name, 2, args[1])?;
    Ok(widen_numeric(args))
}

fn compile_plus(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    if args[0].ty() == ExpressionType::String {
        return fold2::<Option<Arc<str>>, Option<Arc<str>>, Option<Arc<str>>, _>(
            ExpressionType::String,
            &args[0],
            &args[1],
            |a, b| Ok(Some(Arc::from(format!("{a}{b}")))),
        );
    }
    let ty = widen_numeric(&[args[0].ty(), args[1].ty()]);
    fold2::<f64, f64, f64, _>(ty, &args[0], &args[1], |a, b| Ok(a + b))
}

fn compile_minus(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    if args.len() == 1 {
        let ty = args[0].ty();
        return fold1::<f64, f64, _>(ty, &args[0], |a| Ok(-a));
    }
    let ty = widen_numeric(&[args[0].ty(), args[1].ty()]);
    fold2::<f64, f64, f64, _>(ty, &args[0], &args[1], |a, b| Ok(a - b))
}

fn compile_multiply(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    let ty = widen_numeric(&[args[0].ty(), args[1].ty()]);
    fold2::<f64, f64, f64, _>(ty, &args[0], &args[1], |a, b| Ok(a * b))
}

fn compile_divide(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold2::<f64, f64, f64, _>(ExpressionType::Double, &args[0], &args[1], |a, b| Ok(a / b))
}

fn compile_modulus(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    let ty = widen_numeric(&[args[0].ty(), args[1].ty()]);
    fold2::<f64, f64, f64, _>(ty, &args[0], &args[1], |a, b| Ok(a % b))
}

fn compile_power(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold2::<f64, f64, f64, _>(ExpressionType::Double, &args[0], &args[1], |a, b| {
        Ok(a.powf(b))
    })
}

fn compile_sqrt(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold1::<f64, f64, _>(ExpressionType::Double, &args[0], |a| Ok(a.sqrt()))
}

fn compile_exp(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold1::<f64, f64, _>(ExpressionType::Double, &args[0], |a| Ok(a.exp()))
}

fn compile_ln(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold1::<f64, f64, _>(ExpressionType::Double, &args[0], |a| Ok(a.ln()))
}

fn compile_log10(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold1::<f64, f64, _>(ExpressionType::Double, &args[0], |a| Ok(a.log10()))
}

fn compile_log2(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold1::<f64, f64, _>(ExpressionType::Double, &args[0], |a| Ok(a.log2()))
}

fn compile_abs(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    let ty = args[0].ty();
    fold1::<f64, f64, _>(ty, &args[0], |a| Ok(a.abs()))
}

fn compile_sgn(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    let ty = args[0].ty();
    fold1::<f64, f64, _>(ty, &args[0], |a| {
        // f64::signum maps 0.0 to 1.0; the sign function must keep it 0.
        Ok(if a > 0.0 {
            1.0
        } else if a < 0.0 {
            -1.0
        } else {
            0.0
        })
    })
}

fn compile_min(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    let types: Vec<_> = args.iter().map(|a| a.ty()).collect();
    fold_n_double(widen_numeric(&types), &args, |values| {
        Ok(values.iter().copied().fold(f64::INFINITY, f64::min))
    })
}

fn compile_max(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    let types: Vec<_> = args.iter().map(|a| a.ty()).collect();
    fold_n_double(widen_numeric(&types), &args, |values| {
        Ok(values.iter().copied().fold(f64::NEG_INFINITY, f64::max))
    })
}
