//! Trigonometric and hyperbolic functions. All take numeric arguments in
//! radians and produce Double.

use crate::context::ExpressionContext;
use crate::error::ExprResult;
use crate::evaluator::Evaluator;
use crate::function::{fold1, fold2, FunctionSpec, Volatility};
use crate::functions::all_numeric_double;
use crate::value::ExpressionType;

macro_rules! unary_trig {
    ($fn_name:ident, $method:ident) => {
        fn $fn_name(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
            fold1::<f64, f64, _>(ExpressionType::Double, &args[0], |a| Ok(a.$method()))
        }
    };
}

unary_trig!(compile_sin, sin);
unary_trig!(compile_cos, cos);
unary_trig!(compile_tan, tan);
unary_trig!(compile_asin, asin);
unary_trig!(compile_acos, acos);
unary_trig!(compile_atan, atan);
unary_trig!(compile_sinh, sinh);
unary_trig!(compile_cosh, cosh);
unary_trig!(compile_tanh, tanh);

fn compile_atan2(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold2::<f64, f64, f64, _>(ExpressionType::Double, &args[0], &args[1], |y, x| {
        Ok(y.atan2(x))
    })
}

macro_rules! trig_spec {
    ($name:literal, $compile:ident) => {
        FunctionSpec {
            name: $name,
            min_args: 1,
            max_args: 1,
            volatility: Volatility::NonVolatile,
            compute_type: all_numeric_double,
            compile: $compile,
        }
    };
}

pub(super) const FUNCTIONS: &[FunctionSpec] = &[
    trig_spec!("sin", compile_sin),
    trig_spec!("cos", compile_cos),
    trig_spec!("tan", compile_tan),
    trig_spec!("asin", compile_asin),
    trig_spec!("acos", compile_acos),
    trig_spec!("atan", compile_atan),
    FunctionSpec {
        name: "atan2",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: all_numeric_double,
        compile: compile_atan2,
    },
    trig_spec!("sinh", compile_sinh),
    trig_spec!("cosh", compile_cosh),
    trig_spec!("tanh", compile_tanh),
];
