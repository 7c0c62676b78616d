use log::debug;

use crate::context::ExpressionContext;
use crate::error::{ExprError, ExprResult};
use crate::evaluator::Evaluator;
use crate::function::Volatility;
use crate::value::Value;

/// A parsed expression tree, as handed over by the host's parser. The
/// engine assumes the tree is syntactically valid; everything else (unknown
/// names, arity, types) is checked during compilation.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A literal value, e.g. `1.5`, `"abc"` or an integer-tagged number.
    Literal(Value),
    /// A named variable, resolved against the context's resolvers.
    Variable(String),
    /// A function or operator application. Operators use their symbol as
    /// the function name (`"+"`, `"=="`, `"&&"`, ...).
    Call(String, Vec<Expression>),
}

impl Expression {
    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expression::Variable(name.into())
    }

    pub fn call(name: impl Into<String>, args: impl IntoIterator<Item = Expression>) -> Self {
        Expression::Call(name.into(), args.into_iter().collect())
    }
}

/// Compiles an expression tree against a context.
///
/// Children are compiled first; each call site then runs the function's
/// arity gate and `compute_type` pass before its `compile` pass builds the
/// evaluator. Any error aborts the whole compilation; no partial evaluator
/// tree is returned.
pub fn compile(expr: &Expression, ctx: &ExpressionContext) -> ExprResult<Evaluator> {
    ctx.check_stop()?;
    match expr {
        Expression::Literal(value) => Ok(Evaluator::constant(value.clone())),
        Expression::Variable(name) => ctx.variable_evaluator(name),
        Expression::Call(name, args) => {
            let spec = *ctx
                .function(name)
                .ok_or_else(|| ExprError::UnknownFunction(name.clone()))?;
            spec.check_arity(args.len())?;

            let children = args
                .iter()
                .map(|arg| compile(arg, ctx))
                .collect::<ExprResult<Vec<Evaluator>>>()?;

            let child_types: Vec<_> = children.iter().map(|c| c.ty()).collect();
            let result_type = (spec.compute_type)(spec.name, &child_types)?;

            let evaluator = (spec.compile)(ctx, children)?;
            if evaluator.ty() != result_type {
                return Err(ExprError::internal(format!(
                    "function '{}' compiled to {} but resolved to {}",
                    spec.name,
                    evaluator.ty(),
                    result_type
                )));
            }
            // Volatility is enforced here, not in each compile fn: a
            // volatile spec never yields a constant evaluator, even when
            // its compile pass folded over constant children.
            let evaluator = if spec.volatility == Volatility::Volatile && evaluator.is_constant() {
                Evaluator::new(evaluator.ty(), false, evaluator.kind().clone())?
            } else {
                evaluator
            };
            debug!(
                "compiled call to '{}' -> {} (constant: {})",
                spec.name,
                result_type,
                evaluator.is_constant()
            );
            Ok(evaluator)
        }
    }
}
