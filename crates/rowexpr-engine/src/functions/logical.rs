//! Logical functions: `if`, conjunction, disjunction, negation and the
//! missingness test.
//!
//! These are the missing-aware functions: they do not blindly propagate the
//! missing sentinel. Conjunction and disjunction use three-valued logic
//! (`false && missing == false`, `true || missing == true`), `if` with a
//! missing condition yields a missing result, and `missing` itself maps
//! missingness to a plain boolean.

use std::rc::Rc;

use crate::context::ExpressionContext;
use crate::error::{ExprError, ExprResult};
use crate::evaluator::{Evaluator, EvaluatorKind};
use crate::function::{check_type, fold1, wrong_type, FunctionSpec, Volatility, VAR_ARGS};
use crate::value::ExpressionType;

pub(super) const FUNCTIONS: &[FunctionSpec] = &[
    FunctionSpec {
        name: "if",
        min_args: 3,
        max_args: 3,
        volatility: Volatility::NonVolatile,
        compute_type: if_type,
        compile: compile_if,
    },
    FunctionSpec {
        name: "&&",
        min_args: 2,
        max_args: VAR_ARGS,
        volatility: Volatility::NonVolatile,
        compute_type: all_boolean,
        compile: compile_and,
    },
    FunctionSpec {
        name: "and",
        min_args: 2,
        max_args: VAR_ARGS,
        volatility: Volatility::NonVolatile,
        compute_type: all_boolean,
        compile: compile_and,
    },
    FunctionSpec {
        name: "||",
        min_args: 2,
        max_args: VAR_ARGS,
        volatility: Volatility::NonVolatile,
        compute_type: all_boolean,
        compile: compile_or,
    },
    FunctionSpec {
        name: "or",
        min_args: 2,
        max_args: VAR_ARGS,
        volatility: Volatility::NonVolatile,
        compute_type: all_boolean,
        compile: compile_or,
    },
    FunctionSpec {
        name: "!",
        min_args: 1,
        max_args: 1,
        volatility: Volatility::NonVolatile,
        compute_type: all_boolean,
        compile: compile_not,
    },
    FunctionSpec {
        name: "not",
        min_args: 1,
        max_args: 1,
        volatility: Volatility::NonVolatile,
        compute_type: all_boolean,
        compile: compile_not,
    },
    FunctionSpec {
        name: "missing",
        min_args: 1,
        max_args: 1,
        volatility: Volatility::NonVolatile,
        compute_type: missing_type,
        compile: compile_missing,
    },
];

fn all_boolean(name: &'static str, args: &[ExpressionType]) -> ExprResult<ExpressionType> {
    for (i, ty) in args.iter().enumerate() {
        check_type(name, i + 1, ExpressionType::Boolean, *ty)?;
    }
    Ok(ExpressionType::Boolean)
}

fn if_type(name: &'static str, args: &[ExpressionType]) -> ExprResult<ExpressionType> {
    check_type(name, 1, ExpressionType::Boolean, args[0])?;
    merge_branch_types(name, args[1], args[2])
}

fn merge_branch_types(
    name: &str,
    then_ty: ExpressionType,
    else_ty: ExpressionType,
) -> ExprResult<ExpressionType> {
    if then_ty == else_ty {
        Ok(then_ty)
    } else if then_ty.is_numeric() && else_ty.is_numeric() {
        Ok(ExpressionType::Double)
    } else {
        Err(wrong_type(name, 3, &then_ty.to_string()))
    }
}

/// Retags an evaluator with a wider numeric type (Integer branch feeding a
/// Double result). Identity for matching types.
fn retag(ev: Evaluator, ty: ExpressionType) -> ExprResult<Evaluator> {
    if ev.ty() == ty {
        Ok(ev)
    } else {
        Evaluator::new(ty, ev.is_constant(), ev.kind().clone())
    }
}

fn compile_if(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    let [cond, then_ev, else_ev]: [Evaluator; 3] = args
        .try_into()
        .map_err(|_| ExprError::internal("'if' compiled with wrong argument count"))?;
    let ty = merge_branch_types("if", then_ev.ty(), else_ev.ty())?;
    let fc = cond.as_boolean_fn()?;

    // A constant condition selects one branch at compile time; the other
    // branch is dropped entirely.
    if cond.is_constant() {
        return match fc()? {
            Some(true) => retag(then_ev, ty),
            Some(false) => retag(else_ev, ty),
            None => Ok(Evaluator::constant(ty.missing())),
        };
    }

    let then_ev = retag(then_ev, ty)?;
    let else_ev = retag(else_ev, ty)?;
    let kind = match ty {
        ExpressionType::Double | ExpressionType::Integer => {
            let ft = then_ev.as_double_fn()?;
            let fe = else_ev.as_double_fn()?;
            EvaluatorKind::Double(Rc::new(move || match fc()? {
                Some(true) => ft(),
                Some(false) => fe(),
                None => Ok(f64::NAN),
            }))
        }
        ExpressionType::String => {
            let ft = then_ev.as_string_fn()?;
            let fe = else_ev.as_string_fn()?;
            EvaluatorKind::String(Rc::new(move || match fc()? {
                Some(true) => ft(),
                Some(false) => fe(),
                None => Ok(None),
            }))
        }
        ExpressionType::Boolean => {
            let ft = then_ev.as_boolean_fn()?;
            let fe = else_ev.as_boolean_fn()?;
            EvaluatorKind::Boolean(Rc::new(move || match fc()? {
                Some(true) => ft(),
                Some(false) => fe(),
                None => Ok(None),
            }))
        }
        ExpressionType::Instant => {
            let ft = then_ev.as_instant_fn()?;
            let fe = else_ev.as_instant_fn()?;
            EvaluatorKind::Instant(Rc::new(move || match fc()? {
                Some(true) => ft(),
                Some(false) => fe(),
                None => Ok(None),
            }))
        }
        ExpressionType::LocalTime => {
            let ft = then_ev.as_local_time_fn()?;
            let fe = else_ev.as_local_time_fn()?;
            EvaluatorKind::LocalTime(Rc::new(move || match fc()? {
                Some(true) => ft(),
                Some(false) => fe(),
                None => Ok(None),
            }))
        }
        ExpressionType::StringSet => {
            let ft = then_ev.as_string_set_fn()?;
            let fe = else_ev.as_string_set_fn()?;
            EvaluatorKind::StringSet(Rc::new(move || match fc()? {
                Some(true) => ft(),
                Some(false) => fe(),
                None => Ok(None),
            }))
        }
        ExpressionType::StringList => {
            let ft = then_ev.as_string_list_fn()?;
            let fe = else_ev.as_string_list_fn()?;
            EvaluatorKind::StringList(Rc::new(move || match fc()? {
                Some(true) => ft(),
                Some(false) => fe(),
                None => Ok(None),
            }))
        }
    };
    Evaluator::new(ty, false, kind)
}

/// Three-valued conjunction over two or more operands.
fn compile_and(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    compile_junction(args, false)
}

/// Three-valued disjunction over two or more operands.
fn compile_or(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    compile_junction(args, true)
}

/// Shared and/or compilation. `absorbing` is the operand value that decides
/// the result regardless of every other operand (`false` for and, `true`
/// for or).
fn compile_junction(args: Vec<Evaluator>, absorbing: bool) -> ExprResult<Evaluator> {
    let mut deferred = Vec::new();
    let mut saw_constant_missing = false;
    for arg in &args {
        let f = arg.as_boolean_fn()?;
        if arg.is_constant() {
            match f()? {
                // A constant absorbing operand decides the whole junction.
                Some(v) if v == absorbing => {
                    return Ok(Evaluator::constant(crate::value::Value::Boolean(Some(
                        absorbing,
                    ))))
                }
                // A constant neutral operand drops out.
                Some(_) => {}
                // Constant missing cannot decide yet: a later absorbing
                // operand still wins, so remember it and keep going.
                None => saw_constant_missing = true,
            }
        } else {
            deferred.push(f);
        }
    }

    if deferred.is_empty() {
        let result = if saw_constant_missing {
            None
        } else {
            Some(!absorbing)
        };
        return Ok(Evaluator::constant(crate::value::Value::Boolean(result)));
    }

    Evaluator::new(
        ExpressionType::Boolean,
        false,
        EvaluatorKind::Boolean(Rc::new(move || {
            let mut missing = saw_constant_missing;
            for f in &deferred {
                match f()? {
                    Some(v) if v == absorbing => return Ok(Some(absorbing)),
                    Some(_) => {}
                    None => missing = true,
                }
            }
            Ok(if missing { None } else { Some(!absorbing) })
        })),
    )
}

fn compile_not(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold1::<Option<bool>, Option<bool>, _>(ExpressionType::Boolean, &args[0], |v| Ok(Some(!v)))
}

fn missing_type(_name: &'static str, _args: &[ExpressionType]) -> ExprResult<ExpressionType> {
    // Any single argument type is acceptable.
    Ok(ExpressionType::Boolean)
}

fn compile_missing(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    let arg = &args[0];
    let probe: Rc<dyn Fn() -> ExprResult<bool>> = match arg.kind() {
        EvaluatorKind::Double(f) => {
            let f = f.clone();
            Rc::new(move || Ok(f()?.is_nan()))
        }
        EvaluatorKind::String(f) => {
            let f = f.clone();
            Rc::new(move || Ok(f()?.is_none()))
        }
        EvaluatorKind::Boolean(f) => {
            let f = f.clone();
            Rc::new(move || Ok(f()?.is_none()))
        }
        EvaluatorKind::Instant(f) => {
            let f = f.clone();
            Rc::new(move || Ok(f()?.is_none()))
        }
        EvaluatorKind::LocalTime(f) => {
            let f = f.clone();
            Rc::new(move || Ok(f()?.is_none()))
        }
        EvaluatorKind::StringSet(f) => {
            let f = f.clone();
            Rc::new(move || Ok(f()?.is_none()))
        }
        EvaluatorKind::StringList(f) => {
            let f = f.clone();
            Rc::new(move || Ok(f()?.is_none()))
        }
    };

    if arg.is_constant() {
        let v = probe()?;
        return Ok(Evaluator::constant(crate::value::Value::Boolean(Some(v))));
    }
    Evaluator::new(
        ExpressionType::Boolean,
        false,
        EvaluatorKind::Boolean(Rc::new(move || Ok(Some(probe()?)))),
    )
}
