//! Text functions. Positions and lengths are in characters, 0-based.
//!
//! `matches` and `replace_all` take regular expressions; a constant pattern
//! is compiled exactly once at expression-compile time, a per-row pattern is
//! compiled per invocation. Pattern syntax errors surface as wrapped library
//! errors carrying the regex engine's message.

use std::rc::Rc;
use std::sync::Arc;

use regex::Regex;

use crate::context::ExpressionContext;
use crate::error::{ExprError, ExprResult};
use crate::evaluator::Evaluator;
use crate::function::{
    check_numeric, check_type, fold1, fold2, fold3, fold_n_string, FunctionSpec, Volatility,
    VAR_ARGS,
};
use crate::value::ExpressionType;

pub(super) const FUNCTIONS: &[FunctionSpec] = &[
    FunctionSpec {
        name: "concat",
        min_args: 1,
        max_args: VAR_ARGS,
        volatility: Volatility::NonVolatile,
        compute_type: all_string_to_string,
        compile: compile_concat,
    },
    FunctionSpec {
        name: "length",
        min_args: 1,
        max_args: 1,
        volatility: Volatility::NonVolatile,
        compute_type: string_to_integer,
        compile: compile_length,
    },
    FunctionSpec {
        name: "lower",
        min_args: 1,
        max_args: 1,
        volatility: Volatility::NonVolatile,
        compute_type: all_string_to_string,
        compile: compile_lower,
    },
    FunctionSpec {
        name: "upper",
        min_args: 1,
        max_args: 1,
        volatility: Volatility::NonVolatile,
        compute_type: all_string_to_string,
        compile: compile_upper,
    },
    FunctionSpec {
        name: "trim",
        min_args: 1,
        max_args: 1,
        volatility: Volatility::NonVolatile,
        compute_type: all_string_to_string,
        compile: compile_trim,
    },
    FunctionSpec {
        name: "cut",
        min_args: 3,
        max_args: 3,
        volatility: Volatility::NonVolatile,
        compute_type: cut_type,
        compile: compile_cut,
    },
    FunctionSpec {
        name: "index",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: two_strings_to_integer,
        compile: compile_index,
    },
    FunctionSpec {
        name: "replace",
        min_args: 3,
        max_args: 3,
        volatility: Volatility::NonVolatile,
        compute_type: all_string_to_string,
        compile: compile_replace,
    },
    FunctionSpec {
        name: "replace_all",
        min_args: 3,
        max_args: 3,
        volatility: Volatility::NonVolatile,
        compute_type: all_string_to_string,
        compile: compile_replace_all,
    },
    FunctionSpec {
        name: "starts",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: two_strings_to_boolean,
        compile: compile_starts,
    },
    FunctionSpec {
        name: "ends",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: two_strings_to_boolean,
        compile: compile_ends,
    },
    FunctionSpec {
        name: "contains",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: two_strings_to_boolean,
        compile: compile_contains,
    },
    FunctionSpec {
        name: "matches",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: two_strings_to_boolean,
        compile: compile_matches,
    },
    FunctionSpec {
        name: "compare",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: two_strings_to_integer,
        compile: compile_compare,
    },
    FunctionSpec {
        name: "char_at",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: string_number_to_string,
        compile: compile_char_at,
    },
    FunctionSpec {
        name: "prefix",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: string_number_to_string,
        compile: compile_prefix,
    },
    FunctionSpec {
        name: "suffix",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: string_number_to_string,
        compile: compile_suffix,
    },
];

fn all_string_to_string(
    name: &'static str,
    args: &[ExpressionType],
) -> ExprResult<ExpressionType> {
    for (i, ty) in args.iter().enumerate() {
        check_type(name, i + 1, ExpressionType::String, *ty)?;
    }
    Ok(ExpressionType::String)
}

fn string_to_integer(name: &'static str, args: &[ExpressionType]) -> ExprResult<ExpressionType> {
    check_type(name, 1, ExpressionType::String, args[0])?;
    Ok(ExpressionType::Integer)
}

fn two_strings_to_integer(
    name: &'static str,
    args: &[ExpressionType],
) -> ExprResult<ExpressionType> {
    check_type(name, 1, ExpressionType::String, args[0])?;
    check_type(name, 2, ExpressionType::String, args[1])?;
    Ok(ExpressionType::Integer)
}

fn two_strings_to_boolean(
    name: &'static str,
    args: &[ExpressionType],
) -> ExprResult<ExpressionType> {
    check_type(name, 1, ExpressionType::String, args[0])?;
    check_type(name, 2, ExpressionType::String, args[1])?;
    Ok(ExpressionType::Boolean)
}

fn string_number_to_string(
    name: &'static str,
    args: &[ExpressionType],
) -> ExprResult<ExpressionType> {
    check_type(name, 1, ExpressionType::String, args[0])?;
    check_numeric(name, 2, args[1])?;
    Ok(ExpressionType::String)
}

fn cut_type(name: &'static str, args: &[ExpressionType]) -> ExprResult<ExpressionType> {
    check_type(name, 1, ExpressionType::String, args[0])?;
    check_numeric(name, 2, args[1])?;
    check_numeric(name, 3, args[2])?;
    Ok(ExpressionType::String)
}

fn compile_concat(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    // Missing operands contribute nothing instead of poisoning the result.
    fold_n_string(&args, |values| {
        let mut out = String::new();
        for v in values.iter().flatten() {
            out.push_str(v);
        }
        Ok(Some(Arc::from(out)))
    })
}

fn compile_length(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold1::<Option<Arc<str>>, f64, _>(ExpressionType::Integer, &args[0], |s| {
        Ok(s.chars().count() as f64)
    })
}

fn compile_lower(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold1::<Option<Arc<str>>, Option<Arc<str>>, _>(ExpressionType::String, &args[0], |s| {
        Ok(Some(Arc::from(s.to_lowercase())))
    })
}

fn compile_upper(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold1::<Option<Arc<str>>, Option<Arc<str>>, _>(ExpressionType::String, &args[0], |s| {
        Ok(Some(Arc::from(s.to_uppercase())))
    })
}

fn compile_trim(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold1::<Option<Arc<str>>, Option<Arc<str>>, _>(ExpressionType::String, &args[0], |s| {
        Ok(Some(Arc::from(s.trim())))
    })
}

fn compile_cut(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold3::<Option<Arc<str>>, f64, f64, Option<Arc<str>>, _>(
        ExpressionType::String,
        &args[0],
        &args[1],
        &args[2],
        |s, start, len| {
            let (start, len) = (start as i64, len as i64);
            let total = s.chars().count() as i64;
            if start < 0 || len < 0 || start + len > total {
                return Err(ExprError::library(
                    "cut",
                    format!("range {start}..{} out of bounds for length {total}", start + len),
                ));
            }
            let out: String = s.chars().skip(start as usize).take(len as usize).collect();
            Ok(Some(Arc::from(out)))
        },
    )
}

fn compile_index(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold2::<Option<Arc<str>>, Option<Arc<str>>, f64, _>(
        ExpressionType::Integer,
        &args[0],
        &args[1],
        |s, sub| {
            Ok(match s.find(&*sub) {
                // Byte offset back to character offset.
                Some(byte_idx) => s[..byte_idx].chars().count() as f64,
                None => -1.0,
            })
        },
    )
}

fn compile_replace(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold3::<Option<Arc<str>>, Option<Arc<str>>, Option<Arc<str>>, Option<Arc<str>>, _>(
        ExpressionType::String,
        &args[0],
        &args[1],
        &args[2],
        |s, target, replacement| {
            if target.is_empty() {
                return Err(ExprError::library("replace", "search string must not be empty"));
            }
            Ok(Some(Arc::from(s.replace(&*target, &replacement))))
        },
    )
}

fn build_regex(function: &'static str, pattern: &str) -> ExprResult<Regex> {
    Regex::new(pattern).map_err(|e| ExprError::library(function, e))
}

/// Regex functions special-case a constant pattern so the regex is compiled
/// once instead of per row.
fn constant_pattern(ev: &Evaluator) -> ExprResult<Option<Option<Arc<str>>>> {
    if ev.is_constant() {
        Ok(Some(ev.as_string_fn()?()?))
    } else {
        Ok(None)
    }
}

fn compile_replace_all(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    if let Some(pattern) = constant_pattern(&args[1])? {
        let Some(pattern) = pattern else {
            return Ok(Evaluator::constant(ExpressionType::String.missing()));
        };
        let re = build_regex("replace_all", &pattern)?;
        return fold2::<Option<Arc<str>>, Option<Arc<str>>, Option<Arc<str>>, _>(
            ExpressionType::String,
            &args[0],
            &args[2],
            move |s, replacement| Ok(Some(Arc::from(re.replace_all(&s, &*replacement).into_owned()))),
        );
    }
    fold3::<Option<Arc<str>>, Option<Arc<str>>, Option<Arc<str>>, Option<Arc<str>>, _>(
        ExpressionType::String,
        &args[0],
        &args[1],
        &args[2],
        |s, pattern, replacement| {
            let re = build_regex("replace_all", &pattern)?;
            Ok(Some(Arc::from(re.replace_all(&s, &*replacement).into_owned())))
        },
    )
}

fn compile_matches(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    if let Some(pattern) = constant_pattern(&args[1])? {
        let Some(pattern) = pattern else {
            return Ok(Evaluator::constant(ExpressionType::Boolean.missing()));
        };
        let re = build_regex("matches", &pattern)?;
        return fold1::<Option<Arc<str>>, Option<bool>, _>(
            ExpressionType::Boolean,
            &args[0],
            move |s| Ok(Some(full_match(&re, &s))),
        );
    }
    fold2::<Option<Arc<str>>, Option<Arc<str>>, Option<bool>, _>(
        ExpressionType::Boolean,
        &args[0],
        &args[1],
        |s, pattern| {
            let re = build_regex("matches", &pattern)?;
            Ok(Some(full_match(&re, &s)))
        },
    )
}

/// `matches` tests the whole string, not a substring hit.
fn full_match(re: &Regex, s: &str) -> bool {
    re.find(s).map(|m| m.start() == 0 && m.end() == s.len()).unwrap_or(false)
}

fn compile_starts(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold2::<Option<Arc<str>>, Option<Arc<str>>, Option<bool>, _>(
        ExpressionType::Boolean,
        &args[0],
        &args[1],
        |s, prefix| Ok(Some(s.starts_with(&*prefix))),
    )
}

fn compile_ends(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold2::<Option<Arc<str>>, Option<Arc<str>>, Option<bool>, _>(
        ExpressionType::Boolean,
        &args[0],
        &args[1],
        |s, suffix| Ok(Some(s.ends_with(&*suffix))),
    )
}

fn compile_contains(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold2::<Option<Arc<str>>, Option<Arc<str>>, Option<bool>, _>(
        ExpressionType::Boolean,
        &args[0],
        &args[1],
        |s, sub| Ok(Some(s.contains(&*sub))),
    )
}

fn compile_compare(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold2::<Option<Arc<str>>, Option<Arc<str>>, f64, _>(
        ExpressionType::Integer,
        &args[0],
        &args[1],
        |a, b| {
            Ok(match a.as_ref().cmp(&b.as_ref()) {
                std::cmp::Ordering::Less => -1.0,
                std::cmp::Ordering::Equal => 0.0,
                std::cmp::Ordering::Greater => 1.0,
            })
        },
    )
}

fn compile_char_at(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold2::<Option<Arc<str>>, f64, Option<Arc<str>>, _>(
        ExpressionType::String,
        &args[0],
        &args[1],
        |s, idx| {
            let idx = idx as i64;
            if idx < 0 {
                return Ok(None);
            }
            Ok(s.chars()
                .nth(idx as usize)
                .map(|c| Arc::from(c.to_string())))
        },
    )
}

fn compile_prefix(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold2::<Option<Arc<str>>, f64, Option<Arc<str>>, _>(
        ExpressionType::String,
        &args[0],
        &args[1],
        |s, n| {
            let n = (n.max(0.0)) as usize;
            Ok(Some(Arc::from(s.chars().take(n).collect::<String>())))
        },
    )
}

fn compile_suffix(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold2::<Option<Arc<str>>, f64, Option<Arc<str>>, _>(
        ExpressionType::String,
        &args[0],
        &args[1],
        |s, n| {
            let n = (n.max(0.0)) as usize;
            let total = s.chars().count();
            let skip = total.saturating_sub(n);
            Ok(Some(Arc::from(s.chars().skip(skip).collect::<String>())))
        },
    )
}
