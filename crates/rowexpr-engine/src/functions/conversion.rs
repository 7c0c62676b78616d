//! Conversions between strings, numbers and instants.
//!
//! `parse` is lenient: unparseable text yields missing, since a column of
//! mixed text is legitimate input. `date_time_parse` expects RFC 3339 and
//! treats malformed input as an error carrying the parser's message.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::context::ExpressionContext;
use crate::error::{ExprError, ExprResult};
use crate::evaluator::Evaluator;
use crate::function::{check_type, fold1, fold2, FunctionSpec, Volatility};
use crate::functions::datetime::resolve_zone;
use crate::value::ExpressionType;

pub(super) const FUNCTIONS: &[FunctionSpec] = &[
    FunctionSpec {
        name: "parse",
        min_args: 1,
        max_args: 1,
        volatility: Volatility::NonVolatile,
        compute_type: parse_type,
        compile: compile_parse,
    },
    FunctionSpec {
        name: "str",
        min_args: 1,
        max_args: 1,
        volatility: Volatility::NonVolatile,
        compute_type: str_type,
        compile: compile_str,
    },
    FunctionSpec {
        name: "date_time_parse",
        min_args: 1,
        max_args: 1,
        volatility: Volatility::NonVolatile,
        compute_type: date_time_parse_type,
        compile: compile_date_time_parse,
    },
    FunctionSpec {
        name: "date_time_format",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: date_time_format_type,
        compile: compile_date_time_format,
    },
];

fn parse_type(name: &'static str, args: &[ExpressionType]) -> ExprResult<ExpressionType> {
    check_type(name, 1, ExpressionType::String, args[0])?;
    Ok(ExpressionType::Double)
}

fn compile_parse(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold1::<Option<Arc<str>>, f64, _>(ExpressionType::Double, &args[0], |s| {
        Ok(f64::from_str(s.trim()).unwrap_or(f64::NAN))
    })
}

fn str_type(name: &'static str, args: &[ExpressionType]) -> ExprResult<ExpressionType> {
    crate::function::check_numeric(name, 1, args[0])?;
    Ok(ExpressionType::String)
}

fn compile_str(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold1::<f64, Option<Arc<str>>, _>(ExpressionType::String, &args[0], |v| {
        let text = if v.is_finite() && v == v.trunc() && v.abs() < 9.007_199_254_740_992e15 {
            format!("{}", v as i64)
        } else {
            format!("{v}")
        };
        Ok(Some(Arc::from(text)))
    })
}

fn date_time_parse_type(
    name: &'static str,
    args: &[ExpressionType],
) -> ExprResult<ExpressionType> {
    check_type(name, 1, ExpressionType::String, args[0])?;
    Ok(ExpressionType::Instant)
}

fn compile_date_time_parse(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold1::<Option<Arc<str>>, Option<DateTime<Utc>>, _>(
        ExpressionType::Instant,
        &args[0],
        |s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|e| ExprError::library("date_time_parse", e))
        },
    )
}

fn date_time_format_type(
    name: &'static str,
    args: &[ExpressionType],
) -> ExprResult<ExpressionType> {
    check_type(name, 1, ExpressionType::Instant, args[0])?;
    check_type(name, 2, ExpressionType::String, args[1])?;
    Ok(ExpressionType::String)
}

fn compile_date_time_format(
    _ctx: &ExpressionContext,
    args: Vec<Evaluator>,
) -> ExprResult<Evaluator> {
    fold2::<Option<DateTime<Utc>>, Option<Arc<str>>, Option<Arc<str>>, _>(
        ExpressionType::String,
        &args[0],
        &args[1],
        |instant, zone| {
            let tz = resolve_zone("date_time_format", &zone)?;
            let text = instant
                .with_timezone(&tz)
                .to_rfc3339_opts(SecondsFormat::AutoSi, true);
            Ok(Some(Arc::from(text)))
        },
    )
}
