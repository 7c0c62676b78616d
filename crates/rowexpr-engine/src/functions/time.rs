//! Local-time functions. These mirror the date-time family but operate on
//! zone-less times of day, accept only the hour-and-below units, and wrap
//! around midnight on add instead of overflowing.

use std::sync::Arc;

use chrono::{NaiveTime, TimeDelta, Timelike};

use crate::context::ExpressionContext;
use crate::error::{ExprError, ExprResult};
use crate::evaluator::Evaluator;
use crate::function::{check_numeric, check_type, fold2, fold3, FunctionSpec, Volatility};
use crate::functions::bitwise::to_i64;
use crate::functions::datetime::{check_subsecond_range, parse_unit, DateUnit};
use crate::value::ExpressionType;

pub(super) const FUNCTIONS: &[FunctionSpec] = &[
    FunctionSpec {
        name: "time_get",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: get_type,
        compile: compile_get,
    },
    FunctionSpec {
        name: "time_add",
        min_args: 3,
        max_args: 3,
        volatility: Volatility::NonVolatile,
        compute_type: add_set_type,
        compile: compile_add,
    },
    FunctionSpec {
        name: "time_set",
        min_args: 3,
        max_args: 3,
        volatility: Volatility::NonVolatile,
        compute_type: add_set_type,
        compile: compile_set,
    },
    FunctionSpec {
        name: "time_diff",
        min_args: 3,
        max_args: 3,
        volatility: Volatility::NonVolatile,
        compute_type: diff_type,
        compile: compile_diff,
    },
];

/// Accepts the shared unit vocabulary but rejects date-based units, which
/// have no meaning for a time of day.
fn parse_time_unit(function: &'static str, unit: &str) -> ExprResult<DateUnit> {
    let parsed = parse_unit(function, unit)?;
    match parsed {
        DateUnit::Year | DateUnit::Month | DateUnit::Week | DateUnit::Day => {
            Err(ExprError::InvalidUnit {
                function: function.to_string(),
                unit: unit.to_string(),
            })
        }
        _ => Ok(parsed),
    }
}

fn get_type(name: &'static str, args: &[ExpressionType]) -> ExprResult<ExpressionType> {
    check_type(name, 1, ExpressionType::LocalTime, args[0])?;
    check_type(name, 2, ExpressionType::String, args[1])?;
    Ok(ExpressionType::Integer)
}

fn compile_get(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold2::<Option<NaiveTime>, Option<Arc<str>>, f64, _>(
        ExpressionType::Integer,
        &args[0],
        &args[1],
        |time, unit| {
            Ok(match parse_time_unit("time_get", &unit)? {
                DateUnit::Hour => time.hour() as f64,
                DateUnit::Minute => time.minute() as f64,
                DateUnit::Second => time.second() as f64,
                DateUnit::Millisecond => (time.nanosecond() / 1_000_000) as f64,
                DateUnit::Nanosecond => (time.nanosecond() % 1_000_000) as f64,
                _ => unreachable!(),
            })
        },
    )
}

fn add_set_type(name: &'static str, args: &[ExpressionType]) -> ExprResult<ExpressionType> {
    check_type(name, 1, ExpressionType::LocalTime, args[0])?;
    check_numeric(name, 2, args[1])?;
    check_type(name, 3, ExpressionType::String, args[2])?;
    Ok(ExpressionType::LocalTime)
}

fn compile_add(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold3::<Option<NaiveTime>, f64, Option<Arc<str>>, Option<NaiveTime>, _>(
        ExpressionType::LocalTime,
        &args[0],
        &args[1],
        &args[2],
        |time, amount, unit| {
            let unit = parse_time_unit("time_add", &unit)?;
            let amount = to_i64("time_add", amount)?;
            // NaiveTime addition wraps around midnight, so any finite
            // amount is valid once reduced modulo a day.
            let delta = match unit {
                DateUnit::Hour => TimeDelta::hours(amount.rem_euclid(24)),
                DateUnit::Minute => TimeDelta::minutes(amount.rem_euclid(24 * 60)),
                DateUnit::Second => TimeDelta::seconds(amount.rem_euclid(24 * 3_600)),
                DateUnit::Millisecond => {
                    TimeDelta::milliseconds(amount.rem_euclid(24 * 3_600_000))
                }
                DateUnit::Nanosecond => {
                    TimeDelta::nanoseconds(amount.rem_euclid(24 * 3_600_000_000_000))
                }
                _ => unreachable!(),
            };
            Ok(Some(time + delta))
        },
    )
}

fn compile_set(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold3::<Option<NaiveTime>, f64, Option<Arc<str>>, Option<NaiveTime>, _>(
        ExpressionType::LocalTime,
        &args[0],
        &args[1],
        &args[2],
        |time, value, unit| {
            let unit = parse_time_unit("time_set", &unit)?;
            let value = to_i64("time_set", value)?;
            let invalid =
                || ExprError::library("time_set", format!("invalid value {value} for unit"));
            let updated = match unit {
                DateUnit::Hour => {
                    time.with_hour(u32::try_from(value).map_err(|_| invalid())?)
                }
                DateUnit::Minute => {
                    time.with_minute(u32::try_from(value).map_err(|_| invalid())?)
                }
                DateUnit::Second => {
                    time.with_second(u32::try_from(value).map_err(|_| invalid())?)
                }
                DateUnit::Millisecond => {
                    check_subsecond_range("time_set", unit, value)?;
                    let nanos_within_ms = time.nanosecond() % 1_000_000;
                    time.with_nanosecond(value as u32 * 1_000_000 + nanos_within_ms)
                }
                DateUnit::Nanosecond => {
                    check_subsecond_range("time_set", unit, value)?;
                    let millis = time.nanosecond() / 1_000_000;
                    time.with_nanosecond(millis * 1_000_000 + value as u32)
                }
                _ => unreachable!(),
            };
            Ok(Some(updated.ok_or_else(invalid)?))
        },
    )
}

fn diff_type(name: &'static str, args: &[ExpressionType]) -> ExprResult<ExpressionType> {
    check_type(name, 1, ExpressionType::LocalTime, args[0])?;
    check_type(name, 2, ExpressionType::LocalTime, args[1])?;
    check_type(name, 3, ExpressionType::String, args[2])?;
    Ok(ExpressionType::Integer)
}

fn compile_diff(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold3::<Option<NaiveTime>, Option<NaiveTime>, Option<Arc<str>>, f64, _>(
        ExpressionType::Integer,
        &args[0],
        &args[1],
        &args[2],
        |from, to, unit| {
            let d = to.signed_duration_since(from);
            Ok(match parse_time_unit("time_diff", &unit)? {
                DateUnit::Hour => d.num_hours() as f64,
                DateUnit::Minute => d.num_minutes() as f64,
                DateUnit::Second => d.num_seconds() as f64,
                DateUnit::Millisecond => d.num_milliseconds() as f64,
                // A within-day difference always fits in i64 nanoseconds.
                DateUnit::Nanosecond => match d.num_nanoseconds() {
                    Some(ns) => ns as f64,
                    None => {
                        return Err(ExprError::NumericOverflow {
                            function: "time_diff".to_string(),
                        })
                    }
                },
                _ => unreachable!(),
            })
        },
    )
}
