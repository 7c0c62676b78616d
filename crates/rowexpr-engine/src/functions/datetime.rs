//! Date-time functions over instants.
//!
//! Every operation first resolves the instant into the caller-supplied IANA
//! time zone, so "add one month" and "get the hour" follow that zone's
//! calendar (month lengths, leap years, DST transitions). Unknown unit or
//! zone strings are user errors; a missing instant, amount, unit or zone
//! propagates to a missing result instead.
//!
//! `date_time_get(.., "month", ..)` returns 0-11. The zero-based month is a
//! long-standing compatibility quirk that downstream expressions rely on;
//! `date_time_set` accepts the same range so get/set round-trip.

use std::rc::Rc;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Days, Months, NaiveDateTime, TimeDelta, Timelike, Utc};
use chrono_tz::Tz;

use crate::context::ExpressionContext;
use crate::error::{ExprError, ExprResult};
use crate::evaluator::{Evaluator, EvaluatorKind};
use crate::function::{check_numeric, check_type, fold2, fold4, FunctionSpec, Volatility};
use crate::functions::bitwise::to_i64;
use crate::value::ExpressionType;

pub(super) const FUNCTIONS: &[FunctionSpec] = &[
    FunctionSpec {
        name: "date_time_now",
        min_args: 0,
        max_args: 0,
        volatility: Volatility::Volatile,
        compute_type: now_type,
        compile: compile_now,
    },
    FunctionSpec {
        name: "date_time_get",
        min_args: 3,
        max_args: 3,
        volatility: Volatility::NonVolatile,
        compute_type: get_type,
        compile: compile_get,
    },
    FunctionSpec {
        name: "date_time_add",
        min_args: 4,
        max_args: 4,
        volatility: Volatility::NonVolatile,
        compute_type: add_set_type,
        compile: compile_add,
    },
    FunctionSpec {
        name: "date_time_set",
        min_args: 4,
        max_args: 4,
        volatility: Volatility::NonVolatile,
        compute_type: add_set_type,
        compile: compile_set,
    },
    FunctionSpec {
        name: "date_time_diff",
        min_args: 4,
        max_args: 4,
        volatility: Volatility::NonVolatile,
        compute_type: diff_type,
        compile: compile_diff,
    },
    FunctionSpec {
        name: "date_time_before",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: two_instants_to_boolean,
        compile: compile_before,
    },
    FunctionSpec {
        name: "date_time_after",
        min_args: 2,
        max_args: 2,
        volatility: Volatility::NonVolatile,
        compute_type: two_instants_to_boolean,
        compile: compile_after,
    },
];

/// The calendar units accepted by the temporal functions. The local-time
/// family reuses this but rejects the date-based units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DateUnit {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
    Nanosecond,
}

pub(crate) fn parse_unit(function: &'static str, unit: &str) -> ExprResult<DateUnit> {
    Ok(match unit {
        "year" => DateUnit::Year,
        "month" => DateUnit::Month,
        "week" => DateUnit::Week,
        "day" => DateUnit::Day,
        "hour" => DateUnit::Hour,
        "minute" => DateUnit::Minute,
        "second" => DateUnit::Second,
        "millisecond" => DateUnit::Millisecond,
        "nanosecond" => DateUnit::Nanosecond,
        _ => {
            return Err(ExprError::InvalidUnit {
                function: function.to_string(),
                unit: unit.to_string(),
            })
        }
    })
}

pub(crate) fn resolve_zone(function: &'static str, zone: &str) -> ExprResult<Tz> {
    zone.parse().map_err(|_| ExprError::InvalidTimeZone {
        function: function.to_string(),
        zone: zone.to_string(),
    })
}

fn overflow_error(function: &'static str) -> ExprError {
    ExprError::library(function, "date-time overflow")
}

fn now_type(_name: &'static str, _args: &[ExpressionType]) -> ExprResult<ExpressionType> {
    Ok(ExpressionType::Instant)
}

/// `date_time_now` re-evaluates on every invocation even though it has no
/// inputs; folding it would freeze the clock.
fn compile_now(ctx: &ExpressionContext, _args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    let now = ctx.now_provider();
    Evaluator::new(
        ExpressionType::Instant,
        false,
        EvaluatorKind::Instant(Rc::new(move || Ok(Some(now())))),
    )
}

fn get_type(name: &'static str, args: &[ExpressionType]) -> ExprResult<ExpressionType> {
    check_type(name, 1, ExpressionType::Instant, args[0])?;
    check_type(name, 2, ExpressionType::String, args[1])?;
    check_type(name, 3, ExpressionType::String, args[2])?;
    Ok(ExpressionType::Integer)
}

fn compile_get(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    crate::function::fold3::<
        Option<DateTime<Utc>>,
        Option<Arc<str>>,
        Option<Arc<str>>,
        f64,
        _,
    >(
        ExpressionType::Integer,
        &args[0],
        &args[1],
        &args[2],
        |instant, unit, zone| {
            let unit = parse_unit("date_time_get", &unit)?;
            let tz = resolve_zone("date_time_get", &zone)?;
            let zoned = instant.with_timezone(&tz);
            Ok(match unit {
                DateUnit::Year => zoned.year() as f64,
                // 0-11, see module docs.
                DateUnit::Month => zoned.month0() as f64,
                DateUnit::Week => zoned.iso_week().week() as f64,
                DateUnit::Day => zoned.day() as f64,
                DateUnit::Hour => zoned.hour() as f64,
                DateUnit::Minute => zoned.minute() as f64,
                DateUnit::Second => zoned.second() as f64,
                DateUnit::Millisecond => (zoned.nanosecond() / 1_000_000) as f64,
                DateUnit::Nanosecond => (zoned.nanosecond() % 1_000_000) as f64,
            })
        },
    )
}

fn add_set_type(name: &'static str, args: &[ExpressionType]) -> ExprResult<ExpressionType> {
    check_type(name, 1, ExpressionType::Instant, args[0])?;
    check_numeric(name, 2, args[1])?;
    check_type(name, 3, ExpressionType::String, args[2])?;
    check_type(name, 4, ExpressionType::String, args[3])?;
    Ok(ExpressionType::Instant)
}

fn compile_add(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold4::<Option<DateTime<Utc>>, f64, Option<Arc<str>>, Option<Arc<str>>, Option<DateTime<Utc>>, _>(
        ExpressionType::Instant,
        &args[0],
        &args[1],
        &args[2],
        &args[3],
        |instant, amount, unit, zone| {
            let unit = parse_unit("date_time_add", &unit)?;
            let tz = resolve_zone("date_time_add", &zone)?;
            // Infinite amounts clamp to the representable extremes instead
            // of overflowing.
            if amount == f64::INFINITY {
                return Ok(Some(DateTime::<Utc>::MAX_UTC));
            }
            if amount == f64::NEG_INFINITY {
                return Ok(Some(DateTime::<Utc>::MIN_UTC));
            }
            let amount = to_i64("date_time_add", amount)?;
            let zoned = instant.with_timezone(&tz);
            let shifted = add_to_zoned(zoned, amount, unit)
                .ok_or_else(|| overflow_error("date_time_add"))?;
            Ok(Some(shifted.with_timezone(&Utc)))
        },
    )
}

fn add_to_zoned(zoned: DateTime<Tz>, amount: i64, unit: DateUnit) -> Option<DateTime<Tz>> {
    match unit {
        DateUnit::Year => add_months(zoned, amount.checked_mul(12)?),
        DateUnit::Month => add_months(zoned, amount),
        DateUnit::Week => add_days(zoned, amount.checked_mul(7)?),
        DateUnit::Day => add_days(zoned, amount),
        DateUnit::Hour => zoned.checked_add_signed(TimeDelta::try_hours(amount)?),
        DateUnit::Minute => zoned.checked_add_signed(TimeDelta::try_minutes(amount)?),
        DateUnit::Second => zoned.checked_add_signed(TimeDelta::try_seconds(amount)?),
        DateUnit::Millisecond => zoned.checked_add_signed(TimeDelta::try_milliseconds(amount)?),
        DateUnit::Nanosecond => zoned.checked_add_signed(TimeDelta::nanoseconds(amount)),
    }
}

fn add_months(zoned: DateTime<Tz>, months: i64) -> Option<DateTime<Tz>> {
    if months >= 0 {
        zoned.checked_add_months(Months::new(u32::try_from(months).ok()?))
    } else {
        zoned.checked_sub_months(Months::new(u32::try_from(-months).ok()?))
    }
}

fn add_days(zoned: DateTime<Tz>, days: i64) -> Option<DateTime<Tz>> {
    if days >= 0 {
        zoned.checked_add_days(Days::new(u64::try_from(days).ok()?))
    } else {
        zoned.checked_sub_days(Days::new(u64::try_from(-days).ok()?))
    }
}

fn compile_set(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold4::<Option<DateTime<Utc>>, f64, Option<Arc<str>>, Option<Arc<str>>, Option<DateTime<Utc>>, _>(
        ExpressionType::Instant,
        &args[0],
        &args[1],
        &args[2],
        &args[3],
        |instant, value, unit, zone| {
            let unit = parse_unit("date_time_set", &unit)?;
            let tz = resolve_zone("date_time_set", &zone)?;
            let value = to_i64("date_time_set", value)?;
            let zoned = instant.with_timezone(&tz);
            let updated = set_on_zoned("date_time_set", zoned, value, unit)?;
            Ok(Some(updated.with_timezone(&Utc)))
        },
    )
}

pub(crate) fn check_subsecond_range(
    function: &'static str,
    unit: DateUnit,
    value: i64,
) -> ExprResult<()> {
    let (name, max) = match unit {
        DateUnit::Millisecond => ("millisecond", 999),
        DateUnit::Nanosecond => ("nanosecond", 999_999),
        _ => return Ok(()),
    };
    if (0..=max).contains(&value) {
        Ok(())
    } else {
        Err(ExprError::OutOfRange {
            function: function.to_string(),
            unit: name.to_string(),
            value,
            min: 0,
            max,
        })
    }
}

fn set_on_zoned(
    function: &'static str,
    zoned: DateTime<Tz>,
    value: i64,
    unit: DateUnit,
) -> ExprResult<DateTime<Tz>> {
    let invalid =
        || ExprError::library(function, format!("invalid value {value} for unit"));
    match unit {
        DateUnit::Year => {
            let year = i32::try_from(value).map_err(|_| invalid())?;
            zoned.with_year(year).ok_or_else(invalid)
        }
        // Same 0-11 range the get operation reports.
        DateUnit::Month => {
            let month = u32::try_from(value).map_err(|_| invalid())?;
            zoned.with_month0(month).ok_or_else(invalid)
        }
        DateUnit::Week => {
            // Shift whole weeks so the ISO week number becomes `value`,
            // keeping weekday and time of day.
            let current = zoned.iso_week().week() as i64;
            add_days(zoned, (value - current).checked_mul(7).ok_or_else(invalid)?)
                .ok_or_else(invalid)
        }
        DateUnit::Day => {
            let day = u32::try_from(value).map_err(|_| invalid())?;
            zoned.with_day(day).ok_or_else(invalid)
        }
        DateUnit::Hour => {
            let hour = u32::try_from(value).map_err(|_| invalid())?;
            zoned.with_hour(hour).ok_or_else(invalid)
        }
        DateUnit::Minute => {
            let minute = u32::try_from(value).map_err(|_| invalid())?;
            zoned.with_minute(minute).ok_or_else(invalid)
        }
        DateUnit::Second => {
            let second = u32::try_from(value).map_err(|_| invalid())?;
            zoned.with_second(second).ok_or_else(invalid)
        }
        DateUnit::Millisecond => {
            check_subsecond_range(function, unit, value)?;
            let nanos_within_ms = zoned.nanosecond() % 1_000_000;
            zoned
                .with_nanosecond(value as u32 * 1_000_000 + nanos_within_ms)
                .ok_or_else(invalid)
        }
        DateUnit::Nanosecond => {
            check_subsecond_range(function, unit, value)?;
            let millis = zoned.nanosecond() / 1_000_000;
            zoned
                .with_nanosecond(millis * 1_000_000 + value as u32)
                .ok_or_else(invalid)
        }
    }
}

fn diff_type(name: &'static str, args: &[ExpressionType]) -> ExprResult<ExpressionType> {
    check_type(name, 1, ExpressionType::Instant, args[0])?;
    check_type(name, 2, ExpressionType::Instant, args[1])?;
    check_type(name, 3, ExpressionType::String, args[2])?;
    check_type(name, 4, ExpressionType::String, args[3])?;
    Ok(ExpressionType::Integer)
}

fn compile_diff(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold4::<Option<DateTime<Utc>>, Option<DateTime<Utc>>, Option<Arc<str>>, Option<Arc<str>>, f64, _>(
        ExpressionType::Integer,
        &args[0],
        &args[1],
        &args[2],
        &args[3],
        |from, to, unit, zone| {
            let unit = parse_unit("date_time_diff", &unit)?;
            let tz = resolve_zone("date_time_diff", &zone)?;
            let diff = instant_diff("date_time_diff", from, to, unit, tz)?;
            Ok(diff as f64)
        },
    )
}

/// Signed distance from `from` to `to`, truncated toward zero.
///
/// Calendar units (year down to day) are measured on the zone-local
/// datetime; hour and below on the exact duration between the instants.
fn instant_diff(
    function: &'static str,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    unit: DateUnit,
    tz: Tz,
) -> ExprResult<i64> {
    match unit {
        DateUnit::Year | DateUnit::Month | DateUnit::Week | DateUnit::Day => {
            let a = from.with_timezone(&tz).naive_local();
            let b = to.with_timezone(&tz).naive_local();
            Ok(match unit {
                DateUnit::Year => months_between(a, b) / 12,
                DateUnit::Month => months_between(a, b),
                DateUnit::Week => (b - a).num_days() / 7,
                DateUnit::Day => (b - a).num_days(),
                _ => unreachable!(),
            })
        }
        _ => {
            let d = to.signed_duration_since(from);
            let overflow = || ExprError::NumericOverflow {
                function: function.to_string(),
            };
            Ok(match unit {
                DateUnit::Hour => d.num_hours(),
                DateUnit::Minute => d.num_minutes(),
                DateUnit::Second => d.num_seconds(),
                DateUnit::Millisecond => d.num_microseconds().ok_or_else(overflow)? / 1_000,
                DateUnit::Nanosecond => d.num_nanoseconds().ok_or_else(overflow)?,
                _ => unreachable!(),
            })
        }
    }
}

/// Whole months from `a` to `b`, truncated toward zero (`until` semantics:
/// a partial trailing month does not count).
fn months_between(a: NaiveDateTime, b: NaiveDateTime) -> i64 {
    let mut months =
        (b.year() as i64 - a.year() as i64) * 12 + (b.month() as i64 - a.month() as i64);
    if let Some(shifted) = add_months_naive(a, months) {
        if months > 0 && shifted > b {
            months -= 1;
        } else if months < 0 && shifted < b {
            months += 1;
        }
    }
    months
}

fn add_months_naive(dt: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    if months >= 0 {
        dt.checked_add_months(Months::new(u32::try_from(months).ok()?))
    } else {
        dt.checked_sub_months(Months::new(u32::try_from(-months).ok()?))
    }
}

fn two_instants_to_boolean(
    name: &'static str,
    args: &[ExpressionType],
) -> ExprResult<ExpressionType> {
    check_type(name, 1, ExpressionType::Instant, args[0])?;
    check_type(name, 2, ExpressionType::Instant, args[1])?;
    Ok(ExpressionType::Boolean)
}

fn compile_before(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold2::<Option<DateTime<Utc>>, Option<DateTime<Utc>>, Option<bool>, _>(
        ExpressionType::Boolean,
        &args[0],
        &args[1],
        |a, b| Ok(Some(a < b)),
    )
}

fn compile_after(_ctx: &ExpressionContext, args: Vec<Evaluator>) -> ExprResult<Evaluator> {
    fold2::<Option<DateTime<Utc>>, Option<DateTime<Utc>>, Option<bool>, _>(
        ExpressionType::Boolean,
        &args[0],
        &args[1],
        |a, b| Ok(Some(a > b)),
    )
}
