//! Date-time and local-time function semantics: zone-aware field access,
//! calendar arithmetic, truncating differences and the sub-second ranges.

use std::rc::Rc;

use chrono::{DateTime, NaiveTime, Utc};
use pretty_assertions::assert_eq;
use rowexpr_engine::{compile, ExprError, Expression, ExpressionContext, Value};

fn lit(v: impl Into<Value>) -> Expression {
    Expression::literal(v)
}

fn call(name: &str, args: impl IntoIterator<Item = Expression>) -> Expression {
    Expression::call(name, args)
}

fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn eval(expr: &Expression) -> Value {
    let ctx = ExpressionContext::standard();
    compile(expr, &ctx).unwrap().evaluate().unwrap()
}

fn eval_err(expr: &Expression) -> ExprError {
    let ctx = ExpressionContext::standard();
    match compile(expr, &ctx) {
        Err(e) => e,
        Ok(ev) => ev.evaluate().unwrap_err(),
    }
}

fn get(t: &str, unit: &str, zone: &str) -> Value {
    eval(&call("date_time_get", [lit(utc(t)), lit(unit), lit(zone)]))
}

fn add(t: &str, amount: i64, unit: &str, zone: &str) -> Value {
    eval(&call(
        "date_time_add",
        [lit(utc(t)), lit(amount), lit(unit), lit(zone)],
    ))
}

fn diff(a: &str, b: &str, unit: &str, zone: &str) -> Value {
    eval(&call(
        "date_time_diff",
        [lit(utc(a)), lit(utc(b)), lit(unit), lit(zone)],
    ))
}

#[test]
fn get_reads_calendar_fields_in_the_given_zone() {
    let t = "2024-03-10T12:30:45.123456789Z";
    assert_eq!(get(t, "year", "UTC"), Value::Integer(2024.0));
    // Months are 0-based: March is 2.
    assert_eq!(get(t, "month", "UTC"), Value::Integer(2.0));
    assert_eq!(get(t, "day", "UTC"), Value::Integer(10.0));
    assert_eq!(get(t, "week", "UTC"), Value::Integer(10.0));
    assert_eq!(get(t, "hour", "UTC"), Value::Integer(12.0));
    // Berlin is CET (+1) on that date.
    assert_eq!(get(t, "hour", "Europe/Berlin"), Value::Integer(13.0));
    assert_eq!(get(t, "minute", "UTC"), Value::Integer(30.0));
    assert_eq!(get(t, "second", "UTC"), Value::Integer(45.0));
    assert_eq!(get(t, "millisecond", "UTC"), Value::Integer(123.0));
    // Nanoseconds within the current millisecond.
    assert_eq!(get(t, "nanosecond", "UTC"), Value::Integer(456789.0));
}

#[test]
fn get_of_missing_instant_is_missing() {
    let expr = call(
        "date_time_get",
        [
            Expression::variable("MISSING_DATE_TIME"),
            lit("year"),
            lit("UTC"),
        ],
    );
    let ctx = ExpressionContext::standard();
    let ev = compile(&expr, &ctx).unwrap();
    assert!(ev.is_constant());
    assert!(ev.evaluate().unwrap().is_missing());
}

#[test]
fn add_clamps_to_the_end_of_shorter_months() {
    assert_eq!(
        add("2024-01-31T00:00:00Z", 1, "month", "UTC"),
        Value::Instant(Some(utc("2024-02-29T00:00:00Z")))
    );
}

#[test]
fn add_day_follows_the_local_calendar_across_dst() {
    // Noon in New York the day before the spring-forward transition; one
    // calendar day later is noon again, which is only 23 elapsed hours.
    assert_eq!(
        add("2024-03-09T17:00:00Z", 1, "day", "America/New_York"),
        Value::Instant(Some(utc("2024-03-10T16:00:00Z")))
    );
    // Hour arithmetic is exact elapsed time.
    assert_eq!(
        add("2024-03-09T17:00:00Z", 24, "hour", "America/New_York"),
        Value::Instant(Some(utc("2024-03-10T17:00:00Z")))
    );
}

#[test]
fn add_infinite_amounts_clamp_to_the_representable_extremes() {
    let plus = call(
        "date_time_add",
        [
            lit(utc("2024-01-01T00:00:00Z")),
            Expression::variable("INFINITY"),
            lit("day"),
            lit("UTC"),
        ],
    );
    assert_eq!(eval(&plus), Value::Instant(Some(DateTime::<Utc>::MAX_UTC)));

    let minus = call(
        "date_time_add",
        [
            lit(utc("2024-01-01T00:00:00Z")),
            call("-", [Expression::variable("INFINITY")]),
            lit("day"),
            lit("UTC"),
        ],
    );
    assert_eq!(eval(&minus), Value::Instant(Some(DateTime::<Utc>::MIN_UTC)));
}

#[test]
fn add_then_get_advances_the_field_by_one() {
    let t = "2024-05-15T10:20:30Z";
    for unit in ["year", "hour", "minute", "second"] {
        let expr = call(
            "date_time_get",
            [
                call(
                    "date_time_add",
                    [lit(utc(t)), lit(1i64), lit(unit), lit("UTC")],
                ),
                lit(unit),
                lit("UTC"),
            ],
        );
        let base = eval(&call("date_time_get", [lit(utc(t)), lit(unit), lit("UTC")]));
        let (Value::Integer(before), Value::Integer(after)) = (base, eval(&expr)) else {
            panic!("expected integer fields");
        };
        assert_eq!(after, before + 1.0, "unit {unit}");
    }
}

#[test]
fn set_replaces_one_field() {
    let t = lit(utc("2024-05-15T10:20:30.123Z"));
    let set = |unit: &str, value: i64| {
        call(
            "date_time_get",
            [
                call(
                    "date_time_set",
                    [t.clone(), lit(value), lit(unit), lit("UTC")],
                ),
                lit(unit),
                lit("UTC"),
            ],
        )
    };
    assert_eq!(eval(&set("year", 2030)), Value::Integer(2030.0));
    // Month 0 is January.
    assert_eq!(eval(&set("month", 0)), Value::Integer(0.0));
    assert_eq!(eval(&set("day", 1)), Value::Integer(1.0));
    assert_eq!(eval(&set("hour", 23)), Value::Integer(23.0));
    assert_eq!(eval(&set("millisecond", 999)), Value::Integer(999.0));
    assert_eq!(eval(&set("nanosecond", 999_999)), Value::Integer(999999.0));
}

#[test]
fn set_subsecond_values_are_range_checked() {
    let t = lit(utc("2024-05-15T10:20:30Z"));
    let err = eval_err(&call(
        "date_time_set",
        [t.clone(), lit(1000i64), lit("millisecond"), lit("UTC")],
    ));
    match err {
        ExprError::OutOfRange { value, max, .. } => {
            assert_eq!(value, 1000);
            assert_eq!(max, 999);
        }
        other => panic!("unexpected error: {other}"),
    }
    let err = eval_err(&call(
        "date_time_set",
        [t, lit(1_000_000i64), lit("nanosecond"), lit("UTC")],
    ));
    assert!(matches!(err, ExprError::OutOfRange { .. }));
}

#[test]
fn set_rejects_impossible_calendar_values() {
    let err = eval_err(&call(
        "date_time_set",
        [
            lit(utc("2024-04-10T00:00:00Z")),
            lit(31i64),
            lit("day"),
            lit("UTC"),
        ],
    ));
    assert!(matches!(err, ExprError::Library { .. }));
}

#[test]
fn diff_truncates_partial_calendar_units() {
    // Jan 31 to Mar 30 is one month: the second month is one day short.
    assert_eq!(
        diff(
            "2024-01-31T00:00:00Z",
            "2024-03-30T00:00:00Z",
            "month",
            "UTC"
        ),
        Value::Integer(1.0)
    );
    assert_eq!(
        diff(
            "2024-03-30T00:00:00Z",
            "2024-01-31T00:00:00Z",
            "month",
            "UTC"
        ),
        Value::Integer(-1.0)
    );
    // 47 elapsed hours is one full day.
    assert_eq!(
        diff(
            "2024-01-01T12:00:00Z",
            "2024-01-03T11:00:00Z",
            "day",
            "UTC"
        ),
        Value::Integer(1.0)
    );
    assert_eq!(
        diff(
            "2024-01-01T12:00:00Z",
            "2024-01-03T11:00:00Z",
            "hour",
            "UTC"
        ),
        Value::Integer(47.0)
    );
    // Feb 29 to Feb 28 four years later misses the anniversary by a day.
    assert_eq!(
        diff(
            "2020-02-29T00:00:00Z",
            "2024-02-28T00:00:00Z",
            "year",
            "UTC"
        ),
        Value::Integer(3.0)
    );
}

#[test]
fn diff_overflow_in_subsecond_units_is_reported() {
    let expr = call(
        "date_time_diff",
        [
            Expression::Literal(Value::Instant(Some(DateTime::<Utc>::MIN_UTC))),
            Expression::Literal(Value::Instant(Some(DateTime::<Utc>::MAX_UTC))),
            lit("millisecond"),
            lit("UTC"),
        ],
    );
    assert!(matches!(
        eval_err(&expr),
        ExprError::NumericOverflow { .. }
    ));

    let expr = call(
        "date_time_diff",
        [
            lit(utc("1600-01-01T00:00:00Z")),
            lit(utc("2000-01-01T00:00:00Z")),
            lit("nanosecond"),
            lit("UTC"),
        ],
    );
    assert!(matches!(
        eval_err(&expr),
        ExprError::NumericOverflow { .. }
    ));
}

#[test]
fn before_and_after_are_strict() {
    let a = lit(utc("2024-01-01T00:00:00Z"));
    let b = lit(utc("2024-06-01T00:00:00Z"));
    assert_eq!(
        eval(&call("date_time_before", [a.clone(), b.clone()])),
        Value::from(true)
    );
    assert_eq!(
        eval(&call("date_time_after", [a.clone(), b])),
        Value::from(false)
    );
    assert_eq!(
        eval(&call("date_time_before", [a.clone(), a])),
        Value::from(false)
    );
}

#[test]
fn unknown_units_and_zones_are_user_errors() {
    let err = eval_err(&call(
        "date_time_get",
        [lit(utc("2024-01-01T00:00:00Z")), lit("fortnight"), lit("UTC")],
    ));
    assert!(matches!(err, ExprError::InvalidUnit { ref unit, .. } if unit == "fortnight"));
    assert!(err.is_user_error());

    let err = eval_err(&call(
        "date_time_get",
        [
            lit(utc("2024-01-01T00:00:00Z")),
            lit("year"),
            lit("Mars/Olympus"),
        ],
    ));
    assert!(matches!(err, ExprError::InvalidTimeZone { .. }));
}

#[test]
fn now_uses_the_injected_clock() {
    let mut ctx = ExpressionContext::standard();
    let fixed = utc("2024-08-01T12:00:00Z");
    ctx.set_now_provider(Rc::new(move || fixed));
    let ev = compile(&call("date_time_now", []), &ctx).unwrap();
    assert!(!ev.is_constant());
    assert_eq!(ev.evaluate().unwrap(), Value::Instant(Some(fixed)));
}

#[test]
fn format_renders_in_the_requested_zone() {
    let expr = call(
        "date_time_format",
        [lit(utc("2024-01-15T10:30:00Z")), lit("UTC")],
    );
    assert_eq!(eval(&expr), Value::from("2024-01-15T10:30:00Z"));
}

#[test]
fn parse_and_format_round_trip() {
    let expr = call(
        "date_time_format",
        [
            call("date_time_parse", [lit("2024-01-15T10:30:00Z")]),
            lit("UTC"),
        ],
    );
    assert_eq!(eval(&expr), Value::from("2024-01-15T10:30:00Z"));
}

#[test]
fn unparseable_instant_is_a_user_error() {
    let err = eval_err(&call("date_time_parse", [lit("yesterday")]));
    assert!(matches!(err, ExprError::Library { .. }));
    assert!(err.is_user_error());
}

fn time(h: u32, m: u32, s: u32, nano: u32) -> NaiveTime {
    NaiveTime::from_hms_nano_opt(h, m, s, nano).unwrap()
}

#[test]
fn time_get_reads_fields() {
    let t = lit(time(12, 30, 45, 123_456_789));
    assert_eq!(
        eval(&call("time_get", [t.clone(), lit("hour")])),
        Value::Integer(12.0)
    );
    assert_eq!(
        eval(&call("time_get", [t.clone(), lit("minute")])),
        Value::Integer(30.0)
    );
    assert_eq!(
        eval(&call("time_get", [t.clone(), lit("second")])),
        Value::Integer(45.0)
    );
    assert_eq!(
        eval(&call("time_get", [t.clone(), lit("millisecond")])),
        Value::Integer(123.0)
    );
    assert_eq!(
        eval(&call("time_get", [t, lit("nanosecond")])),
        Value::Integer(456789.0)
    );
}

#[test]
fn time_add_wraps_around_midnight() {
    assert_eq!(
        eval(&call(
            "time_add",
            [lit(time(23, 0, 0, 0)), lit(2i64), lit("hour")]
        )),
        Value::LocalTime(Some(time(1, 0, 0, 0)))
    );
    assert_eq!(
        eval(&call(
            "time_add",
            [lit(time(1, 0, 0, 0)), lit(-2i64), lit("hour")]
        )),
        Value::LocalTime(Some(time(23, 0, 0, 0)))
    );
}

#[test]
fn time_functions_reject_date_units() {
    let err = eval_err(&call(
        "time_add",
        [lit(time(1, 0, 0, 0)), lit(1i64), lit("day")],
    ));
    assert!(matches!(err, ExprError::InvalidUnit { ref unit, .. } if unit == "day"));
}

#[test]
fn time_set_checks_subsecond_ranges() {
    let set_ms = |v: i64| {
        call(
            "time_set",
            [lit(time(10, 0, 0, 0)), lit(v), lit("millisecond")],
        )
    };
    assert_eq!(
        eval(&call("time_get", [set_ms(999), lit("millisecond")])),
        Value::Integer(999.0)
    );
    assert!(matches!(
        eval_err(&set_ms(1000)),
        ExprError::OutOfRange { .. }
    ));
}

#[test]
fn time_diff_is_signed() {
    assert_eq!(
        eval(&call(
            "time_diff",
            [lit(time(23, 0, 0, 0)), lit(time(1, 0, 0, 0)), lit("hour")]
        )),
        Value::Integer(-22.0)
    );
    assert_eq!(
        eval(&call(
            "time_diff",
            [
                lit(time(1, 0, 0, 0)),
                lit(time(2, 30, 0, 0)),
                lit("minute")
            ]
        )),
        Value::Integer(90.0)
    );
}

#[test]
fn time_get_of_missing_time_is_missing() {
    let expr = call(
        "time_get",
        [Expression::variable("MISSING_TIME"), lit("hour")],
    );
    assert!(eval(&expr).is_missing());
}
