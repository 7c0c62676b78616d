//! Evaluation semantics of the standard function library.

use std::collections::BTreeSet;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rowexpr_engine::{
    compile, Constant, ExprError, Expression, ExpressionContext, ExpressionType, Value,
};

fn lit(v: impl Into<Value>) -> Expression {
    Expression::literal(v)
}

fn call(name: &str, args: impl IntoIterator<Item = Expression>) -> Expression {
    Expression::call(name, args)
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

fn as_f64(v: Value) -> f64 {
    match v {
        Value::Double(x) | Value::Integer(x) => x,
        other => panic!("expected a numeric value, got {other:?}"),
    }
}

fn missing_boolean() -> Expression {
    Expression::Literal(Value::Boolean(None))
}

#[test]
fn modulo_preserves_integer_and_sign() {
    assert_eq!(eval(&call("%", [lit(7i64), lit(3i64)])), Value::Integer(1.0));
    assert_eq!(
        eval(&call("%", [lit(-7i64), lit(3i64)])),
        Value::Integer(-1.0)
    );
}

#[test]
fn power_is_always_real() {
    assert_eq!(
        eval(&call("^", [lit(2i64), lit(10i64)])),
        Value::Double(1024.0)
    );
}

#[test]
fn unary_minus_preserves_integer() {
    assert_eq!(eval(&call("-", [lit(5i64)])), Value::Integer(-5.0));
}

#[test]
fn plus_concatenates_strings() {
    assert_eq!(eval(&call("+", [lit("ab"), lit("cd")])), Value::from("abcd"));
}

#[test]
fn plus_rejects_string_number_mix() {
    let err = eval_err(&call("+", [lit("ab"), lit(1i64)]));
    assert!(matches!(err, ExprError::WrongType { .. }));
}

#[test]
fn min_widens_over_mixed_numerics() {
    let ctx = ExpressionContext::standard();
    let ev = compile(&call("min", [lit(3i64), lit(1.5), lit(2i64)]), &ctx).unwrap();
    assert_eq!(ev.ty(), ExpressionType::Double);
    assert_eq!(ev.evaluate().unwrap(), Value::Double(1.5));
}

#[test]
fn min_with_missing_operand_is_missing() {
    let expr = call("min", [lit(1i64), Expression::variable("MISSING_NUMERIC")]);
    assert!(eval(&expr).is_missing());
}

#[test]
fn sum_preserves_integer_avg_does_not() {
    assert_eq!(
        eval(&call("sum", [lit(1i64), lit(2i64), lit(3i64)])),
        Value::Integer(6.0)
    );
    assert_eq!(
        eval(&call("avg", [lit(1i64), lit(2i64), lit(3i64)])),
        Value::Double(2.0)
    );
}

#[test]
fn sign_of_zero_is_zero() {
    assert_eq!(eval(&call("sgn", [lit(0.0)])), Value::Double(0.0));
    assert_eq!(eval(&call("sgn", [lit(-3i64)])), Value::Integer(-1.0));
    assert_eq!(eval(&call("abs", [lit(-3i64)])), Value::Integer(3.0));
}

#[test]
fn rounding_family() {
    assert_eq!(eval(&call("round", [lit(2.5)])), Value::Integer(3.0));
    assert_eq!(eval(&call("round", [lit(-2.5)])), Value::Integer(-3.0));
    assert_eq!(eval(&call("floor", [lit(-1.5)])), Value::Integer(-2.0));
    assert_eq!(eval(&call("ceil", [lit(1.2)])), Value::Integer(2.0));
    // rint rounds half to even and stays real.
    assert_eq!(eval(&call("rint", [lit(2.5)])), Value::Double(2.0));
    assert_eq!(eval(&call("rint", [lit(3.5)])), Value::Double(4.0));
}

#[test]
fn out_of_domain_math_yields_missing() {
    assert!(eval(&call("sqrt", [lit(-1.0)])).is_missing());
    assert!(eval(&call("ln", [lit(-1.0)])).is_missing());
}

#[test]
fn trig_basics() {
    assert_eq!(eval(&call("sin", [lit(0.0)])), Value::Double(0.0));
    let v = as_f64(eval(&call("atan2", [lit(1.0), lit(1.0)])));
    assert!((v - std::f64::consts::FRAC_PI_4).abs() < 1e-12);
}

#[test]
fn bitwise_operations() {
    assert_eq!(
        eval(&call("bit_and", [lit(12i64), lit(10i64)])),
        Value::Integer(8.0)
    );
    assert_eq!(eval(&call("bit_not", [lit(0i64)])), Value::Integer(-1.0));
}

#[test]
fn bitwise_requires_integer_operands() {
    let err = eval_err(&call("bit_and", [lit(1.5), lit(1i64)]));
    assert!(matches!(err, ExprError::WrongType { .. }));
}

#[test]
fn bitwise_rejects_values_outside_i64() {
    let err = eval_err(&call("bit_not", [Expression::Literal(Value::Integer(1e300))]));
    assert!(matches!(err, ExprError::NumericOverflow { .. }));
}

#[test]
fn text_positions_count_characters() {
    assert_eq!(eval(&call("length", [lit("héllo")])), Value::Integer(5.0));
    assert_eq!(
        eval(&call("cut", [lit("hello"), lit(1i64), lit(3i64)])),
        Value::from("ell")
    );
    assert_eq!(
        eval(&call("index", [lit("hello"), lit("ll")])),
        Value::Integer(2.0)
    );
    assert_eq!(
        eval(&call("index", [lit("hello"), lit("xyz")])),
        Value::Integer(-1.0)
    );
}

#[test]
fn cut_out_of_bounds_is_a_user_error() {
    let err = eval_err(&call("cut", [lit("abc"), lit(2i64), lit(5i64)]));
    assert!(matches!(err, ExprError::Library { .. }));
    assert!(err.is_user_error());
}

#[test]
fn replace_is_literal_replace_all_is_regex() {
    assert_eq!(
        eval(&call("replace", [lit("aaa"), lit("a"), lit("b")])),
        Value::from("bbb")
    );
    assert_eq!(
        eval(&call("replace_all", [lit("a1b2"), lit("[0-9]"), lit("#")])),
        Value::from("a#b#")
    );
}

#[test]
fn replace_rejects_empty_search_string() {
    let err = eval_err(&call("replace", [lit("abc"), lit(""), lit("x")]));
    assert!(matches!(err, ExprError::Library { ref function, .. } if function == "replace"));
}

#[test]
fn matches_tests_the_whole_string() {
    assert_eq!(
        eval(&call("matches", [lit("hello"), lit("hel")])),
        Value::from(false)
    );
    assert_eq!(
        eval(&call("matches", [lit("hello"), lit("h.*o")])),
        Value::from(true)
    );
}

#[test]
fn invalid_constant_pattern_fails_at_compile_time() {
    let ctx = ExpressionContext::standard();
    let err = compile(&call("matches", [lit("x"), lit("[")]), &ctx).unwrap_err();
    assert!(matches!(err, ExprError::Library { .. }));
}

#[test]
fn concat_skips_missing_operands() {
    let expr = call(
        "concat",
        [lit("a"), Expression::variable("MISSING_NOMINAL"), lit("b")],
    );
    assert_eq!(eval(&expr), Value::from("ab"));
}

#[test]
fn substring_predicates() {
    assert_eq!(
        eval(&call("starts", [lit("hello"), lit("he")])),
        Value::from(true)
    );
    assert_eq!(
        eval(&call("ends", [lit("hello"), lit("lo")])),
        Value::from(true)
    );
    assert_eq!(
        eval(&call("contains", [lit("hello"), lit("ell")])),
        Value::from(true)
    );
    assert_eq!(
        eval(&call("compare", [lit("a"), lit("b")])),
        Value::Integer(-1.0)
    );
}

#[test]
fn char_and_affix_helpers() {
    assert_eq!(
        eval(&call("char_at", [lit("abc"), lit(1i64)])),
        Value::from("b")
    );
    assert!(eval(&call("char_at", [lit("abc"), lit(9i64)])).is_missing());
    assert_eq!(
        eval(&call("prefix", [lit("hello"), lit(2i64)])),
        Value::from("he")
    );
    assert_eq!(
        eval(&call("suffix", [lit("hello"), lit(3i64)])),
        Value::from("llo")
    );
    assert_eq!(eval(&call("trim", [lit("  x  ")])), Value::from("x"));
    assert_eq!(eval(&call("upper", [lit("abc")])), Value::from("ABC"));
    assert_eq!(eval(&call("lower", [lit("ABC")])), Value::from("abc"));
}

#[test]
fn conjunction_uses_three_valued_logic() {
    // An absorbing false decides regardless of the missing operand.
    assert_eq!(
        eval(&call("&&", [lit(false), missing_boolean()])),
        Value::from(false)
    );
    assert!(eval(&call("&&", [lit(true), missing_boolean()])).is_missing());
    assert_eq!(
        eval(&call("||", [lit(true), missing_boolean()])),
        Value::from(true)
    );
    assert!(eval(&call("||", [lit(false), missing_boolean()])).is_missing());
}

#[test]
fn negating_missing_stays_missing() {
    assert!(eval(&call("!", [missing_boolean()])).is_missing());
    assert_eq!(eval(&call("not", [lit(true)])), Value::from(false));
}

#[test]
fn if_selects_branch_and_merges_numeric_types() {
    let ctx = ExpressionContext::standard();
    let ev = compile(&call("if", [lit(true), lit(1i64), lit(2.5)]), &ctx).unwrap();
    assert_eq!(ev.ty(), ExpressionType::Double);
    assert_eq!(ev.evaluate().unwrap(), Value::Double(1.0));
}

#[test]
fn if_with_missing_condition_is_missing() {
    assert!(eval(&call("if", [missing_boolean(), lit(1.0), lit(2.0)])).is_missing());
}

#[test]
fn if_rejects_incompatible_branches() {
    let err = eval_err(&call("if", [lit(true), lit(1.0), lit("x")]));
    assert!(matches!(err, ExprError::WrongType { .. }));
}

#[test]
fn missing_probe_returns_plain_booleans() {
    assert_eq!(
        eval(&call("missing", [Expression::variable("MISSING_NUMERIC")])),
        Value::from(true)
    );
    assert_eq!(eval(&call("missing", [lit(1.0)])), Value::from(false));
}

#[test]
fn equality_is_numeric_across_tags_and_missing_aware() {
    assert_eq!(eval(&call("==", [lit(1i64), lit(1.0)])), Value::from(true));
    // Two missing numerics are equal.
    let both_missing = call(
        "==",
        [
            Expression::variable("MISSING_NUMERIC"),
            Expression::variable("MISSING_NUMERIC"),
        ],
    );
    assert_eq!(eval(&both_missing), Value::from(true));
    let one_missing = call("==", [lit("a"), Expression::variable("MISSING_NOMINAL")]);
    assert_eq!(eval(&one_missing), Value::from(false));
    assert_eq!(eval(&call("!=", [lit("a"), lit("b")])), Value::from(true));
}

#[test]
fn equality_rejects_mixed_kinds() {
    let err = eval_err(&call("==", [lit("a"), lit(1i64)]));
    assert!(matches!(err, ExprError::WrongType { .. }));
}

#[test]
fn ordering_propagates_missing() {
    assert_eq!(eval(&call("<", [lit(1i64), lit(2i64)])), Value::from(true));
    let expr = call("<", [Expression::variable("MISSING_NUMERIC"), lit(1.0)]);
    assert!(eval(&expr).is_missing());
}

#[test]
fn parse_is_lenient() {
    assert_eq!(eval(&call("parse", [lit(" 3.5 ")])), Value::Double(3.5));
    assert!(eval(&call("parse", [lit("not a number")])).is_missing());
}

#[test]
fn str_formats_integral_values_without_a_fraction() {
    assert_eq!(eval(&call("str", [lit(3i64)])), Value::from("3"));
    assert_eq!(eval(&call("str", [lit(3.5)])), Value::from("3.5"));
}

#[test]
fn collection_functions() {
    let mut ctx = ExpressionContext::standard();
    ctx.add_constant(Constant::new(
        "tags",
        Value::StringList(Some(Arc::new(vec!["red".into(), "green".into()]))),
    ));
    ctx.add_constant(Constant::new(
        "flags",
        Value::StringSet(Some(Arc::new(BTreeSet::from([
            "x".to_string(),
            "y".to_string(),
        ])))),
    ));

    let eval_in = |expr: &Expression| compile(expr, &ctx).unwrap().evaluate().unwrap();

    assert_eq!(
        eval_in(&call("size", [Expression::variable("tags")])),
        Value::Integer(2.0)
    );
    assert_eq!(
        eval_in(&call("size", [Expression::variable("flags")])),
        Value::Integer(2.0)
    );
    assert_eq!(
        eval_in(&call("element", [Expression::variable("tags"), lit(1i64)])),
        Value::from("green")
    );
    assert!(eval_in(&call("element", [Expression::variable("tags"), lit(5i64)])).is_missing());
    assert!(eval_in(&call("element", [Expression::variable("tags"), lit(-1i64)])).is_missing());
    assert_eq!(
        eval_in(&call("in_set", [lit("x"), Expression::variable("flags")])),
        Value::from(true)
    );
    assert_eq!(
        eval_in(&call("in_set", [lit("z"), Expression::variable("flags")])),
        Value::from(false)
    );
}

#[test]
fn constant_accessors_cover_collection_payloads() {
    let set = Arc::new(BTreeSet::from(["x".to_string()]));
    let list = Arc::new(vec!["a".to_string()]);
    let flags = Constant::new("flags", Value::StringSet(Some(set.clone())));
    let tags = Constant::new("tags", Value::StringList(Some(list.clone())));

    assert_eq!(flags.as_string_set().unwrap(), Some(set));
    assert_eq!(tags.as_string_list().unwrap(), Some(list));
    // Wrong-variant access fails fast with a fatal error.
    assert!(!flags.as_string_list().unwrap_err().is_user_error());
    assert!(!tags.as_string_set().unwrap_err().is_user_error());
}

#[test]
fn size_rejects_scalar_arguments() {
    let err = eval_err(&call("size", [lit(1i64)]));
    assert!(matches!(err, ExprError::WrongType { .. }));
}

proptest! {
    #[test]
    fn parse_inverts_str(x in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
        let expr = call("parse", [call("str", [lit(x)])]);
        let back = as_f64(eval(&expr));
        prop_assert_eq!(back, x);
    }
}
