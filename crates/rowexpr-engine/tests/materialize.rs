//! Column materialization: per-row scans, dictionary encoding, the row
//! cursor lifecycle and cooperative cancellation.

use std::rc::Rc;

use pretty_assertions::assert_eq;
use rowexpr_engine::{
    compile, materialize, Column, ExprError, Expression, ExpressionContext, TableResolver, Value,
};

fn lit(v: impl Into<Value>) -> Expression {
    Expression::literal(v)
}

fn call(name: &str, args: impl IntoIterator<Item = Expression>) -> Expression {
    Expression::call(name, args)
}

fn table_ctx(build: impl FnOnce(&mut TableResolver)) -> ExpressionContext {
    let mut ctx = ExpressionContext::standard();
    let mut table = TableResolver::new();
    build(&mut table);
    ctx.add_dynamic_resolver(Rc::new(table));
    ctx
}

#[test]
fn numeric_scan_keeps_the_nan_sentinel_inline() {
    let ctx = table_ctx(|t| t.add_real("x", vec![1.0, f64::NAN, 3.0]));
    let ev = compile(&call("+", [Expression::variable("x"), lit(1i64)]), &ctx).unwrap();
    let column = materialize(&ctx, &ev, 3).unwrap();
    let Column::Real(values) = column else {
        panic!("expected a real column");
    };
    assert_eq!(values[0], 2.0);
    assert!(values[1].is_nan());
    assert_eq!(values[2], 4.0);
}

#[test]
fn integer_expressions_produce_integer_columns() {
    let ctx = table_ctx(|t| t.add_integer("n", vec![1.0, 2.0]));
    let ev = compile(&call("*", [Expression::variable("n"), lit(10i64)]), &ctx).unwrap();
    match materialize(&ctx, &ev, 2).unwrap() {
        Column::Integer(values) => assert_eq!(values, vec![10.0, 20.0]),
        other => panic!("expected an integer column, got {:?}", other.ty()),
    }
}

#[test]
fn string_results_are_dictionary_encoded() {
    let ctx = table_ctx(|t| {
        t.add_string("s", vec![Some("a"), Some("b"), Some("a"), None]);
    });
    let ev = compile(&call("upper", [Expression::variable("s")]), &ctx).unwrap();
    let Column::Nominal {
        dictionary,
        indices,
    } = materialize(&ctx, &ev, 4).unwrap()
    else {
        panic!("expected a nominal column");
    };
    assert_eq!(dictionary.len(), 2);
    assert_eq!(indices, vec![Some(0), Some(1), Some(0), None]);
    assert_eq!(&*dictionary[0], "A");
    assert_eq!(&*dictionary[1], "B");
}

#[test]
fn row_index_enumerates_the_scan() {
    let ctx = ExpressionContext::standard();
    let ev = compile(&call("row_index", []), &ctx).unwrap();
    match materialize(&ctx, &ev, 4).unwrap() {
        Column::Integer(values) => assert_eq!(values, vec![0.0, 1.0, 2.0, 3.0]),
        other => panic!("expected an integer column, got {:?}", other.ty()),
    }
}

#[test]
fn boolean_scan_propagates_missing() {
    let ctx = table_ctx(|t| t.add_real("x", vec![1.0, 3.0, f64::NAN]));
    let ev = compile(&call(">", [Expression::variable("x"), lit(2i64)]), &ctx).unwrap();
    match materialize(&ctx, &ev, 3).unwrap() {
        Column::Boolean(values) => {
            assert_eq!(values, vec![Some(false), Some(true), None]);
        }
        other => panic!("expected a boolean column, got {:?}", other.ty()),
    }
}

#[test]
fn constant_expressions_materialize_without_variables() {
    let ctx = ExpressionContext::standard();
    let ev = compile(&call("+", [lit(3i64), lit(4i64)]), &ctx).unwrap();
    assert!(ev.is_constant());
    match materialize(&ctx, &ev, 3).unwrap() {
        Column::Integer(values) => assert_eq!(values, vec![7.0, 7.0, 7.0]),
        other => panic!("expected an integer column, got {:?}", other.ty()),
    }
}

#[test]
fn empty_scan_produces_an_empty_column() {
    let ctx = ExpressionContext::standard();
    let ev = compile(&lit(1.0), &ctx).unwrap();
    let column = materialize(&ctx, &ev, 0).unwrap();
    assert!(column.is_empty());
}

#[test]
fn scan_clears_the_row_cursor() {
    let ctx = table_ctx(|t| t.add_real("x", vec![1.0, 2.0]));
    let ev = compile(&Expression::variable("x"), &ctx).unwrap();
    materialize(&ctx, &ev, 2).unwrap();
    assert_eq!(ctx.row(), -1);
}

#[test]
fn tripped_stop_checker_aborts_the_scan() {
    let mut ctx = ExpressionContext::standard();
    ctx.set_stop_checker(Rc::new(|| true));
    // Compilation also polls the checker, so compile against a clean context.
    let clean = ExpressionContext::standard();
    let ev = compile(&lit(1.0), &clean).unwrap();
    let err = materialize(&ctx, &ev, 10).unwrap_err();
    assert!(matches!(err, ExprError::Stopped));
    assert_eq!(ctx.row(), -1);
}

#[test]
fn column_values_decode_the_dictionary() {
    let ctx = table_ctx(|t| t.add_string("s", vec![Some("x"), None]));
    let ev = compile(&Expression::variable("s"), &ctx).unwrap();
    let column = materialize(&ctx, &ev, 2).unwrap();
    assert_eq!(column.value(0), Value::from("x"));
    assert!(column.value(1).is_missing());
    assert_eq!(column.len(), 2);
}
