//! Bulk evaluation of one compiled evaluator into a typed column.
//!
//! The scan is sequential: the shared row cursor is advanced, the
//! evaluator's callable is invoked, and the result lands in a column
//! matching the evaluator's type. String results are dictionary-encoded so
//! repeated values share one allocation. The stop checker is polled every
//! [`STOP_CHECK_INTERVAL`] rows.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};
use log::debug;

use crate::context::ExpressionContext;
use crate::error::ExprResult;
use crate::evaluator::{Evaluator, EvaluatorKind};
use crate::value::{ExpressionType, Value};

const STOP_CHECK_INTERVAL: usize = 1024;

/// A materialized column, one variant per runtime representation.
///
/// Numeric columns keep the NaN missing sentinel inline; every other
/// variant stores `Option`s. `Nominal` holds a dictionary of distinct
/// strings plus per-row indices into it.
#[derive(Debug, Clone)]
pub enum Column {
    Real(Vec<f64>),
    Integer(Vec<f64>),
    Nominal {
        dictionary: Vec<Arc<str>>,
        indices: Vec<Option<u32>>,
    },
    Boolean(Vec<Option<bool>>),
    Instant(Vec<Option<DateTime<Utc>>>),
    LocalTime(Vec<Option<NaiveTime>>),
    StringSet(Vec<Option<Arc<BTreeSet<String>>>>),
    StringList(Vec<Option<Arc<Vec<String>>>>),
}

impl Column {
    pub fn ty(&self) -> ExpressionType {
        match self {
            Column::Real(_) => ExpressionType::Double,
            Column::Integer(_) => ExpressionType::Integer,
            Column::Nominal { .. } => ExpressionType::String,
            Column::Boolean(_) => ExpressionType::Boolean,
            Column::Instant(_) => ExpressionType::Instant,
            Column::LocalTime(_) => ExpressionType::LocalTime,
            Column::StringSet(_) => ExpressionType::StringSet,
            Column::StringList(_) => ExpressionType::StringList,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Real(v) | Column::Integer(v) => v.len(),
            Column::Nominal { indices, .. } => indices.len(),
            Column::Boolean(v) => v.len(),
            Column::Instant(v) => v.len(),
            Column::LocalTime(v) => v.len(),
            Column::StringSet(v) => v.len(),
            Column::StringList(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value at `row` as a [`Value`], decoding the dictionary for
    /// nominal columns. Panics if `row` is out of bounds.
    pub fn value(&self, row: usize) -> Value {
        match self {
            Column::Real(v) => Value::Double(v[row]),
            Column::Integer(v) => Value::Integer(v[row]),
            Column::Nominal {
                dictionary,
                indices,
            } => Value::String(indices[row].map(|i| dictionary[i as usize].clone())),
            Column::Boolean(v) => Value::Boolean(v[row]),
            Column::Instant(v) => Value::Instant(v[row]),
            Column::LocalTime(v) => Value::LocalTime(v[row]),
            Column::StringSet(v) => Value::StringSet(v[row].clone()),
            Column::StringList(v) => Value::StringList(v[row].clone()),
        }
    }
}

/// Evaluates `evaluator` for rows `0..row_count` and collects the results.
///
/// The context's row cursor is mutated during the scan and cleared before
/// returning, also on error. Fails with [`ExprError::Stopped`] if the stop
/// checker trips mid-scan.
///
/// [`ExprError::Stopped`]: crate::ExprError::Stopped
pub fn materialize(
    ctx: &ExpressionContext,
    evaluator: &Evaluator,
    row_count: usize,
) -> ExprResult<Column> {
    debug!(
        "materializing {} column over {row_count} rows (constant: {})",
        evaluator.ty(),
        evaluator.is_constant()
    );
    let result = scan(ctx, evaluator, row_count);
    ctx.clear_row();
    result
}

fn scan(ctx: &ExpressionContext, evaluator: &Evaluator, row_count: usize) -> ExprResult<Column> {
    macro_rules! collect {
        ($f:expr, $variant:ident) => {{
            let f = $f;
            let mut values = Vec::with_capacity(row_count);
            for row in 0..row_count {
                if row % STOP_CHECK_INTERVAL == 0 {
                    ctx.check_stop()?;
                }
                ctx.set_row(row);
                values.push(f()?);
            }
            Column::$variant(values)
        }};
    }

    Ok(match evaluator.kind() {
        EvaluatorKind::Double(f) => {
            let f = f.clone();
            let mut values = Vec::with_capacity(row_count);
            for row in 0..row_count {
                if row % STOP_CHECK_INTERVAL == 0 {
                    ctx.check_stop()?;
                }
                ctx.set_row(row);
                values.push(f()?);
            }
            if evaluator.ty() == ExpressionType::Integer {
                Column::Integer(values)
            } else {
                Column::Real(values)
            }
        }
        EvaluatorKind::String(f) => {
            let f = f.clone();
            let mut dictionary: Vec<Arc<str>> = Vec::new();
            let mut lookup: HashMap<Arc<str>, u32> = HashMap::new();
            let mut indices = Vec::with_capacity(row_count);
            for row in 0..row_count {
                if row % STOP_CHECK_INTERVAL == 0 {
                    ctx.check_stop()?;
                }
                ctx.set_row(row);
                indices.push(match f()? {
                    None => None,
                    Some(s) => Some(*lookup.entry(s).or_insert_with_key(|s| {
                        dictionary.push(s.clone());
                        (dictionary.len() - 1) as u32
                    })),
                });
            }
            Column::Nominal {
                dictionary,
                indices,
            }
        }
        EvaluatorKind::Boolean(f) => collect!(f.clone(), Boolean),
        EvaluatorKind::Instant(f) => collect!(f.clone(), Instant),
        EvaluatorKind::LocalTime(f) => collect!(f.clone(), LocalTime),
        EvaluatorKind::StringSet(f) => collect!(f.clone(), StringSet),
        EvaluatorKind::StringList(f) => collect!(f.clone(), StringList),
    })
}
