use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};

use crate::error::{ExprError, ExprResult};
use crate::value::{Constant, ExpressionType, Value};

/// A row-independent name lookup source: true constants plus scope/macro
/// values supplied by the host. Values must be stable for the lifetime of
/// one evaluation session.
pub trait ConstantResolver {
    fn variable_type(&self, name: &str) -> Option<ExpressionType>;

    /// The value bound to `name`, or `None` when the name is unknown. The
    /// returned value's type must agree with `variable_type`.
    fn value(&self, name: &str) -> Option<Value>;
}

/// A row-indexed name lookup source, the seam to the columnar storage
/// engine. Each getter is only called for names whose `variable_type`
/// matches the getter's type; calling a mismatched getter is an
/// implementation defect and should fail with an internal error.
///
/// A name's type must not change between calls within one session.
pub trait DynamicResolver {
    fn variable_type(&self, name: &str) -> Option<ExpressionType>;

    fn double_value(&self, name: &str, row: usize) -> ExprResult<f64>;
    fn string_value(&self, name: &str, row: usize) -> ExprResult<Option<Arc<str>>>;
    fn boolean_value(&self, name: &str, row: usize) -> ExprResult<Option<bool>>;
    fn instant_value(&self, name: &str, row: usize) -> ExprResult<Option<DateTime<Utc>>>;
    fn local_time_value(&self, name: &str, row: usize) -> ExprResult<Option<NaiveTime>>;
    fn string_set_value(&self, name: &str, row: usize)
        -> ExprResult<Option<Arc<BTreeSet<String>>>>;
    fn string_list_value(&self, name: &str, row: usize) -> ExprResult<Option<Arc<Vec<String>>>>;
}

/// A [`ConstantResolver`] over an explicit set of [`Constant`]s.
///
/// Used for the standard constants (pi, unit names, ...) and as the adapter
/// for host scope/macro values.
#[derive(Default)]
pub struct StaticResolver {
    constants: HashMap<String, Constant>,
}

impl StaticResolver {
    pub fn new(constants: impl IntoIterator<Item = Constant>) -> Self {
        let mut map = HashMap::new();
        for c in constants {
            // First registration wins, like the function registry.
            map.entry(c.name().to_string()).or_insert(c);
        }
        StaticResolver { constants: map }
    }

    pub fn add(&mut self, constant: Constant) {
        self.constants
            .entry(constant.name().to_string())
            .or_insert(constant);
    }

    pub fn constants(&self) -> impl Iterator<Item = &Constant> {
        self.constants.values()
    }
}

impl ConstantResolver for StaticResolver {
    fn variable_type(&self, name: &str) -> Option<ExpressionType> {
        self.constants.get(name).map(|c| c.ty())
    }

    fn value(&self, name: &str) -> Option<Value> {
        self.constants.get(name).map(|c| c.value().clone())
    }
}

/// One typed column of an in-memory table.
#[derive(Debug, Clone)]
pub enum ColumnData {
    Real(Vec<f64>),
    Integer(Vec<f64>),
    String(Vec<Option<Arc<str>>>),
    Boolean(Vec<Option<bool>>),
    Instant(Vec<Option<DateTime<Utc>>>),
    LocalTime(Vec<Option<NaiveTime>>),
    StringSet(Vec<Option<Arc<BTreeSet<String>>>>),
    StringList(Vec<Option<Arc<Vec<String>>>>),
}

impl ColumnData {
    pub fn ty(&self) -> ExpressionType {
        match self {
            ColumnData::Real(_) => ExpressionType::Double,
            ColumnData::Integer(_) => ExpressionType::Integer,
            ColumnData::String(_) => ExpressionType::String,
            ColumnData::Boolean(_) => ExpressionType::Boolean,
            ColumnData::Instant(_) => ExpressionType::Instant,
            ColumnData::LocalTime(_) => ExpressionType::LocalTime,
            ColumnData::StringSet(_) => ExpressionType::StringSet,
            ColumnData::StringList(_) => ExpressionType::StringList,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Real(v) | ColumnData::Integer(v) => v.len(),
            ColumnData::String(v) => v.len(),
            ColumnData::Boolean(v) => v.len(),
            ColumnData::Instant(v) => v.len(),
            ColumnData::LocalTime(v) => v.len(),
            ColumnData::StringSet(v) => v.len(),
            ColumnData::StringList(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An in-memory [`DynamicResolver`] backed by plain typed vectors, mainly
/// for hosts without their own columnar backend and for tests.
#[derive(Default)]
pub struct TableResolver {
    columns: HashMap<String, ColumnData>,
}

impl TableResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_column(&mut self, name: impl Into<String>, data: ColumnData) {
        self.columns.insert(name.into(), data);
    }

    pub fn add_real(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.add_column(name, ColumnData::Real(values));
    }

    pub fn add_integer(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.add_column(name, ColumnData::Integer(values));
    }

    pub fn add_string(&mut self, name: impl Into<String>, values: Vec<Option<&str>>) {
        self.add_column(
            name,
            ColumnData::String(values.into_iter().map(|v| v.map(Arc::from)).collect()),
        );
    }

    pub fn add_boolean(&mut self, name: impl Into<String>, values: Vec<Option<bool>>) {
        self.add_column(name, ColumnData::Boolean(values));
    }

    pub fn add_instant(&mut self, name: impl Into<String>, values: Vec<Option<DateTime<Utc>>>) {
        self.add_column(name, ColumnData::Instant(values));
    }

    pub fn add_local_time(&mut self, name: impl Into<String>, values: Vec<Option<NaiveTime>>) {
        self.add_column(name, ColumnData::LocalTime(values));
    }

    fn column(&self, name: &str) -> ExprResult<&ColumnData> {
        self.columns
            .get(name)
            .ok_or_else(|| ExprError::internal(format!("no column '{name}' in table resolver")))
    }

    fn wrong_column_type(name: &str, expected: &str, actual: ExpressionType) -> ExprError {
        ExprError::internal(format!(
            "column '{name}' is {actual}, requested as {expected}"
        ))
    }

    fn check_row(name: &str, row: usize, len: usize) -> ExprResult<()> {
        if row < len {
            Ok(())
        } else {
            Err(ExprError::internal(format!(
                "row {row} out of bounds for column '{name}' of length {len}"
            )))
        }
    }
}

impl DynamicResolver for TableResolver {
    fn variable_type(&self, name: &str) -> Option<ExpressionType> {
        self.columns.get(name).map(|c| c.ty())
    }

    fn double_value(&self, name: &str, row: usize) -> ExprResult<f64> {
        match self.column(name)? {
            ColumnData::Real(v) | ColumnData::Integer(v) => {
                Self::check_row(name, row, v.len())?;
                Ok(v[row])
            }
            other => Err(Self::wrong_column_type(name, "numeric", other.ty())),
        }
    }

    fn string_value(&self, name: &str, row: usize) -> ExprResult<Option<Arc<str>>> {
        match self.column(name)? {
            ColumnData::String(v) => {
                Self::check_row(name, row, v.len())?;
                Ok(v[row].clone())
            }
            other => Err(Self::wrong_column_type(name, "string", other.ty())),
        }
    }

    fn boolean_value(&self, name: &str, row: usize) -> ExprResult<Option<bool>> {
        match self.column(name)? {
            ColumnData::Boolean(v) => {
                Self::check_row(name, row, v.len())?;
                Ok(v[row])
            }
            other => Err(Self::wrong_column_type(name, "boolean", other.ty())),
        }
    }

    fn instant_value(&self, name: &str, row: usize) -> ExprResult<Option<DateTime<Utc>>> {
        match self.column(name)? {
            ColumnData::Instant(v) => {
                Self::check_row(name, row, v.len())?;
                Ok(v[row])
            }
            other => Err(Self::wrong_column_type(name, "instant", other.ty())),
        }
    }

    fn local_time_value(&self, name: &str, row: usize) -> ExprResult<Option<NaiveTime>> {
        match self.column(name)? {
            ColumnData::LocalTime(v) => {
                Self::check_row(name, row, v.len())?;
                Ok(v[row])
            }
            other => Err(Self::wrong_column_type(name, "local-time", other.ty())),
        }
    }

    fn string_set_value(
        &self,
        name: &str,
        row: usize,
    ) -> ExprResult<Option<Arc<BTreeSet<String>>>> {
        match self.column(name)? {
            ColumnData::StringSet(v) => {
                Self::check_row(name, row, v.len())?;
                Ok(v[row].clone())
            }
            other => Err(Self::wrong_column_type(name, "string-set", other.ty())),
        }
    }

    fn string_list_value(&self, name: &str, row: usize) -> ExprResult<Option<Arc<Vec<String>>>> {
        match self.column(name)? {
            ColumnData::StringList(v) => {
                Self::check_row(name, row, v.len())?;
                Ok(v[row].clone())
            }
            other => Err(Self::wrong_column_type(name, "string-list", other.ty())),
        }
    }
}
