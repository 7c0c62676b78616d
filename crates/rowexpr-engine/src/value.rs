use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};

use crate::error::{ExprError, ExprResult};

/// The closed set of types an expression can evaluate to.
///
/// `Double` and `Integer` share the same runtime representation (an IEEE-754
/// double) and differ only by tag; every other type carries its own payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpressionType {
    Double,
    Integer,
    String,
    Boolean,
    Instant,
    LocalTime,
    StringSet,
    StringList,
}

impl ExpressionType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ExpressionType::Double | ExpressionType::Integer)
    }

    /// The missing sentinel of this type, as a [`Value`].
    pub fn missing(self) -> Value {
        match self {
            ExpressionType::Double => Value::Double(f64::NAN),
            ExpressionType::Integer => Value::Integer(f64::NAN),
            ExpressionType::String => Value::String(None),
            ExpressionType::Boolean => Value::Boolean(None),
            ExpressionType::Instant => Value::Instant(None),
            ExpressionType::LocalTime => Value::LocalTime(None),
            ExpressionType::StringSet => Value::StringSet(None),
            ExpressionType::StringList => Value::StringList(None),
        }
    }
}

impl fmt::Display for ExpressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExpressionType::Double => "real",
            ExpressionType::Integer => "integer",
            ExpressionType::String => "nominal",
            ExpressionType::Boolean => "boolean",
            ExpressionType::Instant => "date-time",
            ExpressionType::LocalTime => "time",
            ExpressionType::StringSet => "text-set",
            ExpressionType::StringList => "text-list",
        };
        f.write_str(name)
    }
}

/// A single evaluated value.
///
/// Each variant carries exactly the payload of its type, so a value with the
/// wrong payload for its tag is unrepresentable. Missing is `NAN` for the
/// numeric variants and `None` everywhere else.
#[derive(Debug, Clone)]
pub enum Value {
    Double(f64),
    Integer(f64),
    String(Option<Arc<str>>),
    Boolean(Option<bool>),
    Instant(Option<DateTime<Utc>>),
    LocalTime(Option<NaiveTime>),
    StringSet(Option<Arc<BTreeSet<String>>>),
    StringList(Option<Arc<Vec<String>>>),
}

impl Value {
    pub fn ty(&self) -> ExpressionType {
        match self {
            Value::Double(_) => ExpressionType::Double,
            Value::Integer(_) => ExpressionType::Integer,
            Value::String(_) => ExpressionType::String,
            Value::Boolean(_) => ExpressionType::Boolean,
            Value::Instant(_) => ExpressionType::Instant,
            Value::LocalTime(_) => ExpressionType::LocalTime,
            Value::StringSet(_) => ExpressionType::StringSet,
            Value::StringList(_) => ExpressionType::StringList,
        }
    }

    pub fn is_missing(&self) -> bool {
        match self {
            Value::Double(v) | Value::Integer(v) => v.is_nan(),
            Value::String(v) => v.is_none(),
            Value::Boolean(v) => v.is_none(),
            Value::Instant(v) => v.is_none(),
            Value::LocalTime(v) => v.is_none(),
            Value::StringSet(v) => v.is_none(),
            Value::StringList(v) => v.is_none(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            // NaN-aware: two missing numerics compare equal so constants and
            // test fixtures behave sanely.
            (Double(a), Double(b)) | (Integer(a), Integer(b)) => {
                a == b || (a.is_nan() && b.is_nan())
            }
            (String(a), String(b)) => a == b,
            (Boolean(a), Boolean(b)) => a == b,
            (Instant(a), Instant(b)) => a == b,
            (LocalTime(a), LocalTime(b)) => a == b,
            (StringSet(a), StringSet(b)) => a == b,
            (StringList(a), StringList(b)) => a == b,
            _ => false,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v as f64)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(Some(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(Some(Arc::from(v)))
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Instant(Some(v))
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::LocalTime(Some(v))
    }
}

/// An immutable named literal.
///
/// Constants are created once (at registration time for the standard set,
/// per lookup for scope/macro values) and never mutated. The typed accessors
/// fail fast with a fatal error when called against the wrong variant; this
/// is a programming error, not bad user input.
#[derive(Debug, Clone, PartialEq)]
pub struct Constant {
    name: String,
    value: Value,
    annotation: Option<String>,
    invisible: bool,
}

impl Constant {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Constant {
            name: name.into(),
            value,
            annotation: None,
            invisible: false,
        }
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }

    /// Marks the constant as hidden from host-facing listings (used for
    /// backing values of function inputs). Evaluation is unaffected.
    pub fn invisible(mut self) -> Self {
        self.invisible = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> ExpressionType {
        self.value.ty()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn annotation(&self) -> Option<&str> {
        self.annotation.as_deref()
    }

    pub fn is_invisible(&self) -> bool {
        self.invisible
    }

    pub fn as_double(&self) -> ExprResult<f64> {
        match &self.value {
            Value::Double(v) | Value::Integer(v) => Ok(*v),
            other => Err(self.wrong_access("numeric", other)),
        }
    }

    pub fn as_string(&self) -> ExprResult<Option<Arc<str>>> {
        match &self.value {
            Value::String(v) => Ok(v.clone()),
            other => Err(self.wrong_access("string", other)),
        }
    }

    pub fn as_boolean(&self) -> ExprResult<Option<bool>> {
        match &self.value {
            Value::Boolean(v) => Ok(*v),
            other => Err(self.wrong_access("boolean", other)),
        }
    }

    pub fn as_instant(&self) -> ExprResult<Option<DateTime<Utc>>> {
        match &self.value {
            Value::Instant(v) => Ok(*v),
            other => Err(self.wrong_access("instant", other)),
        }
    }

    pub fn as_local_time(&self) -> ExprResult<Option<NaiveTime>> {
        match &self.value {
            Value::LocalTime(v) => Ok(*v),
            other => Err(self.wrong_access("local-time", other)),
        }
    }

    pub fn as_string_set(&self) -> ExprResult<Option<Arc<BTreeSet<String>>>> {
        match &self.value {
            Value::StringSet(v) => Ok(v.clone()),
            other => Err(self.wrong_access("string-set", other)),
        }
    }

    pub fn as_string_list(&self) -> ExprResult<Option<Arc<Vec<String>>>> {
        match &self.value {
            Value::StringList(v) => Ok(v.clone()),
            other => Err(self.wrong_access("string-list", other)),
        }
    }

    fn wrong_access(&self, requested: &str, actual: &Value) -> ExprError {
        ExprError::internal(format!(
            "constant '{}' holds a {} value, not {}",
            self.name,
            actual.ty(),
            requested
        ))
    }
}

/// The constants registered with every standard context: math constants plus
/// the unit names accepted by the date-time and time functions.
pub fn standard_constants() -> Vec<Constant> {
    let unit = |name: &str, text: &str| {
        Constant::new(name, Value::from(text)).with_annotation(format!("unit '{text}'"))
    };
    vec![
        Constant::new("pi", Value::Double(std::f64::consts::PI)),
        Constant::new("e", Value::Double(std::f64::consts::E)),
        Constant::new("INFINITY", Value::Double(f64::INFINITY)),
        Constant::new("MISSING_NUMERIC", Value::Double(f64::NAN)),
        Constant::new("MISSING_NOMINAL", Value::String(None)),
        Constant::new("MISSING_DATE_TIME", Value::Instant(None)),
        Constant::new("MISSING_TIME", Value::LocalTime(None)),
        unit("DATE_UNIT_YEAR", "year"),
        unit("DATE_UNIT_MONTH", "month"),
        unit("DATE_UNIT_WEEK", "week"),
        unit("DATE_UNIT_DAY", "day"),
        unit("DATE_UNIT_HOUR", "hour"),
        unit("DATE_UNIT_MINUTE", "minute"),
        unit("DATE_UNIT_SECOND", "second"),
        unit("DATE_UNIT_MILLISECOND", "millisecond"),
        unit("DATE_UNIT_NANOSECOND", "nanosecond"),
        unit("TIME_UNIT_HOUR", "hour"),
        unit("TIME_UNIT_MINUTE", "minute"),
        unit("TIME_UNIT_SECOND", "second"),
        unit("TIME_UNIT_MILLISECOND", "millisecond"),
        unit("TIME_UNIT_NANOSECOND", "nanosecond"),
    ]
}
