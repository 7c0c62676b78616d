use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::Arc;

use chrono::{DateTime, NaiveTime, Utc};

use crate::error::{ExprError, ExprResult};
use crate::value::{ExpressionType, Value};

pub type DoubleFn = Rc<dyn Fn() -> ExprResult<f64>>;
pub type StringFn = Rc<dyn Fn() -> ExprResult<Option<Arc<str>>>>;
pub type BooleanFn = Rc<dyn Fn() -> ExprResult<Option<bool>>>;
pub type InstantFn = Rc<dyn Fn() -> ExprResult<Option<DateTime<Utc>>>>;
pub type LocalTimeFn = Rc<dyn Fn() -> ExprResult<Option<NaiveTime>>>;
pub type StringSetFn = Rc<dyn Fn() -> ExprResult<Option<Arc<BTreeSet<String>>>>>;
pub type StringListFn = Rc<dyn Fn() -> ExprResult<Option<Arc<Vec<String>>>>>;

/// The populated deferred callable of an evaluator, one variant per runtime
/// representation. `Double` serves both the `Double` and `Integer` type tags,
/// which share the f64 representation.
#[derive(Clone)]
pub enum EvaluatorKind {
    Double(DoubleFn),
    String(StringFn),
    Boolean(BooleanFn),
    Instant(InstantFn),
    LocalTime(LocalTimeFn),
    StringSet(StringSetFn),
    StringList(StringListFn),
}

impl std::fmt::Debug for EvaluatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let variant = match self {
            EvaluatorKind::Double(_) => "Double",
            EvaluatorKind::String(_) => "String",
            EvaluatorKind::Boolean(_) => "Boolean",
            EvaluatorKind::Instant(_) => "Instant",
            EvaluatorKind::LocalTime(_) => "LocalTime",
            EvaluatorKind::StringSet(_) => "StringSet",
            EvaluatorKind::StringList(_) => "StringList",
        };
        write!(f, "EvaluatorKind::{variant}(..)")
    }
}

impl EvaluatorKind {
    fn matches(&self, ty: ExpressionType) -> bool {
        match self {
            EvaluatorKind::Double(_) => ty.is_numeric(),
            EvaluatorKind::String(_) => ty == ExpressionType::String,
            EvaluatorKind::Boolean(_) => ty == ExpressionType::Boolean,
            EvaluatorKind::Instant(_) => ty == ExpressionType::Instant,
            EvaluatorKind::LocalTime(_) => ty == ExpressionType::LocalTime,
            EvaluatorKind::StringSet(_) => ty == ExpressionType::StringSet,
            EvaluatorKind::StringList(_) => ty == ExpressionType::StringList,
        }
    }
}

/// A compiled, possibly-constant, deferred computation over one value type.
///
/// The constructors enforce that the populated callable matches the declared
/// type, so "wrong callable populated" is unrepresentable past construction.
/// When `is_constant()` returns `true`, repeated invocation yields an
/// identical value with no side effects; callers may invoke once and cache
/// (constant folding relies on exactly this).
#[derive(Clone, Debug)]
pub struct Evaluator {
    ty: ExpressionType,
    constant: bool,
    kind: EvaluatorKind,
}

impl Evaluator {
    pub fn new(ty: ExpressionType, constant: bool, kind: EvaluatorKind) -> ExprResult<Self> {
        if !kind.matches(ty) {
            return Err(ExprError::internal(format!(
                "evaluator callable does not match declared type {ty}"
            )));
        }
        Ok(Evaluator { ty, constant, kind })
    }

    /// A constant evaluator that replays an already-computed value. This is
    /// the terminal form every folded subexpression collapses to.
    pub fn constant(value: Value) -> Self {
        let ty = value.ty();
        let kind = match value {
            Value::Double(v) | Value::Integer(v) => EvaluatorKind::Double(Rc::new(move || Ok(v))),
            Value::String(v) => EvaluatorKind::String(Rc::new(move || Ok(v.clone()))),
            Value::Boolean(v) => EvaluatorKind::Boolean(Rc::new(move || Ok(v))),
            Value::Instant(v) => EvaluatorKind::Instant(Rc::new(move || Ok(v))),
            Value::LocalTime(v) => EvaluatorKind::LocalTime(Rc::new(move || Ok(v))),
            Value::StringSet(v) => EvaluatorKind::StringSet(Rc::new(move || Ok(v.clone()))),
            Value::StringList(v) => EvaluatorKind::StringList(Rc::new(move || Ok(v.clone()))),
        };
        Evaluator {
            ty,
            constant: true,
            kind,
        }
    }

    pub fn ty(&self) -> ExpressionType {
        self.ty
    }

    pub fn is_constant(&self) -> bool {
        self.constant
    }

    pub fn kind(&self) -> &EvaluatorKind {
        &self.kind
    }

    /// Invokes the populated callable once and tags the result with this
    /// evaluator's type.
    pub fn evaluate(&self) -> ExprResult<Value> {
        Ok(match &self.kind {
            EvaluatorKind::Double(f) => {
                let v = f()?;
                if self.ty == ExpressionType::Integer {
                    Value::Integer(v)
                } else {
                    Value::Double(v)
                }
            }
            EvaluatorKind::String(f) => Value::String(f()?),
            EvaluatorKind::Boolean(f) => Value::Boolean(f()?),
            EvaluatorKind::Instant(f) => Value::Instant(f()?),
            EvaluatorKind::LocalTime(f) => Value::LocalTime(f()?),
            EvaluatorKind::StringSet(f) => Value::StringSet(f()?),
            EvaluatorKind::StringList(f) => Value::StringList(f()?),
        })
    }

    /// For constant evaluators, the value they replay; `None` otherwise.
    ///
    /// This is what functions use to detect constant missing children before
    /// compiling their own logic.
    pub fn constant_value(&self) -> ExprResult<Option<Value>> {
        if self.constant {
            Ok(Some(self.evaluate()?))
        } else {
            Ok(None)
        }
    }

    pub fn as_double_fn(&self) -> ExprResult<DoubleFn> {
        match &self.kind {
            EvaluatorKind::Double(f) => Ok(f.clone()),
            _ => Err(self.wrong_callable("numeric")),
        }
    }

    pub fn as_string_fn(&self) -> ExprResult<StringFn> {
        match &self.kind {
            EvaluatorKind::String(f) => Ok(f.clone()),
            _ => Err(self.wrong_callable("string")),
        }
    }

    pub fn as_boolean_fn(&self) -> ExprResult<BooleanFn> {
        match &self.kind {
            EvaluatorKind::Boolean(f) => Ok(f.clone()),
            _ => Err(self.wrong_callable("boolean")),
        }
    }

    pub fn as_instant_fn(&self) -> ExprResult<InstantFn> {
        match &self.kind {
            EvaluatorKind::Instant(f) => Ok(f.clone()),
            _ => Err(self.wrong_callable("instant")),
        }
    }

    pub fn as_local_time_fn(&self) -> ExprResult<LocalTimeFn> {
        match &self.kind {
            EvaluatorKind::LocalTime(f) => Ok(f.clone()),
            _ => Err(self.wrong_callable("local-time")),
        }
    }

    pub fn as_string_set_fn(&self) -> ExprResult<StringSetFn> {
        match &self.kind {
            EvaluatorKind::StringSet(f) => Ok(f.clone()),
            _ => Err(self.wrong_callable("string-set")),
        }
    }

    pub fn as_string_list_fn(&self) -> ExprResult<StringListFn> {
        match &self.kind {
            EvaluatorKind::StringList(f) => Ok(f.clone()),
            _ => Err(self.wrong_callable("string-list")),
        }
    }

    fn wrong_callable(&self, requested: &str) -> ExprError {
        ExprError::internal(format!(
            "requested {requested} callable from a {} evaluator",
            self.ty
        ))
    }
}
