use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use log::debug;

use crate::error::{ExprError, ExprResult};
use crate::evaluator::{Evaluator, EvaluatorKind};
use crate::function::FunctionSpec;
use crate::functions;
use crate::resolver::{ConstantResolver, DynamicResolver, StaticResolver};
use crate::value::{standard_constants, Constant, ExpressionType};

/// Session state for compiling and evaluating expressions: the function
/// registry, the resolver lists, the current row cursor and a cooperative
/// stop checker.
///
/// A context lives for one pass over a data set and is discarded afterward.
/// It is deliberately `Rc`/`Cell` based and therefore not shareable across
/// threads: compiled evaluators close over the context's mutable row cursor,
/// so parallel hosts must build one context (and compile one expression) per
/// worker.
///
/// Variable resolution tries the constant resolvers first (true constants
/// and scope/macro values), then the dynamic resolvers. A dynamic variable
/// can therefore be shadowed by a constant of the same name, never the
/// reverse.
pub struct ExpressionContext {
    functions: HashMap<&'static str, FunctionSpec>,
    constant_resolvers: Vec<Rc<dyn ConstantResolver>>,
    dynamic_resolvers: Vec<Rc<dyn DynamicResolver>>,
    row: Rc<Cell<i64>>,
    stop: Option<Rc<dyn Fn() -> bool>>,
    now: Rc<dyn Fn() -> DateTime<Utc>>,
}

impl ExpressionContext {
    /// A context with the standard function library and standard constants
    /// registered, and no data-bound variables.
    pub fn standard() -> Self {
        let mut ctx = ExpressionContext {
            functions: HashMap::new(),
            constant_resolvers: Vec::new(),
            dynamic_resolvers: Vec::new(),
            row: Rc::new(Cell::new(-1)),
            stop: None,
            now: Rc::new(Utc::now),
        };
        for spec in functions::standard_functions() {
            ctx.register_function(*spec);
        }
        ctx.add_constant_resolver(Rc::new(StaticResolver::new(standard_constants())));
        ctx
    }

    /// An empty context: no functions, no constants. Mainly useful for
    /// hosts that curate their own library.
    pub fn empty() -> Self {
        ExpressionContext {
            functions: HashMap::new(),
            constant_resolvers: Vec::new(),
            dynamic_resolvers: Vec::new(),
            row: Rc::new(Cell::new(-1)),
            stop: None,
            now: Rc::new(Utc::now),
        }
    }

    /// Registers a function. The first registration of a name wins; later
    /// duplicates are ignored.
    pub fn register_function(&mut self, spec: FunctionSpec) {
        if self.functions.contains_key(spec.name) {
            debug!("ignoring duplicate registration of function '{}'", spec.name);
            return;
        }
        self.functions.insert(spec.name, spec);
    }

    pub fn function(&self, name: &str) -> Option<&FunctionSpec> {
        self.functions.get(name)
    }

    pub fn function_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.keys().copied()
    }

    pub fn add_constant_resolver(&mut self, resolver: Rc<dyn ConstantResolver>) {
        self.constant_resolvers.push(resolver);
    }

    /// Scope/macro values are row-independent and resolve through the same
    /// list as true constants.
    pub fn add_scope_resolver(&mut self, resolver: Rc<dyn ConstantResolver>) {
        self.constant_resolvers.push(resolver);
    }

    pub fn add_dynamic_resolver(&mut self, resolver: Rc<dyn DynamicResolver>) {
        self.dynamic_resolvers.push(resolver);
    }

    pub fn add_constant(&mut self, constant: Constant) {
        self.add_constant_resolver(Rc::new(StaticResolver::new([constant])));
    }

    /// Installs a cooperative stop checker. Returning `true` from the
    /// closure makes the next [`check_stop`](Self::check_stop) call fail
    /// with [`ExprError::Stopped`]. Cancellation is advisory, not
    /// preemptive.
    pub fn set_stop_checker(&mut self, stop: Rc<dyn Fn() -> bool>) {
        self.stop = Some(stop);
    }

    /// Replaces the clock used by `date_time_now`, so hosts and tests can
    /// evaluate deterministically.
    pub fn set_now_provider(&mut self, now: Rc<dyn Fn() -> DateTime<Utc>>) {
        self.now = now;
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.now)()
    }

    pub(crate) fn now_provider(&self) -> Rc<dyn Fn() -> DateTime<Utc>> {
        self.now.clone()
    }

    pub fn check_stop(&self) -> ExprResult<()> {
        match &self.stop {
            Some(stop) if stop() => Err(ExprError::Stopped),
            _ => Ok(()),
        }
    }

    /// The current row index, or -1 when no row is set.
    pub fn row(&self) -> i64 {
        self.row.get()
    }

    pub fn set_row(&self, row: usize) {
        self.row.set(row as i64);
    }

    pub fn clear_row(&self) {
        self.row.set(-1);
    }

    pub(crate) fn row_cell(&self) -> Rc<Cell<i64>> {
        self.row.clone()
    }

    /// The declared type of `name`, following the resolution order, or
    /// `None` if no resolver knows it.
    pub fn variable_type(&self, name: &str) -> Option<ExpressionType> {
        for r in &self.constant_resolvers {
            if let Some(ty) = r.variable_type(name) {
                return Some(ty);
            }
        }
        for r in &self.dynamic_resolvers {
            if let Some(ty) = r.variable_type(name) {
                return Some(ty);
            }
        }
        None
    }

    /// Compiles a variable reference: a constant evaluator for constant and
    /// scope values, a per-row evaluator (closing over this context's row
    /// cursor) for dynamic ones.
    pub fn variable_evaluator(&self, name: &str) -> ExprResult<Evaluator> {
        for r in &self.constant_resolvers {
            if let Some(value) = r.value(name) {
                return Ok(Evaluator::constant(value));
            }
        }
        for r in &self.dynamic_resolvers {
            if let Some(ty) = r.variable_type(name) {
                return dynamic_evaluator(ty, name, r.clone(), self.row.clone());
            }
        }
        Err(ExprError::UnknownVariable(name.to_string()))
    }
}

fn current_row(name: &str, row: &Cell<i64>) -> ExprResult<usize> {
    let value = row.get();
    usize::try_from(value).map_err(|_| {
        ExprError::internal(format!(
            "variable '{name}' read while no row is set (cursor {value})"
        ))
    })
}

fn dynamic_evaluator(
    ty: ExpressionType,
    name: &str,
    resolver: Rc<dyn DynamicResolver>,
    row: Rc<Cell<i64>>,
) -> ExprResult<Evaluator> {
    let name: Rc<str> = Rc::from(name);
    let kind = match ty {
        ExpressionType::Double | ExpressionType::Integer => EvaluatorKind::Double(Rc::new(
            move || resolver.double_value(&name, current_row(&name, &row)?),
        )),
        ExpressionType::String => EvaluatorKind::String(Rc::new(move || {
            resolver.string_value(&name, current_row(&name, &row)?)
        })),
        ExpressionType::Boolean => EvaluatorKind::Boolean(Rc::new(move || {
            resolver.boolean_value(&name, current_row(&name, &row)?)
        })),
        ExpressionType::Instant => EvaluatorKind::Instant(Rc::new(move || {
            resolver.instant_value(&name, current_row(&name, &row)?)
        })),
        ExpressionType::LocalTime => EvaluatorKind::LocalTime(Rc::new(move || {
            resolver.local_time_value(&name, current_row(&name, &row)?)
        })),
        ExpressionType::StringSet => EvaluatorKind::StringSet(Rc::new(move || {
            resolver.string_set_value(&name, current_row(&name, &row)?)
        })),
        ExpressionType::StringList => EvaluatorKind::StringList(Rc::new(move || {
            resolver.string_list_value(&name, current_row(&name, &row)?)
        })),
    };
    Evaluator::new(ty, false, kind)
}
