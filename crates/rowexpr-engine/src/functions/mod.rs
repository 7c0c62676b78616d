//! The standard function library, one module per domain. Each module
//! contributes an explicit `FUNCTIONS` list; the registry is the
//! concatenation of those lists, first registration winning on name
//! collisions.

use crate::error::ExprResult;
use crate::function::{check_numeric, widen_numeric, FunctionSpec};
use crate::value::ExpressionType;

pub mod bitwise;
pub mod collection;
pub mod comparison;
pub mod conversion;
pub mod datetime;
pub mod logical;
pub mod math;
pub mod rounding;
pub mod statistical;
pub mod text;
pub mod time;
pub mod trig;
pub mod windowing;

/// Every function registered with [`ExpressionContext::standard`].
///
/// [`ExpressionContext::standard`]: crate::ExpressionContext::standard
pub fn standard_functions() -> impl Iterator<Item = &'static FunctionSpec> {
    logical::FUNCTIONS
        .iter()
        .chain(comparison::FUNCTIONS)
        .chain(math::FUNCTIONS)
        .chain(trig::FUNCTIONS)
        .chain(rounding::FUNCTIONS)
        .chain(bitwise::FUNCTIONS)
        .chain(statistical::FUNCTIONS)
        .chain(text::FUNCTIONS)
        .chain(conversion::FUNCTIONS)
        .chain(datetime::FUNCTIONS)
        .chain(time::FUNCTIONS)
        .chain(collection::FUNCTIONS)
        .chain(windowing::FUNCTIONS)
}

// Shared `compute_type` rules.

/// All arguments numeric; Integer preserved only when every argument is
/// Integer.
pub(crate) fn all_numeric_widen(
    name: &'static str,
    args: &[ExpressionType],
) -> ExprResult<ExpressionType> {
    for (i, ty) in args.iter().enumerate() {
        check_numeric(name, i + 1, *ty)?;
    }
    Ok(widen_numeric(args))
}

/// All arguments numeric; result always Double.
pub(crate) fn all_numeric_double(
    name: &'static str,
    args: &[ExpressionType],
) -> ExprResult<ExpressionType> {
    for (i, ty) in args.iter().enumerate() {
        check_numeric(name, i + 1, *ty)?;
    }
    Ok(ExpressionType::Double)
}

/// All arguments numeric; result always Integer.
pub(crate) fn all_numeric_integer(
    name: &'static str,
    args: &[ExpressionType],
) -> ExprResult<ExpressionType> {
    for (i, ty) in args.iter().enumerate() {
        check_numeric(name, i + 1, *ty)?;
    }
    Ok(ExpressionType::Integer)
}
