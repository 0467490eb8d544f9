//! Argument checking and value marshalling for native functions.
//!
//! Checkers read argument `arg` of the current frame and either return a
//! Rust value or a [`ScriptError`] that names the argument position, the
//! running function, the expected kind and the kind actually found:
//!
//! ```text
//! bad argument #2 to 'scale' (number expected, got table)
//! ```
//!
//! - `check_*` are strict: absent or mismatched arguments fail.
//! - `opt_*` return the supplied default for absent or `nil` arguments and
//!   are strict otherwise. [`opt_boolean`] is the exception: any present
//!   value is accepted and read for its truthiness.
//!
//! Numeric strings are accepted where a number is expected, and numbers
//! where a string is expected. Booleans are never coerced by the strict
//! checkers.

use std::fmt;
use std::rc::Rc;

use hostbind_core::{
    ConversionError, FromValue, IntoValue, NativeFn, Result, ScriptError, State, TableRef,
    ValueKind,
};

// =============================================================================
// STRICT CHECKERS
// =============================================================================

/// Argument `arg` as a number.
pub fn check_number(state: &State, arg: i32) -> Result<f64> {
    state
        .to_number(arg)
        .ok_or_else(|| state.type_error(arg, "number"))
}

/// Argument `arg` as a number truncated toward zero.
pub fn check_integer(state: &State, arg: i32) -> Result<i64> {
    state
        .to_integer(arg)
        .ok_or_else(|| state.type_error(arg, "number"))
}

/// Argument `arg` as a string.
pub fn check_string(state: &State, arg: i32) -> Result<Rc<str>> {
    state
        .to_str(arg)
        .ok_or_else(|| state.type_error(arg, "string"))
}

/// Argument `arg` as a boolean. Only `true` and `false` are accepted.
pub fn check_boolean(state: &State, arg: i32) -> Result<bool> {
    match state.kind(arg) {
        ValueKind::Boolean => Ok(state.to_boolean(arg)),
        _ => Err(state.type_error(arg, "boolean")),
    }
}

pub fn check_table(state: &State, arg: i32) -> Result<TableRef> {
    state
        .to_table(arg)
        .ok_or_else(|| state.type_error(arg, "table"))
}

pub fn check_function(state: &State, arg: i32) -> Result<NativeFn> {
    state
        .to_function(arg)
        .ok_or_else(|| state.type_error(arg, "function"))
}

/// Require argument `arg` to have exactly `kind`. No coercion applies.
pub fn check_kind(state: &State, arg: i32, kind: ValueKind) -> Result<()> {
    if state.kind(arg) == kind {
        Ok(())
    } else {
        Err(state.type_error(arg, kind.name()))
    }
}

/// Require argument `arg` to be present. `nil` counts as present.
pub fn check_any(state: &State, arg: i32) -> Result<()> {
    if state.is_none(arg) {
        Err(state.arg_error(arg, "value expected"))
    } else {
        Ok(())
    }
}

/// Argument `arg` converted through [`FromValue`].
///
/// ```
/// use hostbind::prelude::*;
///
/// let mut state = State::new();
/// state.push_string("12");
/// assert_eq!(hostbind::marshal::check::<u16>(&state, 1).unwrap(), 12);
/// ```
pub fn check<T: FromValue>(state: &State, arg: i32) -> Result<T> {
    match state.value(arg) {
        Some(value) => {
            T::from_value(&value).map_err(|err| conversion_error(state, arg, err))
        }
        None => Err(state.type_error(arg, T::EXPECTED)),
    }
}

fn conversion_error(state: &State, arg: i32, err: ConversionError) -> ScriptError {
    match err {
        ConversionError::TypeMismatch { expected, .. } => state.type_error(arg, expected),
        overflow @ ConversionError::IntegerOverflow { .. } => {
            state.arg_error(arg, overflow.to_string())
        }
    }
}

// =============================================================================
// OPTIONAL CHECKERS
// =============================================================================

pub fn opt_number(state: &State, arg: i32, default: f64) -> Result<f64> {
    if state.is_none_or_nil(arg) {
        Ok(default)
    } else {
        check_number(state, arg)
    }
}

pub fn opt_integer(state: &State, arg: i32, default: i64) -> Result<i64> {
    if state.is_none_or_nil(arg) {
        Ok(default)
    } else {
        check_integer(state, arg)
    }
}

pub fn opt_string(state: &State, arg: i32, default: &str) -> Result<Rc<str>> {
    if state.is_none_or_nil(arg) {
        Ok(default.into())
    } else {
        check_string(state, arg)
    }
}

/// `default` for absent or `nil` arguments, otherwise the argument's
/// truthiness. Never fails.
pub fn opt_boolean(state: &State, arg: i32, default: bool) -> bool {
    if state.is_none_or_nil(arg) {
        default
    } else {
        state.to_boolean(arg)
    }
}

/// Generic optional argument.
pub fn opt<T: FromValue>(state: &State, arg: i32, default: T) -> Result<T> {
    if state.is_none_or_nil(arg) {
        Ok(default)
    } else {
        check(state, arg)
    }
}

// =============================================================================
// PRECONDITIONS AND ERRORS
// =============================================================================

/// Fail with an argument error unless `cond` holds.
pub fn arg_check(state: &State, cond: bool, arg: i32, message: &str) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(state.arg_error(arg, message))
    }
}

/// Build a free-form runtime error from format arguments.
///
/// ```
/// let err = hostbind::marshal::error(format_args!("{} is read-only", "origin"));
/// assert_eq!(err.to_string(), "origin is read-only");
/// ```
pub fn error(args: fmt::Arguments<'_>) -> ScriptError {
    ScriptError::runtime(fmt::format(args))
}

// =============================================================================
// PUSHING
// =============================================================================

/// Push any [`IntoValue`].
pub fn push<T: IntoValue>(state: &mut State, value: T) {
    state.push(value.into_value());
}

/// Push each value in order and return how many were pushed, ready to be
/// returned from a native function.
pub fn push_all<T, I>(state: &mut State, values: I) -> Result<usize>
where
    T: IntoValue,
    I: IntoIterator<Item = T>,
    I::IntoIter: ExactSizeIterator,
{
    let values = values.into_iter();
    state.check_stack(values.len())?;
    let count = values.len();
    for value in values {
        push(state, value);
    }
    Ok(count)
}
