//! Conversion traits between Rust values and runtime values.
//!
//! - [`FromValue`]: extract a Rust value from a [`Value`]
//! - [`IntoValue`]: convert a Rust value into a [`Value`]
//!
//! Numbers follow the runtime's coercions: numeric strings convert to
//! numbers and numbers convert to strings. Booleans are never coerced.
//!
//! ```
//! use hostbind_core::{FromValue, IntoValue, Value};
//!
//! let value = 42i32.into_value();
//! assert_eq!(i64::from_value(&value).unwrap(), 42);
//! assert_eq!(String::from_value(&value).unwrap(), "42");
//! ```

use std::rc::Rc;

use crate::error::ConversionError;
use crate::native_fn::NativeFn;
use crate::table::TableRef;
use crate::userdata::UserDataRef;
use crate::value::{LightUserData, Value, ValueKind};

/// Extract a value from a runtime value.
pub trait FromValue: Sized {
    /// Kind name reported when the conversion fails.
    const EXPECTED: &'static str;

    fn from_value(value: &Value) -> Result<Self, ConversionError>;
}

/// Convert a value into a runtime value.
pub trait IntoValue {
    fn into_value(self) -> Value;
}

fn mismatch(expected: &'static str, value: &Value) -> ConversionError {
    ConversionError::TypeMismatch {
        expected,
        actual: value.type_name(),
    }
}

// ============================================================================
// Numbers
// ============================================================================

impl FromValue for f64 {
    const EXPECTED: &'static str = "number";

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        value.to_number().ok_or_else(|| mismatch(Self::EXPECTED, value))
    }
}

impl FromValue for f32 {
    const EXPECTED: &'static str = "number";

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        f64::from_value(value).map(|n| n as f32)
    }
}

macro_rules! impl_integer_value {
    ($($ty:ty),*) => {
        $(
            impl FromValue for $ty {
                const EXPECTED: &'static str = "number";

                fn from_value(value: &Value) -> Result<Self, ConversionError> {
                    let n = f64::from_value(value)?.trunc();
                    if n >= <$ty>::MIN as f64 && n <= <$ty>::MAX as f64 {
                        Ok(n as $ty)
                    } else {
                        Err(ConversionError::IntegerOverflow {
                            value: n,
                            target_type: stringify!($ty),
                        })
                    }
                }
            }

            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::Number(self as f64)
                }
            }
        )*
    };
}

impl_integer_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Number(self)
    }
}

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Number(self as f64)
    }
}

// ============================================================================
// Booleans and strings
// ============================================================================

impl FromValue for bool {
    const EXPECTED: &'static str = "boolean";

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        match value {
            Value::Boolean(b) => Ok(*b),
            _ => Err(mismatch(Self::EXPECTED, value)),
        }
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Boolean(self)
    }
}

impl FromValue for Rc<str> {
    const EXPECTED: &'static str = "string";

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        value.to_str().ok_or_else(|| mismatch(Self::EXPECTED, value))
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "string";

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        Rc::<str>::from_value(value).map(|s| s.to_string())
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::String(self.into())
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::String(self.into())
    }
}

impl IntoValue for Rc<str> {
    fn into_value(self) -> Value {
        Value::String(self)
    }
}

// ============================================================================
// Reference types
// ============================================================================

macro_rules! impl_reference_value {
    ($ty:ty, $variant:ident, $expected:expr) => {
        impl FromValue for $ty {
            const EXPECTED: &'static str = $expected;

            fn from_value(value: &Value) -> Result<Self, ConversionError> {
                match value {
                    Value::$variant(inner) => Ok(inner.clone()),
                    _ => Err(mismatch(Self::EXPECTED, value)),
                }
            }
        }

        impl IntoValue for $ty {
            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }
    };
}

impl_reference_value!(TableRef, Table, "table");
impl_reference_value!(UserDataRef, UserData, "userdata");
impl_reference_value!(NativeFn, Function, "function");
impl_reference_value!(LightUserData, LightUserData, "userdata");

// ============================================================================
// Pass-through and optional values
// ============================================================================

impl FromValue for Value {
    const EXPECTED: &'static str = "value";

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        Ok(value.clone())
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for () {
    fn into_value(self) -> Value {
        Value::Nil
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_value(value: &Value) -> Result<Self, ConversionError> {
        if value.kind() == ValueKind::Nil {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        self.map_or(Value::Nil, IntoValue::into_value)
    }
}
