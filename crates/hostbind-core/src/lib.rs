//! Runtime boundary for the hostbind binding layer.
//!
//! This crate models the embedded runtime the bindings talk to: a [`State`]
//! owning an operand stack, call frames, a registry table and a global table,
//! plus the value model that flows across it:
//!
//! - **value** - [`Value`], [`ValueKind`] and [`LightUserData`]
//! - **table** - shared associative tables with metatables
//! - **userdata** - runtime-owned blocks tagged by a metatable
//! - **native_fn** - host functions callable from the runtime
//! - **convert** - [`FromValue`]/[`IntoValue`] conversions
//! - **state** - the stack API, field access, calls and protected calls
//!
//! # Example
//!
//! ```
//! use hostbind_core::{State, Result};
//!
//! fn double(state: &mut State) -> Result<usize> {
//!     let n = state.to_number(1).unwrap_or(0.0);
//!     state.push_number(n * 2.0);
//!     Ok(1)
//! }
//!
//! let mut state = State::new();
//! state.push_fn("double", double);
//! state.push_number(21.0);
//! state.call(1, 1).unwrap();
//! assert_eq!(state.to_number(-1), Some(42.0));
//! ```

mod config;
mod convert;
mod error;
mod native_fn;
mod state;
mod table;
mod type_hash;
mod userdata;
mod value;

pub use config::{DEFAULT_MAX_CALL_DEPTH, DEFAULT_MAX_STACK, DEFAULT_MIN_STACK, StateConfig};
pub use convert::{FromValue, IntoValue};
pub use error::{ConversionError, Result, ScriptError};
pub use native_fn::{NativeCallable, NativeFn, RawFn};
pub use state::{GLOBALS_INDEX, MULTRET, REGISTRY_INDEX, State};
pub use table::{Table, TableKey, TableRef};
pub use type_hash::{TypeHash, hash_constants};
pub use userdata::{UserData, UserDataRef};
pub use value::{LightUserData, Value, ValueKind, format_number, parse_number};
