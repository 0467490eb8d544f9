//! Host bindings for an embedded stack-based scripting runtime.
//!
//! `hostbind` is the convenience layer a host application uses to talk to a
//! [`State`](hostbind_core::State):
//!
//! - **userdata** - register named userdata types, allocate tagged
//!   instances and check a value's type by identity
//! - **library** - publish tables of native functions as modules
//! - **marshal** - check and convert native function arguments
//! - **fields** - fill tables with typed fields
//!
//! # Example
//!
//! ```
//! use hostbind::prelude::*;
//!
//! fn area(state: &mut State) -> Result<usize> {
//!     let rect = check_typed::<Rect>(state, 1)?;
//!     let rect = rect.borrow();
//!     state.push_number(rect.w * rect.h);
//!     Ok(1)
//! }
//!
//! struct Rect {
//!     w: f64,
//!     h: f64,
//! }
//!
//! impl NativeType for Rect {
//!     const NAME: &'static str = "Rect";
//!
//!     fn methods() -> &'static [Reg] {
//!         const METHODS: &[Reg] = &[Reg::new("area", area)];
//!         METHODS
//!     }
//! }
//!
//! let mut state = State::new();
//! register_class::<Rect>(&mut state)?;
//! new_typed(&mut state, Rect { w: 2.0, h: 3.0 })?;
//! invoke_method(&mut state, -1, "area", 0, 1)?;
//! assert_eq!(state.to_number(-1), Some(6.0));
//! # Ok::<(), ScriptError>(())
//! ```

pub mod fields;
pub mod library;
pub mod marshal;
pub mod userdata;

pub use hostbind_core as runtime;

// Re-export main types
pub mod prelude {
    pub use crate::fields::TableBuilder;
    pub use crate::library::{Reg, new_lib, open_lib, register_functions, require};
    pub use crate::userdata::{
        Instance, NativeType, TypeHandle, check_instance, check_typed, invoke_method,
        is_instance_of, is_type, new_instance, new_instance_of, new_typed, opt_instance,
        register_class, register_type, to_pointer, type_handle,
    };
    pub use hostbind_core::{
        FromValue, IntoValue, LightUserData, NativeFn, Result, ScriptError, State, StateConfig,
        TableRef, UserDataRef, Value, ValueKind, GLOBALS_INDEX, MULTRET, REGISTRY_INDEX,
    };
}
