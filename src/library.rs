//! Native function libraries.
//!
//! A library is a plain table of name → native function. Hosts describe one
//! with a slice of [`Reg`] entries and publish it through [`new_lib`] and
//! [`require`]:
//!
//! ```
//! use hostbind::prelude::*;
//! use hostbind::library::{self, Reg};
//!
//! fn answer(state: &mut State) -> Result<usize> {
//!     state.push_number(42.0);
//!     Ok(1)
//! }
//!
//! const FUNCS: &[Reg] = &[Reg::new("answer", answer)];
//!
//! fn open_demo(state: &mut State) -> Result<usize> {
//!     Ok(library::new_lib(state, FUNCS))
//! }
//!
//! let mut state = State::new();
//! library::require(&mut state, "demo", open_demo, true).unwrap();
//! assert_eq!(state.get_top(), 0);
//! assert_eq!(state.get_global("demo"), ValueKind::Table);
//! ```

use tracing::debug;

use hostbind_core::{NativeFn, RawFn, Result, ScriptError, State, Value};

/// One library entry: a script-visible name and the function it calls.
#[derive(Debug, Clone, Copy)]
pub struct Reg {
    pub name: &'static str,
    pub func: RawFn,
}

impl Reg {
    pub const fn new(name: &'static str, func: RawFn) -> Self {
        Self { name, func }
    }

    fn to_native(self) -> NativeFn {
        NativeFn::from_fn(self.name, self.func)
    }
}

/// Push a new table holding one field per entry and return 1, the number
/// of values an opener leaves for [`require`].
///
/// Entries are applied in order, so a repeated name keeps its last
/// function.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn new_lib(state: &mut State, funcs: &[Reg]) -> usize {
    let lib = state.create_table(0, funcs.len());
    let mut entries = lib.borrow_mut();
    for reg in funcs {
        entries.set(reg.name.into(), Value::Function(reg.to_native()));
    }
    1
}

/// Merge entries into the table on top of the stack, overwriting existing
/// names.
pub fn register_functions(state: &mut State, funcs: &[Reg]) -> Result<()> {
    for reg in funcs {
        state.push_function(reg.to_native());
        state.set_field(-2, reg.name)?;
    }
    Ok(())
}

/// Open module `name` by running `opener`.
///
/// The opener must leave the module value on top of the stack. With
/// `global` set, that value is popped and bound as the global `name` and 0
/// is returned; otherwise it stays on the stack and 1 is returned.
///
/// Nothing is cached: every call runs the opener again and, for global
/// modules, overwrites the previous binding.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn require<F>(state: &mut State, name: &str, opener: F, global: bool) -> Result<usize>
where
    F: FnOnce(&mut State) -> Result<usize>,
{
    let top = state.get_top();
    let produced = opener(state)?;
    if produced == 0 || state.get_top() <= top {
        return Err(ScriptError::runtime(format!(
            "module '{}' opener produced no value",
            name
        )));
    }
    debug!(module = name, global, "opened module");
    if global {
        state.set_global(name)?;
        Ok(0)
    } else {
        Ok(1)
    }
}

/// [`require`] for a library that is just a list of functions.
pub fn open_lib(state: &mut State, name: &str, funcs: &[Reg], global: bool) -> Result<usize> {
    require(state, name, |state| Ok(new_lib(state, funcs)), global)
}
