//! Typed field setters for the table on top of the stack.
//!
//! Each setter pushes one value and binds it under `key` in the table at the
//! top of the stack, leaving the stack as it found it. Assigning an existing
//! key replaces the previous value.
//!
//! [`TableBuilder`] does the same for a freshly created table without going
//! through the stack for every entry:
//!
//! ```
//! use hostbind::prelude::*;
//! use hostbind::fields::TableBuilder;
//!
//! let mut state = State::new();
//! let info = TableBuilder::new(&mut state)
//!     .string("name", "probe")
//!     .number("version", 3.0)
//!     .bool("debug", false)
//!     .finish();
//! assert_eq!(state.get_top(), 1);
//! assert_eq!(info.get_str("version"), Value::Number(3.0));
//! ```

use std::fmt;

use hostbind_core::{
    IntoValue, LightUserData, NativeFn, RawFn, Result, State, TableKey, TableRef, Value,
};

pub fn set_field_number(state: &mut State, key: &str, value: f64) -> Result<()> {
    state.push_number(value);
    state.set_field(-2, key)
}

pub fn set_field_string(state: &mut State, key: &str, value: &str) -> Result<()> {
    state.push_string(value);
    state.set_field(-2, key)
}

pub fn set_field_bool(state: &mut State, key: &str, value: bool) -> Result<()> {
    state.push_boolean(value);
    state.set_field(-2, key)
}

/// Bind a light userdata (bare address) under `key`.
pub fn set_field_light(state: &mut State, key: &str, value: LightUserData) -> Result<()> {
    state.push_light_userdata(value);
    state.set_field(-2, key)
}

/// Bind a native function under `key`. The key doubles as the function's
/// name in error messages.
pub fn set_field_function(state: &mut State, key: &str, func: RawFn) -> Result<()> {
    state.push_fn(key, func);
    state.set_field(-2, key)
}

/// Bind a formatted string under `key`.
pub fn set_field_fmt(state: &mut State, key: &str, args: fmt::Arguments<'_>) -> Result<()> {
    state.push_fstring(args);
    state.set_field(-2, key)
}

/// Bind any [`IntoValue`] under `key`.
pub fn set_field_value<T: IntoValue>(state: &mut State, key: &str, value: T) -> Result<()> {
    state.push(value.into_value());
    state.set_field(-2, key)
}

/// Fluent construction of a table left on top of the stack.
pub struct TableBuilder<'s> {
    state: &'s mut State,
    table: TableRef,
    next_index: i64,
}

impl<'s> TableBuilder<'s> {
    /// Push a new empty table and start building it.
    pub fn new(state: &'s mut State) -> Self {
        Self::with_capacity(state, 0, 0)
    }

    /// Push a new table pre-sized for `narr` sequence and `nrec` named
    /// entries.
    pub fn with_capacity(state: &'s mut State, narr: usize, nrec: usize) -> Self {
        let table = state.create_table(narr, nrec);
        Self {
            state,
            table,
            next_index: 1,
        }
    }

    fn set(self, key: TableKey, value: Value) -> Self {
        self.table.set(key, value);
        self
    }

    pub fn number(self, key: &str, value: f64) -> Self {
        self.set(key.into(), Value::Number(value))
    }

    pub fn string(self, key: &str, value: &str) -> Self {
        self.set(key.into(), Value::String(value.into()))
    }

    pub fn bool(self, key: &str, value: bool) -> Self {
        self.set(key.into(), Value::Boolean(value))
    }

    pub fn light(self, key: &str, value: LightUserData) -> Self {
        self.set(key.into(), Value::LightUserData(value))
    }

    pub fn function(self, key: &str, func: RawFn) -> Self {
        self.set(key.into(), Value::Function(NativeFn::from_fn(key, func)))
    }

    pub fn fmt(self, key: &str, args: fmt::Arguments<'_>) -> Self {
        self.set(key.into(), Value::String(fmt::format(args).into()))
    }

    pub fn value<T: IntoValue>(self, key: &str, value: T) -> Self {
        self.set(key.into(), value.into_value())
    }

    /// Append to the sequence part: the first push lands at index 1, each
    /// later one right after the previous.
    pub fn push<T: IntoValue>(mut self, value: T) -> Self {
        let key = TableKey::from(self.next_index);
        self.next_index += 1;
        self.set(key, value.into_value())
    }

    /// Finish, leaving the table on top of the stack.
    pub fn finish(self) -> TableRef {
        self.table
    }

    /// Finish by popping the table and binding it as the global `name`.
    pub fn into_global(self, name: &str) -> Result<TableRef> {
        self.state.set_global(name)?;
        Ok(self.table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_state: &mut State) -> Result<usize> {
        Ok(0)
    }

    #[test]
    fn setters_leave_stack_balanced() {
        let mut state = State::new();
        let table = state.new_table();
        set_field_number(&mut state, "n", 1.5).unwrap();
        set_field_string(&mut state, "s", "text").unwrap();
        set_field_bool(&mut state, "b", true).unwrap();
        set_field_light(&mut state, "p", LightUserData(0x1000)).unwrap();
        set_field_function(&mut state, "f", noop).unwrap();
        set_field_fmt(&mut state, "fmt", format_args!("{}-{}", "a", 1)).unwrap();
        set_field_value(&mut state, "v", 9u8).unwrap();
        assert_eq!(state.get_top(), 1);

        let table = table.borrow();
        assert_eq!(table.get_str("n"), Value::Number(1.5));
        assert_eq!(table.get_str("s"), Value::from("text"));
        assert_eq!(table.get_str("b"), Value::Boolean(true));
        assert_eq!(table.get_str("p"), Value::LightUserData(LightUserData(0x1000)));
        assert_eq!(table.get_str("fmt"), Value::from("a-1"));
        assert_eq!(table.get_str("v"), Value::Number(9.0));
        match table.get_str("f") {
            Value::Function(f) => assert_eq!(f.name(), "f"),
            other => panic!("expected function, got {:?}", other),
        }
    }

    #[test]
    fn last_write_wins() {
        let mut state = State::new();
        let table = state.new_table();
        set_field_number(&mut state, "x", 1.0).unwrap();
        set_field_string(&mut state, "x", "second").unwrap();
        assert_eq!(table.get_str("x"), Value::from("second"));
        assert_eq!(table.borrow().entry_count(), 1);
    }

    #[test]
    fn setters_need_a_table() {
        let mut state = State::new();
        state.push_number(1.0);
        assert!(set_field_bool(&mut state, "b", true).is_err());
    }

    #[test]
    fn builder_sequence_and_global() {
        let mut state = State::new();
        let list = TableBuilder::with_capacity(&mut state, 3, 1)
            .push("a")
            .push("b")
            .push("c")
            .string("kind", "list")
            .into_global("letters")
            .unwrap();
        assert_eq!(state.get_top(), 0);
        assert_eq!(list.borrow().len(), 3);
        assert_eq!(state.get_global("letters"), hostbind_core::ValueKind::Table);
        assert!(state.to_table(-1).unwrap().ptr_eq(&list));
    }

    #[test]
    fn builder_sequence_is_contiguous() {
        let mut state = State::new();
        let list = TableBuilder::new(&mut state)
            .push(10.0)
            .string("label", "tens")
            .push(20.0)
            .push(30.0)
            .finish();
        let list = list.borrow();
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(&TableKey::from(1i64)), Value::Number(10.0));
        assert_eq!(list.get(&TableKey::from(3i64)), Value::Number(30.0));
        assert!(list.get(&TableKey::from(4i64)).is_nil());
        assert_eq!(list.entry_count(), 4);
    }

    #[test]
    fn builder_functions_are_callable() {
        fn seven(state: &mut State) -> Result<usize> {
            state.push_integer(7);
            Ok(1)
        }
        let mut state = State::new();
        TableBuilder::new(&mut state).function("seven", seven).finish();
        state.get_field(-1, "seven").unwrap();
        state.call(0, 1).unwrap();
        assert_eq!(state.to_integer(-1), Some(7));
    }
}
