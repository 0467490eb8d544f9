//! The runtime state: operand stack, call frames, registry and globals.
//!
//! A [`State`] is one independent runtime instance. The stack, the type
//! registry and the global table are all owned here and reached through this
//! value, so several runtimes can coexist in one process.
//!
//! ## Stack Indices
//!
//! ```text
//!            top ──► │ v3 │  -1      3
//!                    │ v2 │  -2      2
//!  frame base ─────► │ v1 │  -3      1
//!                    ├────┤
//!  (caller's slots)  │ .. │  not addressable from this frame
//! ```
//!
//! Positive indices count from the base of the current frame (1-based);
//! negative indices count down from the top. [`REGISTRY_INDEX`] and
//! [`GLOBALS_INDEX`] are pseudo-indices addressing the registry and global
//! tables. Absolute positions are never meaningful across frames.
//!
//! ## Calls and Errors
//!
//! [`State::call`] runs the native function sitting below `nargs` arguments
//! in a fresh frame. Errors are ordinary `Result`s: they unwind through `?`
//! and every `call` discards its frame on the way out. [`State::pcall`] is the
//! protected boundary that converts a failure into an error message on the
//! stack in addition to the returned error.

use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::config::StateConfig;
use crate::error::{Result, ScriptError};
use crate::native_fn::{NativeFn, RawFn};
use crate::table::{Table, TableKey, TableRef};
use crate::userdata::{UserData, UserDataRef};
use crate::value::{LightUserData, Value, ValueKind};

/// Pseudo-index of the registry table.
pub const REGISTRY_INDEX: i32 = -10000;

/// Pseudo-index of the global table.
pub const GLOBALS_INDEX: i32 = -10002;

/// Request all results from [`State::call`].
pub const MULTRET: i32 = -1;

struct CallFrame {
    /// Absolute stack position of the frame's first slot.
    base: usize,
    /// Function running in this frame; `None` for the host frame.
    function: Option<NativeFn>,
}

/// One runtime instance.
pub struct State {
    stack: Vec<Value>,
    frames: Vec<CallFrame>,
    registry: TableRef,
    globals: TableRef,
    config: StateConfig,
}

impl State {
    /// Create a state with default limits.
    pub fn new() -> Self {
        Self::with_config(StateConfig::default())
    }

    /// Create a state with explicit limits.
    pub fn with_config(config: StateConfig) -> Self {
        debug!(
            max_stack = config.max_stack,
            max_call_depth = config.max_call_depth,
            "creating runtime state"
        );
        Self {
            stack: Vec::with_capacity(config.min_stack),
            frames: vec![CallFrame {
                base: 0,
                function: None,
            }],
            registry: TableRef::new(),
            globals: TableRef::new(),
            config,
        }
    }

    /// Tear the state down. Equivalent to dropping it.
    pub fn close(self) {}

    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    /// The registry table (also reachable as [`REGISTRY_INDEX`]).
    pub fn registry(&self) -> &TableRef {
        &self.registry
    }

    /// The global table (also reachable as [`GLOBALS_INDEX`]).
    pub fn globals(&self) -> &TableRef {
        &self.globals
    }

    // ==========================================================================
    // Index resolution
    // ==========================================================================

    fn base(&self) -> usize {
        self.frames.last().map_or(0, |frame| frame.base)
    }

    /// Absolute stack position of a non-pseudo index in the current frame.
    fn slot(&self, idx: i32) -> Option<usize> {
        let base = self.base();
        let top = self.stack.len();
        if idx > 0 {
            let pos = base + idx as usize - 1;
            (pos < top).then_some(pos)
        } else if idx < 0 && idx > REGISTRY_INDEX {
            let offset = idx.unsigned_abs() as usize;
            (offset <= top - base).then(|| top - offset)
        } else {
            None
        }
    }

    /// The value at `idx`, or `None` if the index is not valid.
    pub fn value(&self, idx: i32) -> Option<Value> {
        match idx {
            REGISTRY_INDEX => Some(Value::Table(self.registry.clone())),
            GLOBALS_INDEX => Some(Value::Table(self.globals.clone())),
            _ => self.slot(idx).map(|pos| self.stack[pos].clone()),
        }
    }

    fn value_or_err(&self, idx: i32) -> Result<Value> {
        self.value(idx).ok_or(ScriptError::InvalidIndex { index: idx })
    }

    /// Convert a relative index into the equivalent positive index.
    /// Pseudo-indices, positive indices and negative indices reaching below
    /// the frame base are returned unchanged.
    pub fn abs_index(&self, idx: i32) -> i32 {
        let top = self.get_top();
        if idx < 0 && idx > REGISTRY_INDEX && -idx <= top {
            top + idx + 1
        } else {
            idx
        }
    }

    pub fn is_valid(&self, idx: i32) -> bool {
        self.value(idx).is_some()
    }

    // ==========================================================================
    // Stack manipulation
    // ==========================================================================

    /// Number of values in the current frame.
    pub fn get_top(&self) -> i32 {
        (self.stack.len() - self.base()) as i32
    }

    /// Set the frame's top: grow with `nil`s or shrink.
    pub fn set_top(&mut self, idx: i32) -> Result<()> {
        let base = self.base();
        let new_len = if idx >= 0 {
            base + idx as usize
        } else {
            let offset = idx.unsigned_abs() as usize - 1;
            let len = self.stack.len();
            if offset > len - base {
                return Err(ScriptError::InvalidIndex { index: idx });
            }
            len - offset
        };
        if new_len > self.config.max_stack {
            return Err(ScriptError::stack_overflow(format!(
                "cannot grow the stack to {} slots",
                new_len
            )));
        }
        self.stack.resize(new_len, Value::Nil);
        Ok(())
    }

    /// Pop up to `n` values; never pops below the frame base.
    pub fn pop(&mut self, n: usize) {
        let floor = self.base();
        let new_len = self.stack.len().saturating_sub(n).max(floor);
        self.stack.truncate(new_len);
    }

    /// Pop the top value of the current frame.
    pub fn pop_value(&mut self) -> Result<Value> {
        if self.stack.len() <= self.base() {
            return Err(ScriptError::InvalidIndex { index: -1 });
        }
        Ok(self.stack.pop().unwrap_or_default())
    }

    /// Ensure `extra` more slots fit within the configured stack limit.
    pub fn check_stack(&self, extra: usize) -> Result<()> {
        if self.stack.len() + extra > self.config.max_stack {
            return Err(ScriptError::stack_overflow(format!(
                "cannot reserve {} more slots",
                extra
            )));
        }
        Ok(())
    }

    /// Remove the value at `idx`, shifting the values above it down.
    pub fn remove(&mut self, idx: i32) -> Result<Value> {
        let pos = self.slot(idx).ok_or(ScriptError::InvalidIndex { index: idx })?;
        Ok(self.stack.remove(pos))
    }

    /// Move the top value into `idx`, shifting the values above it up.
    pub fn insert(&mut self, idx: i32) -> Result<()> {
        let pos = self.slot(idx).ok_or(ScriptError::InvalidIndex { index: idx })?;
        let value = self.pop_value()?;
        self.stack.insert(pos, value);
        Ok(())
    }

    /// Pop the top value and store it at `idx`.
    pub fn replace(&mut self, idx: i32) -> Result<()> {
        let pos = self.slot(idx).ok_or(ScriptError::InvalidIndex { index: idx })?;
        let value = self.pop_value()?;
        if let Some(slot) = self.stack.get_mut(pos) {
            *slot = value;
        }
        Ok(())
    }

    // ==========================================================================
    // Push operations
    // ==========================================================================

    pub fn push(&mut self, value: impl Into<Value>) {
        self.stack.push(value.into());
    }

    pub fn push_nil(&mut self) {
        self.push(Value::Nil);
    }

    pub fn push_number(&mut self, n: f64) {
        self.push(Value::Number(n));
    }

    /// Integers are stored as numbers.
    pub fn push_integer(&mut self, n: i64) {
        self.push(Value::Number(n as f64));
    }

    pub fn push_boolean(&mut self, b: bool) {
        self.push(Value::Boolean(b));
    }

    pub fn push_string(&mut self, s: &str) {
        self.push(Value::String(s.into()));
    }

    /// Push a formatted string and return it.
    pub fn push_fstring(&mut self, args: fmt::Arguments<'_>) -> Rc<str> {
        let s: Rc<str> = fmt::format(args).into();
        self.push(Value::String(Rc::clone(&s)));
        s
    }

    pub fn push_light_userdata(&mut self, p: LightUserData) {
        self.push(Value::LightUserData(p));
    }

    pub fn push_function(&mut self, f: NativeFn) {
        self.push(Value::Function(f));
    }

    /// Push a plain function pointer under a display name.
    pub fn push_fn(&mut self, name: &str, f: RawFn) {
        self.push_function(NativeFn::from_fn(name, f));
    }

    /// Push a copy of the value at `idx`.
    pub fn push_value(&mut self, idx: i32) -> Result<()> {
        let value = self.value_or_err(idx)?;
        self.push(value);
        Ok(())
    }

    // ==========================================================================
    // Queries and conversions
    // ==========================================================================

    /// Kind of the value at `idx`; [`ValueKind::None`] for invalid indices.
    pub fn kind(&self, idx: i32) -> ValueKind {
        self.value(idx).map_or(ValueKind::None, |v| v.kind())
    }

    /// Kind name of the value at `idx` ("no value" for invalid indices).
    pub fn type_name_at(&self, idx: i32) -> &'static str {
        self.kind(idx).name()
    }

    pub fn is_none(&self, idx: i32) -> bool {
        self.kind(idx) == ValueKind::None
    }

    pub fn is_nil(&self, idx: i32) -> bool {
        self.kind(idx) == ValueKind::Nil
    }

    pub fn is_none_or_nil(&self, idx: i32) -> bool {
        matches!(self.kind(idx), ValueKind::None | ValueKind::Nil)
    }

    /// True for numbers and numeric strings.
    pub fn is_number(&self, idx: i32) -> bool {
        self.to_number(idx).is_some()
    }

    /// True for strings and numbers.
    pub fn is_string(&self, idx: i32) -> bool {
        matches!(self.kind(idx), ValueKind::String | ValueKind::Number)
    }

    pub fn is_boolean(&self, idx: i32) -> bool {
        self.kind(idx) == ValueKind::Boolean
    }

    pub fn is_table(&self, idx: i32) -> bool {
        self.kind(idx) == ValueKind::Table
    }

    pub fn is_function(&self, idx: i32) -> bool {
        self.kind(idx) == ValueKind::Function
    }

    /// True for full and light userdata.
    pub fn is_userdata(&self, idx: i32) -> bool {
        matches!(
            self.kind(idx),
            ValueKind::UserData | ValueKind::LightUserData
        )
    }

    pub fn to_number(&self, idx: i32) -> Option<f64> {
        self.value(idx)?.to_number()
    }

    /// Number at `idx` truncated toward zero.
    pub fn to_integer(&self, idx: i32) -> Option<i64> {
        self.to_number(idx).map(|n| n.trunc() as i64)
    }

    /// Truthiness of the value at `idx`; invalid indices are false.
    pub fn to_boolean(&self, idx: i32) -> bool {
        self.value(idx).is_some_and(|v| v.is_truthy())
    }

    pub fn to_str(&self, idx: i32) -> Option<Rc<str>> {
        self.value(idx)?.to_str()
    }

    pub fn to_table(&self, idx: i32) -> Option<TableRef> {
        match self.value(idx)? {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn to_function(&self, idx: i32) -> Option<NativeFn> {
        match self.value(idx)? {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Full userdata at `idx`.
    pub fn to_userdata(&self, idx: i32) -> Option<UserDataRef> {
        match self.value(idx)? {
            Value::UserData(u) => Some(u),
            _ => None,
        }
    }

    pub fn to_light_userdata(&self, idx: i32) -> Option<LightUserData> {
        match self.value(idx)? {
            Value::LightUserData(p) => Some(p),
            _ => None,
        }
    }

    /// Primitive equality of two slots; false if either index is invalid.
    pub fn raw_equal(&self, idx1: i32, idx2: i32) -> bool {
        match (self.value(idx1), self.value(idx2)) {
            (Some(a), Some(b)) => a.raw_equal(&b),
            _ => false,
        }
    }

    // ==========================================================================
    // Tables
    // ==========================================================================

    /// Push a new empty table and return a handle to it.
    pub fn new_table(&mut self) -> TableRef {
        self.create_table(0, 0)
    }

    /// Push a new table pre-sized for `narr` sequence and `nrec` named
    /// entries, and return a handle to it.
    pub fn create_table(&mut self, narr: usize, nrec: usize) -> TableRef {
        let table = TableRef::from_table(Table::with_capacity(narr, nrec));
        self.push(Value::Table(table.clone()));
        table
    }

    /// Push `t[key]` for the value at `idx`, consulting its `__index`
    /// handler, and return the kind of the pushed value.
    pub fn get_field(&mut self, idx: i32, key: &str) -> Result<ValueKind> {
        let target = self.value_or_err(idx)?;
        let value = self.index(&target, &TableKey::from(key))?;
        let kind = value.kind();
        self.push(value);
        Ok(kind)
    }

    /// Pop a value and store it as `t[key]` in the table at `idx`.
    pub fn set_field(&mut self, idx: i32, key: &str) -> Result<()> {
        let target = self.value_or_err(idx)?;
        let value = self.pop_value()?;
        Self::assign(&target, TableKey::from(key), value)
    }

    /// Pop a key and push `t[key]` for the value at `idx`.
    pub fn get_table(&mut self, idx: i32) -> Result<ValueKind> {
        let target = self.value_or_err(idx)?;
        let key = TableKey::from_value(&self.pop_value()?)?;
        let value = self.index(&target, &key)?;
        let kind = value.kind();
        self.push(value);
        Ok(kind)
    }

    /// Pop a value and a key and store `t[key] = value` in the table at `idx`.
    pub fn set_table(&mut self, idx: i32) -> Result<()> {
        let target = self.value_or_err(idx)?;
        let value = self.pop_value()?;
        let key = TableKey::from_value(&self.pop_value()?)?;
        Self::assign(&target, key, value)
    }

    /// Pop a key and push the raw entry of the table at `idx`.
    pub fn raw_get(&mut self, idx: i32) -> Result<ValueKind> {
        let table = self.table_at(idx)?;
        let key = TableKey::from_value(&self.pop_value()?)?;
        let value = table.get(&key);
        let kind = value.kind();
        self.push(value);
        Ok(kind)
    }

    /// Pop a value and a key and store them raw in the table at `idx`.
    pub fn raw_set(&mut self, idx: i32) -> Result<()> {
        let table = self.table_at(idx)?;
        let value = self.pop_value()?;
        let key = TableKey::from_value(&self.pop_value()?)?;
        table.set(key, value);
        Ok(())
    }

    /// Push the raw entry `t[n]` of the table at `idx`.
    pub fn raw_geti(&mut self, idx: i32, n: i64) -> Result<ValueKind> {
        let table = self.table_at(idx)?;
        let value = table.get(&TableKey::from(n));
        let kind = value.kind();
        self.push(value);
        Ok(kind)
    }

    /// Pop a value and store it raw as `t[n]` in the table at `idx`.
    pub fn raw_seti(&mut self, idx: i32, n: i64) -> Result<()> {
        let table = self.table_at(idx)?;
        let value = self.pop_value()?;
        table.set(TableKey::from(n), value);
        Ok(())
    }

    /// Push the global `name`.
    pub fn get_global(&mut self, name: &str) -> ValueKind {
        let value = self.globals.get_str(name);
        let kind = value.kind();
        self.push(value);
        kind
    }

    /// Pop a value and bind it as the global `name`, overwriting any
    /// previous binding.
    pub fn set_global(&mut self, name: &str) -> Result<()> {
        let value = self.pop_value()?;
        self.globals.set(TableKey::from(name), value);
        Ok(())
    }

    fn table_at(&self, idx: i32) -> Result<TableRef> {
        match self.value_or_err(idx)? {
            Value::Table(t) => Ok(t),
            other => Err(ScriptError::Operation {
                op: "index",
                kind: other.type_name(),
            }),
        }
    }

    fn assign(target: &Value, key: TableKey, value: Value) -> Result<()> {
        match target {
            Value::Table(t) => {
                t.set(key, value);
                Ok(())
            }
            other => Err(ScriptError::Operation {
                op: "index",
                kind: other.type_name(),
            }),
        }
    }

    /// Indexing with single-level `__index` dispatch: a raw table hit wins,
    /// otherwise the metatable's handler is consulted once.
    fn index(&mut self, target: &Value, key: &TableKey) -> Result<Value> {
        let metatable = match target {
            Value::Table(t) => {
                let raw = t.get(key);
                if !raw.is_nil() {
                    return Ok(raw);
                }
                match t.metatable() {
                    Some(mt) => mt,
                    None => return Ok(Value::Nil),
                }
            }
            Value::UserData(u) => u.metatable().ok_or(ScriptError::Operation {
                op: "index",
                kind: "userdata",
            })?,
            other => {
                return Err(ScriptError::Operation {
                    op: "index",
                    kind: other.type_name(),
                });
            }
        };

        match metatable.get_str("__index") {
            Value::Table(handler) => Ok(handler.get(key)),
            Value::Function(handler) => {
                self.push_function(handler);
                self.push(target.clone());
                self.push(key.to_value());
                self.call(2, 1)?;
                self.pop_value()
            }
            Value::Nil if matches!(target, Value::Table(_)) => Ok(Value::Nil),
            _ => Err(ScriptError::Operation {
                op: "index",
                kind: target.type_name(),
            }),
        }
    }

    // ==========================================================================
    // Metatables and userdata
    // ==========================================================================

    /// Push the metatable of the value at `idx` if it has one.
    pub fn get_metatable(&mut self, idx: i32) -> bool {
        match self.value(idx).and_then(|v| v.metatable()) {
            Some(mt) => {
                self.push(Value::Table(mt));
                true
            }
            None => false,
        }
    }

    /// Pop a table (or `nil`) and make it the metatable of the value at
    /// `idx`.
    ///
    /// Tables accept any metatable. Userdata accept a tag once; popping
    /// `nil` for userdata leaves it untagged.
    pub fn set_metatable(&mut self, idx: i32) -> Result<()> {
        let target = self.value_or_err(idx)?;
        let metatable = match self.pop_value()? {
            Value::Table(mt) => Some(mt),
            Value::Nil => None,
            other => {
                return Err(ScriptError::runtime(format!(
                    "metatable must be a table or nil, got {}",
                    other.type_name()
                )));
            }
        };
        match (target, metatable) {
            (Value::Table(t), mt) => {
                t.borrow_mut().set_metatable(mt);
                Ok(())
            }
            (Value::UserData(u), Some(mt)) => u.borrow_mut().set_metatable(mt),
            (Value::UserData(_), None) => Ok(()),
            (other, _) => Err(ScriptError::runtime(format!(
                "cannot set the metatable of a {} value",
                other.type_name()
            ))),
        }
    }

    /// Push a new untagged raw userdata block of exactly `size` bytes.
    pub fn new_userdata(&mut self, size: usize) -> UserDataRef {
        let userdata = UserDataRef::new(UserData::raw(size));
        self.push(Value::UserData(userdata.clone()));
        userdata
    }

    /// Push a new untagged typed userdata block holding `value`.
    pub fn new_typed_userdata<T: 'static>(&mut self, value: T) -> UserDataRef {
        let userdata = UserDataRef::new(UserData::typed(value));
        self.push(Value::UserData(userdata.clone()));
        userdata
    }

    // ==========================================================================
    // Calls
    // ==========================================================================

    /// Absolute position of the function slot for a call with `nargs`.
    fn function_slot(&self, nargs: usize) -> Result<usize> {
        let available = self.stack.len() - self.base();
        if nargs + 1 > available {
            return Err(ScriptError::InvalidIndex {
                index: -(nargs as i32 + 1),
            });
        }
        Ok(self.stack.len() - nargs - 1)
    }

    /// Call the function below the top `nargs` values.
    ///
    /// The function and its arguments are replaced by its results,
    /// adjusted to `nresults` (padding with `nil`), or all of them for
    /// [`MULTRET`]. On error the function slot and everything above it is
    /// discarded.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn call(&mut self, nargs: usize, nresults: i32) -> Result<()> {
        let func_pos = self.function_slot(nargs)?;
        let function = match &self.stack[func_pos] {
            Value::Function(f) => f.clone(),
            other => {
                return Err(ScriptError::Operation {
                    op: "call",
                    kind: other.type_name(),
                });
            }
        };
        // The host frame does not count toward the nesting limit.
        if self.frames.len() > self.config.max_call_depth {
            return Err(ScriptError::stack_overflow("too many nested native calls"));
        }
        self.check_stack(self.config.min_stack)?;

        trace!(function = function.name(), nargs, "native call");
        self.frames.push(CallFrame {
            base: func_pos + 1,
            function: Some(function.clone()),
        });
        let outcome = function.call(self);
        self.frames.pop();

        let nret = match outcome {
            Ok(nret) => nret,
            Err(err) => {
                self.stack.truncate(func_pos);
                return Err(err);
            }
        };
        let pushed = self.stack.len().saturating_sub(func_pos + 1);
        if nret > pushed {
            self.stack.truncate(func_pos);
            return Err(ScriptError::runtime(format!(
                "'{}' returned {} results but left {} values on the stack",
                function.name(),
                nret,
                pushed
            )));
        }

        let results = self.stack.split_off(self.stack.len() - nret);
        self.stack.truncate(func_pos);
        if nresults == MULTRET {
            self.stack.extend(results);
        } else {
            let wanted = nresults.max(0) as usize;
            self.stack.extend(results.into_iter().take(wanted));
            let missing = wanted.saturating_sub(nret);
            self.stack
                .extend(std::iter::repeat_n(Value::Nil, missing));
        }
        Ok(())
    }

    /// Protected call: like [`call`](Self::call), but on failure the error
    /// message is left on the stack in place of the function and its
    /// arguments, and the error is returned.
    pub fn pcall(&mut self, nargs: usize, nresults: i32) -> Result<()> {
        let func_pos = self.function_slot(nargs)?;
        match self.call(nargs, nresults) {
            Ok(()) => Ok(()),
            Err(err) => {
                debug!(error = %err, "protected call failed");
                self.stack.truncate(func_pos);
                self.push_string(&err.to_string());
                Err(err)
            }
        }
    }

    // ==========================================================================
    // Error construction
    // ==========================================================================

    /// Name of the native function running in the current frame, or `"?"`
    /// for the host frame.
    pub fn current_function_name(&self) -> &str {
        self.frames
            .last()
            .and_then(|frame| frame.function.as_ref())
            .map_or("?", |f| f.name())
    }

    /// Native call nesting depth (0 in the host frame).
    pub fn call_depth(&self) -> usize {
        self.frames.len() - 1
    }

    /// Build a kind-mismatch error for argument `arg`.
    pub fn type_error(&self, arg: i32, expected: impl Into<String>) -> ScriptError {
        ScriptError::Type {
            position: arg,
            function: self.current_function_name().to_string(),
            expected: expected.into(),
            actual: self.type_name_at(arg),
        }
    }

    /// Build a precondition error for argument `arg`.
    pub fn arg_error(&self, arg: i32, message: impl Into<String>) -> ScriptError {
        ScriptError::Argument {
            position: arg,
            function: self.current_function_name().to_string(),
            message: message.into(),
        }
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for State {
    fn drop(&mut self) {
        debug!(
            registry_entries = self.registry.borrow().entry_count(),
            globals = self.globals.borrow().entry_count(),
            "closing runtime state"
        );
        // Registered metatables reference themselves through `__index`;
        // clearing them breaks the cycles so they can be freed.
        let tables: Vec<TableRef> = self
            .registry
            .borrow()
            .pairs()
            .filter_map(|(_, value)| match value {
                Value::Table(t) => Some(t.clone()),
                _ => None,
            })
            .collect();
        for table in tables {
            if let Ok(mut table) = table.try_borrow_mut() {
                table.clear();
            }
        }
        self.registry.borrow_mut().clear();
        self.globals.borrow_mut().clear();
        self.stack.clear();
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("top", &self.get_top())
            .field("stack_len", &self.stack.len())
            .field("call_depth", &self.call_depth())
            .field("config", &self.config)
            .finish()
    }
}
