//! Associative tables with an optional metatable.
//!
//! Tables are shared through [`TableRef`], a reference-counted handle whose
//! equality is identity. Keys are hashed with `FxHash`; numbers are keyed
//! through `OrderedFloat` so `1` and `1.0` address the same slot.

use std::cell::{BorrowMutError, Ref, RefCell, RefMut};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;

use crate::error::{Result, ScriptError};
use crate::value::{LightUserData, Value};

/// A hashable table key.
///
/// Reference-typed keys hash and compare by address; the key keeps the
/// referent alive so the address cannot be reused while it is stored.
#[derive(Clone)]
pub enum TableKey {
    Boolean(bool),
    Number(OrderedFloat<f64>),
    String(Rc<str>),
    LightUserData(LightUserData),
    Reference { addr: usize, value: Value },
}

impl TableKey {
    /// Convert a value into a key. `nil` and NaN cannot be keys.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Nil => Err(ScriptError::runtime("table index is nil")),
            Value::Boolean(b) => Ok(TableKey::Boolean(*b)),
            Value::Number(n) if n.is_nan() => Err(ScriptError::runtime("table index is NaN")),
            // -0.0 and 0.0 must land in the same slot.
            Value::Number(n) => Ok(TableKey::Number(OrderedFloat(*n + 0.0))),
            Value::String(s) => Ok(TableKey::String(Rc::clone(s))),
            Value::LightUserData(p) => Ok(TableKey::LightUserData(*p)),
            Value::Table(t) => Ok(TableKey::Reference {
                addr: t.addr(),
                value: value.clone(),
            }),
            Value::UserData(u) => Ok(TableKey::Reference {
                addr: u.addr(),
                value: value.clone(),
            }),
            Value::Function(f) => Ok(TableKey::Reference {
                addr: f.addr(),
                value: value.clone(),
            }),
        }
    }

    /// The key as a value.
    pub fn to_value(&self) -> Value {
        match self {
            TableKey::Boolean(b) => Value::Boolean(*b),
            TableKey::Number(n) => Value::Number(n.0),
            TableKey::String(s) => Value::String(Rc::clone(s)),
            TableKey::LightUserData(p) => Value::LightUserData(*p),
            TableKey::Reference { value, .. } => value.clone(),
        }
    }

    /// The key as a string slice, for string keys.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TableKey::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for TableKey {
    fn from(value: &str) -> Self {
        TableKey::String(value.into())
    }
}

impl From<i64> for TableKey {
    fn from(value: i64) -> Self {
        TableKey::Number(OrderedFloat(value as f64))
    }
}

impl PartialEq for TableKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TableKey::Boolean(a), TableKey::Boolean(b)) => a == b,
            (TableKey::Number(a), TableKey::Number(b)) => a == b,
            (TableKey::String(a), TableKey::String(b)) => a == b,
            (TableKey::LightUserData(a), TableKey::LightUserData(b)) => a == b,
            (TableKey::Reference { addr: a, .. }, TableKey::Reference { addr: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for TableKey {}

impl Hash for TableKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            TableKey::Boolean(b) => b.hash(state),
            TableKey::Number(n) => n.hash(state),
            TableKey::String(s) => s.hash(state),
            TableKey::LightUserData(p) => p.hash(state),
            TableKey::Reference { addr, .. } => addr.hash(state),
        }
    }
}

impl fmt::Debug for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_value())
    }
}

/// Table storage.
#[derive(Default)]
pub struct Table {
    entries: FxHashMap<TableKey, Value>,
    metatable: Option<TableRef>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table with room for `narr` sequence entries and `nrec`
    /// named entries.
    pub fn with_capacity(narr: usize, nrec: usize) -> Self {
        Self {
            entries: FxHashMap::with_capacity_and_hasher(narr + nrec, Default::default()),
            metatable: None,
        }
    }

    /// Raw lookup; absent keys read as `nil`.
    pub fn get(&self, key: &TableKey) -> Value {
        self.entries.get(key).cloned().unwrap_or_default()
    }

    /// Raw lookup by string key.
    pub fn get_str(&self, key: &str) -> Value {
        self.get(&TableKey::from(key))
    }

    /// Raw assignment. Assigning `nil` removes the entry.
    pub fn set(&mut self, key: TableKey, value: Value) {
        if value.is_nil() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, value);
        }
    }

    /// Number of non-nil entries.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Length of the sequence part: the border `n` such that `t[n]` is
    /// non-nil and `t[n + 1]` is nil, counting from 1. Linear in `n`.
    pub fn len(&self) -> usize {
        let mut n = 0;
        while self.entries.contains_key(&TableKey::from(n as i64 + 1)) {
            n += 1;
        }
        n
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate all entries in unspecified order.
    pub fn pairs(&self) -> impl Iterator<Item = (&TableKey, &Value)> {
        self.entries.iter()
    }

    /// String keys in unspecified order.
    pub fn string_keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().filter_map(TableKey::as_str)
    }

    pub fn metatable(&self) -> Option<&TableRef> {
        self.metatable.as_ref()
    }

    pub fn set_metatable(&mut self, metatable: Option<TableRef>) {
        self.metatable = metatable;
    }

    /// Remove every entry and the metatable.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.metatable = None;
    }
}

/// Shared handle to a [`Table`]. Equality is identity.
#[derive(Clone, Default)]
pub struct TableRef(Rc<RefCell<Table>>);

impl TableRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_table(table: Table) -> Self {
        TableRef(Rc::new(RefCell::new(table)))
    }

    pub fn borrow(&self) -> Ref<'_, Table> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Table> {
        self.0.borrow_mut()
    }

    pub fn try_borrow_mut(&self) -> std::result::Result<RefMut<'_, Table>, BorrowMutError> {
        self.0.try_borrow_mut()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &TableRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the shared table, stable for the table's lifetime.
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub fn get(&self, key: &TableKey) -> Value {
        self.borrow().get(key)
    }

    pub fn get_str(&self, key: &str) -> Value {
        self.borrow().get_str(key)
    }

    pub fn set(&self, key: TableKey, value: Value) {
        self.borrow_mut().set(key, value);
    }

    pub fn metatable(&self) -> Option<TableRef> {
        self.borrow().metatable().cloned()
    }
}

impl PartialEq for TableRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for TableRef {}

impl fmt::Debug for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.borrow();
        f.debug_struct("TableRef")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("entries", &table.entry_count())
            .field("has_metatable", &table.metatable.is_some())
            .finish()
    }
}
