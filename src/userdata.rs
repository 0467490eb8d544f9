//! Typed userdata: named types, tagged instances and identity checks.
//!
//! A userdata type is a metatable stored in the registry under the type's
//! name. Instances are runtime-owned blocks tagged with that metatable when
//! they are created, so the question "is this value a `Point`?" is answered by
//! comparing the value's metatable with `registry["Point"]` by reference. A
//! metatable is only reachable through the registry and the instances
//! themselves, so a script cannot forge the tag of another type.
//!
//! ```text
//! registry
//! └── "Point" ──► metatable ◄─────────────┐
//!                 ├── __index ─────────────┘   (methods resolve on the
//!                 ├── __name = "Point"          metatable itself)
//!                 └── length = <native fn>
//!
//! instance (userdata block) ── tag ──► metatable
//! ```
//!
//! Registration is additive: registering a name again reuses the existing
//! metatable and merges the new methods into it. Nothing is ever removed.
//!
//! # Raw and Typed Instances
//!
//! [`new_instance`] allocates a zeroed raw block of an exact size for hosts
//! that manage the layout themselves. The typed layer ([`NativeType`],
//! [`new_typed`], [`check_typed`]) stores a Rust value instead and hands it
//! back through [`Instance`] borrows.
//!
//! Positions in errors raised by host-side calls (`register_type`,
//! `new_instance`) count the parameters after `state`, starting at 1.

use std::cell::{Ref, RefMut};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use hostbind_core::{
    NativeFn, Result, ScriptError, State, TableRef, TypeHash, UserDataRef, Value, ValueKind,
};

use crate::library::Reg;

/// Metatable field holding the lookup handler.
pub const INDEX_FIELD: &str = "__index";

/// Metatable field holding the type name.
pub const NAME_FIELD: &str = "__name";

// =============================================================================
// TYPE HANDLES
// =============================================================================

/// Host-side handle to a registered userdata type.
///
/// Two handles are equal when they refer to the same metatable under the
/// same name. Handles hash by their [`TypeHash`], so they key host-side maps
/// of per-type data directly.
#[derive(Clone)]
pub struct TypeHandle {
    name: Rc<str>,
    hash: TypeHash,
    metatable: TableRef,
}

impl TypeHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash(&self) -> TypeHash {
        self.hash
    }

    pub fn metatable(&self) -> &TableRef {
        &self.metatable
    }

    /// True if `userdata` is tagged with this type.
    pub fn matches(&self, userdata: &UserDataRef) -> bool {
        userdata
            .metatable()
            .is_some_and(|mt| mt.ptr_eq(&self.metatable))
    }
}

impl PartialEq for TypeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.metatable.ptr_eq(&other.metatable)
    }
}

impl Eq for TypeHandle {}

impl Hash for TypeHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeHandle")
            .field("name", &self.name)
            .field("hash", &self.hash)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// REGISTRATION
// =============================================================================

/// The registry metatable for `name`, created if absent.
fn ensure_metatable(state: &State, name: &str) -> Result<(TableRef, bool)> {
    match state.registry().get_str(name) {
        Value::Table(metatable) => Ok((metatable, false)),
        Value::Nil => {
            let metatable = TableRef::new();
            state
                .registry()
                .set(name.into(), Value::Table(metatable.clone()));
            Ok((metatable, true))
        }
        other => Err(ScriptError::runtime(format!(
            "registry entry '{}' is a {}, not a metatable",
            name,
            other.type_name()
        ))),
    }
}

/// Push the metatable registered as `name`, creating an empty one first if
/// there is none. Returns whether it was created.
pub fn new_metatable(state: &mut State, name: &str) -> Result<bool> {
    let (metatable, created) = ensure_metatable(state, name)?;
    state.push(metatable);
    Ok(created)
}

/// Push `registry[name]`, `nil` when nothing is registered under it.
pub fn get_metatable_named(state: &mut State, name: &str) -> ValueKind {
    let value = state.registry().get_str(name);
    let kind = value.kind();
    state.push(value);
    kind
}

/// Handle to the type registered as `name`.
pub fn type_handle(state: &State, name: &str) -> Option<TypeHandle> {
    match state.registry().get_str(name) {
        Value::Table(metatable) => Some(TypeHandle {
            name: name.into(),
            hash: TypeHash::from_name(name),
            metatable,
        }),
        _ => None,
    }
}

/// Register the userdata type `name` with the given methods.
///
/// The metatable gets `__index` pointing at itself and `__name` set to
/// `name`, then every method is stored under its name. Registering an
/// existing name reuses its metatable: earlier methods stay and
/// same-named ones are replaced. The stack is left unchanged.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn register_type(state: &mut State, name: &str, methods: &[Reg]) -> Result<TypeHandle> {
    if name.is_empty() {
        return Err(state.arg_error(1, "type name must not be empty"));
    }
    let (metatable, created) = ensure_metatable(state, name)?;
    let hash = TypeHash::from_name(name);
    {
        let mut entries = metatable.borrow_mut();
        entries.set(INDEX_FIELD.into(), Value::Table(metatable.clone()));
        entries.set(NAME_FIELD.into(), Value::String(name.into()));
        for method in methods {
            let func = NativeFn::from_fn(method.name, method.func);
            entries.set(method.name.into(), Value::Function(func));
        }
    }
    debug!(
        type_name = name,
        %hash,
        created,
        methods = methods.len(),
        "registered userdata type"
    );
    Ok(TypeHandle {
        name: name.into(),
        hash,
        metatable,
    })
}

// =============================================================================
// INSTANCES
// =============================================================================

/// Push a new zeroed instance of `name` holding exactly `size` bytes.
///
/// Fails for a zero size and for names that were never registered; in both
/// cases nothing is pushed.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn new_instance(state: &mut State, name: &str, size: usize) -> Result<UserDataRef> {
    let handle = registered(state, name)?;
    new_instance_of(state, &handle, size)
}

/// [`new_instance`] for an already resolved type.
pub fn new_instance_of(state: &mut State, handle: &TypeHandle, size: usize) -> Result<UserDataRef> {
    if size == 0 {
        return Err(state.arg_error(2, "userdata size must be positive"));
    }
    state.check_stack(1)?;
    let userdata = state.new_userdata(size);
    userdata.borrow_mut().set_metatable(handle.metatable.clone())?;
    trace!(type_name = handle.name(), size, "allocated userdata instance");
    Ok(userdata)
}

fn registered(state: &State, name: &str) -> Result<TypeHandle> {
    type_handle(state, name).ok_or_else(|| {
        warn!(type_name = name, "instance requested for unregistered type");
        ScriptError::UnregisteredType {
            name: name.to_string(),
        }
    })
}

/// True if the value at `idx` carries the metatable registered as `name`.
///
/// Never fails and leaves the stack as it found it. Values without a
/// metatable and names that were never registered give `false`.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn is_type(state: &mut State, idx: i32, name: &str) -> bool {
    if !state.is_valid(idx) {
        return false;
    }
    let idx = state.abs_index(idx);
    if !state.get_metatable(idx) {
        return false;
    }
    get_metatable_named(state, name);
    let same = state.raw_equal(-1, -2);
    state.pop(2);
    same
}

/// True if the value at `idx` is tagged with `handle`'s type.
pub fn is_instance_of(state: &State, idx: i32, handle: &TypeHandle) -> bool {
    state
        .value(idx)
        .and_then(|value| value.metatable())
        .is_some_and(|mt| mt.ptr_eq(&handle.metatable))
}

/// Address of the block behind the userdata at `idx`.
///
/// Full userdata give their block address, light userdata their own
/// address. The type tag is not checked; pair with [`is_type`] or use
/// [`check_instance`] when the type matters.
pub fn to_pointer(state: &State, idx: i32) -> Result<NonNull<u8>> {
    match state.value(idx) {
        Some(Value::UserData(userdata)) => Ok(userdata.block_ptr()),
        Some(Value::LightUserData(p)) => {
            NonNull::new(p.addr() as *mut u8).ok_or_else(|| state.type_error(idx, "userdata"))
        }
        _ => Err(state.type_error(idx, "userdata")),
    }
}

/// Argument `arg` as an instance of `name`; fails with a type error naming
/// `name` otherwise.
pub fn check_instance(state: &mut State, arg: i32, name: &str) -> Result<UserDataRef> {
    if is_type(state, arg, name) {
        if let Some(userdata) = state.to_userdata(arg) {
            return Ok(userdata);
        }
    }
    Err(state.type_error(arg, name))
}

/// `default` for absent or `nil` arguments, otherwise as
/// [`check_instance`].
pub fn opt_instance(
    state: &mut State,
    arg: i32,
    name: &str,
    default: Option<UserDataRef>,
) -> Result<Option<UserDataRef>> {
    if state.is_none_or_nil(arg) {
        Ok(default)
    } else {
        check_instance(state, arg, name).map(Some)
    }
}

/// Call `method` on the instance at `idx` with the `nargs` values on top of
/// the stack as extra arguments, as `obj:method(...)` would.
///
/// The method and its arguments are replaced by `nresults` results.
pub fn invoke_method(
    state: &mut State,
    idx: i32,
    method: &str,
    nargs: usize,
    nresults: i32,
) -> Result<()> {
    let receiver = state.value(idx).ok_or(ScriptError::InvalidIndex { index: idx })?;
    if nargs as i32 > state.get_top() {
        return Err(ScriptError::InvalidIndex {
            index: -(nargs as i32),
        });
    }
    let kind = state.get_field(idx, method)?;
    if kind != ValueKind::Function {
        state.pop(1);
        return Err(ScriptError::runtime(format!(
            "method '{}' is not callable (got {})",
            method,
            kind.name()
        )));
    }
    let below_args = -(nargs as i32) - 1;
    state.insert(below_args)?;
    state.push(receiver);
    state.insert(below_args)?;
    state.call(nargs + 1, nresults)
}

// =============================================================================
// TYPED LAYER
// =============================================================================

/// A Rust type exposed to scripts as a userdata type.
///
/// ```
/// use hostbind::prelude::*;
///
/// struct Counter(u32);
///
/// impl NativeType for Counter {
///     const NAME: &'static str = "Counter";
/// }
///
/// let mut state = State::new();
/// register_class::<Counter>(&mut state).unwrap();
/// let counter = new_typed(&mut state, Counter(1)).unwrap();
/// counter.borrow_mut().0 += 1;
/// assert_eq!(counter.borrow().0, 2);
/// assert!(is_type(&mut state, -1, "Counter"));
/// ```
pub trait NativeType: 'static {
    /// Registry name of this type.
    const NAME: &'static str;

    /// Methods installed by [`register_class`].
    fn methods() -> &'static [Reg] {
        &[]
    }
}

/// Register `T` under [`NativeType::NAME`] with [`NativeType::methods`].
pub fn register_class<T: NativeType>(state: &mut State) -> Result<TypeHandle> {
    register_type(state, T::NAME, T::methods())
}

/// Push a new instance of `T` holding `value`.
pub fn new_typed<T: NativeType>(state: &mut State, value: T) -> Result<Instance<T>> {
    let handle = registered(state, T::NAME)?;
    state.check_stack(1)?;
    let userdata = state.new_typed_userdata(value);
    userdata.borrow_mut().set_metatable(handle.metatable)?;
    trace!(type_name = T::NAME, "allocated typed userdata instance");
    Ok(Instance::new(userdata))
}

/// Argument `arg` as an instance of `T`.
///
/// A raw block tagged with `T`'s name is rejected like any other mismatch.
pub fn check_typed<T: NativeType>(state: &mut State, arg: i32) -> Result<Instance<T>> {
    let userdata = check_instance(state, arg, T::NAME)?;
    if userdata.downcast_ref::<T>().is_none() {
        return Err(state.type_error(arg, T::NAME));
    }
    Ok(Instance::new(userdata))
}

/// A userdata known to hold a `T`.
pub struct Instance<T> {
    userdata: UserDataRef,
    _marker: PhantomData<T>,
}

impl<T: NativeType> Instance<T> {
    fn new(userdata: UserDataRef) -> Self {
        Self {
            userdata,
            _marker: PhantomData,
        }
    }

    /// Shared view of the value. Panics if the value is mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.userdata
            .downcast_ref::<T>()
            .expect("typed instance holds its type")
    }

    /// Exclusive view of the value. Panics if the value is borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.userdata
            .downcast_mut::<T>()
            .expect("typed instance holds its type")
    }

    pub fn userdata(&self) -> &UserDataRef {
        &self.userdata
    }

    pub fn into_userdata(self) -> UserDataRef {
        self.userdata
    }

    /// Push the instance onto the stack.
    pub fn push(&self, state: &mut State) {
        state.push(self.userdata.clone());
    }
}

impl<T> Clone for Instance<T> {
    fn clone(&self) -> Self {
        Self {
            userdata: self.userdata.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: NativeType> fmt::Debug for Instance<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &T::NAME)
            .field("userdata", &self.userdata)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostbind_core::REGISTRY_INDEX;

    fn length(state: &mut State) -> Result<usize> {
        let userdata = check_instance(state, 1, "Point")?;
        state.push_integer(userdata.size() as i64);
        Ok(1)
    }

    fn scale(state: &mut State) -> Result<usize> {
        check_instance(state, 1, "Point")?;
        let factor = crate::marshal::check_number(state, 2)?;
        state.push_number(factor * 2.0);
        Ok(1)
    }

    const POINT_METHODS: &[Reg] = &[Reg::new("length", length), Reg::new("scale", scale)];

    #[test]
    fn registration_is_idempotent_in_identity() {
        let mut state = State::new();
        let first = register_type(&mut state, "Point", POINT_METHODS).unwrap();
        let second = register_type(&mut state, "Point", &[]).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.hash(), TypeHash::from_name("Point"));
        assert_eq!(state.get_top(), 0);
    }

    #[test]
    fn metatable_layout() {
        let mut state = State::new();
        let handle = register_type(&mut state, "Point", POINT_METHODS).unwrap();
        let mt = handle.metatable();
        match mt.get_str(INDEX_FIELD) {
            Value::Table(index) => assert!(index.ptr_eq(mt)),
            other => panic!("__index should be the metatable, got {:?}", other),
        }
        assert_eq!(mt.get_str(NAME_FIELD), Value::from("Point"));
        match mt.get_str("length") {
            Value::Function(f) => assert_eq!(f.name(), "length"),
            other => panic!("expected method, got {:?}", other),
        }
    }

    #[test]
    fn handles_key_host_side_maps() {
        use std::collections::HashMap;

        let mut state = State::new();
        let point = register_type(&mut state, "Point", &[]).unwrap();
        let vector = register_type(&mut state, "Vector", &[]).unwrap();
        let mut sizes = HashMap::new();
        sizes.insert(point.clone(), 16usize);
        sizes.insert(vector, 24usize);

        let looked_up = type_handle(&state, "Point").unwrap();
        assert_eq!(sizes.get(&looked_up), Some(&16));

        let mut other = State::new();
        let foreign = register_type(&mut other, "Point", &[]).unwrap();
        assert_eq!(foreign.hash(), point.hash());
        assert_ne!(foreign, point);
        assert!(!sizes.contains_key(&foreign));
    }

    #[test]
    fn re_registration_merges_methods() {
        let mut state = State::new();
        register_type(&mut state, "Point", &POINT_METHODS[..1]).unwrap();
        let handle = register_type(&mut state, "Point", &POINT_METHODS[1..]).unwrap();
        let mt = handle.metatable();
        assert!(!mt.get_str("length").is_nil());
        assert!(!mt.get_str("scale").is_nil());
    }

    #[test]
    fn empty_name_is_rejected() {
        let mut state = State::new();
        assert!(register_type(&mut state, "", &[]).unwrap_err().is_argument_error());
    }

    #[test]
    fn non_table_registry_entry_is_an_error() {
        let mut state = State::new();
        state.push_number(1.0);
        state.set_field(REGISTRY_INDEX, "Taken").unwrap();
        assert!(register_type(&mut state, "Taken", &[]).is_err());
    }

    #[test]
    fn new_metatable_reports_creation() {
        let mut state = State::new();
        assert!(new_metatable(&mut state, "T").unwrap());
        assert!(!new_metatable(&mut state, "T").unwrap());
        assert!(state.raw_equal(-1, -2));
        assert_eq!(get_metatable_named(&mut state, "missing"), ValueKind::Nil);
        assert_eq!(state.get_field(REGISTRY_INDEX, "T").unwrap(), ValueKind::Table);
    }

    #[test]
    fn instance_allocation() {
        let mut state = State::new();
        register_type(&mut state, "Point", POINT_METHODS).unwrap();
        let point = new_instance(&mut state, "Point", 16).unwrap();
        assert_eq!(state.get_top(), 1);
        assert_eq!(point.size(), 16);
        assert!(is_type(&mut state, -1, "Point"));
        assert_eq!(state.get_top(), 1);
    }

    #[test]
    fn instance_allocation_failures_push_nothing() {
        let mut state = State::new();
        register_type(&mut state, "Point", &[]).unwrap();
        assert!(new_instance(&mut state, "Point", 0).unwrap_err().is_argument_error());
        assert_eq!(
            new_instance(&mut state, "Vector", 8).unwrap_err(),
            ScriptError::UnregisteredType {
                name: "Vector".into()
            }
        );
        assert_eq!(state.get_top(), 0);
    }

    #[test]
    fn is_type_distinguishes_types_and_kinds() {
        let mut state = State::new();
        register_type(&mut state, "Point", &[]).unwrap();
        register_type(&mut state, "Vector", &[]).unwrap();
        new_instance(&mut state, "Point", 8).unwrap();
        state.push_number(42.0);
        state.new_userdata(8);

        assert!(is_type(&mut state, 1, "Point"));
        assert!(!is_type(&mut state, 1, "Vector"));
        assert!(!is_type(&mut state, 1, "Unregistered"));
        assert!(!is_type(&mut state, 2, "Point"));
        assert!(!is_type(&mut state, 3, "Point"));
        assert!(!is_type(&mut state, 9, "Point"));
        assert_eq!(state.get_top(), 3);
    }

    #[test]
    fn is_type_rejects_indices_below_the_frame() {
        let mut state = State::new();
        register_type(&mut state, "Point", &[]).unwrap();
        new_instance(&mut state, "Point", 8).unwrap();
        assert!(is_type(&mut state, -1, "Point"));
        assert!(!state.is_valid(-3));
        assert!(!is_type(&mut state, -2, "Point"));
        assert!(!is_type(&mut state, -3, "Point"));
        assert!(check_instance(&mut state, -3, "Point").is_err());
        assert_eq!(state.get_top(), 1);
    }

    #[test]
    fn handles_check_identity() {
        let mut state = State::new();
        let point = register_type(&mut state, "Point", &[]).unwrap();
        let vector = register_type(&mut state, "Vector", &[]).unwrap();
        let instance = new_instance_of(&mut state, &point, 4).unwrap();
        assert!(point.matches(&instance));
        assert!(!vector.matches(&instance));
        assert!(is_instance_of(&state, -1, &point));
        assert!(!is_instance_of(&state, -1, &vector));
    }

    #[test]
    fn pointers() {
        let mut state = State::new();
        register_type(&mut state, "Point", &[]).unwrap();
        let point = new_instance(&mut state, "Point", 16).unwrap();
        assert_eq!(to_pointer(&state, -1).unwrap(), point.block_ptr());

        state.push_number(42.0);
        assert!(to_pointer(&state, -1).unwrap_err().is_type_error());

        let marker = 7u32;
        state.push_light_userdata(hostbind_core::LightUserData::from_ptr(&marker));
        assert_eq!(
            to_pointer(&state, -1).unwrap().as_ptr() as usize,
            &marker as *const u32 as usize
        );
        state.push_light_userdata(hostbind_core::LightUserData::null());
        assert!(to_pointer(&state, -1).is_err());
    }

    #[test]
    fn check_and_opt_instance() {
        let mut state = State::new();
        register_type(&mut state, "Point", &[]).unwrap();
        register_type(&mut state, "Vector", &[]).unwrap();
        let point = new_instance(&mut state, "Point", 8).unwrap();
        state.push_nil();

        assert!(check_instance(&mut state, 1, "Point").unwrap().ptr_eq(&point));
        let err = check_instance(&mut state, 1, "Vector").unwrap_err();
        assert!(err.to_string().contains("Vector expected, got userdata"));

        assert!(opt_instance(&mut state, 2, "Point", None).unwrap().is_none());
        let fallback = opt_instance(&mut state, 3, "Point", Some(point.clone())).unwrap();
        assert!(fallback.unwrap().ptr_eq(&point));
        assert!(opt_instance(&mut state, 1, "Vector", None).is_err());
    }

    #[test]
    fn tables_tagged_with_a_type_are_not_instances() {
        let mut state = State::new();
        let handle = register_type(&mut state, "Point", &[]).unwrap();
        let table = state.new_table();
        table.borrow_mut().set_metatable(Some(handle.metatable().clone()));
        assert!(is_type(&mut state, -1, "Point"));
        assert!(check_instance(&mut state, -1, "Point").is_err());
    }

    #[test]
    fn methods_dispatch_through_index() {
        let mut state = State::new();
        register_type(&mut state, "Point", POINT_METHODS).unwrap();
        new_instance(&mut state, "Point", 24).unwrap();

        invoke_method(&mut state, 1, "length", 0, 1).unwrap();
        assert_eq!(state.to_integer(-1), Some(24));
        state.pop(1);

        state.push_number(1.5);
        invoke_method(&mut state, 1, "scale", 1, 1).unwrap();
        assert_eq!(state.to_number(-1), Some(3.0));
        assert_eq!(state.get_top(), 2);
    }

    #[test]
    fn missing_methods_are_reported() {
        let mut state = State::new();
        register_type(&mut state, "Point", POINT_METHODS).unwrap();
        new_instance(&mut state, "Point", 8).unwrap();
        let err = invoke_method(&mut state, -1, "rotate", 0, 0).unwrap_err();
        assert!(err.to_string().contains("rotate"));
        assert_eq!(state.get_top(), 1);
    }

    #[test]
    fn too_many_method_arguments_leave_the_stack_alone() {
        let mut state = State::new();
        register_type(&mut state, "Point", POINT_METHODS).unwrap();
        new_instance(&mut state, "Point", 8).unwrap();
        state.push_number(2.0);
        let err = invoke_method(&mut state, 1, "scale", 5, 1).unwrap_err();
        assert!(matches!(err, ScriptError::InvalidIndex { .. }));
        assert_eq!(state.get_top(), 2);
        assert!(state.is_number(2));
    }

    #[test]
    fn methods_check_their_receiver() {
        let mut state = State::new();
        register_type(&mut state, "Point", POINT_METHODS).unwrap();
        state.push_fn("length", length);
        state.push_number(3.0);
        let err = state.pcall(1, 1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "bad argument #1 to 'length' (Point expected, got number)"
        );
    }

    #[derive(Debug, PartialEq)]
    struct Vec2 {
        x: f64,
        y: f64,
    }

    fn vec2_len(state: &mut State) -> Result<usize> {
        let v = check_typed::<Vec2>(state, 1)?;
        let v = v.borrow();
        state.push_number((v.x * v.x + v.y * v.y).sqrt());
        Ok(1)
    }

    impl NativeType for Vec2 {
        const NAME: &'static str = "Vec2";

        fn methods() -> &'static [Reg] {
            const METHODS: &[Reg] = &[Reg::new("len", vec2_len)];
            METHODS
        }
    }

    #[test]
    fn typed_instances() {
        let mut state = State::new();
        assert!(new_typed(&mut state, Vec2 { x: 0.0, y: 0.0 }).is_err());

        register_class::<Vec2>(&mut state).unwrap();
        let v = new_typed(&mut state, Vec2 { x: 3.0, y: 0.0 }).unwrap();
        v.borrow_mut().y = 4.0;
        assert!(is_type(&mut state, -1, "Vec2"));

        invoke_method(&mut state, -1, "len", 0, 1).unwrap();
        assert_eq!(state.to_number(-1), Some(5.0));

        let checked = check_typed::<Vec2>(&mut state, 1).unwrap();
        assert_eq!(*checked.borrow(), Vec2 { x: 3.0, y: 4.0 });
    }

    #[test]
    fn raw_block_with_typed_name_is_rejected() {
        let mut state = State::new();
        register_class::<Vec2>(&mut state).unwrap();
        new_instance(&mut state, Vec2::NAME, 16).unwrap();
        assert!(check_typed::<Vec2>(&mut state, 1).unwrap_err().is_type_error());
    }
}
