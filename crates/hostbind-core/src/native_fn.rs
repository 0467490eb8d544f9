//! Native function storage and callable trait.

use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::state::State;

/// Plain native function pointer.
///
/// The function reads its arguments from the current frame of `state` and
/// returns how many values it left on top of the stack as results.
pub type RawFn = fn(&mut State) -> Result<usize>;

/// Trait for callable native functions.
///
/// Implemented for every `Fn(&mut State) -> Result<usize>`, so both plain
/// functions and closures with captured host state can be installed.
pub trait NativeCallable {
    /// Call this function with its arguments on the stack of `state`.
    fn call(&self, state: &mut State) -> Result<usize>;
}

impl<F> NativeCallable for F
where
    F: Fn(&mut State) -> Result<usize>,
{
    fn call(&self, state: &mut State) -> Result<usize> {
        (self)(state)
    }
}

/// Type-erased native function value.
///
/// Cloning shares the underlying callable; equality is identity of that
/// callable. The name labels error messages and logs.
pub struct NativeFn {
    name: Rc<str>,
    inner: Rc<dyn NativeCallable>,
}

impl NativeFn {
    /// Wrap a callable under a display name.
    pub fn new<F>(name: &str, f: F) -> Self
    where
        F: NativeCallable + 'static,
    {
        Self {
            name: name.into(),
            inner: Rc::new(f),
        }
    }

    /// Wrap a plain function pointer.
    pub fn from_fn(name: &str, f: RawFn) -> Self {
        Self::new(name, f)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Call this native function directly, bypassing frame setup.
    ///
    /// Prefer [`State::call`], which gives the callee its own frame.
    pub fn call(&self, state: &mut State) -> Result<usize> {
        self.inner.call(state)
    }

    pub fn ptr_eq(&self, other: &NativeFn) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Address of the shared callable, used for identity hashing.
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }
}

impl Clone for NativeFn {
    fn clone(&self) -> Self {
        Self {
            name: Rc::clone(&self.name),
            inner: Rc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
