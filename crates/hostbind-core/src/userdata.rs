//! Runtime-owned userdata blocks.
//!
//! A userdata is a fixed-size block of host memory whose storage belongs to
//! the runtime: it lives as long as some stack slot, table entry or host
//! handle still references it, and is never freed by the host. The host owns
//! the *contents* and decides their layout.
//!
//! Blocks come in two shapes:
//!
//! - **Raw**: exactly `size` zeroed bytes, for hosts that manage layout
//!   themselves.
//! - **Typed**: a boxed Rust value, reachable only through a downcast to its
//!   exact type.
//!
//! The metatable tag can be attached once. After that it is fixed for the
//! block's lifetime.

use std::any::{Any, type_name};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::ptr::NonNull;
use std::rc::Rc;

use crate::error::{Result, ScriptError};
use crate::table::TableRef;

enum Block {
    Raw(Box<[u8]>),
    Typed {
        value: Box<dyn Any>,
        size: usize,
        type_name: &'static str,
    },
}

/// Userdata storage: block plus type tag.
pub struct UserData {
    block: Block,
    metatable: Option<TableRef>,
}

impl UserData {
    /// Allocate a zeroed raw block of exactly `size` bytes.
    pub fn raw(size: usize) -> Self {
        Self {
            block: Block::Raw(vec![0u8; size].into_boxed_slice()),
            metatable: None,
        }
    }

    /// Allocate a typed block holding `value`.
    pub fn typed<T: Any>(value: T) -> Self {
        Self {
            block: Block::Typed {
                value: Box::new(value),
                size: std::mem::size_of::<T>(),
                type_name: type_name::<T>(),
            },
            metatable: None,
        }
    }

    /// Block size in bytes.
    pub fn size(&self) -> usize {
        match &self.block {
            Block::Raw(bytes) => bytes.len(),
            Block::Typed { size, .. } => *size,
        }
    }

    pub fn is_typed(&self) -> bool {
        matches!(self.block, Block::Typed { .. })
    }

    /// Rust type name of a typed block.
    pub fn rust_type_name(&self) -> Option<&'static str> {
        match &self.block {
            Block::Raw(_) => None,
            Block::Typed { type_name, .. } => Some(type_name),
        }
    }

    /// Bytes of a raw block.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.block {
            Block::Raw(bytes) => Some(bytes),
            Block::Typed { .. } => None,
        }
    }

    pub fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        match &mut self.block {
            Block::Raw(bytes) => Some(bytes),
            Block::Typed { .. } => None,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        match &self.block {
            Block::Typed { value, .. } => value.downcast_ref::<T>(),
            Block::Raw(_) => None,
        }
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
        match &mut self.block {
            Block::Typed { value, .. } => value.downcast_mut::<T>(),
            Block::Raw(_) => None,
        }
    }

    /// Address of the block. Stable for the block's lifetime.
    pub fn block_ptr(&self) -> NonNull<u8> {
        match &self.block {
            Block::Raw(bytes) => NonNull::from(&bytes[..]).cast::<u8>(),
            Block::Typed { value, .. } => NonNull::from(&**value).cast::<u8>(),
        }
    }

    pub fn metatable(&self) -> Option<&TableRef> {
        self.metatable.as_ref()
    }

    /// Attach the type tag. Fails if a different tag is already attached.
    pub fn set_metatable(&mut self, metatable: TableRef) -> Result<()> {
        match &self.metatable {
            Some(existing) if existing.ptr_eq(&metatable) => Ok(()),
            Some(_) => Err(ScriptError::runtime(
                "userdata type tag cannot be changed once set",
            )),
            None => {
                self.metatable = Some(metatable);
                Ok(())
            }
        }
    }
}

/// Shared handle to a [`UserData`]. Equality is identity.
#[derive(Clone)]
pub struct UserDataRef(Rc<RefCell<UserData>>);

impl UserDataRef {
    pub fn new(userdata: UserData) -> Self {
        UserDataRef(Rc::new(RefCell::new(userdata)))
    }

    pub fn borrow(&self) -> Ref<'_, UserData> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, UserData> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &UserDataRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the shared cell, used for identity hashing.
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }

    pub fn size(&self) -> usize {
        self.borrow().size()
    }

    /// Address of the block contents.
    pub fn block_ptr(&self) -> NonNull<u8> {
        self.borrow().block_ptr()
    }

    pub fn metatable(&self) -> Option<TableRef> {
        self.borrow().metatable().cloned()
    }

    /// Typed shared view of the block.
    pub fn downcast_ref<T: Any>(&self) -> Option<Ref<'_, T>> {
        Ref::filter_map(self.borrow(), |ud| ud.downcast_ref::<T>()).ok()
    }

    /// Typed exclusive view of the block.
    pub fn downcast_mut<T: Any>(&self) -> Option<RefMut<'_, T>> {
        RefMut::filter_map(self.borrow_mut(), |ud| ud.downcast_mut::<T>()).ok()
    }

    /// Shared view of a raw block's bytes.
    pub fn bytes(&self) -> Option<Ref<'_, [u8]>> {
        Ref::filter_map(self.borrow(), |ud| ud.bytes()).ok()
    }

    /// Exclusive view of a raw block's bytes.
    pub fn bytes_mut(&self) -> Option<RefMut<'_, [u8]>> {
        RefMut::filter_map(self.borrow_mut(), |ud| ud.bytes_mut()).ok()
    }

    /// Number of live references to this block.
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

impl PartialEq for UserDataRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for UserDataRef {}

impl fmt::Debug for UserDataRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ud = self.borrow();
        f.debug_struct("UserDataRef")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("size", &ud.size())
            .field("tagged", &ud.metatable.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Point {
        x: f64,
        y: f64,
    }

    #[test]
    fn raw_block_has_exact_size() {
        let ud = UserDataRef::new(UserData::raw(16));
        assert_eq!(ud.size(), 16);
        assert_eq!(ud.bytes().unwrap().len(), 16);
        assert!(ud.bytes().unwrap().iter().all(|b| *b == 0));
        assert!(ud.downcast_ref::<Point>().is_none());
    }

    #[test]
    fn raw_block_is_writable() {
        let ud = UserDataRef::new(UserData::raw(4));
        ud.bytes_mut().unwrap().copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(&*ud.bytes().unwrap(), &[1, 2, 3, 4]);
    }

    #[test]
    fn typed_block_downcasts() {
        let ud = UserDataRef::new(UserData::typed(Point { x: 1.0, y: 2.0 }));
        assert_eq!(ud.size(), std::mem::size_of::<Point>());
        assert!(ud.borrow().is_typed());
        assert!(ud.borrow().rust_type_name().unwrap().ends_with("Point"));

        ud.downcast_mut::<Point>().unwrap().x = 5.0;
        assert_eq!(*ud.downcast_ref::<Point>().unwrap(), Point { x: 5.0, y: 2.0 });
        assert!(ud.downcast_ref::<String>().is_none());
        assert!(ud.bytes().is_none());
    }

    #[test]
    fn block_pointer_is_stable() {
        let ud = UserDataRef::new(UserData::raw(8));
        let first = ud.block_ptr();
        let clone = ud.clone();
        assert_eq!(first, clone.block_ptr());
    }

    #[test]
    fn metatable_is_set_once() {
        let ud = UserDataRef::new(UserData::raw(1));
        let meta = TableRef::new();
        ud.borrow_mut().set_metatable(meta.clone()).unwrap();
        ud.borrow_mut().set_metatable(meta.clone()).unwrap();
        assert!(ud.borrow_mut().set_metatable(TableRef::new()).is_err());
        assert!(ud.metatable().unwrap().ptr_eq(&meta));
    }

    #[test]
    fn identity() {
        let a = UserDataRef::new(UserData::raw(1));
        let b = UserDataRef::new(UserData::raw(1));
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(a.ref_count(), 1);
    }
}
