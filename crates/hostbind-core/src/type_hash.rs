//! Deterministic hash labels for registered userdata types.
//!
//! [`TypeHash`] is a 64-bit XXHash of a type name mixed with a domain
//! constant. It is stable across runs and states, which makes it the key
//! hosts use for per-type data in their own maps.
//!
//! Hashes are *labels*, not identities. Userdata type identity is decided by
//! metatable reference equality; two states registering `Point` get the same
//! hash but different metatables.
//!
//! # Examples
//!
//! ```
//! use hostbind_core::TypeHash;
//!
//! let point = TypeHash::from_name("Point");
//! assert_eq!(point, TypeHash::from_name("Point"));
//! assert_ne!(point, TypeHash::from_name("Vector"));
//! ```

use std::fmt;
use xxhash_rust::xxh64::xxh64;

/// Domain-specific mixing constants for hash computation.
pub mod hash_constants {
    /// Domain marker for type hashes
    pub const TYPE: u64 = 0x2fac10b63a6cc57c;
}

/// A deterministic 64-bit hash labelling a registered type name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct TypeHash(pub u64);

impl TypeHash {
    /// Empty/invalid hash constant.
    pub const EMPTY: TypeHash = TypeHash(0);

    /// Create a type hash from a registered type name.
    #[inline]
    pub fn from_name(name: &str) -> Self {
        TypeHash(hash_constants::TYPE ^ xxh64(name.as_bytes(), 0))
    }

    /// Check if this is an empty/invalid hash.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Get the underlying u64 value.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeHash({:#018x})", self.0)
    }
}

impl fmt::Display for TypeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}
