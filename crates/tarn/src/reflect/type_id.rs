//! Runtime type ids shared between native registration and scripts.
//!
//! `std::any::TypeId` is opaque and unstable across builds, so it cannot be
//! handed to a script. A [`RuntimeTypeId`] is the 32-bit FNV-1a hash of the
//! type's reflected name: stable, printable and computable at compile time.

use std::fmt;

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Stable identifier of a reflected component or event type.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuntimeTypeId(pub u32);

impl RuntimeTypeId {
    /// FNV-1a over the UTF-8 bytes of `name`.
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = FNV_OFFSET;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u32;
            hash = hash.wrapping_mul(FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    pub const fn of<T: Reflect>() -> Self {
        T::TYPE_ID
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for RuntimeTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RuntimeTypeId({:#010x})", self.0)
    }
}

impl fmt::Display for RuntimeTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// A type reachable through the reflection bridge.
///
/// `TYPE_NAME` is what scripts see (the descriptor table's global name);
/// keep it unique across every reflected type.
pub trait Reflect: 'static {
    const TYPE_NAME: &'static str;
    const TYPE_ID: RuntimeTypeId = RuntimeTypeId::from_name(Self::TYPE_NAME);
}
