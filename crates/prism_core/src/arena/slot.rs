//! # Slot Identifiers
//!
//! A slot id is a lightweight identifier consisting of:
//! - An index into the arena's slot array
//! - A generation counter for safe reuse

use std::fmt;

/// Identifier for a record stored in an [`Arena`](super::Arena).
///
/// The ID is split into two parts:
/// - Lower 32 bits: Index into the slot array
/// - Upper 32 bits: Generation of the slot when the record was inserted
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SlotId(u64);

impl SlotId {
    /// Null/invalid slot ID. Never returned by an arena.
    pub const NULL: Self = Self(u64::MAX);

    /// Creates a slot ID from index and generation.
    #[inline]
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self(((generation as u64) << 32) | (index as u64))
    }

    /// Returns the index portion of the ID.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0 as u32
    }

    /// Returns the generation portion of the ID.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> 32) as u32
    }

    /// Checks if this ID is the null ID.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u64::MAX
    }

    /// Returns the packed 64-bit representation.
    #[inline]
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        self.0
    }
}

impl Default for SlotId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Debug for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("SlotId(null)")
        } else {
            write!(f, "SlotId({}v{})", self.index(), self.generation())
        }
    }
}
