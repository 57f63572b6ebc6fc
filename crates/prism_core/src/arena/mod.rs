//! # Generational Arena
//!
//! Records live in a dense `Vec` of slots. Freed slots go on a free list
//! and are recycled with a bumped generation, so an old [`SlotId`] that
//! points at a recycled slot is rejected in O(1).

mod slot;
mod store;

pub use slot::SlotId;
pub use store::Arena;
