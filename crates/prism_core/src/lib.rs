//! # PRISM Core
//!
//! Handle storage shared by the rendering crate:
//! - Generational arena with a free list
//! - O(1) stale-handle detection without scanning
//! - Stable iteration order (slot index order)
//!
//! ## Example
//!
//! ```rust
//! use prism_core::Arena;
//!
//! let mut arena: Arena<&str> = Arena::new();
//! let id = arena.insert("cube");
//! assert!(arena.contains(id));
//!
//! arena.remove(id);
//! assert!(!arena.contains(id));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod arena;

pub use arena::{Arena, SlotId};
