//! # Instances
//!
//! Per-mesh instance storage and the handles the scene layer holds.
//!
//! Records live in an [`InstanceStore`], a generational arena, so a handle
//! to a destroyed instance is detected in O(1) and never aliases a newer
//! instance that reused the slot.

mod data;
mod handle;
mod store;

pub use data::{InstanceData, InstanceRecord, VisibilityData};
pub use handle::InstanceHandle;
pub use store::InstanceStore;
