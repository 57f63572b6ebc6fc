//! # Visibility Culling
//!
//! Per-instance bounding spheres tested against the camera frustum or the
//! light's oriented box. Culling runs in two steps per mesh:
//!
//! 1. [`VisibilityCuller::classify`] writes the pass's visibility flag on
//!    every live instance.
//! 2. [`VisibilityCuller::pack`] writes the flagged instances, in slot
//!    order, into the mesh's instance buffer and stops at capacity.

mod culler;

pub use culler::{CullPass, CullVolume, PackOutcome, VisibilityCuller};
