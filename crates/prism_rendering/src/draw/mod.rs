//! # Draw Coordination
//!
//! Frame order:
//!
//! ```text
//! begin_scene          upload + bind frame constants (slot 0)
//! render_shadow_pass   front-face cull, light box, shadow indices
//! render_meshes_by_material
//!   per material       bind program, upload + bind constants
//!     per mesh         radii -> cull -> pack -> draw
//!   debug overlay      debug program, redraw packed set
//! end_scene            meshes back to idle
//! ```

mod coordinator;
mod frame;
mod raster;
mod shadow;
mod stats;

pub use coordinator::DrawCoordinator;
pub use frame::{FrameConstants, FRAME_CONSTANT_SLOT};
pub use raster::RasterScope;
pub use shadow::ShadowVolume;
pub use stats::DrawStats;
