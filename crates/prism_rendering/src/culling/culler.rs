//! Sphere-based visibility classification and instance packing.

use tracing::warn;

use crate::buffer::{GpuInstance, MappedInstances, Push};
use crate::config::DegeneratePolicy;
use crate::error::DeviceError;
use crate::instance::{InstanceRecord, InstanceStore};
use crate::math::{Frustum, NormalMatrix, OrientedBox};

/// The volume instances are tested against.
#[derive(Debug, Clone, Copy)]
pub enum CullVolume<'a> {
    /// Camera frustum.
    Frustum(&'a Frustum),
    /// Light's oriented box, for shadow casters.
    LightBox(&'a OrientedBox),
    /// No test; every instance is visible to the camera.
    Everything,
}

/// Which visibility flag a volume writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullPass {
    /// Main camera pass.
    Camera,
    /// Shadow pass.
    Light,
}

impl CullVolume<'_> {
    /// The pass this volume belongs to.
    #[must_use]
    pub const fn pass(&self) -> CullPass {
        match self {
            Self::Frustum(_) | Self::Everything => CullPass::Camera,
            Self::LightBox(_) => CullPass::Light,
        }
    }

    fn admits(&self, record: &InstanceRecord) -> bool {
        match self {
            Self::Frustum(frustum) => frustum.intersects_sphere(&record.bounding_sphere()),
            Self::LightBox(light) => light.intersects_sphere(&record.bounding_sphere()),
            Self::Everything => true,
        }
    }
}

/// What a pack wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackOutcome {
    /// Records written to the instance buffer.
    pub visible: u32,
    /// More instances passed than the buffer could hold.
    pub overflowed: bool,
    /// Instances with a near-singular transform. Packed with a fallback
    /// normal matrix or left out, depending on the policy. An instance
    /// dropped by an overflow is not counted.
    pub degenerate: u32,
}

/// Classifies instances against a volume and packs the survivors.
///
/// Culling only reads the effective radius computed beforehand by
/// [`InstanceStore::recompute_radii`]; no square roots are taken here.
#[derive(Debug, Clone, Copy, Default)]
pub struct VisibilityCuller {
    degenerate: DegeneratePolicy,
}

impl VisibilityCuller {
    /// Creates a culler.
    #[must_use]
    pub const fn new(degenerate: DegeneratePolicy) -> Self {
        Self { degenerate }
    }

    /// Degenerate-transform policy.
    #[must_use]
    pub const fn degenerate_policy(&self) -> DegeneratePolicy {
        self.degenerate
    }

    /// Sets the pass's visibility flag on every live instance.
    ///
    /// A sphere that intersects or touches the volume counts as visible.
    /// Returns how many instances passed.
    pub fn classify(&self, store: &mut InstanceStore, volume: CullVolume<'_>) -> usize {
        let pass = volume.pass();
        let mut passed = 0;
        for (_, record) in store.iter_mut() {
            let visible = volume.admits(record);
            match pass {
                CullPass::Camera => record.visibility.visible_camera = visible,
                CullPass::Light => record.visibility.visible_light = visible,
            }
            passed += usize::from(visible);
        }
        passed
    }

    /// Writes every instance flagged visible for `pass` into `window`, in
    /// slot order.
    ///
    /// Stops at the window's capacity and reports the overflow; records
    /// already written stay valid.
    ///
    /// # Errors
    ///
    /// Returns the device error if a write is rejected.
    pub fn pack(
        &self,
        store: &InstanceStore,
        pass: CullPass,
        window: &mut MappedInstances<'_>,
    ) -> Result<PackOutcome, DeviceError> {
        let mut outcome = PackOutcome::default();

        let flagged = store.iter().filter(|(_, record)| match pass {
            CullPass::Camera => record.visibility.visible_camera,
            CullPass::Light => record.visibility.visible_light,
        });

        for (_, record) in flagged {
            let normal = NormalMatrix::from_transform(&record.data.transform);
            if normal.degenerate && self.degenerate == DegeneratePolicy::Skip {
                outcome.degenerate += 1;
                continue;
            }

            let packed = GpuInstance::pack(&record.data.transform, record.data.color, &normal.matrix);
            if window.push(&packed)? == Push::Full {
                outcome.overflowed = true;
                warn!(
                    capacity = window.capacity(),
                    "instance buffer size exceeded, remaining instances dropped"
                );
                break;
            }
            if normal.degenerate {
                outcome.degenerate += 1;
            }
        }

        outcome.visible = window.len();
        Ok(outcome)
    }
}
