//! Draw statistics.

use std::ops::AddAssign;

use crate::culling::PackOutcome;

/// Counters from one render pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    /// Draw calls issued.
    pub draw_calls: u32,
    /// Material programs bound.
    pub material_binds: u32,
    /// Meshes with at least one instance drawn.
    pub meshes_drawn: u32,
    /// Meshes that reached the draw step with nothing visible.
    pub meshes_skipped: u32,
    /// Instances drawn across all meshes.
    pub instances_drawn: u32,
    /// Packs truncated at buffer capacity.
    pub overflows: u32,
    /// Instances with a near-singular transform.
    pub degenerate_normals: u32,
    /// Meshes dropped from the pass after a device error.
    pub mesh_failures: u32,
}

impl DrawStats {
    /// Folds in the result of one pack.
    pub fn record_pack(&mut self, outcome: &PackOutcome) {
        self.overflows += u32::from(outcome.overflowed);
        self.degenerate_normals += outcome.degenerate;
    }

    /// Folds in one draw step.
    pub fn record_draw(&mut self, drawn: bool, instances: u32) {
        if drawn {
            self.draw_calls += 1;
            self.meshes_drawn += 1;
            self.instances_drawn += instances;
        } else {
            self.meshes_skipped += 1;
        }
    }

    /// Average instances per draw call.
    #[must_use]
    pub fn instances_per_draw(&self) -> f32 {
        if self.draw_calls > 0 {
            self.instances_drawn as f32 / self.draw_calls as f32
        } else {
            0.0
        }
    }
}

impl AddAssign for DrawStats {
    fn add_assign(&mut self, rhs: Self) {
        self.draw_calls += rhs.draw_calls;
        self.material_binds += rhs.material_binds;
        self.meshes_drawn += rhs.meshes_drawn;
        self.meshes_skipped += rhs.meshes_skipped;
        self.instances_drawn += rhs.instances_drawn;
        self.overflows += rhs.overflows;
        self.degenerate_normals += rhs.degenerate_normals;
        self.mesh_failures += rhs.mesh_failures;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_draw() {
        let mut stats = DrawStats::default();
        stats.record_draw(true, 10);
        stats.record_draw(false, 0);
        stats.record_draw(true, 2);
        assert_eq!(stats.draw_calls, 2);
        assert_eq!(stats.meshes_skipped, 1);
        assert_eq!(stats.instances_per_draw(), 6.0);
    }
}
