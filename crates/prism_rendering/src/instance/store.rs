//! Sparse instance table backed by a generational arena.

use prism_core::{Arena, SlotId};

use super::data::{InstanceData, InstanceRecord, VisibilityData};
use crate::math::max_axis_scale;

/// Live instances of one mesh.
///
/// Slots are recycled through the arena's free list; a recycled slot carries
/// a new generation, so ids of destroyed instances never resolve again.
/// Iteration runs in slot order and is stable while the store is borrowed.
#[derive(Debug, Default)]
pub struct InstanceStore {
    records: Arena<InstanceRecord>,
}

impl InstanceStore {
    /// Creates an empty store.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Arena::new(),
        }
    }

    /// Stores an instance with a zeroed visibility record.
    pub fn create(&mut self, data: InstanceData) -> SlotId {
        self.records.insert(InstanceRecord {
            data,
            visibility: VisibilityData::default(),
        })
    }

    /// Removes an instance. Returns false for ids that are already invalid.
    pub fn destroy(&mut self, id: SlotId) -> bool {
        self.records.remove(id).is_some()
    }

    /// Removes every instance, invalidating all ids.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Live instance count.
    #[inline]
    #[must_use]
    pub const fn count(&self) -> usize {
        self.records.len()
    }

    /// True if no instances are live.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True if `id` names a live instance.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: SlotId) -> bool {
        self.records.contains(id)
    }

    /// Scene-owned data of a live instance.
    #[must_use]
    pub fn get(&self, id: SlotId) -> Option<&InstanceData> {
        self.records.get(id).map(|r| &r.data)
    }

    /// Mutable scene-owned data of a live instance.
    #[must_use]
    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut InstanceData> {
        self.records.get_mut(id).map(|r| &mut r.data)
    }

    /// Derived visibility of a live instance.
    #[must_use]
    pub fn visibility(&self, id: SlotId) -> Option<&VisibilityData> {
        self.records.get(id).map(|r| &r.visibility)
    }

    /// Live records in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &InstanceRecord)> {
        self.records.iter()
    }

    /// Live records in slot order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SlotId, &mut InstanceRecord)> {
        self.records.iter_mut()
    }

    /// Sets every effective radius to `base_radius * max_axis_scale`.
    pub fn recompute_radii(&mut self, base_radius: f32) {
        for record in self.records.values_mut() {
            record.visibility.radius = base_radius * max_axis_scale(&record.data.transform);
        }
    }
}
