//! # Arena Storage
//!
//! Slot-vector allocator for records that are frequently created and destroyed.

use super::slot::SlotId;

/// Generation of a slot that will never be handed out again.
const RETIRED: u32 = u32::MAX;

/// One storage slot. `value` is `None` while the slot sits on the free list.
#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

impl<T> Slot<T> {
    /// Advances the generation of a just-emptied slot.
    ///
    /// Returns false when the counter is exhausted and the slot is retired.
    fn retire_or_bump(&mut self) -> bool {
        self.generation += 1;
        self.generation != RETIRED
    }
}

/// A generational arena.
///
/// Records can be inserted and removed individually. Every removal bumps the
/// slot's generation, so ids handed out before the removal never match the
/// slot again, even after it has been recycled.
///
/// A slot whose generation counter is exhausted is retired instead of being
/// recycled; no two live ids can ever share index and generation.
///
/// # Thread Safety
///
/// This arena is NOT thread-safe. Use one arena per thread or wrap in a mutex.
///
/// # Example
///
/// ```rust
/// use prism_core::Arena;
///
/// let mut arena: Arena<u32> = Arena::with_capacity(16);
/// let a = arena.insert(1);
/// arena.remove(a);
///
/// let b = arena.insert(2);
/// assert_eq!(a.index(), b.index());
/// assert!(arena.get(a).is_none());
/// assert_eq!(arena.get(b), Some(&2));
/// ```
#[derive(Debug, Clone)]
pub struct Arena<T> {
    /// The storage array.
    slots: Vec<Slot<T>>,
    /// Free list - indices of recyclable slots.
    free_list: Vec<u32>,
    /// Number of live records.
    len: usize,
}

impl<T> Arena<T> {
    /// Creates an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Creates an empty arena with room for `capacity` records before reallocating.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Returns the number of live records. O(1).
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if no records are live.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a record and returns its id.
    ///
    /// This is **O(1)** amortised. Recycled slots are preferred over growth.
    pub fn insert(&mut self, value: T) -> SlotId {
        self.insert_with(|_| value)
    }

    /// Inserts a record built from its own id.
    ///
    /// Useful when the record needs to know where it lives.
    ///
    /// # Panics
    ///
    /// Panics if the arena already holds `u32::MAX` slots.
    pub fn insert_with(&mut self, build: impl FnOnce(SlotId) -> T) -> SlotId {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            let id = SlotId::new(index, slot.generation);
            slot.value = Some(build(id));
            self.len += 1;
            return id;
        }

        let index = u32::try_from(self.slots.len())
            .ok()
            .filter(|&i| i != u32::MAX)
            .expect("arena slot index space exhausted");
        let id = SlotId::new(index, 0);
        self.slots.push(Slot {
            generation: 0,
            value: Some(build(id)),
        });
        self.len += 1;
        id
    }

    /// Removes a record.
    ///
    /// Returns the removed record, or `None` if the id was stale or null.
    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        let index = id.index();
        let slot = self.slots.get_mut(index as usize)?;
        if slot.generation != id.generation() {
            return None;
        }

        let value = slot.value.take()?;
        self.len -= 1;

        if slot.retire_or_bump() {
            self.free_list.push(index);
        }

        Some(value)
    }

    /// Returns true if `id` refers to a live record.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: SlotId) -> bool {
        self.get(id).is_some()
    }

    /// Gets a reference to a live record.
    #[inline]
    #[must_use]
    pub fn get(&self, id: SlotId) -> Option<&T> {
        let slot = self.slots.get(id.index() as usize)?;
        if slot.generation == id.generation() {
            slot.value.as_ref()
        } else {
            None
        }
    }

    /// Gets a mutable reference to a live record.
    #[inline]
    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        let slot = self.slots.get_mut(id.index() as usize)?;
        if slot.generation == id.generation() {
            slot.value.as_mut()
        } else {
            None
        }
    }

    /// Removes every record. All previously issued ids become stale.
    pub fn clear(&mut self) {
        self.free_list.clear();
        for (index, slot) in self.slots.iter_mut().enumerate().rev() {
            let recyclable = if slot.value.take().is_some() {
                slot.retire_or_bump()
            } else {
                slot.generation != RETIRED
            };
            if recyclable {
                self.free_list.push(index as u32);
            }
        }
        self.len = 0;
    }

    /// Iterates over live records in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|v| (SlotId::new(index as u32, slot.generation), v))
        })
    }

    /// Iterates mutably over live records in slot order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SlotId, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.value
                .as_mut()
                .map(|v| (SlotId::new(index as u32, generation), v))
        })
    }

    /// Iterates over live record values in slot order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.slots.iter().filter_map(|slot| slot.value.as_ref())
    }

    /// Iterates mutably over live record values in slot order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slots.iter_mut().filter_map(|slot| slot.value.as_mut())
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove() {
        let mut arena: Arena<u32> = Arena::new();

        let h1 = arena.insert(42);
        assert_eq!(*arena.get(h1).unwrap(), 42);
        assert_eq!(arena.len(), 1);

        let freed = arena.remove(h1).unwrap();
        assert_eq!(freed, 42);
        assert!(arena.is_empty());
        assert!(arena.remove(h1).is_none());
    }

    #[test]
    fn test_stale_id_after_reuse() {
        let mut arena: Arena<u32> = Arena::new();

        let h1 = arena.insert(1);
        arena.remove(h1);

        let h2 = arena.insert(2);
        assert_eq!(h1.index(), h2.index()); // Same slot reused
        assert_ne!(h1.generation(), h2.generation());
        assert!(!arena.contains(h1));
        assert_eq!(*arena.get(h2).unwrap(), 2);
        assert!(arena.get_mut(h1).is_none());
    }

    #[test]
    fn test_insert_with_sees_own_id() {
        let mut arena: Arena<SlotId> = Arena::new();
        let id = arena.insert_with(|id| id);
        assert_eq!(arena.get(id), Some(&id));
    }

    #[test]
    fn test_clear_invalidates_everything() {
        let mut arena: Arena<u32> = Arena::new();
        let ids: Vec<_> = (0..4).map(|i| arena.insert(i)).collect();

        arena.clear();
        assert!(arena.is_empty());
        assert!(ids.iter().all(|&id| !arena.contains(id)));

        // Lowest slot is recycled first after a clear.
        let fresh = arena.insert(9);
        assert_eq!(fresh.index(), 0);
        assert_eq!(fresh.generation(), 1);
    }

    #[test]
    fn test_iteration_is_slot_ordered() {
        let mut arena: Arena<char> = Arena::new();
        let a = arena.insert('a');
        let _b = arena.insert('b');
        let _c = arena.insert('c');
        arena.remove(a);

        let seen: Vec<char> = arena.values().copied().collect();
        assert_eq!(seen, vec!['b', 'c']);

        for (_, v) in arena.iter_mut() {
            *v = v.to_ascii_uppercase();
        }
        let seen: Vec<char> = arena.iter().map(|(_, v)| *v).collect();
        assert_eq!(seen, vec!['B', 'C']);
    }

    #[test]
    fn test_null_id_never_resolves() {
        let mut arena: Arena<u8> = Arena::new();
        arena.insert(1);
        assert!(arena.get(SlotId::NULL).is_none());
        assert!(arena.remove(SlotId::NULL).is_none());
    }
}
