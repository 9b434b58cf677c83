use crate::profiling::profile_function;
use std::num::NonZeroU64;

/// A generational index into a [`SparseSet`].
///
/// The upper 32 bits hold the generation and the lower 32 bits the slot
/// index, offset by one so `Option<IndexSlot>` stays pointer-sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexSlot(NonZeroU64);

impl IndexSlot {
    pub fn new(generation: u32, idx: u32) -> Self {
        Self(NonZeroU64::MIN.saturating_add(((generation as u64) << 32) | idx as u64))
    }

    pub fn generation(&self) -> u32 {
        ((self.0.get() - 1) >> 32) as u32
    }

    pub fn index(&self) -> u32 {
        ((self.0.get() - 1) & u32::MAX as u64) as u32
    }
}

struct Entry<T> {
    generation: u32,
    data: Option<T>,
}

/// Slot storage with generation checks on every access.
///
/// Removing an element bumps the slot's generation, so stale [`IndexSlot`]s
/// are rejected by the `try_*` accessors instead of aliasing a newer value.
pub struct SparseSet<T> {
    vec: Vec<Entry<T>>,
    free: Vec<u32>,
}

impl<T> Default for SparseSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SparseSet<T> {
    pub const fn new() -> Self {
        Self {
            vec: Vec::new(),
            free: Vec::new(),
        }
    }

    pub fn push(&mut self, data: T) -> IndexSlot {
        profile_function!();
        if let Some(idx) = self.free.pop()
            && let Some(entry) = self.vec.get_mut(idx as usize)
        {
            entry.data = Some(data);
            return IndexSlot::new(entry.generation, idx);
        }

        let idx = self.vec.len() as u32;
        self.vec.push(Entry {
            generation: 0,
            data: Some(data),
        });
        IndexSlot::new(0, idx)
    }

    fn entry(&self, idx: IndexSlot) -> Option<&Entry<T>> {
        self.vec
            .get(idx.index() as usize)
            .filter(|entry| entry.generation == idx.generation())
    }

    pub fn try_get(&self, idx: IndexSlot) -> Option<&T> {
        self.entry(idx).and_then(|entry| entry.data.as_ref())
    }

    pub fn try_get_mut(&mut self, idx: IndexSlot) -> Option<&mut T> {
        self.vec
            .get_mut(idx.index() as usize)
            .filter(|entry| entry.generation == idx.generation())
            .and_then(|entry| entry.data.as_mut())
    }

    /// Remove the element at `idx`, returning `None` for a stale slot.
    pub fn try_remove(&mut self, idx: IndexSlot) -> Option<T> {
        profile_function!();
        let index = idx.index();
        let entry = self
            .vec
            .get_mut(index as usize)
            .filter(|entry| entry.generation == idx.generation())?;
        let data = entry.data.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(index);
        Some(data)
    }

    pub fn len(&self) -> usize {
        self.vec.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over live elements together with their slots.
    pub fn iter_slots(&self) -> impl Iterator<Item = (IndexSlot, &T)> {
        self.vec.iter().enumerate().filter_map(|(idx, entry)| {
            entry
                .data
                .as_ref()
                .map(|data| (IndexSlot::new(entry.generation, idx as u32), data))
        })
    }
}

static_assertions::assert_eq_size!(IndexSlot, Option<IndexSlot>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_set_push() {
        let mut set = SparseSet::<u8>::new();
        let idx = set.push(15);
        assert_eq!(idx.generation(), 0);
        assert_eq!(idx.index(), 0);
        assert_eq!(set.try_get(idx), Some(&15));
    }

    #[test]
    fn test_sparse_set_wrong_generation() {
        let mut set = SparseSet::<u8>::new();
        let _ = set.push(15);
        assert!(set.try_get(IndexSlot::new(1, 0)).is_none());
    }

    #[test]
    fn test_sparse_set_remove() {
        let mut set = SparseSet::<u8>::new();
        let idx = set.push(15);
        assert_eq!(set.try_remove(idx), Some(15));
        let new_idx = set.push(45);
        assert_eq!(idx.index(), new_idx.index());
        assert_ne!(idx.generation(), new_idx.generation());
        assert!(set.try_get(idx).is_none());
    }

    #[test]
    fn test_index_slot_round_trip_bits() {
        let slot = IndexSlot::new(7, 1234);
        assert_eq!(slot.generation(), 7);
        assert_eq!(slot.index(), 1234);
    }
}
