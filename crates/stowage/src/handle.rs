//! Handles returned by the cache.
//!
//! A handle is a generational index into the cache's instance arena. It does
//! not own a reference by itself: every successful `load_*` call retains one
//! reference, which the caller gives back with
//! [`ResourceCache::release`](crate::ResourceCache::release). Once an instance
//! is reclaimed, its handles go stale and report
//! [`LoadableStatus::Unloaded`](crate::LoadableStatus::Unloaded).

use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use stowage_core::alloc::sparse_set::IndexSlot;

use crate::Asset;

/// Untyped id of a cached instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadableId(pub(crate) IndexSlot);

impl LoadableId {
    pub fn index(&self) -> u32 {
        self.0.index()
    }

    pub fn generation(&self) -> u32 {
        self.0.generation()
    }
}

/// Handle to an asset whose payload decodes to `T`.
pub struct AssetHandle<T: Asset> {
    pub(crate) id: LoadableId,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Asset> AssetHandle<T> {
    pub(crate) fn new(id: LoadableId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> LoadableId {
        self.id
    }

    pub fn type_name(&self) -> &'static str {
        T::type_name()
    }
}

impl<T: Asset> std::fmt::Debug for AssetHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetHandle")
            .field("type", &T::type_name())
            .field("index", &self.id.index())
            .field("generation", &self.id.generation())
            .finish()
    }
}

impl<T: Asset> Clone for AssetHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: Asset> Copy for AssetHandle<T> {}

impl<T: Asset> PartialEq for AssetHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T: Asset> Eq for AssetHandle<T> {}

impl<T: Asset> Hash for AssetHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T: Asset> From<AssetHandle<T>> for LoadableId {
    fn from(handle: AssetHandle<T>) -> Self {
        handle.id
    }
}

/// Handle to a mounted archive bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BundleHandle {
    pub(crate) id: LoadableId,
}

impl BundleHandle {
    pub(crate) fn new(id: LoadableId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> LoadableId {
        self.id
    }
}

impl From<BundleHandle> for LoadableId {
    fn from(handle: BundleHandle) -> Self {
        handle.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Debug)]
    struct Sprite;

    impl Asset for Sprite {
        fn type_name() -> &'static str {
            "Sprite"
        }
    }

    #[test]
    fn test_typed_handle_is_copy_and_hashes_by_id() {
        let id = LoadableId(IndexSlot::new(2, 5));
        let handle: AssetHandle<Sprite> = AssetHandle::new(id);
        let copy = handle;

        let mut set = HashSet::new();
        set.insert(handle);
        assert!(set.contains(&copy));
        assert_eq!(LoadableId::from(copy), id);
        assert_eq!(handle.type_name(), "Sprite");
    }

    #[test]
    fn test_debug_names_type() {
        let handle: AssetHandle<Sprite> = AssetHandle::new(LoadableId(IndexSlot::new(0, 1)));
        let text = format!("{:?}", handle);
        assert!(text.contains("Sprite"));
        assert!(text.contains("index: 1"));
    }
}
