//! Key to instance maps.
//!
//! Assets are cached by path and bundles by hash-qualified name, so two
//! versions of one bundle are distinct instances. The mount table holds the
//! archive currently mounted for each bare bundle name.

use stowage_core::alloc::HashMap;

use crate::handle::LoadableId;
use crate::loadable::ResourceKind;
use crate::mount::MountTable;

#[derive(Debug, Default)]
pub struct Registry {
    assets: HashMap<String, LoadableId>,
    bundles: HashMap<String, LoadableId>,
    pub(crate) mounts: MountTable,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn asset(&self, path: &str) -> Option<LoadableId> {
        self.assets.get(path).copied()
    }

    pub fn bundle(&self, name_with_hash: &str) -> Option<LoadableId> {
        self.bundles.get(name_with_hash).copied()
    }

    pub fn mounts(&self) -> &MountTable {
        &self.mounts
    }

    pub(crate) fn insert(&mut self, kind: &ResourceKind, key: &str, id: LoadableId) {
        self.map_mut(kind).insert(key.to_string(), id);
    }

    /// Remove `key` if it still maps to `id`.
    pub(crate) fn remove(&mut self, kind: &ResourceKind, key: &str, id: LoadableId) -> bool {
        let map = self.map_mut(kind);
        if map.get(key) != Some(&id) {
            return false;
        }
        map.remove(key);
        true
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    pub fn bundle_count(&self) -> usize {
        self.bundles.len()
    }

    fn map_mut(&mut self, kind: &ResourceKind) -> &mut HashMap<String, LoadableId> {
        match kind {
            ResourceKind::Asset { .. } => &mut self.assets,
            ResourceKind::Bundle { .. } => &mut self.bundles,
        }
    }
}
