//! Archive mounting.
//!
//! A [`Mounter`] turns bundle bytes (a file on disk or an in-memory body)
//! into an opaque [`ArchiveHandle`]. At most one version of a bundle name is
//! mounted at a time; the cache tracks that in a [`MountTable`].

use std::path::{Path, PathBuf};

use stowage_core::alloc::HashMap;

/// Opaque handle to a mounted archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchiveHandle(pub u64);

/// An asynchronous mount in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MountTicket(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MountPoll {
    Pending { progress: f32 },
    /// `None` means the archive could not be opened.
    Ready(Option<ArchiveHandle>),
}

/// Opens and closes archives.
pub trait Mounter {
    fn begin_mount(&mut self, path: &Path) -> MountTicket;

    fn poll_mount(&mut self, ticket: MountTicket) -> MountPoll;

    /// Mount synchronously.
    fn mount_now(&mut self, path: &Path) -> Option<ArchiveHandle>;

    /// Mount an archive from an in-memory body.
    fn mount_bytes(&mut self, label: &str, bytes: Vec<u8>) -> Option<ArchiveHandle>;

    /// `unload_objects` is `false` when a newer version replaces this one
    /// and objects already loaded from it stay alive.
    fn unmount(&mut self, archive: ArchiveHandle, unload_objects: bool);
}

/// Mounts archives by reading the whole file into memory.
///
/// Missing or empty files fail to mount.
#[derive(Debug, Default)]
pub struct FileMounter {
    next_id: u64,
    pending: HashMap<u64, PathBuf>,
    archives: HashMap<u64, Vec<u8>>,
}

impl FileMounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes of a mounted archive.
    pub fn contents(&self, archive: ArchiveHandle) -> Option<&[u8]> {
        self.archives.get(&archive.0).map(Vec::as_slice)
    }

    pub fn is_mounted(&self, archive: ArchiveHandle) -> bool {
        self.archives.contains_key(&archive.0)
    }

    pub fn mounted_count(&self) -> usize {
        self.archives.len()
    }

    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn install(&mut self, bytes: Vec<u8>) -> Option<ArchiveHandle> {
        if bytes.is_empty() {
            return None;
        }
        let id = self.allocate();
        self.archives.insert(id, bytes);
        Some(ArchiveHandle(id))
    }
}

impl Mounter for FileMounter {
    fn begin_mount(&mut self, path: &Path) -> MountTicket {
        let ticket = self.allocate();
        self.pending.insert(ticket, path.to_path_buf());
        MountTicket(ticket)
    }

    fn poll_mount(&mut self, ticket: MountTicket) -> MountPoll {
        let archive = match self.pending.remove(&ticket.0) {
            Some(path) => self.mount_now(&path),
            None => None,
        };
        MountPoll::Ready(archive)
    }

    fn mount_now(&mut self, path: &Path) -> Option<ArchiveHandle> {
        match std::fs::read(path) {
            Ok(bytes) => self.install(bytes),
            Err(e) => {
                tracing::debug!("Cannot mount {}: {}", path.display(), e);
                None
            }
        }
    }

    fn mount_bytes(&mut self, _label: &str, bytes: Vec<u8>) -> Option<ArchiveHandle> {
        self.install(bytes)
    }

    fn unmount(&mut self, archive: ArchiveHandle, _unload_objects: bool) {
        self.archives.remove(&archive.0);
    }
}

/// Bare bundle name to the archive currently mounted for it.
///
/// The table also remembers the newest version requested for each name, so
/// an older version that finishes mounting late cannot displace it.
#[derive(Debug, Default)]
pub struct MountTable {
    mounted: HashMap<String, ArchiveHandle>,
    latest: HashMap<String, String>,
}

impl MountTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<ArchiveHandle> {
        self.mounted.get(name).copied()
    }

    pub fn insert(&mut self, name: &str, archive: ArchiveHandle) {
        self.mounted.insert(name.to_string(), archive);
    }

    /// Remove whatever is mounted under `name`.
    pub fn take(&mut self, name: &str) -> Option<ArchiveHandle> {
        self.mounted.remove(name)
    }

    /// Remove the entry for `name` only if it still points at `archive`.
    pub fn remove_if(&mut self, name: &str, archive: ArchiveHandle) -> bool {
        if self.get(name) != Some(archive) {
            return false;
        }
        self.mounted.remove(name);
        true
    }

    /// Record `hash` as the version of `name` that should end up mounted.
    pub fn request(&mut self, name: &str, hash: &str) {
        self.latest.insert(name.to_string(), hash.to_string());
    }

    /// `true` when a different version of `name` was requested after `hash`.
    pub fn is_superseded(&self, name: &str, hash: &str) -> bool {
        self.latest
            .get(name)
            .is_some_and(|latest| latest.as_str() != hash)
    }

    pub fn len(&self) -> usize {
        self.mounted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounted.is_empty()
    }
}
