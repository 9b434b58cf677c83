//! Scripted archive mounter.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use stowage::{ArchiveHandle, MountPoll, MountTicket, Mounter};
use stowage_core::alloc::HashMap;

/// How mounting one file behaves, keyed by file name.
#[derive(Debug, Clone, Copy)]
pub struct MountScript {
    /// Polls that report `Pending` before the mount resolves.
    pub steps: u32,
    /// `false` makes the mount resolve to no archive.
    pub succeeds: bool,
}

impl Default for MountScript {
    fn default() -> Self {
        Self::succeed_after(0)
    }
}

impl MountScript {
    pub fn succeed_after(steps: u32) -> Self {
        Self {
            steps,
            succeeds: true,
        }
    }

    pub fn fail_after(steps: u32) -> Self {
        Self {
            steps,
            succeeds: false,
        }
    }
}

/// Records a mounter call for verification in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountCall {
    Begin { name: String },
    Now { name: String },
    Bytes { label: String, len: usize },
    Unmount { archive: ArchiveHandle, unload_objects: bool },
}

#[derive(Debug)]
struct Pending {
    name: String,
    script: MountScript,
    polled: u32,
}

#[derive(Debug, Default)]
struct State {
    scripts: HashMap<String, MountScript>,
    pending: HashMap<u64, Pending>,
    mounted: HashMap<ArchiveHandle, String>,
    calls: Vec<MountCall>,
    next_id: u64,
}

impl State {
    fn allocate(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn script_for(&self, name: &str) -> MountScript {
        self.scripts.get(name).copied().unwrap_or_default()
    }

    fn resolve(&mut self, name: String, script: MountScript) -> Option<ArchiveHandle> {
        if !script.succeeds {
            return None;
        }
        let archive = ArchiveHandle(self.allocate());
        self.mounted.insert(archive, name);
        Some(archive)
    }
}

/// Mounter that never touches disk. Unscripted names mount immediately.
#[derive(Debug, Clone, Default)]
pub struct ScriptedMounter {
    state: Arc<Mutex<State>>,
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl ScriptedMounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, name: impl Into<String>, script: MountScript) {
        self.state.lock().scripts.insert(name.into(), script);
    }

    pub fn calls(&self) -> Vec<MountCall> {
        self.state.lock().calls.clone()
    }

    /// `(archive, unload_objects)` for every unmount, in order.
    pub fn unmounts(&self) -> Vec<(ArchiveHandle, bool)> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MountCall::Unmount {
                    archive,
                    unload_objects,
                } => Some((*archive, *unload_objects)),
                _ => None,
            })
            .collect()
    }

    /// Number of mount attempts of any kind.
    pub fn mount_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| !matches!(call, MountCall::Unmount { .. }))
            .count()
    }

    pub fn is_mounted(&self, archive: ArchiveHandle) -> bool {
        self.state.lock().mounted.contains_key(&archive)
    }

    /// The file name an archive was mounted from.
    pub fn name_of(&self, archive: ArchiveHandle) -> Option<String> {
        self.state.lock().mounted.get(&archive).cloned()
    }

    pub fn mounted_count(&self) -> usize {
        self.state.lock().mounted.len()
    }
}

impl Mounter for ScriptedMounter {
    fn begin_mount(&mut self, path: &Path) -> MountTicket {
        let name = file_name(path);
        let mut state = self.state.lock();
        state.calls.push(MountCall::Begin { name: name.clone() });
        let script = state.script_for(&name);
        let ticket = state.allocate();
        state.pending.insert(
            ticket,
            Pending {
                name,
                script,
                polled: 0,
            },
        );
        MountTicket(ticket)
    }

    fn poll_mount(&mut self, ticket: MountTicket) -> MountPoll {
        let mut state = self.state.lock();
        let Some(pending) = state.pending.get_mut(&ticket.0) else {
            return MountPoll::Ready(None);
        };
        if pending.polled < pending.script.steps {
            pending.polled += 1;
            return MountPoll::Pending {
                progress: pending.polled as f32 / (pending.script.steps + 1) as f32,
            };
        }
        let Some(pending) = state.pending.remove(&ticket.0) else {
            return MountPoll::Ready(None);
        };
        MountPoll::Ready(state.resolve(pending.name, pending.script))
    }

    fn mount_now(&mut self, path: &Path) -> Option<ArchiveHandle> {
        let name = file_name(path);
        let mut state = self.state.lock();
        state.calls.push(MountCall::Now { name: name.clone() });
        let script = state.script_for(&name);
        state.resolve(name, script)
    }

    fn mount_bytes(&mut self, label: &str, bytes: Vec<u8>) -> Option<ArchiveHandle> {
        let mut state = self.state.lock();
        state.calls.push(MountCall::Bytes {
            label: label.to_string(),
            len: bytes.len(),
        });
        if bytes.is_empty() {
            return None;
        }
        let script = state.script_for(label);
        state.resolve(label.to_string(), script)
    }

    fn unmount(&mut self, archive: ArchiveHandle, unload_objects: bool) {
        let mut state = self.state.lock();
        state.calls.push(MountCall::Unmount {
            archive,
            unload_objects,
        });
        state.mounted.remove(&archive);
    }
}
