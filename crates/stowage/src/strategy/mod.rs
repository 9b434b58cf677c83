//! Load strategies: how an instance turns a location into a payload.
//!
//! The engine owns the lifecycle (reference counting, scheduling,
//! callbacks); a strategy only drives its own transfer and reports back
//! through [`LoadContext`]. Every strategy is polled only while its instance
//! is in flight, and must leave the instance in a terminal state once it
//! has a result.

mod download;
mod local;
mod web;

pub use download::DownloadThenMount;
pub use local::{LocalAsset, LocalBundle};
pub use web::StreamingWeb;

use std::any::TypeId;

use crate::config::CacheConfig;
use crate::decoder::DecoderRegistry;
use crate::error::{LoadError, LoadResult};
use crate::io::{BytesReader, FileReader};
use crate::loadable::{LoadState, Payload, ResourceKind};
use crate::mount::{ArchiveHandle, FileMounter, MountPoll, MountTable, MountTicket, Mounter};
use crate::resolver::{BundleDescriptor, Manifest, Resolver};
use crate::status::LoadableStatus;
use crate::transport::{DownloadTransport, OfflineTransport, WebTransport};

/// Collaborators shared by every strategy.
pub struct Backends {
    pub resolver: Box<dyn Resolver>,
    pub downloads: Box<dyn DownloadTransport>,
    pub web: Box<dyn WebTransport>,
    pub mounter: Box<dyn Mounter>,
    pub reader: Box<dyn BytesReader>,
    pub decoders: DecoderRegistry,
}

impl Default for Backends {
    fn default() -> Self {
        Self {
            resolver: Box::new(Manifest::new()),
            downloads: Box::new(OfflineTransport::new()),
            web: Box::new(OfflineTransport::new()),
            mounter: Box::new(FileMounter::new()),
            reader: Box::new(FileReader::new(".")),
            decoders: DecoderRegistry::with_defaults(),
        }
    }
}

/// What a strategy can see and change while it runs.
pub struct LoadContext<'a> {
    pub(crate) key: &'a str,
    pub(crate) location: &'a str,
    pub(crate) kind: &'a ResourceKind,
    pub(crate) state: &'a mut LoadState,
    pub(crate) backends: &'a mut Backends,
    pub(crate) mounts: &'a mut MountTable,
    pub(crate) config: &'a CacheConfig,
}

impl LoadContext<'_> {
    pub fn key(&self) -> &str {
        self.key
    }

    pub fn location(&self) -> &str {
        self.location
    }

    pub fn kind(&self) -> &ResourceKind {
        self.kind
    }

    pub fn descriptor(&self) -> Option<&BundleDescriptor> {
        self.kind.descriptor()
    }

    pub fn state(&self) -> &LoadState {
        self.state
    }

    pub fn backends(&mut self) -> &mut Backends {
        self.backends
    }

    pub fn config(&self) -> &CacheConfig {
        self.config
    }

    pub fn must_complete_now(&self) -> bool {
        self.state.must_complete_now()
    }

    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }

    pub fn report_progress(&mut self, progress: f32) {
        self.state.report_progress(progress);
    }

    pub fn set_stage(&mut self, stage: LoadableStatus) {
        self.state.set_stage(stage);
    }

    pub fn finish(&mut self, error: Option<String>) {
        self.state.finish(error);
    }

    pub fn succeed(&mut self, payload: Payload) {
        self.state.succeed(payload);
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.state.fail(error);
    }

    /// Decode fetched bytes into this asset's payload type and finish.
    pub fn decode_and_finish(&mut self, bytes: &[u8]) {
        let ResourceKind::Asset { type_id, type_name } = *self.kind else {
            self.fail(format!("{} is not an asset", self.key));
            return;
        };
        match decode(&self.backends.decoders, type_id, type_name, self.key, bytes) {
            Ok(payload) => self.succeed(payload),
            Err(e) => self.fail(e.to_string()),
        }
    }

    /// Finish a bundle with the result of a mount. `None` is a failure.
    ///
    /// A successful mount becomes the bundle name's current archive and any
    /// other archive mounted under that name is unmounted first. A version
    /// that was superseded while it mounted is unmounted again and fails.
    pub fn finish_mount(&mut self, archive: Option<ArchiveHandle>) {
        let Some(archive) = archive else {
            self.fail(format!("failed to mount archive from {}", self.location));
            return;
        };

        let kind = self.kind;
        if let Some(descriptor) = kind.descriptor() {
            if self.mounts.is_superseded(&descriptor.name, &descriptor.hash) {
                self.backends.mounter.unmount(archive, false);
                self.fail(format!(
                    "{} was superseded by a newer version of {}",
                    self.key, descriptor.name
                ));
                return;
            }
            if let Some(previous) = self.mounts.take(&descriptor.name)
                && previous != archive
            {
                tracing::debug!("Unmount previous version of {}", descriptor.name);
                self.backends.mounter.unmount(previous, false);
            }
            self.mounts.insert(&descriptor.name, archive);
        }
        self.succeed(Payload::Archive(archive));
    }

    /// Poll an asynchronous mount until it resolves, then finish with it.
    ///
    /// Gives up after `immediate_iteration_cap` polls.
    pub fn await_mount(&mut self, ticket: MountTicket) {
        for _ in 0..self.config.immediate_iteration_cap {
            if let MountPoll::Ready(archive) = self.backends.mounter.poll_mount(ticket) {
                self.finish_mount(archive);
                return;
            }
        }
        self.fail_stalled();
    }

    /// Fail with the standard message for a synchronous load that ran out of iterations.
    pub(crate) fn fail_stalled(&mut self) {
        let cap = self.config.immediate_iteration_cap;
        self.fail(format!(
            "{} did not complete within {} iterations",
            self.key, cap
        ));
    }
}

fn decode(
    decoders: &DecoderRegistry,
    type_id: TypeId,
    type_name: &'static str,
    key: &str,
    bytes: &[u8],
) -> LoadResult<Payload> {
    decoders
        .decode(type_id, type_name, key, bytes)
        .map(Payload::Asset)
}

/// Drives one instance from `Loading` to a terminal state.
pub trait LoadStrategy {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Called once, right after the instance enters `Loading`.
    fn begin_load(&mut self, ctx: &mut LoadContext<'_>);

    /// Called once per tick while the instance is in flight.
    fn poll_tick(&mut self, ctx: &mut LoadContext<'_>);

    /// Drive the load to a terminal state before returning.
    ///
    /// Strategies that cannot block return [`LoadError::Unsupported`]
    /// without touching the state.
    fn load_immediate(&mut self, ctx: &mut LoadContext<'_>) -> LoadResult<()> {
        Err(LoadError::Unsupported {
            key: ctx.key().to_string(),
            strategy: self.name(),
        })
    }

    /// The instance's reference count reached zero.
    fn on_unused(&mut self) {}

    /// Release anything the strategy still holds. The engine unmounts the
    /// payload archive itself.
    fn teardown(&mut self, _backends: &mut Backends) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NeverFinishes;

    impl LoadStrategy for NeverFinishes {
        fn name(&self) -> &'static str {
            "NeverFinishes"
        }

        fn begin_load(&mut self, _ctx: &mut LoadContext<'_>) {}

        fn poll_tick(&mut self, _ctx: &mut LoadContext<'_>) {}
    }

    #[test]
    fn test_default_immediate_is_unsupported() {
        let mut backends = Backends::default();
        let mut mounts = MountTable::new();
        let config = CacheConfig::default();
        let kind = ResourceKind::asset::<String>();
        let mut state = LoadState::default();
        state.begin();

        let mut ctx = LoadContext {
            key: "a.txt",
            location: "a.txt",
            kind: &kind,
            state: &mut state,
            backends: &mut backends,
            mounts: &mut mounts,
            config: &config,
        };
        let result = NeverFinishes.load_immediate(&mut ctx);
        assert!(matches!(
            result,
            Err(LoadError::Unsupported {
                strategy: "NeverFinishes",
                ..
            })
        ));
        assert!(!state.is_done());
    }

    #[test]
    fn test_finish_mount_records_current_archive() {
        let mut backends = Backends::default();
        let mut mounts = MountTable::new();
        let config = CacheConfig::default();
        let kind = ResourceKind::bundle(BundleDescriptor::new("ui", "1", 4, 0));
        let mut state = LoadState::default();
        state.begin();

        let mut ctx = LoadContext {
            key: "ui_1",
            location: "ui_1",
            kind: &kind,
            state: &mut state,
            backends: &mut backends,
            mounts: &mut mounts,
            config: &config,
        };
        ctx.finish_mount(Some(ArchiveHandle(9)));

        assert_eq!(mounts.get("ui"), Some(ArchiveHandle(9)));
        assert!(state.status().is_success());
    }

    #[test]
    fn test_finish_mount_replaces_other_archive() {
        let mut backends = Backends::default();
        let mut mounts = MountTable::new();
        mounts.insert("ui", ArchiveHandle(3));
        mounts.request("ui", "2");
        let config = CacheConfig::default();
        let kind = ResourceKind::bundle(BundleDescriptor::new("ui", "2", 4, 0));
        let mut state = LoadState::default();
        state.begin();

        let mut ctx = LoadContext {
            key: "ui_2",
            location: "ui_2",
            kind: &kind,
            state: &mut state,
            backends: &mut backends,
            mounts: &mut mounts,
            config: &config,
        };
        ctx.finish_mount(Some(ArchiveHandle(9)));

        assert_eq!(mounts.get("ui"), Some(ArchiveHandle(9)));
        assert_eq!(mounts.len(), 1);
        assert!(state.status().is_success());
    }

    #[test]
    fn test_superseded_mount_is_unmounted_and_fails() {
        let mut backends = Backends::default();
        let mut mounts = MountTable::new();
        mounts.request("ui", "1");
        mounts.request("ui", "2");
        let config = CacheConfig::default();
        let kind = ResourceKind::bundle(BundleDescriptor::new("ui", "1", 4, 0));
        let mut state = LoadState::default();
        state.begin();

        let mut ctx = LoadContext {
            key: "ui_1",
            location: "ui_1",
            kind: &kind,
            state: &mut state,
            backends: &mut backends,
            mounts: &mut mounts,
            config: &config,
        };
        ctx.finish_mount(Some(ArchiveHandle(9)));

        assert!(mounts.get("ui").is_none());
        assert!(state.status().is_failed());
        assert!(state.error().unwrap().contains("superseded"));
    }

    #[test]
    fn test_null_archive_fails() {
        let mut backends = Backends::default();
        let mut mounts = MountTable::new();
        let config = CacheConfig::default();
        let kind = ResourceKind::bundle(BundleDescriptor::new("ui", "1", 4, 0));
        let mut state = LoadState::default();
        state.begin();

        let mut ctx = LoadContext {
            key: "ui_1",
            location: "bundles/ui_1",
            kind: &kind,
            state: &mut state,
            backends: &mut backends,
            mounts: &mut mounts,
            config: &config,
        };
        ctx.finish_mount(None);

        assert!(mounts.is_empty());
        assert!(state.status().is_failed());
        assert!(state.error().unwrap().contains("bundles/ui_1"));
    }
}
