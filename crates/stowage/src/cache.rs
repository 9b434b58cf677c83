//! The consumer-facing cache.

use std::any::TypeId;
use std::sync::Arc;

use stowage_core::alloc::sparse_set::SparseSet;
use stowage_core::profiling::profile_function;

use crate::Asset;
use crate::config::CacheConfig;
use crate::decoder::Decoder;
use crate::error::{LoadError, LoadResult};
use crate::event::{LoadEvent, LoadEventBuffer};
use crate::gate::Gate;
use crate::handle::{AssetHandle, BundleHandle, LoadableId};
use crate::io::BytesReader;
use crate::loadable::{Listener, Loadable, ResourceKind};
use crate::mount::{ArchiveHandle, Mounter};
use crate::registry::Registry;
use crate::resolver::{BundleDescriptor, Resolver};
use crate::scheduler::Scheduler;
use crate::status::LoadableStatus;
use crate::strategy::{
    Backends, DownloadThenMount, LoadStrategy, LocalAsset, LocalBundle, StreamingWeb,
};
use crate::transport::{DownloadTransport, WebTransport};

/// Builds a custom strategy for a bundle, or `None` to use the built-in choice.
pub type BundleCreator =
    Box<dyn Fn(&BundleDescriptor, &str) -> Option<Box<dyn LoadStrategy>>>;

/// Reference-counted cache of assets and archive bundles.
///
/// Requests for the same key share one instance and one underlying fetch.
/// Every `load_*` call that returns `Ok` retains one reference, which the
/// caller gives back with [`ResourceCache::release`]. Instances whose count
/// drops to zero are reclaimed by a later [`ResourceCache::tick`].
///
/// # Example
///
/// ```
/// use stowage::{Manifest, MemoryReader, ResourceCache};
///
/// let mut manifest = Manifest::new();
/// manifest.add_asset("greeting.txt");
///
/// let mut cache = ResourceCache::new()
///     .with_resolver(manifest)
///     .with_reader(MemoryReader::new().with("greeting.txt", "hello"));
///
/// let handle = cache.load_asset_async::<String>("greeting.txt", None).unwrap();
/// cache.tick();
/// assert_eq!(cache.asset(handle).as_deref().map(String::as_str), Some("hello"));
///
/// cache.release(handle);
/// cache.tick();
/// assert!(cache.is_empty());
/// ```
pub struct ResourceCache {
    pub(crate) loadables: SparseSet<Loadable>,
    pub(crate) registry: Registry,
    pub(crate) scheduler: Scheduler,
    pub(crate) backends: Backends,
    pub(crate) config: CacheConfig,
    pub(crate) events: LoadEventBuffer,
    bundle_creator: Option<BundleCreator>,
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceCache {
    /// Cache with a local file reader rooted at the working directory, a
    /// file mounter, and no network.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            loadables: SparseSet::new(),
            registry: Registry::new(),
            scheduler: Scheduler::default(),
            backends: Backends::default(),
            config,
            events: LoadEventBuffer::new(),
            bundle_creator: None,
        }
    }

    pub fn with_resolver(mut self, resolver: impl Resolver + 'static) -> Self {
        self.backends.resolver = Box::new(resolver);
        self
    }

    pub fn with_reader(mut self, reader: impl BytesReader + 'static) -> Self {
        self.backends.reader = Box::new(reader);
        self
    }

    pub fn with_download_transport(mut self, downloads: impl DownloadTransport + 'static) -> Self {
        self.backends.downloads = Box::new(downloads);
        self
    }

    pub fn with_web_transport(mut self, web: impl WebTransport + 'static) -> Self {
        self.backends.web = Box::new(web);
        self
    }

    pub fn with_mounter(mut self, mounter: impl Mounter + 'static) -> Self {
        self.backends.mounter = Box::new(mounter);
        self
    }

    /// While active, a tick stops before polling the next in-flight request.
    pub fn with_busy_gate(mut self, gate: impl Gate + 'static) -> Self {
        self.scheduler.busy = Box::new(gate);
        self
    }

    /// While active, unused instances are not reclaimed.
    pub fn with_eviction_gate(mut self, gate: impl Gate + 'static) -> Self {
        self.scheduler.eviction = Box::new(gate);
        self
    }

    /// Take precedence over the built-in bundle strategies, except for
    /// streaming web mode.
    pub fn with_bundle_creator(
        mut self,
        creator: impl Fn(&BundleDescriptor, &str) -> Option<Box<dyn LoadStrategy>> + 'static,
    ) -> Self {
        self.bundle_creator = Some(Box::new(creator));
        self
    }

    pub fn register_decoder<D: Decoder>(&mut self, decoder: D) -> &mut Self {
        self.backends.decoders.register(decoder);
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn backends(&self) -> &Backends {
        &self.backends
    }

    pub fn backends_mut(&mut self) -> &mut Backends {
        &mut self.backends
    }

    // ==================== Requests ====================

    /// Request an asset. `on_complete` runs on the tick that finishes this
    /// request, including when the asset is already loaded.
    pub fn load_asset_async<T: Asset>(
        &mut self,
        path: &str,
        on_complete: Option<Listener>,
    ) -> LoadResult<AssetHandle<T>> {
        self.load_asset_internal(path, false, on_complete)
    }

    /// Request an asset and drive it to completion before returning.
    ///
    /// On failure no reference is kept.
    pub fn load_asset<T: Asset>(&mut self, path: &str) -> LoadResult<AssetHandle<T>> {
        self.load_asset_internal(path, true, None)
    }

    fn load_asset_internal<T: Asset>(
        &mut self,
        path: &str,
        must_complete_now: bool,
        on_complete: Option<Listener>,
    ) -> LoadResult<AssetHandle<T>> {
        profile_function!();
        let Some(location) = self.backends.resolver.resolve_asset(path) else {
            tracing::error!("Resource not found {}", path);
            return Err(LoadError::NotFound {
                key: path.to_string(),
            });
        };

        let id = match self.registry.asset(path) {
            Some(id) => {
                self.check_asset_type::<T>(id, path)?;
                id
            }
            None => {
                let strategy: Box<dyn LoadStrategy> = if self.config.is_web_location(&location) {
                    Box::new(StreamingWeb::new())
                } else {
                    Box::new(LocalAsset::new())
                };
                self.insert(Loadable::new(
                    path,
                    location,
                    ResourceKind::asset::<T>(),
                    strategy,
                ))
            }
        };

        self.request(id, must_complete_now, on_complete)?;
        Ok(AssetHandle::new(id))
    }

    fn check_asset_type<T: Asset>(&self, id: LoadableId, path: &str) -> LoadResult<()> {
        let cached = self.loadables.try_get(id.0).map(|l| l.kind());
        match cached {
            Some(ResourceKind::Asset { type_id, .. }) if *type_id == TypeId::of::<T>() => Ok(()),
            _ => Err(LoadError::TypeMismatch {
                key: path.to_string(),
                expected: T::type_name(),
            }),
        }
    }

    /// Request the bundle containing `path` (or named `path`).
    pub fn load_bundle_async(
        &mut self,
        path: &str,
        on_complete: Option<Listener>,
    ) -> LoadResult<BundleHandle> {
        self.load_bundle_internal(path, false, on_complete)
    }

    /// Request a bundle and drive it to completion before returning.
    pub fn load_bundle(&mut self, path: &str) -> LoadResult<BundleHandle> {
        self.load_bundle_internal(path, true, None)
    }

    fn load_bundle_internal(
        &mut self,
        path: &str,
        must_complete_now: bool,
        on_complete: Option<Listener>,
    ) -> LoadResult<BundleHandle> {
        profile_function!();
        let Some(descriptor) = self.backends.resolver.resolve_bundle(path) else {
            tracing::error!("Resource not found {}", path);
            return Err(LoadError::NotFound {
                key: path.to_string(),
            });
        };

        let key = descriptor.name_with_hash();
        let id = match self.registry.bundle(&key) {
            Some(id) => id,
            None => {
                if let Some(stale) = self.registry.mounts.take(&descriptor.name) {
                    tracing::debug!("Unmount previous version of {}", descriptor.name);
                    self.backends.mounter.unmount(stale, false);
                }
                self.registry
                    .mounts
                    .request(&descriptor.name, &descriptor.hash);
                let location = self.backends.resolver.bundle_location(&descriptor);
                let strategy = self.bundle_strategy(&descriptor, &location);
                self.insert(Loadable::new(
                    key,
                    location,
                    ResourceKind::bundle(descriptor),
                    strategy,
                ))
            }
        };

        self.request(id, must_complete_now, on_complete)?;
        Ok(BundleHandle::new(id))
    }

    fn bundle_strategy(&self, descriptor: &BundleDescriptor, location: &str) -> Box<dyn LoadStrategy> {
        if self.config.streaming_web {
            return Box::new(StreamingWeb::new());
        }
        if let Some(strategy) = self
            .bundle_creator
            .as_ref()
            .and_then(|creator| creator(descriptor, location))
        {
            return strategy;
        }
        if self.config.is_download_location(location) {
            Box::new(DownloadThenMount::new())
        } else {
            Box::new(LocalBundle::new())
        }
    }

    fn insert(&mut self, loadable: Loadable) -> LoadableId {
        let kind = loadable.kind.clone();
        let key = loadable.key.clone();
        let id = LoadableId(self.loadables.push(loadable));
        self.registry.insert(&kind, &key, id);
        id
    }

    fn request(
        &mut self,
        id: LoadableId,
        must_complete_now: bool,
        on_complete: Option<Listener>,
    ) -> LoadResult<()> {
        let loadable = self
            .loadables
            .try_get_mut(id.0)
            .ok_or(LoadError::InvalidHandle)?;
        loadable.state.set_must_complete_now(must_complete_now);
        if let Some(listener) = on_complete {
            loadable.listeners.push(listener);
        }

        self.load(id);
        if must_complete_now {
            self.load_immediate(id)?;
        }
        Ok(())
    }

    /// Give back one reference obtained from a `load_*` call.
    ///
    /// Returns `false` (and logs a warning) when there was nothing to release.
    pub fn release(&mut self, handle: impl Into<LoadableId>) -> bool {
        self.release_id(handle.into())
    }

    // ==================== Queries ====================

    pub fn get(&self, handle: impl Into<LoadableId>) -> Option<&Loadable> {
        self.loadables.try_get(handle.into().0)
    }

    /// Status of the instance; stale handles report `Unloaded`.
    pub fn status(&self, handle: impl Into<LoadableId>) -> LoadableStatus {
        self.get(handle)
            .map_or(LoadableStatus::Unloaded, Loadable::status)
    }

    pub fn is_done(&self, handle: impl Into<LoadableId>) -> bool {
        self.status(handle).is_done()
    }

    pub fn progress(&self, handle: impl Into<LoadableId>) -> f32 {
        self.get(handle).map_or(1.0, Loadable::progress)
    }

    pub fn error(&self, handle: impl Into<LoadableId>) -> Option<&str> {
        self.get(handle).and_then(Loadable::error)
    }

    pub fn ref_count(&self, handle: impl Into<LoadableId>) -> u32 {
        self.get(handle).map_or(0, Loadable::ref_count)
    }

    /// The decoded payload of a loaded asset.
    pub fn asset<T: Asset>(&self, handle: AssetHandle<T>) -> Option<Arc<T>> {
        self.get(handle).and_then(Loadable::asset::<T>)
    }

    /// The archive of a loaded bundle.
    pub fn archive(&self, handle: BundleHandle) -> Option<ArchiveHandle> {
        self.get(handle).and_then(Loadable::archive)
    }

    pub fn find_asset(&self, path: &str) -> Option<LoadableId> {
        self.registry.asset(path)
    }

    pub fn find_bundle(&self, name_with_hash: &str) -> Option<LoadableId> {
        self.registry.bundle(name_with_hash)
    }

    /// The archive currently mounted for a bare bundle name.
    pub fn mounted_archive(&self, name: &str) -> Option<ArchiveHandle> {
        self.registry.mounts.get(name)
    }

    /// Number of outstanding in-flight entries (one per pending request).
    pub fn loading_count(&self) -> usize {
        self.scheduler.loading.len()
    }

    pub fn unused_count(&self) -> usize {
        self.scheduler.unused.len()
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.loadables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loadables.is_empty()
    }

    /// Ticks run so far.
    pub fn frame(&self) -> u64 {
        self.scheduler.frame
    }

    pub fn iter(&self) -> impl Iterator<Item = (LoadableId, &Loadable)> {
        self.loadables
            .iter_slots()
            .map(|(slot, loadable)| (LoadableId(slot), loadable))
    }

    /// Drain lifecycle events buffered since the last call.
    pub fn drain_events(&mut self) -> impl Iterator<Item = LoadEvent> + '_ {
        self.events.drain()
    }
}

impl std::fmt::Debug for ResourceCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceCache")
            .field("instances", &self.loadables.len())
            .field("loading", &self.scheduler.loading.len())
            .field("unused", &self.scheduler.unused.len())
            .field("frame", &self.scheduler.frame)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::gate::GateSwitch;
    use crate::io::MemoryReader;
    use crate::mount::ArchiveHandle;
    use crate::resolver::Manifest;
    use crate::strategy::LoadContext;

    #[derive(Default)]
    struct WitnessState {
        begins: u32,
        polls: u32,
        unused: u32,
        teardowns: u32,
        outcome: Option<Result<(), String>>,
        blocking: bool,
    }

    /// Bundle strategy whose outcome is set by the test.
    #[derive(Clone, Default)]
    struct Witness(Rc<RefCell<WitnessState>>);

    impl Witness {
        fn resolve(&self, outcome: Result<(), String>) {
            self.0.borrow_mut().outcome = Some(outcome);
        }

        fn apply(&self, ctx: &mut LoadContext<'_>) {
            match self.0.borrow_mut().outcome.take() {
                Some(Ok(())) => ctx.finish_mount(Some(ArchiveHandle(42))),
                Some(Err(e)) => ctx.fail(e),
                None => ctx.report_progress(0.25),
            }
        }
    }

    impl LoadStrategy for Witness {
        fn name(&self) -> &'static str {
            "Witness"
        }

        fn begin_load(&mut self, _ctx: &mut LoadContext<'_>) {
            self.0.borrow_mut().begins += 1;
        }

        fn poll_tick(&mut self, ctx: &mut LoadContext<'_>) {
            self.0.borrow_mut().polls += 1;
            self.apply(ctx);
        }

        fn load_immediate(&mut self, ctx: &mut LoadContext<'_>) -> LoadResult<()> {
            if !self.0.borrow().blocking {
                return Err(LoadError::Unsupported {
                    key: ctx.key().to_string(),
                    strategy: self.name(),
                });
            }
            self.apply(ctx);
            Ok(())
        }

        fn on_unused(&mut self) {
            self.0.borrow_mut().unused += 1;
        }

        fn teardown(&mut self, _backends: &mut Backends) {
            self.0.borrow_mut().teardowns += 1;
        }
    }

    fn witness_cache(witness: &Witness) -> ResourceCache {
        let mut manifest = Manifest::new();
        manifest.add_bundle(BundleDescriptor::new("ui", "1", 64, 0), ["ui/title.txt"]);
        let witness = witness.clone();
        ResourceCache::new()
            .with_resolver(manifest)
            .with_bundle_creator(move |_, _| Some(Box::new(witness.clone()) as Box<dyn LoadStrategy>))
    }

    fn text_cache() -> ResourceCache {
        let mut manifest = Manifest::new();
        manifest.add_asset("a.txt");
        ResourceCache::new()
            .with_resolver(manifest)
            .with_reader(MemoryReader::new().with("a.txt", "alpha"))
    }

    #[test]
    fn test_unknown_key_creates_nothing() {
        let mut cache = text_cache();
        let err = cache.load_asset_async::<String>("missing.txt", None).unwrap_err();
        assert!(matches!(err, LoadError::NotFound { .. }));
        assert!(cache.load_bundle_async("missing", None).is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.loading_count(), 0);
    }

    #[test]
    fn test_coalesced_requests_begin_once() {
        let witness = Witness::default();
        let mut cache = witness_cache(&witness);
        let fired = Rc::new(RefCell::new(0));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let fired = fired.clone();
            let listener: Listener = Box::new(move |_: &Loadable| *fired.borrow_mut() += 1);
            handles.push(cache.load_bundle_async("ui/title.txt", Some(listener)).unwrap());
        }
        assert_eq!(handles[0], handles[1]);
        assert_eq!(cache.ref_count(handles[0]), 2);
        assert_eq!(witness.0.borrow().begins, 1);

        cache.tick();
        assert_eq!(*fired.borrow(), 0);

        witness.resolve(Ok(()));
        cache.tick();
        assert_eq!(*fired.borrow(), 2);
        assert_eq!(cache.archive(handles[0]), Some(ArchiveHandle(42)));
        assert_eq!(cache.mounted_archive("ui"), Some(ArchiveHandle(42)));
        assert_eq!(witness.0.borrow().begins, 1);
        assert_eq!(cache.loading_count(), 0);
    }

    #[test]
    fn test_release_while_loading_waits_for_completion() {
        let witness = Witness::default();
        let mut cache = witness_cache(&witness);
        let handle = cache.load_bundle_async("ui/title.txt", None).unwrap();

        assert!(cache.release(handle));
        assert_eq!(cache.unused_count(), 1);
        assert_eq!(witness.0.borrow().unused, 1);

        cache.tick();
        cache.tick();
        assert_eq!(cache.status(handle), LoadableStatus::Loading);

        witness.resolve(Ok(()));
        cache.tick();
        assert_eq!(cache.status(handle), LoadableStatus::Unloaded);
        assert_eq!(witness.0.borrow().teardowns, 1);
        assert!(cache.find_bundle("ui_1").is_none());
        assert!(cache.mounted_archive("ui").is_none());
    }

    #[test]
    fn test_resurrected_instance_is_not_reloaded() {
        let witness = Witness::default();
        witness.resolve(Ok(()));
        let mut cache = witness_cache(&witness).with_eviction_gate(|| true);

        let handle = cache.load_bundle_async("ui/title.txt", None).unwrap();
        cache.tick();
        cache.release(handle);
        cache.tick();
        assert_eq!(cache.unused_count(), 1);

        let again = cache.load_bundle_async("ui/title.txt", None).unwrap();
        assert_eq!(again, handle);
        assert_eq!(cache.unused_count(), 0);
        assert_eq!(cache.ref_count(handle), 1);
        assert_eq!(witness.0.borrow().begins, 1);
    }

    #[test]
    fn test_over_release_keeps_count_at_zero() {
        let mut cache = text_cache();
        let handle = cache.load_asset::<String>("a.txt").unwrap();

        assert!(cache.release(handle));
        assert!(!cache.release(handle));
        assert_eq!(cache.ref_count(handle), 0);
    }

    #[test]
    fn test_failed_load_releases_itself() {
        let witness = Witness::default();
        let eviction = GateSwitch::new();
        let mut cache = witness_cache(&witness).with_eviction_gate(eviction.clone());
        let handle = cache.load_bundle_async("ui/title.txt", None).unwrap();

        eviction.activate();
        witness.resolve(Err("corrupt archive".to_string()));
        cache.tick();
        assert_eq!(cache.status(handle), LoadableStatus::FailedToLoad);
        assert_eq!(cache.error(handle), Some("corrupt archive"));
        assert_eq!(cache.progress(handle), 1.0);
        assert_eq!(cache.ref_count(handle), 0);
        assert_eq!(cache.unused_count(), 1);

        eviction.clear();
        cache.tick();
        assert!(cache.is_empty());
        assert!(cache.find_bundle("ui_1").is_none());
    }

    #[test]
    fn test_unsupported_immediate_is_withdrawn() {
        let witness = Witness::default();
        let mut cache = witness_cache(&witness);

        let err = cache.load_bundle("ui/title.txt").unwrap_err();
        assert!(matches!(err, LoadError::Unsupported { strategy: "Witness", .. }));
        assert_eq!(cache.loading_count(), 0);
        assert_eq!(cache.unused_count(), 1);
        let id = cache.find_bundle("ui_1").unwrap();
        assert_eq!(cache.ref_count(id), 0);
    }

    #[test]
    fn test_immediate_failure_is_reference_neutral() {
        let witness = Witness::default();
        witness.0.borrow_mut().blocking = true;
        witness.resolve(Err("no space".to_string()));
        let mut cache = witness_cache(&witness);

        let err = cache.load_bundle("ui/title.txt").unwrap_err();
        assert!(matches!(err, LoadError::Failed { ref message, .. } if message == "no space"));
        let id = cache.find_bundle("ui_1").unwrap();
        assert_eq!(cache.ref_count(id), 0);
        assert_eq!(cache.loading_count(), 0);
    }

    #[test]
    fn test_immediate_load_that_never_finishes_fails() {
        let witness = Witness::default();
        witness.0.borrow_mut().blocking = true;
        let mut cache = witness_cache(&witness);

        let err = cache.load_bundle("ui/title.txt").unwrap_err();
        let LoadError::Failed { message, .. } = err else {
            panic!("expected a failed load");
        };
        assert!(message.contains("did not complete"));
    }

    #[test]
    fn test_type_mismatch() {
        let mut cache = text_cache();
        let _text = cache.load_asset::<String>("a.txt").unwrap();
        let err = cache.load_asset::<Vec<u8>>("a.txt").unwrap_err();
        assert!(matches!(err, LoadError::TypeMismatch { expected: "Bytes", .. }));
    }

    #[test]
    fn test_busy_gate_stops_the_tick() {
        let busy = GateSwitch::new();
        let mut cache = text_cache().with_busy_gate(busy.clone());
        let handle = cache.load_asset_async::<String>("a.txt", None).unwrap();

        busy.activate();
        cache.tick();
        assert_eq!(cache.status(handle), LoadableStatus::Loading);

        busy.clear();
        cache.tick();
        assert_eq!(cache.status(handle), LoadableStatus::SuccessToLoad);
        assert_eq!(cache.asset(handle).as_deref().map(String::as_str), Some("alpha"));
    }

    #[test]
    fn test_stale_handle_reports_unloaded() {
        let mut cache = text_cache();
        let handle = cache.load_asset::<String>("a.txt").unwrap();
        cache.release(handle);
        cache.tick();

        assert_eq!(cache.status(handle), LoadableStatus::Unloaded);
        assert!(cache.is_done(handle));
        assert!(cache.asset(handle).is_none());
        assert!(!cache.release(handle));

        let fresh = cache.load_asset::<String>("a.txt").unwrap();
        assert_ne!(fresh, handle);
    }

    #[test]
    fn test_events_follow_the_lifecycle() {
        let mut cache = text_cache();
        let handle = cache.load_asset_async::<String>("a.txt", None).unwrap();
        cache.tick();
        cache.release(handle);
        cache.tick();

        let events: Vec<_> = cache.drain_events().collect();
        assert_eq!(events.len(), 2);
        assert!(events[0].is_loaded());
        assert!(events[1].is_unloaded());
        assert_eq!(events[1].key(), "a.txt");
    }

    #[test]
    fn test_completion_metrics() {
        let mut cache = text_cache();
        let handle = cache.load_asset_async::<String>("a.txt", None).unwrap();
        cache.tick();

        let loadable = cache.get(handle).unwrap();
        assert_eq!(loadable.frames(), Some(1));
        assert!(loadable.elapsed().is_some());
        assert_eq!(loadable.strategy_name(), "LocalAsset");
    }
}
