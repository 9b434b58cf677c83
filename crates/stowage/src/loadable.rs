//! The cached instance and its load state.

use std::any::{Any, TypeId};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::Asset;
use crate::mount::ArchiveHandle;
use crate::reference::Reference;
use crate::resolver::BundleDescriptor;
use crate::status::LoadableStatus;
use crate::strategy::LoadStrategy;

/// Completion callback. Runs once, on the tick that completes the request
/// it was attached to (or immediately for a synchronous load).
pub type Listener = Box<dyn FnOnce(&Loadable)>;

/// Highest progress reported while a load is still in flight.
const MAX_IN_FLIGHT_PROGRESS: f32 = 1.0 - f32::EPSILON;

/// What a finished load produced.
#[derive(Clone)]
pub enum Payload {
    Asset(Arc<dyn Any + Send + Sync>),
    Archive(ArchiveHandle),
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Asset(_) => f.write_str("Payload::Asset(..)"),
            Payload::Archive(archive) => f.debug_tuple("Payload::Archive").field(archive).finish(),
        }
    }
}

/// The two kinds of resource the cache manages.
#[derive(Debug, Clone)]
pub enum ResourceKind {
    Asset {
        type_id: TypeId,
        type_name: &'static str,
    },
    Bundle {
        descriptor: BundleDescriptor,
    },
}

impl ResourceKind {
    pub fn asset<T: Asset>() -> Self {
        ResourceKind::Asset {
            type_id: TypeId::of::<T>(),
            type_name: T::type_name(),
        }
    }

    pub fn bundle(descriptor: BundleDescriptor) -> Self {
        ResourceKind::Bundle { descriptor }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResourceKind::Asset { .. } => "Asset",
            ResourceKind::Bundle { .. } => "Bundle",
        }
    }

    pub fn is_bundle(&self) -> bool {
        matches!(self, ResourceKind::Bundle { .. })
    }

    pub fn descriptor(&self) -> Option<&BundleDescriptor> {
        match self {
            ResourceKind::Bundle { descriptor } => Some(descriptor),
            ResourceKind::Asset { .. } => None,
        }
    }
}

/// Mutable load state. Strategies see it through a
/// [`LoadContext`](crate::strategy::LoadContext).
#[derive(Debug, Default)]
pub struct LoadState {
    status: LoadableStatus,
    progress: f32,
    error: Option<String>,
    payload: Option<Payload>,
    must_complete_now: bool,
}

impl LoadState {
    pub fn status(&self) -> LoadableStatus {
        self.status
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn must_complete_now(&self) -> bool {
        self.must_complete_now
    }

    pub fn is_done(&self) -> bool {
        self.status.is_done()
    }

    /// Raise progress while in flight. Never lowers it and never reaches 1.
    pub fn report_progress(&mut self, progress: f32) {
        if !self.status.is_loading() || progress.is_nan() {
            return;
        }
        let progress = progress.clamp(0.0, MAX_IN_FLIGHT_PROGRESS);
        if progress > self.progress {
            self.progress = progress;
        }
    }

    /// Switch between `Loading` and its sub-states.
    pub fn set_stage(&mut self, stage: LoadableStatus) {
        if self.status.is_loading() && stage.is_loading() {
            self.status = stage;
        }
    }

    /// Finish the load. An absent or empty error means success.
    pub fn finish(&mut self, error: Option<String>) {
        if !self.status.is_loading() {
            return;
        }
        self.progress = 1.0;
        match error.filter(|e| !e.is_empty()) {
            Some(error) => {
                self.error = Some(error);
                self.status = LoadableStatus::FailedToLoad;
            }
            None => {
                self.error = None;
                self.status = LoadableStatus::SuccessToLoad;
            }
        }
    }

    pub fn succeed(&mut self, payload: Payload) {
        if !self.status.is_loading() {
            return;
        }
        self.payload = Some(payload);
        self.finish(None);
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        let error = error.into();
        let error = if error.is_empty() {
            "unknown error".to_string()
        } else {
            error
        };
        self.finish(Some(error));
    }

    pub(crate) fn begin(&mut self) {
        self.status = LoadableStatus::Loading;
        self.progress = 0.0;
    }

    pub(crate) fn set_must_complete_now(&mut self, value: bool) {
        self.must_complete_now = value;
    }

    pub(crate) fn take_payload(&mut self) -> Option<Payload> {
        self.payload.take()
    }

    pub(crate) fn mark_unloaded(&mut self) {
        self.status = LoadableStatus::Unloaded;
    }
}

#[derive(Debug, Default)]
pub(crate) struct Timing {
    started: Option<Instant>,
    start_frame: u64,
    elapsed: Option<Duration>,
    frames: Option<u64>,
}

impl Timing {
    fn start(&mut self, frame: u64) {
        self.started = Some(Instant::now());
        self.start_frame = frame;
    }

    /// Records the first completion only; returns whether this call recorded it.
    fn record(&mut self, frame: u64) -> bool {
        if self.elapsed.is_some() {
            return false;
        }
        self.elapsed = Some(self.started.map(|s| s.elapsed()).unwrap_or_default());
        self.frames = Some(frame.saturating_sub(self.start_frame));
        true
    }
}

/// One cached resource: its key, state, reference count and strategy.
pub struct Loadable {
    pub(crate) key: String,
    pub(crate) location: String,
    pub(crate) kind: ResourceKind,
    pub(crate) state: LoadState,
    pub(crate) reference: Reference,
    pub(crate) timing: Timing,
    pub(crate) listeners: Vec<Listener>,
    pub(crate) strategy: Box<dyn LoadStrategy>,
}

impl Loadable {
    pub(crate) fn new(
        key: impl Into<String>,
        location: impl Into<String>,
        kind: ResourceKind,
        strategy: Box<dyn LoadStrategy>,
    ) -> Self {
        Self {
            key: key.into(),
            location: location.into(),
            kind,
            state: LoadState::default(),
            reference: Reference::new(),
            timing: Timing::default(),
            listeners: Vec::new(),
            strategy,
        }
    }

    /// Cache key: the asset path, or the bundle's hash-qualified name.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Resolved path or URL.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Last path segment of the location, for log lines.
    pub fn file_name(&self) -> &str {
        Path::new(&self.location)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.location)
    }

    pub fn kind(&self) -> &ResourceKind {
        &self.kind
    }

    pub fn status(&self) -> LoadableStatus {
        self.state.status()
    }

    pub fn progress(&self) -> f32 {
        self.state.progress()
    }

    pub fn error(&self) -> Option<&str> {
        self.state.error()
    }

    pub fn is_done(&self) -> bool {
        self.state.is_done()
    }

    pub fn ref_count(&self) -> u32 {
        self.reference.count()
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Wall time from begin-load to first completion.
    pub fn elapsed(&self) -> Option<Duration> {
        self.timing.elapsed
    }

    /// Ticks from begin-load to first completion.
    pub fn frames(&self) -> Option<u64> {
        self.timing.frames
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.state.payload()
    }

    /// The decoded asset, if this is a loaded asset of type `T`.
    pub fn asset<T: Asset>(&self) -> Option<Arc<T>> {
        match self.state.payload()? {
            Payload::Asset(any) => any.clone().downcast::<T>().ok(),
            Payload::Archive(_) => None,
        }
    }

    /// The mounted archive, if this is a loaded bundle.
    pub fn archive(&self) -> Option<ArchiveHandle> {
        match self.state.payload()? {
            Payload::Archive(archive) => Some(*archive),
            Payload::Asset(_) => None,
        }
    }

    pub(crate) fn begin(&mut self, frame: u64) {
        self.state.begin();
        self.timing.start(frame);
    }

    pub(crate) fn record_completion(&mut self, frame: u64) -> bool {
        self.timing.record(frame)
    }
}

impl fmt::Debug for Loadable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loadable")
            .field("key", &self.key)
            .field("kind", &self.kind.name())
            .field("strategy", &self.strategy.name())
            .field("status", &self.state.status)
            .field("progress", &self.state.progress)
            .field("references", &self.reference.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loading() -> LoadState {
        let mut state = LoadState::default();
        state.begin();
        state
    }

    #[test]
    fn test_progress_is_monotonic_and_capped() {
        let mut state = loading();
        state.report_progress(0.4);
        state.report_progress(0.2);
        assert_eq!(state.progress(), 0.4);

        state.report_progress(7.0);
        assert!(state.progress() < 1.0);

        state.finish(None);
        assert_eq!(state.progress(), 1.0);
        state.report_progress(0.1);
        assert_eq!(state.progress(), 1.0);
    }

    #[test]
    fn test_empty_error_is_success() {
        let mut state = loading();
        state.finish(Some(String::new()));
        assert_eq!(state.status(), LoadableStatus::SuccessToLoad);
        assert!(state.error().is_none());
    }

    #[test]
    fn test_fail_records_error() {
        let mut state = loading();
        state.fail("disk on fire");
        assert_eq!(state.status(), LoadableStatus::FailedToLoad);
        assert_eq!(state.error(), Some("disk on fire"));

        let mut state = loading();
        state.fail("");
        assert_eq!(state.status(), LoadableStatus::FailedToLoad);
        assert!(state.error().is_some());
    }

    #[test]
    fn test_finish_only_once() {
        let mut state = loading();
        state.succeed(Payload::Archive(ArchiveHandle(3)));
        state.fail("late");
        assert_eq!(state.status(), LoadableStatus::SuccessToLoad);
        assert!(state.error().is_none());
    }

    #[test]
    fn test_stage_changes_only_in_flight() {
        let mut state = LoadState::default();
        state.set_stage(LoadableStatus::Downloading);
        assert_eq!(state.status(), LoadableStatus::Wait);

        state.begin();
        state.set_stage(LoadableStatus::Downloading);
        assert_eq!(state.status(), LoadableStatus::Downloading);
        state.set_stage(LoadableStatus::SuccessToLoad);
        assert_eq!(state.status(), LoadableStatus::Downloading);
    }

    #[test]
    fn test_timing_recorded_once() {
        let mut timing = Timing::default();
        timing.start(4);
        assert!(timing.record(6));
        assert!(!timing.record(9));
        assert_eq!(timing.frames, Some(2));
    }
}
