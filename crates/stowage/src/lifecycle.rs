//! Instance lifecycle: load, complete, release and unload.
//!
//! Every `load` retains one reference and queues one in-flight entry.
//! Completing a failed load gives that reference back, so a failed request
//! never leaks a count.

use std::mem;

use stowage_core::profiling::profile_function;

use crate::cache::ResourceCache;
use crate::error::{LoadError, LoadResult};
use crate::event::LoadEvent;
use crate::handle::LoadableId;
use crate::loadable::Payload;
use crate::status::LoadableStatus;
use crate::strategy::{LoadContext, LoadStrategy};

impl ResourceCache {
    /// Run a strategy hook against one instance.
    fn drive<R>(
        &mut self,
        id: LoadableId,
        hook: impl FnOnce(&mut dyn LoadStrategy, &mut LoadContext<'_>) -> R,
    ) -> Option<R> {
        let loadable = self.loadables.try_get_mut(id.0)?;
        let mut ctx = LoadContext {
            key: &loadable.key,
            location: &loadable.location,
            kind: &loadable.kind,
            state: &mut loadable.state,
            backends: &mut self.backends,
            mounts: &mut self.registry.mounts,
            config: &self.config,
        };
        Some(hook(loadable.strategy.as_mut(), &mut ctx))
    }

    /// Retain one reference and queue the request; the first request starts the load.
    pub(crate) fn load(&mut self, id: LoadableId) {
        let frame = self.scheduler.frame;
        let Some(loadable) = self.loadables.try_get_mut(id.0) else {
            return;
        };

        let started = loadable.status() != LoadableStatus::Wait;
        if started && loadable.reference.unused() {
            self.scheduler.resurrect(id);
        }
        loadable.reference.retain();
        self.scheduler.enqueue(id);

        if started {
            tracing::trace!(
                "Reuse {} {} ({} references)",
                loadable.kind.name(),
                loadable.file_name(),
                loadable.reference.count()
            );
            return;
        }

        tracing::info!("Load {} {}.", loadable.kind.name(), loadable.file_name());
        loadable.begin(frame);
        self.drive(id, |strategy, ctx| strategy.begin_load(ctx));
    }

    /// Poll the strategy of an in-flight instance.
    pub(crate) fn update(&mut self, id: LoadableId) {
        let in_flight = self
            .loadables
            .try_get(id.0)
            .is_some_and(|loadable| loadable.status().is_loading());
        if in_flight {
            self.drive(id, |strategy, ctx| strategy.poll_tick(ctx));
        }
    }

    /// Deliver a finished request: timing, failure release, callbacks and events.
    pub(crate) fn complete(&mut self, id: LoadableId) {
        let frame = self.scheduler.frame;
        let Some(loadable) = self.loadables.try_get_mut(id.0) else {
            return;
        };
        if loadable.status() == LoadableStatus::Unloaded {
            return;
        }

        let first = loadable.record_completion(frame);
        let listeners = mem::take(&mut loadable.listeners);
        let failed = loadable.status().is_failed();

        if first {
            let event = if failed {
                LoadEvent::Failed {
                    id,
                    key: loadable.key.clone(),
                    error: loadable.error().unwrap_or_default().to_string(),
                }
            } else {
                LoadEvent::Loaded {
                    id,
                    key: loadable.key.clone(),
                }
            };
            self.events.push(event);
        }

        if failed {
            tracing::error!(
                "Unable to load {} {} with error: {}",
                loadable.kind.name(),
                loadable.file_name(),
                loadable.error().unwrap_or_default()
            );
            if loadable.reference.count() > 0 {
                self.release_id(id);
            }
        } else if first {
            tracing::debug!(
                "Loaded {} {} in {:?} ({} frames)",
                loadable.kind.name(),
                loadable.file_name(),
                loadable.elapsed().unwrap_or_default(),
                loadable.frames().unwrap_or_default()
            );
        }

        if let Some(loadable) = self.loadables.try_get(id.0) {
            for listener in listeners {
                listener(loadable);
            }
        }
    }

    /// Give back one reference. At zero the instance is queued for reclamation.
    pub(crate) fn release_id(&mut self, id: LoadableId) -> bool {
        let Some(loadable) = self.loadables.try_get_mut(id.0) else {
            tracing::warn!("Release of a resource that is no longer cached");
            return false;
        };

        if !loadable.reference.release() {
            tracing::warn!(
                "Release {} {} with no outstanding references",
                loadable.kind.name(),
                loadable.file_name()
            );
            return false;
        }

        if loadable.reference.unused() {
            tracing::debug!("{} {} is unused", loadable.kind.name(), loadable.file_name());
            loadable.listeners.clear();
            loadable.strategy.on_unused();
            self.scheduler.mark_unused(id);
        }
        true
    }

    /// Tear the instance down and forget it.
    pub(crate) fn unload(&mut self, id: LoadableId) {
        profile_function!();
        let Some(mut loadable) = self.loadables.try_remove(id.0) else {
            return;
        };
        if loadable.status() == LoadableStatus::Unloaded {
            return;
        }

        tracing::info!("Unload {} {}.", loadable.kind.name(), loadable.file_name());
        loadable.strategy.teardown(&mut self.backends);

        if let Some(Payload::Archive(archive)) = loadable.state.take_payload() {
            self.backends.mounter.unmount(archive, true);
            if let Some(descriptor) = loadable.kind.descriptor() {
                self.registry.mounts.remove_if(&descriptor.name, archive);
            }
        }

        loadable.state.mark_unloaded();
        self.registry.remove(&loadable.kind, &loadable.key, id);
        self.events.push(LoadEvent::Unloaded {
            id,
            key: loadable.key,
        });
    }

    /// Force the request to a terminal state now and deliver it.
    ///
    /// On success the caller keeps the reference retained by `load`. On
    /// failure that reference has already been released.
    pub(crate) fn load_immediate(&mut self, id: LoadableId) -> LoadResult<()> {
        profile_function!();
        let Some(result) = self.drive(id, |strategy, ctx| {
            if ctx.is_done() {
                Ok(())
            } else {
                strategy.load_immediate(ctx)
            }
        }) else {
            return Err(LoadError::InvalidHandle);
        };

        if let Err(e) = result {
            self.scheduler.withdraw(id);
            self.release_id(id);
            return Err(e);
        }

        if !self.is_done(id) {
            self.drive(id, |_, ctx| ctx.fail_stalled());
        }

        self.scheduler.withdraw(id);
        self.complete(id);

        match self.loadables.try_get(id.0) {
            Some(loadable) if loadable.status().is_failed() => Err(LoadError::Failed {
                key: loadable.key.clone(),
                message: loadable.error().unwrap_or_default().to_string(),
            }),
            Some(_) => Ok(()),
            None => Err(LoadError::InvalidHandle),
        }
    }
}
