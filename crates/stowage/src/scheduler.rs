//! The per-tick driver.
//!
//! Each tick polls every in-flight request, completes those that finished,
//! then reclaims instances nobody references any more. Both passes honour
//! the busy gate; reclamation also waits on the eviction gate.

use stowage_core::profiling::profile_function;

use crate::cache::ResourceCache;
use crate::gate::{Gate, Open};
use crate::handle::LoadableId;

pub(crate) struct Scheduler {
    /// One entry per outstanding `load` call. Duplicates are intentional.
    pub(crate) loading: Vec<LoadableId>,
    pub(crate) unused: Vec<LoadableId>,
    pub(crate) frame: u64,
    pub(crate) busy: Box<dyn Gate>,
    pub(crate) eviction: Box<dyn Gate>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            loading: Vec::new(),
            unused: Vec::new(),
            frame: 0,
            busy: Box::new(Open),
            eviction: Box::new(Open),
        }
    }
}

impl Scheduler {
    pub(crate) fn enqueue(&mut self, id: LoadableId) {
        self.loading.push(id);
    }

    /// Drop one in-flight entry for `id`, newest first.
    pub(crate) fn withdraw(&mut self, id: LoadableId) -> bool {
        match self.loading.iter().rposition(|entry| *entry == id) {
            Some(index) => {
                self.loading.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn mark_unused(&mut self, id: LoadableId) {
        if !self.unused.contains(&id) {
            self.unused.push(id);
        }
    }

    /// Take `id` back off the reclaim list.
    pub(crate) fn resurrect(&mut self, id: LoadableId) {
        self.unused.retain(|entry| *entry != id);
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.busy.is_active()
    }

    pub(crate) fn eviction_suspended(&self) -> bool {
        self.eviction.is_active()
    }
}

impl ResourceCache {
    /// Advance every in-flight load by one step and reclaim unused instances.
    ///
    /// Call once per frame from the thread that owns the cache.
    pub fn tick(&mut self) {
        profile_function!();
        self.scheduler.frame += 1;

        let mut index = 0;
        while index < self.scheduler.loading.len() {
            if self.scheduler.is_busy() {
                return;
            }
            let id = self.scheduler.loading[index];
            self.update(id);
            if !self.is_done(id) {
                index += 1;
                continue;
            }
            self.scheduler.loading.remove(index);
            self.complete(id);
        }

        if self.scheduler.eviction_suspended() {
            return;
        }
        self.reclaim_unused();
    }

    fn reclaim_unused(&mut self) {
        let mut index = 0;
        while index < self.scheduler.unused.len() {
            if self.scheduler.is_busy() {
                break;
            }
            let id = self.scheduler.unused[index];
            if !self.is_done(id) {
                index += 1;
                continue;
            }
            self.scheduler.unused.remove(index);
            if self.ref_count(id) > 0 {
                continue;
            }
            self.unload(id);
        }
    }
}
