//! Lifecycle events for polling consumers.
//!
//! Completion callbacks are the primary notification path; the event buffer
//! lets a consumer that prefers polling observe the same transitions once
//! per frame.

use crate::handle::LoadableId;

/// Events emitted by the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadEvent {
    /// An instance reached `SuccessToLoad`.
    Loaded {
        id: LoadableId,
        key: String,
    },

    /// An instance reached `FailedToLoad`.
    Failed {
        id: LoadableId,
        key: String,
        error: String,
    },

    /// An instance was torn down and removed from its registry.
    Unloaded {
        id: LoadableId,
        key: String,
    },
}

impl LoadEvent {
    pub fn id(&self) -> LoadableId {
        match self {
            LoadEvent::Loaded { id, .. }
            | LoadEvent::Failed { id, .. }
            | LoadEvent::Unloaded { id, .. } => *id,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            LoadEvent::Loaded { key, .. }
            | LoadEvent::Failed { key, .. }
            | LoadEvent::Unloaded { key, .. } => key,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadEvent::Loaded { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, LoadEvent::Failed { .. })
    }

    pub fn is_unloaded(&self) -> bool {
        matches!(self, LoadEvent::Unloaded { .. })
    }
}

/// A buffer of events drained by the consumer.
#[derive(Debug, Default)]
pub struct LoadEventBuffer {
    events: Vec<LoadEvent>,
}

impl LoadEventBuffer {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(&mut self, event: LoadEvent) {
        self.events.push(event);
    }

    /// Drain all buffered events.
    pub fn drain(&mut self) -> impl Iterator<Item = LoadEvent> + '_ {
        self.events.drain(..)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoadEvent> {
        self.events.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::alloc::sparse_set::IndexSlot;

    #[test]
    fn test_event_buffer() {
        let id = LoadableId(IndexSlot::new(0, 0));
        let mut buffer = LoadEventBuffer::new();
        assert!(buffer.is_empty());

        buffer.push(LoadEvent::Loaded {
            id,
            key: "a.txt".into(),
        });
        buffer.push(LoadEvent::Unloaded {
            id,
            key: "a.txt".into(),
        });
        assert_eq!(buffer.len(), 2);

        let drained: Vec<_> = buffer.drain().collect();
        assert!(drained[0].is_loaded());
        assert!(drained[1].is_unloaded());
        assert_eq!(drained[1].key(), "a.txt");
        assert!(buffer.is_empty());
    }
}
