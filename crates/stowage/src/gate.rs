//! Predicates the scheduler consults every tick.
//!
//! The *busy* gate is checked before each in-flight instance is polled and
//! stops the whole tick when active. The *eviction* gate is checked once,
//! after in-flight work, and suppresses reclamation while active (for
//! example during a scene transition).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A boolean predicate consulted by the scheduler.
pub trait Gate {
    fn is_active(&self) -> bool;
}

impl<F: Fn() -> bool> Gate for F {
    fn is_active(&self) -> bool {
        self()
    }
}

/// A gate that is never active.
#[derive(Debug, Default, Clone, Copy)]
pub struct Open;

impl Gate for Open {
    fn is_active(&self) -> bool {
        false
    }
}

/// A shared on/off switch.
///
/// Clones observe the same flag, so one copy can be handed to the cache
/// while another is flipped by whoever owns the condition.
#[derive(Debug, Default, Clone)]
pub struct GateSwitch {
    active: Arc<AtomicBool>,
}

impl GateSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    pub fn activate(&self) {
        self.set(true);
    }

    pub fn clear(&self) {
        self.set(false);
    }
}

impl Gate for GateSwitch {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}
