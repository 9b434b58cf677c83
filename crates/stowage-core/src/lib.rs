//! Stowage Core
//!
//! Shared foundations for the stowage resource cache: hashed collections,
//! the generational arena that owns every cached instance, logging and
//! profiling bootstrap.

pub mod alloc;
pub mod logging;
pub mod profiling;
