//! Profiling utilities based on the `puffin` crate.
//!
//! With the `profiling` feature disabled the scope macros expand to nothing,
//! so instrumented code does not need its own `cfg` guards.

#[cfg(feature = "profiling")]
pub use puffin::{profile_function, profile_scope};

#[cfg(not(feature = "profiling"))]
pub use crate::{__noop_profile_function as profile_function, __noop_profile_scope as profile_scope};

#[doc(hidden)]
#[macro_export]
macro_rules! __noop_profile_function {
    ($($arg:tt)*) => {};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __noop_profile_scope {
    ($($arg:tt)*) => {};
}

/// Address the puffin HTTP server binds to.
pub const PUFFIN_ADDR: &str = "0.0.0.0:8585";

#[cfg(feature = "profiling")]
static PROFILING_SERVER: std::sync::OnceLock<puffin_http::Server> = std::sync::OnceLock::new();

/// Enable puffin scopes and start the HTTP server on [`PUFFIN_ADDR`].
///
/// # Example
/// ```no_run
/// stowage_core::profiling::init_profiling();
/// ```
#[cfg(feature = "profiling")]
pub fn init_profiling() {
    puffin::set_scopes_on(true);

    match puffin_http::Server::new(PUFFIN_ADDR) {
        Ok(server) => {
            tracing::info!("Puffin profiler server started on http://{}", PUFFIN_ADDR);
            let _ = PROFILING_SERVER.set(server);
        }
        Err(e) => {
            tracing::error!("Failed to start puffin server: {}", e);
        }
    }
}

/// No-op when the `profiling` feature is disabled.
#[cfg(not(feature = "profiling"))]
pub fn init_profiling() {}

/// Mark the start of a new profiler frame.
///
/// Call once per frame, next to the cache tick, so captured scopes line up
/// with frames.
#[inline]
pub fn new_frame() {
    #[cfg(feature = "profiling")]
    puffin::GlobalProfiler::lock().new_frame();
}
