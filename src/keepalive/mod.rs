//! Liveness tracking for registered targets.
//!
//! [`KeepAliveRegistry`] decorates a target store. Every `set` refreshes a
//! per-target lease; a lease that is not refreshed within the configured
//! timeout removes its target exactly as an explicit unregister would.
//!
//! # Concurrency Model
//!
//! - The lease table is one `parking_lot::Mutex`. `set`, `remove` and timer
//!   expiry all run under it, so a refresh can never interleave with an
//!   eviction of the same target.
//! - Each lease carries a generation number. A refresh replaces the lease
//!   with a new generation and cancels the old timer; a timer that fires
//!   anyway finds a different generation and does nothing.

mod registry;
pub use registry::*;
