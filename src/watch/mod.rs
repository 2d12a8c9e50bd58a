//! Watch subscriptions and change dispatch.
//!
//! ```text
//! Set/Remove (store write lock held):
//!   mutate -> ChangeEvent -> Dispatcher::dispatch(snapshot)
//!                               |
//!                               v  filter per watcher, send_replace (never blocks)
//!                          single-slot channel
//!                               |
//!                               v
//!   RegistryWatcher::next() -> gRPC stream
//! ```
//!
//! Each watcher owns a single-slot `tokio::sync::watch` channel. A burst of
//! mutations collapses to the latest filtered view; the dispatcher never waits
//! on a slow consumer.

mod dispatcher;
mod notifier;
mod registry_watcher;
pub use dispatcher::*;
pub use notifier::*;
pub use registry_watcher::*;

#[cfg(test)]
mod dispatcher_test;
