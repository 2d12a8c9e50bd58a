//! Resource registry and watch notification service.
//!
//! Holds the dynamic target registry and the static topology of a
//! load-balancing overlay, answers hierarchical queries against them and
//! pushes filtered views to long-lived gRPC watchers.
//!
//! Leaf-first: [`resource`] (identity and filters), [`storage`] (stores),
//! [`watch`] (dispatch), [`keepalive`] (liveness), [`chain`] (handler chain),
//! [`topology`], and the gRPC surface in [`grpc`].

mod config;
mod constants;
mod errors;
mod network;
mod node;

pub mod chain;
pub mod keepalive;
pub mod metrics;
pub mod proto;
pub mod resource;
pub mod storage;
pub mod topology;
pub mod watch;

pub use config::*;
pub use errors::*;
pub use network::*;
pub use node::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
