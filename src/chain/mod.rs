//! Chain of responsibility for the target registry service.
//!
//! Every link implements the whole [`TargetRegistryLink`] contract and holds
//! the next link, which is a [`TerminalLink`] until [`build_chain`] wires it.
//! A link does its own work and then forwards, so persistence, liveness and
//! streaming stay in separate links.

mod link;
mod registry_link;
mod watch_responder;
pub use link::*;
pub use registry_link::*;
pub use watch_responder::*;

#[cfg(test)]
mod watch_responder_test;
