//! Generated `nsp.v1` protocol types and gRPC stubs.
//!
//! The message types double as the registry resources; per-kind behavior is
//! attached in [`crate::resource`].

#![allow(clippy::all)]

tonic::include_proto!("nsp.v1");
