//! Network surface of the registry.
//!
//! Only gRPC is served. The service adapters translate between tonic
//! requests and the chain and notifier, which never see transport types
//! apart from the watch sink.
pub mod grpc;
