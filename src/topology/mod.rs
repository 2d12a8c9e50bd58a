//! Static topology pushed by an operator.
//!
//! [`TopologyRegistry`] keeps one volatile store per topology kind. A
//! [`TopologyDocument`] is the flat, name-referencing form an operator
//! writes; converting it resolves every reference into nested resources and
//! the registry applies the result as one snapshot per kind.

mod document;
mod registry;
pub use document::*;
pub use registry::*;
