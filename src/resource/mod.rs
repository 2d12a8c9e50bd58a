//! Resource kinds handled by the registries.
//!
//! Every kind stored in a [`crate::storage::ResourceStore`] implements
//! [`Resource`], a small adapter that supplies the composite identity, the
//! filter semantics and the set of fields that may change in place. The
//! generated protobuf messages are the resources themselves.

mod filter;
mod identity;
pub use filter::*;
pub use identity::*;


use std::fmt;
use std::fmt::Debug;

use crate::proto::Attractor;
use crate::proto::Conduit;
use crate::proto::Flow;
use crate::proto::Gateway;
use crate::proto::Stream;
use crate::proto::Target;
use crate::proto::Trench;
use crate::proto::Vip;

/// Discriminates the resource families a dispatcher or event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Target,
    Trench,
    Conduit,
    Stream,
    Flow,
    Vip,
    Attractor,
    Gateway,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Target => "target",
            ResourceKind::Trench => "trench",
            ResourceKind::Conduit => "conduit",
            ResourceKind::Stream => "stream",
            ResourceKind::Flow => "flow",
            ResourceKind::Vip => "vip",
            ResourceKind::Attractor => "attractor",
            ResourceKind::Gateway => "gateway",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emitted by a store after a committed mutation. Carries no payload:
/// recipients re-read the filtered view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ResourceKind,
}

impl ChangeEvent {
    pub fn new(kind: ResourceKind) -> Self {
        Self { kind }
    }
}

/// Per-kind adapter used by the generic store and dispatcher.
///
/// `Default` is the zero-value template: a default value used as a filter
/// matches every candidate.
pub trait Resource: Clone + Debug + Default + PartialEq + Send + Sync + 'static {
    const KIND: ResourceKind;

    /// Stable composite key. Equal keys mean "the same resource".
    fn identity(&self) -> String;

    /// Whether `candidate` satisfies `filter`. `None` matches everything.
    fn matches(
        filter: Option<&Self>,
        candidate: &Self,
    ) -> bool;

    /// Applies an update for an already stored value with the same identity.
    ///
    /// Identity fields are immutable, so the default replaces the value
    /// wholesale; kinds with a narrower mutable surface override this.
    fn merge(
        &mut self,
        update: Self,
    ) {
        *self = update;
    }
}

impl Resource for Target {
    const KIND: ResourceKind = ResourceKind::Target;

    fn identity(&self) -> String {
        target_identity(self)
    }

    fn matches(
        filter: Option<&Self>,
        candidate: &Self,
    ) -> bool {
        target_matches(filter, Some(candidate))
    }

    /// Only status and context change on refresh.
    fn merge(
        &mut self,
        update: Self,
    ) {
        self.context = update.context;
        self.status = update.status;
    }
}

impl Resource for Trench {
    const KIND: ResourceKind = ResourceKind::Trench;

    fn identity(&self) -> String {
        trench_identity(Some(self))
    }

    fn matches(
        filter: Option<&Self>,
        candidate: &Self,
    ) -> bool {
        trench_matches(filter, Some(candidate))
    }
}

impl Resource for Conduit {
    const KIND: ResourceKind = ResourceKind::Conduit;

    fn identity(&self) -> String {
        conduit_identity(Some(self))
    }

    fn matches(
        filter: Option<&Self>,
        candidate: &Self,
    ) -> bool {
        conduit_matches(filter, Some(candidate))
    }
}

impl Resource for Stream {
    const KIND: ResourceKind = ResourceKind::Stream;

    fn identity(&self) -> String {
        stream_identity(Some(self))
    }

    fn matches(
        filter: Option<&Self>,
        candidate: &Self,
    ) -> bool {
        stream_matches(filter, Some(candidate))
    }
}

impl Resource for Flow {
    const KIND: ResourceKind = ResourceKind::Flow;

    fn identity(&self) -> String {
        flow_identity(self)
    }

    fn matches(
        filter: Option<&Self>,
        candidate: &Self,
    ) -> bool {
        flow_matches(filter, Some(candidate))
    }
}

impl Resource for Vip {
    const KIND: ResourceKind = ResourceKind::Vip;

    fn identity(&self) -> String {
        vip_identity(self)
    }

    fn matches(
        filter: Option<&Self>,
        candidate: &Self,
    ) -> bool {
        vip_matches(filter, Some(candidate))
    }
}

impl Resource for Attractor {
    const KIND: ResourceKind = ResourceKind::Attractor;

    fn identity(&self) -> String {
        attractor_identity(self)
    }

    fn matches(
        filter: Option<&Self>,
        candidate: &Self,
    ) -> bool {
        attractor_matches(filter, Some(candidate))
    }
}

impl Resource for Gateway {
    const KIND: ResourceKind = ResourceKind::Gateway;

    fn identity(&self) -> String {
        gateway_identity(self)
    }

    fn matches(
        filter: Option<&Self>,
        candidate: &Self,
    ) -> bool {
        gateway_matches(filter, Some(candidate))
    }
}
