use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use super::SlotSender;
use super::WatcherGuard;
use crate::proto::Attractor;
use crate::proto::Conduit;
use crate::proto::Flow;
use crate::proto::Gateway;
use crate::proto::Stream;
use crate::proto::Trench;
use crate::proto::Vip;
use crate::resource::Resource;
use crate::resource::ResourceKind;
use crate::storage::ResourceStore;
use crate::topology::TopologyRegistry;
use crate::RegistryError;
use crate::Result;

/// A filter value for any topology kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TopologyResource {
    Trench(Trench),
    Conduit(Conduit),
    Stream(Stream),
    Flow(Flow),
    Vip(Vip),
    Attractor(Attractor),
    Gateway(Gateway),
}

impl TopologyResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Trench(_) => ResourceKind::Trench,
            Self::Conduit(_) => ResourceKind::Conduit,
            Self::Stream(_) => ResourceKind::Stream,
            Self::Flow(_) => ResourceKind::Flow,
            Self::Vip(_) => ResourceKind::Vip,
            Self::Attractor(_) => ResourceKind::Attractor,
            Self::Gateway(_) => ResourceKind::Gateway,
        }
    }
}

/// A delivery slot for any topology kind.
#[derive(Debug)]
pub enum DeliverySlot {
    Trench(SlotSender<Trench>),
    Conduit(SlotSender<Conduit>),
    Stream(SlotSender<Stream>),
    Flow(SlotSender<Flow>),
    Vip(SlotSender<Vip>),
    Attractor(SlotSender<Attractor>),
    Gateway(SlotSender<Gateway>),
}

impl DeliverySlot {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Trench(_) => ResourceKind::Trench,
            Self::Conduit(_) => ResourceKind::Conduit,
            Self::Stream(_) => ResourceKind::Stream,
            Self::Flow(_) => ResourceKind::Flow,
            Self::Vip(_) => ResourceKind::Vip,
            Self::Attractor(_) => ResourceKind::Attractor,
            Self::Gateway(_) => ResourceKind::Gateway,
        }
    }
}

/// Routes untyped (filter, slot) pairs to the topology store of the right
/// kind.
#[derive(Clone)]
pub struct WatcherNotifier {
    topology: Arc<TopologyRegistry>,
}

impl WatcherNotifier {
    pub fn new(topology: Arc<TopologyRegistry>) -> Self {
        Self { topology }
    }

    pub fn topology(&self) -> &Arc<TopologyRegistry> {
        &self.topology
    }

    /// Registers `slot` for changes matching `filter` and primes it.
    ///
    /// A `None` filter selects every resource of the slot's kind. Dropping
    /// the returned guard unregisters the watcher.
    ///
    /// # Errors
    /// `RegistryError::InvalidSubscription` when `slot` is missing or its
    /// kind differs from the filter's. Nothing is registered in that case.
    pub fn register_watcher(
        &self,
        filter: Option<TopologyResource>,
        slot: Option<DeliverySlot>,
    ) -> Result<WatcherGuard> {
        let Some(slot) = slot else {
            warn!(filter = ?filter.as_ref().map(TopologyResource::kind), "Rejected watcher without delivery slot");
            return Err(RegistryError::InvalidSubscription("delivery slot cannot be nil".to_string()).into());
        };
        let slot_kind = slot.kind();
        let topology = &self.topology;

        let guard = match (filter, slot) {
            (None, DeliverySlot::Trench(s)) => topology.trenches().subscribe(None, s),
            (None, DeliverySlot::Conduit(s)) => topology.conduits().subscribe(None, s),
            (None, DeliverySlot::Stream(s)) => topology.streams().subscribe(None, s),
            (None, DeliverySlot::Flow(s)) => topology.flows().subscribe(None, s),
            (None, DeliverySlot::Vip(s)) => topology.vips().subscribe(None, s),
            (None, DeliverySlot::Attractor(s)) => topology.attractors().subscribe(None, s),
            (None, DeliverySlot::Gateway(s)) => topology.gateways().subscribe(None, s),
            (Some(TopologyResource::Trench(f)), DeliverySlot::Trench(s)) => typed(topology.trenches(), f, s),
            (Some(TopologyResource::Conduit(f)), DeliverySlot::Conduit(s)) => typed(topology.conduits(), f, s),
            (Some(TopologyResource::Stream(f)), DeliverySlot::Stream(s)) => typed(topology.streams(), f, s),
            (Some(TopologyResource::Flow(f)), DeliverySlot::Flow(s)) => typed(topology.flows(), f, s),
            (Some(TopologyResource::Vip(f)), DeliverySlot::Vip(s)) => typed(topology.vips(), f, s),
            (Some(TopologyResource::Attractor(f)), DeliverySlot::Attractor(s)) => {
                typed(topology.attractors(), f, s)
            }
            (Some(TopologyResource::Gateway(f)), DeliverySlot::Gateway(s)) => typed(topology.gateways(), f, s),
            (Some(filter), _) => {
                warn!(filter = %filter.kind(), slot = %slot_kind, "Rejected watcher with mismatched slot");
                return Err(RegistryError::InvalidSubscription("wrong type registered".to_string()).into());
            }
        }?;

        debug!(watcher_id = guard.id(), kind = %slot_kind, "Topology watcher registered");
        Ok(guard)
    }
}

fn typed<R: Resource>(
    store: &dyn ResourceStore<R>,
    filter: R,
    slot: SlotSender<R>,
) -> Result<WatcherGuard> {
    store.subscribe(Some(filter), slot)
}
