use tracing::info;

use crate::proto::Attractor;
use crate::proto::Conduit;
use crate::proto::Flow;
use crate::proto::Gateway;
use crate::proto::Stream;
use crate::proto::Trench;
use crate::proto::Vip;
use crate::storage::MemoryStore;
use crate::Result;

/// Fully resolved topology, one list per kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopologySnapshot {
    pub trench: Option<Trench>,
    pub conduits: Vec<Conduit>,
    pub streams: Vec<Stream>,
    pub flows: Vec<Flow>,
    pub vips: Vec<Vip>,
    pub attractors: Vec<Attractor>,
    pub gateways: Vec<Gateway>,
}

/// One store per topology kind.
#[derive(Default)]
pub struct TopologyRegistry {
    trenches: MemoryStore<Trench>,
    conduits: MemoryStore<Conduit>,
    streams: MemoryStore<Stream>,
    flows: MemoryStore<Flow>,
    vips: MemoryStore<Vip>,
    attractors: MemoryStore<Attractor>,
    gateways: MemoryStore<Gateway>,
}

impl TopologyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every kind with the content of `snapshot`.
    ///
    /// Kinds are replaced parent-first. Each kind emits at most one change
    /// event, and none if its content did not change.
    pub fn apply(
        &self,
        snapshot: TopologySnapshot,
    ) -> Result<()> {
        info!(
            trench = ?snapshot.trench.as_ref().map(|t| t.name.as_str()),
            conduits = snapshot.conduits.len(),
            streams = snapshot.streams.len(),
            flows = snapshot.flows.len(),
            vips = snapshot.vips.len(),
            attractors = snapshot.attractors.len(),
            gateways = snapshot.gateways.len(),
            "Applying topology"
        );
        self.trenches.replace_all(snapshot.trench.into_iter().collect())?;
        self.conduits.replace_all(snapshot.conduits)?;
        self.streams.replace_all(snapshot.streams)?;
        self.vips.replace_all(snapshot.vips)?;
        self.gateways.replace_all(snapshot.gateways)?;
        self.flows.replace_all(snapshot.flows)?;
        self.attractors.replace_all(snapshot.attractors)?;
        Ok(())
    }

    pub fn trenches(&self) -> &MemoryStore<Trench> {
        &self.trenches
    }

    pub fn conduits(&self) -> &MemoryStore<Conduit> {
        &self.conduits
    }

    pub fn streams(&self) -> &MemoryStore<Stream> {
        &self.streams
    }

    pub fn flows(&self) -> &MemoryStore<Flow> {
        &self.flows
    }

    pub fn vips(&self) -> &MemoryStore<Vip> {
        &self.vips
    }

    pub fn attractors(&self) -> &MemoryStore<Attractor> {
        &self.attractors
    }

    pub fn gateways(&self) -> &MemoryStore<Gateway> {
        &self.gateways
    }
}
