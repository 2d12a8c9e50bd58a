use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;

use config::Config;
use config::File;
use config::FileFormat;
use serde::Deserialize;
use tracing::debug;
use tracing::warn;

use super::TopologySnapshot;
use crate::proto::Attractor;
use crate::proto::Conduit;
use crate::proto::Flow;
use crate::proto::Gateway;
use crate::proto::Stream;
use crate::proto::Trench;
use crate::proto::Vip;
use crate::Result;
use crate::StorageError;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrenchEntry {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConduitEntry {
    pub name: String,
    pub trench: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamEntry {
    pub name: String,
    pub conduit: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct FlowEntry {
    pub name: String,
    pub source_subnets: Vec<String>,
    pub destination_port_ranges: Vec<String>,
    pub source_port_ranges: Vec<String>,
    pub protocols: Vec<String>,
    pub vips: Vec<String>,
    pub priority: i32,
    pub stream: String,
    /// Narrows `stream` when several conduits carry a stream of that name.
    pub conduit: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct VipEntry {
    pub name: String,
    pub address: String,
    pub trench: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AttractorEntry {
    pub name: String,
    pub vips: Vec<String>,
    pub gateways: Vec<String>,
    pub trench: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct GatewayEntry {
    pub name: String,
    pub address: String,
    pub remote_asn: u32,
    pub local_asn: u32,
    pub remote_port: u32,
    pub local_port: u32,
    pub ip_family: String,
    pub bfd: bool,
    pub protocol: String,
    pub hold_time: u32,
    pub trench: String,
}

/// Flat, name-referencing topology as written by an operator.
///
/// A document describes a single trench. Every other entry points at its
/// parent by name.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct TopologyDocument {
    pub trench: Option<TrenchEntry>,
    pub conduits: Vec<ConduitEntry>,
    pub streams: Vec<StreamEntry>,
    pub flows: Vec<FlowEntry>,
    pub vips: Vec<VipEntry>,
    pub attractors: Vec<AttractorEntry>,
    pub gateways: Vec<GatewayEntry>,
}

impl TopologyDocument {
    /// Parses a TOML topology document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let document = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(document)
    }

    /// Reads and parses the TOML document at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(StorageError::Topology(format!(
                "topology file {} does not exist",
                path.display()
            ))
            .into());
        }
        debug!(path = %path.display(), "Loading topology document");
        let document = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        Ok(document)
    }

    /// Resolves every name reference into nested resources.
    ///
    /// Entries whose parent cannot be resolved are dropped with a warning.
    /// Conduits, vips, attractors and gateways must belong to the document's
    /// trench. Flow and attractor references to unknown vips or gateways are
    /// left out.
    pub fn convert(&self) -> TopologySnapshot {
        let Some(trench_entry) = &self.trench else {
            if !self.is_empty() {
                warn!("Topology document has no trench, ignoring its entries");
            }
            return TopologySnapshot::default();
        };
        let trench = Trench {
            name: trench_entry.name.clone(),
        };

        let conduits = self.convert_conduits(&trench);
        let streams = self.convert_streams(&conduits);
        let vips = self.convert_vips(&trench);
        let gateways = self.convert_gateways(&trench);
        let flows = self.convert_flows(&streams, &vips);
        let attractors = self.convert_attractors(&trench, &vips, &gateways);

        TopologySnapshot {
            trench: Some(trench),
            conduits: conduits.into_values().collect(),
            streams: streams.into_values().collect(),
            flows,
            vips: vips.into_values().collect(),
            attractors,
            gateways: gateways.into_values().collect(),
        }
    }

    fn is_empty(&self) -> bool {
        self.conduits.is_empty()
            && self.streams.is_empty()
            && self.flows.is_empty()
            && self.vips.is_empty()
            && self.attractors.is_empty()
            && self.gateways.is_empty()
    }

    fn convert_conduits(
        &self,
        trench: &Trench,
    ) -> HashMap<String, Conduit> {
        let mut out = HashMap::new();
        for entry in &self.conduits {
            if entry.trench != trench.name {
                warn!(conduit = %entry.name, trench = %entry.trench, "Conduit references unknown trench, dropped");
                continue;
            }
            out.insert(
                entry.name.clone(),
                Conduit {
                    name: entry.name.clone(),
                    trench: Some(trench.clone()),
                },
            );
        }
        out
    }

    /// Streams keyed by `(conduit, name)`; names are only unique per conduit.
    fn convert_streams(
        &self,
        conduits: &HashMap<String, Conduit>,
    ) -> HashMap<(String, String), Stream> {
        let mut out = HashMap::new();
        for entry in &self.streams {
            let Some(conduit) = conduits.get(&entry.conduit) else {
                warn!(stream = %entry.name, conduit = %entry.conduit, "Stream references unknown conduit, dropped");
                continue;
            };
            out.insert(
                (entry.conduit.clone(), entry.name.clone()),
                Stream {
                    name: entry.name.clone(),
                    conduit: Some(conduit.clone()),
                },
            );
        }
        out
    }

    fn convert_vips(
        &self,
        trench: &Trench,
    ) -> HashMap<String, Vip> {
        let mut out = HashMap::new();
        for entry in &self.vips {
            if entry.trench != trench.name {
                warn!(vip = %entry.name, trench = %entry.trench, "Vip references unknown trench, dropped");
                continue;
            }
            out.insert(
                entry.name.clone(),
                Vip {
                    name: entry.name.clone(),
                    address: entry.address.clone(),
                    trench: Some(trench.clone()),
                },
            );
        }
        out
    }

    fn convert_gateways(
        &self,
        trench: &Trench,
    ) -> HashMap<String, Gateway> {
        let mut out = HashMap::new();
        for entry in &self.gateways {
            if entry.trench != trench.name {
                warn!(gateway = %entry.name, trench = %entry.trench, "Gateway references unknown trench, dropped");
                continue;
            }
            out.insert(
                entry.name.clone(),
                Gateway {
                    name: entry.name.clone(),
                    address: entry.address.clone(),
                    remote_asn: entry.remote_asn,
                    local_asn: entry.local_asn,
                    remote_port: entry.remote_port,
                    local_port: entry.local_port,
                    ip_family: entry.ip_family.clone(),
                    bfd: entry.bfd,
                    protocol: entry.protocol.clone(),
                    hold_time: entry.hold_time,
                    trench: Some(trench.clone()),
                },
            );
        }
        out
    }

    fn convert_flows(
        &self,
        streams: &HashMap<(String, String), Stream>,
        vips: &HashMap<String, Vip>,
    ) -> Vec<Flow> {
        let mut out = Vec::with_capacity(self.flows.len());
        for entry in &self.flows {
            let candidates: Vec<&Stream> = streams
                .iter()
                .filter(|((conduit, name), _)| {
                    *name == entry.stream && (entry.conduit.is_empty() || *conduit == entry.conduit)
                })
                .map(|(_, stream)| stream)
                .collect();
            let stream = match candidates.as_slice() {
                [stream] => *stream,
                [] => {
                    warn!(flow = %entry.name, stream = %entry.stream, "Flow references unknown stream, dropped");
                    continue;
                }
                _ => {
                    warn!(flow = %entry.name, stream = %entry.stream, "Flow stream name is ambiguous, set its conduit; dropped");
                    continue;
                }
            };
            out.push(Flow {
                name: entry.name.clone(),
                source_subnets: entry.source_subnets.clone(),
                destination_port_ranges: entry.destination_port_ranges.clone(),
                source_port_ranges: entry.source_port_ranges.clone(),
                protocols: entry.protocols.clone(),
                priority: entry.priority,
                stream: Some(stream.clone()),
                vips: resolve(&entry.name, "vip", &entry.vips, vips),
            });
        }
        out
    }

    fn convert_attractors(
        &self,
        trench: &Trench,
        vips: &HashMap<String, Vip>,
        gateways: &HashMap<String, Gateway>,
    ) -> Vec<Attractor> {
        let mut out = Vec::with_capacity(self.attractors.len());
        for entry in &self.attractors {
            if entry.trench != trench.name {
                warn!(attractor = %entry.name, trench = %entry.trench, "Attractor references unknown trench, dropped");
                continue;
            }
            out.push(Attractor {
                name: entry.name.clone(),
                trench: Some(trench.clone()),
                vips: resolve(&entry.name, "vip", &entry.vips, vips),
                gateways: resolve(&entry.name, "gateway", &entry.gateways, gateways),
            });
        }
        out
    }
}

/// Looks `names` up in `known`, keeping order and skipping repeats and
/// unknown names.
fn resolve<T: Clone>(
    owner: &str,
    kind: &str,
    names: &[String],
    known: &HashMap<String, T>,
) -> Vec<T> {
    let mut seen = HashSet::new();
    names
        .iter()
        .filter(|name| seen.insert(name.as_str()))
        .filter_map(|name| {
            let found = known.get(name).cloned();
            if found.is_none() {
                warn!(owner, kind, name = %name, "Reference to unknown resource ignored");
            }
            found
        })
        .collect()
}
