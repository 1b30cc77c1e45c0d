// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use petgraph::prelude::*;
use serde::{Deserialize, Serialize};

use super::heap::{Handle, RatioHeap};
use super::rank::Rank;
use crate::arch::{Address, Component, Topology};
use crate::taskgraph::{Task, TaskGraph};
use crate::Error;

/// Penalty for a constrained task on a resource that does not accept it.
pub const DEFAULT_ADDRESS_PENALTY: f64 = 5.0;
/// Coefficient of the rank-ratio objective.
pub const DEFAULT_RANK_PENALTY: f64 = 1.0;

/// A two-terminal placement edge with a static weight.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PlacementChannel {
    link: EdgeIndex,
    source: NodeIndex,
    sink: NodeIndex,
    weight: f64,
}

impl PlacementChannel {
    /// Build a channel for `link` from its resolved terminals. The model
    /// only knows about one driver and one receiver per link.
    pub fn new(
        link: EdgeIndex,
        sources: &[NodeIndex],
        sinks: &[NodeIndex],
        weight: f64,
    ) -> Result<Self, Error> {
        match (sources, sinks) {
            (&[source], &[sink]) => Ok(Self {
                link,
                source,
                sink,
                weight,
            }),
            _ => {
                log::error!(
                    "link {} resolves to {} sources and {} sinks",
                    link.index(),
                    sources.len(),
                    sinks.len()
                );
                Err(Error::ChannelFanout {
                    link: link.index(),
                    sources: sources.len(),
                    sinks: sinks.len(),
                })
            }
        }
    }

    pub fn from_link(graph: &TaskGraph, link: EdgeIndex) -> Result<Self, Error> {
        let (src, dst) = graph.get_link_endpoints(link);
        Self::new(link, &[src], &[dst], graph.get_link(link).cost())
    }

    pub fn link(&self) -> EdgeIndex {
        self.link
    }
    pub fn source(&self) -> NodeIndex {
        self.source
    }
    pub fn sink(&self) -> NodeIndex {
        self.sink
    }
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// weight x hops between the two endpoint addresses.
    pub fn cost(&self, topology: Topology, source: Address, sink: Address) -> f64 {
        self.weight * topology.distance(source, sink) as f64
    }
}

/// Cost model selector, as read from a configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Plain,
    Ranked,
    Heterogeneous,
}

impl Default for ModelKind {
    fn default() -> Self {
        Self::Plain
    }
}

/// Per-node state; its shape depends on the cost model.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeState {
    Plain,
    Ranked {
        rank: f64,
        handle: Handle,
    },
    Heterogeneous {
        constrained: bool,
    },
}

/// Per-address data; its shape depends on the cost model.
#[derive(Clone, Debug, PartialEq)]
pub enum AddressData {
    Plain,
    Ranked { rank: f64 },
    Heterogeneous { accepts_constrained: bool },
}

/// The placement cost flavors.
///
/// * `Plain`: distance weighted link costs only.
/// * `Ranked`: adds `penalty x max(r_node / r_addr)` over all nodes.
/// * `Heterogeneous`: adds `penalty` for every constrained node on an
///   address that does not accept it.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum CostModel {
    Plain,
    Ranked { penalty: f64 },
    Heterogeneous { penalty: f64 },
}

impl CostModel {
    pub fn new(kind: ModelKind) -> Self {
        match kind {
            ModelKind::Plain => Self::Plain,
            ModelKind::Ranked => Self::Ranked {
                penalty: DEFAULT_RANK_PENALTY,
            },
            ModelKind::Heterogeneous => Self::Heterogeneous {
                penalty: DEFAULT_ADDRESS_PENALTY,
            },
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            Self::Plain => ModelKind::Plain,
            Self::Ranked { .. } => ModelKind::Ranked,
            Self::Heterogeneous { .. } => ModelKind::Heterogeneous,
        }
    }

    pub fn penalty(&self) -> f64 {
        match self {
            Self::Plain => 0.0,
            Self::Ranked { penalty } | Self::Heterogeneous { penalty } => *penalty,
        }
    }

    pub fn set_penalty(&mut self, value: f64) {
        match self {
            Self::Plain => {}
            Self::Ranked { penalty } | Self::Heterogeneous { penalty } => *penalty = value,
        }
    }

    pub fn edge_cost(
        &self,
        channel: &PlacementChannel,
        topology: Topology,
        source: Address,
        sink: Address,
    ) -> f64 {
        channel.cost(topology, source, sink)
    }

    pub fn address_cost(&self, node: &NodeState, address: &AddressData) -> f64 {
        match (self, node, address) {
            (
                Self::Heterogeneous { penalty },
                NodeState::Heterogeneous { constrained: true },
                AddressData::Heterogeneous {
                    accepts_constrained: false,
                },
            ) => *penalty,
            _ => 0.0,
        }
    }

    /// Node state for `task`. Ranked nodes get a heap entry seeded with 0.0,
    /// which never wins over a real ratio.
    pub fn build_node(&self, task: &Task, rank: Option<Rank>, heap: &mut RatioHeap) -> NodeState {
        match self {
            Self::Plain => NodeState::Plain,
            Self::Ranked { .. } => NodeState::Ranked {
                rank: rank.map_or(0.0, |r| r.normalized),
                handle: heap.insert(0.0),
            },
            Self::Heterogeneous { .. } => NodeState::Heterogeneous {
                constrained: task.metadata().constrained(),
            },
        }
    }

    pub fn build_address_data(&self, site: &Component, rank: Option<Rank>) -> AddressData {
        match self {
            Self::Plain => AddressData::Plain,
            Self::Ranked { .. } => AddressData::Ranked {
                rank: rank.map_or(1.0, |r| r.normalized),
            },
            Self::Heterogeneous { .. } => AddressData::Heterogeneous {
                accepts_constrained: site.metadata.accepts_constrained(),
            },
        }
    }

    /// `r_node / r_addr` for ranked models, 0 otherwise.
    pub fn ratio(&self, node: &NodeState, address: &AddressData) -> f64 {
        match (node, address) {
            (NodeState::Ranked { rank, .. }, AddressData::Ranked { rank: r_addr }) => {
                rank / r_addr
            }
            _ => 0.0,
        }
    }

    pub fn aux_cost(&self, heap: &RatioHeap) -> f64 {
        match self {
            Self::Ranked { penalty } => penalty * heap.max_key().unwrap_or(0.0),
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::Architecture;
    use crate::taskgraph::*;
    use std::collections::BTreeMap;

    fn two_tasks() -> TaskGraph {
        let mut constrained = TaskRecord::new("b", "Processor");
        constrained.constrained = true;
        let tasks = vec![TaskRecord::new("a", "Processor"), constrained];
        let mut circuit = BTreeMap::new();
        circuit.insert(
            "g".to_string(),
            vec![LinkDefinition::new("a", 0, "b", 0)],
        );
        let mut links = LinkGroups::new();
        links.insert("circuit".to_string(), circuit);
        ingest(&tasks, &links, &IngestOptions::default()).unwrap()
    }

    #[test]
    fn channel_cost() {
        let graph = two_tasks();
        let link = graph.iter_links().next().unwrap();
        let channel = PlacementChannel::from_link(&graph, link).unwrap();
        assert_eq!(channel.weight(), 1.0);
        let model = CostModel::Plain;
        let (a, b) = (Address::new(0, 0), Address::new(2, 1));
        assert_eq!(model.edge_cost(&channel, Topology::Cardinal, a, b), 3.0);
        assert_eq!(model.edge_cost(&channel, Topology::Hex, a, b), 3.0);
        assert_eq!(model.edge_cost(&channel, Topology::Cardinal, a, a), 0.0);
    }

    #[test]
    fn channel_fanout_rejected() {
        let n = |i| NodeIndex::new(i);
        let link = EdgeIndex::new(4);
        assert_eq!(
            PlacementChannel::new(link, &[n(0)], &[n(1), n(2)], 1.0),
            Err(Error::ChannelFanout {
                link: 4,
                sources: 1,
                sinks: 2
            })
        );
        assert!(PlacementChannel::new(link, &[], &[n(1)], 1.0).is_err());
    }

    #[test]
    fn heterogeneous_penalty() {
        let graph = two_tasks();
        let model = CostModel::new(ModelKind::Heterogeneous);
        let mut heap = RatioHeap::new();
        let a = graph.task_by_name("a").unwrap();
        let b = graph.task_by_name("b").unwrap();
        let neutral = model.build_node(a, None, &mut heap);
        let constrained = model.build_node(b, None, &mut heap);
        assert!(heap.is_empty());

        let mut arch = Architecture::new("array");
        let root = arch.root();
        let plain = arch.add_child(root, "plain");
        let accepting = arch.add_child(root, "accepting");
        arch.component_mut(accepting)
            .metadata
            .set_accepts_constrained(true);
        let plain = model.build_address_data(arch.component(plain), None);
        let accepting = model.build_address_data(arch.component(accepting), None);

        assert_eq!(model.address_cost(&neutral, &plain), 0.0);
        assert_eq!(model.address_cost(&constrained, &accepting), 0.0);
        assert_eq!(
            model.address_cost(&constrained, &plain),
            DEFAULT_ADDRESS_PENALTY
        );
        assert_eq!(model.aux_cost(&heap), 0.0);
    }

    #[test]
    fn ranked_ratio() {
        let graph = two_tasks();
        let mut model = CostModel::new(ModelKind::Ranked);
        let mut heap = RatioHeap::new();
        let node = model.build_node(
            graph.task_by_name("a").unwrap(),
            Some(Rank {
                raw: 3.0,
                normalized: 0.5,
            }),
            &mut heap,
        );
        let arch = Architecture::new("array");
        let address = model.build_address_data(
            arch.component(arch.root()),
            Some(Rank {
                raw: 1.0,
                normalized: 0.25,
            }),
        );
        assert_eq!(model.ratio(&node, &address), 2.0);
        // seeded, not yet placed
        assert_eq!(model.aux_cost(&heap), 0.0);
        if let NodeState::Ranked { handle, .. } = &node {
            heap.update_key(*handle, model.ratio(&node, &address));
        }
        assert_eq!(model.aux_cost(&heap), 2.0);
        model.set_penalty(0.5);
        assert_eq!(model.aux_cost(&heap), 1.0);
        assert_eq!(model.kind(), ModelKind::Ranked);
    }
}
