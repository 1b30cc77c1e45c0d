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
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;
use std::collections::{BTreeMap, BTreeSet};

use super::cost::{AddressData, CostModel, NodeState, PlacementChannel};
use super::heap::RatioHeap;
use super::rank::{self, Rank};
use crate::arch::{Address, Architecture, Topology};
use crate::taskgraph::{TaskClass, TaskGraph};
use crate::Error;

/// One placement of a task graph onto the sites of an architecture.
///
/// The session owns the grid (address => task), the task positions and the
/// rank-ratio heap. The optimizer drives it through `move_node` and `swap`;
/// after every call the heap maximum is the maximum ratio over all tasks.
/// Unplaced tasks have ratio 0.
#[derive(Clone, Debug)]
pub struct Placement<'a> {
    graph: &'a TaskGraph,
    arch: &'a Architecture,
    topology: Topology,
    model: CostModel,
    nodes: Vec<NodeState>,
    ranks: Vec<Option<Rank>>,
    positions: Vec<Option<Address>>,
    grid: BTreeMap<Address, NodeIndex>,
    address_data: BTreeMap<Address, AddressData>,
    // sorted addresses that offer the task's role
    legal: Vec<Vec<Address>>,
    channels: Vec<PlacementChannel>,
    // task => channels touching it
    incident: Vec<Vec<usize>>,
    heap: RatioHeap,
}

impl<'a> Placement<'a> {
    /// An empty placement: nothing is placed and every heap entry holds its
    /// seed key.
    pub fn new(
        graph: &'a TaskGraph,
        arch: &'a Architecture,
        model: CostModel,
    ) -> Result<Self, Error> {
        let topology = arch.topology().ok_or_else(|| {
            Error::InvalidArray(format!(
                "{} is not an array",
                arch.component(arch.root()).name()
            ))
        })?;

        let sites: Vec<_> = arch.sites().collect();
        let site_ranks = rank::normalize(
            &sites
                .iter()
                .map(|(_, site)| arch.component(*site).metadata.rank())
                .collect::<Vec<_>>(),
        );
        let mut address_data = BTreeMap::new();
        let mut roles = BTreeMap::new();
        for ((address, site), rank) in sites.iter().zip(site_ranks) {
            address_data.insert(
                *address,
                model.build_address_data(arch.component(*site), rank),
            );
            roles.insert(*address, arch.roles_below(*site));
        }

        let ranks = rank::normalize(
            &graph
                .tasks()
                .map(|task| task.metadata().rank())
                .collect::<Vec<_>>(),
        );
        let mut heap = RatioHeap::with_capacity(graph.task_count());
        let mut nodes = Vec::with_capacity(graph.task_count());
        let mut legal = Vec::with_capacity(graph.task_count());
        for (task, rank) in graph.tasks().zip(ranks.iter()) {
            nodes.push(model.build_node(task, *rank, &mut heap));
            legal.push(legal_addresses(&roles, task.class()));
        }

        let mut channels = Vec::with_capacity(graph.link_count());
        let mut incident = vec![Vec::new(); graph.task_count()];
        for link in graph.iter_links() {
            let channel = PlacementChannel::from_link(graph, link)?;
            incident[channel.source().index()].push(channels.len());
            if channel.sink() != channel.source() {
                incident[channel.sink().index()].push(channels.len());
            }
            channels.push(channel);
        }

        log::debug!(
            "{:?} placement of {} tasks onto {} sites, {} channels",
            model.kind(),
            graph.task_count(),
            address_data.len(),
            channels.len()
        );
        Ok(Self {
            graph,
            arch,
            topology,
            model,
            nodes,
            ranks,
            positions: vec![None; graph.task_count()],
            grid: BTreeMap::new(),
            address_data,
            legal,
            channels,
            incident,
            heap,
        })
    }

    pub fn graph(&self) -> &'a TaskGraph {
        self.graph
    }

    pub fn arch(&self) -> &'a Architecture {
        self.arch
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn model(&self) -> &CostModel {
        &self.model
    }

    pub fn channels(&self) -> &[PlacementChannel] {
        &self.channels
    }

    pub fn rank(&self, node: NodeIndex) -> Option<Rank> {
        self.ranks[node.index()]
    }

    pub fn position(&self, node: NodeIndex) -> Option<Address> {
        self.positions[node.index()]
    }

    pub fn occupant(&self, address: Address) -> Option<NodeIndex> {
        self.grid.get(&address).copied()
    }

    /// Placed tasks and their addresses, in task order.
    pub fn placed(&self) -> impl Iterator<Item = (NodeIndex, Address)> + '_ {
        self.positions
            .iter()
            .enumerate()
            .filter_map(|(i, p)| p.map(|address| (NodeIndex::new(i), address)))
    }

    pub fn is_complete(&self) -> bool {
        self.positions.iter().all(Option::is_some)
    }

    /// Addresses whose site offers the role of `node`.
    pub fn legal_addresses(&self, node: NodeIndex) -> &[Address] {
        &self.legal[node.index()]
    }

    pub fn can_occupy(&self, node: NodeIndex, address: Address) -> bool {
        self.legal[node.index()].binary_search(&address).is_ok()
    }

    /// Place `node` at the free address `to`, leaving its old address.
    pub fn move_node(&mut self, node: NodeIndex, to: Address) {
        assert!(self.address_data.contains_key(&to), "{} is not a site", to);
        match self.grid.get(&to) {
            Some(&other) if other == node => return,
            Some(&other) => panic!(
                "{} is occupied by {}",
                to,
                self.graph.get_task(other).name()
            ),
            None => {}
        }
        if let Some(from) = self.positions[node.index()].take() {
            self.grid.remove(&from);
        }
        self.grid.insert(to, node);
        self.positions[node.index()] = Some(to);
        self.refresh(node);
        #[cfg(feature = "check-aux-heap")]
        self.check_aux();
    }

    /// Exchange the addresses of two tasks. Either may be unplaced.
    pub fn swap(&mut self, a: NodeIndex, b: NodeIndex) {
        if a == b {
            return;
        }
        let pa = self.positions[a.index()];
        let pb = self.positions[b.index()];
        self.positions[a.index()] = pb;
        self.positions[b.index()] = pa;
        if let Some(address) = pa {
            self.grid.insert(address, b);
        }
        if let Some(address) = pb {
            self.grid.insert(address, a);
        }
        // both positions are final before either ratio is looked at
        self.refresh(a);
        self.refresh(b);
        #[cfg(feature = "check-aux-heap")]
        self.check_aux();
    }

    fn refresh(&mut self, node: NodeIndex) {
        let ratio = self.ratio(node);
        if let NodeState::Ranked { handle, .. } = &self.nodes[node.index()] {
            let handle = *handle;
            self.heap.update_key(handle, ratio);
        }
    }

    #[cfg(feature = "check-aux-heap")]
    fn check_aux(&self) {
        assert!(self.heap.is_consistent());
        assert_eq!(self.peek_ratio(), self.max_ratio_scan());
    }

    /// `r_node / r_addr` at the current position of `node`.
    pub fn ratio(&self, node: NodeIndex) -> f64 {
        match self.positions[node.index()] {
            Some(address) => self
                .model
                .ratio(&self.nodes[node.index()], &self.address_data[&address]),
            None => 0.0,
        }
    }

    /// Heap maximum, O(1).
    pub fn peek_ratio(&self) -> f64 {
        self.heap.max_key().unwrap_or(0.0)
    }

    /// The same as [`peek_ratio`](Self::peek_ratio), by a full scan.
    pub fn max_ratio_scan(&self) -> f64 {
        (0..self.nodes.len())
            .map(|i| self.ratio(NodeIndex::new(i)))
            .fold(0.0, f64::max)
    }

    pub fn aux_cost(&self) -> f64 {
        self.model.aux_cost(&self.heap)
    }

    pub fn penalty(&self) -> f64 {
        self.model.penalty()
    }

    pub fn set_penalty(&mut self, penalty: f64) {
        self.model.set_penalty(penalty);
    }

    pub fn halve_penalty(&mut self) -> f64 {
        let penalty = self.model.penalty() / 2.0;
        self.model.set_penalty(penalty);
        log::debug!("penalty lowered to {}", penalty);
        penalty
    }

    /// Cost of a channel, if both of its ends are placed.
    pub fn channel_cost(&self, channel: usize) -> Option<f64> {
        let channel = &self.channels[channel];
        let source = self.positions[channel.source().index()]?;
        let sink = self.positions[channel.sink().index()]?;
        Some(self.model.edge_cost(channel, self.topology, source, sink))
    }

    pub fn address_cost(&self, node: NodeIndex) -> f64 {
        match self.positions[node.index()] {
            Some(address) => self
                .model
                .address_cost(&self.nodes[node.index()], &self.address_data[&address]),
            None => 0.0,
        }
    }

    /// Everything a move of `node` can change, except the auxiliary term:
    /// its channels and its address cost.
    pub fn node_cost(&self, node: NodeIndex) -> f64 {
        let channels: f64 = self.incident[node.index()]
            .iter()
            .filter_map(|&c| self.channel_cost(c))
            .sum();
        channels + self.address_cost(node)
    }

    /// Channel costs, address costs and the auxiliary term. Only defined
    /// once every task is placed.
    pub fn total_cost(&self) -> Result<f64, Error> {
        if let Some(i) = self.positions.iter().position(Option::is_none) {
            let name = self.graph.get_task(NodeIndex::new(i)).name();
            return Err(Error::Unplaced(name.to_string()));
        }
        let channels: f64 = (0..self.channels.len())
            .filter_map(|c| self.channel_cost(c))
            .sum();
        let addresses: f64 = (0..self.nodes.len())
            .map(|i| self.address_cost(NodeIndex::new(i)))
            .sum();
        Ok(channels + addresses + self.aux_cost())
    }

    /// Unplace everything and put every heap entry back on its seed key.
    pub fn reset(&mut self) {
        self.grid.clear();
        for position in self.positions.iter_mut() {
            *position = None;
        }
        for node in &self.nodes {
            if let NodeState::Ranked { handle, .. } = node {
                self.heap.update_key(*handle, 0.0);
            }
        }
    }

    /// Place every unplaced task on a random free legal address. Tasks with
    /// the fewest legal addresses go first.
    ///
    /// On failure the placement is reset.
    pub fn initial_placement(&mut self, seed: u64) -> Result<(), Error> {
        let mut rng = Xoshiro256StarStar::seed_from_u64(seed);
        let mut order: Vec<NodeIndex> = self.graph.iter_tasks().collect();
        order.sort_by_key(|node| self.legal[node.index()].len());
        for node in order {
            if self.positions[node.index()].is_some() {
                continue;
            }
            let free: Vec<Address> = self.legal[node.index()]
                .iter()
                .filter(|address| !self.grid.contains_key(address))
                .copied()
                .collect();
            match free.choose(&mut rng) {
                Some(&address) => self.move_node(node, address),
                None => {
                    let name = self.graph.get_task(node).name().to_string();
                    log::error!("no free site left for {}", name);
                    self.reset();
                    return Err(Error::NoLegalAddress(name));
                }
            }
        }
        log::debug!("initial placement with seed {}", seed);
        Ok(())
    }
}

fn legal_addresses(
    roles: &BTreeMap<Address, BTreeSet<TaskClass>>,
    class: Option<TaskClass>,
) -> Vec<Address> {
    match class {
        Some(class) => roles
            .iter()
            .filter(|(_, offered)| offered.contains(&class))
            .map(|(address, _)| *address)
            .collect(),
        None => Vec::new(),
    }
}
