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

//! application task graph
//!
//! Tasks are nodes, links are directed edges. The graph is built once by
//! [`ingest`] and is read-only afterwards: the placement and routing cost
//! models only look at it.

use petgraph::graph::Edges;
use petgraph::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::metadata::Metadata;
use crate::Error;

mod classify;
mod ingest;
mod weights;

pub use ingest::{ingest, ingest_json, Description, IngestOptions};
pub use ingest::{LinkDefinition, LinkGroups, TaskRecord};
pub use weights::{round_digits, scale_write_count, MEMORY_LINK_WEIGHT, MIN_WEIGHT, NDIGITS};

/// The role a task plays once classification is done.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskClass {
    Processor,
    MemoryProcessor,
    InputHandler,
    OutputHandler,
    Memory1Port,
    Memory2Port,
}

impl TaskClass {
    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory1Port | Self::Memory2Port)
    }

    pub fn is_processor(&self) -> bool {
        matches!(self, Self::Processor | Self::MemoryProcessor)
    }

    pub fn memory_ports(&self) -> usize {
        match self {
            Self::Memory1Port => 1,
            Self::Memory2Port => 2,
            _ => 0,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LinkClass {
    Circuit,
    Packet,
    MemoryRequest,
    MemoryResponse,
}

impl LinkClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Circuit => "circuit",
            Self::Packet => "packet",
            Self::MemoryRequest => "memory_request",
            Self::MemoryResponse => "memory_response",
        }
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, Self::MemoryRequest | Self::MemoryResponse)
    }
}

impl FromStr for LinkClass {
    type Err = Error;

    /// Class names are matched case-insensitively, `-` and ` ` count as `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s
            .trim()
            .to_lowercase()
            .replace(|c: char| c == '-' || c == ' ', "_");
        match normalized.as_str() {
            "circuit" => Ok(Self::Circuit),
            "packet" => Ok(Self::Packet),
            "memory_request" => Ok(Self::MemoryRequest),
            "memory_response" => Ok(Self::MemoryResponse),
            _ => Err(Error::UnknownLinkClass(s.to_string())),
        }
    }
}

impl Display for LinkClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        f.write_str(self.as_str())
    }
}

/// The identity of a link: no two links in a graph share it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkKey {
    pub class: LinkClass,
    pub source: String,
    pub source_index: usize,
    pub dest: String,
    pub dest_index: usize,
}

impl Display for LinkKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "{}:{}[{}]->{}[{}]",
            self.class, self.source, self.source_index, self.dest, self.dest_index
        )
    }
}

#[derive(Clone, Debug)]
pub struct Task {
    name: String,
    class: Option<TaskClass>,
    metadata: Metadata,
}

impl Task {
    pub(crate) fn new(name: &str, metadata: Metadata) -> Self {
        Self {
            name: name.to_string(),
            class: None,
            metadata,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `None` only while the graph is under construction.
    pub fn class(&self) -> Option<TaskClass> {
        self.class
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

#[derive(Clone, Debug)]
pub struct Link {
    key: LinkKey,
    cost: f64,
    route: bool,
    preserve_destination: bool,
    metadata: Metadata,
}

impl Link {
    pub(crate) fn new(key: LinkKey, metadata: Metadata) -> Self {
        let route = key.class != LinkClass::Packet;
        Self {
            key,
            cost: 1.0,
            route,
            preserve_destination: false,
            metadata,
        }
    }

    pub fn key(&self) -> &LinkKey {
        &self.key
    }

    pub fn class(&self) -> LinkClass {
        self.key.class
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// packet links are carried by the packet network and never routed.
    pub fn route(&self) -> bool {
        self.route
    }

    pub fn preserve_destination(&self) -> bool {
        self.preserve_destination
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// A classified, validated task graph.
#[derive(Clone, Debug, Default)]
pub struct TaskGraph {
    pub(crate) graph: Graph<Task, Link>,
    names: HashMap<String, NodeIndex>,
}

impl TaskGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_task(&mut self, task: Task) -> Result<NodeIndex, Error> {
        if self.names.contains_key(task.name()) {
            return Err(Error::DuplicateTask(task.name().to_string()));
        }
        let name = task.name().to_string();
        let index = self.graph.add_node(task);
        self.names.insert(name, index);
        Ok(index)
    }

    pub(crate) fn add_link(&mut self, link: Link) -> Result<EdgeIndex, Error> {
        let src = self.resolve(&link.key.source)?;
        let dst = self.resolve(&link.key.dest)?;
        Ok(self.graph.add_edge(src, dst, link))
    }

    fn resolve(&self, name: &str) -> Result<NodeIndex, Error> {
        self.task_index(name)
            .ok_or_else(|| Error::UnknownTask(name.to_string()))
    }

    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn link_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// returns an iterator over all task indices, in insertion order.
    pub fn iter_tasks(&self) -> petgraph::graph::NodeIndices {
        self.graph.node_indices()
    }

    /// returns an iterator over all link indices, in insertion order.
    pub fn iter_links(&self) -> petgraph::graph::EdgeIndices {
        self.graph.edge_indices()
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.graph.node_weights()
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.graph.edge_weights()
    }

    pub fn task_index(&self, name: &str) -> Option<NodeIndex> {
        self.names.get(name).copied()
    }

    pub fn task_by_name(&self, name: &str) -> Option<&Task> {
        self.task_index(name).map(|index| &self.graph[index])
    }

    pub fn get_task(&self, task: NodeIndex) -> &Task {
        &self.graph[task]
    }

    pub fn get_link(&self, link: EdgeIndex) -> &Link {
        &self.graph[link]
    }

    /// return the (source, dest) task of a link.
    pub fn get_link_endpoints(&self, link: EdgeIndex) -> (NodeIndex, NodeIndex) {
        self.graph
            .edge_endpoints(link)
            .unwrap_or_else(|| panic!("No such link {}", link.index()))
    }

    /// return an iterator over the links arriving at the task
    pub fn get_input_links(&self, task: NodeIndex) -> Edges<Link, Directed> {
        self.graph.edges_directed(task, Direction::Incoming)
    }

    /// return an iterator over the links leaving the task
    pub fn get_output_links(&self, task: NodeIndex) -> Edges<Link, Directed> {
        self.graph.edges_directed(task, Direction::Outgoing)
    }

    /// Links entering `name`, or `None` when there is no such task.
    pub fn incoming(&self, name: &str) -> Option<Vec<&Link>> {
        self.task_index(name).map(|index| {
            self.get_input_links(index)
                .map(|e| e.weight())
                .collect()
        })
    }

    /// Links leaving `name`, or `None` when there is no such task.
    pub fn outgoing(&self, name: &str) -> Option<Vec<&Link>> {
        self.task_index(name).map(|index| {
            self.get_output_links(index)
                .map(|e| e.weight())
                .collect()
        })
    }

    /// Distinct tasks connected to `task` by a link in either direction.
    pub fn neighbors(&self, task: NodeIndex) -> BTreeSet<NodeIndex> {
        self.graph.neighbors_undirected(task).collect()
    }

    /// look a link up by its identifying key.
    pub fn find_link(&self, key: &LinkKey) -> Option<EdgeIndex> {
        let src = self.task_index(&key.source)?;
        self.get_output_links(src)
            .find(|e| e.weight().key() == key)
            .map(|e| e.id())
    }

    pub fn to_graphviz(&self) -> String {
        use petgraph::dot::{Config, Dot};

        let generator = Dot::with_attr_getters(
            &self.graph,
            &[Config::NodeNoLabel, Config::EdgeNoLabel],
            &|_, edge| {
                format!(
                    "label=\"{}\ncost = {}\"; headlabel=\"{}\"; taillabel=\"{}\"",
                    edge.weight().class(),
                    edge.weight().cost(),
                    edge.weight().key().dest_index,
                    edge.weight().key().source_index,
                )
            },
            &|_, node| format!("label=\"{}\n{:?}\"", node.1.name(), node.1.class()),
        );
        format!("{:?}", generator)
    }

    pub(crate) fn set_class(&mut self, task: NodeIndex, class: TaskClass) {
        self.graph[task].class = Some(class);
    }

    pub(crate) fn link_mut(&mut self, link: EdgeIndex) -> &mut Link {
        &mut self.graph[link]
    }

    pub(crate) fn set_cost(&mut self, link: EdgeIndex, cost: f64) {
        self.graph[link].cost = cost;
    }

    pub(crate) fn set_preserve_destination(&mut self, link: EdgeIndex, preserve: bool) {
        self.graph[link].preserve_destination = preserve;
    }
}

impl Display for TaskGraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_graphviz())
    }
}
