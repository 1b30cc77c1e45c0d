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

//! architecture model
//!
//! An architecture is a tree of components. Every component owns its
//! children and its ports; all of them live in one arena ([`Architecture`])
//! and are addressed by [`ComponentId`] / [`PortId`]. Connections go from a
//! source pin to a sink pin. A source pin may drive many sinks, a sink pin
//! is driven at most once.
//!
//! Top-level components of an array are additionally reachable by their
//! grid [`Address`].

use petgraph::Direction;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::{Display, Formatter};

use crate::metadata::Metadata;
use crate::taskgraph::TaskClass;

mod array;
mod tile;
mod topology;

pub(crate) use array::site_core;
pub use array::{build_array, ArrayConfig, SiteConfig};
pub use tile::{build_tile, NUM_FIFOS};
pub use topology::{Address, Heading, Topology};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(usize);

impl ComponentId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(usize);

impl PortId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One bit-lane of a port: `index` is below the port width.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pin {
    pub port: PortId,
    pub index: usize,
}

impl Pin {
    pub fn new(port: PortId, index: usize) -> Self {
        Self { port, index }
    }
}

#[derive(Clone, Debug)]
pub struct Port {
    name: String,
    component: ComponentId,
    direction: Direction,
    width: usize,
}

impl Port {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn component(&self) -> ComponentId {
        self.component
    }
    pub fn direction(&self) -> Direction {
        self.direction
    }
    /// the number of parallel links carried by the port.
    pub fn width(&self) -> usize {
        self.width
    }
    pub fn pins(&self, id: PortId) -> impl Iterator<Item = Pin> {
        (0..self.width).map(move |index| Pin::new(id, index))
    }
}

#[derive(Clone, Debug)]
pub struct Component {
    name: String,
    parent: Option<ComponentId>,
    children: BTreeMap<String, ComponentId>,
    ports: BTreeMap<String, PortId>,
    address: Option<Address>,
    pub metadata: Metadata,
}

impl Component {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn parent(&self) -> Option<ComponentId> {
        self.parent
    }
    pub fn children(&self) -> impl Iterator<Item = (&String, &ComponentId)> {
        self.children.iter()
    }
    pub fn child(&self, name: &str) -> Option<ComponentId> {
        self.children.get(name).copied()
    }
    pub fn ports(&self) -> impl Iterator<Item = (&String, &PortId)> {
        self.ports.iter()
    }
    pub fn port(&self, name: &str) -> Option<PortId> {
        self.ports.get(name).copied()
    }
    /// grid address, only set on the direct children of an array.
    pub fn address(&self) -> Option<Address> {
        self.address
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Connection {
    pub source: Pin,
    pub sink: Pin,
}

#[derive(Clone, Debug)]
pub struct Architecture {
    components: Vec<Component>,
    ports: Vec<Port>,
    connections: Vec<Connection>,
    // sink pin => source pin
    drivers: HashMap<Pin, Pin>,
    sites: BTreeMap<Address, ComponentId>,
    topology: Option<Topology>,
}

impl Architecture {
    /// An architecture with a single, empty root component.
    pub fn new(root_name: &str) -> Self {
        Self {
            components: vec![Component {
                name: root_name.to_string(),
                parent: None,
                children: BTreeMap::new(),
                ports: BTreeMap::new(),
                address: None,
                metadata: Metadata::new(),
            }],
            ports: Vec::new(),
            connections: Vec::new(),
            drivers: HashMap::new(),
            sites: BTreeMap::new(),
            topology: None,
        }
    }

    pub fn root(&self) -> ComponentId {
        ComponentId(0)
    }

    pub fn topology(&self) -> Option<Topology> {
        self.topology
    }

    pub(crate) fn set_topology(&mut self, topology: Topology) {
        self.topology = Some(topology);
    }

    pub fn add_child(&mut self, parent: ComponentId, name: &str) -> ComponentId {
        assert!(
            !self.components[parent.0].children.contains_key(name),
            "{} already has a child named {}",
            self.path_of(parent),
            name
        );
        let id = ComponentId(self.components.len());
        self.components.push(Component {
            name: name.to_string(),
            parent: Some(parent),
            children: BTreeMap::new(),
            ports: BTreeMap::new(),
            address: None,
            metadata: Metadata::new(),
        });
        self.components[parent.0].children.insert(name.to_string(), id);
        id
    }

    /// Place a direct child of the root at a grid address.
    pub(crate) fn add_site(&mut self, address: Address, name: &str) -> ComponentId {
        assert!(
            !self.sites.contains_key(&address),
            "address {} is already occupied",
            address
        );
        let root = self.root();
        let id = self.add_child(root, name);
        self.components[id.0].address = Some(address);
        self.sites.insert(address, id);
        id
    }

    pub fn add_port(
        &mut self,
        component: ComponentId,
        name: &str,
        direction: Direction,
        width: usize,
    ) -> PortId {
        assert!(width > 0, "port {} has no links", name);
        assert!(
            !self.components[component.0].ports.contains_key(name),
            "{} already has a port named {}",
            self.path_of(component),
            name
        );
        let id = PortId(self.ports.len());
        self.ports.push(Port {
            name: name.to_string(),
            component,
            direction,
            width,
        });
        self.components[component.0]
            .ports
            .insert(name.to_string(), id);
        id
    }

    /// Connect one source pin to one sink pin.
    pub fn connect(&mut self, source: Pin, sink: Pin) {
        assert!(
            source.index < self.ports[source.port.0].width,
            "source pin {} out of range",
            self.pin_name(source)
        );
        assert!(
            sink.index < self.ports[sink.port.0].width,
            "sink pin {} out of range",
            self.pin_name(sink)
        );
        if let Some(driver) = self.drivers.get(&sink) {
            panic!(
                "Sink {} already driven by {}",
                self.pin_name(sink),
                self.pin_name(*driver)
            );
        }
        self.drivers.insert(sink, source);
        self.connections.push(Connection { source, sink });
    }

    /// Connect the ports pin by pin; both must have the same width.
    pub fn connect_ports(&mut self, source: PortId, sink: PortId) {
        let width = self.ports[source.0].width;
        assert_eq!(
            width, self.ports[sink.0].width,
            "can not connect ports of different widths"
        );
        for index in 0..width {
            self.connect(Pin::new(source, index), Pin::new(sink, index));
        }
    }

    pub fn component(&self, id: ComponentId) -> &Component {
        &self.components[id.0]
    }

    pub fn component_mut(&mut self, id: ComponentId) -> &mut Component {
        &mut self.components[id.0]
    }

    pub fn port(&self, id: PortId) -> &Port {
        &self.ports[id.0]
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// All components below and including `from`, parents before children.
    pub fn walk(&self, from: ComponentId) -> Vec<ComponentId> {
        fn walk_rec(arch: &Architecture, id: ComponentId, result: &mut Vec<ComponentId>) {
            result.push(id);
            for (_, child) in arch.component(id).children() {
                walk_rec(arch, *child, result);
            }
        }
        let mut result = Vec::new();
        walk_rec(self, from, &mut result);
        result
    }

    /// Look a component up by its dotted path below the root, e.g.
    /// `tile_0_1.processor`. The empty path is the root.
    pub fn find(&self, path: &str) -> Option<ComponentId> {
        if path.is_empty() {
            return Some(self.root());
        }
        path.split('.')
            .try_fold(self.root(), |id, name| self.component(id).child(name))
    }

    /// `path.port`, where `path` is as in [`find`](Self::find).
    pub fn find_port(&self, path: &str) -> Option<PortId> {
        let (component, port) = match path.rfind('.') {
            Some(split) => (&path[..split], &path[split + 1..]),
            None => ("", path),
        };
        self.component(self.find(component)?).port(port)
    }

    pub fn path_of(&self, id: ComponentId) -> String {
        let mut names = Vec::new();
        let mut current = id;
        while let Some(parent) = self.components[current.0].parent {
            names.push(self.components[current.0].name.as_str());
            current = parent;
        }
        names.reverse();
        names.join(".")
    }

    pub fn pin_name(&self, pin: Pin) -> String {
        let port = &self.ports[pin.port.0];
        let path = self.path_of(port.component);
        if path.is_empty() {
            format!("{}[{}]", port.name, pin.index)
        } else {
            format!("{}.{}[{}]", path, port.name, pin.index)
        }
    }

    pub fn ports_of(&self, id: ComponentId) -> Vec<PortId> {
        self.component(id).ports.values().copied().collect()
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn driver(&self, sink: Pin) -> Option<Pin> {
        self.drivers.get(&sink).copied()
    }

    /// the sinks driven by any pin of `port`.
    pub fn fanout(&self, port: PortId) -> Vec<Connection> {
        self.connections
            .iter()
            .filter(|c| c.source.port == port)
            .copied()
            .collect()
    }

    pub fn site(&self, address: Address) -> Option<ComponentId> {
        self.sites.get(&address).copied()
    }

    /// grid sites in address order.
    pub fn sites(&self) -> impl Iterator<Item = (Address, ComponentId)> + '_ {
        self.sites.iter().map(|(a, c)| (*a, *c))
    }

    /// Roles offered by a component and everything it contains.
    pub fn roles_below(&self, id: ComponentId) -> BTreeSet<TaskClass> {
        self.walk(id)
            .into_iter()
            .flat_map(|c| self.component(c).metadata.roles())
            .collect()
    }
}

impl Display for Architecture {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for id in self.walk(self.root()) {
            let depth = self.path_of(id).matches('.').count()
                + if id == self.root() { 0 } else { 1 };
            writeln!(
                f,
                "{:indent$}{} {:?}",
                "",
                self.component(id).name(),
                self.component(id).metadata.roles(),
                indent = 2 * depth
            )?;
        }
        for c in &self.connections {
            writeln!(f, "{} -> {}", self.pin_name(c.source), self.pin_name(c.sink))?;
        }
        Ok(())
    }
}
