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

//! Routing channels handed to the external router.

use petgraph::prelude::*;
use std::cmp::Ordering;

use crate::arch::{site_core, Architecture, ComponentId, Pin, Topology};
use crate::place::Placement;
use crate::taskgraph::TaskClass;
use crate::Error;

/// One routable link: for every terminal the set of equivalent pins the
/// route may start or stop at, and the link cost.
///
/// Channels compare by cost only, cheapest first.
#[derive(Clone, Debug)]
pub struct RoutingChannel {
    pub link: EdgeIndex,
    pub start: Vec<Vec<Pin>>,
    pub stop: Vec<Vec<Pin>>,
    pub cost: f64,
}

impl PartialEq for RoutingChannel {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RoutingChannel {}

impl PartialOrd for RoutingChannel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RoutingChannel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost.total_cmp(&other.cost)
    }
}

fn port_pins(arch: &Architecture, component: ComponentId, name: &str) -> Result<Vec<Pin>, Error> {
    match arch.component(component).port(name) {
        Some(port) => Ok(arch.port(port).pins(port).collect()),
        None => Err(Error::MissingPort {
            component: arch.path_of(component),
            port: name.to_string(),
        }),
    }
}

/// All pins of the directional ports of `component` named by `port_name`.
fn directional_pins<F>(
    arch: &Architecture,
    component: ComponentId,
    topology: Topology,
    port_name: F,
) -> Result<Vec<Pin>, Error>
where
    F: Fn(&crate::arch::Heading) -> String,
{
    let mut pins = Vec::new();
    for heading in topology.directions() {
        pins.extend(port_pins(arch, component, &port_name(heading))?);
    }
    Ok(pins)
}

/// Build the routing channels of a complete placement, cheapest first.
///
/// Links with `route == false` get no channel. Any link into or out of a
/// memory, whatever its class, runs from `memory_out` of the source to
/// `memory_in` of the sink. Other links start on any directional output of
/// the source core and stop on the destination FIFO; when the destination
/// index must be preserved only that FIFO is legal. Output handlers accept
/// on any of their inputs.
pub fn routing_channels(placement: &Placement) -> Result<Vec<RoutingChannel>, Error> {
    let graph = placement.graph();
    let arch = placement.arch();
    let topology = placement.topology();

    let site_of = |node: NodeIndex| -> Result<ComponentId, Error> {
        let address = placement
            .position(node)
            .ok_or_else(|| Error::Unplaced(graph.get_task(node).name().to_string()))?;
        arch.site(address)
            .ok_or_else(|| Error::InvalidArray(format!("no site at {}", address)))
    };

    let mut channels = Vec::new();
    for link_id in graph.iter_links() {
        let link = graph.get_link(link_id);
        if !link.route() {
            continue;
        }
        let (src, dst) = graph.get_link_endpoints(link_id);
        let src_site = site_of(src)?;
        let dst_site = site_of(dst)?;
        let src_core = site_core(arch, src_site);
        let dst_core = site_core(arch, dst_site);

        let touches_memory = [src, dst]
            .iter()
            .any(|&task| graph.get_task(task).class().map_or(false, |c| c.is_memory()));
        let (start, stop) = if touches_memory || link.class().is_memory() {
            (
                port_pins(arch, src_core, "memory_out")?,
                port_pins(arch, dst_core, "memory_in")?,
            )
        } else {
            let start = directional_pins(arch, src_core, topology, |h| h.output_port())?;
            let stop = if graph.get_task(dst).class() == Some(TaskClass::OutputHandler) {
                directional_pins(arch, dst_site, topology, |h| h.input_port())?
            } else {
                let fifo = port_pins(arch, dst_core, "fifo")?;
                if link.preserve_destination() {
                    let index = link.key().dest_index;
                    match fifo.get(index) {
                        Some(&pin) => vec![pin],
                        None => {
                            return Err(Error::PinIndex {
                                task: link.key().dest.clone(),
                                index,
                                width: fifo.len(),
                            })
                        }
                    }
                } else {
                    fifo
                }
            };
            (start, stop)
        };
        log::trace!(
            "channel {}: {} start pins, {} stop pins",
            link.key(),
            start.len(),
            stop.len()
        );
        channels.push(RoutingChannel {
            link: link_id,
            start: vec![start],
            stop: vec![stop],
            cost: link.cost(),
        });
    }
    channels.sort();
    log::debug!("{} routing channels", channels.len());
    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::{build_array, Address, ArrayConfig, SiteConfig, NUM_FIFOS};
    use crate::place::CostModel;
    use crate::taskgraph::*;
    use std::collections::BTreeMap;

    fn channel(cost: f64) -> RoutingChannel {
        RoutingChannel {
            link: EdgeIndex::new(0),
            start: Vec::new(),
            stop: Vec::new(),
            cost,
        }
    }

    #[test]
    fn ordered_by_cost() {
        let mut channels = vec![channel(1.0), channel(0.125), channel(5.0), channel(0.5)];
        channels.sort();
        let costs: Vec<f64> = channels.iter().map(|c| c.cost).collect();
        assert_eq!(costs, vec![0.125, 0.5, 1.0, 5.0]);
        assert!(channel(0.25) < channel(0.5));
        assert_eq!(channel(0.25), channel(0.25));
    }

    #[test]
    fn pins_follow_link_kind() {
        let _logger = env_logger::builder().try_init();
        let tasks = vec![
            TaskRecord::new("in", "Input"),
            TaskRecord::new("p", "Processor"),
            TaskRecord::new("q", "Processor"),
            TaskRecord::new("m", "Memory"),
            TaskRecord::new("out", "Output"),
        ];
        let group = |defs: Vec<LinkDefinition>| {
            let mut g = BTreeMap::new();
            g.insert("g".to_string(), defs);
            g
        };
        let mut links = LinkGroups::new();
        links.insert(
            "circuit".to_string(),
            group(vec![
                LinkDefinition::new("in", 0, "p", 1),
                LinkDefinition::new("p", 0, "q", 0),
                LinkDefinition::new("q", 0, "out", 0),
            ]),
        );
        links.insert(
            "packet".to_string(),
            group(vec![LinkDefinition::new("q", 1, "p", 0)]),
        );
        links.insert(
            "memory_request".to_string(),
            group(vec![LinkDefinition::new("q", 2, "m", 0)]),
        );
        links.insert(
            "memory_response".to_string(),
            group(vec![LinkDefinition::new("m", 0, "q", 2)]),
        );
        let graph = ingest(&tasks, &links, &IngestOptions::default()).unwrap();

        let config = ArrayConfig::new(2, 3, Topology::Cardinal, 2)
            .with_site(SiteConfig::new(0, 0, TaskClass::InputHandler))
            .with_site(SiteConfig::new(1, 1, TaskClass::MemoryProcessor))
            .with_site(SiteConfig::new(1, 2, TaskClass::Memory1Port))
            .with_site(SiteConfig::new(0, 2, TaskClass::OutputHandler));
        let arch = build_array(&config).unwrap();
        let mut placement = Placement::new(&graph, &arch, CostModel::Plain).unwrap();

        assert!(matches!(routing_channels(&placement), Err(Error::Unplaced(_))));
        placement.initial_placement(5).unwrap();
        assert_eq!(
            placement.position(graph.task_index("q").unwrap()),
            Some(Address::new(1, 1))
        );

        let channels = routing_channels(&placement).unwrap();
        // the packet link is not routed
        assert_eq!(channels.len(), 5);
        assert!(channels.windows(2).all(|w| w[0].cost <= w[1].cost));
        let by_key = |src: &str, dst: &str, class: LinkClass| {
            channels
                .iter()
                .find(|c| {
                    let key = graph.get_link(c.link).key();
                    key.source == src && key.dest == dst && key.class == class
                })
                .unwrap()
        };

        let input = by_key("in", "p", LinkClass::Circuit);
        assert_eq!(input.cost, MIN_WEIGHT);
        assert_eq!(input.stop[0].len(), 1);
        let fifo = input.stop[0][0];
        let p_site = arch
            .site(placement.position(graph.task_index("p").unwrap()).unwrap())
            .unwrap();
        assert_eq!(arch.port(fifo.port).name(), "fifo");
        assert_eq!(arch.port(fifo.port).component(), site_core(&arch, p_site));
        assert_eq!(fifo.index, 1);
        // 4 directions x 2 links
        assert_eq!(input.start[0].len(), 8);

        let out = by_key("q", "out", LinkClass::Circuit);
        assert_eq!(out.stop[0].len(), 8);

        let request = by_key("q", "m", LinkClass::MemoryRequest);
        assert_eq!(request.cost, MEMORY_LINK_WEIGHT);
        assert_eq!(
            arch.pin_name(request.start[0][0]),
            "tile_1_1.processor.memory_out[0]"
        );
        assert_eq!(arch.pin_name(request.stop[0][0]), "memory_1_2.memory_in[0]");
        assert_eq!(channels.last().map(|c| c.cost), Some(MEMORY_LINK_WEIGHT));
    }

    fn circuit(defs: Vec<LinkDefinition>) -> LinkGroups {
        let mut inner = BTreeMap::new();
        inner.insert("g".to_string(), defs);
        let mut links = LinkGroups::new();
        links.insert("circuit".to_string(), inner);
        links
    }

    #[test]
    fn circuit_links_through_memory() {
        let _logger = env_logger::builder().try_init();
        let tasks = vec![
            TaskRecord::new("A", "Processor"),
            TaskRecord::new("M", "Memory"),
            TaskRecord::new("B", "Processor"),
        ];
        let links = circuit(vec![
            LinkDefinition::new("A", 0, "M", 0),
            LinkDefinition::new("M", 0, "B", 0),
        ]);
        let graph = ingest(&tasks, &links, &IngestOptions::default()).unwrap();

        let config = ArrayConfig::new(1, 3, Topology::Cardinal, 2)
            .with_site(SiteConfig::new(0, 0, TaskClass::MemoryProcessor))
            .with_site(SiteConfig::new(0, 1, TaskClass::Memory2Port))
            .with_site(SiteConfig::new(0, 2, TaskClass::MemoryProcessor));
        let arch = build_array(&config).unwrap();
        let mut placement = Placement::new(&graph, &arch, CostModel::Plain).unwrap();
        placement.initial_placement(3).unwrap();
        let core = |name: &str| {
            let address = placement.position(graph.task_index(name).unwrap()).unwrap();
            site_core(&arch, arch.site(address).unwrap())
        };

        let channels = routing_channels(&placement).unwrap();
        assert_eq!(channels.len(), 2);
        for channel in &channels {
            let (src, dst) = graph.get_link_endpoints(channel.link);
            let src = graph.get_task(src).name();
            let dst = graph.get_task(dst).name();
            for &pin in &channel.start[0] {
                assert_eq!(arch.port(pin.port).name(), "memory_out");
                assert_eq!(arch.port(pin.port).component(), core(src));
            }
            for &pin in &channel.stop[0] {
                assert_eq!(arch.port(pin.port).name(), "memory_in");
                assert_eq!(arch.port(pin.port).component(), core(dst));
            }
        }
        assert_eq!(core("M"), arch.site(Address::new(0, 1)).unwrap());
    }

    #[test]
    fn preserved_index_beyond_fifos() {
        let tasks = vec![
            TaskRecord::new("a", "Processor"),
            TaskRecord::new("b", "Processor"),
        ];
        let links = circuit(vec![LinkDefinition::new("a", 0, "b", NUM_FIFOS)]);
        let graph = ingest(&tasks, &links, &IngestOptions::default()).unwrap();
        let arch = build_array(&ArrayConfig::new(1, 2, Topology::Cardinal, 1)).unwrap();
        let mut placement = Placement::new(&graph, &arch, CostModel::Plain).unwrap();
        placement.initial_placement(0).unwrap();
        assert_eq!(
            routing_channels(&placement),
            Err(Error::PinIndex {
                task: "b".to_string(),
                index: NUM_FIFOS,
                width: NUM_FIFOS,
            })
        );
    }

    #[test]
    fn missing_port() {
        let arch = build_array(&ArrayConfig::new(1, 2, Topology::Cardinal, 1)).unwrap();
        let site = arch.site(Address::new(0, 1)).unwrap();
        assert!(port_pins(&arch, site_core(&arch, site), "fifo").is_ok());
        assert_eq!(
            port_pins(&arch, site, "memory_in"),
            Err(Error::MissingPort {
                component: "tile_0_1".to_string(),
                port: "memory_in".to_string(),
            })
        );
    }
}
