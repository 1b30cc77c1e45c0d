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

use petgraph::Direction;
use std::collections::HashMap;

use super::{Architecture, ComponentId, Pin, Topology};
use crate::taskgraph::TaskClass;

/// Input FIFOs of a processor core.
pub const NUM_FIFOS: usize = 2;

/// a map to remember the next free input slot of each mux. Slots are handed
/// out in the order sources are wired, so no two sources share a slot.
struct SlotAllocator {
    map: HashMap<ComponentId, usize>,
}

impl SlotAllocator {
    fn new() -> Self {
        Self {
            map: HashMap::new(),
        }
    }

    // mark the first `count` slots of the mux as taken
    fn reserve(&mut self, mux: ComponentId, count: usize) {
        *self.map.entry(mux).or_insert(0) += count;
    }

    // return the next available slot
    fn get_next(&mut self, mux: ComponentId) -> usize {
        let value = self.map.entry(mux).or_insert(0);
        let slot = *value;
        *value += 1;
        slot
    }
}

/// A mux with an `in` port of width `fan_in` and an `out` port of width
/// `fan_out`.
pub(super) fn build_mux(
    arch: &mut Architecture,
    parent: ComponentId,
    name: &str,
    fan_in: usize,
    fan_out: usize,
) -> ComponentId {
    let mux = arch.add_child(parent, name);
    arch.add_port(mux, "in", Direction::Incoming, fan_in);
    arch.add_port(mux, "out", Direction::Outgoing, fan_out);
    mux
}

/// The processing core: `fifo` inputs, one output port per direction and,
/// for memory processors, a pair of memory ports.
fn build_processor(
    arch: &mut Architecture,
    parent: ComponentId,
    links: usize,
    topology: Topology,
    include_memory: bool,
) -> ComponentId {
    let core = arch.add_child(parent, "processor");
    arch.add_port(core, "fifo", Direction::Incoming, NUM_FIFOS);
    for heading in topology.directions() {
        arch.add_port(core, &heading.output_port(), Direction::Outgoing, links);
    }
    let metadata = &mut arch.component_mut(core).metadata;
    metadata.add_role(TaskClass::Processor);
    if include_memory {
        arch.add_port(core, "memory_in", Direction::Incoming, 1);
        arch.add_port(core, "memory_out", Direction::Outgoing, 1);
        arch.component_mut(core)
            .metadata
            .add_role(TaskClass::MemoryProcessor);
    }
    core
}

fn port_of(arch: &Architecture, component: ComponentId, name: &str) -> super::PortId {
    arch.component(component)
        .port(name)
        .unwrap_or_else(|| panic!("{} has no port {}", arch.path_of(component), name))
}

/// Fill `tile` with a processor core and the local crossbar connecting it
/// to the tile's directional ports.
///
/// Every direction gets a mux feeding its output port. The core owns the
/// first `links` slots of each direction mux; the remaining slots are taken
/// by the inputs of the other directions. Each FIFO of the core is fed by a
/// mux listening to all directional inputs.
pub(super) fn populate_tile(
    arch: &mut Architecture,
    tile: ComponentId,
    links: usize,
    topology: Topology,
    include_memory: bool,
) {
    assert!(links > 0, "tiles need at least one link per direction");
    let directions = topology.directions();

    for heading in directions {
        arch.add_port(tile, &heading.input_port(), Direction::Incoming, links);
        arch.add_port(tile, &heading.output_port(), Direction::Outgoing, links);
    }
    let core = build_processor(arch, tile, links, topology, include_memory);

    let mut slots = SlotAllocator::new();
    let fan_in = (directions.len() - 1) * links + links;
    let muxes: Vec<ComponentId> = directions
        .iter()
        .map(|heading| {
            let mux = build_mux(arch, tile, &format!("{}_mux", heading.name()), fan_in, 1);
            slots.reserve(mux, links);
            mux
        })
        .collect();
    let fifo_muxes: Vec<ComponentId> = (0..NUM_FIFOS)
        .map(|k| {
            build_mux(
                arch,
                tile,
                &format!("fifo_mux_{}", k),
                directions.len() * links,
                1,
            )
        })
        .collect();

    let fifo = port_of(arch, core, "fifo");
    for (k, &fifo_mux) in fifo_muxes.iter().enumerate() {
        let out = port_of(arch, fifo_mux, "out");
        arch.connect(Pin::new(out, 0), Pin::new(fifo, k));
    }

    for (heading, &mux) in directions.iter().zip(muxes.iter()) {
        let core_out = port_of(arch, core, &heading.output_port());
        let mux_in = port_of(arch, mux, "in");
        let mux_out = port_of(arch, mux, "out");
        let tile_out = port_of(arch, tile, &heading.output_port());
        for i in 0..links {
            arch.connect(Pin::new(core_out, i), Pin::new(mux_in, i));
            arch.connect(Pin::new(mux_out, 0), Pin::new(tile_out, i));
        }
    }

    for (d, heading) in directions.iter().enumerate() {
        let tile_in = port_of(arch, tile, &heading.input_port());
        for i in 0..links {
            let source = Pin::new(tile_in, i);
            // never back out the way it came
            for (e, &mux) in muxes.iter().enumerate() {
                if e == d {
                    continue;
                }
                let mux_in = port_of(arch, mux, "in");
                arch.connect(source, Pin::new(mux_in, slots.get_next(mux)));
            }
            for &fifo_mux in &fifo_muxes {
                let mux_in = port_of(arch, fifo_mux, "in");
                arch.connect(source, Pin::new(mux_in, slots.get_next(fifo_mux)));
            }
        }
    }

    if include_memory {
        let tile_mem_in = arch.add_port(tile, "memory_in", Direction::Incoming, 1);
        let tile_mem_out = arch.add_port(tile, "memory_out", Direction::Outgoing, 1);
        let core_mem_in = port_of(arch, core, "memory_in");
        let core_mem_out = port_of(arch, core, "memory_out");
        arch.connect_ports(tile_mem_in, core_mem_in);
        arch.connect_ports(core_mem_out, tile_mem_out);
    }
    log::trace!(
        "tile {}: {} links x {} directions, memory: {}",
        arch.path_of(tile),
        links,
        directions.len(),
        include_memory
    );
}

/// A memory block with `ports` request/response port pairs.
pub(super) fn populate_memory(arch: &mut Architecture, memory: ComponentId, ports: usize) {
    arch.add_port(memory, "memory_in", Direction::Incoming, ports);
    arch.add_port(memory, "memory_out", Direction::Outgoing, ports);
    let metadata = &mut arch.component_mut(memory).metadata;
    metadata.add_role(TaskClass::Memory1Port);
    if ports > 1 {
        metadata.add_role(TaskClass::Memory2Port);
    }
}

/// I/O handlers sit at the array edge and talk to the tiles around them.
pub(super) fn populate_handler(
    arch: &mut Architecture,
    handler: ComponentId,
    class: TaskClass,
    links: usize,
    topology: Topology,
) {
    for heading in topology.directions() {
        match class {
            TaskClass::InputHandler => {
                arch.add_port(handler, &heading.output_port(), Direction::Outgoing, links);
            }
            TaskClass::OutputHandler => {
                arch.add_port(handler, &heading.input_port(), Direction::Incoming, links);
            }
            _ => panic!("{:?} is not a handler", class),
        }
    }
    arch.component_mut(handler).metadata.add_role(class);
}

/// Generate a single tile with `links` links per direction.
///
/// The result only depends on the arguments: two calls produce the same
/// components, ports and connections in the same order.
pub fn build_tile(links: usize, topology: Topology, include_memory: bool) -> Architecture {
    let mut arch = Architecture::new("tile");
    let root = arch.root();
    populate_tile(&mut arch, root, links, topology, include_memory);
    arch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::{Connection, Heading};
    use std::collections::BTreeSet;

    fn sink_components(arch: &Architecture, source: Pin) -> BTreeSet<String> {
        arch.connections()
            .iter()
            .filter(|c| c.source == source)
            .map(|c| arch.path_of(arch.port(c.sink.port).component()))
            .collect()
    }

    #[test]
    fn cardinal_two_links() {
        let _logger = env_logger::builder().try_init();
        let links = 2;
        let arch = build_tile(links, Topology::Cardinal, false);

        for heading in Topology::Cardinal.directions() {
            let mux = arch.find(&format!("{}_mux", heading.name())).unwrap();
            let mux_in = arch.component(mux).port("in").unwrap();
            // 3 other directions x 2 links + 2 slots owned by the core
            assert_eq!(arch.port(mux_in).width(), 3 * 2 + 2);
            for pin in arch.port(mux_in).pins(mux_in) {
                assert!(arch.driver(pin).is_some(), "{} undriven", arch.pin_name(pin));
            }
            // the core owns the reserved slots
            let core_out = arch
                .find_port(&format!("processor.{}", heading.output_port()))
                .unwrap();
            assert_eq!(arch.driver(Pin::new(mux_in, 0)), Some(Pin::new(core_out, 0)));
            assert_eq!(arch.driver(Pin::new(mux_in, 1)), Some(Pin::new(core_out, 1)));

            let tile_in = arch.find_port(&heading.input_port()).unwrap();
            for pin in arch.port(tile_in).pins(tile_in) {
                let sinks = sink_components(&arch, pin);
                assert_eq!(sinks.len(), 5, "{:?}", sinks);
                assert!(!sinks.contains(&format!("{}_mux", heading.name())));
                assert!(sinks.contains("fifo_mux_0"));
                assert!(sinks.contains("fifo_mux_1"));
            }
        }

        for k in 0..NUM_FIFOS {
            let fifo_in = arch.find_port(&format!("fifo_mux_{}.in", k)).unwrap();
            assert_eq!(arch.port(fifo_in).width(), 4 * 2);
            for pin in arch.port(fifo_in).pins(fifo_in) {
                assert!(arch.driver(pin).is_some());
            }
        }
        assert!(arch.find_port("memory_in").is_none());
        assert!(!arch
            .component(arch.find("processor").unwrap())
            .metadata
            .has_role(TaskClass::MemoryProcessor));
    }

    #[test]
    fn hex_single_link() {
        let arch = build_tile(1, Topology::Hex, false);
        for heading in Topology::Hex.directions() {
            let mux_in = arch
                .find_port(&format!("{}_mux.in", heading.name()))
                .unwrap();
            assert_eq!(arch.port(mux_in).width(), 5 + 1);
            let tile_in = arch.find_port(&heading.input_port()).unwrap();
            assert_eq!(sink_components(&arch, Pin::new(tile_in, 0)).len(), 5 + 2);
        }
        assert!(arch.find(&format!("{}_mux", Heading::North.name())).is_none());
    }

    #[test]
    fn memory_variant() {
        let arch = build_tile(2, Topology::Cardinal, true);
        let core = arch.find("processor").unwrap();
        assert!(arch
            .component(core)
            .metadata
            .has_role(TaskClass::MemoryProcessor));
        assert!(arch.component(core).metadata.has_role(TaskClass::Processor));

        let tile_in = arch.find_port("memory_in").unwrap();
        let core_in = arch.find_port("processor.memory_in").unwrap();
        let core_out = arch.find_port("processor.memory_out").unwrap();
        let tile_out = arch.find_port("memory_out").unwrap();
        assert_eq!(arch.driver(Pin::new(core_in, 0)), Some(Pin::new(tile_in, 0)));
        assert_eq!(arch.driver(Pin::new(tile_out, 0)), Some(Pin::new(core_out, 0)));
        // memory traffic bypasses the muxes
        assert_eq!(arch.fanout(tile_in).len(), 1);
    }

    #[test]
    fn deterministic() {
        let named = |arch: &Architecture| -> Vec<(String, String)> {
            arch.connections()
                .iter()
                .map(|c: &Connection| (arch.pin_name(c.source), arch.pin_name(c.sink)))
                .collect()
        };
        for topology in [Topology::Cardinal, Topology::Hex] {
            let a = build_tile(3, topology, true);
            let b = build_tile(3, topology, true);
            assert_eq!(named(&a), named(&b));
            assert_eq!(a.component_count(), b.component_count());
        }
    }
}
