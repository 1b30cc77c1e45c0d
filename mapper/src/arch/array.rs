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

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::tile::{populate_handler, populate_memory, populate_tile};
use super::{Address, Architecture, ComponentId, Pin, Topology};
use crate::taskgraph::TaskClass;
use crate::Error;

/// Per-site overrides. Sites that are not listed are plain processor tiles.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    pub row: usize,
    pub col: usize,
    /// what the site hosts, named by the task class it can run.
    #[serde(default)]
    pub kind: Option<TaskClass>,
    /// raw rank of the site; lower is more desirable.
    #[serde(default)]
    pub rank: Option<f64>,
    /// whether power-constrained tasks may run here.
    #[serde(default)]
    pub accepts_constrained: bool,
}

impl SiteConfig {
    pub fn new(row: usize, col: usize, kind: TaskClass) -> Self {
        Self {
            row,
            col,
            kind: Some(kind),
            rank: None,
            accepts_constrained: false,
        }
    }

    pub fn address(&self) -> Address {
        Address::new(self.row, self.col)
    }
}

/// provides the parameters of a rectangular array of sites.
///
/// constructed programmatically or read from a config file.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArrayConfig {
    pub rows: usize,
    pub cols: usize,
    pub topology: Topology,
    /// links between neighboring tiles, per direction.
    pub links: usize,
    pub sites: Vec<SiteConfig>,
}

impl Default for ArrayConfig {
    fn default() -> Self {
        Self {
            rows: 4,
            cols: 4,
            topology: Topology::Cardinal,
            links: 2,
            sites: Vec::new(),
        }
    }
}

impl ArrayConfig {
    pub fn new(rows: usize, cols: usize, topology: Topology, links: usize) -> Self {
        Self {
            rows,
            cols,
            topology,
            links,
            sites: Vec::new(),
        }
    }

    pub fn with_site(mut self, site: SiteConfig) -> Self {
        self.sites.push(site);
        self
    }
}

fn site_name(kind: TaskClass, address: Address) -> String {
    let prefix = match kind {
        TaskClass::Processor | TaskClass::MemoryProcessor => "tile",
        TaskClass::Memory1Port | TaskClass::Memory2Port => "memory",
        TaskClass::InputHandler => "input",
        TaskClass::OutputHandler => "output",
    };
    format!("{}_{}_{}", prefix, address.row, address.col)
}

/// A rows x cols array of sites.
///
/// Every pair of neighboring sites is connected `<dir>_out -> <opposite>_in`
/// wherever both ports exist. Memory blocks are wired to the memory
/// processor tiles next to them, one port pair per tile.
pub fn build_array(config: &ArrayConfig) -> Result<Architecture, Error> {
    if config.rows == 0 || config.cols == 0 || config.links == 0 {
        return Err(Error::InvalidArray(format!(
            "{}x{} array with {} links",
            config.rows, config.cols, config.links
        )));
    }
    let mut overrides = BTreeMap::new();
    for site in &config.sites {
        if site.row >= config.rows || site.col >= config.cols {
            return Err(Error::InvalidArray(format!(
                "site {} outside of {}x{} array",
                site.address(),
                config.rows,
                config.cols
            )));
        }
        if overrides.insert(site.address(), site).is_some() {
            return Err(Error::InvalidArray(format!(
                "site {} configured twice",
                site.address()
            )));
        }
    }

    let mut arch = Architecture::new("array");
    arch.set_topology(config.topology);
    let topology = config.topology;

    let mut kinds = BTreeMap::new();
    for (row, col) in (0..config.rows).cartesian_product(0..config.cols) {
        let address = Address::new(row, col);
        let site = overrides.get(&address);
        let kind = site.and_then(|s| s.kind).unwrap_or(TaskClass::Processor);
        let id = arch.add_site(address, &site_name(kind, address));
        match kind {
            TaskClass::Processor => populate_tile(&mut arch, id, config.links, topology, false),
            TaskClass::MemoryProcessor => {
                populate_tile(&mut arch, id, config.links, topology, true)
            }
            TaskClass::Memory1Port => populate_memory(&mut arch, id, 1),
            TaskClass::Memory2Port => populate_memory(&mut arch, id, 2),
            TaskClass::InputHandler | TaskClass::OutputHandler => {
                populate_handler(&mut arch, id, kind, config.links, topology)
            }
        }
        if let Some(site) = site {
            let metadata = &mut arch.component_mut(id).metadata;
            if let Some(rank) = site.rank {
                metadata.set_rank(rank);
            }
            metadata.set_accepts_constrained(site.accepts_constrained);
        }
        log::debug!("site {} is {:?}", address, kind);
        kinds.insert(address, (id, kind));
    }

    // fabric links, in address order
    for (&address, &(id, _)) in &kinds {
        for &heading in topology.directions() {
            let neighbor = match topology.neighbor(address, heading, config.rows, config.cols) {
                Some(n) => kinds[&n].0,
                None => continue,
            };
            let out = arch.component(id).port(&heading.output_port());
            let inp = arch
                .component(neighbor)
                .port(&heading.opposite().input_port());
            if let (Some(out), Some(inp)) = (out, inp) {
                arch.connect_ports(out, inp);
            }
        }
    }

    // memory links
    for (&address, &(memory, kind)) in &kinds {
        let ports = kind.memory_ports();
        if ports == 0 {
            continue;
        }
        let mem_in = arch.component(memory).port("memory_in");
        let mem_out = arch.component(memory).port("memory_out");
        let (mem_in, mem_out) = match (mem_in, mem_out) {
            (Some(i), Some(o)) => (i, o),
            _ => continue,
        };
        let mut next = 0;
        for &heading in topology.directions() {
            if next == ports {
                break;
            }
            let (tile, tile_kind) =
                match topology.neighbor(address, heading, config.rows, config.cols) {
                    Some(n) => kinds[&n],
                    None => continue,
                };
            if tile_kind != TaskClass::MemoryProcessor {
                continue;
            }
            let tile_in = arch.component(tile).port("memory_in");
            let tile_out = arch.component(tile).port("memory_out");
            if let (Some(tile_in), Some(tile_out)) = (tile_in, tile_out) {
                // a tile between two memories only talks to the first one
                if arch.driver(Pin::new(tile_in, 0)).is_some() {
                    continue;
                }
                arch.connect(Pin::new(tile_out, 0), Pin::new(mem_in, next));
                arch.connect(Pin::new(mem_out, next), Pin::new(tile_in, 0));
                next += 1;
            }
        }
        if next == 0 {
            log::warn!("memory at {} has no memory processor next to it", address);
        }
    }

    log::info!(
        "built {}x{} {:?} array: {} components, {} connections",
        config.rows,
        config.cols,
        topology,
        arch.component_count(),
        arch.connections().len()
    );
    Ok(arch)
}

/// The processor core of a tile site. Memory and handler sites have no
/// inner core and stand for themselves.
pub(crate) fn site_core(arch: &Architecture, site: ComponentId) -> ComponentId {
    arch.component(site).child("processor").unwrap_or(site)
}
