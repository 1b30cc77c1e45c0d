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

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::classify;
use super::weights;
use super::{Link, LinkClass, LinkKey, Task, TaskGraph};
use crate::metadata::{Measurements, Metadata};
use crate::Error;

/// One task as produced by the profiler.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TaskRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub task_type: String,
    #[serde(default)]
    pub measurements: Option<Measurements>,
    /// power-constrained tasks may only use resources that accept them.
    #[serde(default)]
    pub constrained: bool,
}

impl TaskRecord {
    pub fn new(name: &str, task_type: &str) -> Self {
        Self {
            name: name.to_string(),
            task_type: task_type.to_string(),
            measurements: None,
            constrained: false,
        }
    }
}

/// A leaf of the nested link description.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LinkDefinition {
    pub source_task: String,
    pub source_index: usize,
    pub dest_task: String,
    pub dest_index: usize,
    #[serde(default)]
    pub measurements: Option<Measurements>,
}

impl LinkDefinition {
    pub fn new(source_task: &str, source_index: usize, dest_task: &str, dest_index: usize) -> Self {
        Self {
            source_task: source_task.to_string(),
            source_index,
            dest_task: dest_task.to_string(),
            dest_index,
            measurements: None,
        }
    }

    pub fn with_write_count(mut self, write_count: f64) -> Self {
        self.measurements
            .get_or_insert_with(Measurements::new)
            .insert(crate::metadata::WRITE_COUNT.to_string(), write_count);
        self
    }
}

/// link class -> logical connection group -> link definitions
pub type LinkGroups = BTreeMap<String, BTreeMap<String, Vec<LinkDefinition>>>;

/// The whole external description, as found in a profiling dump.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Description {
    pub tasks: Vec<TaskRecord>,
    #[serde(default)]
    pub links: LinkGroups,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestOptions {
    /// keep the links of the "packet" class (they are never routed).
    pub include_packet_links: bool,
    /// scale link costs by the measured write counts.
    pub use_traffic_weights: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            include_packet_links: true,
            use_traffic_weights: true,
        }
    }
}

impl IngestOptions {
    /// Build options from loose `key => value` pairs; any key that is not an
    /// option is an error.
    pub fn from_pairs<I, K>(pairs: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, bool)>,
        K: AsRef<str>,
    {
        let mut options = Self::default();
        for (key, value) in pairs {
            match key.as_ref() {
                "include_packet_links" => options.include_packet_links = value,
                "use_traffic_weights" => options.use_traffic_weights = value,
                other => {
                    log::error!("Unknown ingestion option {}", other);
                    return Err(Error::UnknownOption(other.to_string()));
                }
            }
        }
        Ok(options)
    }
}

/// Build a classified and weighted task graph from an external description.
///
/// Either the full graph is returned or an error; a graph that failed
/// validation is never handed out.
pub fn ingest(
    tasks: &[TaskRecord],
    links: &LinkGroups,
    options: &IngestOptions,
) -> Result<TaskGraph, Error> {
    let mut graph = TaskGraph::new();

    for record in tasks {
        let mut metadata = Metadata::new();
        metadata.set_task_type(&record.task_type);
        if let Some(measurements) = &record.measurements {
            metadata.set_measurements(measurements.clone());
        }
        if record.constrained {
            metadata.set_constrained(true);
        }
        graph.add_task(Task::new(&record.name, metadata))?;
    }

    let mut seen = HashSet::new();
    let mut duplicates = 0;
    for (class_name, groups) in links {
        let class: LinkClass = class_name.parse()?;
        if class == LinkClass::Packet && !options.include_packet_links {
            log::debug!("skipping {} packet link groups", groups.len());
            continue;
        }
        for (group, definitions) in groups {
            log::trace!("{} group {}: {} links", class, group, definitions.len());
            for def in definitions {
                let key = LinkKey {
                    class,
                    source: def.source_task.clone(),
                    source_index: def.source_index,
                    dest: def.dest_task.clone(),
                    dest_index: def.dest_index,
                };
                if !seen.insert(key.clone()) {
                    duplicates += 1;
                    continue;
                }
                let mut metadata = Metadata::new();
                if let Some(measurements) = &def.measurements {
                    metadata.set_measurements(measurements.clone());
                }
                graph.add_link(Link::new(key, metadata))?;
            }
        }
    }
    if duplicates > 0 {
        log::debug!("dropped {} duplicate link definitions", duplicates);
    }

    classify::assign_classes(&mut graph)?;
    classify::annotate_links(&mut graph);
    weights::assign_costs(&mut graph, options.use_traffic_weights);

    log::info!(
        "ingested {} tasks and {} links",
        graph.task_count(),
        graph.link_count()
    );
    Ok(graph)
}

/// Same as [`ingest`], reading a JSON [`Description`].
pub fn ingest_json(json: &str, options: &IngestOptions) -> Result<TaskGraph, Error> {
    let description: Description = serde_json::from_str(json)?;
    ingest(&description.tasks, &description.links, options)
}
