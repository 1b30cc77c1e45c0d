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
use std::collections::BTreeMap;

use super::{LinkClass, TaskClass, TaskGraph};
use crate::Error;

/// The external task types understood by the classifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum TaskType {
    Input,
    Output,
    Processor,
    Memory,
}

impl TaskType {
    fn parse(task: &str, task_type: Option<&str>) -> Result<Self, Error> {
        let raw = task_type.unwrap_or("");
        match raw.to_lowercase().as_str() {
            "input" => Ok(Self::Input),
            "output" => Ok(Self::Output),
            "processor" => Ok(Self::Processor),
            "memory" => Ok(Self::Memory),
            _ => Err(Error::UnknownTaskType {
                task: task.to_string(),
                task_type: raw.to_string(),
            }),
        }
    }
}

/// Tag every task with its class.
///
/// Memories are sized by the number of distinct tasks they talk to, and
/// every task talking to a memory is promoted to a memory processor.
pub(super) fn assign_classes(graph: &mut TaskGraph) -> Result<(), Error> {
    // neighbor => the memory that claimed it (first one wins, for reporting)
    let mut memory_neighbors = BTreeMap::new();

    let indices: Vec<NodeIndex> = graph.iter_tasks().collect();
    for index in indices {
        let task = graph.get_task(index);
        let class = match TaskType::parse(task.name(), task.metadata().task_type())? {
            TaskType::Input => TaskClass::InputHandler,
            TaskType::Output => TaskClass::OutputHandler,
            TaskType::Processor => TaskClass::Processor,
            TaskType::Memory => {
                let neighbors = graph.neighbors(index);
                let class = match neighbors.len() {
                    1 => TaskClass::Memory1Port,
                    2 => TaskClass::Memory2Port,
                    count => {
                        log::error!("memory {} has {} neighbors", task.name(), count);
                        return Err(Error::MemoryNeighborCount {
                            task: task.name().to_string(),
                            count,
                        });
                    }
                };
                for n in neighbors {
                    memory_neighbors.entry(n).or_insert(index);
                }
                class
            }
        };
        log::trace!("task {} is {:?}", graph.get_task(index).name(), class);
        graph.set_class(index, class);
    }

    for (neighbor, memory) in memory_neighbors {
        match graph.get_task(neighbor).class() {
            Some(TaskClass::Processor) | Some(TaskClass::MemoryProcessor) => {
                graph.set_class(neighbor, TaskClass::MemoryProcessor);
            }
            class => {
                return Err(Error::MemoryNeighborRole {
                    memory: graph.get_task(memory).name().to_string(),
                    neighbor: graph.get_task(neighbor).name().to_string(),
                    class,
                });
            }
        }
    }
    Ok(())
}

/// Record the normalized class name on every link and decide which links
/// must keep their destination index.
///
/// Output handlers accept data on any slot; everyone else listens on a
/// specific one, so circuit links into them are pinned.
pub(super) fn annotate_links(graph: &mut TaskGraph) {
    let indices: Vec<EdgeIndex> = graph.iter_links().collect();
    for link in indices {
        let (_, dst) = graph.get_link_endpoints(link);
        let class = graph.get_link(link).class();
        let preserve = class == LinkClass::Circuit
            && graph.get_task(dst).class() != Some(TaskClass::OutputHandler);
        graph.link_mut(link).metadata.set_link_class(class.as_str());
        graph.set_preserve_destination(link, preserve);
    }
}

#[cfg(test)]
mod tests {
    use crate::taskgraph::*;
    use crate::Error;
    use std::collections::BTreeMap;

    fn circuit(defs: Vec<LinkDefinition>) -> LinkGroups {
        let mut inner = BTreeMap::new();
        inner.insert("g".to_string(), defs);
        let mut outer = LinkGroups::new();
        outer.insert("circuit".to_string(), inner);
        outer
    }

    fn class_of(graph: &TaskGraph, name: &str) -> Option<TaskClass> {
        graph.task_by_name(name).unwrap().class()
    }

    #[test]
    fn memory_arity() {
        let tasks = vec![
            TaskRecord::new("a", "Processor"),
            TaskRecord::new("m", "Memory"),
        ];
        // two links, but a single distinct neighbor
        let links = circuit(vec![
            LinkDefinition::new("a", 0, "m", 0),
            LinkDefinition::new("m", 0, "a", 0),
        ]);
        let graph = ingest(&tasks, &links, &IngestOptions::default()).unwrap();
        assert_eq!(class_of(&graph, "m"), Some(TaskClass::Memory1Port));
        assert_eq!(class_of(&graph, "a"), Some(TaskClass::MemoryProcessor));
    }

    #[test]
    fn lonely_memory_is_fatal() {
        let tasks = vec![TaskRecord::new("m", "memory")];
        assert_eq!(
            ingest(&tasks, &LinkGroups::new(), &IngestOptions::default()).err(),
            Some(Error::MemoryNeighborCount {
                task: "m".to_string(),
                count: 0
            })
        );
    }

    #[test]
    fn memory_neighbors_must_be_processors() {
        let tasks = vec![
            TaskRecord::new("in", "Input"),
            TaskRecord::new("m", "Memory"),
        ];
        let links = circuit(vec![LinkDefinition::new("in", 0, "m", 0)]);
        match ingest(&tasks, &links, &IngestOptions::default()) {
            Err(Error::MemoryNeighborRole {
                memory,
                neighbor,
                class,
            }) => {
                assert_eq!(memory, "m");
                assert_eq!(neighbor, "in");
                assert_eq!(class, Some(TaskClass::InputHandler));
            }
            other => panic!("expected a role conflict, got {:?}", other),
        }

        // two memories next to each other conflict as well
        let tasks = vec![
            TaskRecord::new("m0", "Memory"),
            TaskRecord::new("m1", "Memory"),
        ];
        let links = circuit(vec![LinkDefinition::new("m0", 0, "m1", 0)]);
        assert!(matches!(
            ingest(&tasks, &links, &IngestOptions::default()),
            Err(Error::MemoryNeighborRole { .. })
        ));
    }

    #[test]
    fn processor_shared_by_two_memories() {
        let tasks = vec![
            TaskRecord::new("p", "Processor"),
            TaskRecord::new("m0", "Memory"),
            TaskRecord::new("m1", "Memory"),
        ];
        let links = circuit(vec![
            LinkDefinition::new("p", 0, "m0", 0),
            LinkDefinition::new("p", 1, "m1", 0),
        ]);
        let graph = ingest(&tasks, &links, &IngestOptions::default()).unwrap();
        assert_eq!(class_of(&graph, "p"), Some(TaskClass::MemoryProcessor));
        assert_eq!(class_of(&graph, "m0"), Some(TaskClass::Memory1Port));
        assert_eq!(class_of(&graph, "m1"), Some(TaskClass::Memory1Port));
    }

    #[test]
    fn destinations_are_preserved_except_for_outputs() {
        let tasks = vec![
            TaskRecord::new("a", "Processor"),
            TaskRecord::new("b", "Processor"),
            TaskRecord::new("out", "Output"),
        ];
        let links = circuit(vec![
            LinkDefinition::new("a", 0, "b", 1),
            LinkDefinition::new("b", 0, "out", 0),
        ]);
        let graph = ingest(&tasks, &links, &IngestOptions::default()).unwrap();
        let to_b = &graph.incoming("b").unwrap()[0];
        let to_out = &graph.incoming("out").unwrap()[0];
        assert!(to_b.preserve_destination());
        assert!(!to_out.preserve_destination());
        assert_eq!(to_b.metadata().link_class(), Some("circuit"));
    }
}
