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

use std::fmt;

use crate::taskgraph::TaskClass;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// An option map carried a key nobody understands.
    UnknownOption(String),
    /// A task record with a `type` outside Input/Output/Processor/Memory.
    UnknownTaskType { task: String, task_type: String },
    /// A link group keyed by a class that is not a known link class.
    UnknownLinkClass(String),
    /// Two task records share a name.
    DuplicateTask(String),
    /// A link references a task that was never declared.
    UnknownTask(String),
    /// A memory task must talk to exactly one or two distinct tasks.
    MemoryNeighborCount { task: String, count: usize },
    /// Neighbors of memories must be processors.
    MemoryNeighborRole {
        memory: String,
        neighbor: String,
        class: Option<TaskClass>,
    },
    /// Unrecognized topology or architecture selector.
    UnknownArchitecture(String),
    /// An array configuration that can not be built or placed onto.
    InvalidArray(String),
    /// A placement channel needs exactly one driver and one receiver.
    ChannelFanout {
        link: usize,
        sources: usize,
        sinks: usize,
    },
    /// A task has no legal address left in the architecture.
    NoLegalAddress(String),
    /// The placement has not assigned every task yet.
    Unplaced(String),
    /// A task sits on a site without the port its link needs.
    MissingPort { component: String, port: String },
    /// A link endpoint index beyond the width of the port it lands on.
    PinIndex {
        task: String,
        index: usize,
        width: usize,
    },
    /// A description or configuration document failed to parse.
    Parse(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnknownOption(key) => write!(f, "ERROR: Unknown option `{}`", key),
            Self::UnknownTaskType { task, task_type } => {
                write!(f, "ERROR: Task {} has unknown type `{}`", task, task_type)
            }
            Self::UnknownLinkClass(class) => write!(f, "ERROR: Unknown link class `{}`", class),
            Self::DuplicateTask(name) => write!(f, "ERROR: Task {} declared twice", name),
            Self::UnknownTask(name) => write!(f, "ERROR: Link references unknown task {}", name),
            Self::MemoryNeighborCount { task, count } => write!(
                f,
                "ERROR: Memory {} has {} distinct neighbors, expected 1 or 2",
                task, count
            ),
            Self::MemoryNeighborRole {
                memory,
                neighbor,
                class,
            } => write!(
                f,
                "ERROR: Neighbors of memories must be processors: {} (neighbor of {}) is {:?}",
                neighbor, memory, class
            ),
            Self::UnknownArchitecture(name) => {
                write!(f, "ERROR: Unknown architecture selector `{}`", name)
            }
            Self::InvalidArray(msg) => write!(f, "ERROR: Invalid array: {}", msg),
            Self::ChannelFanout {
                link,
                sources,
                sinks,
            } => write!(
                f,
                "ERROR: Link {} resolves to {} sources and {} sinks, expected exactly one each",
                link, sources, sinks
            ),
            Self::NoLegalAddress(task) => write!(f, "ERROR: No legal address for task {}", task),
            Self::Unplaced(task) => write!(f, "ERROR: Task {} is not placed", task),
            Self::MissingPort { component, port } => {
                write!(f, "ERROR: {} has no port {}", component, port)
            }
            Self::PinIndex { task, index, width } => write!(
                f,
                "ERROR: Task {} uses index {} of a port with {} pins",
                task, index, width
            ),
            Self::Parse(msg) => write!(f, "ERROR: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
