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

//! Maps application task graphs onto a spatial many-core array.
//!
//! The pipeline: [`ingest`] a profiled description into a classified
//! [`TaskGraph`], generate an [`Architecture`] with [`build_array`], let an
//! optimizer drive a [`Placement`] and hand the [`routing_channels`] of the
//! result to a router.

pub mod arch;
mod config;
mod error;
pub mod metadata;
pub mod place;
mod route;
pub mod taskgraph;

// Public types
pub use crate::arch::{build_array, build_tile, Architecture, ArrayConfig, SiteConfig};
pub use crate::arch::{Address, Heading, Pin, Topology, NUM_FIFOS};
pub use crate::config::MapperConfig;
pub use crate::error::Error;
pub use crate::metadata::{Metadata, Value};
pub use crate::place::{BackoffPolicy, CostModel, ModelKind, Outcome, Placement, PlacementConfig};
pub use crate::route::{routing_channels, RoutingChannel};
pub use crate::taskgraph::{ingest, ingest_json, Description, IngestOptions};
pub use crate::taskgraph::{Link, LinkClass, LinkKey, Task, TaskClass, TaskGraph};
pub use petgraph::graph::{EdgeIndex, NodeIndex};
pub use petgraph::Direction;
