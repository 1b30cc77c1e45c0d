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

//! Placement cost model.
//!
//! The optimizer itself lives elsewhere; this module supplies what it
//! evaluates after every trial move: distance weighted channel costs, the
//! address penalty of heterogeneous arrays and the rank-ratio auxiliary
//! term, kept in an indexed max-heap so the worst ratio is an O(1) lookup.

use serde::{Deserialize, Serialize};

mod backoff;
mod cost;
mod heap;
mod rank;
mod session;

pub use backoff::{BackoffPolicy, Outcome};
pub use cost::{AddressData, CostModel, ModelKind, NodeState, PlacementChannel};
pub use cost::{DEFAULT_ADDRESS_PENALTY, DEFAULT_RANK_PENALTY};
pub use heap::{Handle, RatioHeap};
pub use rank::{normalize, percentiles, Rank};
pub use session::Placement;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlacementConfig {
    pub model: ModelKind,
    /// coefficient of the auxiliary term; the model default when absent.
    pub penalty: Option<f64>,
    pub seed: u64,
    /// place and route attempts before giving up; unbounded when absent.
    pub max_attempts: Option<usize>,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            model: ModelKind::Plain,
            penalty: None,
            seed: 0,
            max_attempts: Some(8),
        }
    }
}

impl PlacementConfig {
    pub fn cost_model(&self) -> CostModel {
        let mut model = CostModel::new(self.model);
        if let Some(penalty) = self.penalty {
            model.set_penalty(penalty);
        }
        model
    }

    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            max_attempts: self.max_attempts,
            seed: self.seed,
        }
    }
}
