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

//! Static link costs.
//!
//! Memory links get a large fixed cost, which pulls memory processors next
//! to their memories. Input links get the minimum weight since the energy
//! of the input handlers is not modeled. Everything else is weighted by its
//! measured traffic, relative to the busiest and quietest links.

use petgraph::prelude::*;

use super::{TaskClass, TaskGraph};

/// decimal digits kept on traffic-derived weights.
pub const NDIGITS: i32 = 3;
/// 2^-NDIGITS, the floor of any traffic-derived weight.
pub const MIN_WEIGHT: f64 = 0.125;
pub const MEMORY_LINK_WEIGHT: f64 = 5.0;

/// Round half up to `ndigits` decimal digits.
pub fn round_digits(value: f64, ndigits: i32) -> f64 {
    let scale = 10f64.powi(ndigits);
    (value * scale + 0.5).floor() / scale
}

/// Map a write count from the observed `[min, max]` range onto
/// `[MIN_WEIGHT, 1.0]`.
///
/// A degenerate range carries no information, every link gets 1.0.
pub fn scale_write_count(write_count: f64, min: f64, max: f64) -> f64 {
    if max <= min {
        return 1.0;
    }
    let scaled = round_digits((write_count - min) / (max - min), NDIGITS);
    scaled.max(MIN_WEIGHT).min(1.0)
}

pub(super) fn assign_costs(graph: &mut TaskGraph, use_traffic_weights: bool) {
    let (min, max) = graph
        .links()
        .filter_map(|l| l.metadata().write_count())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), wc| {
            (lo.min(wc), hi.max(wc))
        });
    log::debug!("write count range [{}, {}]", min, max);

    let indices: Vec<EdgeIndex> = graph.iter_links().collect();
    for link in indices {
        let (src, _) = graph.get_link_endpoints(link);
        let l = graph.get_link(link);
        let cost = if l.class().is_memory() {
            MEMORY_LINK_WEIGHT
        } else if graph.get_task(src).class() == Some(TaskClass::InputHandler) {
            MIN_WEIGHT
        } else {
            match l.metadata().write_count() {
                Some(wc) if use_traffic_weights => scale_write_count(wc, min, max),
                _ => 1.0,
            }
        };
        log::trace!("link {} cost {}", l.key(), cost);
        graph.set_cost(link, cost);
    }
}
