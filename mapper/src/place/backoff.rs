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

use super::session::Placement;
use crate::Error;

/// How a series of place and route attempts ended.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Outcome {
    /// the last attempt routed.
    Routed { attempts: usize, penalty: f64 },
    /// every allowed attempt failed to route.
    Exhausted { attempts: usize, penalty: f64 },
}

/// Retry policy around an external place-and-route step.
///
/// Every attempt starts from a fresh random placement. When the step
/// reports that routing failed, the auxiliary penalty is halved before the
/// next attempt. With no attempt limit the policy keeps going until the
/// step routes or fails with an error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_attempts: Option<usize>,
    pub seed: u64,
}

impl BackoffPolicy {
    pub fn bounded(max_attempts: usize, seed: u64) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            seed,
        }
    }

    pub fn unbounded(seed: u64) -> Self {
        Self {
            max_attempts: None,
            seed,
        }
    }

    /// Run `step` until it reports a routed placement. `step` gets the
    /// session, already initially placed, and the attempt number.
    pub fn run<F>(&self, placement: &mut Placement, mut step: F) -> Result<Outcome, Error>
    where
        F: FnMut(&mut Placement, usize) -> Result<bool, Error>,
    {
        let mut attempt = 0;
        loop {
            if let Some(max) = self.max_attempts {
                if attempt >= max {
                    log::warn!("giving up after {} attempts", attempt);
                    return Ok(Outcome::Exhausted {
                        attempts: attempt,
                        penalty: placement.penalty(),
                    });
                }
            }
            placement.reset();
            placement.initial_placement(self.seed.wrapping_add(attempt as u64))?;
            let routed = step(placement, attempt)?;
            attempt += 1;
            if routed {
                log::info!(
                    "routed after {} attempts, penalty {}",
                    attempt,
                    placement.penalty()
                );
                return Ok(Outcome::Routed {
                    attempts: attempt,
                    penalty: placement.penalty(),
                });
            }
            placement.halve_penalty();
        }
    }
}
