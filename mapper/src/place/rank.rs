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

/// A raw rank metric and its percentile among its peers.
///
/// Lower raw values are more important and normalize closer to 0.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Rank {
    pub raw: f64,
    pub normalized: f64,
}

/// Percentile of every value: the share of values less than or equal to
/// it. Results are in (0, 1]; the largest value maps to 1.0.
pub fn percentiles(raw: &[f64]) -> Vec<f64> {
    let mut sorted = raw.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;
    raw.iter()
        .map(|x| sorted.partition_point(|y| y.total_cmp(x).is_le()) as f64 / n)
        .collect()
}

/// Rank every entry that has a raw metric against the others that do.
pub fn normalize(raw: &[Option<f64>]) -> Vec<Option<Rank>> {
    let present: Vec<f64> = raw.iter().flatten().copied().collect();
    let mut normalized = percentiles(&present).into_iter();
    raw.iter()
        .map(|r| {
            r.map(|raw| Rank {
                raw,
                normalized: normalized.next().unwrap_or(1.0),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentile_ties() {
        assert_eq!(
            percentiles(&[3.0, 1.0, 2.0, 2.0]),
            vec![1.0, 0.25, 0.75, 0.75]
        );
        assert_eq!(percentiles(&[5.0]), vec![1.0]);
        assert!(percentiles(&[]).is_empty());
    }

    #[test]
    fn missing_ranks_stay_missing() {
        let ranks = normalize(&[Some(10.0), None, Some(20.0)]);
        assert_eq!(
            ranks[0],
            Some(Rank {
                raw: 10.0,
                normalized: 0.5
            })
        );
        assert_eq!(ranks[1], None);
        assert_eq!(ranks[2].map(|r| r.normalized), Some(1.0));
    }
}
