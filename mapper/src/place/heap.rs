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

//! An indexed binary max-heap.
//!
//! Entries are named by a stable [`Handle`] returned from `insert`. Every
//! handle knows its current slot in the heap array, so a key can be raised
//! or lowered in place in O(log n) without searching for the entry.

use std::cmp::Ordering;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(usize);

impl Handle {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Clone, Debug, Default)]
pub struct RatioHeap {
    // heap order, holds handles
    heap: Vec<usize>,
    // handle => position in `heap`
    slots: Vec<usize>,
    // handle => key
    keys: Vec<f64>,
}

impl RatioHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            heap: Vec::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            keys: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn insert(&mut self, key: f64) -> Handle {
        let handle = self.keys.len();
        self.keys.push(key);
        self.slots.push(self.heap.len());
        self.heap.push(handle);
        self.sift_up(self.heap.len() - 1);
        Handle(handle)
    }

    /// The current key of an entry.
    pub fn key(&self, handle: Handle) -> f64 {
        self.keys[handle.0]
    }

    /// Change the key of an entry and restore the heap order around it.
    pub fn update_key(&mut self, handle: Handle, key: f64) {
        let old = std::mem::replace(&mut self.keys[handle.0], key);
        let slot = self.slots[handle.0];
        match key.total_cmp(&old) {
            Ordering::Greater => self.sift_up(slot),
            Ordering::Less => self.sift_down(slot),
            Ordering::Equal => {}
        }
    }

    /// The entry with the largest key.
    pub fn peek(&self) -> Option<(Handle, f64)> {
        self.heap.first().map(|&h| (Handle(h), self.keys[h]))
    }

    pub fn max_key(&self) -> Option<f64> {
        self.peek().map(|(_, key)| key)
    }

    fn greater(&self, a: usize, b: usize) -> bool {
        self.keys[self.heap[a]].total_cmp(&self.keys[self.heap[b]]) == Ordering::Greater
    }

    fn swap_slots(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.slots[self.heap[a]] = a;
        self.slots[self.heap[b]] = b;
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if !self.greater(slot, parent) {
                break;
            }
            self.swap_slots(slot, parent);
            slot = parent;
        }
    }

    fn sift_down(&mut self, mut slot: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * slot + 1;
            let right = left + 1;
            let mut largest = slot;
            if left < len && self.greater(left, largest) {
                largest = left;
            }
            if right < len && self.greater(right, largest) {
                largest = right;
            }
            if largest == slot {
                break;
            }
            self.swap_slots(slot, largest);
            slot = largest;
        }
    }

    /// Check the heap property and the handle bookkeeping.
    pub fn is_consistent(&self) -> bool {
        let ordered = (1..self.heap.len()).all(|slot| !self.greater(slot, (slot - 1) / 2));
        let indexed = self
            .heap
            .iter()
            .enumerate()
            .all(|(slot, &h)| self.slots[h] == slot);
        ordered && indexed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoshiro256StarStar;

    fn scan_max(heap: &RatioHeap, handles: &[Handle]) -> f64 {
        handles
            .iter()
            .map(|&h| heap.key(h))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    #[test]
    fn empty() {
        let heap = RatioHeap::new();
        assert!(heap.is_empty());
        assert_eq!(heap.peek(), None);
    }

    #[test]
    fn update_in_both_directions() {
        let mut heap = RatioHeap::new();
        let a = heap.insert(1.0);
        let b = heap.insert(3.0);
        let c = heap.insert(2.0);
        assert_eq!(heap.peek(), Some((b, 3.0)));

        heap.update_key(b, 0.5);
        assert_eq!(heap.peek(), Some((c, 2.0)));
        heap.update_key(a, 4.0);
        assert_eq!(heap.peek(), Some((a, 4.0)));
        heap.update_key(a, 4.0);
        assert_eq!(heap.peek(), Some((a, 4.0)));
        assert_eq!(heap.key(b), 0.5);
        assert!(heap.is_consistent());
    }

    #[test]
    fn random_updates_track_maximum() {
        let mut rng = Xoshiro256StarStar::seed_from_u64(7);
        for &n in &[1usize, 2, 10, 257] {
            let mut heap = RatioHeap::with_capacity(n);
            let handles: Vec<Handle> = (0..n).map(|_| heap.insert(rng.gen::<f64>())).collect();
            for _ in 0..2000 {
                let h = handles[rng.gen_range(0..n)];
                heap.update_key(h, rng.gen_range(0.0..10.0));
                assert_eq!(heap.max_key(), Some(scan_max(&heap, &handles)));
            }
            assert!(heap.is_consistent());
            assert_eq!(heap.len(), n);
        }
    }
}
