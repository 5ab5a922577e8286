//! Monotonic double-bucket priority queue
//!
//! Dijkstra over non-negative costs with a bounded spread pops keys in
//! non-decreasing order, which lets a circular array of buckets replace a
//! binary heap: `add`, `pop`, and `decrease` are all O(1) amortized with a
//! much smaller constant. Keys past the current bucket range land in an
//! overflow bucket that is re-bucketed lazily once the main range is
//! exhausted, so no precise cost upper bound is needed.
//!
//! The queue stores plain `u32` label indices. Keys are never stored; each
//! operation takes an accessor closure that reads the current sort cost
//! from the label store, so the queue always sees live values.

use std::collections::VecDeque;

/// Bucketed priority queue over label indices with monotone pops.
#[derive(Debug)]
pub struct DoubleBucketQueue {
    bucket_size: f32,
    /// Low edge of bucket 0 for the current window.
    min_cost: f32,
    /// Exclusive high edge of the bucketed window.
    max_cost: f32,
    range: f32,
    buckets: Vec<VecDeque<u32>>,
    overflow: VecDeque<u32>,
    /// Cursor; buckets below it are empty.
    current: usize,
    size: usize,
}

impl DoubleBucketQueue {
    /// `range = bucket_count * bucket_size` covers the cost spread expected
    /// in flight at once; anything past it overflows.
    pub fn new(min_cost: f32, range: f32, bucket_size: f32) -> DoubleBucketQueue {
        assert!(bucket_size > 0.0, "bucket size must be positive");
        assert!(range > 0.0, "bucket range must be positive");
        let count = (range / bucket_size).ceil() as usize + 1;
        DoubleBucketQueue {
            bucket_size,
            min_cost,
            max_cost: min_cost + range,
            range,
            buckets: vec![VecDeque::new(); count],
            overflow: VecDeque::new(),
            current: 0,
            size: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.overflow.clear();
        self.current = 0;
        self.size = 0;
    }

    /// Bucket for a key within the current window, `None` for overflow.
    /// Keys below the window floor clamp into the cursor bucket.
    fn bucket_of(&self, key: f32) -> Option<usize> {
        if key >= self.max_cost {
            return None;
        }
        let raw = ((key - self.min_cost).max(0.0) / self.bucket_size) as usize;
        Some(raw.min(self.buckets.len() - 1).max(self.current))
    }

    /// Insert `idx` keyed by `key(idx)`.
    pub fn add(&mut self, idx: u32, key: impl Fn(u32) -> f32) {
        match self.bucket_of(key(idx)) {
            Some(b) => self.buckets[b].push_back(idx),
            None => self.overflow.push_back(idx),
        }
        self.size += 1;
    }

    /// Move `idx` to the bucket of `new_key`. The accessor must still read
    /// the old key; callers update the label after this returns. A key that
    /// did not decrease is a programmer error.
    pub fn decrease(&mut self, idx: u32, new_key: f32, key: impl Fn(u32) -> f32) {
        let old_key = key(idx);
        assert!(
            new_key <= old_key,
            "decrease-key to {new_key} above current key {old_key}"
        );
        let in_expected_bucket = match self.bucket_of(old_key) {
            Some(b) => remove_index(&mut self.buckets[b], idx),
            None => remove_index(&mut self.overflow, idx),
        };
        let found = in_expected_bucket || self.remove_anywhere(idx);
        assert!(found, "decrease-key for index {idx} not present in the queue");

        match self.bucket_of(new_key) {
            Some(b) => self.buckets[b].push_back(idx),
            None => self.overflow.push_back(idx),
        }
    }

    /// Pop a minimum-cost index, advancing the cursor. `None` when empty.
    pub fn pop(&mut self, key: impl Fn(u32) -> f32) -> Option<u32> {
        loop {
            while self.current < self.buckets.len() {
                if let Some(idx) = self.buckets[self.current].pop_front() {
                    self.size -= 1;
                    return Some(idx);
                }
                self.current += 1;
            }
            if self.overflow.is_empty() {
                return None;
            }
            self.rebucket_overflow(&key);
        }
    }

    /// Re-base the window at the smallest overflowed key and distribute the
    /// overflow bucket; keys still past the new window stay overflowed.
    fn rebucket_overflow(&mut self, key: &impl Fn(u32) -> f32) {
        let mut min = f32::INFINITY;
        for &idx in &self.overflow {
            min = min.min(key(idx));
        }
        self.min_cost = (min / self.bucket_size).floor() * self.bucket_size;
        self.max_cost = self.min_cost + self.range;
        self.current = 0;

        let pending = std::mem::take(&mut self.overflow);
        for idx in pending {
            match self.bucket_of(key(idx)) {
                Some(b) => self.buckets[b].push_back(idx),
                None => self.overflow.push_back(idx),
            }
        }
    }

    /// Fallback removal when a stale key points at the wrong bucket.
    fn remove_anywhere(&mut self, idx: u32) -> bool {
        for bucket in self.buckets.iter_mut().skip(self.current) {
            if remove_index(bucket, idx) {
                return true;
            }
        }
        remove_index(&mut self.overflow, idx)
    }
}

fn remove_index(bucket: &mut VecDeque<u32>, idx: u32) -> bool {
    match bucket.iter().position(|&i| i == idx) {
        Some(pos) => {
            bucket.remove(pos);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pop_orders_buckets() {
        let keys = [7.5f32, 0.2, 3.0, 3.4, 1.1];
        let mut q = DoubleBucketQueue::new(0.0, 10.0, 1.0);
        for i in 0..keys.len() as u32 {
            q.add(i, |i| keys[i as usize]);
        }
        let mut popped = Vec::new();
        while let Some(i) = q.pop(|i| keys[i as usize]) {
            popped.push(keys[i as usize]);
        }
        assert_eq!(popped, vec![0.2, 1.1, 3.0, 3.4, 7.5]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_overflow_rebucketing() {
        let keys = [25.0f32, 2.0, 31.5, 28.0];
        let mut q = DoubleBucketQueue::new(0.0, 10.0, 1.0);
        for i in 0..keys.len() as u32 {
            q.add(i, |i| keys[i as usize]);
        }
        let mut popped = Vec::new();
        while let Some(i) = q.pop(|i| keys[i as usize]) {
            popped.push(keys[i as usize]);
        }
        assert_eq!(popped, vec![2.0, 25.0, 28.0, 31.5]);
    }

    #[test]
    fn test_decrease_moves_bucket() {
        let mut keys = [9.0f32, 5.0];
        let mut q = DoubleBucketQueue::new(0.0, 10.0, 1.0);
        q.add(0, |i| keys[i as usize]);
        q.add(1, |i| keys[i as usize]);
        q.decrease(0, 1.0, |i| keys[i as usize]);
        keys[0] = 1.0;
        assert_eq!(q.pop(|i| keys[i as usize]), Some(0));
        assert_eq!(q.pop(|i| keys[i as usize]), Some(1));
        assert_eq!(q.pop(|i| keys[i as usize]), None);
    }

    #[test]
    #[should_panic(expected = "decrease-key")]
    fn test_decrease_with_higher_key_panics() {
        let keys = [2.0f32];
        let mut q = DoubleBucketQueue::new(0.0, 10.0, 1.0);
        q.add(0, |i| keys[i as usize]);
        q.decrease(0, 5.0, |i| keys[i as usize]);
    }

    #[test]
    fn test_fifo_within_bucket() {
        let keys = [1.2f32, 1.7, 1.4];
        let mut q = DoubleBucketQueue::new(0.0, 10.0, 1.0);
        for i in 0..3 {
            q.add(i, |i| keys[i as usize]);
        }
        assert_eq!(q.pop(|i| keys[i as usize]), Some(0));
        assert_eq!(q.pop(|i| keys[i as usize]), Some(1));
        assert_eq!(q.pop(|i| keys[i as usize]), Some(2));
    }

    proptest! {
        #[test]
        fn prop_pops_bucket_monotone(raw in prop::collection::vec(0.0f32..500.0, 1..200)) {
            let mut q = DoubleBucketQueue::new(0.0, 50.0, 1.0);
            for i in 0..raw.len() as u32 {
                q.add(i, |i| raw[i as usize]);
            }
            let mut last_bucket = 0i64;
            let mut count = 0usize;
            while let Some(i) = q.pop(|i| raw[i as usize]) {
                let bucket = (raw[i as usize] / 1.0).floor() as i64;
                prop_assert!(bucket >= last_bucket);
                last_bucket = bucket;
                count += 1;
            }
            prop_assert_eq!(count, raw.len());
        }
    }
}
