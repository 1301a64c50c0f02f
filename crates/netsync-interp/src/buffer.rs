//! Bounded, timestamp-ordered measurement queue

use std::collections::vec_deque::{Drain, Iter};
use std::collections::VecDeque;

/// A value as it was at `timestamp` (seconds, sender's timeline)
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement<T> {
    pub value: T,
    pub timestamp: f64,
}

impl<T> Measurement<T> {
    pub fn new(value: T, timestamp: f64) -> Self {
        Measurement { value, timestamp }
    }
}

/// Measurements ordered by timestamp, not by arrival
#[derive(Debug, Clone)]
pub struct MeasurementBuffer<T> {
    entries: VecDeque<Measurement<T>>,
    capacity: usize,
}

impl<T> MeasurementBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        MeasurementBuffer {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert in timestamp order.
    ///
    /// A measurement with the same timestamp as a buffered one replaces it.
    /// When the buffer is over capacity the oldest entry is evicted and
    /// returned.
    pub fn insert(&mut self, measurement: Measurement<T>) -> Option<Measurement<T>> {
        let idx = self
            .entries
            .partition_point(|e| e.timestamp < measurement.timestamp);

        if let Some(existing) = self.entries.get_mut(idx) {
            if existing.timestamp == measurement.timestamp {
                *existing = measurement;
                return None;
            }
        }

        self.entries.insert(idx, measurement);
        if self.entries.len() > self.capacity {
            self.entries.pop_front()
        } else {
            None
        }
    }

    /// Remove every measurement at or before `time`, oldest first
    pub fn drain_until(&mut self, time: f64) -> Drain<'_, Measurement<T>> {
        let end = self.entries.partition_point(|e| e.timestamp <= time);
        self.entries.drain(..end)
    }

    pub fn newest(&self) -> Option<&Measurement<T>> {
        self.entries.back()
    }

    pub fn oldest(&self) -> Option<&Measurement<T>> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> Iter<'_, Measurement<T>> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timestamps(buffer: &MeasurementBuffer<i32>) -> Vec<f64> {
        buffer.iter().map(|m| m.timestamp).collect()
    }

    #[test]
    fn test_orders_by_timestamp() {
        let mut buffer = MeasurementBuffer::new(8);
        buffer.insert(Measurement::new(3, 3.0));
        buffer.insert(Measurement::new(1, 1.0));
        buffer.insert(Measurement::new(2, 2.0));

        assert_eq!(timestamps(&buffer), vec![1.0, 2.0, 3.0]);
        assert_eq!(buffer.oldest().map(|m| m.value), Some(1));
        assert_eq!(buffer.newest().map(|m| m.value), Some(3));
    }

    #[test]
    fn test_duplicate_timestamp_replaces() {
        let mut buffer = MeasurementBuffer::new(8);
        buffer.insert(Measurement::new(1, 1.0));
        assert!(buffer.insert(Measurement::new(5, 1.0)).is_none());

        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.newest().map(|m| m.value), Some(5));
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let mut buffer = MeasurementBuffer::new(3);
        for i in 0..3 {
            assert!(buffer.insert(Measurement::new(i, i as f64)).is_none());
        }
        let evicted = buffer.insert(Measurement::new(10, 10.0));

        assert_eq!(evicted.map(|m| m.value), Some(0));
        assert_eq!(buffer.len(), 3);
        assert_eq!(timestamps(&buffer), vec![1.0, 2.0, 10.0]);
    }

    #[test]
    fn test_drain_until() {
        let mut buffer = MeasurementBuffer::new(8);
        for i in 0..5 {
            buffer.insert(Measurement::new(i, i as f64));
        }

        let drained: Vec<i32> = buffer.drain_until(2.0).map(|m| m.value).collect();
        assert_eq!(drained, vec![0, 1, 2]);
        assert_eq!(timestamps(&buffer), vec![3.0, 4.0]);

        assert_eq!(buffer.drain_until(-1.0).count(), 0);
    }
}
