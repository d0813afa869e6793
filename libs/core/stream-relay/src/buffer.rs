//! Bounded buffer between the stage loop and the publisher worker.
//!
//! The buffer is the only shared mutable state between the two actors. It
//! never blocks the producer: at capacity the oldest entry is evicted to make
//! room (drop-oldest), and the discard counter is incremented.

use crate::metrics::record_buffer_discard;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A single buffered message: the destination stream key and the payload
/// bytes to append there. Ownership moves buffer → batch → sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferEntry {
    pub destination: String,
    pub payload: Vec<u8>,
}

impl BufferEntry {
    pub fn new(destination: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            destination: destination.into(),
            payload,
        }
    }
}

/// Fixed-capacity FIFO queue, safe for one concurrent producer and one
/// concurrent consumer without external locking.
pub struct RelayBuffer {
    entries: Mutex<VecDeque<BufferEntry>>,
    capacity: usize,
}

impl RelayBuffer {
    /// Create a buffer holding at most `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; config validation rejects that long
    /// before a buffer is built.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "buffer capacity must be at least 1");
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Enqueue one entry. Never blocks and never fails; when the buffer is
    /// full the oldest entry is dropped to make room.
    pub fn push(&self, destination: impl Into<String>, payload: Vec<u8>) {
        let mut entries = self.entries.lock().unwrap();
        if entries.len() == self.capacity {
            entries.pop_front();
            record_buffer_discard();
        }
        entries.push_back(BufferEntry::new(destination, payload));
    }

    /// Remove and return up to `max_items` entries in FIFO order. Returns an
    /// empty vec when the buffer is empty; never blocks.
    pub fn drain(&self, max_items: usize) -> Vec<BufferEntry> {
        let mut entries = self.entries.lock().unwrap();
        let take = max_items.min(entries.len());
        entries.drain(..take).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_payloads(entries: &[BufferEntry]) -> Vec<Vec<u8>> {
        entries.iter().map(|e| e.payload.clone()).collect()
    }

    #[test]
    fn test_push_and_drain_fifo() {
        let buffer = RelayBuffer::new(4);
        buffer.push("out:a", b"1".to_vec());
        buffer.push("out:a", b"2".to_vec());
        buffer.push("out:b", b"3".to_vec());

        let drained = buffer.drain(10);
        assert_eq!(
            entry_payloads(&drained),
            vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec()]
        );
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_capacity_invariant_holds_under_overflow() {
        let buffer = RelayBuffer::new(3);
        for i in 0..100 {
            buffer.push("out", format!("{i}").into_bytes());
            assert!(buffer.len() <= 3);
        }
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_overflow_evicts_exactly_the_oldest() {
        let buffer = RelayBuffer::new(2);
        buffer.push("out", b"old".to_vec());
        buffer.push("out", b"mid".to_vec());
        buffer.push("out", b"new".to_vec());

        let drained = buffer.drain(2);
        assert_eq!(
            entry_payloads(&drained),
            vec![b"mid".to_vec(), b"new".to_vec()]
        );
    }

    #[test]
    fn test_drain_respects_max_items() {
        let buffer = RelayBuffer::new(5);
        for i in 0..5 {
            buffer.push("out", vec![i]);
        }

        let first = buffer.drain(3);
        assert_eq!(first.len(), 3);
        assert_eq!(buffer.len(), 2);

        let second = buffer.drain(3);
        assert_eq!(second.len(), 2);
        assert_eq!(entry_payloads(&second), vec![vec![3], vec![4]]);
    }

    #[test]
    fn test_drain_empty_returns_empty_vec() {
        let buffer = RelayBuffer::new(1);
        assert!(buffer.drain(10).is_empty());
    }

    #[test]
    #[should_panic(expected = "capacity must be at least 1")]
    fn test_zero_capacity_rejected() {
        let _ = RelayBuffer::new(0);
    }
}
