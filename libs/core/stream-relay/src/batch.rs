//! Batch assembly for the publisher worker.
//!
//! One batch per drain cycle, tagged with an approximate bytes-on-wire
//! estimate. The estimate feeds a histogram only; no control decision is
//! made from it.

use crate::buffer::{BufferEntry, RelayBuffer};
use crate::metrics::record_batch_assembled;

/// Assume 33% overhead for base64 encoding on the wire.
const ENCODING_OVERHEAD: f64 = 1.33;

/// The entries of one drain cycle. Transient: lives for a single publish
/// attempt plus its retries.
#[derive(Debug, Default)]
pub struct Batch {
    entries: Vec<BufferEntry>,
    wire_bytes: usize,
}

impl Batch {
    /// Drain up to `max_items` entries from the buffer. A non-empty batch
    /// records its size estimate and message count.
    pub fn assemble(buffer: &RelayBuffer, max_items: usize) -> Self {
        let entries = buffer.drain(max_items);
        let wire_bytes = entries.iter().map(estimate_wire_size).sum();

        let batch = Self {
            entries,
            wire_bytes,
        };
        if !batch.is_empty() {
            record_batch_assembled(batch.len(), batch.wire_bytes);
        }
        batch
    }

    pub fn entries(&self) -> &[BufferEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Estimated bytes on the wire for the whole batch.
    pub fn wire_bytes(&self) -> usize {
        self.wire_bytes
    }
}

fn estimate_wire_size(entry: &BufferEntry) -> usize {
    (entry.payload.len() as f64 * ENCODING_OVERHEAD).round() as usize + entry.destination.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_drains_up_to_max_items() {
        let buffer = RelayBuffer::new(8);
        for i in 0..6 {
            buffer.push("out:cam1", vec![i]);
        }

        let batch = Batch::assemble(&buffer, 4);
        assert_eq!(batch.len(), 4);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_assemble_empty_buffer_yields_empty_batch() {
        let buffer = RelayBuffer::new(4);
        let batch = Batch::assemble(&buffer, 4);
        assert!(batch.is_empty());
        assert_eq!(batch.wire_bytes(), 0);
    }

    #[test]
    fn test_wire_size_estimate() {
        let buffer = RelayBuffer::new(4);
        // 100 payload bytes * 1.33 = 133, plus 8 bytes of key
        buffer.push("out:cam1", vec![0u8; 100]);

        let batch = Batch::assemble(&buffer, 4);
        assert_eq!(batch.wire_bytes(), 133 + 8);
    }

    #[test]
    fn test_wire_size_estimate_sums_entries() {
        let buffer = RelayBuffer::new(4);
        buffer.push("ab", vec![0u8; 10]); // round(13.3) + 2 = 15
        buffer.push("cd", vec![0u8; 20]); // round(26.6) + 2 = 29

        let batch = Batch::assemble(&buffer, 4);
        assert_eq!(batch.wire_bytes(), 15 + 29);
    }
}
