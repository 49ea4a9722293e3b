//! Regrouping of microphone reads into encoder-sized chunks
//!
//! Audio devices hand out PCM in whatever sizes they like. The encoder wants
//! one fixed-size chunk per sample, so reads are appended to a pending
//! buffer and drained a chunk at a time. Leftover bytes stay pending until
//! the next read completes them.

/// Buffers PCM bytes and yields fixed-size chunks
#[derive(Debug, Clone)]
pub struct AudioChunker {
    chunk_bytes: usize,
    pending: Vec<u8>,
}

impl AudioChunker {
    pub fn new(chunk_bytes: usize) -> Self {
        Self {
            chunk_bytes,
            pending: Vec::with_capacity(chunk_bytes * 2),
        }
    }

    /// Append one device read
    pub fn push(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Take the next full chunk, if enough bytes are pending
    pub fn next_chunk(&mut self) -> Option<Vec<u8>> {
        if self.chunk_bytes == 0 || self.pending.len() < self.chunk_bytes {
            return None;
        }
        Some(self.pending.drain(..self.chunk_bytes).collect())
    }

    /// Bytes waiting for the rest of their chunk
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Drop any partial chunk
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
