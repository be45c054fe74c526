//! Core types for the pipeline system

use bytes::Bytes;
use std::time::Duration;
use tokio::time::Instant;

/// Timestamp representation for media frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp {
    /// Microseconds since the start of the run
    pub micros: i64,
}

impl Timestamp {
    /// Create a new timestamp from microseconds
    pub fn from_micros(micros: i64) -> Self {
        Self { micros }
    }

    /// Create a timestamp from duration since the run started
    pub fn from_duration(duration: Duration) -> Self {
        Self {
            micros: duration.as_micros() as i64,
        }
    }

    /// Create a timestamp from instant relative to base
    pub fn from_instant(instant: Instant, base: Instant) -> Self {
        let duration = instant.saturating_duration_since(base);
        Self::from_duration(duration)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}µs", self.micros)
    }
}

/// Decodability class of an encoded chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// Independently decodable
    Key,
    /// Depends on the previously decoded frame
    Delta,
}

impl std::fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkKind::Key => write!(f, "key"),
            ChunkKind::Delta => write!(f, "delta"),
        }
    }
}

/// One compressed unit of video produced by an encoder backend.
///
/// Chunks live only in memory for the duration of a run; they are handed from
/// the encoder adapter to the decoder/renderer and then dropped.
#[derive(Clone)]
pub struct EncodedChunk {
    /// Compressed payload
    pub data: Bytes,

    /// Presentation timestamp of the source frame
    pub timestamp: Timestamp,

    /// Key or delta
    pub kind: ChunkKind,

    /// Submission index within the encoding session
    pub sequence: u64,
}

impl EncodedChunk {
    pub fn new(data: Bytes, timestamp: Timestamp, kind: ChunkKind, sequence: u64) -> Self {
        Self {
            data,
            timestamp,
            kind,
            sequence,
        }
    }

    pub fn is_key(&self) -> bool {
        self.kind == ChunkKind::Key
    }

    /// Get the size of the chunk payload in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

impl std::fmt::Debug for EncodedChunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedChunk")
            .field("kind", &self.kind)
            .field("timestamp", &self.timestamp)
            .field("sequence", &self.sequence)
            .field("size", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_from_instant_saturates() {
        let base = Instant::now();
        let later = base + Duration::from_millis(3);
        assert_eq!(Timestamp::from_instant(later, base).micros, 3_000);
        assert_eq!(Timestamp::from_instant(base, later), Timestamp::default());
    }

    #[test]
    fn test_chunk_debug_hides_payload() {
        let chunk = EncodedChunk::new(
            Bytes::from_static(&[1, 2, 3]),
            Timestamp::from_micros(10),
            ChunkKind::Key,
            0,
        );
        let rendered = format!("{:?}", chunk);
        assert!(rendered.contains("size: 3"));
        assert!(chunk.is_key());
    }
}
