//! Core traits shared by the Ferroflate codecs.

use crate::error::Result;

/// A chunk-at-a-time codec.
///
/// Both directions of a streaming transform (compress and decompress)
/// share this shape: the caller pushes input chunks in order, marking the
/// last one, and the codec hands completed output to a sink callback. A
/// push may produce zero, one, or many sink calls depending on how much
/// buffered state the chunk completes.
///
/// Implementations must reject any push after the final chunk with
/// [`CodecError::StreamFinished`](crate::error::CodecError::StreamFinished).
pub trait ChunkCodec {
    /// Feed the next input chunk. `is_final` marks the end of the stream.
    fn push(
        &mut self,
        chunk: &[u8],
        is_final: bool,
        sink: &mut dyn FnMut(&[u8]),
    ) -> Result<()>;

    /// True once the final chunk has been accepted and fully processed.
    fn is_finished(&self) -> bool;
}

/// Compression level for algorithms that support it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    /// No compression (stored blocks only).
    pub const NONE: Self = Self(0);
    /// Fastest compression.
    pub const FAST: Self = Self(1);
    /// Default compression (balanced).
    pub const DEFAULT: Self = Self(6);
    /// Best compression (slowest).
    pub const BEST: Self = Self(9);

    /// Create a custom compression level, clamping values above 9 to 9.
    ///
    /// This type is a convenience for callers that want a valid level no
    /// matter what; codecs that must reject out-of-range input instead
    /// validate the raw level in their own options layer.
    pub fn new(level: u8) -> Self {
        Self(level.min(9))
    }

    /// Get the level value.
    pub fn level(&self) -> u8 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u8> for CompressionLevel {
    /// Clamps like [`CompressionLevel::new`].
    fn from(level: u8) -> Self {
        Self::new(level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compression_level() {
        assert_eq!(CompressionLevel::NONE.level(), 0);
        assert_eq!(CompressionLevel::FAST.level(), 1);
        assert_eq!(CompressionLevel::DEFAULT.level(), 6);
        assert_eq!(CompressionLevel::BEST.level(), 9);

        // Out-of-range levels clamp rather than fail; rejection is the
        // job of each codec's options layer.
        assert_eq!(CompressionLevel::new(100).level(), 9);
        assert_eq!(CompressionLevel::from(10u8).level(), 9);
    }
}
