//! Error types for Ferroflate codecs.
//!
//! Every structural inconsistency in a compressed stream is fatal to the
//! current operation: decoding never returns partial data disguised as
//! success, and there is no automatic retry (the transforms are
//! deterministic, so retrying reproduces the same error).

use std::io;
use thiserror::Error;

/// The error type shared by all Ferroflate codecs.
#[derive(Debug, Error)]
pub enum CodecError {
    /// I/O error from an underlying reader/writer.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Input ended before a complete value could be read.
    #[error("unexpected end of input: {needed} more byte(s) required")]
    UnexpectedEof {
        /// Number of bytes that were required but not available.
        needed: usize,
    },

    /// A DEFLATE block header carried the reserved block type 3.
    #[error("invalid block type {btype}")]
    InvalidBlockType {
        /// The 2-bit BTYPE value read from the stream.
        btype: u8,
    },

    /// A literal/length decode produced a symbol outside the alphabet.
    #[error("invalid literal/length symbol {symbol}")]
    InvalidLengthLiteral {
        /// The offending symbol value.
        symbol: u16,
    },

    /// A back-reference pointed past the available history.
    #[error("invalid back-reference distance {distance} (history holds {available} byte(s))")]
    InvalidDistance {
        /// The requested distance.
        distance: usize,
        /// Bytes of history (dictionary + output) actually available.
        available: usize,
    },

    /// A container or Huffman header failed validation.
    #[error("invalid header: {message}")]
    InvalidHeader {
        /// Description of the failed check.
        message: String,
    },

    /// A gzip CRC-32/length or zlib Adler-32 trailer disagreed with the
    /// value recomputed over the decoded output.
    #[error("checksum mismatch: stored {expected:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// Checksum stored in the stream trailer.
        expected: u32,
        /// Checksum recomputed from the decoded data.
        computed: u32,
    },

    /// Input was pushed into a stream after its final chunk.
    #[error("stream already finished")]
    StreamFinished,

    /// The zlib header's preset-dictionary flag disagreed with the
    /// caller-supplied dictionary.
    #[error("dictionary mismatch: {message}")]
    DictionaryMismatch {
        /// Description of the disagreement.
        message: String,
    },

    /// An option was outside its documented range.
    #[error("invalid options: {message}")]
    InvalidOptions {
        /// Description of the offending option.
        message: String,
    },
}

/// Result type alias for Ferroflate operations.
pub type Result<T> = std::result::Result<T, CodecError>;

impl CodecError {
    /// Create an unexpected-EOF error.
    pub fn unexpected_eof(needed: usize) -> Self {
        Self::UnexpectedEof { needed }
    }

    /// Create an invalid-header error.
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Create an invalid-distance error.
    pub fn invalid_distance(distance: usize, available: usize) -> Self {
        Self::InvalidDistance {
            distance,
            available,
        }
    }

    /// Create a checksum-mismatch error.
    pub fn checksum_mismatch(expected: u32, computed: u32) -> Self {
        Self::ChecksumMismatch { expected, computed }
    }

    /// Create a dictionary-mismatch error.
    pub fn dictionary_mismatch(message: impl Into<String>) -> Self {
        Self::DictionaryMismatch {
            message: message.into(),
        }
    }

    /// Create an invalid-options error.
    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions {
            message: message.into(),
        }
    }

    /// True when the error only means "more input is required".
    ///
    /// Streaming decoders use this to distinguish a chunk boundary falling
    /// inside a Huffman code from genuine corruption.
    pub fn is_incomplete_input(&self) -> bool {
        match self {
            Self::UnexpectedEof { .. } => true,
            Self::Io(e) => e.kind() == io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}
