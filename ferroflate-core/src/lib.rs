//! # Ferroflate Core
//!
//! Core components for the Ferroflate compression library.
//!
//! This crate provides the building blocks the codecs are assembled from:
//!
//! - [`bitstream`]: LSB-first bit-level I/O for variable-length codes
//! - [`window`]: Sliding window history for LZ77 back-references
//! - [`checksum`]: CRC-32 and Adler-32 container checksums
//! - [`traits`]: Chunked codec trait and compression levels
//! - [`error`]: Error types
//!
//! ## Architecture
//!
//! Ferroflate is designed as a layered stack:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L3: Container                                           │
//! │     zlib / gzip framing, streaming adapters             │
//! ├─────────────────────────────────────────────────────────┤
//! │ L2: Codec                                               │
//! │     DEFLATE (LZ77 + canonical Huffman)                  │
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: Primitives (this crate)                             │
//! │     BitReader/BitWriter, Window, CRC-32, Adler-32       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use ferroflate_core::bitstream::BitReader;
//! use ferroflate_core::checksum::Crc32;
//! use std::io::Cursor;
//!
//! // Read bits LSB-first from data
//! let data = vec![0xAB, 0xCD];
//! let mut reader = BitReader::new(Cursor::new(data));
//! let bits = reader.read_bits(12).unwrap();
//! assert_eq!(bits, 0xDAB);
//!
//! // Compute CRC-32
//! let crc = Crc32::compute(b"Hello, World!");
//! assert_eq!(crc, 0xEC4AC3D0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bitstream;
pub mod checksum;
pub mod error;
pub mod traits;
pub mod window;

// Re-exports for convenience
pub use bitstream::{BitReader, BitWriter};
pub use checksum::{Adler32, Crc32};
pub use error::{CodecError, Result};
pub use traits::{ChunkCodec, CompressionLevel};
pub use window::{OutputWindow, Window, WindowMark, DEFLATE_WINDOW_SIZE};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bitstream::{BitReader, BitWriter};
    pub use crate::checksum::{Adler32, Crc32};
    pub use crate::error::{CodecError, Result};
    pub use crate::traits::{ChunkCodec, CompressionLevel};
    pub use crate::window::{OutputWindow, Window};
}
