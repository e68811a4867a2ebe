//! # Ferroflate Deflate
//!
//! Pure Rust DEFLATE compression and decompression (RFC 1951), with zlib
//! (RFC 1950) and gzip (RFC 1952) containers and chunked streaming
//! adapters.
//!
//! ## Features
//!
//! - **Decompression**: all three DEFLATE block types
//!   - Stored (uncompressed) blocks
//!   - Fixed Huffman codes
//!   - Dynamic Huffman codes
//! - **Compression**: LZ77 hash-chain matching + canonical Huffman coding
//!   - Levels 0-9, per-block choice of cheapest representation
//!   - Preset dictionaries (raw and zlib)
//! - **Streaming**: push chunks of any size through [`EncodeStream`] /
//!   [`DecodeStream`] in raw, zlib, or gzip framing
//!
//! ## Example
//!
//! ```rust
//! use ferroflate_deflate::{deflate, inflate};
//!
//! let original = b"Hello, World! Hello, World!";
//! let compressed = deflate(original, 6).unwrap();
//!
//! let decompressed = inflate(&compressed).unwrap();
//! assert_eq!(&decompressed, original);
//! ```
//!
//! ## Compression Levels
//!
//! - Level 0: no compression (stored blocks)
//! - Level 1-4: fast, greedy matching
//! - Level 5-6: balanced, lazy matching (default is 6)
//! - Level 7-9: best compression (slower)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod deflate;
pub mod gzip;
pub mod huffman;
pub mod inflate;
pub mod lz77;
pub mod stream;
pub mod tables;
pub mod zlib;

#[cfg(feature = "async-io")]
pub mod async_io;

// Re-exports
pub use deflate::{DeflateOptions, Deflater, deflate, deflate_with_options};
pub use gzip::{GzipHeader, GzipOptions, gzip_compress, gzip_compress_with_options, gzip_decompress};
pub use huffman::{HuffmanDecoder, HuffmanEncoder};
pub use inflate::{InflateOptions, Inflater, inflate, inflate_with_options};
pub use lz77::{Lz77Encoder, Lz77Token};
pub use stream::{DecodeStream, EncodeStream, Format};
pub use zlib::{
    ZlibHeader, zlib_compress, zlib_compress_with_options, zlib_decompress,
    zlib_decompress_with_options,
};
