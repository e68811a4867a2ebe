//! gzip container format (RFC 1952).
//!
//! A gzip member is a 10-byte fixed header, optional fields selected by
//! FLG, the raw DEFLATE body, and a little-endian CRC-32 + ISIZE trailer.
//! One member per stream; concatenated members are not decoded.

use crate::deflate::{DeflateOptions, Deflater};
use crate::inflate::Inflater;
use ferroflate_core::checksum::Crc32;
use ferroflate_core::error::{CodecError, Result};
use ferroflate_core::{BitReader, BitWriter};
use std::io::Cursor;

/// gzip magic bytes.
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Compression method: DEFLATE.
const CM_DEFLATE: u8 = 8;

/// OS byte for "unknown".
const OS_UNKNOWN: u8 = 255;

/// FLG bit assignments.
pub mod flags {
    /// Content is probably text.
    pub const FTEXT: u8 = 0x01;
    /// Header CRC-16 present.
    pub const FHCRC: u8 = 0x02;
    /// Extra field present.
    pub const FEXTRA: u8 = 0x04;
    /// Original filename present.
    pub const FNAME: u8 = 0x08;
    /// Comment present.
    pub const FCOMMENT: u8 = 0x10;
}

/// Parsed gzip member header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GzipHeader {
    /// Modification time (Unix timestamp, 0 = unavailable).
    pub mtime: u32,
    /// Extra flags; advisory compression-level hint.
    pub xfl: u8,
    /// Originating operating system.
    pub os: u8,
    /// Content-is-text hint (FTEXT).
    pub is_text: bool,
    /// Original filename, when FNAME was set.
    pub filename: Option<String>,
    /// Comment, when FCOMMENT was set.
    pub comment: Option<String>,
}

impl Default for GzipHeader {
    fn default() -> Self {
        Self {
            mtime: 0,
            xfl: 0,
            os: OS_UNKNOWN,
            is_text: false,
            filename: None,
            comment: None,
        }
    }
}

impl GzipHeader {
    /// Parse a member header, returning it and the bytes consumed.
    ///
    /// Truncation reports [`CodecError::UnexpectedEof`] so streaming
    /// callers can retry once more input arrives. An FHCRC field is
    /// verified against the CRC-32 of the header bytes it covers.
    pub fn read(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < 10 {
            return Err(CodecError::unexpected_eof(10 - data.len()));
        }
        if data[0..2] != GZIP_MAGIC {
            return Err(CodecError::invalid_header(format!(
                "bad gzip magic {:02x} {:02x}",
                data[0], data[1]
            )));
        }
        if data[2] != CM_DEFLATE {
            return Err(CodecError::invalid_header(format!(
                "unsupported gzip compression method {}",
                data[2]
            )));
        }

        let flg = data[3];
        if flg & 0xE0 != 0 {
            return Err(CodecError::invalid_header(format!(
                "reserved gzip flag bits set: {flg:#04x}"
            )));
        }
        let mtime = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        let xfl = data[8];
        let os = data[9];
        let mut pos = 10;

        if flg & flags::FEXTRA != 0 {
            if data.len() < pos + 2 {
                return Err(CodecError::unexpected_eof(pos + 2 - data.len()));
            }
            let xlen = u16::from_le_bytes([data[pos], data[pos + 1]]) as usize;
            pos += 2;
            if data.len() < pos + xlen {
                return Err(CodecError::unexpected_eof(pos + xlen - data.len()));
            }
            pos += xlen;
        }

        let filename = if flg & flags::FNAME != 0 {
            Some(read_null_terminated(data, &mut pos)?)
        } else {
            None
        };
        let comment = if flg & flags::FCOMMENT != 0 {
            Some(read_null_terminated(data, &mut pos)?)
        } else {
            None
        };

        if flg & flags::FHCRC != 0 {
            if data.len() < pos + 2 {
                return Err(CodecError::unexpected_eof(pos + 2 - data.len()));
            }
            let stored = u16::from_le_bytes([data[pos], data[pos + 1]]);
            let computed = (Crc32::compute(&data[..pos]) & 0xFFFF) as u16;
            if stored != computed {
                return Err(CodecError::invalid_header(format!(
                    "header CRC mismatch: stored {stored:#06x}, computed {computed:#06x}"
                )));
            }
            pos += 2;
        }

        Ok((
            Self {
                mtime,
                xfl,
                os,
                is_text: flg & flags::FTEXT != 0,
                filename,
                comment,
            },
            pos,
        ))
    }

    /// Serialize the header.
    ///
    /// The filename and comment are written as Latin-1 per RFC 1952;
    /// characters outside Latin-1 (or embedded NULs) are rejected with
    /// [`CodecError::InvalidOptions`].
    pub fn write(&self, out: &mut Vec<u8>) -> Result<()> {
        let mut flg = 0u8;
        if self.is_text {
            flg |= flags::FTEXT;
        }
        if self.filename.is_some() {
            flg |= flags::FNAME;
        }
        if self.comment.is_some() {
            flg |= flags::FCOMMENT;
        }

        out.extend_from_slice(&GZIP_MAGIC);
        out.push(CM_DEFLATE);
        out.push(flg);
        out.extend_from_slice(&self.mtime.to_le_bytes());
        out.push(self.xfl);
        out.push(self.os);

        if let Some(name) = &self.filename {
            write_latin1(name, out)?;
        }
        if let Some(comment) = &self.comment {
            write_latin1(comment, out)?;
        }
        Ok(())
    }
}

/// The name and comment fields are Latin-1 (RFC 1952 Section 2.3.1), so
/// every byte maps straight to the code point of the same value.
fn read_null_terminated(data: &[u8], pos: &mut usize) -> Result<String> {
    match data[*pos..].iter().position(|&b| b == 0) {
        Some(end) => {
            let s = data[*pos..*pos + end].iter().map(|&b| char::from(b)).collect();
            *pos += end + 1;
            Ok(s)
        }
        None => Err(CodecError::unexpected_eof(1)),
    }
}

fn write_latin1(s: &str, out: &mut Vec<u8>) -> Result<()> {
    for c in s.chars() {
        let code = u32::from(c);
        if code == 0 || code > 0xFF {
            return Err(CodecError::invalid_options(format!(
                "gzip header field contains {c:?}, not representable in Latin-1"
            )));
        }
        out.push(code as u8);
    }
    out.push(0);
    Ok(())
}

/// Options for gzip compression.
#[derive(Debug, Clone, Default)]
pub struct GzipOptions {
    /// Compression level 0-9.
    pub level: Option<u8>,
    /// Original filename recorded in the header.
    pub filename: Option<String>,
    /// Modification time (Unix timestamp).
    pub mtime: u32,
}

/// The advisory XFL field for a compression level.
fn xfl_for(level: u8) -> u8 {
    match level {
        0..=1 => 4,
        9 => 2,
        _ => 0,
    }
}

/// Compress `data` into a single-member gzip stream.
pub fn gzip_compress(data: &[u8], level: u8) -> Result<Vec<u8>> {
    gzip_compress_with_options(
        data,
        &GzipOptions {
            level: Some(level),
            ..GzipOptions::default()
        },
    )
}

/// Compress `data` into a gzip stream with an explicit header.
pub fn gzip_compress_with_options(data: &[u8], options: &GzipOptions) -> Result<Vec<u8>> {
    let level = options.level.unwrap_or(6);
    let mut deflater = Deflater::with_options(&DeflateOptions::with_level(level))?;

    let header = GzipHeader {
        mtime: options.mtime,
        xfl: xfl_for(level),
        filename: options.filename.clone(),
        ..GzipHeader::default()
    };
    let mut out = Vec::with_capacity(data.len() / 2 + 32);
    header.write(&mut out)?;

    let mut writer = BitWriter::new(out);
    deflater.write_frame(data, &mut writer, true)?;
    writer.flush()?;
    let mut out = writer.into_inner()?;

    out.extend_from_slice(&Crc32::compute(data).to_le_bytes());
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    Ok(out)
}

/// Decompress a gzip stream.
pub fn gzip_decompress(data: &[u8]) -> Result<Vec<u8>> {
    gzip_decompress_with_header(data).map(|(_, output)| output)
}

/// Decompress a gzip stream, also returning the parsed header.
pub fn gzip_decompress_with_header(data: &[u8]) -> Result<(GzipHeader, Vec<u8>)> {
    let (header, header_len) = GzipHeader::read(data)?;

    let mut inflater = Inflater::new();
    let mut reader = BitReader::new(Cursor::new(&data[header_len..]));
    while !inflater.decode_block(&mut reader)? {}

    reader.align_to_byte();
    let mut trailer = [0u8; 8];
    reader.read_bytes(&mut trailer)?;
    let expected_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let expected_isize = u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]);

    let output = inflater.into_output();
    let computed_crc = Crc32::compute(&output);
    if computed_crc != expected_crc {
        return Err(CodecError::checksum_mismatch(expected_crc, computed_crc));
    }
    let computed_isize = output.len() as u32;
    if computed_isize != expected_isize {
        return Err(CodecError::checksum_mismatch(expected_isize, computed_isize));
    }

    Ok((header, output))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gzip_roundtrip() {
        let input = b"Hello, gzip world! Hello, gzip world!";
        for level in [0, 1, 6, 9] {
            let compressed = gzip_compress(input, level).unwrap();
            assert_eq!(gzip_decompress(&compressed).unwrap(), input);
        }
    }

    #[test]
    fn test_gzip_header_bytes() {
        let compressed = gzip_compress(b"x", 6).unwrap();
        assert_eq!(&compressed[0..2], &GZIP_MAGIC);
        assert_eq!(compressed[2], 8);
        assert_eq!(compressed[3], 0);
        assert_eq!(compressed[9], 255);
    }

    #[test]
    fn test_gzip_empty_input() {
        let compressed = gzip_compress(b"", 6).unwrap();
        assert!(gzip_decompress(&compressed).unwrap().is_empty());
        // ISIZE of an empty member is zero.
        assert_eq!(&compressed[compressed.len() - 4..], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_gzip_filename_and_mtime() {
        let options = GzipOptions {
            level: Some(6),
            filename: Some("data.txt".to_string()),
            mtime: 1_700_000_000,
        };
        let compressed = gzip_compress_with_options(b"named payload", &options).unwrap();

        let (header, output) = gzip_decompress_with_header(&compressed).unwrap();
        assert_eq!(header.filename.as_deref(), Some("data.txt"));
        assert_eq!(header.mtime, 1_700_000_000);
        assert_eq!(output, b"named payload");
    }

    #[test]
    fn test_gzip_filename_latin1_roundtrip() {
        let options = GzipOptions {
            level: Some(6),
            filename: Some("café.txt".to_string()),
            mtime: 0,
        };
        let compressed = gzip_compress_with_options(b"latin-1 name", &options).unwrap();
        // On the wire, é is the single byte 0xE9, not a UTF-8 pair.
        assert_eq!(&compressed[10..19], b"caf\xE9.txt\0");

        let (header, output) = gzip_decompress_with_header(&compressed).unwrap();
        assert_eq!(header.filename.as_deref(), Some("café.txt"));
        assert_eq!(output, b"latin-1 name");
    }

    #[test]
    fn test_gzip_rejects_non_latin1_filename() {
        let options = GzipOptions {
            level: Some(6),
            filename: Some("円.txt".to_string()),
            mtime: 0,
        };
        assert!(matches!(
            gzip_compress_with_options(b"data", &options).unwrap_err(),
            CodecError::InvalidOptions { .. }
        ));
    }

    #[test]
    fn test_gzip_rejects_bad_magic() {
        let mut compressed = gzip_compress(b"data", 6).unwrap();
        compressed[0] = 0x1E;
        assert!(matches!(
            gzip_decompress(&compressed).unwrap_err(),
            CodecError::InvalidHeader { .. }
        ));
    }

    #[test]
    fn test_gzip_rejects_bad_method() {
        let mut compressed = gzip_compress(b"data", 6).unwrap();
        compressed[2] = 7;
        assert!(matches!(
            gzip_decompress(&compressed).unwrap_err(),
            CodecError::InvalidHeader { .. }
        ));
    }

    #[test]
    fn test_gzip_detects_crc_mismatch() {
        let input = b"checksummed gzip payload, stored block";
        let mut compressed = gzip_compress(input, 0).unwrap();
        // Stored body: flip a payload byte ahead of the 8-byte trailer.
        let idx = compressed.len() - 9;
        compressed[idx] ^= 0xFF;
        assert!(matches!(
            gzip_decompress(&compressed).unwrap_err(),
            CodecError::ChecksumMismatch { .. }
        ));
    }

    #[test]
    fn test_gzip_detects_isize_mismatch() {
        let mut compressed = gzip_compress(b"sized payload", 6).unwrap();
        let len = compressed.len();
        compressed[len - 4..].copy_from_slice(&99u32.to_le_bytes());
        assert!(matches!(
            gzip_decompress(&compressed).unwrap_err(),
            CodecError::ChecksumMismatch { .. }
        ));
    }

    #[test]
    fn test_gzip_truncated_header_is_incomplete() {
        let compressed = gzip_compress(b"payload", 6).unwrap();
        let err = GzipHeader::read(&compressed[..6]).unwrap_err();
        assert!(err.is_incomplete_input());
    }

    #[test]
    fn test_gzip_header_fhcrc_verified() {
        let header = GzipHeader {
            filename: Some("f".to_string()),
            ..GzipHeader::default()
        };
        let mut bytes = Vec::new();
        header.write(&mut bytes).unwrap();
        // Rewrite with FHCRC set and the matching CRC-16 appended.
        bytes[3] |= flags::FHCRC;
        let crc = (Crc32::compute(&bytes) & 0xFFFF) as u16;
        bytes.extend_from_slice(&crc.to_le_bytes());

        let (parsed, consumed) = GzipHeader::read(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed.filename.as_deref(), Some("f"));

        // A corrupted CRC-16 is rejected.
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(matches!(
            GzipHeader::read(&bytes).unwrap_err(),
            CodecError::InvalidHeader { .. }
        ));
    }

    #[test]
    fn test_gzip_skips_extra_field() {
        let compressed = gzip_compress(b"extra field payload", 6).unwrap();
        // Splice an FEXTRA field into the fixed header.
        let mut spliced = compressed[..10].to_vec();
        spliced[3] |= flags::FEXTRA;
        spliced.extend_from_slice(&4u16.to_le_bytes());
        spliced.extend_from_slice(&[0xAA, 0xBB, 0xCC, 0xDD]);
        spliced.extend_from_slice(&compressed[10..]);

        assert_eq!(gzip_decompress(&spliced).unwrap(), b"extra field payload");
    }
}
