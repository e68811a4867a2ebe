//! zlib container format (RFC 1950).
//!
//! A zlib stream is a 2-byte header, an optional preset-dictionary
//! identifier, the raw DEFLATE body, and a big-endian Adler-32 of the
//! uncompressed data.

use crate::deflate::{DeflateOptions, Deflater};
use crate::inflate::{InflateOptions, Inflater};
use ferroflate_core::checksum::Adler32;
use ferroflate_core::error::{CodecError, Result};
use ferroflate_core::{BitReader, BitWriter};
use std::io::Cursor;

/// Compression method: DEFLATE.
const CM_DEFLATE: u8 = 8;

/// CINFO for a 32 KiB window.
const CINFO_32K: u8 = 7;

/// Parsed zlib stream header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZlibHeader {
    /// Window size exponent minus 8 (7 = 32 KiB).
    pub cinfo: u8,
    /// Advisory compression-level field (0-3).
    pub flevel: u8,
    /// Adler-32 of the preset dictionary, when FDICT is set.
    pub dictionary_id: Option<u32>,
}

impl ZlibHeader {
    /// Parse and validate the 2-byte header (plus DICTID when present).
    pub fn read(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < 2 {
            return Err(CodecError::unexpected_eof(2 - data.len()));
        }
        let cmf = data[0];
        let flg = data[1];

        if cmf & 0x0F != CM_DEFLATE {
            return Err(CodecError::invalid_header(format!(
                "unsupported compression method {}",
                cmf & 0x0F
            )));
        }
        let cinfo = cmf >> 4;
        if cinfo > CINFO_32K {
            return Err(CodecError::invalid_header(format!(
                "window size exponent {cinfo} exceeds the 32 KiB maximum"
            )));
        }
        if (u16::from(cmf) * 256 + u16::from(flg)) % 31 != 0 {
            return Err(CodecError::invalid_header("header check bits failed"));
        }

        let flevel = flg >> 6;
        let mut consumed = 2;
        let dictionary_id = if flg & 0x20 != 0 {
            if data.len() < 6 {
                return Err(CodecError::unexpected_eof(6 - data.len()));
            }
            consumed = 6;
            Some(u32::from_be_bytes([data[2], data[3], data[4], data[5]]))
        } else {
            None
        };

        Ok((
            Self {
                cinfo,
                flevel,
                dictionary_id,
            },
            consumed,
        ))
    }

    /// Serialize, computing FCHECK so the header passes the mod-31 test.
    pub fn write(&self, out: &mut Vec<u8>) {
        let cmf = (self.cinfo << 4) | CM_DEFLATE;
        let mut flg = self.flevel << 6;
        if self.dictionary_id.is_some() {
            flg |= 0x20;
        }
        let check = (u16::from(cmf) * 256 + u16::from(flg)) % 31;
        if check != 0 {
            flg += (31 - check) as u8;
        }

        out.push(cmf);
        out.push(flg);
        if let Some(id) = self.dictionary_id {
            out.extend_from_slice(&id.to_be_bytes());
        }
    }
}

/// The advisory FLEVEL field for a compression level.
fn flevel_for(level: u8) -> u8 {
    match level {
        0..=1 => 0,
        2..=5 => 1,
        6 => 2,
        _ => 3,
    }
}

/// Compress `data` into a zlib stream at the given level.
pub fn zlib_compress(data: &[u8], level: u8) -> Result<Vec<u8>> {
    zlib_compress_with_options(data, &DeflateOptions::with_level(level))
}

/// Compress `data` into a zlib stream with explicit options.
///
/// A preset dictionary sets FDICT and records the dictionary's Adler-32
/// in the header so the decompressor can verify it was handed the same
/// one.
pub fn zlib_compress_with_options(data: &[u8], options: &DeflateOptions) -> Result<Vec<u8>> {
    let mut deflater = Deflater::with_options(options)?;

    let header = ZlibHeader {
        cinfo: CINFO_32K,
        flevel: flevel_for(options.level.unwrap_or(6)),
        dictionary_id: options
            .dictionary
            .as_deref()
            .map(|dict| Adler32::compute(dict)),
    };
    let mut out = Vec::with_capacity(data.len() / 2 + 16);
    header.write(&mut out);

    let mut writer = BitWriter::new(out);
    deflater.write_frame(data, &mut writer, true)?;
    writer.flush()?;
    let mut out = writer.into_inner()?;

    out.extend_from_slice(&Adler32::compute(data).to_be_bytes());
    Ok(out)
}

/// Decompress a zlib stream.
pub fn zlib_decompress(data: &[u8]) -> Result<Vec<u8>> {
    zlib_decompress_with_options(data, &InflateOptions::default())
}

/// Decompress a zlib stream with explicit options.
///
/// The dictionary handshake is checked both ways: a stream that requires
/// a dictionary fails without one, a supplied dictionary fails against a
/// stream that does not use one, and a wrong dictionary fails on its
/// Adler-32.
pub fn zlib_decompress_with_options(data: &[u8], options: &InflateOptions) -> Result<Vec<u8>> {
    let (header, header_len) = ZlibHeader::read(data)?;

    match (header.dictionary_id, options.dictionary.as_deref()) {
        (Some(_), None) => {
            return Err(CodecError::dictionary_mismatch(
                "stream requires a preset dictionary but none was supplied",
            ));
        }
        (Some(id), Some(dict)) => {
            let supplied = Adler32::compute(dict);
            if supplied != id {
                return Err(CodecError::dictionary_mismatch(format!(
                    "stream expects dictionary {id:#010x}, supplied dictionary is {supplied:#010x}"
                )));
            }
        }
        (None, Some(_)) => {
            return Err(CodecError::dictionary_mismatch(
                "dictionary supplied but the stream does not use one",
            ));
        }
        (None, None) => {}
    }

    let mut inflater = Inflater::with_options(options)?;
    let mut reader = BitReader::new(Cursor::new(&data[header_len..]));
    while !inflater.decode_block(&mut reader)? {}

    reader.align_to_byte();
    let mut trailer = [0u8; 4];
    reader.read_bytes(&mut trailer)?;
    let expected = u32::from_be_bytes(trailer);

    let output = inflater.into_output();
    let computed = Adler32::compute(&output);
    if computed != expected {
        return Err(CodecError::checksum_mismatch(expected, computed));
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zlib_roundtrip() {
        let input = b"zlib framed payload, zlib framed payload";
        for level in [0, 1, 6, 9] {
            let compressed = zlib_compress(input, level).unwrap();
            assert_eq!(zlib_decompress(&compressed).unwrap(), input);
        }
    }

    #[test]
    fn test_zlib_header_bytes() {
        let compressed = zlib_compress(b"x", 6).unwrap();
        assert_eq!(compressed[0], 0x78);
        // Header check: CMF*256 + FLG divisible by 31.
        let check = u16::from(compressed[0]) * 256 + u16::from(compressed[1]);
        assert_eq!(check % 31, 0);
        // FDICT clear.
        assert_eq!(compressed[1] & 0x20, 0);
    }

    #[test]
    fn test_zlib_empty_input() {
        let compressed = zlib_compress(b"", 6).unwrap();
        assert!(zlib_decompress(&compressed).unwrap().is_empty());
        // Trailer is Adler-32 of nothing.
        assert_eq!(&compressed[compressed.len() - 4..], &[0, 0, 0, 1]);
    }

    #[test]
    fn test_zlib_rejects_bad_method() {
        let mut compressed = zlib_compress(b"data", 6).unwrap();
        compressed[0] = (compressed[0] & 0xF0) | 0x07;
        assert!(matches!(
            zlib_decompress(&compressed).unwrap_err(),
            CodecError::InvalidHeader { .. }
        ));
    }

    #[test]
    fn test_zlib_rejects_bad_fcheck() {
        let mut compressed = zlib_compress(b"data", 6).unwrap();
        compressed[1] ^= 0x01;
        assert!(matches!(
            zlib_decompress(&compressed).unwrap_err(),
            CodecError::InvalidHeader { .. }
        ));
    }

    #[test]
    fn test_zlib_detects_corrupted_payload_checksum() {
        let input = b"checksummed payload checksummed payload";
        let mut compressed = zlib_compress(input, 0).unwrap();
        // Stored body: flip a payload byte without breaking the framing.
        let idx = compressed.len() - 5;
        compressed[idx] ^= 0xFF;
        assert!(matches!(
            zlib_decompress(&compressed).unwrap_err(),
            CodecError::ChecksumMismatch { .. }
        ));
    }

    #[test]
    fn test_zlib_truncated_trailer_is_incomplete() {
        let compressed = zlib_compress(b"payload", 6).unwrap();
        let err = zlib_decompress(&compressed[..compressed.len() - 2]).unwrap_err();
        assert!(err.is_incomplete_input());
    }

    #[test]
    fn test_zlib_dictionary_roundtrip() {
        let dict = b"shared dictionary text".to_vec();
        let input = b"shared dictionary text with a payload";

        let options = DeflateOptions {
            dictionary: Some(dict.clone()),
            ..Default::default()
        };
        let compressed = zlib_compress_with_options(input, &options).unwrap();
        assert_eq!(compressed[1] & 0x20, 0x20, "FDICT set");

        let inflate_options = InflateOptions {
            dictionary: Some(dict),
        };
        assert_eq!(
            zlib_decompress_with_options(&compressed, &inflate_options).unwrap(),
            input
        );
    }

    #[test]
    fn test_zlib_dictionary_mismatch_both_directions() {
        let dict = b"the right dictionary".to_vec();
        let options = DeflateOptions {
            dictionary: Some(dict.clone()),
            ..Default::default()
        };
        let with_dict = zlib_compress_with_options(b"payload", &options).unwrap();
        let without_dict = zlib_compress(b"payload", 6).unwrap();

        // Stream needs a dictionary, none supplied.
        assert!(matches!(
            zlib_decompress(&with_dict).unwrap_err(),
            CodecError::DictionaryMismatch { .. }
        ));

        // Wrong dictionary.
        let wrong = InflateOptions {
            dictionary: Some(b"a different dictionary".to_vec()),
        };
        assert!(matches!(
            zlib_decompress_with_options(&with_dict, &wrong).unwrap_err(),
            CodecError::DictionaryMismatch { .. }
        ));

        // Dictionary supplied to a stream that has none.
        let unneeded = InflateOptions {
            dictionary: Some(dict),
        };
        assert!(matches!(
            zlib_decompress_with_options(&without_dict, &unneeded).unwrap_err(),
            CodecError::DictionaryMismatch { .. }
        ));
    }
}
