//! Chunked streaming adapters.
//!
//! [`EncodeStream`] and [`DecodeStream`] wrap the block engine behind the
//! push-based [`ChunkCodec`] seam: callers feed input chunks of arbitrary
//! size and receive output through a callback, in any of the three
//! container formats.
//!
//! The encoder keeps its LZ77 window and bit writer alive across pushes,
//! so back-references reach into earlier chunks; each push emits complete
//! blocks for the input it was given. The decoder accumulates undecoded
//! input and retries from the last committed block boundary when a chunk
//! ends partway through a block.

use crate::deflate::{DeflateOptions, Deflater};
use crate::gzip::GzipHeader;
use crate::inflate::{InflateOptions, Inflater};
use crate::zlib::ZlibHeader;
use ferroflate_core::checksum::{Adler32, Crc32};
use ferroflate_core::error::{CodecError, Result};
use ferroflate_core::{BitReader, BitWriter, ChunkCodec};
use std::io::Cursor;

/// Container format for a streaming codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Raw DEFLATE blocks, no header or trailer.
    Raw,
    /// zlib framing (RFC 1950): 2-byte header, Adler-32 trailer.
    Zlib,
    /// gzip framing (RFC 1952): 10-byte header, CRC-32 + ISIZE trailer.
    Gzip,
}

/// Checksum of the plaintext, rolled forward chunk by chunk.
#[derive(Debug)]
enum RunningChecksum {
    None,
    Adler(Adler32),
    Crc(Crc32),
}

impl RunningChecksum {
    fn for_format(format: Format) -> Self {
        match format {
            Format::Raw => Self::None,
            Format::Zlib => Self::Adler(Adler32::new()),
            Format::Gzip => Self::Crc(Crc32::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Self::None => {}
            Self::Adler(adler) => adler.update(data),
            Self::Crc(crc) => crc.update(data),
        }
    }

    fn finalize(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Adler(adler) => adler.finalize(),
            Self::Crc(crc) => crc.finalize(),
        }
    }
}

fn reject_gzip_dictionary(format: Format, dictionary: Option<&[u8]>) -> Result<()> {
    if format == Format::Gzip && dictionary.is_some() {
        return Err(CodecError::invalid_options(
            "gzip streams do not support preset dictionaries",
        ));
    }
    Ok(())
}

/// Streaming compressor for any [`Format`].
#[derive(Debug)]
pub struct EncodeStream {
    format: Format,
    deflater: Deflater,
    writer: BitWriter<Vec<u8>>,
    checksum: RunningChecksum,
    total_in: u64,
    header: Vec<u8>,
    header_sent: bool,
    finished: bool,
}

impl EncodeStream {
    /// Create an encoder for `format` at the given compression level.
    pub fn new(format: Format, level: u8) -> Result<Self> {
        Self::with_options(format, &DeflateOptions::with_level(level))
    }

    /// Create an encoder from validated options.
    pub fn with_options(format: Format, options: &DeflateOptions) -> Result<Self> {
        reject_gzip_dictionary(format, options.dictionary.as_deref())?;
        let deflater = Deflater::with_options(options)?;
        let level = options.level.unwrap_or(6);

        let mut header = Vec::new();
        match format {
            Format::Raw => {}
            Format::Zlib => {
                ZlibHeader {
                    cinfo: 7,
                    flevel: match level {
                        0..=1 => 0,
                        2..=5 => 1,
                        6 => 2,
                        _ => 3,
                    },
                    dictionary_id: options
                        .dictionary
                        .as_deref()
                        .map(|dict| Adler32::compute(dict)),
                }
                .write(&mut header);
            }
            Format::Gzip => {
                GzipHeader::default().write(&mut header)?;
            }
        }

        Ok(Self {
            format,
            deflater,
            writer: BitWriter::new(Vec::new()),
            checksum: RunningChecksum::for_format(format),
            total_in: 0,
            header,
            header_sent: false,
            finished: false,
        })
    }

    fn trailer(&self) -> Vec<u8> {
        match self.format {
            Format::Raw => Vec::new(),
            Format::Zlib => self.checksum.finalize().to_be_bytes().to_vec(),
            Format::Gzip => {
                let mut trailer = Vec::with_capacity(8);
                trailer.extend_from_slice(&self.checksum.finalize().to_le_bytes());
                trailer.extend_from_slice(&(self.total_in as u32).to_le_bytes());
                trailer
            }
        }
    }
}

impl ChunkCodec for EncodeStream {
    fn push(&mut self, chunk: &[u8], is_final: bool, sink: &mut dyn FnMut(&[u8])) -> Result<()> {
        if self.finished {
            return Err(CodecError::StreamFinished);
        }

        if !self.header_sent {
            if !self.header.is_empty() {
                sink(&self.header);
            }
            self.header_sent = true;
        }

        self.checksum.update(chunk);
        self.total_in += chunk.len() as u64;
        self.deflater.write_frame(chunk, &mut self.writer, is_final)?;
        if is_final {
            self.writer.flush()?;
        }

        // Completed bytes have landed in the inner vec; partial bits stay
        // in the writer's accumulator for the next push.
        let ready = std::mem::take(self.writer.get_mut());
        if !ready.is_empty() {
            sink(&ready);
        }

        if is_final {
            let trailer = self.trailer();
            if !trailer.is_empty() {
                sink(&trailer);
            }
            self.finished = true;
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Header,
    Body,
    Trailer,
    Done,
}

/// Streaming decompressor for any [`Format`].
///
/// Input chunks may split anywhere, including inside a Huffman code or a
/// container header. Output for each fully decoded block is delivered
/// immediately; a block cut off by the end of the available input is
/// rolled back and retried on the next push. Structural errors are
/// sticky: after one, further pushes fail with
/// [`CodecError::StreamFinished`].
#[derive(Debug)]
pub struct DecodeStream {
    format: Format,
    inflater: Inflater,
    dictionary: Option<Vec<u8>>,
    buffer: Vec<u8>,
    /// Committed bit offset into `buffer` (always < 8 after draining).
    bit_pos: u64,
    checksum: RunningChecksum,
    total_out: u64,
    stage: Stage,
    failed: bool,
}

impl DecodeStream {
    /// Create a decoder for `format`.
    pub fn new(format: Format) -> Result<Self> {
        Self::with_options(format, &InflateOptions::default())
    }

    /// Create a decoder from validated options.
    pub fn with_options(format: Format, options: &InflateOptions) -> Result<Self> {
        reject_gzip_dictionary(format, options.dictionary.as_deref())?;
        Ok(Self {
            format,
            inflater: Inflater::with_options(options)?,
            dictionary: options.dictionary.clone(),
            buffer: Vec::new(),
            bit_pos: 0,
            checksum: RunningChecksum::for_format(format),
            total_out: 0,
            stage: match format {
                Format::Raw => Stage::Body,
                Format::Zlib | Format::Gzip => Stage::Header,
            },
            failed: false,
        })
    }

    /// Try to parse the container header from the buffered input.
    ///
    /// `Ok(None)` means the header is not complete yet.
    fn parse_header(&mut self) -> Result<Option<usize>> {
        match self.format {
            Format::Raw => Ok(Some(0)),
            Format::Zlib => {
                let (header, consumed) = match ZlibHeader::read(&self.buffer) {
                    Ok(parsed) => parsed,
                    Err(e) if e.is_incomplete_input() => return Ok(None),
                    Err(e) => return Err(e),
                };
                match (header.dictionary_id, self.dictionary.as_deref()) {
                    (Some(_), None) => Err(CodecError::dictionary_mismatch(
                        "stream requires a preset dictionary but none was supplied",
                    )),
                    (Some(id), Some(dict)) => {
                        let supplied = Adler32::compute(dict);
                        if supplied != id {
                            return Err(CodecError::dictionary_mismatch(format!(
                                "stream expects dictionary {id:#010x}, supplied dictionary is {supplied:#010x}"
                            )));
                        }
                        Ok(Some(consumed))
                    }
                    (None, Some(_)) => Err(CodecError::dictionary_mismatch(
                        "dictionary supplied but the stream does not use one",
                    )),
                    (None, None) => Ok(Some(consumed)),
                }
            }
            Format::Gzip => match GzipHeader::read(&self.buffer) {
                Ok((_, consumed)) => Ok(Some(consumed)),
                Err(e) if e.is_incomplete_input() => Ok(None),
                Err(e) => Err(e),
            },
        }
    }

    /// Decode as many complete blocks as the buffered input allows.
    ///
    /// Returns `Ok(true)` once the final block is committed, `Ok(false)`
    /// when the input ran out mid-block.
    fn decode_blocks(&mut self, sink: &mut dyn FnMut(&[u8])) -> Result<bool> {
        loop {
            let mark = self.inflater.mark();
            let byte_off = (self.bit_pos / 8) as usize;
            let bit_off = (self.bit_pos % 8) as u8;

            let mut reader = BitReader::new(Cursor::new(&self.buffer[byte_off..]));
            let result = (|| -> Result<bool> {
                reader.skip_bits(bit_off)?;
                self.inflater.decode_block(&mut reader)
            })();

            match result {
                Ok(is_final_block) => {
                    self.bit_pos = byte_off as u64 * 8 + reader.bit_position();
                    let out = self.inflater.take_output();
                    if !out.is_empty() {
                        self.checksum.update(&out);
                        self.total_out += out.len() as u64;
                        sink(&out);
                    }
                    // Drop committed whole bytes so the buffer stays small.
                    let committed = (self.bit_pos / 8) as usize;
                    self.buffer.drain(..committed);
                    self.bit_pos %= 8;
                    if is_final_block {
                        return Ok(true);
                    }
                }
                Err(e) if e.is_incomplete_input() => {
                    self.inflater.rollback(&mark);
                    return Ok(false);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Verify the container trailer. `Ok(false)` means it is not all
    /// buffered yet.
    fn verify_trailer(&mut self) -> Result<bool> {
        // The final block may end mid-byte; the trailer starts at the
        // next byte boundary.
        let start = (self.bit_pos as usize).div_ceil(8);
        match self.format {
            Format::Raw => Ok(true),
            Format::Zlib => {
                if self.buffer.len() < start + 4 {
                    return Ok(false);
                }
                let stored = u32::from_be_bytes([
                    self.buffer[start],
                    self.buffer[start + 1],
                    self.buffer[start + 2],
                    self.buffer[start + 3],
                ]);
                let computed = self.checksum.finalize();
                if computed != stored {
                    return Err(CodecError::checksum_mismatch(stored, computed));
                }
                Ok(true)
            }
            Format::Gzip => {
                if self.buffer.len() < start + 8 {
                    return Ok(false);
                }
                let bytes = &self.buffer[start..start + 8];
                let stored_crc = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                let stored_isize = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
                let computed_crc = self.checksum.finalize();
                if computed_crc != stored_crc {
                    return Err(CodecError::checksum_mismatch(stored_crc, computed_crc));
                }
                let computed_isize = self.total_out as u32;
                if computed_isize != stored_isize {
                    return Err(CodecError::checksum_mismatch(stored_isize, computed_isize));
                }
                Ok(true)
            }
        }
    }

    /// Advance through the stages as far as the buffered input allows.
    fn process(&mut self, sink: &mut dyn FnMut(&[u8])) -> Result<()> {
        loop {
            match self.stage {
                Stage::Header => match self.parse_header()? {
                    Some(consumed) => {
                        self.buffer.drain(..consumed);
                        self.bit_pos = 0;
                        self.stage = Stage::Body;
                    }
                    None => return Ok(()),
                },
                Stage::Body => {
                    if !self.decode_blocks(sink)? {
                        return Ok(());
                    }
                    self.stage = Stage::Trailer;
                }
                Stage::Trailer => {
                    if !self.verify_trailer()? {
                        return Ok(());
                    }
                    self.stage = Stage::Done;
                }
                Stage::Done => return Ok(()),
            }
        }
    }
}

impl ChunkCodec for DecodeStream {
    fn push(&mut self, chunk: &[u8], is_final: bool, sink: &mut dyn FnMut(&[u8])) -> Result<()> {
        if self.failed || self.stage == Stage::Done {
            return Err(CodecError::StreamFinished);
        }

        self.buffer.extend_from_slice(chunk);
        if let Err(e) = self.process(sink) {
            self.failed = true;
            return Err(e);
        }

        if is_final && self.stage != Stage::Done {
            self.failed = true;
            return Err(CodecError::unexpected_eof(1));
        }
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.stage == Stage::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gzip::gzip_decompress;
    use crate::inflate::inflate;
    use crate::zlib::{zlib_compress, zlib_decompress};

    fn encode_chunked(format: Format, level: u8, data: &[u8], chunk_size: usize) -> Vec<u8> {
        let mut encoder = EncodeStream::new(format, level).unwrap();
        let mut out = Vec::new();
        let mut sink = |bytes: &[u8]| out.extend_from_slice(bytes);

        let mut chunks = data.chunks(chunk_size.max(1)).peekable();
        if chunks.peek().is_none() {
            encoder.push(&[], true, &mut sink).unwrap();
        }
        while let Some(chunk) = chunks.next() {
            let is_final = chunks.peek().is_none();
            encoder.push(chunk, is_final, &mut sink).unwrap();
        }
        assert!(encoder.is_finished());
        out
    }

    fn decode_chunked(format: Format, data: &[u8], chunk_size: usize) -> Result<Vec<u8>> {
        let mut decoder = DecodeStream::new(format)?;
        let mut out = Vec::new();
        let mut sink = |bytes: &[u8]| out.extend_from_slice(bytes);

        let mut chunks = data.chunks(chunk_size.max(1)).peekable();
        while let Some(chunk) = chunks.next() {
            let is_final = chunks.peek().is_none();
            decoder.push(chunk, is_final, &mut sink)?;
        }
        assert!(decoder.is_finished());
        Ok(out)
    }

    fn sample_text() -> Vec<u8> {
        let mut data = Vec::new();
        for i in 0..200 {
            data.extend_from_slice(format!("line {i}: streaming adapters move data\n").as_bytes());
        }
        data
    }

    #[test]
    fn test_streamed_encode_decodes_with_one_shot() {
        let data = sample_text();
        for chunk_size in [1, 3, 64, 1000, data.len()] {
            let raw = encode_chunked(Format::Raw, 6, &data, chunk_size);
            assert_eq!(inflate(&raw).unwrap(), data);

            let zlib = encode_chunked(Format::Zlib, 6, &data, chunk_size);
            assert_eq!(zlib_decompress(&zlib).unwrap(), data);

            let gz = encode_chunked(Format::Gzip, 6, &data, chunk_size);
            assert_eq!(gzip_decompress(&gz).unwrap(), data);
        }
    }

    #[test]
    fn test_streamed_decode_of_one_shot_output() {
        let data = sample_text();
        let compressed = zlib_compress(&data, 6).unwrap();
        for chunk_size in [1, 3, 64, compressed.len()] {
            assert_eq!(
                decode_chunked(Format::Zlib, &compressed, chunk_size).unwrap(),
                data
            );
        }
    }

    #[test]
    fn test_streamed_roundtrip_all_formats() {
        let data = sample_text();
        for format in [Format::Raw, Format::Zlib, Format::Gzip] {
            let compressed = encode_chunked(format, 6, &data, 7);
            assert_eq!(decode_chunked(format, &compressed, 5).unwrap(), data);
        }
    }

    #[test]
    fn test_empty_stream() {
        for format in [Format::Raw, Format::Zlib, Format::Gzip] {
            let compressed = encode_chunked(format, 6, &[], 1);
            assert!(decode_chunked(format, &compressed, 1).unwrap().is_empty());
        }
    }

    #[test]
    fn test_cross_chunk_back_references() {
        // The second push repeats the first; a stateless encoder could
        // not reference it, ours can.
        let first = vec![b'q'; 4000];
        let mut encoder = EncodeStream::new(Format::Raw, 9).unwrap();
        let mut out = Vec::new();
        let mut sink = |bytes: &[u8]| out.extend_from_slice(bytes);
        encoder.push(&first, false, &mut sink).unwrap();
        encoder.push(&first, true, &mut sink).unwrap();

        let mut expected = first.clone();
        expected.extend_from_slice(&first);
        assert_eq!(inflate(&out).unwrap(), expected);
        assert!(out.len() < 200);
    }

    #[test]
    fn test_push_after_final_is_rejected() {
        let mut encoder = EncodeStream::new(Format::Zlib, 6).unwrap();
        let mut sink = |_: &[u8]| {};
        encoder.push(b"data", true, &mut sink).unwrap();
        assert!(matches!(
            encoder.push(b"more", true, &mut sink).unwrap_err(),
            CodecError::StreamFinished
        ));

        let compressed = zlib_compress(b"data", 6).unwrap();
        let mut decoder = DecodeStream::new(Format::Zlib).unwrap();
        decoder.push(&compressed, true, &mut sink).unwrap();
        assert!(matches!(
            decoder.push(b"x", true, &mut sink).unwrap_err(),
            CodecError::StreamFinished
        ));
    }

    #[test]
    fn test_truncated_final_push_fails() {
        let compressed = zlib_compress(&sample_text(), 6).unwrap();
        let mut decoder = DecodeStream::new(Format::Zlib).unwrap();
        let mut sink = |_: &[u8]| {};
        let err = decoder
            .push(&compressed[..compressed.len() / 2], true, &mut sink)
            .unwrap_err();
        assert!(err.is_incomplete_input());
    }

    #[test]
    fn test_structural_error_is_sticky() {
        let mut decoder = DecodeStream::new(Format::Zlib).unwrap();
        let mut sink = |_: &[u8]| {};
        // 0x78 0x00 fails the mod-31 header check.
        assert!(decoder.push(&[0x78, 0x00], false, &mut sink).is_err());
        assert!(matches!(
            decoder.push(&[0x00], false, &mut sink).unwrap_err(),
            CodecError::StreamFinished
        ));
    }

    #[test]
    fn test_gzip_dictionary_rejected() {
        let options = DeflateOptions {
            dictionary: Some(b"dict".to_vec()),
            ..Default::default()
        };
        assert!(matches!(
            EncodeStream::with_options(Format::Gzip, &options).unwrap_err(),
            CodecError::InvalidOptions { .. }
        ));
    }

    #[test]
    fn test_streamed_zlib_dictionary_roundtrip() {
        let dict = b"a dictionary both sides share".to_vec();
        let data = b"a dictionary both sides share, plus payload";

        let encode_options = DeflateOptions {
            dictionary: Some(dict.clone()),
            ..Default::default()
        };
        let mut encoder = EncodeStream::with_options(Format::Zlib, &encode_options).unwrap();
        let mut compressed = Vec::new();
        let mut sink = |bytes: &[u8]| compressed.extend_from_slice(bytes);
        encoder.push(data, true, &mut sink).unwrap();

        let decode_options = InflateOptions {
            dictionary: Some(dict),
        };
        let mut decoder = DecodeStream::with_options(Format::Zlib, &decode_options).unwrap();
        let mut output = Vec::new();
        let mut sink = |bytes: &[u8]| output.extend_from_slice(bytes);
        decoder.push(&compressed, true, &mut sink).unwrap();
        assert_eq!(output, data);
    }

    #[test]
    fn test_corrupted_trailer_fails() {
        let mut compressed = zlib_compress(&sample_text(), 6).unwrap();
        let len = compressed.len();
        compressed[len - 1] ^= 0xFF;
        let mut decoder = DecodeStream::new(Format::Zlib).unwrap();
        let mut sink = |_: &[u8]| {};
        assert!(matches!(
            decoder.push(&compressed, true, &mut sink).unwrap_err(),
            CodecError::ChecksumMismatch { .. }
        ));
    }
}
