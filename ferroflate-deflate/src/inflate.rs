//! DEFLATE decompression (RFC 1951).
//!
//! [`Inflater`] decodes one block per call, which is what the chunked
//! streaming layer needs: it can snapshot the window at a block boundary,
//! attempt the next block, and roll back if the input ran dry partway
//! through. The one-shot [`inflate`] helpers drive the same decoder over
//! a complete buffer.

use crate::huffman::HuffmanDecoder;
use crate::tables::{
    CODE_LENGTH_ORDER, DISTANCE_EXTRA_BITS, FIXED_DISTANCE_LENGTHS, FIXED_LITLEN_LENGTHS,
    LENGTH_EXTRA_BITS, decode_distance, decode_length,
};
use ferroflate_core::error::{CodecError, Result};
use ferroflate_core::window::{OutputWindow, WindowMark};
use ferroflate_core::BitReader;
use std::io::{Cursor, Read};

/// Options for DEFLATE decompression.
#[derive(Debug, Clone, Default)]
pub struct InflateOptions {
    /// Preset dictionary, at most 32 KiB. Must match the dictionary the
    /// stream was compressed with.
    pub dictionary: Option<Vec<u8>>,
}

/// Streaming DEFLATE decoder.
#[derive(Debug)]
pub struct Inflater {
    output: OutputWindow,
    finished: bool,
}

impl Inflater {
    /// Create a decoder with an empty window.
    pub fn new() -> Self {
        Self {
            output: OutputWindow::new(),
            finished: false,
        }
    }

    /// Create a decoder with validated options.
    pub fn with_options(options: &InflateOptions) -> Result<Self> {
        let mut inflater = Self::new();
        if let Some(dict) = &options.dictionary {
            if dict.len() > crate::lz77::WINDOW_SIZE {
                return Err(CodecError::invalid_options(format!(
                    "dictionary of {} bytes exceeds the {}-byte window",
                    dict.len(),
                    crate::lz77::WINDOW_SIZE
                )));
            }
            inflater.output.preload_dictionary(dict);
        }
        Ok(inflater)
    }

    /// True once a block with BFINAL has been fully decoded.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Decoded bytes not yet taken by [`take_output`](Self::take_output).
    pub fn pending(&self) -> &[u8] {
        self.output.pending()
    }

    /// Total decoded bytes produced so far.
    pub fn total_out(&self) -> u64 {
        self.output.total_out()
    }

    /// Drain the decoded bytes, keeping the window for later blocks.
    pub fn take_output(&mut self) -> Vec<u8> {
        self.output.take_output()
    }

    /// Consume the decoder, returning all pending output.
    pub fn into_output(self) -> Vec<u8> {
        self.output.into_output()
    }

    /// Snapshot the window state at a block boundary.
    pub fn mark(&self) -> WindowMark {
        self.output.mark()
    }

    /// Roll back to a block-boundary snapshot after a failed attempt.
    pub fn rollback(&mut self, mark: &WindowMark) {
        self.output.rollback(mark);
    }

    /// Decode exactly one block. Returns `true` when it carried BFINAL.
    ///
    /// On error the window may hold partial output from the failed block;
    /// callers that need to retry roll back to a [`mark`](Self::mark).
    pub fn decode_block<R: Read>(&mut self, reader: &mut BitReader<R>) -> Result<bool> {
        let is_final = reader.read_bit()?;
        let btype = reader.read_bits(2)? as u8;

        match btype {
            0b00 => self.decode_stored(reader)?,
            0b01 => {
                let (litlen, dist) = fixed_decoders()?;
                self.decode_huffman(reader, litlen, dist)?;
            }
            0b10 => {
                let (litlen, dist) = read_dynamic_header(reader)?;
                self.decode_huffman(reader, &litlen, &dist)?;
            }
            btype => return Err(CodecError::InvalidBlockType { btype }),
        }

        if is_final {
            self.finished = true;
        }
        Ok(is_final)
    }

    /// Stored block: byte-aligned LEN/NLEN then raw payload.
    fn decode_stored<R: Read>(&mut self, reader: &mut BitReader<R>) -> Result<()> {
        reader.align_to_byte();

        let mut header = [0u8; 4];
        reader.read_bytes(&mut header)?;
        let len = u16::from_le_bytes([header[0], header[1]]);
        let nlen = u16::from_le_bytes([header[2], header[3]]);
        if len != !nlen {
            return Err(CodecError::invalid_header(format!(
                "stored block length {len:#06x} does not match complement {nlen:#06x}"
            )));
        }

        let mut payload = vec![0u8; len as usize];
        reader.read_bytes(&mut payload)?;
        self.output.push_literals(&payload);
        Ok(())
    }

    /// Huffman-coded block body: symbols until end-of-block.
    fn decode_huffman<R: Read>(
        &mut self,
        reader: &mut BitReader<R>,
        litlen: &HuffmanDecoder,
        dist: &HuffmanDecoder,
    ) -> Result<()> {
        loop {
            let symbol = litlen.decode(reader)?;
            match symbol {
                0..=255 => self.output.push_literal(symbol as u8),
                256 => return Ok(()),
                257..=285 => {
                    let extra_bits = LENGTH_EXTRA_BITS[(symbol - 257) as usize];
                    let extra = reader.read_bits(extra_bits)? as u16;
                    let length = decode_length(symbol, extra);

                    let dist_code = dist.decode(reader)?;
                    let dist_extra_bits = DISTANCE_EXTRA_BITS[dist_code as usize];
                    let dist_extra = reader.read_bits(dist_extra_bits)? as u16;
                    let distance = decode_distance(dist_code, dist_extra);

                    self.output.copy_match(distance as usize, length as usize)?;
                }
                // 286/287 exist in the fixed table but are invalid on the wire.
                symbol => return Err(CodecError::InvalidLengthLiteral { symbol }),
            }
        }
    }
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

/// The cached fixed literal/length and distance decoders.
fn fixed_decoders() -> Result<(&'static HuffmanDecoder, &'static HuffmanDecoder)> {
    use std::sync::OnceLock;
    static TABLES: OnceLock<(HuffmanDecoder, HuffmanDecoder)> = OnceLock::new();

    if let Some((litlen, dist)) = TABLES.get() {
        return Ok((litlen, dist));
    }
    let litlen = HuffmanDecoder::from_lengths(&FIXED_LITLEN_LENGTHS)?;
    let dist = HuffmanDecoder::from_lengths(&FIXED_DISTANCE_LENGTHS)?;
    let (litlen, dist) = TABLES.get_or_init(|| (litlen, dist));
    Ok((litlen, dist))
}

/// Parse a dynamic block header into its two decoding tables.
fn read_dynamic_header<R: Read>(
    reader: &mut BitReader<R>,
) -> Result<(HuffmanDecoder, HuffmanDecoder)> {
    let hlit = reader.read_bits(5)? as usize + 257;
    let hdist = reader.read_bits(5)? as usize + 1;
    let hclen = reader.read_bits(4)? as usize + 4;

    if hlit > 286 {
        return Err(CodecError::invalid_header(format!(
            "dynamic header declares {hlit} literal/length codes (maximum 286)"
        )));
    }
    if hdist > 30 {
        return Err(CodecError::invalid_header(format!(
            "dynamic header declares {hdist} distance codes (maximum 30)"
        )));
    }

    let mut codelen_lengths = [0u8; 19];
    for &index in CODE_LENGTH_ORDER.iter().take(hclen) {
        codelen_lengths[index] = reader.read_bits(3)? as u8;
    }
    let codelen_decoder = HuffmanDecoder::from_lengths(&codelen_lengths)?;

    // The literal/length and distance code lengths form one run-length
    // coded sequence; runs may cross the boundary between the two.
    let total = hlit + hdist;
    let mut lengths = Vec::with_capacity(total);
    while lengths.len() < total {
        let symbol = codelen_decoder.decode(reader)?;
        match symbol {
            0..=15 => lengths.push(symbol as u8),
            16 => {
                let &previous = lengths.last().ok_or_else(|| {
                    CodecError::invalid_header("length repeat with no previous length")
                })?;
                let repeat = reader.read_bits(2)? as usize + 3;
                extend_lengths(&mut lengths, previous, repeat, total)?;
            }
            17 => {
                let repeat = reader.read_bits(3)? as usize + 3;
                extend_lengths(&mut lengths, 0, repeat, total)?;
            }
            18 => {
                let repeat = reader.read_bits(7)? as usize + 11;
                extend_lengths(&mut lengths, 0, repeat, total)?;
            }
            symbol => {
                return Err(CodecError::invalid_header(format!(
                    "invalid code-length symbol {symbol}"
                )));
            }
        }
    }

    let litlen = HuffmanDecoder::from_lengths(&lengths[..hlit])?;
    let dist = HuffmanDecoder::from_lengths(&lengths[hlit..])?;
    Ok((litlen, dist))
}

fn extend_lengths(lengths: &mut Vec<u8>, value: u8, repeat: usize, total: usize) -> Result<()> {
    if lengths.len() + repeat > total {
        return Err(CodecError::invalid_header(
            "code-length run overflows the declared table size",
        ));
    }
    lengths.extend(std::iter::repeat_n(value, repeat));
    Ok(())
}

/// Decompress a complete raw DEFLATE stream.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    inflate_with_options(data, &InflateOptions::default())
}

/// Decompress a complete raw DEFLATE stream with options.
pub fn inflate_with_options(data: &[u8], options: &InflateOptions) -> Result<Vec<u8>> {
    let mut inflater = Inflater::with_options(options)?;
    let mut reader = BitReader::new(Cursor::new(data));
    while !inflater.decode_block(&mut reader)? {}
    Ok(inflater.into_output())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deflate::deflate;

    #[test]
    fn test_inflate_stored_block() {
        // BFINAL=1, BTYPE=00, aligned, LEN=5, NLEN=!5, "hello".
        let data = [0x01, 0x05, 0x00, 0xFA, 0xFF, b'h', b'e', b'l', b'l', b'o'];
        assert_eq!(inflate(&data).unwrap(), b"hello");
    }

    #[test]
    fn test_inflate_empty_stored_block() {
        let data = [0x01, 0x00, 0x00, 0xFF, 0xFF];
        assert!(inflate(&data).unwrap().is_empty());
    }

    #[test]
    fn test_inflate_rejects_bad_nlen() {
        let data = [0x01, 0x05, 0x00, 0xFA, 0xFE, b'h', b'e', b'l', b'l', b'o'];
        let err = inflate(&data).unwrap_err();
        assert!(matches!(err, CodecError::InvalidHeader { .. }));
    }

    #[test]
    fn test_inflate_rejects_reserved_block_type() {
        // BFINAL=1, BTYPE=11.
        let data = [0b0000_0111];
        let err = inflate(&data).unwrap_err();
        assert!(matches!(err, CodecError::InvalidBlockType { btype: 3 }));
    }

    #[test]
    fn test_inflate_truncated_is_incomplete() {
        let compressed = deflate(b"some reasonably sized input text", 6).unwrap();
        let err = inflate(&compressed[..compressed.len() - 4]).unwrap_err();
        assert!(err.is_incomplete_input());
    }

    #[test]
    fn test_inflate_rejects_distance_past_history() {
        // Fixed-Huffman block: length symbol 257 (length 3) with distance
        // code 4 (distance 5) against only 1 byte of history.
        use ferroflate_core::BitWriter;
        use crate::huffman::reverse_bits;

        let mut writer = BitWriter::new(Vec::new());
        writer.write_bit(true).unwrap(); // BFINAL
        writer.write_bits(0b01, 2).unwrap(); // fixed

        // Literal 'A' (symbol 65): 8-bit code 0x30 + 65.
        writer
            .write_bits(u32::from(reverse_bits(0x30 + 65, 8)), 8)
            .unwrap();
        // Length symbol 257: 7-bit code 1 (codes 256-279 start at 0).
        writer.write_bits(u32::from(reverse_bits(1, 7)), 7).unwrap();
        // Distance code 4, 5-bit code, then 1 extra bit = 0 -> distance 5.
        writer.write_bits(u32::from(reverse_bits(4, 5)), 5).unwrap();
        writer.write_bits(0, 1).unwrap();
        // End of block.
        writer.write_bits(u32::from(reverse_bits(0, 7)), 7).unwrap();
        writer.flush().unwrap();
        let data = writer.into_inner().unwrap();

        let err = inflate(&data).unwrap_err();
        assert!(
            matches!(err, CodecError::InvalidDistance { distance: 5, available: 1 }),
            "got {err:?}"
        );
    }

    #[test]
    fn test_inflate_rejects_oversubscribed_dynamic_header() {
        use ferroflate_core::BitWriter;

        // HLIT=257, HDIST=1, HCLEN=19, all code-length codes 1 bit:
        // 19 one-bit codes massively over-subscribe the space.
        let mut writer = BitWriter::new(Vec::new());
        writer.write_bit(true).unwrap();
        writer.write_bits(0b10, 2).unwrap();
        writer.write_bits(0, 5).unwrap(); // HLIT - 257
        writer.write_bits(0, 5).unwrap(); // HDIST - 1
        writer.write_bits(15, 4).unwrap(); // HCLEN - 4
        for _ in 0..19 {
            writer.write_bits(1, 3).unwrap();
        }
        writer.flush().unwrap();
        let data = writer.into_inner().unwrap();

        let err = inflate(&data).unwrap_err();
        assert!(matches!(err, CodecError::InvalidHeader { .. }));
    }

    #[test]
    fn test_inflate_rejects_codelen_run_overflow() {
        use ferroflate_core::BitWriter;

        // Code-length alphabet with symbols 0 and 18 both 1 bit; emit a
        // zero-run of 138 into a 258-entry table, three times.
        let mut writer = BitWriter::new(Vec::new());
        writer.write_bit(true).unwrap();
        writer.write_bits(0b10, 2).unwrap();
        writer.write_bits(0, 5).unwrap();
        writer.write_bits(0, 5).unwrap();
        writer.write_bits(15, 4).unwrap();
        // Transmission order is 16,17,18,0,...; give 18 and 0 length 1.
        let mut lens = [0u8; 19];
        lens[2] = 1; // symbol 18
        lens[3] = 1; // symbol 0
        for &len in &lens {
            writer.write_bits(u32::from(len), 3).unwrap();
        }
        // Canonical: symbol 0 -> code 0, symbol 18 -> code 1 (reversed = 1).
        for _ in 0..3 {
            writer.write_bits(1, 1).unwrap(); // symbol 18
            writer.write_bits(127, 7).unwrap(); // run of 138 zeros
        }
        writer.flush().unwrap();
        let data = writer.into_inner().unwrap();

        let err = inflate(&data).unwrap_err();
        assert!(matches!(err, CodecError::InvalidHeader { .. }));
    }

    #[test]
    fn test_block_by_block_decoding() {
        use crate::deflate::Deflater;
        use ferroflate_core::BitWriter;

        let mut deflater = Deflater::new(6).unwrap();
        let mut writer = BitWriter::new(Vec::new());
        deflater
            .write_frame(b"first block data first block data", &mut writer, false)
            .unwrap();
        deflater.write_frame(b"!!", &mut writer, true).unwrap();
        writer.flush().unwrap();
        let compressed = writer.into_inner().unwrap();

        let mut inflater = Inflater::new();
        let mut reader = BitReader::new(Cursor::new(&compressed));
        assert!(!inflater.decode_block(&mut reader).unwrap());
        assert!(!inflater.is_finished());
        assert!(inflater.decode_block(&mut reader).unwrap());
        assert!(inflater.is_finished());
        assert_eq!(
            inflater.into_output(),
            b"first block data first block data!!"
        );
    }

    #[test]
    fn test_rollback_after_truncated_block() {
        let payload = b"windowed content windowed content windowed content";
        let compressed = deflate(payload, 6).unwrap();

        // Decoding a truncated prefix fails partway through the block,
        // leaving partial output in the window.
        let mut inflater = Inflater::new();
        let mark = inflater.mark();
        let mut reader = BitReader::new(Cursor::new(&compressed[..compressed.len() - 3]));
        let err = inflater.decode_block(&mut reader).unwrap_err();
        assert!(err.is_incomplete_input(), "got {err:?}");

        // Roll back and retry with the complete input, as the chunked
        // decoder does when more data arrives.
        inflater.rollback(&mark);
        let mut reader = BitReader::new(Cursor::new(&compressed[..]));
        assert!(inflater.decode_block(&mut reader).unwrap());
        assert_eq!(inflater.take_output(), payload);
    }

    #[test]
    fn test_dictionary_roundtrip() {
        use crate::deflate::{DeflateOptions, deflate_with_options};

        let dict = b"common prefix dictionary".to_vec();
        let input = b"common prefix dictionary plus payload";

        let compressed = deflate_with_options(
            input,
            &DeflateOptions {
                dictionary: Some(dict.clone()),
                ..Default::default()
            },
        )
        .unwrap();

        // Without the dictionary the back-references point past history.
        assert!(inflate(&compressed).is_err());

        let options = InflateOptions {
            dictionary: Some(dict),
        };
        assert_eq!(inflate_with_options(&compressed, &options).unwrap(), input);
    }
}
