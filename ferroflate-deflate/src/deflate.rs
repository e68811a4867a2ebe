//! DEFLATE compression (RFC 1951).
//!
//! Input is tokenized by the LZ77 encoder, split into blocks, and each
//! block is written in whichever representation costs the fewest bits:
//! stored, fixed Huffman, or dynamic Huffman. Ties prefer the simpler
//! representation (stored over fixed over dynamic).

use crate::huffman::{
    HuffmanEncoder, MAX_CODELEN_LENGTH, MAX_CODE_LENGTH, build_code_lengths,
};
use crate::lz77::{Lz77Config, Lz77Encoder, Lz77Token, WINDOW_SIZE};
use crate::tables::{
    CODE_LENGTH_ORDER, CODE_LENGTH_SYMBOLS, DISTANCE_SYMBOLS, END_OF_BLOCK,
    FIXED_DISTANCE_LENGTHS, FIXED_LITLEN_LENGTHS, LITLEN_SYMBOLS, distance_to_code, length_to_code,
};
use ferroflate_core::BitWriter;
use ferroflate_core::error::{CodecError, Result};
use ferroflate_core::traits::CompressionLevel;
use std::io::Write;

/// Largest stored-block payload (16-bit LEN field).
const MAX_STORED_BLOCK: usize = 65535;

/// Tokens per Huffman block. Splitting lets each block get codes fitted
/// to its local symbol statistics.
const MAX_BLOCK_TOKENS: usize = 16384;

/// Plaintext bytes per Huffman block. A match token covers up to 258
/// bytes, so without this cap a repetitive input would pack megabytes
/// into one block and a streaming decoder, which commits output only at
/// block boundaries, would see nothing until the whole block arrived.
const MAX_BLOCK_BYTES: usize = 64 * 1024;

/// A trailing remainder smaller than both of these is folded into the
/// previous block instead of paying a whole dynamic header for it.
const MIN_BLOCK_TOKENS: usize = 1024;
const MIN_BLOCK_BYTES: usize = 8 * 1024;

/// Tuning options for DEFLATE compression.
#[derive(Debug, Clone, Default)]
pub struct DeflateOptions {
    /// Compression level 0-9. 0 emits stored blocks only.
    pub level: Option<u8>,
    /// Hash memory level 1-9; the match-finder hash table has
    /// `1 << (mem_level + 7)` entries.
    pub mem_level: Option<u8>,
    /// Preset dictionary, at most 32 KiB.
    pub dictionary: Option<Vec<u8>>,
}

impl DeflateOptions {
    /// Options for a compression level with everything else default.
    pub fn with_level(level: u8) -> Self {
        Self {
            level: Some(level),
            ..Self::default()
        }
    }

    fn validated_level(&self) -> Result<u8> {
        let level = self.level.unwrap_or(6);
        if level > 9 {
            return Err(CodecError::invalid_options(format!(
                "compression level {level} out of range 0-9"
            )));
        }
        Ok(level)
    }

    fn validated_mem_level(&self) -> Result<u8> {
        let mem_level = self.mem_level.unwrap_or(crate::lz77::DEFAULT_MEM_LEVEL);
        if !(1..=9).contains(&mem_level) {
            return Err(CodecError::invalid_options(format!(
                "mem_level {mem_level} out of range 1-9"
            )));
        }
        Ok(mem_level)
    }

    fn validated_dictionary(&self) -> Result<Option<&[u8]>> {
        match &self.dictionary {
            None => Ok(None),
            Some(dict) => {
                if dict.len() > WINDOW_SIZE {
                    return Err(CodecError::invalid_options(format!(
                        "dictionary of {} bytes exceeds the {WINDOW_SIZE}-byte window",
                        dict.len()
                    )));
                }
                Ok(Some(dict))
            }
        }
    }
}

impl From<CompressionLevel> for DeflateOptions {
    fn from(level: CompressionLevel) -> Self {
        Self::with_level(level.level())
    }
}

/// DEFLATE compressor.
///
/// Match-finding state persists across [`write_frame`](Self::write_frame)
/// calls, so streaming callers get cross-chunk back-references for free.
#[derive(Debug)]
pub struct Deflater {
    lz77: Lz77Encoder,
    level: u8,
}

impl Deflater {
    /// Create a compressor for the given level (0-9).
    pub fn new(level: u8) -> Result<Self> {
        Self::with_options(&DeflateOptions::with_level(level))
    }

    /// Create a compressor from validated options.
    pub fn with_options(options: &DeflateOptions) -> Result<Self> {
        let level = options.validated_level()?;
        let mem_level = options.validated_mem_level()?;

        let mut lz77 = Lz77Encoder::with_config(Lz77Config::for_level(level), mem_level);
        if let Some(dict) = options.validated_dictionary()? {
            lz77.set_dictionary(dict);
        }

        Ok(Self { lz77, level })
    }

    /// Reset compression state, dropping any dictionary.
    pub fn reset(&mut self) {
        self.lz77.reset();
    }

    /// Compress `data` into complete DEFLATE blocks on `writer`.
    ///
    /// With `is_final` set the last block carries BFINAL; an empty final
    /// frame still emits an empty stored block so the stream terminates.
    /// The writer is left bit-aligned only after a final stored block, so
    /// callers flush or align when the stream is done.
    pub fn write_frame<W: Write>(
        &mut self,
        data: &[u8],
        writer: &mut BitWriter<W>,
        is_final: bool,
    ) -> Result<()> {
        if data.is_empty() {
            if is_final {
                write_stored_block(writer, &[], true)?;
            }
            return Ok(());
        }

        if self.level == 0 {
            let mut offset = 0;
            while offset < data.len() {
                let take = (data.len() - offset).min(MAX_STORED_BLOCK);
                let last = offset + take == data.len();
                write_stored_block(writer, &data[offset..offset + take], is_final && last)?;
                offset += take;
            }
            return Ok(());
        }

        let tokens = self.lz77.compress(data);

        // Walk the token list in block-sized chunks, bounded by both
        // token count and the raw byte span each chunk covers. The byte
        // span also locates the original bytes for the stored
        // alternative.
        let mut start = 0usize;
        let mut byte_offset = 0usize;
        while start < tokens.len() {
            let mut end = start;
            let mut chunk_bytes = 0usize;
            while end < tokens.len()
                && end - start < MAX_BLOCK_TOKENS
                && chunk_bytes < MAX_BLOCK_BYTES
            {
                chunk_bytes += token_byte_len(&tokens[end]);
                end += 1;
            }

            let rest = &tokens[end..];
            if !rest.is_empty() && rest.len() < MIN_BLOCK_TOKENS {
                let rest_bytes: usize = rest.iter().map(token_byte_len).sum();
                if rest_bytes < MIN_BLOCK_BYTES {
                    chunk_bytes += rest_bytes;
                    end = tokens.len();
                }
            }

            let chunk = &tokens[start..end];
            let last = end == tokens.len();

            write_token_block(
                writer,
                chunk,
                &data[byte_offset..byte_offset + chunk_bytes],
                is_final && last,
            )?;

            byte_offset += chunk_bytes;
            start = end;
        }
        debug_assert_eq!(byte_offset, data.len());

        Ok(())
    }

    /// One-shot compression to a byte vector.
    pub fn compress_to_vec(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let mut writer = BitWriter::new(Vec::new());
        self.write_frame(data, &mut writer, true)?;
        writer.flush()?;
        writer.into_inner()
    }
}

/// Decoded size of one token.
fn token_byte_len(token: &Lz77Token) -> usize {
    match token {
        Lz77Token::Literal(_) => 1,
        Lz77Token::Match { length, .. } => *length as usize,
    }
}

/// Write one block of tokens in the cheapest representation.
fn write_token_block<W: Write>(
    writer: &mut BitWriter<W>,
    tokens: &[Lz77Token],
    raw: &[u8],
    is_final: bool,
) -> Result<()> {
    let (litlen_freq, dist_freq) = count_frequencies(tokens);

    let fixed_litlen = fixed_litlen_encoder()?;
    let fixed_dist = fixed_distance_encoder()?;
    let fixed_cost = 3 + token_bits(tokens, fixed_litlen, fixed_dist);

    let header = DynamicHeader::build(&litlen_freq, &dist_freq)?;
    let dyn_litlen = HuffmanEncoder::from_lengths(&header.litlen_lengths)?;
    let dyn_dist = HuffmanEncoder::from_lengths(&header.dist_lengths)?;
    let dynamic_cost = 3 + header.bit_cost() + token_bits(tokens, &dyn_litlen, &dyn_dist);

    let stored_cost = stored_bits(raw.len());

    if stored_cost <= fixed_cost && stored_cost <= dynamic_cost {
        let mut offset = 0;
        while offset < raw.len() {
            let take = (raw.len() - offset).min(MAX_STORED_BLOCK);
            let last = offset + take == raw.len();
            write_stored_block(writer, &raw[offset..offset + take], is_final && last)?;
            offset += take;
        }
        return Ok(());
    }

    if fixed_cost <= dynamic_cost {
        writer.write_bit(is_final)?;
        writer.write_bits(0b01, 2)?; // BTYPE=01 (fixed Huffman)
        write_tokens(writer, tokens, fixed_litlen, fixed_dist)?;
    } else {
        writer.write_bit(is_final)?;
        writer.write_bits(0b10, 2)?; // BTYPE=10 (dynamic Huffman)
        header.write(writer)?;
        write_tokens(writer, tokens, &dyn_litlen, &dyn_dist)?;
    }
    Ok(())
}

/// Write a single stored block (payload at most 65535 bytes).
fn write_stored_block<W: Write>(
    writer: &mut BitWriter<W>,
    payload: &[u8],
    is_final: bool,
) -> Result<()> {
    debug_assert!(payload.len() <= MAX_STORED_BLOCK);

    writer.write_bit(is_final)?;
    writer.write_bits(0b00, 2)?; // BTYPE=00 (stored)
    writer.align_to_byte()?;

    let len = payload.len() as u16;
    writer.write_bits(u32::from(len), 16)?;
    writer.write_bits(u32::from(!len), 16)?;
    writer.write_bytes(payload)?;
    Ok(())
}

/// Symbol frequencies for one block, with the mandatory end-of-block.
fn count_frequencies(tokens: &[Lz77Token]) -> ([u32; LITLEN_SYMBOLS], [u32; DISTANCE_SYMBOLS]) {
    let mut litlen_freq = [0u32; LITLEN_SYMBOLS];
    let mut dist_freq = [0u32; DISTANCE_SYMBOLS];

    for token in tokens {
        match token {
            Lz77Token::Literal(byte) => {
                litlen_freq[*byte as usize] += 1;
            }
            Lz77Token::Match { length, distance } => {
                let (len_code, _, _) = length_to_code(*length);
                litlen_freq[len_code as usize] += 1;
                let (dist_code, _, _) = distance_to_code(*distance);
                dist_freq[dist_code as usize] += 1;
            }
        }
    }
    litlen_freq[END_OF_BLOCK as usize] += 1;

    (litlen_freq, dist_freq)
}

/// Cost in bits of the token payload (including end-of-block) under the
/// given code tables.
fn token_bits(tokens: &[Lz77Token], litlen: &HuffmanEncoder, dist: &HuffmanEncoder) -> usize {
    let mut bits = 0usize;
    for token in tokens {
        match token {
            Lz77Token::Literal(byte) => {
                bits += usize::from(litlen.code_length(u16::from(*byte)));
            }
            Lz77Token::Match { length, distance } => {
                let (len_code, len_extra, _) = length_to_code(*length);
                bits += usize::from(litlen.code_length(len_code)) + usize::from(len_extra);
                let (dist_code, dist_extra, _) = distance_to_code(*distance);
                bits += usize::from(dist.code_length(dist_code)) + usize::from(dist_extra);
            }
        }
    }
    bits + usize::from(litlen.code_length(END_OF_BLOCK))
}

/// Worst-case cost in bits of storing `len` raw bytes.
fn stored_bits(len: usize) -> usize {
    let blocks = len.div_ceil(MAX_STORED_BLOCK).max(1);
    // Header, worst-case alignment padding, LEN/NLEN, payload.
    blocks * (3 + 7 + 32) + len * 8
}

/// Emit the token payload plus end-of-block.
fn write_tokens<W: Write>(
    writer: &mut BitWriter<W>,
    tokens: &[Lz77Token],
    litlen: &HuffmanEncoder,
    dist: &HuffmanEncoder,
) -> Result<()> {
    for token in tokens {
        match token {
            Lz77Token::Literal(byte) => {
                let sym = u16::from(*byte);
                writer.write_bits(u32::from(litlen.code(sym)), litlen.code_length(sym))?;
            }
            Lz77Token::Match { length, distance } => {
                let (len_code, len_extra_bits, len_extra) = length_to_code(*length);
                writer.write_bits(u32::from(litlen.code(len_code)), litlen.code_length(len_code))?;
                if len_extra_bits > 0 {
                    writer.write_bits(u32::from(len_extra), len_extra_bits)?;
                }

                let (dist_code, dist_extra_bits, dist_extra) = distance_to_code(*distance);
                writer.write_bits(u32::from(dist.code(dist_code)), dist.code_length(dist_code))?;
                if dist_extra_bits > 0 {
                    writer.write_bits(u32::from(dist_extra), dist_extra_bits)?;
                }
            }
        }
    }
    writer.write_bits(
        u32::from(litlen.code(END_OF_BLOCK)),
        litlen.code_length(END_OF_BLOCK),
    )?;
    Ok(())
}

/// Cached encoder for the fixed literal/length code.
fn fixed_litlen_encoder() -> Result<&'static HuffmanEncoder> {
    use std::sync::OnceLock;
    static ENCODER: OnceLock<HuffmanEncoder> = OnceLock::new();
    if let Some(encoder) = ENCODER.get() {
        return Ok(encoder);
    }
    let encoder = HuffmanEncoder::from_lengths(&FIXED_LITLEN_LENGTHS)?;
    Ok(ENCODER.get_or_init(|| encoder))
}

/// Cached encoder for the fixed distance code.
fn fixed_distance_encoder() -> Result<&'static HuffmanEncoder> {
    use std::sync::OnceLock;
    static ENCODER: OnceLock<HuffmanEncoder> = OnceLock::new();
    if let Some(encoder) = ENCODER.get() {
        return Ok(encoder);
    }
    let encoder = HuffmanEncoder::from_lengths(&FIXED_DISTANCE_LENGTHS)?;
    Ok(ENCODER.get_or_init(|| encoder))
}

/// One operation in the run-length-coded code-length sequence.
#[derive(Debug, Clone, Copy)]
struct CodeLenOp {
    symbol: u8,
    extra: u8,
    extra_bits: u8,
}

/// The complete dynamic block header: the code tables and their
/// run-length-coded transmission form.
#[derive(Debug)]
struct DynamicHeader {
    litlen_lengths: Vec<u8>,
    dist_lengths: Vec<u8>,
    hlit: usize,
    hdist: usize,
    hclen: usize,
    ops: Vec<CodeLenOp>,
    codelen_lengths: Vec<u8>,
}

impl DynamicHeader {
    fn build(
        litlen_freq: &[u32; LITLEN_SYMBOLS],
        dist_freq: &[u32; DISTANCE_SYMBOLS],
    ) -> Result<Self> {
        let litlen_lengths = build_code_lengths(litlen_freq, MAX_CODE_LENGTH)?;
        let dist_lengths = build_code_lengths(dist_freq, MAX_CODE_LENGTH)?;

        // HLIT >= 257 (end-of-block always present), HDIST >= 1; a block
        // with no matches transmits a single zero distance length.
        let hlit = last_used(&litlen_lengths).max(257);
        let hdist = last_used(&dist_lengths).max(1);

        let mut combined = Vec::with_capacity(hlit + hdist);
        combined.extend_from_slice(&litlen_lengths[..hlit]);
        combined.extend_from_slice(&dist_lengths[..hdist]);
        let ops = rle_encode_lengths(&combined);

        let mut codelen_freq = [0u32; CODE_LENGTH_SYMBOLS];
        for op in &ops {
            codelen_freq[op.symbol as usize] += 1;
        }
        let codelen_lengths = build_code_lengths(&codelen_freq, MAX_CODELEN_LENGTH)?;

        // HCLEN counts trailing entries in transmission order that can
        // be dropped because they are zero. At least 4 are always sent.
        let mut hclen = CODE_LENGTH_SYMBOLS;
        while hclen > 4 && codelen_lengths[CODE_LENGTH_ORDER[hclen - 1]] == 0 {
            hclen -= 1;
        }

        Ok(Self {
            litlen_lengths,
            dist_lengths,
            hlit,
            hdist,
            hclen,
            ops,
            codelen_lengths,
        })
    }

    /// Header cost in bits, excluding the 3-bit block header.
    fn bit_cost(&self) -> usize {
        let mut bits = 5 + 5 + 4 + 3 * self.hclen;
        for op in &self.ops {
            bits += usize::from(self.codelen_lengths[op.symbol as usize])
                + usize::from(op.extra_bits);
        }
        bits
    }

    fn write<W: Write>(&self, writer: &mut BitWriter<W>) -> Result<()> {
        writer.write_bits((self.hlit - 257) as u32, 5)?;
        writer.write_bits((self.hdist - 1) as u32, 5)?;
        writer.write_bits((self.hclen - 4) as u32, 4)?;

        for &index in CODE_LENGTH_ORDER.iter().take(self.hclen) {
            writer.write_bits(u32::from(self.codelen_lengths[index]), 3)?;
        }

        let codelen = HuffmanEncoder::from_lengths(&self.codelen_lengths)?;
        for op in &self.ops {
            let sym = u16::from(op.symbol);
            writer.write_bits(u32::from(codelen.code(sym)), codelen.code_length(sym))?;
            if op.extra_bits > 0 {
                writer.write_bits(u32::from(op.extra), op.extra_bits)?;
            }
        }
        Ok(())
    }
}

/// Index one past the last non-zero length.
fn last_used(lengths: &[u8]) -> usize {
    lengths
        .iter()
        .rposition(|&len| len > 0)
        .map_or(0, |i| i + 1)
}

/// Run-length code a code-length sequence with symbols 16/17/18
/// (RFC 1951 Section 3.2.7).
fn rle_encode_lengths(lengths: &[u8]) -> Vec<CodeLenOp> {
    let mut ops = Vec::new();
    let mut i = 0;

    while i < lengths.len() {
        let len = lengths[i];
        let mut run = 1;
        while i + run < lengths.len() && lengths[i + run] == len {
            run += 1;
        }
        i += run;

        if len == 0 {
            while run > 0 {
                if run >= 11 {
                    let take = run.min(138);
                    ops.push(CodeLenOp {
                        symbol: 18,
                        extra: (take - 11) as u8,
                        extra_bits: 7,
                    });
                    run -= take;
                } else if run >= 3 {
                    ops.push(CodeLenOp {
                        symbol: 17,
                        extra: (run - 3) as u8,
                        extra_bits: 3,
                    });
                    run = 0;
                } else {
                    ops.push(CodeLenOp {
                        symbol: 0,
                        extra: 0,
                        extra_bits: 0,
                    });
                    run -= 1;
                }
            }
        } else {
            // First occurrence is always spelled out; repeats use 16.
            ops.push(CodeLenOp {
                symbol: len,
                extra: 0,
                extra_bits: 0,
            });
            run -= 1;
            while run > 0 {
                if run >= 3 {
                    let take = run.min(6);
                    ops.push(CodeLenOp {
                        symbol: 16,
                        extra: (take - 3) as u8,
                        extra_bits: 2,
                    });
                    run -= take;
                } else {
                    ops.push(CodeLenOp {
                        symbol: len,
                        extra: 0,
                        extra_bits: 0,
                    });
                    run -= 1;
                }
            }
        }
    }

    ops
}

/// Compress data with DEFLATE at the given level.
pub fn deflate(data: &[u8], level: u8) -> Result<Vec<u8>> {
    Deflater::new(level)?.compress_to_vec(data)
}

/// Compress data with DEFLATE using explicit options.
pub fn deflate_with_options(data: &[u8], options: &DeflateOptions) -> Result<Vec<u8>> {
    Deflater::with_options(options)?.compress_to_vec(data)
}
