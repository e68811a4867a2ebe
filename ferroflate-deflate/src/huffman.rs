//! Canonical Huffman coding for DEFLATE.
//!
//! DEFLATE uses canonical Huffman codes: only the per-symbol code lengths
//! are transmitted, and codes of the same length are assigned consecutive
//! values in symbol order (RFC 1951 Section 3.2.2). Codes are packed into
//! the bit stream most-significant bit first, which on top of the LSB-first
//! byte packing means every code is written bit-reversed.
//!
//! # Alphabets
//!
//! - **Literal/Length**: 0-285 (0-255 literals, 256 EOB, 257-285 lengths)
//! - **Distance**: 0-29 (back-reference distances)
//! - **Code Length**: 0-18 (for encoding dynamic Huffman headers)

use ferroflate_core::BitReader;
use ferroflate_core::error::{CodecError, Result};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::io::Read;

/// Maximum code length in DEFLATE (15 bits).
pub const MAX_CODE_LENGTH: usize = 15;

/// Maximum code length in the code-length alphabet (7 bits).
pub const MAX_CODELEN_LENGTH: usize = 7;

/// Reverse the low `length` bits of `code`.
#[inline]
pub(crate) fn reverse_bits(mut code: u16, length: u8) -> u16 {
    let mut reversed = 0u16;
    for _ in 0..length {
        reversed = (reversed << 1) | (code & 1);
        code >>= 1;
    }
    reversed
}

/// Build canonical Huffman code lengths from symbol frequencies.
///
/// Returns one length per symbol; unused symbols (frequency 0) get length
/// 0. Lengths never exceed `max_length`: an unrestricted Huffman tree is
/// built first, then overdeep leaves are re-balanced with the bit-length
/// count repair used by zlib, preserving Kraft equality.
///
/// A single used symbol gets length 1 (DEFLATE has no zero-bit codes).
pub fn build_code_lengths(frequencies: &[u32], max_length: usize) -> Result<Vec<u8>> {
    if max_length == 0 || max_length > MAX_CODE_LENGTH {
        return Err(CodecError::invalid_options(format!(
            "maximum code length {max_length} out of range 1-{MAX_CODE_LENGTH}"
        )));
    }

    let mut lengths = vec![0u8; frequencies.len()];
    let used: Vec<usize> = (0..frequencies.len())
        .filter(|&i| frequencies[i] > 0)
        .collect();

    match used.len() {
        0 => return Ok(lengths),
        1 => {
            lengths[used[0]] = 1;
            return Ok(lengths);
        }
        n if n > (1 << max_length) => {
            return Err(CodecError::invalid_options(format!(
                "{n} symbols cannot fit in {max_length}-bit codes"
            )));
        }
        _ => {}
    }

    let depths = tree_depths(frequencies, &used);
    let bl_count = limited_length_counts(&depths, used.len(), max_length);

    // Deepest lengths go to the rarest symbols. Ties break on symbol
    // order so the result is deterministic.
    let mut by_frequency = used;
    by_frequency.sort_by_key(|&sym| (Reverse(frequencies[sym]), sym));

    let mut next = 0usize;
    for len in 1..=max_length {
        for _ in 0..bl_count[len] {
            lengths[by_frequency[next]] = len as u8;
            next += 1;
        }
    }
    debug_assert_eq!(next, by_frequency.len());

    Ok(lengths)
}

/// Depth of each used symbol in an unrestricted Huffman tree.
///
/// Returned in the same order as `used`.
fn tree_depths(frequencies: &[u32], used: &[usize]) -> Vec<u8> {
    let n = used.len();

    // Leaves are 0..n, internal nodes are appended after. Each merge
    // records the parent so depths can be resolved top-down afterwards.
    let mut parents: Vec<usize> = vec![usize::MAX; n];
    let mut heap: BinaryHeap<Reverse<(u64, usize)>> = used
        .iter()
        .enumerate()
        .map(|(leaf, &sym)| Reverse((u64::from(frequencies[sym]), leaf)))
        .collect();

    while heap.len() > 1 {
        let Reverse((freq_a, a)) = heap.pop().unwrap_or(Reverse((0, 0)));
        let Reverse((freq_b, b)) = heap.pop().unwrap_or(Reverse((0, 0)));
        let parent = parents.len();
        parents.push(usize::MAX);
        parents[a] = parent;
        parents[b] = parent;
        heap.push(Reverse((freq_a + freq_b, parent)));
    }

    // The root was pushed last; internal nodes only ever point at later
    // nodes, so a reverse sweep resolves every depth in one pass.
    let mut depths = vec![0u8; parents.len()];
    for node in (0..parents.len() - 1).rev() {
        depths[node] = depths[parents[node]].saturating_add(1);
    }
    depths.truncate(n);
    depths
}

/// Per-length code counts with all lengths clamped to `max_length`.
///
/// Clamping overdeep leaves over-subscribes the code space. The repair
/// repeatedly splits the deepest code shorter than the limit into two and
/// retires one limit-length code in its place; each such move frees
/// exactly `2^-max_length` of code space, so counting the integer Kraft
/// excess in those units tells us exactly how many moves restore Kraft
/// equality.
fn limited_length_counts(
    depths: &[u8],
    used: usize,
    max_length: usize,
) -> [u16; MAX_CODE_LENGTH + 1] {
    let mut bl_count = [0u16; MAX_CODE_LENGTH + 1];
    for &depth in depths {
        bl_count[(depth as usize).min(max_length)] += 1;
    }
    debug_assert_eq!(bl_count.iter().map(|&c| c as usize).sum::<usize>(), used);

    // Kraft sum in units of 2^-max_length, minus the full code space.
    let mut excess: i64 = bl_count[1..=max_length]
        .iter()
        .enumerate()
        .map(|(i, &count)| i64::from(count) << (max_length - (i + 1)))
        .sum::<i64>()
        - (1i64 << max_length);

    // Whenever excess > 0 some code sits shorter than the limit (the
    // symbol-count guard in the caller rules out the all-at-limit case),
    // so the inner scan always terminates.
    while excess > 0 {
        let mut bits = max_length - 1;
        while bl_count[bits] == 0 {
            bits -= 1;
        }
        bl_count[bits] -= 1;
        bl_count[bits + 1] += 2;
        bl_count[max_length] -= 1;
        excess -= 1;
    }

    bl_count
}

/// An encoding table: canonical code + length per symbol, with the code
/// already bit-reversed for LSB-first writing.
#[derive(Debug, Clone)]
pub struct HuffmanEncoder {
    codes: Vec<u16>,
    lengths: Vec<u8>,
}

impl HuffmanEncoder {
    /// Build the canonical codes for the given code lengths.
    pub fn from_lengths(code_lengths: &[u8]) -> Result<Self> {
        let mut next_code = canonical_base_codes(code_lengths)?;

        let mut codes = vec![0u16; code_lengths.len()];
        for (symbol, &len) in code_lengths.iter().enumerate() {
            if len > 0 {
                let code = next_code[len as usize];
                next_code[len as usize] += 1;
                codes[symbol] = reverse_bits(code as u16, len);
            }
        }

        Ok(Self {
            codes,
            lengths: code_lengths.to_vec(),
        })
    }

    /// Build lengths from frequencies, then the codes for them.
    pub fn from_frequencies(frequencies: &[u32], max_length: usize) -> Result<Self> {
        let lengths = build_code_lengths(frequencies, max_length)?;
        Self::from_lengths(&lengths)
    }

    /// The bit-reversed code for `symbol`, ready for `BitWriter::write_bits`.
    #[inline]
    pub fn code(&self, symbol: u16) -> u16 {
        self.codes[symbol as usize]
    }

    /// Code length in bits for `symbol` (0 when unused).
    #[inline]
    pub fn code_length(&self, symbol: u16) -> u8 {
        self.lengths[symbol as usize]
    }

    /// The code lengths this table was built from.
    pub fn lengths(&self) -> &[u8] {
        &self.lengths
    }
}

/// First canonical code of each length (RFC 1951 Section 3.2.2), with
/// over-subscription rejected.
fn canonical_base_codes(code_lengths: &[u8]) -> Result<[u32; MAX_CODE_LENGTH + 1]> {
    let mut bl_count = [0u32; MAX_CODE_LENGTH + 1];
    for &len in code_lengths {
        if len as usize > MAX_CODE_LENGTH {
            return Err(CodecError::invalid_header(format!(
                "code length {len} exceeds maximum {MAX_CODE_LENGTH}"
            )));
        }
        bl_count[len as usize] += 1;
    }
    bl_count[0] = 0;

    // Over-subscription check: the code space left after each length
    // must never go negative. Incomplete codes (space left over) are
    // tolerated, matching zlib's inflate.
    let mut available = 1i64;
    for bits in 1..=MAX_CODE_LENGTH {
        available = (available << 1) - i64::from(bl_count[bits]);
        if available < 0 {
            return Err(CodecError::invalid_header(
                "over-subscribed Huffman code lengths",
            ));
        }
    }

    let mut next_code = [0u32; MAX_CODE_LENGTH + 1];
    let mut code = 0u32;
    for bits in 1..=MAX_CODE_LENGTH {
        code = (code + bl_count[bits - 1]) << 1;
        next_code[bits] = code;
    }
    Ok(next_code)
}

/// A decoding table.
///
/// Codes no longer than `FAST_BITS` resolve through a direct lookup table
/// in one probe; longer codes fall back to a bit-by-bit canonical walk.
#[derive(Debug, Clone)]
pub struct HuffmanDecoder {
    /// `(symbol, code_length)` per LSB-first bit window; length 0 marks a
    /// prefix that needs the slow path.
    fast_table: Vec<(u16, u8)>,
    fast_bits: u8,
    max_code_length: u8,
    /// Used symbols grouped by code length, in canonical order.
    symbols: Vec<u16>,
    /// Number of codes per length.
    counts: [u16; MAX_CODE_LENGTH + 1],
    /// First canonical code per length.
    base_codes: [u32; MAX_CODE_LENGTH + 1],
    /// Index into `symbols` where each length's group starts.
    symbol_offsets: [u16; MAX_CODE_LENGTH + 1],
}

impl HuffmanDecoder {
    /// Width of the direct lookup table.
    const FAST_BITS: u8 = 9;

    /// Build a decoder from code lengths.
    ///
    /// A length of 0 means the symbol is unused. All-zero lengths produce
    /// a decoder that rejects every decode, which is how an empty distance
    /// alphabet in a dynamic header behaves.
    pub fn from_lengths(code_lengths: &[u8]) -> Result<Self> {
        if code_lengths.is_empty() {
            return Err(CodecError::invalid_header("empty code lengths"));
        }

        let next_code = canonical_base_codes(code_lengths)?;

        let mut counts = [0u16; MAX_CODE_LENGTH + 1];
        let mut max_length = 0u8;
        for &len in code_lengths {
            if len > 0 {
                counts[len as usize] += 1;
                max_length = max_length.max(len);
            }
        }

        let mut symbol_offsets = [0u16; MAX_CODE_LENGTH + 1];
        let mut offset = 0u16;
        for bits in 1..=MAX_CODE_LENGTH {
            symbol_offsets[bits] = offset;
            offset += counts[bits];
        }

        // Group symbols by length in canonical (symbol) order.
        let mut symbols = vec![0u16; offset as usize];
        let mut fill = symbol_offsets;
        for (symbol, &len) in code_lengths.iter().enumerate() {
            if len > 0 {
                symbols[fill[len as usize] as usize] = symbol as u16;
                fill[len as usize] += 1;
            }
        }

        let fast_bits = Self::FAST_BITS.min(max_length.max(1));
        let mut fast_table = vec![(0u16, 0u8); 1 << fast_bits];
        let mut current_code = next_code;
        for (symbol, &len) in code_lengths.iter().enumerate() {
            if len == 0 {
                continue;
            }
            let code = current_code[len as usize];
            current_code[len as usize] += 1;
            if len > fast_bits {
                continue;
            }
            // Every window whose low bits spell this code resolves to it.
            let reversed = reverse_bits(code as u16, len) as usize;
            let stride = 1usize << len;
            let mut index = reversed;
            while index < fast_table.len() {
                fast_table[index] = (symbol as u16, len);
                index += stride;
            }
        }

        Ok(Self {
            fast_table,
            fast_bits,
            max_code_length: max_length,
            symbols,
            counts,
            base_codes: next_code,
            symbol_offsets,
        })
    }

    /// Longest code length in this table (0 for an empty table).
    pub fn max_code_length(&self) -> u8 {
        self.max_code_length
    }

    /// Decode one symbol from the bit stream.
    #[inline]
    pub fn decode<R: Read>(&self, reader: &mut BitReader<R>) -> Result<u16> {
        if self.max_code_length == 0 {
            return Err(CodecError::invalid_header(
                "symbol coded with an empty Huffman table",
            ));
        }

        // The fast probe needs a full window; near end of stream there
        // may be fewer bits left even though a short code is complete,
        // so fall back to the bit-by-bit walk on EOF.
        match reader.peek_bits(self.fast_bits) {
            Ok(window) => {
                let (symbol, len) = self.fast_table[window as usize];
                if len > 0 {
                    reader.skip_bits(len)?;
                    return Ok(symbol);
                }
                self.decode_slow(reader)
            }
            Err(err) if err.is_incomplete_input() => self.decode_slow(reader),
            Err(err) => Err(err),
        }
    }

    /// Canonical bit-by-bit decode for codes longer than the fast window.
    fn decode_slow<R: Read>(&self, reader: &mut BitReader<R>) -> Result<u16> {
        let mut code = 0u32;
        for len in 1..=self.max_code_length as usize {
            code = (code << 1) | u32::from(reader.read_bit()?);

            let count = u32::from(self.counts[len]);
            let base = self.base_codes[len];
            if count > 0 && code >= base && code < base + count {
                let idx = self.symbol_offsets[len] as usize + (code - base) as usize;
                return Ok(self.symbols[idx]);
            }
        }
        Err(CodecError::invalid_header("invalid Huffman code"))
    }
}
