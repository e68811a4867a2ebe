//! LZ77 match finding for DEFLATE.
//!
//! The encoder keeps a sliding window of recent input (32 KiB) and a
//! hash-chain index over every 3-byte prefix in it. For each position it
//! either emits a literal byte or a (length, distance) back-reference to
//! the longest match found by walking the chain.
//!
//! The window persists across [`compress`](Lz77Encoder::compress) calls,
//! so a streaming encoder can feed input chunk by chunk and matches will
//! reach back into earlier chunks (and into a preset dictionary).

use crate::tables::{MAX_MATCH, MIN_MATCH};

/// Maximum back-reference distance for DEFLATE (32 KiB).
pub const WINDOW_SIZE: usize = 32768;

/// Default hash memory level; table size is `1 << (mem_level + 7)`.
pub const DEFAULT_MEM_LEVEL: u8 = 8;

/// Chain entry marking "no earlier position".
const EMPTY: u32 = u32::MAX;

/// A token produced by LZ77 compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lz77Token {
    /// A literal byte.
    Literal(u8),
    /// A back-reference to previously seen data.
    Match {
        /// Number of bytes to copy (3-258).
        length: u16,
        /// Distance back into the window (1-32768).
        distance: u16,
    },
}

/// Match-effort parameters derived from the compression level.
#[derive(Debug, Clone, Copy)]
pub struct Lz77Config {
    /// Maximum hash-chain entries examined per position.
    pub chain_length: usize,
    /// Stop searching once a match at least this long is found.
    pub nice_length: usize,
    /// Defer a match by one byte when the next position matches longer.
    pub lazy: bool,
}

impl Lz77Config {
    /// Preset for a compression level (0-9).
    ///
    /// Level 0 disables matching entirely; the block writer turns the
    /// resulting all-literal token stream into stored blocks.
    pub fn for_level(level: u8) -> Self {
        let (chain_length, nice_length, lazy) = match level.min(9) {
            0 => (0, 0, false),
            1 => (4, 8, false),
            2 => (8, 16, false),
            3 => (16, 32, false),
            4 => (32, 64, false),
            5 => (64, 128, true),
            6 => (128, MAX_MATCH, true),
            7 => (256, MAX_MATCH, true),
            8 => (1024, MAX_MATCH, true),
            _ => (4096, MAX_MATCH, true),
        };
        Self {
            chain_length,
            nice_length,
            lazy,
        }
    }
}

/// Hash-chain LZ77 encoder.
#[derive(Debug)]
pub struct Lz77Encoder {
    /// Input buffer: the live window plus room for incoming data. Slid
    /// back by `WINDOW_SIZE` when the write position nears the end.
    window: Vec<u8>,
    /// Next write position in `window`.
    window_pos: usize,
    /// hash -> most recent position with that 3-byte prefix.
    head: Vec<u32>,
    /// position -> previous position with the same hash (ring of
    /// `WINDOW_SIZE` entries).
    prev: Vec<u32>,
    hash_mask: usize,
    config: Lz77Config,
}

impl Lz77Encoder {
    /// Create an encoder with default level and memory settings.
    pub fn new() -> Self {
        Self::with_level(6)
    }

    /// Create an encoder for a compression level (0-9).
    pub fn with_level(level: u8) -> Self {
        Self::with_config(Lz77Config::for_level(level), DEFAULT_MEM_LEVEL)
    }

    /// Create an encoder with explicit match parameters.
    ///
    /// `mem_level` (1-9) sizes the hash head table as
    /// `1 << (mem_level + 7)` entries; callers validate the range.
    pub fn with_config(config: Lz77Config, mem_level: u8) -> Self {
        let hash_size = 1usize << (usize::from(mem_level) + 7);
        Self {
            window: vec![0; WINDOW_SIZE * 2],
            window_pos: 0,
            head: vec![EMPTY; hash_size],
            prev: vec![EMPTY; WINDOW_SIZE],
            hash_mask: hash_size - 1,
            config,
        }
    }

    /// Reset all match-finding state.
    pub fn reset(&mut self) {
        self.window_pos = 0;
        self.head.fill(EMPTY);
        self.prev.fill(EMPTY);
    }

    /// Preload a preset dictionary into the window.
    ///
    /// Resets existing state. Only the last 32 KiB of a longer dictionary
    /// is useful; callers enforce any stricter limit.
    pub fn set_dictionary(&mut self, dictionary: &[u8]) {
        self.reset();

        let dict = if dictionary.len() > WINDOW_SIZE {
            &dictionary[dictionary.len() - WINDOW_SIZE..]
        } else {
            dictionary
        };

        self.window[..dict.len()].copy_from_slice(dict);
        self.window_pos = dict.len();

        for pos in 0..dict.len().saturating_sub(MIN_MATCH - 1) {
            self.insert_hash(pos);
        }
    }

    /// Bytes of history currently in the window.
    pub fn history_len(&self) -> usize {
        self.window_pos
    }

    /// Multiplicative hash of the 3 bytes at `pos`.
    #[inline]
    fn hash_at(&self, pos: usize) -> usize {
        let h = (usize::from(self.window[pos]) << 16)
            | (usize::from(self.window[pos + 1]) << 8)
            | usize::from(self.window[pos + 2]);
        (h.wrapping_mul(0x9E37_79B1) >> 12) & self.hash_mask
    }

    /// Record `pos` in the hash chains. `pos + 2` must be in the window.
    #[inline]
    fn insert_hash(&mut self, pos: usize) {
        let h = self.hash_at(pos);
        self.prev[pos % WINDOW_SIZE] = self.head[h];
        self.head[h] = pos as u32;
    }

    /// Longest match for the bytes at `pos`, at most `limit` long.
    fn find_match(&self, pos: usize, limit: usize) -> Option<(u16, u16)> {
        let max_len = limit.min(MAX_MATCH);
        if max_len < MIN_MATCH || self.config.chain_length == 0 {
            return None;
        }

        let min_pos = pos.saturating_sub(WINDOW_SIZE);
        let mut candidate = self.head[self.hash_at(pos)];
        let mut best_len = MIN_MATCH - 1;
        let mut best_dist = 0usize;
        let mut chains_left = self.config.chain_length;

        while candidate != EMPTY && (candidate as usize) >= min_pos && chains_left > 0 {
            let start = candidate as usize;
            if start >= pos {
                break;
            }

            // Longer matches must extend past the current best, so check
            // that byte first to reject most candidates in one probe.
            if self.window[start + best_len] == self.window[pos + best_len] {
                let mut len = 0;
                while len < max_len && self.window[start + len] == self.window[pos + len] {
                    len += 1;
                }
                if len > best_len {
                    best_len = len;
                    best_dist = pos - start;
                    if len >= self.config.nice_length || len == max_len {
                        break;
                    }
                }
            }

            candidate = self.prev[start % WINDOW_SIZE];
            chains_left -= 1;
        }

        if best_len >= MIN_MATCH {
            Some((best_len as u16, best_dist as u16))
        } else {
            None
        }
    }

    /// Tokenize `input`, appending to `tokens`.
    ///
    /// The window (and therefore match reach) carries over from previous
    /// calls and from [`set_dictionary`](Self::set_dictionary).
    pub fn compress_into(&mut self, input: &[u8], tokens: &mut Vec<Lz77Token>) {
        let mut input_pos = 0;

        while input_pos < input.len() {
            if self.window_pos + MAX_MATCH >= self.window.len() {
                self.slide_window();
            }

            let space = self.window.len() - self.window_pos;
            let take = space.min(input.len() - input_pos);
            let start = self.window_pos;
            let end = start + take;
            self.window[start..end].copy_from_slice(&input[input_pos..input_pos + take]);
            input_pos += take;
            self.window_pos = end;

            let mut pos = start;
            while pos < end {
                let remaining = end - pos;
                if remaining < MIN_MATCH {
                    // Too short to hash or match.
                    tokens.push(Lz77Token::Literal(self.window[pos]));
                    pos += 1;
                    continue;
                }

                match self.find_match(pos, remaining) {
                    Some((length, distance)) => {
                        let mut emit = true;
                        if self.config.lazy
                            && (length as usize) < self.config.nice_length
                            && remaining > MIN_MATCH
                        {
                            // Lazy evaluation: when the next position
                            // starts a longer match, hold this one back
                            // and emit a single literal instead.
                            self.insert_hash(pos);
                            if let Some((next_len, _)) = self.find_match(pos + 1, remaining - 1) {
                                if next_len > length {
                                    tokens.push(Lz77Token::Literal(self.window[pos]));
                                    pos += 1;
                                    emit = false;
                                }
                            }
                            if emit {
                                // Already hashed `pos` above.
                                tokens.push(Lz77Token::Match { length, distance });
                                for i in 1..length as usize {
                                    if pos + i + MIN_MATCH <= end {
                                        self.insert_hash(pos + i);
                                    }
                                }
                                pos += length as usize;
                            }
                        } else {
                            tokens.push(Lz77Token::Match { length, distance });
                            for i in 0..length as usize {
                                if pos + i + MIN_MATCH <= end {
                                    self.insert_hash(pos + i);
                                }
                            }
                            pos += length as usize;
                        }
                    }
                    None => {
                        tokens.push(Lz77Token::Literal(self.window[pos]));
                        self.insert_hash(pos);
                        pos += 1;
                    }
                }
            }
        }
    }

    /// Tokenize `input` into a fresh vector.
    pub fn compress(&mut self, input: &[u8]) -> Vec<Lz77Token> {
        let mut tokens = Vec::with_capacity(input.len() / 2);
        self.compress_into(input, &mut tokens);
        tokens
    }

    /// Drop the oldest half of the window to make room for new input.
    fn slide_window(&mut self) {
        let shift = self.window_pos - WINDOW_SIZE;
        self.window.copy_within(shift..self.window_pos, 0);
        self.window_pos = WINDOW_SIZE;

        let rebase = |entry: &mut u32| {
            *entry = if *entry != EMPTY && (*entry as usize) >= shift {
                *entry - shift as u32
            } else {
                EMPTY
            };
        };
        self.head.iter_mut().for_each(rebase);
        self.prev.iter_mut().for_each(rebase);
    }
}

impl Default for Lz77Encoder {
    fn default() -> Self {
        Self::new()
    }
}
