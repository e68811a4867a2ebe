//! Checksums used by the gzip and zlib container formats.
//!
//! - **CRC-32 (ISO 3309)**: gzip trailers. Table-driven, reflected
//!   polynomial 0xEDB88320, initial value and final XOR 0xFFFFFFFF.
//! - **Adler-32 (RFC 1950)**: zlib trailers and preset-dictionary
//!   identification. Two rolling sums modulo 65521.
//!
//! Both support incremental updates so streaming codecs can fold output
//! chunks in as they are produced.

/// CRC-32 lookup table (polynomial 0xEDB88320, reflected).
const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0usize;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB8_8320;
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

/// Incremental CRC-32 calculator.
///
/// # Example
///
/// ```
/// use ferroflate_core::checksum::Crc32;
///
/// assert_eq!(Crc32::compute(b"123456789"), 0xCBF43926);
/// ```
#[derive(Debug, Clone)]
pub struct Crc32 {
    state: u32,
}

impl Crc32 {
    /// Create a new calculator.
    pub fn new() -> Self {
        Self { state: 0xFFFF_FFFF }
    }

    /// Reset to the initial state.
    pub fn reset(&mut self) {
        self.state = 0xFFFF_FFFF;
    }

    /// Fold more data into the checksum.
    #[inline]
    pub fn update(&mut self, data: &[u8]) {
        let mut crc = self.state;
        for &byte in data {
            let idx = ((crc ^ u32::from(byte)) & 0xFF) as usize;
            crc = (crc >> 8) ^ CRC32_TABLE[idx];
        }
        self.state = crc;
    }

    /// Final checksum value.
    pub fn finalize(&self) -> u32 {
        self.state ^ 0xFFFF_FFFF
    }

    /// One-shot checksum of `data`.
    pub fn compute(data: &[u8]) -> u32 {
        let mut crc = Self::new();
        crc.update(data);
        crc.finalize()
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

/// Largest prime smaller than 65536.
const ADLER_MOD: u32 = 65521;

/// Bytes that can be summed before the 32-bit accumulators must be reduced.
const ADLER_NMAX: usize = 5552;

/// Incremental Adler-32 calculator.
///
/// # Example
///
/// ```
/// use ferroflate_core::checksum::Adler32;
///
/// assert_eq!(Adler32::compute(b""), 1);
/// assert_eq!(Adler32::compute(b"Wikipedia"), 0x11E60398);
/// ```
#[derive(Debug, Clone)]
pub struct Adler32 {
    a: u32,
    b: u32,
}

impl Adler32 {
    /// Create a new calculator.
    pub fn new() -> Self {
        Self { a: 1, b: 0 }
    }

    /// Reset to the initial state.
    pub fn reset(&mut self) {
        self.a = 1;
        self.b = 0;
    }

    /// Fold more data into the checksum.
    pub fn update(&mut self, data: &[u8]) {
        let mut a = self.a;
        let mut b = self.b;

        let mut remaining = data;
        while remaining.len() >= ADLER_NMAX {
            let (chunk, rest) = remaining.split_at(ADLER_NMAX);
            remaining = rest;
            for &byte in chunk {
                a += u32::from(byte);
                b += a;
            }
            a %= ADLER_MOD;
            b %= ADLER_MOD;
        }

        for &byte in remaining {
            a += u32::from(byte);
            b += a;
        }

        self.a = a % ADLER_MOD;
        self.b = b % ADLER_MOD;
    }

    /// Final checksum value.
    pub fn finalize(&self) -> u32 {
        (self.b << 16) | self.a
    }

    /// One-shot checksum of `data`.
    pub fn compute(data: &[u8]) -> u32 {
        let mut adler = Self::new();
        adler.update(data);
        adler.finalize()
    }
}

impl Default for Adler32 {
    fn default() -> Self {
        Self::new()
    }
}
