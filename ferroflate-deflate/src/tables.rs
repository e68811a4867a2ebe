//! Symbol tables for DEFLATE (RFC 1951).
//!
//! Length and distance values are transmitted as a code plus a run of
//! extra bits; the tables here give the base value and extra-bit count for
//! every code, plus the fixed code lengths from section 3.2.6.

/// Minimum back-reference length.
pub const MIN_MATCH: usize = 3;

/// Maximum back-reference length.
pub const MAX_MATCH: usize = 258;

/// Maximum back-reference distance (the window size).
pub const MAX_DISTANCE: usize = 32768;

/// End-of-block symbol in the literal/length alphabet.
pub const END_OF_BLOCK: u16 = 256;

/// Number of literal/length symbols that can appear in a stream (0-285).
pub const LITLEN_SYMBOLS: usize = 286;

/// Number of distance symbols that can appear in a stream (0-29).
pub const DISTANCE_SYMBOLS: usize = 30;

/// Number of code-length alphabet symbols (0-18).
pub const CODE_LENGTH_SYMBOLS: usize = 19;

/// Fixed literal/length code lengths (RFC 1951 Section 3.2.6).
///
/// - Symbols 0-143: 8 bits
/// - Symbols 144-255: 9 bits
/// - Symbols 256-279: 7 bits
/// - Symbols 280-287: 8 bits
pub const FIXED_LITLEN_LENGTHS: [u8; 288] = {
    let mut lengths = [8u8; 288];
    let mut i = 144;
    while i < 256 {
        lengths[i] = 9;
        i += 1;
    }
    let mut i = 256;
    while i < 280 {
        lengths[i] = 7;
        i += 1;
    }
    lengths
};

/// Fixed distance code lengths: all 30 codes use 5 bits.
pub const FIXED_DISTANCE_LENGTHS: [u8; 30] = [5u8; 30];

/// Length code base values (RFC 1951 Section 3.2.5).
///
/// For length codes 257-285, this gives the base length value.
/// Extra bits are added to get the final length.
pub const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, // 257-264: 0 extra bits
    11, 13, 15, 17, // 265-268: 1 extra bit
    19, 23, 27, 31, // 269-272: 2 extra bits
    35, 43, 51, 59, // 273-276: 3 extra bits
    67, 83, 99, 115, // 277-280: 4 extra bits
    131, 163, 195, 227, // 281-284: 5 extra bits
    258, // 285: 0 extra bits (special case)
];

/// Number of extra bits for length codes 257-285.
pub const LENGTH_EXTRA_BITS: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, // 257-264
    1, 1, 1, 1, // 265-268
    2, 2, 2, 2, // 269-272
    3, 3, 3, 3, // 273-276
    4, 4, 4, 4, // 277-280
    5, 5, 5, 5, // 281-284
    0, // 285
];

/// Distance code base values (RFC 1951 Section 3.2.5).
pub const DISTANCE_BASE: [u16; 30] = [
    1, 2, 3, 4, // 0-3: 0 extra bits
    5, 7, // 4-5: 1 extra bit
    9, 13, // 6-7: 2 extra bits
    17, 25, // 8-9: 3 extra bits
    33, 49, // 10-11: 4 extra bits
    65, 97, // 12-13: 5 extra bits
    129, 193, // 14-15: 6 extra bits
    257, 385, // 16-17: 7 extra bits
    513, 769, // 18-19: 8 extra bits
    1025, 1537, // 20-21: 9 extra bits
    2049, 3073, // 22-23: 10 extra bits
    4097, 6145, // 24-25: 11 extra bits
    8193, 12289, // 26-27: 12 extra bits
    16385, 24577, // 28-29: 13 extra bits
];

/// Number of extra bits for distance codes 0-29.
pub const DISTANCE_EXTRA_BITS: [u8; 30] = [
    0, 0, 0, 0, // 0-3
    1, 1, // 4-5
    2, 2, // 6-7
    3, 3, // 8-9
    4, 4, // 10-11
    5, 5, // 12-13
    6, 6, // 14-15
    7, 7, // 16-17
    8, 8, // 18-19
    9, 9, // 20-21
    10, 10, // 22-23
    11, 11, // 24-25
    12, 12, // 26-27
    13, 13, // 28-29
];

/// Transmission order of code-length code lengths in a dynamic block
/// header (RFC 1951 Section 3.2.7).
pub const CODE_LENGTH_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// Convert a match length (3-258) to `(code, extra_bits, extra_value)`.
pub fn length_to_code(length: u16) -> (u16, u8, u16) {
    debug_assert!(
        (MIN_MATCH..=MAX_MATCH).contains(&(length as usize)),
        "length out of range: {length}"
    );

    // 258 has its own zero-extra code; everything below it falls in the
    // last base table entry not exceeding it.
    if length as usize == MAX_MATCH {
        return (285, 0, 0);
    }

    let mut idx = 27;
    while LENGTH_BASE[idx] > length {
        idx -= 1;
    }

    let code = (257 + idx) as u16;
    let extra_bits = LENGTH_EXTRA_BITS[idx];
    let extra_value = length - LENGTH_BASE[idx];
    (code, extra_bits, extra_value)
}

/// Convert a match distance (1-32768) to `(code, extra_bits, extra_value)`.
pub fn distance_to_code(distance: u16) -> (u16, u8, u16) {
    debug_assert!(
        distance >= 1 && distance as usize <= MAX_DISTANCE,
        "distance out of range: {distance}"
    );

    let mut idx = 29;
    while DISTANCE_BASE[idx] > distance {
        idx -= 1;
    }

    let extra_bits = DISTANCE_EXTRA_BITS[idx];
    let extra_value = distance - DISTANCE_BASE[idx];
    (idx as u16, extra_bits, extra_value)
}

/// Decode a length from a length code and its extra bits.
pub fn decode_length(code: u16, extra: u16) -> u16 {
    debug_assert!((257..=285).contains(&code), "invalid length code: {code}");
    LENGTH_BASE[(code - 257) as usize] + extra
}

/// Decode a distance from a distance code and its extra bits.
pub fn decode_distance(code: u16, extra: u16) -> u16 {
    debug_assert!(code < 30, "invalid distance code: {code}");
    DISTANCE_BASE[code as usize] + extra
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_litlen_lengths() {
        assert_eq!(FIXED_LITLEN_LENGTHS[0], 8);
        assert_eq!(FIXED_LITLEN_LENGTHS[143], 8);
        assert_eq!(FIXED_LITLEN_LENGTHS[144], 9);
        assert_eq!(FIXED_LITLEN_LENGTHS[255], 9);
        assert_eq!(FIXED_LITLEN_LENGTHS[256], 7); // End of block
        assert_eq!(FIXED_LITLEN_LENGTHS[279], 7);
        assert_eq!(FIXED_LITLEN_LENGTHS[280], 8);
        assert_eq!(FIXED_LITLEN_LENGTHS[287], 8);
    }

    #[test]
    fn test_fixed_distance_lengths() {
        assert!(FIXED_DISTANCE_LENGTHS.iter().all(|&l| l == 5));
    }

    #[test]
    fn test_length_to_code_roundtrip() {
        for length in 3..=258 {
            let (code, _, extra_value) = length_to_code(length);
            assert_eq!(decode_length(code, extra_value), length);
        }
    }

    #[test]
    fn test_distance_to_code_roundtrip() {
        for distance in 1..=32768u16 {
            let (code, _, extra_value) = distance_to_code(distance);
            assert_eq!(decode_distance(code, extra_value), distance);
        }
    }

    #[test]
    fn test_specific_lengths() {
        assert_eq!(length_to_code(3), (257, 0, 0));
        assert_eq!(length_to_code(10), (264, 0, 0));
        assert_eq!(length_to_code(11), (265, 1, 0));
        assert_eq!(length_to_code(12), (265, 1, 1));
        assert_eq!(length_to_code(257), (284, 5, 30));
        assert_eq!(length_to_code(258), (285, 0, 0));
    }

    #[test]
    fn test_specific_distances() {
        assert_eq!(distance_to_code(1), (0, 0, 0));
        assert_eq!(distance_to_code(4), (3, 0, 0));
        assert_eq!(distance_to_code(5), (4, 1, 0));
        assert_eq!(distance_to_code(6), (4, 1, 1));
        assert_eq!(distance_to_code(32768), (29, 13, 8191));
    }
}
