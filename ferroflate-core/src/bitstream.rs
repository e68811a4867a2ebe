//! Bit-level I/O for variable-length codes.
//!
//! DEFLATE packs bits LSB-first within bytes: the first bit of the stream is
//! the least significant bit of the first byte. `BitReader` and `BitWriter`
//! hide the byte/bit alignment arithmetic from the rest of the engine.
//!
//! # Example
//!
//! ```
//! use ferroflate_core::bitstream::{BitReader, BitWriter};
//! use std::io::Cursor;
//!
//! let mut output = Vec::new();
//! {
//!     let mut writer = BitWriter::new(&mut output);
//!     writer.write_bits(0b101, 3).unwrap();
//!     writer.write_bits(0b1100, 4).unwrap();
//!     writer.flush().unwrap();
//! }
//!
//! let mut reader = BitReader::new(Cursor::new(&output));
//! assert_eq!(reader.read_bits(3).unwrap(), 0b101);
//! assert_eq!(reader.read_bits(4).unwrap(), 0b1100);
//! ```

use crate::error::{CodecError, Result};
use std::io::{Read, Write};

/// A bit-level reader over any `Read` source.
///
/// Bits are buffered in a `u64`, refilled a few bytes at a time. All reads
/// are bounds-checked: running past the end of the source yields
/// [`CodecError::UnexpectedEof`] rather than zero-fill.
#[derive(Debug)]
pub struct BitReader<R: Read> {
    reader: R,
    /// Pending bits, LSB-first.
    acc: u64,
    /// Number of valid bits in `acc`.
    acc_bits: u8,
    /// Total bits consumed, for error reporting and stream bookkeeping.
    consumed: u64,
}

impl<R: Read> BitReader<R> {
    /// Create a reader over `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            acc: 0,
            acc_bits: 0,
            consumed: 0,
        }
    }

    /// Total number of bits consumed so far.
    ///
    /// Bits discarded by [`align_to_byte`](Self::align_to_byte) count as
    /// consumed.
    pub fn bit_position(&self) -> u64 {
        self.consumed
    }

    /// Consume the reader, returning the underlying source.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Top the accumulator up to at least `count` bits.
    fn refill(&mut self, count: u8) -> Result<()> {
        debug_assert!(count <= 57, "refill limited to 57 bits");

        while self.acc_bits < count {
            let want = usize::from((count - self.acc_bits).div_ceil(8)).min(7);
            let mut chunk = [0u8; 8];
            let got = self.reader.read(&mut chunk[..want])?;
            if got == 0 {
                let needed = usize::from(count - self.acc_bits).div_ceil(8);
                return Err(CodecError::unexpected_eof(needed));
            }
            for &byte in &chunk[..got] {
                self.acc |= u64::from(byte) << self.acc_bits;
                self.acc_bits += 8;
            }
        }
        Ok(())
    }

    /// Read `count` bits (0-32), LSB-first.
    #[inline]
    pub fn read_bits(&mut self, count: u8) -> Result<u32> {
        debug_assert!(count <= 32);
        if count == 0 {
            return Ok(0);
        }
        self.refill(count)?;

        let mask = (1u64 << count) - 1;
        let value = (self.acc & mask) as u32;
        self.acc >>= count;
        self.acc_bits -= count;
        self.consumed += u64::from(count);
        Ok(value)
    }

    /// Look at the next `count` bits without consuming them.
    #[inline]
    pub fn peek_bits(&mut self, count: u8) -> Result<u32> {
        debug_assert!(count <= 32);
        if count == 0 {
            return Ok(0);
        }
        self.refill(count)?;
        let mask = (1u64 << count) - 1;
        Ok((self.acc & mask) as u32)
    }

    /// Discard `count` previously peeked bits.
    #[inline]
    pub fn skip_bits(&mut self, count: u8) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        self.refill(count)?;
        self.acc >>= count;
        self.acc_bits -= count;
        self.consumed += u64::from(count);
        Ok(())
    }

    /// Read a single bit.
    #[inline]
    pub fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? != 0)
    }

    /// Discard bits up to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        let partial = (self.consumed % 8) as u8;
        if partial > 0 {
            let discard = 8 - partial;
            // The discarded bits were already buffered when consumed % 8 != 0.
            debug_assert!(self.acc_bits >= discard);
            self.acc >>= discard;
            self.acc_bits -= discard;
            self.consumed += u64::from(discard);
        }
    }

    /// Read whole bytes. The reader must be byte-aligned.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        debug_assert!(self.consumed % 8 == 0, "read_bytes requires alignment");

        // Drain complete bytes still sitting in the accumulator.
        let mut filled = 0;
        while self.acc_bits >= 8 && filled < buf.len() {
            buf[filled] = (self.acc & 0xFF) as u8;
            self.acc >>= 8;
            self.acc_bits -= 8;
            self.consumed += 8;
            filled += 1;
        }

        if filled < buf.len() {
            self.reader
                .read_exact(&mut buf[filled..])
                .map_err(|e| match e.kind() {
                    std::io::ErrorKind::UnexpectedEof => {
                        CodecError::unexpected_eof(buf.len() - filled)
                    }
                    _ => e.into(),
                })?;
            self.consumed += ((buf.len() - filled) as u64) * 8;
        }
        Ok(())
    }
}

/// A bit-level writer over any `Write` sink.
///
/// Bits accumulate in a `u64`; complete bytes are flushed to the sink as
/// they form. [`flush`](Self::flush) pads the final partial byte with zeros.
#[derive(Debug)]
pub struct BitWriter<W: Write> {
    writer: W,
    acc: u64,
    acc_bits: u8,
    written: u64,
}

impl<W: Write> BitWriter<W> {
    /// Create a writer over `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            acc: 0,
            acc_bits: 0,
            written: 0,
        }
    }

    /// Mutable access to the sink (used by streaming adapters to drain
    /// completed bytes between chunks).
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Total number of bits written so far, including any still buffered.
    pub fn bits_written(&self) -> u64 {
        self.written
    }

    #[inline]
    fn drain_bytes(&mut self) -> Result<()> {
        while self.acc_bits >= 8 {
            let byte = (self.acc & 0xFF) as u8;
            self.writer.write_all(&[byte])?;
            self.acc >>= 8;
            self.acc_bits -= 8;
        }
        Ok(())
    }

    /// Write the low `count` bits of `value` (0-32), LSB-first.
    #[inline]
    pub fn write_bits(&mut self, value: u32, count: u8) -> Result<()> {
        debug_assert!(count <= 32);
        if count == 0 {
            return Ok(());
        }

        let mask = if count == 32 {
            u32::MAX
        } else {
            (1u32 << count) - 1
        };
        self.acc |= u64::from(value & mask) << self.acc_bits;
        self.acc_bits += count;
        self.written += u64::from(count);
        self.drain_bytes()
    }

    /// Write a single bit.
    #[inline]
    pub fn write_bit(&mut self, bit: bool) -> Result<()> {
        self.acc |= u64::from(bit) << self.acc_bits;
        self.acc_bits += 1;
        self.written += 1;
        if self.acc_bits >= 8 {
            self.drain_bytes()?;
        }
        Ok(())
    }

    /// Pad with zero bits up to the next byte boundary.
    pub fn align_to_byte(&mut self) -> Result<()> {
        let partial = self.acc_bits % 8;
        if partial > 0 {
            self.write_bits(0, 8 - partial)?;
        }
        Ok(())
    }

    /// Write whole bytes. The writer must be byte-aligned.
    pub fn write_bytes(&mut self, buf: &[u8]) -> Result<()> {
        debug_assert!(self.acc_bits % 8 == 0, "write_bytes requires alignment");
        self.drain_bytes()?;
        self.writer.write_all(buf)?;
        self.written += (buf.len() as u64) * 8;
        Ok(())
    }

    /// Pad the final byte with zeros and flush everything to the sink.
    pub fn flush(&mut self) -> Result<()> {
        self.align_to_byte()?;
        self.drain_bytes()?;
        self.writer.flush()?;
        Ok(())
    }

    /// Consume the writer, returning the sink. The writer must be
    /// byte-aligned; align or flush first.
    pub fn into_inner(mut self) -> Result<W> {
        debug_assert!(self.acc_bits % 8 == 0, "into_inner requires alignment");
        self.drain_bytes()?;
        Ok(self.writer)
    }
}
