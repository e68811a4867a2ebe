//! Sliding-window history for LZ77 back-references.
//!
//! A decoder resolves (length, distance) pairs against the most recent
//! window of output bytes. The window may be pre-seeded with a caller
//! dictionary whose tail sits logically before output position 0, so early
//! back-references can reach into it.

use crate::error::{CodecError, Result};

/// DEFLATE window size (32 KiB).
pub const DEFLATE_WINDOW_SIZE: usize = 32768;

/// A circular history buffer.
///
/// Capacity must be a power of two so wrapping reduces to a mask.
#[derive(Debug, Clone)]
pub struct Window {
    buffer: Vec<u8>,
    /// Next write position.
    position: usize,
    /// Bytes of valid history (dictionary + output), capped at capacity.
    size: usize,
    mask: usize,
}

impl Window {
    /// Create a window with the given power-of-two capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero or not a power of two.
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity > 0 && capacity.is_power_of_two(),
            "window capacity must be a nonzero power of two, got {capacity}"
        );
        Self {
            buffer: vec![0; capacity],
            position: 0,
            size: 0,
            mask: capacity - 1,
        }
    }

    /// Create a 32 KiB DEFLATE window.
    pub fn deflate() -> Self {
        Self::new(DEFLATE_WINDOW_SIZE)
    }

    /// Window capacity.
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Bytes of history currently addressable.
    pub fn len(&self) -> usize {
        self.size
    }

    /// True when no history is available.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Forget all history.
    pub fn clear(&mut self) {
        self.position = 0;
        self.size = 0;
    }

    /// Record one output byte.
    #[inline]
    pub fn push_byte(&mut self, byte: u8) {
        self.buffer[self.position] = byte;
        self.position = (self.position + 1) & self.mask;
        if self.size < self.capacity() {
            self.size += 1;
        }
    }

    /// Record a run of output bytes.
    pub fn push_slice(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push_byte(byte);
        }
    }

    /// Byte at `distance` back from the write position (1 = most recent).
    #[inline]
    pub fn byte_at(&self, distance: usize) -> Result<u8> {
        if distance == 0 || distance > self.size {
            return Err(CodecError::invalid_distance(distance, self.size));
        }
        let index = self.position.wrapping_sub(distance) & self.mask;
        Ok(self.buffer[index])
    }

    /// Seed the window with a preset dictionary.
    ///
    /// Only the last `capacity` bytes are retained; callers enforce any
    /// stricter size limit before getting here.
    pub fn preload_dictionary(&mut self, dictionary: &[u8]) {
        let tail = if dictionary.len() > self.capacity() {
            &dictionary[dictionary.len() - self.capacity()..]
        } else {
            dictionary
        };
        self.push_slice(tail);
    }
}

/// Saved window state, used by streaming decoders to roll back a block
/// that ran out of input partway through.
#[derive(Debug, Clone)]
pub struct WindowMark {
    window: Window,
    output_len: usize,
}

/// A window paired with an owned, growable output buffer.
///
/// The decoder writes every produced byte through here so the window and
/// the output stay consistent; streaming adapters drain the output between
/// blocks with [`take_output`](Self::take_output).
#[derive(Debug)]
pub struct OutputWindow {
    window: Window,
    output: Vec<u8>,
    /// Total bytes ever produced, surviving `take_output`.
    total_out: u64,
}

impl OutputWindow {
    /// Create with a DEFLATE-sized window.
    pub fn new() -> Self {
        Self::with_capacity(DEFLATE_WINDOW_SIZE)
    }

    /// Create with the given window capacity.
    pub fn with_capacity(window_size: usize) -> Self {
        Self {
            window: Window::new(window_size),
            output: Vec::new(),
            total_out: 0,
        }
    }

    /// Seed the history with a preset dictionary. The dictionary is not
    /// part of the output.
    pub fn preload_dictionary(&mut self, dictionary: &[u8]) {
        self.window.preload_dictionary(dictionary);
    }

    /// Emit a literal byte.
    #[inline]
    pub fn push_literal(&mut self, byte: u8) {
        self.window.push_byte(byte);
        self.output.push(byte);
        self.total_out += 1;
    }

    /// Emit a run of literal bytes.
    pub fn push_literals(&mut self, bytes: &[u8]) {
        self.window.push_slice(bytes);
        self.output.extend_from_slice(bytes);
        self.total_out += bytes.len() as u64;
    }

    /// Replay a back-reference: copy `length` bytes from `distance` back.
    ///
    /// Copies byte-by-byte so an overlapping reference (distance < length)
    /// repeats correctly. A distance beyond the available history
    /// (dictionary + produced output) is [`CodecError::InvalidDistance`].
    pub fn copy_match(&mut self, distance: usize, length: usize) -> Result<()> {
        if distance == 0 || distance > self.window.len() {
            return Err(CodecError::invalid_distance(distance, self.window.len()));
        }
        self.output.reserve(length);
        for _ in 0..length {
            let byte = self.window.byte_at(distance)?;
            self.window.push_byte(byte);
            self.output.push(byte);
        }
        self.total_out += length as u64;
        Ok(())
    }

    /// Bytes currently pending in the output buffer.
    pub fn pending(&self) -> &[u8] {
        &self.output
    }

    /// Total bytes ever produced, including drained ones.
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Take the pending output, leaving the window intact.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// Consume self, returning all pending output.
    pub fn into_output(self) -> Vec<u8> {
        self.output
    }

    /// Snapshot the state needed to retry the current block later.
    pub fn mark(&self) -> WindowMark {
        WindowMark {
            window: self.window.clone(),
            output_len: self.output.len(),
        }
    }

    /// Roll back to a previously taken [`mark`](Self::mark), discarding any
    /// bytes produced since.
    pub fn rollback(&mut self, mark: &WindowMark) {
        let discarded = self.output.len() - mark.output_len;
        self.window = mark.window.clone();
        self.output.truncate(mark.output_len);
        self.total_out -= discarded as u64;
    }
}

impl Default for OutputWindow {
    fn default() -> Self {
        Self::new()
    }
}
