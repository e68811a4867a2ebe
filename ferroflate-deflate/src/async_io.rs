//! Async chunk pump over the streaming codecs.
//!
//! A spawned task drives a synchronous [`ChunkCodec`]; the caller feeds it
//! `(chunk, is_final)` pairs through one channel and receives output chunks
//! through another. Both channels are unbounded: a producer that outruns a
//! slow consumer grows the queue without backpressure, which is the
//! caller's contract to manage. Dropping the [`ChunkSender`] cancels the
//! task without flushing.
//!
//! Only available with the `async-io` feature.

use crate::stream::{DecodeStream, EncodeStream, Format};
use ferroflate_core::error::{CodecError, Result};
use ferroflate_core::ChunkCodec;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Input half of a spawned codec.
#[derive(Debug, Clone)]
pub struct ChunkSender {
    tx: UnboundedSender<(Vec<u8>, bool)>,
}

impl ChunkSender {
    /// Queue a chunk for the codec task.
    ///
    /// Fails with [`CodecError::StreamFinished`] once the task has stopped
    /// (final chunk processed, error, or cancellation).
    pub fn send(&self, chunk: Vec<u8>, is_final: bool) -> Result<()> {
        self.tx
            .send((chunk, is_final))
            .map_err(|_| CodecError::StreamFinished)
    }
}

/// Drive `codec` on a spawned task.
///
/// Returns the input sender, the output receiver, and the task handle,
/// which resolves with the codec's result after the final chunk.
pub fn spawn_codec<C>(
    mut codec: C,
) -> (ChunkSender, UnboundedReceiver<Vec<u8>>, JoinHandle<Result<()>>)
where
    C: ChunkCodec + Send + 'static,
{
    let (in_tx, mut in_rx) = mpsc::unbounded_channel::<(Vec<u8>, bool)>();
    let (out_tx, out_rx) = mpsc::unbounded_channel::<Vec<u8>>();

    let handle = tokio::spawn(async move {
        while let Some((chunk, is_final)) = in_rx.recv().await {
            // A closed output side means the consumer went away; keep
            // draining so the producer sees the codec's verdict.
            let mut sink = |bytes: &[u8]| {
                let _ = out_tx.send(bytes.to_vec());
            };
            codec.push(&chunk, is_final, &mut sink)?;
            if is_final {
                break;
            }
        }
        Ok(())
    });

    (ChunkSender { tx: in_tx }, out_rx, handle)
}

/// Spawn a compression task for `format` at the given level.
pub fn spawn_encoder(
    format: Format,
    level: u8,
) -> Result<(ChunkSender, UnboundedReceiver<Vec<u8>>, JoinHandle<Result<()>>)> {
    Ok(spawn_codec(EncodeStream::new(format, level)?))
}

/// Spawn a decompression task for `format`.
pub fn spawn_decoder(
    format: Format,
) -> Result<(ChunkSender, UnboundedReceiver<Vec<u8>>, JoinHandle<Result<()>>)> {
    Ok(spawn_codec(DecodeStream::new(format)?))
}
