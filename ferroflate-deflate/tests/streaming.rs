//! Chunking equivalence for the streaming adapters.
//!
//! The same input pushed in 1-byte, 3-byte, odd-sized, and single chunks
//! must round-trip to the same plaintext, and streamed decode of any
//! chunking must equal one-shot decode.

use ferroflate_core::ChunkCodec;
use ferroflate_deflate::{
    DecodeStream, EncodeStream, Format, gzip_decompress, inflate, zlib_compress, zlib_decompress,
};

fn push_chunked(codec: &mut dyn ChunkCodec, data: &[u8], chunk_size: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut sink = |bytes: &[u8]| out.extend_from_slice(bytes);

    if data.is_empty() {
        codec.push(&[], true, &mut sink).unwrap();
        return out;
    }
    let mut chunks = data.chunks(chunk_size).peekable();
    while let Some(chunk) = chunks.next() {
        let is_final = chunks.peek().is_none();
        codec.push(chunk, is_final, &mut sink).unwrap();
    }
    out
}

fn corpus() -> Vec<Vec<u8>> {
    let mut text = Vec::new();
    for i in 0..400 {
        text.extend_from_slice(format!("entry {i}: chunk boundaries fall anywhere\n").as_bytes());
    }

    let mut state = 0xDEAD_BEEF_CAFE_F00Du64;
    let noise: Vec<u8> = (0..5000)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 40) as u8
        })
        .collect();

    vec![b"tiny".to_vec(), text, noise, vec![b'z'; 40000]]
}

#[test]
fn test_encode_chunkings_roundtrip() {
    for input in corpus() {
        for chunk_size in [1, 3, 997, input.len().max(1)] {
            for format in [Format::Raw, Format::Zlib, Format::Gzip] {
                let mut encoder = EncodeStream::new(format, 6).unwrap();
                let compressed = push_chunked(&mut encoder, &input, chunk_size);
                assert!(encoder.is_finished());

                let decoded = match format {
                    Format::Raw => inflate(&compressed).unwrap(),
                    Format::Zlib => zlib_decompress(&compressed).unwrap(),
                    Format::Gzip => gzip_decompress(&compressed).unwrap(),
                };
                assert_eq!(decoded, input, "{format:?} chunk_size {chunk_size}");
            }
        }
    }
}

#[test]
fn test_decode_chunkings_match_one_shot() {
    for input in corpus() {
        let compressed = zlib_compress(&input, 6).unwrap();
        let one_shot = zlib_decompress(&compressed).unwrap();

        for chunk_size in [1, 3, 997, compressed.len()] {
            let mut decoder = DecodeStream::new(Format::Zlib).unwrap();
            let decoded = push_chunked(&mut decoder, &compressed, chunk_size);
            assert!(decoder.is_finished());
            assert_eq!(decoded, one_shot, "chunk_size {chunk_size}");
        }
    }
}

#[test]
fn test_stream_to_stream_pipeline() {
    // Encoder output chunks fed straight into a decoder, as a pipeline
    // would, with no rechunking.
    for input in corpus() {
        for format in [Format::Raw, Format::Zlib, Format::Gzip] {
            let mut encoder = EncodeStream::new(format, 6).unwrap();
            let mut decoder = DecodeStream::new(format).unwrap();

            let mut output = Vec::new();
            let mut chunks = input.chunks(61).peekable();
            if chunks.peek().is_none() {
                let mut compressed = Vec::new();
                encoder
                    .push(&[], true, &mut |b: &[u8]| compressed.extend_from_slice(b))
                    .unwrap();
                decoder
                    .push(&compressed, true, &mut |b: &[u8]| {
                        output.extend_from_slice(b)
                    })
                    .unwrap();
            }
            while let Some(chunk) = chunks.next() {
                let is_final = chunks.peek().is_none();
                let mut compressed = Vec::new();
                encoder
                    .push(chunk, is_final, &mut |b: &[u8]| {
                        compressed.extend_from_slice(b)
                    })
                    .unwrap();
                decoder
                    .push(&compressed, is_final, &mut |b: &[u8]| {
                        output.extend_from_slice(b)
                    })
                    .unwrap();
            }

            assert!(decoder.is_finished());
            assert_eq!(output, input, "{format:?}");
        }
    }
}

#[test]
fn test_decoder_emits_output_before_stream_end() {
    // Committed blocks are delivered as soon as they decode, not held
    // until the final push.
    let input: Vec<u8> = (0..200_000).map(|i| (i / 100) as u8).collect();
    let compressed = zlib_compress(&input, 6).unwrap();

    let mut decoder = DecodeStream::new(Format::Zlib).unwrap();
    let received = std::cell::Cell::new(0usize);
    let mut sink = |bytes: &[u8]| received.set(received.get() + bytes.len());

    let half = compressed.len() / 2;
    decoder.push(&compressed[..half], false, &mut sink).unwrap();
    assert!(received.get() > 0, "no output delivered from the first half");
    decoder.push(&compressed[half..], true, &mut sink).unwrap();
    assert_eq!(received.get(), input.len());
}
