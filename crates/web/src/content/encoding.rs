//! Content coding transforms, keyed by encoding name.
//!
//! These are opaque collaborators to the engine: each is a total function
//! from bytes to bytes that reports failure as `None`, never as an error
//! the wire path would have to unwind.

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};

/// A body decoder: compressed bytes in, plain bytes out, `None` on failure.
pub type DecodeFn = fn(&[u8]) -> Option<Vec<u8>>;

/// A body encoder for response compression.
pub type EncodeFn = fn(&[u8]) -> Option<Vec<u8>>;

const BROTLI_BUFFER: usize = 4096;
const BROTLI_QUALITY: u32 = 5;
const BROTLI_LGWIN: u32 = 22;

fn gzip_decode(input: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(input).read_to_end(&mut out).ok()?;
    Some(out)
}

fn gzip_encode(input: &[u8]) -> Option<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(input).ok()?;
    encoder.finish().ok()
}

fn deflate_decode(input: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(input).read_to_end(&mut out).ok()?;
    Some(out)
}

fn deflate_encode(input: &[u8]) -> Option<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(input).ok()?;
    encoder.finish().ok()
}

fn brotli_decode(input: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    brotli::Decompressor::new(input, BROTLI_BUFFER).read_to_end(&mut out).ok()?;
    Some(out)
}

fn brotli_encode(input: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let mut writer = brotli::CompressorWriter::new(&mut out, BROTLI_BUFFER, BROTLI_QUALITY, BROTLI_LGWIN);
    writer.write_all(input).ok()?;
    writer.flush().ok()?;
    drop(writer);
    Some(out)
}

/// Looks up the decoder for a `Content-Encoding` name.
pub fn decoder_for(name: &str) -> Option<DecodeFn> {
    match name {
        "gzip" => Some(gzip_decode),
        "br" => Some(brotli_decode),
        "deflate" => Some(deflate_decode),
        _ => None,
    }
}

/// Looks up the encoder for a response compression selection.
pub fn encoder_for(name: &str) -> Option<EncodeFn> {
    match name {
        "gzip" => Some(gzip_encode),
        "br" => Some(brotli_encode),
        "deflate" => Some(deflate_encode),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_supported_coding() {
        let payload = b"the quick brown fox jumps over the lazy dog, twice over";
        for name in ["gzip", "br", "deflate"] {
            let encoded = encoder_for(name).unwrap()(payload).unwrap();
            let decoded = decoder_for(name).unwrap()(&encoded).unwrap();
            assert_eq!(decoded, payload, "{name} round trip");
        }
    }

    #[test]
    fn garbage_input_decodes_to_none() {
        for name in ["gzip", "deflate"] {
            assert!(decoder_for(name).unwrap()(b"definitely not compressed").is_none(), "{name}");
        }
    }

    #[test]
    fn unknown_coding_has_no_transform() {
        assert!(decoder_for("zstd").is_none());
        assert!(encoder_for("identity").is_none());
    }
}
