//! Chunked transfer-encoding accumulation.
//!
//! [`ChunkedDecoder`] is an incremental decoder over the chunked format:
//! a hex size line (extensions tolerated and ignored), that many data
//! bytes, a CRLF, repeating until a zero-size chunk followed by optional
//! trailers and a final CRLF. Partial arrivals at any boundary are
//! resumed on the next call; no byte is consumed twice or dropped.
//!
//! [`ChunkedAccumulator`] drives the decoder over a working buffer and
//! assembles the decoded chunks into the request body, checking the
//! running total against the per-route ceiling on every increment.

use std::io;

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::body::BodyProgress;
use crate::flags::StatusFlag;

/// One step of decoded chunked payload.
#[derive(Debug, PartialEq, Eq)]
pub enum ChunkItem {
    /// Data bytes belonging to the current chunk.
    Data(Bytes),
    /// The zero-size chunk and its trailer section have been consumed.
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Hex digits of the chunk size.
    Size,
    /// Whitespace after the size, before extension or line end.
    SizeWs,
    /// Chunk extension bytes, ignored up to the CR.
    Extension,
    /// LF closing the size line.
    SizeLf,
    /// Chunk data bytes.
    Data,
    /// CR after chunk data.
    DataCr,
    /// LF after chunk data.
    DataLf,
    /// Trailer field bytes after the zero-size chunk.
    Trailer,
    /// LF closing a trailer line.
    TrailerLf,
    /// CR of the terminating empty line.
    EndCr,
    /// LF of the terminating empty line.
    EndLf,
    /// Message complete; unconsumed bytes belong to the next request.
    End,
}

/// Incremental decoder for chunked transfer encoding.
#[derive(Debug)]
pub struct ChunkedDecoder {
    state: ChunkedState,
    remaining: u64,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: ChunkedState::Size, remaining: 0 }
    }

    fn push_size_digit(&mut self, digit: u64) -> io::Result<()> {
        self.remaining = self
            .remaining
            .checked_mul(16)
            .and_then(|v| v.checked_add(digit))
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "chunk size overflow"))?;
        Ok(())
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn bad(reason: &'static str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, reason)
}

impl Decoder for ChunkedDecoder {
    type Item = ChunkItem;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<ChunkItem>> {
        use ChunkedState::*;

        loop {
            if self.state == End {
                return Ok(Some(ChunkItem::End));
            }
            if src.is_empty() {
                return Ok(None);
            }

            // Data is the only state that consumes more than one byte at a
            // time; it returns mid-loop so the caller sees every chunk.
            if self.state == Data {
                let take = usize::try_from(self.remaining).unwrap_or(usize::MAX).min(src.len());
                let bytes = src.split_to(take).freeze();
                self.remaining -= bytes.len() as u64;
                self.state = if self.remaining == 0 { DataCr } else { Data };
                trace!(len = bytes.len(), "decoded chunk data");
                return Ok(Some(ChunkItem::Data(bytes)));
            }

            let byte = src.get_u8();
            self.state = match self.state {
                Size => match byte {
                    b @ b'0'..=b'9' => {
                        self.push_size_digit(u64::from(b - b'0'))?;
                        Size
                    }
                    b @ b'a'..=b'f' => {
                        self.push_size_digit(u64::from(b - b'a' + 10))?;
                        Size
                    }
                    b @ b'A'..=b'F' => {
                        self.push_size_digit(u64::from(b - b'A' + 10))?;
                        Size
                    }
                    b' ' | b'\t' => SizeWs,
                    b';' => Extension,
                    b'\r' => SizeLf,
                    _ => return Err(bad("invalid chunk size character")),
                },
                SizeWs => match byte {
                    b' ' | b'\t' => SizeWs,
                    b';' => Extension,
                    b'\r' => SizeLf,
                    _ => return Err(bad("invalid byte after chunk size")),
                },
                // Extensions end at CRLF; a bare LF inside one is rejected
                // so sloppy peers cannot slip an unterminated line through.
                Extension => match byte {
                    b'\r' => SizeLf,
                    b'\n' => return Err(bad("bare LF in chunk extension")),
                    _ => Extension,
                },
                SizeLf => match byte {
                    b'\n' if self.remaining == 0 => EndCr,
                    b'\n' => Data,
                    _ => return Err(bad("chunk size line missing LF")),
                },
                DataCr => match byte {
                    b'\r' => DataLf,
                    _ => return Err(bad("chunk data missing CR")),
                },
                DataLf => match byte {
                    b'\n' => Size,
                    _ => return Err(bad("chunk data missing LF")),
                },
                Trailer => match byte {
                    b'\r' => TrailerLf,
                    _ => Trailer,
                },
                TrailerLf => match byte {
                    b'\n' => EndCr,
                    _ => return Err(bad("trailer line missing LF")),
                },
                // A non-CR byte here starts a trailer field instead.
                EndCr => match byte {
                    b'\r' => EndLf,
                    _ => Trailer,
                },
                EndLf => match byte {
                    b'\n' => End,
                    _ => return Err(bad("chunked message missing final LF")),
                },
                Data | End => unreachable!("handled above"),
            };
        }
    }
}

/// Assembles a chunked body, enforcing the route's size ceiling.
#[derive(Debug)]
pub struct ChunkedAccumulator {
    decoder: ChunkedDecoder,
    working: BytesMut,
    body: BytesMut,
    ceiling: usize,
}

impl ChunkedAccumulator {
    pub fn new(ceiling: usize) -> Self {
        Self { decoder: ChunkedDecoder::new(), working: BytesMut::new(), body: BytesMut::new(), ceiling }
    }

    /// Feeds one increment. Unconsumed framing bytes are retained across
    /// calls, so an increment may split a size line, chunk data or a
    /// terminator at any byte.
    pub fn push(&mut self, data: &[u8]) -> Result<BodyProgress, StatusFlag> {
        self.working.extend_from_slice(data);
        loop {
            match self.decoder.decode(&mut self.working) {
                Ok(Some(ChunkItem::Data(bytes))) => {
                    if self.body.len() + bytes.len() > self.ceiling {
                        return Err(StatusFlag::ContentLengthTooLarge);
                    }
                    self.body.extend_from_slice(&bytes);
                }
                Ok(Some(ChunkItem::End)) => {
                    let body = (!self.body.is_empty()).then(|| self.body.split().freeze());
                    return Ok(BodyProgress::Done(body));
                }
                Ok(None) => return Ok(BodyProgress::Incomplete),
                Err(_) => return Err(StatusFlag::BadRequest),
            }
        }
    }

    /// Bytes decoded so far.
    pub fn total(&self) -> usize {
        self.body.len()
    }

    /// Bytes past the end of the chunked message; the head of a pipelined
    /// follow-up request.
    pub fn take_residual(&mut self) -> BytesMut {
        self.working.split()
    }
}
