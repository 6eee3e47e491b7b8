//! Fixed-length (`Content-Length`) body accumulation.

use bytes::BytesMut;

use crate::codec::body::BodyProgress;
use crate::flags::StatusFlag;

/// Accumulates exactly `target` body bytes into a buffer sized to the
/// target up front. Overrunning the target is a framing violation, not a
/// truncation.
#[derive(Debug)]
pub struct FixedAccumulator {
    buf: BytesMut,
    target: usize,
    ceiling: usize,
}

impl FixedAccumulator {
    /// `target` is the declared `Content-Length`; `ceiling` the per-route
    /// body limit. The entry check guarantees `target <= ceiling`, the
    /// ceiling is re-checked here regardless.
    pub fn new(target: usize, ceiling: usize) -> Self {
        Self { buf: BytesMut::with_capacity(target), target, ceiling }
    }

    pub fn push(&mut self, data: &[u8]) -> Result<BodyProgress, StatusFlag> {
        let progress = self.buf.len() + data.len();
        if progress > self.target {
            return Err(StatusFlag::ContentLengthExceeded);
        }
        if progress > self.ceiling {
            return Err(StatusFlag::ContentLengthTooLarge);
        }

        self.buf.extend_from_slice(data);
        if self.buf.len() == self.target {
            Ok(BodyProgress::Done(Some(self.buf.split().freeze())))
        } else {
            Ok(BodyProgress::Incomplete)
        }
    }

    /// Bytes written so far.
    pub fn total(&self) -> usize {
        self.buf.len()
    }
}
