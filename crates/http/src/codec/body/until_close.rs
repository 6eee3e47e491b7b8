//! Read-until-close body accumulation.
//!
//! Used only for routes that explicitly opt into waiting past stream end:
//! every increment is appended unconditionally and the body completes when
//! the transport signals end-of-stream.

use bytes::{Bytes, BytesMut};

use crate::codec::body::BodyProgress;
use crate::flags::StatusFlag;

#[derive(Debug)]
pub struct UntilCloseAccumulator {
    body: BytesMut,
    ceiling: usize,
}

impl UntilCloseAccumulator {
    pub fn new(ceiling: usize) -> Self {
        Self { body: BytesMut::new(), ceiling }
    }

    /// Appends one increment; the size ceiling still applies.
    pub fn push(&mut self, data: &[u8]) -> Result<BodyProgress, StatusFlag> {
        if self.body.len() + data.len() > self.ceiling {
            return Err(StatusFlag::ContentLengthTooLarge);
        }
        self.body.extend_from_slice(data);
        Ok(BodyProgress::Incomplete)
    }

    /// Called when the transport reaches end-of-stream.
    pub fn finish(&mut self) -> Option<Bytes> {
        (!self.body.is_empty()).then(|| self.body.split().freeze())
    }

    pub fn total(&self) -> usize {
        self.body.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_until_finish() {
        let mut acc = UntilCloseAccumulator::new(1024);
        assert!(matches!(acc.push(b"part one, ").unwrap(), BodyProgress::Incomplete));
        assert!(matches!(acc.push(b"part two").unwrap(), BodyProgress::Incomplete));
        assert_eq!(acc.finish().as_deref(), Some(&b"part one, part two"[..]));
    }

    #[test]
    fn empty_stream_yields_null_payload() {
        let mut acc = UntilCloseAccumulator::new(1024);
        assert!(acc.finish().is_none());
    }

    #[test]
    fn ceiling_is_enforced_per_increment() {
        let mut acc = UntilCloseAccumulator::new(8);
        assert!(acc.push(b"12345678").is_ok());
        assert_eq!(acc.push(b"9").unwrap_err(), StatusFlag::ContentLengthTooLarge);
    }
}
