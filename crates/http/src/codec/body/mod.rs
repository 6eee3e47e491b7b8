//! Body-accumulation state machine.
//!
//! Right after a request's headers complete, [`select_strategy`] picks one
//! of four strategies from the method, the framing headers and the route's
//! configuration: no body, fixed length, chunked transfer encoding, or
//! read-until-close. The returned [`BodyAccumulator`] is then fed socket
//! increments until it reports [`BodyProgress::Done`], at which point the
//! assembled body (or a null payload for zero-length bodies) is handed to
//! the dispatch pipeline.

mod chunked;
pub use chunked::ChunkItem;
pub use chunked::ChunkedAccumulator;
pub use chunked::ChunkedDecoder;

mod fixed;
pub use fixed::FixedAccumulator;

mod until_close;
pub use until_close::UntilCloseAccumulator;

use bytes::{Bytes, BytesMut};

use crate::flags::StatusFlag;
use crate::protocol::{HeaderTable, Method};

/// Result of feeding one increment to an accumulator.
#[derive(Debug)]
pub enum BodyProgress {
    /// More bytes are required.
    Incomplete,
    /// The body is complete; `None` for a zero-length body.
    Done(Option<Bytes>),
}

/// Per-route body configuration consulted at strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyConfig {
    /// Body size ceiling in bytes.
    pub max_content_size: usize,
    /// Whether a request without length framing waits for stream end
    /// instead of being rejected.
    pub until_close: bool,
}

/// The per-connection body sub-state.
#[derive(Debug, Default)]
pub enum BodyAccumulator {
    /// No body is read for this request.
    #[default]
    NoBody,
    Fixed(FixedAccumulator),
    Chunked(ChunkedAccumulator),
    UntilClose(UntilCloseAccumulator),
    /// Body complete and handed off.
    Done,
}

impl BodyAccumulator {
    /// Feeds one socket increment to the active strategy.
    pub fn push(&mut self, data: &[u8]) -> Result<BodyProgress, StatusFlag> {
        match self {
            BodyAccumulator::Fixed(acc) => acc.push(data),
            BodyAccumulator::Chunked(acc) => acc.push(data),
            BodyAccumulator::UntilClose(acc) => acc.push(data),
            // NoBody and Done never receive increments; report completion
            // so a misbehaving caller cannot buffer unboundedly.
            BodyAccumulator::NoBody | BodyAccumulator::Done => Ok(BodyProgress::Done(None)),
        }
    }

    /// End-of-stream notification; only meaningful for until-close.
    pub fn finish(&mut self) -> Option<Bytes> {
        match self {
            BodyAccumulator::UntilClose(acc) => acc.finish(),
            _ => None,
        }
    }

    /// Unconsumed bytes past the end of a completed chunked message.
    pub fn take_residual(&mut self) -> BytesMut {
        match self {
            BodyAccumulator::Chunked(acc) => acc.take_residual(),
            _ => BytesMut::new(),
        }
    }
}

/// Decision made at accumulator entry.
#[derive(Debug)]
pub enum Selection {
    /// The body is already complete; dispatch now.
    Dispatch(Option<Bytes>),
    /// Keep reading increments into the returned accumulator.
    Accumulate(BodyAccumulator),
    /// The request is rejected before any buffering.
    Reject(StatusFlag),
}

/// Whether a `Transfer-Encoding` value selects chunked framing: chunked
/// must be the final encoding listed.
fn is_chunked(value: &str) -> bool {
    value.rsplit(',').next().is_some_and(|token| token.trim().eq_ignore_ascii_case("chunked"))
}

/// Selects the accumulation strategy once headers are complete.
///
/// The caller feeds the bytes that arrived past the header boundary as the
/// returned accumulator's first increment, so a body that is fully present
/// in the head increment dispatches immediately — a fixed-length body that
/// already overruns its target is likewise rejected on that first push,
/// never truncated.
pub fn select_strategy(
    method: Method,
    headers: &HeaderTable,
    content_len: Option<u64>,
    cfg: &BodyConfig,
) -> Selection {
    if !method.reads_body() {
        return Selection::Dispatch(None);
    }

    if headers.get("transfer-encoding").is_some_and(is_chunked) {
        return Selection::Accumulate(BodyAccumulator::Chunked(ChunkedAccumulator::new(cfg.max_content_size)));
    }

    if let Some(len) = content_len {
        if len > cfg.max_content_size as u64 {
            return Selection::Reject(StatusFlag::ContentLengthTooLarge);
        }
        if len == 0 {
            return Selection::Dispatch(None);
        }
        return Selection::Accumulate(BodyAccumulator::Fixed(FixedAccumulator::new(len as usize, cfg.max_content_size)));
    }

    if cfg.until_close {
        return Selection::Accumulate(BodyAccumulator::UntilClose(UntilCloseAccumulator::new(cfg.max_content_size)));
    }

    // A body-bearing request with no length framing and no opt-in is
    // rejected, not buffered indefinitely.
    Selection::Reject(StatusFlag::BadRequest)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CFG: BodyConfig = BodyConfig { max_content_size: 1024, until_close: false };

    fn headers(pairs: &[(&str, &str)]) -> HeaderTable {
        let mut table = HeaderTable::new();
        for (name, value) in pairs {
            table.insert((*name).to_owned(), (*value).to_owned());
        }
        table
    }

    /// Selects a strategy and feeds it the bytes that arrived with the
    /// head, the way the connection driver does.
    fn select_and_push(
        method: Method,
        table: &HeaderTable,
        content_len: Option<u64>,
        already: &[u8],
        cfg: &BodyConfig,
    ) -> Result<Selection, StatusFlag> {
        match select_strategy(method, table, content_len, cfg) {
            Selection::Accumulate(mut acc) => match acc.push(already)? {
                BodyProgress::Done(body) => Ok(Selection::Dispatch(body)),
                BodyProgress::Incomplete => Ok(Selection::Accumulate(acc)),
            },
            other => Ok(other),
        }
    }

    #[test]
    fn get_and_head_never_read_a_body() {
        let table = headers(&[("content-length", "5")]);
        for method in [Method::Get, Method::Head] {
            let selection = select_strategy(method, &table, Some(5), &CFG);
            assert!(matches!(selection, Selection::Dispatch(None)), "{method} must skip the body");
        }
    }

    #[test]
    fn chunked_header_selects_chunked() {
        let table = headers(&[("transfer-encoding", "chunked")]);
        let selection = select_strategy(Method::Post, &table, None, &CFG);
        assert!(matches!(selection, Selection::Accumulate(BodyAccumulator::Chunked(_))));
    }

    #[test]
    fn chunked_must_be_final_encoding() {
        let table = headers(&[("transfer-encoding", "chunked, gzip")]);
        let selection = select_strategy(Method::Post, &table, None, &CFG);
        assert!(matches!(selection, Selection::Reject(StatusFlag::BadRequest)));

        let table = headers(&[("transfer-encoding", "gzip, chunked")]);
        let selection = select_strategy(Method::Post, &table, None, &CFG);
        assert!(matches!(selection, Selection::Accumulate(BodyAccumulator::Chunked(_))));
    }

    #[test]
    fn complete_chunked_body_in_head_increment_dispatches() {
        let table = headers(&[("transfer-encoding", "chunked")]);
        let selection = select_and_push(Method::Post, &table, None, b"5\r\nhello\r\n0\r\n\r\n", &CFG).unwrap();
        match selection {
            Selection::Dispatch(Some(body)) => assert_eq!(&body[..], b"hello"),
            other => panic!("expected dispatch, got {other:?}"),
        }
    }

    #[test]
    fn fixed_body_already_complete_dispatches() {
        let table = headers(&[("content-length", "5")]);
        let selection = select_and_push(Method::Post, &table, Some(5), b"hello", &CFG).unwrap();
        match selection {
            Selection::Dispatch(Some(body)) => assert_eq!(&body[..], b"hello"),
            other => panic!("expected dispatch, got {other:?}"),
        }
    }

    #[test]
    fn fixed_body_overflow_rejects() {
        let table = headers(&[("content-length", "5")]);
        let flag = select_and_push(Method::Post, &table, Some(5), b"hello!", &CFG).unwrap_err();
        assert_eq!(flag, StatusFlag::ContentLengthExceeded);
    }

    #[test]
    fn zero_length_dispatches_null_payload() {
        let table = headers(&[("content-length", "0")]);
        let selection = select_strategy(Method::Post, &table, Some(0), &CFG);
        assert!(matches!(selection, Selection::Dispatch(None)));
    }

    #[test]
    fn declared_length_above_ceiling_rejects_early() {
        let table = headers(&[("content-length", "2048")]);
        let selection = select_strategy(Method::Post, &table, Some(2048), &CFG);
        assert!(matches!(selection, Selection::Reject(StatusFlag::ContentLengthTooLarge)));
    }

    #[test]
    fn no_framing_without_opt_in_rejects() {
        let table = headers(&[]);
        let selection = select_strategy(Method::Post, &table, None, &CFG);
        assert!(matches!(selection, Selection::Reject(StatusFlag::BadRequest)));
    }

    #[test]
    fn no_framing_with_opt_in_waits_for_close() {
        let cfg = BodyConfig { max_content_size: 1024, until_close: true };
        let table = headers(&[]);
        let selection = select_and_push(Method::Post, &table, None, b"partial", &cfg).unwrap();
        let Selection::Accumulate(mut acc) = selection else {
            panic!("expected accumulate");
        };
        assert_eq!(acc.finish().as_deref(), Some(&b"partial"[..]));
    }
}
