//! Per-connection parse state.

use std::collections::HashMap;

use bytes::BytesMut;

use crate::codec::body::BodyAccumulator;
use crate::flags::StatusFlag;
use crate::pool::SlotId;
use crate::protocol::{HeaderTable, Method};
use crate::router::RouteIndex;

/// Where the connection currently is in its request cycle. Dispatched by
/// `match` in the connection driver; the stage is data, not a stored
/// function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseStage {
    /// Waiting for (more of) the request line; the scanner restarts from
    /// the buffer head on the next increment.
    #[default]
    AwaitingHead,
    /// Request line parsed and routed; the header block is incomplete and
    /// scanning resumes at the committed offset.
    AwaitingMoreHeaders,
    AccumulatingFixed,
    AccumulatingChunked,
    AccumulatingUntilClose,
}

/// Mutable state of one in-flight socket, owned exclusively by that
/// socket's lifecycle and recycled through the connection pool.
///
/// Invariants: `flag` is `Ok` exactly when method, path and headers parsed
/// without violating a rule; `body_offset <= buf.len()`; `route` is
/// non-`None` only after a successful match.
#[derive(Debug, Default)]
pub struct ConnContext {
    pub stage: ParseStage,
    /// Accumulated raw bytes of the current request head (plus whatever
    /// arrived behind it).
    pub buf: BytesMut,
    /// Byte index immediately following the terminating blank line.
    pub body_offset: usize,
    /// Committed scanner position; always at a header line boundary.
    pub scan_offset: usize,
    /// Cumulative header block size across continuations.
    pub header_size: usize,
    pub headers: HeaderTable,
    pub query: HashMap<String, String>,
    /// Captured path parameters, in pattern declaration order.
    pub params: Vec<String>,
    pub method: Option<Method>,
    pub route: Option<RouteIndex>,
    pub content_len: Option<u64>,
    pub flag: StatusFlag,
    pub body: BodyAccumulator,
    /// This context's slot in the connection pool.
    pub slot: SlotId,
}

impl ConnContext {
    pub fn new(slot: SlotId) -> Self {
        Self { slot, ..Default::default() }
    }

    /// Clears per-request state between pipelined requests. The pool slot
    /// binding survives; buffered bytes are managed by the caller, which
    /// re-seeds `buf` with any residual belonging to the next request.
    pub fn reset(&mut self) {
        self.stage = ParseStage::AwaitingHead;
        self.buf = BytesMut::new();
        self.body_offset = 0;
        self.scan_offset = 0;
        self.header_size = 0;
        self.headers.clear();
        self.query.clear();
        self.params.clear();
        self.method = None;
        self.route = None;
        self.content_len = None;
        self.flag = StatusFlag::Ok;
        self.body = BodyAccumulator::NoBody;
    }
}
