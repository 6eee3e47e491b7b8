//! Parse/route outcome flags.
//!
//! Every scanner, matcher and accumulator entry point reports its outcome
//! through a [`StatusFlag`] instead of a `Result`: success, a continuation
//! signal, or one specific rejection reason. Exactly one flag is active per
//! attempt. The discriminants are bit-pattern distinct so a flag can be
//! logged or compared cheaply in diagnostics, but flags are never combined.

/// Outcome of a single parse or routing attempt.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StatusFlag {
    /// Request line, routing and headers parsed without violating any rule.
    #[default]
    Ok = 0x0000,
    /// Malformed request line, body framing violation or smuggling ambiguity.
    BadRequest = 0x0001,
    /// The path is registered, but not under the request's method.
    MethodNotAllowed = 0x0002,
    /// No registered pattern matches the path under any method.
    NotFound = 0x0004,
    /// `OPTIONS` request short-circuited while CORS is enabled.
    CorsPreflight = 0x0008,
    /// Any protocol version other than `HTTP/1.1`.
    HttpVersionUnsupported = 0x0010,
    /// Declared `Content-Length` exceeds the route's body ceiling.
    ContentLengthTooLarge = 0x0020,
    /// The header block terminated without a `Host` header.
    MissingHost = 0x0040,
    /// The request carries body framing (diagnostic, set alongside parsing).
    HasBody = 0x0080,
    /// API misuse outside the wire path (registration, pool setup).
    InvalidArgument = 0x0100,
    /// Header name contains whitespace/control bytes, starts with a digit,
    /// or the line is an obsolete folded continuation.
    InvalidHeader = 0x0200,
    /// Header value contains control bytes or a lone CR.
    InvalidHeaderValue = 0x0300,
    /// Reserved for diagnostics on `Content-Length` specific failures.
    InvalidContentLength = 0x0400,
    /// Accumulated body bytes overran the declared `Content-Length`.
    ContentLengthExceeded = 0x0800,
    /// The terminating blank line has not arrived yet; keep buffering.
    UnterminatedHeaders = 0x1000,
    /// Cumulative header block exceeded its ceiling.
    MaxHeaderSize = 0x2000,
    /// A single header name exceeded its ceiling.
    MaxHeaderNameSize = 0x2100,
    /// A single header value exceeded its ceiling.
    MaxHeaderValueSize = 0x2200,
    /// A single-value-only header (`Host`, `Content-Length`,
    /// `Authorization`) repeated, equal values included.
    DuplicateSingleHeader = 0x3000,
    /// Query string carries more pairs than the configured limit.
    RequestQueryExceeded = 0x4000,
    /// Path length beyond the URL ceiling.
    RequestUrlExceeded = 0x5000,
    /// Reserved: `Content-Length` and `Transfer-Encoding` coexist. The
    /// scanner reports this condition as [`StatusFlag::BadRequest`].
    SmugglingTeCl = 0x6000,
}

impl StatusFlag {
    /// Returns true when the attempt finished successfully.
    #[inline]
    pub fn is_ok(self) -> bool {
        matches!(self, StatusFlag::Ok)
    }

    /// Returns true for the continuation signal: not an error, the caller
    /// keeps buffering and re-invokes the scanner once more bytes arrive.
    #[inline]
    pub fn is_continuation(self) -> bool {
        matches!(self, StatusFlag::UnterminatedHeaders)
    }

    /// Returns true for routing outcomes handled as normal control flow
    /// rather than failures.
    #[inline]
    pub fn is_routing_outcome(self) -> bool {
        matches!(self, StatusFlag::NotFound | StatusFlag::MethodNotAllowed | StatusFlag::CorsPreflight)
    }

    /// Returns true when the flag is a terminal rejection of the request.
    pub fn is_rejection(self) -> bool {
        !self.is_ok() && !self.is_continuation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert!(StatusFlag::Ok.is_ok());
        assert!(StatusFlag::UnterminatedHeaders.is_continuation());
        assert!(!StatusFlag::UnterminatedHeaders.is_rejection());
        assert!(StatusFlag::BadRequest.is_rejection());
        assert!(StatusFlag::NotFound.is_routing_outcome());
        assert!(StatusFlag::CorsPreflight.is_routing_outcome());
    }

    #[test]
    fn discriminants_are_distinct() {
        let all = [
            StatusFlag::Ok,
            StatusFlag::BadRequest,
            StatusFlag::MethodNotAllowed,
            StatusFlag::NotFound,
            StatusFlag::CorsPreflight,
            StatusFlag::HttpVersionUnsupported,
            StatusFlag::ContentLengthTooLarge,
            StatusFlag::MissingHost,
            StatusFlag::HasBody,
            StatusFlag::InvalidArgument,
            StatusFlag::InvalidHeader,
            StatusFlag::InvalidHeaderValue,
            StatusFlag::InvalidContentLength,
            StatusFlag::ContentLengthExceeded,
            StatusFlag::UnterminatedHeaders,
            StatusFlag::MaxHeaderSize,
            StatusFlag::MaxHeaderNameSize,
            StatusFlag::MaxHeaderValueSize,
            StatusFlag::DuplicateSingleHeader,
            StatusFlag::RequestQueryExceeded,
            StatusFlag::RequestUrlExceeded,
            StatusFlag::SmugglingTeCl,
        ];
        let mut seen = std::collections::HashSet::new();
        for flag in all {
            assert!(seen.insert(flag as u32), "duplicate discriminant for {flag:?}");
        }
    }
}
