//! Request-line and header-block scanner.
//!
//! [`scan_request_head`] consumes the head of a connection's buffer:
//! method, path, query, version, routing, then the header block. Every
//! rule violation is a distinct terminal flag, the first violation wins,
//! and nothing throws across the connection boundary — the caller checks
//! [`ConnContext::flag`] explicitly.
//!
//! An incomplete header block is not a failure: the scanner reports
//! `UnterminatedHeaders`, commits its offset at the last completed header
//! line, and [`scan_more_headers`] resumes from there once more bytes
//! arrive. Completed work is never re-done and the context is never left
//! half-mutated by a rejection: a rejected request's connection is torn
//! down, never reused.

mod query;
use query::parse_query;

use memchr::memchr;
use tracing::trace;

use crate::context::{ConnContext, ParseStage};
use crate::flags::StatusFlag;
use crate::limits::ScanLimits;
use crate::protocol::{HeaderClass, Method, classify};
use crate::ensure;
use crate::router::{RouteIndex, RouteOutcome, RouterTree};

/// Slack on top of the URL ceiling for method + version + separators when
/// bounding a request line that has not seen its LF yet.
const REQUEST_LINE_SLACK: usize = 64;

/// Scans the request line, resolves the route, and scans the header block.
///
/// Returns the resolved route index as soon as routing succeeds — even
/// when header scanning afterwards reports a continuation or a rejection —
/// so the caller can hold on to the compiled route across increments.
/// `ctx.flag` always carries the outcome.
pub fn scan_request_head(
    router: &RouterTree,
    ctx: &mut ConnContext,
    limits: &ScanLimits,
    cors_enabled: bool,
) -> Option<RouteIndex> {
    ctx.flag = StatusFlag::Ok;
    ctx.params.clear();
    ctx.query.clear();

    let Some(line_end) = memchr(b'\n', &ctx.buf) else {
        // No complete request line yet. Bound how long we are willing to
        // buffer one before giving up on the URL.
        ctx.flag = if ctx.buf.len() > limits.max_url_size + REQUEST_LINE_SLACK {
            StatusFlag::RequestUrlExceeded
        } else {
            StatusFlag::UnterminatedHeaders
        };
        return None;
    };

    let line = &ctx.buf[..line_end];
    let line = line.strip_suffix(b"\r").unwrap_or(line);

    let Some((method, method_len)) = Method::scan(line) else {
        ctx.flag = StatusFlag::BadRequest;
        return None;
    };
    ctx.method = Some(method);

    let after_method = &line[method_len + 1..];
    if after_method.first() != Some(&b'/') {
        ctx.flag = StatusFlag::BadRequest;
        return None;
    }
    let Some(target_end) = memchr(b' ', after_method) else {
        // Two-token line: no version at all.
        ctx.flag = StatusFlag::BadRequest;
        return None;
    };
    let target = &after_method[..target_end];
    let version = &after_method[target_end + 1..];

    if version.contains(&b' ') {
        ctx.flag = StatusFlag::BadRequest;
        return None;
    }
    if version != b"HTTP/1.1" {
        ctx.flag = if version.starts_with(b"HTTP/") { StatusFlag::HttpVersionUnsupported } else { StatusFlag::BadRequest };
        return None;
    }

    let (path_bytes, query_bytes) = match memchr(b'?', target) {
        Some(q) => (&target[..q], &target[q + 1..]),
        None => (target, &[][..]),
    };

    if path_bytes.len() > limits.max_url_size {
        ctx.flag = StatusFlag::RequestUrlExceeded;
        return None;
    }

    if let Err(flag) = parse_query(query_bytes, limits.query_limit, &mut ctx.query) {
        ctx.flag = flag;
        return None;
    }

    let Ok(path) = std::str::from_utf8(path_bytes) else {
        ctx.flag = StatusFlag::BadRequest;
        return None;
    };

    match router.match_path(method, path, &mut ctx.params, cors_enabled) {
        RouteOutcome::Match(index) => ctx.route = Some(index),
        RouteOutcome::NotFound => {
            ctx.flag = StatusFlag::NotFound;
            return None;
        }
        RouteOutcome::MethodNotAllowed => {
            ctx.flag = StatusFlag::MethodNotAllowed;
            return None;
        }
        RouteOutcome::CorsPreflight => {
            ctx.flag = StatusFlag::CorsPreflight;
            return None;
        }
    }
    trace!(%method, path, route = ?ctx.route, "request line routed");

    ctx.scan_offset = line_end + 1;
    ctx.header_size = 0;
    ctx.flag = scan_header_block(ctx, limits);
    if ctx.flag.is_continuation() {
        ctx.stage = ParseStage::AwaitingMoreHeaders;
    }
    ctx.route
}

/// Continues header scanning after `UnterminatedHeaders`, once the caller
/// has appended more bytes to `ctx.buf`.
pub fn scan_more_headers(ctx: &mut ConnContext, limits: &ScanLimits) {
    ctx.flag = scan_header_block(ctx, limits);
}

/// Scans header lines from `ctx.scan_offset` until the terminating blank
/// line, a violation, or the end of the buffered bytes.
fn scan_header_block(ctx: &mut ConnContext, limits: &ScanLimits) -> StatusFlag {
    loop {
        let offset = ctx.scan_offset;
        let buf = &ctx.buf[..];

        ensure!(ctx.header_size <= limits.max_header_size, StatusFlag::MaxHeaderSize);

        if offset >= buf.len() {
            return StatusFlag::UnterminatedHeaders;
        }

        // Terminating blank line?
        match buf[offset] {
            b'\n' => return finish_block(ctx, offset + 1),
            b'\r' => {
                if offset + 1 >= buf.len() {
                    return StatusFlag::UnterminatedHeaders;
                }
                if buf[offset + 1] == b'\n' {
                    return finish_block(ctx, offset + 2);
                }
                // A CR that opens a header line is a control byte in the
                // name position.
                return StatusFlag::InvalidHeader;
            }
            _ => {}
        }

        // ---- header name ----
        let name_start = offset;
        let mut cursor = offset;
        let name_end = loop {
            if cursor >= buf.len() {
                return StatusFlag::UnterminatedHeaders;
            }
            let byte = buf[cursor];
            if byte == b':' {
                break cursor;
            }
            // Whitespace inside a name also covers obsolete line folding:
            // a continuation line starts with SP/HTAB and is rejected.
            ensure!(byte != b' ' && byte != b'\t', StatusFlag::InvalidHeader);
            ensure!((33..=126).contains(&byte), StatusFlag::InvalidHeader);
            cursor += 1;
            ensure!(cursor - name_start <= limits.max_header_name_size, StatusFlag::MaxHeaderNameSize);
        };
        ensure!(name_end > name_start, StatusFlag::InvalidHeader);
        ensure!(!buf[name_start].is_ascii_digit(), StatusFlag::InvalidHeader);

        let name = String::from_utf8_lossy(&buf[name_start..name_end].to_ascii_lowercase()).into_owned();

        // Duplicate and smuggling guards fire on name recognition, before
        // the value is even scanned.
        if classify(&name) == HeaderClass::SingleValue {
            ensure!(!ctx.headers.contains(&name), StatusFlag::DuplicateSingleHeader);
        }
        if name == "content-length" {
            ensure!(!ctx.headers.contains("transfer-encoding"), StatusFlag::BadRequest);
        }
        if name == "transfer-encoding" {
            ensure!(!ctx.headers.contains("content-length"), StatusFlag::BadRequest);
        }

        // ---- header value ----
        let mut cursor = name_end + 1;
        while cursor < buf.len() && (buf[cursor] == b' ' || buf[cursor] == b'\t') {
            cursor += 1;
        }
        let value_start = cursor;

        let value_end = if name == "content-length" {
            match scan_number_value(buf, &mut cursor, value_start, limits.max_header_value_size) {
                Ok(end) => end,
                Err(flag) => return flag,
            }
        } else {
            match scan_any_value(buf, &mut cursor, value_start, limits.max_header_value_size) {
                Ok(end) => end,
                Err(flag) => return flag,
            }
        };

        // ---- line terminator ----
        if buf[cursor] == b'\r' {
            if cursor + 1 >= buf.len() {
                return StatusFlag::UnterminatedHeaders;
            }
            ensure!(buf[cursor + 1] == b'\n', StatusFlag::InvalidHeaderValue);
            cursor += 2;
        } else {
            // scan_*_value only stops at CR or LF.
            cursor += 1;
        }

        let value = String::from_utf8_lossy(&buf[value_start..value_end]).into_owned();
        if name == "content-length" {
            let Ok(parsed) = value.parse::<u64>() else {
                return StatusFlag::InvalidHeaderValue;
            };
            ctx.content_len = Some(parsed);
        }
        trace!(name = %name, value = %value, "parsed header");
        ctx.headers.insert(name, value);

        // Commit: continuations resume at this line boundary.
        ctx.header_size += cursor - offset;
        ctx.scan_offset = cursor;
    }
}

fn finish_block(ctx: &mut ConnContext, body_offset: usize) -> StatusFlag {
    ctx.body_offset = body_offset;
    ctx.scan_offset = body_offset;
    if !ctx.headers.contains("host") {
        return StatusFlag::MissingHost;
    }
    StatusFlag::Ok
}

/// Value scanner for `Content-Length`: base-10 digits with optional
/// trailing whitespace, nothing else.
fn scan_number_value(
    buf: &[u8],
    cursor: &mut usize,
    value_start: usize,
    max_value_size: usize,
) -> Result<usize, StatusFlag> {
    let mut value_end = value_start;
    let mut seen_digit = false;

    loop {
        if *cursor >= buf.len() {
            return Err(StatusFlag::UnterminatedHeaders);
        }
        if *cursor - value_start > max_value_size {
            return Err(StatusFlag::MaxHeaderValueSize);
        }
        match buf[*cursor] {
            b'\r' | b'\n' => break,
            b'0'..=b'9' => {
                seen_digit = true;
                value_end = *cursor + 1;
                *cursor += 1;
            }
            b' ' | b'\t' => {
                // Trailing whitespace only; anything after it but the line
                // end is extraneous.
                *cursor += 1;
                loop {
                    if *cursor >= buf.len() {
                        return Err(StatusFlag::UnterminatedHeaders);
                    }
                    match buf[*cursor] {
                        b'\r' | b'\n' => break,
                        b' ' | b'\t' => *cursor += 1,
                        _ => return Err(StatusFlag::InvalidHeaderValue),
                    }
                }
                break;
            }
            _ => return Err(StatusFlag::InvalidHeaderValue),
        }
    }

    if !seen_digit {
        return Err(StatusFlag::InvalidHeaderValue);
    }
    Ok(value_end)
}

/// General header value scanner: visible bytes plus SP/HTAB, trailing
/// whitespace stripped, control bytes rejected.
fn scan_any_value(
    buf: &[u8],
    cursor: &mut usize,
    value_start: usize,
    max_value_size: usize,
) -> Result<usize, StatusFlag> {
    let mut value_end = value_start;

    loop {
        if *cursor >= buf.len() {
            return Err(StatusFlag::UnterminatedHeaders);
        }
        if *cursor - value_start > max_value_size {
            return Err(StatusFlag::MaxHeaderValueSize);
        }
        let byte = buf[*cursor];
        match byte {
            b'\r' | b'\n' => break,
            b'\t' | b' ' => *cursor += 1,
            byte if byte < 32 || byte == 127 => return Err(StatusFlag::InvalidHeaderValue),
            _ => {
                value_end = *cursor + 1;
                *cursor += 1;
            }
        }
    }
    Ok(value_end)
}
