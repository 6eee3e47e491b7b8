//! Pooled response objects and the static error-response templates.

use bytes::{BufMut, Bytes, BytesMut};
use http::StatusCode;
use tracing::warn;

use crate::content::encoding::encoder_for;

/// A response under construction.
///
/// Implemented by [`PipeResponse`] and swappable through the server's
/// response-constructor capability, so callers can substitute their own
/// implementation without inheritance chains. Objects live in the response
/// pool and are `reset` between uses.
pub trait Respond: Send {
    fn set_status(&mut self, status: StatusCode);

    fn set_header(&mut self, name: &str, value: &str);

    /// Sets the body and marks the response finished; later pipeline steps
    /// are skipped once a response is finished.
    fn send(&mut self, body: &[u8]);

    fn finished(&self) -> bool;

    /// Selects a compression coding applied at serialization time.
    fn set_compression(&mut self, encoding: &str);

    /// Serializes status line, headers and body into wire bytes.
    fn serialize(&self) -> Bytes;

    /// Clears all state for reuse from the pool.
    fn reset(&mut self);

    /// Sends a JSON body with the matching content type.
    fn json(&mut self, value: &serde_json::Value) {
        self.set_header("Content-Type", mime::APPLICATION_JSON.as_ref());
        self.send(value.to_string().as_bytes());
    }

    /// Sends a redirect to `url`.
    fn redirect(&mut self, url: &str, status: StatusCode) {
        self.set_status(status);
        self.set_header("Location", url);
        self.send(b"");
    }
}

/// Constructor capability used to populate the response pool.
pub type RespondCtor = std::sync::Arc<dyn Fn() -> Box<dyn Respond> + Send + Sync>;

/// The default [`Respond`] implementation.
#[derive(Debug)]
pub struct PipeResponse {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    finished: bool,
    compression: Option<String>,
}

impl PipeResponse {
    pub fn new() -> Self {
        Self { status: StatusCode::OK, headers: Vec::new(), body: Vec::new(), finished: false, compression: None }
    }
}

impl Default for PipeResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl Respond for PipeResponse {
    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    fn set_header(&mut self, name: &str, value: &str) {
        // Last write wins, headers stay in insertion order.
        if let Some(slot) = self.headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
            slot.1 = value.to_owned();
        } else {
            self.headers.push((name.to_owned(), value.to_owned()));
        }
    }

    fn send(&mut self, body: &[u8]) {
        self.body.clear();
        self.body.extend_from_slice(body);
        self.finished = true;
    }

    fn finished(&self) -> bool {
        self.finished
    }

    fn set_compression(&mut self, encoding: &str) {
        self.compression = Some(encoding.to_owned());
    }

    fn serialize(&self) -> Bytes {
        let mut body = None;
        if let Some(encoding) = &self.compression {
            match encoder_for(encoding).and_then(|encode| encode(&self.body)) {
                Some(compressed) => body = Some(compressed),
                None => warn!(encoding, "unknown or failed response compression, sending identity"),
            }
        }
        let compressed = body.is_some();
        let body = body.as_deref().unwrap_or(&self.body);

        let mut out = BytesMut::with_capacity(128 + body.len());
        out.put_slice(b"HTTP/1.1 ");
        out.put_slice(self.status.as_str().as_bytes());
        if let Some(reason) = self.status.canonical_reason() {
            out.put_u8(b' ');
            out.put_slice(reason.as_bytes());
        }
        out.put_slice(b"\r\n");
        for (name, value) in &self.headers {
            out.put_slice(name.as_bytes());
            out.put_slice(b": ");
            out.put_slice(value.as_bytes());
            out.put_slice(b"\r\n");
        }
        if compressed {
            if let Some(encoding) = &self.compression {
                out.put_slice(b"Content-Encoding: ");
                out.put_slice(encoding.as_bytes());
                out.put_slice(b"\r\n");
            }
        }
        out.put_slice(b"Content-Length: ");
        out.put_slice(body.len().to_string().as_bytes());
        out.put_slice(b"\r\n\r\n");
        out.put_slice(body);
        out.freeze()
    }

    fn reset(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body.clear();
        self.finished = false;
        self.compression = None;
    }
}

/// Pre-built error responses written for terminal statuses. The CORS
/// variants are rebuilt once at server construction with the configured
/// header block.
pub mod templates {
    use bytes::Bytes;
    use fastline_http::flags::StatusFlag;
    use once_cell::sync::Lazy;

    pub static RESP_505: Bytes =
        Bytes::from_static(b"HTTP/1.1 505 HTTP Version Not Supported\r\nContent-Length: 0\r\n\r\n");
    pub static RESP_405: Bytes = Bytes::from_static(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
    pub static RESP_400: Bytes = Bytes::from_static(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n");
    pub static RESP_404: Bytes = Bytes::from_static(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
    pub static RESP_413: Bytes = Bytes::from_static(b"HTTP/1.1 413 Payload Too Large\r\nContent-Length: 0\r\n\r\n");
    pub static RESP_414: Bytes = Bytes::from_static(b"HTTP/1.1 414 Request-URI Too Large\r\nContent-Length: 0\r\n\r\n");
    pub static RESP_204: Bytes = Bytes::from_static(b"HTTP/1.1 204 No Content\r\n\r\n");

    /// Flag-to-template mapping for terminal rejections, built once.
    static BY_FLAG: Lazy<Vec<(StatusFlag, &'static Bytes)>> = Lazy::new(|| {
        vec![
            (StatusFlag::HttpVersionUnsupported, &RESP_505),
            (StatusFlag::MethodNotAllowed, &RESP_405),
            (StatusFlag::NotFound, &RESP_404),
            (StatusFlag::ContentLengthTooLarge, &RESP_413),
            (StatusFlag::RequestQueryExceeded, &RESP_414),
            (StatusFlag::RequestUrlExceeded, &RESP_414),
        ]
    });

    /// The error bytes for a terminal flag; anything without a dedicated
    /// template is a plain 400.
    pub fn for_flag(flag: StatusFlag) -> &'static Bytes {
        BY_FLAG.iter().find(|(f, _)| *f == flag).map_or(&RESP_400, |(_, bytes)| *bytes)
    }

    /// 204 preflight answer carrying the server's CORS header block.
    pub fn cors_preflight(cors_headers: &str) -> Bytes {
        Bytes::from(format!("HTTP/1.1 204 No Content\r\n{cors_headers}Content-Length: 0\r\n\r\n"))
    }

    /// Not-found answer carrying the CORS header block, used instead of
    /// the bare 404 when CORS is enabled.
    pub fn cors_not_found(cors_headers: &str) -> Bytes {
        Bytes::from(format!("HTTP/1.1 404 Not Found\r\n{cors_headers}Content-Length: 0\r\n\r\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fastline_http::flags::StatusFlag;

    #[test]
    fn serializes_status_headers_and_body() {
        let mut res = PipeResponse::new();
        res.set_status(StatusCode::CREATED);
        res.set_header("X-Id", "7");
        res.send(b"created");
        let wire = res.serialize();
        let text = std::str::from_utf8(&wire).unwrap();
        assert!(text.starts_with("HTTP/1.1 201 Created\r\n"));
        assert!(text.contains("X-Id: 7\r\n"));
        assert!(text.contains("Content-Length: 7\r\n"));
        assert!(text.ends_with("\r\n\r\ncreated"));
    }

    #[test]
    fn send_marks_finished() {
        let mut res = PipeResponse::new();
        assert!(!res.finished());
        res.send(b"done");
        assert!(res.finished());
    }

    #[test]
    fn json_sets_content_type() {
        let mut res = PipeResponse::new();
        res.json(&serde_json::json!({"ok": true}));
        let wire = res.serialize();
        let text = std::str::from_utf8(&wire).unwrap();
        assert!(text.contains("Content-Type: application/json\r\n"));
        assert!(text.ends_with(r#"{"ok":true}"#));
    }

    #[test]
    fn compression_is_applied_at_serialization() {
        let payload = "abcabcabc".repeat(64);
        let mut res = PipeResponse::new();
        res.set_compression("gzip");
        res.send(payload.as_bytes());
        let wire = res.serialize();
        let text = String::from_utf8_lossy(&wire);
        assert!(text.contains("Content-Encoding: gzip\r\n"));

        let body_at = wire.windows(4).position(|w| w == b"\r\n\r\n").unwrap() + 4;
        let decoded = crate::content::encoding::decoder_for("gzip").unwrap()(&wire[body_at..]).unwrap();
        assert_eq!(decoded, payload.as_bytes());
    }

    #[test]
    fn reset_returns_to_a_fresh_state() {
        let mut res = PipeResponse::new();
        res.set_status(StatusCode::IM_A_TEAPOT);
        res.set_header("X-Id", "7");
        res.send(b"body");
        res.reset();
        assert!(!res.finished());
        let wire = res.serialize();
        assert!(std::str::from_utf8(&wire).unwrap().starts_with("HTTP/1.1 200 OK\r\n"));
    }

    #[test]
    fn templates_map_terminal_flags() {
        assert!(templates::for_flag(StatusFlag::HttpVersionUnsupported).starts_with(b"HTTP/1.1 505"));
        assert!(templates::for_flag(StatusFlag::NotFound).starts_with(b"HTTP/1.1 404"));
        assert!(templates::for_flag(StatusFlag::RequestUrlExceeded).starts_with(b"HTTP/1.1 414"));
        assert!(templates::for_flag(StatusFlag::MissingHost).starts_with(b"HTTP/1.1 400"));
        assert!(templates::for_flag(StatusFlag::ContentLengthTooLarge).starts_with(b"HTTP/1.1 413"));
    }

    #[test]
    fn cors_templates_embed_the_header_block() {
        let block = "Access-Control-Allow-Origin: *\r\n";
        let preflight = templates::cors_preflight(block);
        let text = std::str::from_utf8(&preflight).unwrap();
        assert!(text.starts_with("HTTP/1.1 204 No Content\r\n"));
        assert!(text.contains("Access-Control-Allow-Origin: *\r\n"));
    }
}
