//! Content-type parsers, keyed by MIME type.
//!
//! Like the decoders, parsers are opaque collaborators: a parse failure is
//! `None`, handed to the endpoint as a null body rather than escalated.

use std::collections::HashMap;

use bytes::Bytes;

/// A decoded request body after content parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyValue {
    /// No parser applied; the raw decoded bytes.
    Raw(Bytes),
    /// `text/plain`.
    Text(String),
    /// `application/json`.
    Json(serde_json::Value),
    /// `application/x-www-form-urlencoded`.
    Form(HashMap<String, String>),
}

impl BodyValue {
    /// The raw bytes, when no parser ran.
    pub fn as_raw(&self) -> Option<&Bytes> {
        match self {
            BodyValue::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            BodyValue::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// A body parser: decoded bytes in, structured value out, `None` on failure.
pub type ParseFn = fn(&[u8]) -> Option<BodyValue>;

fn parse_json(input: &[u8]) -> Option<BodyValue> {
    serde_json::from_slice(input).ok().map(BodyValue::Json)
}

fn parse_form(input: &[u8]) -> Option<BodyValue> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(input).ok()?;
    Some(BodyValue::Form(pairs.into_iter().collect()))
}

fn parse_text(input: &[u8]) -> Option<BodyValue> {
    Some(BodyValue::Text(String::from_utf8_lossy(input).into_owned()))
}

/// Looks up the parser for a `Content-Type` value. Lookup is by the exact
/// MIME type, so a value carrying parameters selects no parser and the
/// body passes through raw.
pub fn parser_for(content_type: &str) -> Option<ParseFn> {
    if content_type == mime::APPLICATION_JSON.as_ref() {
        Some(parse_json)
    } else if content_type == mime::APPLICATION_WWW_FORM_URLENCODED.as_ref() {
        Some(parse_form)
    } else if content_type == mime::TEXT_PLAIN.as_ref() {
        Some(parse_text)
    } else {
        None
    }
}
