//! Query-string splitting and percent-decoding.

use std::collections::HashMap;

use memchr::memchr;

use crate::flags::StatusFlag;

fn hex_val(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Decodes `%XX` escapes and `+`-as-space. Malformed escapes are kept
/// literally rather than rejected.
fn decode_component(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'%' if i + 2 < raw.len() => match (hex_val(raw[i + 1]), hex_val(raw[i + 2])) {
                (Some(hi), Some(lo)) => {
                    out.push((hi << 4) | lo);
                    i += 3;
                }
                _ => {
                    out.push(b'%');
                    i += 1;
                }
            },
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Splits a raw query string on `&`, pairs on the first `=`, and decodes
/// both halves into `out` (last write wins per key).
///
/// Every split segment counts against `limit`, empty and `=`-only pairs
/// included; exceeding it is the caller's query-exceeded rejection.
pub(crate) fn parse_query(
    raw: &[u8],
    limit: usize,
    out: &mut HashMap<String, String>,
) -> Result<(), StatusFlag> {
    if raw.is_empty() {
        return Ok(());
    }

    let mut pairs = 0usize;
    for pair in raw.split(|&b| b == b'&') {
        pairs += 1;
        if pairs > limit {
            return Err(StatusFlag::RequestQueryExceeded);
        }
        if pair.is_empty() {
            continue;
        }
        let (key, value) = match memchr(b'=', pair) {
            Some(eq) => (&pair[..eq], &pair[eq + 1..]),
            None => (pair, &[][..]),
        };
        if key.is_empty() && value.is_empty() {
            // "=" alone counts toward the limit but stores nothing.
            continue;
        }
        out.insert(decode_component(key), decode_component(value));
    }
    Ok(())
}
