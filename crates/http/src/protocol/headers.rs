//! Case-insensitive request header table.
//!
//! Keys are stored lowercased; lookup is by lowercase name. Insertion
//! behavior depends on the header's class:
//!
//! - single-value headers (`host`, `content-length`, `authorization`) must
//!   not repeat — the scanner rejects the request before insertion;
//! - mergeable list headers are comma-joined on repeat;
//! - everything else is last-write-wins.

use std::collections::HashMap;

/// Headers that may appear at most once, equal values included.
pub const SINGLE_VALUE_HEADERS: [&str; 3] = ["host", "content-length", "authorization"];

/// List-valued headers whose repeats are merged with `", "`.
pub const MERGEABLE_HEADERS: [&str; 10] = [
    "accept-language",
    "accept-encoding",
    "accept-ranges",
    "allow",
    "cache-control",
    "connection",
    "pragma",
    "te",
    "trailer",
    "upgrade",
];

/// Insertion class of a header name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderClass {
    /// Repeats are a protocol violation.
    SingleValue,
    /// Repeats are comma-joined.
    Mergeable,
    /// Repeats overwrite.
    LastWriteWins,
}

/// Returns the insertion class for a lowercase header name.
pub fn classify(name: &str) -> HeaderClass {
    if SINGLE_VALUE_HEADERS.contains(&name) {
        HeaderClass::SingleValue
    } else if MERGEABLE_HEADERS.contains(&name) {
        HeaderClass::Mergeable
    } else {
        HeaderClass::LastWriteWins
    }
}

/// Parsed request headers, keyed by lowercase name.
#[derive(Debug, Default)]
pub struct HeaderTable {
    entries: HashMap<String, String>,
}

impl HeaderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<&str> {
        if name.bytes().any(|b| b.is_ascii_uppercase()) {
            self.entries.get(&name.to_ascii_lowercase()).map(String::as_str)
        } else {
            self.entries.get(name).map(String::as_str)
        }
    }

    pub fn contains(&self, lower_name: &str) -> bool {
        debug_assert!(!lower_name.bytes().any(|b| b.is_ascii_uppercase()));
        self.entries.contains_key(lower_name)
    }

    /// Inserts a header parsed by the scanner. `lower_name` must already be
    /// lowercased; duplicate single-value rejection happens before this
    /// call, so a repeated single-value name here overwrites.
    pub fn insert(&mut self, lower_name: String, value: String) {
        match classify(&lower_name) {
            HeaderClass::Mergeable => {
                self.entries
                    .entry(lower_name)
                    .and_modify(|existing| {
                        existing.push_str(", ");
                        existing.push_str(&value);
                    })
                    .or_insert(value);
            }
            HeaderClass::SingleValue | HeaderClass::LastWriteWins => {
                self.entries.insert(lower_name, value);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let mut table = HeaderTable::new();
        table.insert("host".to_owned(), "example.com".to_owned());
        assert_eq!(table.get("Host"), Some("example.com"));
        assert_eq!(table.get("HOST"), Some("example.com"));
        assert_eq!(table.get("host"), Some("example.com"));
    }

    #[test]
    fn mergeable_headers_join_with_comma() {
        let mut table = HeaderTable::new();
        table.insert("accept-encoding".to_owned(), "gzip".to_owned());
        table.insert("accept-encoding".to_owned(), "br".to_owned());
        assert_eq!(table.get("accept-encoding"), Some("gzip, br"));
    }

    #[test]
    fn unknown_headers_are_last_write_wins() {
        let mut table = HeaderTable::new();
        table.insert("x-trace".to_owned(), "a".to_owned());
        table.insert("x-trace".to_owned(), "b".to_owned());
        assert_eq!(table.get("x-trace"), Some("b"));
    }

    #[test]
    fn classes() {
        assert_eq!(classify("host"), HeaderClass::SingleValue);
        assert_eq!(classify("content-length"), HeaderClass::SingleValue);
        assert_eq!(classify("authorization"), HeaderClass::SingleValue);
        assert_eq!(classify("connection"), HeaderClass::Mergeable);
        assert_eq!(classify("x-anything"), HeaderClass::LastWriteWins);
    }
}
