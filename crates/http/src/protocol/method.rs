//! HTTP method token scanning.

use std::fmt;

/// The closed set of methods the engine accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Head,
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
}

/// All methods, indexable by [`Method::index`].
pub const METHODS: [Method; 7] =
    [Method::Head, Method::Get, Method::Post, Method::Put, Method::Delete, Method::Patch, Method::Options];

impl Method {
    /// Scans a method token at the start of `buf`.
    ///
    /// Matches byte-by-byte against the known tokens and requires the byte
    /// following the token to be a space. Returns the method and the token
    /// length, or `None` for any unknown token.
    pub fn scan(buf: &[u8]) -> Option<(Method, usize)> {
        let sp_at = |n: usize| buf.get(n) == Some(&b' ');
        match buf.first()? {
            b'G' => (buf.starts_with(b"GET") && sp_at(3)).then_some((Method::Get, 3)),
            b'H' => (buf.starts_with(b"HEAD") && sp_at(4)).then_some((Method::Head, 4)),
            b'P' => match buf.get(1)? {
                b'O' => (buf.starts_with(b"POST") && sp_at(4)).then_some((Method::Post, 4)),
                b'U' => (buf.starts_with(b"PUT") && sp_at(3)).then_some((Method::Put, 3)),
                b'A' => (buf.starts_with(b"PATCH") && sp_at(5)).then_some((Method::Patch, 5)),
                _ => None,
            },
            b'D' => (buf.starts_with(b"DELETE") && sp_at(6)).then_some((Method::Delete, 6)),
            b'O' => (buf.starts_with(b"OPTIONS") && sp_at(7)).then_some((Method::Options, 7)),
            _ => None,
        }
    }

    /// Parses a method name as written in a route definition.
    pub fn from_name(name: &str) -> Option<Method> {
        match name {
            "HEAD" => Some(Method::Head),
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "DELETE" => Some(Method::Delete),
            "PATCH" => Some(Method::Patch),
            "OPTIONS" => Some(Method::Options),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Head => "HEAD",
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Options => "OPTIONS",
        }
    }

    /// Stable index into per-method tables.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Method::Head => 0,
            Method::Get => 1,
            Method::Post => 2,
            Method::Put => 3,
            Method::Delete => 4,
            Method::Patch => 5,
            Method::Options => 6,
        }
    }

    /// GET and HEAD never read a request body.
    #[inline]
    pub fn reads_body(self) -> bool {
        !matches!(self, Method::Get | Method::Head)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_every_method() {
        for method in METHODS {
            let line = format!("{} /x HTTP/1.1", method.as_str());
            let (scanned, len) = Method::scan(line.as_bytes()).unwrap();
            assert_eq!(scanned, method);
            assert_eq!(len, method.as_str().len());
        }
    }

    #[test]
    fn rejects_token_without_following_space() {
        assert!(Method::scan(b"GETSEARCHHTTP/1.1").is_none());
        assert!(Method::scan(b"GET").is_none());
        assert!(Method::scan(b"").is_none());
    }

    #[test]
    fn rejects_unknown_token() {
        assert!(Method::scan(b"BREW /coffee HTTP/1.1").is_none());
        assert!(Method::scan(b"get /x HTTP/1.1").is_none());
    }

    #[test]
    fn body_reading_methods() {
        assert!(!Method::Get.reads_body());
        assert!(!Method::Head.reads_body());
        assert!(Method::Post.reads_body());
        assert!(Method::Delete.reads_body());
    }
}
