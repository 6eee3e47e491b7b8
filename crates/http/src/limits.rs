//! Size and count ceilings enforced by the scanner.

/// Maximum total header block size in bytes, request line excluded.
pub const DEFAULT_MAX_HEADER_SIZE: usize = 10 * 1024;

/// Maximum size in bytes of a single header name.
pub const DEFAULT_MAX_HEADER_NAME_SIZE: usize = 512;

/// Maximum size in bytes of a single header value.
pub const DEFAULT_MAX_HEADER_VALUE_SIZE: usize = 1024;

/// Maximum path length in bytes.
pub const DEFAULT_MAX_URL_SIZE: usize = 2 * 1024;

/// Maximum number of query pairs, empty and `=`-only pairs included.
pub const DEFAULT_QUERY_LIMIT: usize = 64;

/// Ceilings handed to every scanner invocation.
///
/// These are the global defaults; per-route overrides are applied by the
/// dispatch layer before the body accumulator runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanLimits {
    /// Ceiling for the cumulative header block, across continuations.
    pub max_header_size: usize,
    /// Ceiling for a single header name.
    pub max_header_name_size: usize,
    /// Ceiling for a single header value.
    pub max_header_value_size: usize,
    /// Ceiling for the request path, in bytes.
    pub max_url_size: usize,
    /// Ceiling for the number of query pairs.
    pub query_limit: usize,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            max_header_size: DEFAULT_MAX_HEADER_SIZE,
            max_header_name_size: DEFAULT_MAX_HEADER_NAME_SIZE,
            max_header_value_size: DEFAULT_MAX_HEADER_VALUE_SIZE,
            max_url_size: DEFAULT_MAX_URL_SIZE,
            query_limit: DEFAULT_QUERY_LIMIT,
        }
    }
}
