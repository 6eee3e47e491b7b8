//! Protocol-level building blocks shared by the scanner, router and
//! accumulator: the method set and the request header table.

mod headers;
pub use headers::HeaderClass;
pub use headers::HeaderTable;
pub use headers::classify;
pub use headers::{MERGEABLE_HEADERS, SINGLE_VALUE_HEADERS};

mod method;
pub use method::Method;
pub use method::METHODS;
