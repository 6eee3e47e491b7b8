//! Content negotiation: decoding and parsing tables plus the per-route
//! expectation carried on compiled route entries.

pub mod encoding;
pub mod parser;

pub use parser::BodyValue;

/// What a route expects of one content dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Expectation {
    /// No declaration: sniff the request's own header and apply a known
    /// transform when one exists.
    #[default]
    Sniff,
    /// Explicitly no transform for this dimension.
    Skip,
    /// The request must declare exactly this value; anything else is
    /// rejected before the body accumulator runs.
    Exact(String),
}

/// A route's declared content-type / content-encoding expectation.
///
/// The type dimension is checked before the encoding dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentExpectation {
    pub type_expect: Expectation,
    pub encoding_expect: Expectation,
}

impl ContentExpectation {
    /// Requires `application/json` bodies.
    pub fn json() -> Self {
        Self { type_expect: Expectation::Exact(mime::APPLICATION_JSON.as_ref().to_owned()), ..Self::default() }
    }

    /// Requires an exact content type.
    pub fn typed(content_type: impl Into<String>) -> Self {
        Self { type_expect: Expectation::Exact(content_type.into()), ..Self::default() }
    }

    /// Adds an exact content-encoding requirement.
    pub fn encoded(mut self, encoding: impl Into<String>) -> Self {
        self.encoding_expect = Expectation::Exact(encoding.into());
        self
    }

    /// Disables decoding for this route regardless of request headers.
    pub fn skip_decoding(mut self) -> Self {
        self.encoding_expect = Expectation::Skip;
        self
    }

    /// Disables parsing for this route regardless of request headers.
    pub fn skip_parsing(mut self) -> Self {
        self.type_expect = Expectation::Skip;
        self
    }
}
