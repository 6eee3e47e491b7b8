//! The pooled HTTP/1.1 request-ingestion core.
//!
//! This crate turns raw bytes arriving on a socket into a fully validated,
//! routed, body-complete request while reusing a fixed set of pre-allocated
//! objects. It contains no I/O: every entry point is a pure, synchronous
//! transformation over bytes the caller has already buffered, which is what
//! makes the engine drivable from any reactor.
//!
//! # Components
//!
//! - [`pool`]: fixed-capacity object pool backing per-connection state and
//!   response objects; nothing else allocates on the hot path
//! - [`scanner`]: request-line/header byte scanner with the full
//!   RFC/security rule set, reporting through [`flags::StatusFlag`]
//! - [`router`]: compiled per-method route tree (literals, named
//!   parameters, trailing wildcards) resolving to a route index
//! - [`codec::body`]: the four-strategy body accumulation state machine
//!   (no-body, fixed-length, chunked, read-until-close)
//! - [`context`]: the per-connection mutable state those components share
//!
//! # Control flow
//!
//! Socket data arrives → [`scanner::scan_request_head`] consumes the head
//! of the buffer → on success the route index addresses a compiled route →
//! [`codec::body::select_strategy`] decides how the remainder is gathered →
//! once the body completes, the caller dispatches and the context returns
//! to the pool.
//!
//! # Error handling
//!
//! The wire path never returns `Result` and never panics on input: every
//! outcome — success, continuation, or one specific rejection — is a
//! [`flags::StatusFlag`] checked explicitly by the caller. `Result` shows
//! up only at startup (route compilation).
//!
//! # Limitations
//!
//! - HTTP/1.1 only; any other version is rejected on the request line
//! - No TLS (terminate it in front of the engine)
//! - Header, URL, query and body ceilings are enforced, with defaults in
//!   [`limits`]

pub mod codec;
pub mod context;
pub mod flags;
pub mod limits;
pub mod pool;
pub mod protocol;
pub mod router;
pub mod scanner;

mod utils;
pub(crate) use utils::ensure;
