//! Incremental codecs for request bodies.
//!
//! The scanner owns the request head; everything after the terminating
//! blank line flows through the accumulators in [`body`], which tolerate
//! arbitrary increment boundaries and report completion explicitly.

pub mod body;
