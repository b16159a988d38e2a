//! Error type definitions for the channel import pipeline
//!
//! Only conditions that abort an entire run are modelled as errors here.
//! Per-entry problems (resolution mismatch, ambiguous probe, filtered-out
//! entries) are encoded in returned data by the lower layers and never
//! surface as `Err`.

mod types;

pub use types::{ImportError, ResolverError};

/// Convenience result alias used throughout the crate.
pub type ImportResult<T> = Result<T, ImportError>;
