//! Channel import and validation pipeline
//!
//! Ingests an external M3U-style playlist, resolves token-based stream
//! addresses against a provider directory, filters and deduplicates
//! entries, probes liveness under bounded concurrency with a TTL verdict
//! cache, and produces a numbered channel list with import statistics.

pub mod config;
pub mod errors;
pub mod filters;
pub mod models;
pub mod parser;
pub mod pipeline;
pub mod resolver;
pub mod utils;
pub mod validator;

pub use config::Config;
pub use errors::{ImportError, ImportResult};
pub use models::{
    ChannelRecord, ImportOutcome, ImportPhase, ImportProgress, ImportStatistics, PlaylistEntry,
    ResolvedEntry, ValidationVerdict, VerdictClass,
};
pub use pipeline::{ImportOptions, ImportOrchestrator};
pub use validator::{StreamValidator, VerdictCache};
