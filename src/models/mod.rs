use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One channel entry as parsed from the playlist manifest.
///
/// Entries are immutable once parsed; pipeline stages that need to change
/// an entry produce a new value instead of mutating in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub name: String,
    pub address: String,
    pub category: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    /// Free text from the group-title attribute, used to infer a category
    /// when no explicit category attribute is present.
    pub group_label: Option<String>,
    pub logo: Option<String>,
}

impl PlaylistEntry {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            category: None,
            country: None,
            language: None,
            group_label: None,
            logo: None,
        }
    }

    /// Effective category: explicit category first, group label second.
    pub fn effective_category(&self) -> Option<&str> {
        self.category.as_deref().or(self.group_label.as_deref())
    }
}

/// Whether dynamic address resolution was attempted for an entry, and how
/// it went. Carried for diagnostics; `Failed` is not an error condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStatus {
    NotAttempted,
    Resolved,
    Failed,
}

/// A playlist entry whose address has possibly been replaced by a freshly
/// generated one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEntry {
    pub entry: PlaylistEntry,
    pub resolution: ResolutionStatus,
}

impl ResolvedEntry {
    pub fn passthrough(entry: PlaylistEntry) -> Self {
        Self {
            entry,
            resolution: ResolutionStatus::NotAttempted,
        }
    }
}

/// Reachability classification for one probed address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictClass {
    /// Address matched the trusted allow-list; never probed.
    Trusted,
    /// Probe positively confirmed a live stream.
    ConfirmedLive,
    /// Probe positively confirmed a dead address (404/410 or an
    /// unambiguous DNS/connection-refusal error).
    ConfirmedDead,
    /// Probe outcome was ambiguous; treated as live by policy.
    AssumedLive,
}

impl VerdictClass {
    /// Only a confirmed-dead address counts as unreachable. Every
    /// ambiguous outcome resolves toward "assume alive": false negatives
    /// are far more costly to the channel list than false positives.
    pub fn is_reachable(self) -> bool {
        !matches!(self, VerdictClass::ConfirmedDead)
    }
}

/// The validator's judgment for one address, keyed by address rather than
/// entry identity since the same address may recur across entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub address: String,
    pub class: VerdictClass,
    pub is_reachable: bool,
    pub latency_ms: Option<u64>,
    pub checked_at: DateTime<Utc>,
    pub error_detail: Option<String>,
}

impl ValidationVerdict {
    pub fn new(address: impl Into<String>, class: VerdictClass) -> Self {
        Self {
            address: address.into(),
            class,
            is_reachable: class.is_reachable(),
            latency_ms: None,
            checked_at: Utc::now(),
            error_detail: None,
        }
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.error_detail = Some(detail.into());
        self
    }
}

/// Counters accumulated over a single import run. Monotone: fields are
/// only ever incremented, and the struct is produced once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStatistics {
    pub total_parsed: usize,
    pub resolved: usize,
    pub filtered_country: usize,
    pub filtered_language: usize,
    pub filtered_duplicate: usize,
    pub filtered_cap: usize,
    pub validated: usize,
    pub valid: usize,
    pub invalid: usize,
}

impl ImportStatistics {
    pub fn total_filtered(&self) -> usize {
        self.filtered_country + self.filtered_language + self.filtered_duplicate + self.filtered_cap
    }
}

/// Final pipeline output record. Created only at assembly, after all
/// filtering and validation; never mutated afterward. A changed address is
/// a new record, not an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// Stable for the same (name, address) pair across runs so downstream
    /// dedup keeps working after reordering or partial-batch cancellation.
    pub id: Uuid,
    pub number: u32,
    pub name: String,
    pub address: String,
    pub category: Option<String>,
}

/// Pipeline phase, strictly sequential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportPhase {
    Fetching,
    Parsing,
    Resolving,
    Filtering,
    Validating,
    Complete,
}

impl std::fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ImportPhase::Fetching => "fetching",
            ImportPhase::Parsing => "parsing",
            ImportPhase::Resolving => "resolving",
            ImportPhase::Filtering => "filtering",
            ImportPhase::Validating => "validating",
            ImportPhase::Complete => "complete",
        };
        f.write_str(s)
    }
}

/// Progress report delivered after each phase or batch transition. Purely
/// observational; no backpressure flows back through the callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportProgress {
    pub phase: ImportPhase,
    pub current: usize,
    pub total: usize,
    pub message: String,
}

impl ImportProgress {
    pub fn new(
        phase: ImportPhase,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            current,
            total,
            message: message.into(),
        }
    }
}

/// Structured result of one import run: the numbered channel list, the run
/// statistics, and human-readable error strings (empty on full success).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportOutcome {
    pub channels: Vec<ChannelRecord>,
    pub statistics: ImportStatistics,
    pub errors: Vec<String>,
}
