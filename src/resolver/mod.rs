//! Dynamic address resolver
//!
//! Some providers embed short-lived session tokens in their stream URLs,
//! so addresses copied into a playlist expire. Entries matching a known
//! token-host fragment are re-matched against the provider's current
//! channel directory and get a freshly generated address. An unmatched
//! entry keeps its original address and is marked `Failed` — downstream
//! validation judges the stale address on its own merits.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::errors::{ImportError, ResolverError};
use crate::models::{PlaylistEntry, ResolutionStatus, ResolvedEntry};
use crate::utils::http_client::{from_json_value, ContentFetcher};
use crate::utils::url::UrlUtils;

/// One record of the provider's authoritative channel directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryChannel {
    pub id: String,
    pub name: String,
    pub address: String,
}

/// External collaborator exposing "list current channels with live
/// addresses". Consumed only by the resolver.
#[async_trait]
pub trait DirectoryProvider: Send + Sync {
    async fn list_channels(&self) -> Result<Vec<DirectoryChannel>, ResolverError>;
}

/// Wire shape of a player-API live stream listing.
#[derive(Debug, Deserialize)]
struct ApiStream {
    stream_id: serde_json::Value,
    name: String,
}

/// Directory provider speaking the common player-API protocol
/// (`player_api.php?action=get_live_streams`), generating authenticated
/// stream addresses per channel.
pub struct PlayerApiDirectory {
    fetcher: Arc<dyn ContentFetcher>,
    base_url: String,
    username: String,
    password: String,
}

impl PlayerApiDirectory {
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    fn api_url(&self) -> Result<String, ResolverError> {
        let base = UrlUtils::normalize_scheme(&self.base_url);
        let parsed = UrlUtils::parse_and_validate(&base).map_err(|e| ResolverError::InvalidUrl {
            url: UrlUtils::obfuscate_credentials(&self.base_url),
            message: e.to_string(),
        })?;

        let mut url = parsed
            .join("player_api.php")
            .map_err(|e| ResolverError::InvalidUrl {
                url: UrlUtils::obfuscate_credentials(&self.base_url),
                message: e.to_string(),
            })?;
        url.query_pairs_mut()
            .append_pair("username", &self.username)
            .append_pair("password", &self.password)
            .append_pair("action", "get_live_streams");
        Ok(url.to_string())
    }

    fn stream_address(&self, stream_id: &str) -> String {
        let base = UrlUtils::normalize_scheme(&self.base_url);
        let base = base.trim_end_matches('/');
        format!(
            "{base}/live/{}/{}/{stream_id}.m3u8",
            self.username, self.password
        )
    }
}

#[async_trait]
impl DirectoryProvider for PlayerApiDirectory {
    async fn list_channels(&self) -> Result<Vec<DirectoryChannel>, ResolverError> {
        let url = self.api_url()?;
        debug!(
            "Fetching channel directory from {}",
            UrlUtils::obfuscate_credentials(&url)
        );

        let value = self
            .fetcher
            .fetch_json_value(&url)
            .await
            .map_err(|e: ImportError| ResolverError::directory_fetch(e.to_string()))?;

        let streams: Vec<ApiStream> = from_json_value(value, &url)
            .map_err(|e| ResolverError::directory_fetch(e.to_string()))?;

        let channels = streams
            .into_iter()
            .map(|stream| {
                // stream_id arrives as either a number or a string
                // depending on the provider.
                let id = match &stream.stream_id {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                DirectoryChannel {
                    address: self.stream_address(&id),
                    id,
                    name: stream.name,
                }
            })
            .collect();

        Ok(channels)
    }
}

/// TTL-bounded cache around a directory provider. The directory is
/// fetched at most once per TTL window, independent of run boundaries.
pub struct CachedDirectory {
    provider: Arc<dyn DirectoryProvider>,
    ttl: Duration,
    state: Mutex<Option<(Instant, Arc<Vec<DirectoryChannel>>)>>,
}

impl CachedDirectory {
    pub fn new(provider: Arc<dyn DirectoryProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            ttl,
            state: Mutex::new(None),
        }
    }

    pub async fn get(&self) -> Result<Arc<Vec<DirectoryChannel>>, ResolverError> {
        let mut guard = self.state.lock().await;

        if let Some((fetched_at, channels)) = guard.as_ref() {
            if fetched_at.elapsed() < self.ttl {
                debug!("Directory cache hit ({} channels)", channels.len());
                return Ok(Arc::clone(channels));
            }
        }

        let channels = Arc::new(self.provider.list_channels().await?);
        info!("Fetched channel directory: {} channels", channels.len());
        *guard = Some((Instant::now(), Arc::clone(&channels)));
        Ok(channels)
    }
}

/// Strip to lowercase alphanumerics for fuzzy name comparison.
fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

/// Last path segment of an address with any extension removed; this is
/// where token providers put the stream identifier.
fn extract_stream_id(address: &str) -> Option<String> {
    let parsed = UrlUtils::parse_and_validate(address).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let id = segment.split('.').next().unwrap_or(segment);
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

pub struct AddressResolver {
    directory: CachedDirectory,
    token_fragments: Vec<String>,
}

impl AddressResolver {
    pub fn new(directory: CachedDirectory, token_fragments: Vec<String>) -> Self {
        Self {
            directory,
            token_fragments,
        }
    }

    /// Whether this address belongs to a provider known to embed
    /// short-lived session tokens.
    pub fn is_dynamic(&self, address: &str) -> bool {
        self.token_fragments
            .iter()
            .any(|fragment| !fragment.is_empty() && address.contains(fragment))
    }

    /// Resolve a whole run's entries. The directory is fetched once
    /// (cached); per-entry matching is pure in-memory lookup, so this is
    /// O(n) after one network round-trip. A directory fetch failure
    /// degrades the phase to pass-through rather than aborting the run.
    pub async fn resolve_all(&self, entries: Vec<PlaylistEntry>) -> Vec<ResolvedEntry> {
        let needs_resolution = entries.iter().any(|e| self.is_dynamic(&e.address));
        if !needs_resolution {
            return entries
                .into_iter()
                .map(ResolvedEntry::passthrough)
                .collect();
        }

        let directory = match self.directory.get().await {
            Ok(directory) => directory,
            Err(e) => {
                warn!("Directory unavailable, passing addresses through: {e}");
                return entries
                    .into_iter()
                    .map(ResolvedEntry::passthrough)
                    .collect();
            }
        };

        entries
            .into_iter()
            .map(|entry| {
                if self.is_dynamic(&entry.address) {
                    self.resolve_entry(entry, &directory)
                } else {
                    ResolvedEntry::passthrough(entry)
                }
            })
            .collect()
    }

    fn resolve_entry(
        &self,
        entry: PlaylistEntry,
        directory: &[DirectoryChannel],
    ) -> ResolvedEntry {
        if let Some(record) = self.match_record(&entry, directory) {
            debug!(
                "Resolved '{}' to directory channel '{}'",
                entry.name, record.name
            );
            let mut refreshed = entry;
            refreshed.address = record.address.clone();
            return ResolvedEntry {
                entry: refreshed,
                resolution: ResolutionStatus::Resolved,
            };
        }

        debug!("No directory match for '{}'", entry.name);
        ResolvedEntry {
            entry,
            resolution: ResolutionStatus::Failed,
        }
    }

    /// Stream-id containment match first, normalized-name fuzzy match
    /// (containment in either direction) second.
    fn match_record<'a>(
        &self,
        entry: &PlaylistEntry,
        directory: &'a [DirectoryChannel],
    ) -> Option<&'a DirectoryChannel> {
        if let Some(stream_id) = extract_stream_id(&entry.address) {
            if let Some(record) = directory.iter().find(|record| record.id == stream_id) {
                return Some(record);
            }
        }

        let wanted = normalize_name(&entry.name);
        if wanted.is_empty() {
            return None;
        }

        directory.iter().find(|record| {
            let candidate = normalize_name(&record.name);
            !candidate.is_empty() && (candidate.contains(&wanted) || wanted.contains(&candidate))
        })
    }
}
