//! Import orchestrator
//!
//! Sequences the pipeline phases strictly forward — fetching, parsing,
//! resolving, filtering, validating, assembly — reporting progress at
//! each boundary and honoring the shared cancellation token before any
//! network-bound work. Only the fetch and parse phases can abort the run;
//! everything downstream shrinks or transforms the entry set and explains
//! itself through the statistics.

use std::collections::{HashMap, HashSet};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::errors::{ImportError, ImportResult};
use crate::filters::{apply_filters, FilterCriteria};
use crate::models::{
    ChannelRecord, ImportOutcome, ImportPhase, ImportProgress, ImportStatistics, ResolutionStatus,
    ResolvedEntry, ValidationVerdict,
};
use crate::parser::parse_playlist;
use crate::resolver::AddressResolver;
use crate::utils::http_client::ContentFetcher;
use crate::utils::stable_id::generate_channel_id;
use crate::utils::url::UrlUtils;
use crate::validator::StreamValidator;

/// Caller-supplied options for one import run.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Addresses the caller already has; exact duplicates are suppressed.
    pub known_addresses: HashSet<String>,
    /// First channel number handed out during assembly.
    pub starting_number: u32,
    pub allowed_countries: Vec<String>,
    pub allowed_languages: Vec<String>,
    /// Hard cap on surviving entries; zero disables it.
    pub max_channels: usize,
    /// When false, validation is skipped and survivors pass through.
    pub validate: bool,
}

pub struct ImportOrchestrator {
    fetcher: std::sync::Arc<dyn ContentFetcher>,
    resolver: Option<AddressResolver>,
    validator: StreamValidator,
}

impl ImportOrchestrator {
    pub fn new(
        fetcher: std::sync::Arc<dyn ContentFetcher>,
        resolver: Option<AddressResolver>,
        validator: StreamValidator,
    ) -> Self {
        Self {
            fetcher,
            resolver,
            validator,
        }
    }

    /// Run one import. Returns a fatal error only for manifest fetch
    /// failures and empty parses; every other condition is encoded in the
    /// returned outcome.
    pub async fn run(
        &self,
        playlist_url: &str,
        options: &ImportOptions,
        cancel: &CancellationToken,
        mut on_progress: impl FnMut(ImportProgress),
    ) -> ImportResult<ImportOutcome> {
        let mut stats = ImportStatistics::default();
        let mut errors: Vec<String> = Vec::new();

        // --- Fetching ---
        if cancel.is_cancelled() {
            return Ok(cancelled_outcome(stats, 0, 0));
        }

        let fetch_url = UrlUtils::rewrite_github_raw(playlist_url);
        UrlUtils::parse_and_validate(&fetch_url)
            .map_err(|e| ImportError::invalid_url(playlist_url, e.to_string()))?;

        on_progress(ImportProgress::new(
            ImportPhase::Fetching,
            0,
            1,
            format!("Fetching playlist from {}", UrlUtils::obfuscate_credentials(&fetch_url)),
        ));
        info!(
            "Fetching playlist: {}",
            UrlUtils::obfuscate_credentials(&fetch_url)
        );

        let content = self.fetcher.fetch_text(&fetch_url).await?;

        // --- Parsing ---
        on_progress(ImportProgress::new(
            ImportPhase::Parsing,
            0,
            1,
            "Parsing playlist",
        ));

        let entries = parse_playlist(&content);
        stats.total_parsed = entries.len();
        if entries.is_empty() {
            return Err(ImportError::NoEntriesFound);
        }
        info!("Parsed {} entries", entries.len());

        // --- Resolving ---
        let total = entries.len();
        on_progress(ImportProgress::new(
            ImportPhase::Resolving,
            0,
            total,
            "Resolving dynamic addresses",
        ));

        let resolved: Vec<ResolvedEntry> = match (&self.resolver, cancel.is_cancelled()) {
            (Some(resolver), false) => resolver.resolve_all(entries).await,
            _ => entries.into_iter().map(ResolvedEntry::passthrough).collect(),
        };
        stats.resolved = resolved
            .iter()
            .filter(|r| r.resolution == ResolutionStatus::Resolved)
            .count();

        // --- Filtering ---
        on_progress(ImportProgress::new(
            ImportPhase::Filtering,
            0,
            resolved.len(),
            "Applying filters",
        ));

        let criteria = FilterCriteria {
            allowed_countries: options.allowed_countries.clone(),
            allowed_languages: options.allowed_languages.clone(),
            known_addresses: options.known_addresses.clone(),
            max_channels: options.max_channels,
        };
        let survivors = apply_filters(resolved, &criteria, &mut stats);

        if survivors.is_empty() {
            warn!(
                "All {} entries removed by filters (country: {}, language: {}, duplicates: {}, cap: {})",
                stats.total_parsed,
                stats.filtered_country,
                stats.filtered_language,
                stats.filtered_duplicate,
                stats.filtered_cap,
            );
            errors.push(format!(
                "Entries were found but none survived filtering \
                 (country: {}, language: {}, duplicates: {}, cap: {})",
                stats.filtered_country,
                stats.filtered_language,
                stats.filtered_duplicate,
                stats.filtered_cap,
            ));
            on_progress(ImportProgress::new(
                ImportPhase::Complete,
                0,
                0,
                "No channels after filtering",
            ));
            return Ok(ImportOutcome {
                channels: Vec::new(),
                statistics: stats,
                errors,
            });
        }

        // --- Validating ---
        let survivors = if options.validate {
            let addresses: Vec<String> = unique_addresses(&survivors);
            let address_total = addresses.len();

            on_progress(ImportProgress::new(
                ImportPhase::Validating,
                0,
                address_total,
                format!("Validating {address_total} addresses"),
            ));

            let report = self
                .validator
                .validate_addresses(&addresses, cancel, |progress| {
                    on_progress(ImportProgress::new(
                        ImportPhase::Validating,
                        progress.checked,
                        progress.total,
                        format!(
                            "Checked {}/{} ({} live, {} dead)",
                            progress.checked, progress.total, progress.valid, progress.invalid
                        ),
                    ));
                })
                .await;

            stats.validated = report.checked;
            stats.valid = report.valid;
            stats.invalid = report.invalid;

            if report.cancelled {
                errors.push(format!(
                    "Import cancelled during validation; {} of {} addresses checked",
                    report.checked, address_total
                ));
            }

            let verdicts: HashMap<&str, &ValidationVerdict> = report
                .verdicts
                .iter()
                .map(|v| (v.address.as_str(), v))
                .collect();

            // Removal, never reordering: unchecked addresses (possible
            // only after cancellation) are excluded alongside dead ones.
            survivors
                .into_iter()
                .filter(|resolved| {
                    verdicts
                        .get(resolved.entry.address.as_str())
                        .is_some_and(|verdict| verdict.is_reachable)
                })
                .collect()
        } else {
            survivors
        };

        // --- Assembly ---
        if survivors.is_empty() {
            errors.push("Entries were found but none survived validation".to_string());
            on_progress(ImportProgress::new(
                ImportPhase::Complete,
                0,
                0,
                "No channels after validation",
            ));
            return Ok(ImportOutcome {
                channels: Vec::new(),
                statistics: stats,
                errors,
            });
        }

        let channels = assemble_channels(&survivors, options.starting_number);
        info!("Import complete: {} channels", channels.len());

        on_progress(ImportProgress::new(
            ImportPhase::Complete,
            channels.len(),
            channels.len(),
            format!("Imported {} channels", channels.len()),
        ));

        Ok(ImportOutcome {
            channels,
            statistics: stats,
            errors,
        })
    }
}

/// Addresses in first-seen order, deduplicated; verdicts are keyed by
/// address, so probing each one once is enough.
fn unique_addresses(survivors: &[ResolvedEntry]) -> Vec<String> {
    let mut seen = HashSet::new();
    survivors
        .iter()
        .filter(|r| seen.insert(r.entry.address.as_str()))
        .map(|r| r.entry.address.clone())
        .collect()
}

/// Final assembly: sequential numbering from the caller's base over the
/// surviving input order, with ids stable for the same (name, address).
fn assemble_channels(survivors: &[ResolvedEntry], starting_number: u32) -> Vec<ChannelRecord> {
    survivors
        .iter()
        .enumerate()
        .map(|(index, resolved)| {
            let entry = &resolved.entry;
            ChannelRecord {
                id: generate_channel_id(&entry.name, &entry.address),
                number: starting_number + index as u32,
                name: entry.name.clone(),
                address: entry.address.clone(),
                category: entry.effective_category().map(|c| c.to_string()),
            }
        })
        .collect()
}

fn cancelled_outcome(stats: ImportStatistics, checked: usize, total: usize) -> ImportOutcome {
    ImportOutcome {
        channels: Vec::new(),
        statistics: stats,
        errors: vec![format!(
            "Import cancelled before completion; {checked} of {total} addresses checked"
        )],
    }
}
