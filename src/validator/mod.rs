//! Stream liveness validator
//!
//! Judges reachability for up to thousands of addresses without exhausting
//! the caller's time budget or the target servers' patience. Probing runs
//! in fixed-size batches with a jittered pause between them, results are
//! cached with a TTL, trusted CDN addresses short-circuit probing
//! entirely, and every ambiguous outcome resolves toward "assume alive".

pub mod cache;

pub use cache::VerdictCache;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ValidationConfig;
use crate::models::{ValidationVerdict, VerdictClass};

/// Body prefixes that positively identify a live playlist manifest.
const MANIFEST_MARKERS: &[&str] = &["#EXTM3U", "#EXT-X-"];

/// Transport error fragments that unambiguously mean the address is dead.
/// Anything not in this list (including cross-origin style opaque
/// failures) is indistinguishable from a working stream and is assumed
/// alive.
const DEAD_ERROR_MARKERS: &[&str] = &[
    "dns error",
    "failed to lookup address",
    "name or service not known",
    "no such host",
    "connection refused",
    "no route to host",
];

/// Maximum number of body bytes read during a probe. Playlist manifests
/// fit comfortably; media segments would otherwise stream forever.
const PROBE_BODY_LIMIT: usize = 2048;

/// Raw result of one network probe, before classification.
#[derive(Debug, Clone)]
pub enum ProbeOutcome {
    Response { status: u16, body_prefix: String },
    TransportError(String),
}

/// Probe seam: tests inject deterministic outcomes, production uses
/// [`HttpProber`].
#[async_trait]
pub trait AddressProber: Send + Sync {
    async fn probe(&self, address: &str) -> ProbeOutcome;
}

/// reqwest-backed prober with a hard per-probe timeout.
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client }
    }
}

#[async_trait]
impl AddressProber for HttpProber {
    async fn probe(&self, address: &str) -> ProbeOutcome {
        let response = match self.client.get(address).send().await {
            Ok(response) => response,
            Err(e) => return ProbeOutcome::TransportError(e.to_string()),
        };

        let status = response.status().as_u16();

        // Read at most a prefix of the body; errors while reading are not
        // fatal since the status line alone already classifies most cases.
        let mut body_prefix = String::new();
        let mut response = response;
        while body_prefix.len() < PROBE_BODY_LIMIT {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    body_prefix.push_str(&String::from_utf8_lossy(&chunk));
                }
                Ok(None) => break,
                Err(_) => break,
            }
        }

        ProbeOutcome::Response {
            status,
            body_prefix,
        }
    }
}

/// Classify a probe outcome under the lenient policy: false negatives
/// (marking a working stream dead) cost far more than false positives.
pub fn classify_outcome(outcome: &ProbeOutcome) -> (VerdictClass, Option<String>) {
    match outcome {
        ProbeOutcome::Response {
            status,
            body_prefix,
        } => {
            if (200..300).contains(status) {
                if MANIFEST_MARKERS.iter().any(|m| body_prefix.contains(m)) {
                    (VerdictClass::ConfirmedLive, None)
                } else {
                    // 2xx without manifest markers still streams for some
                    // providers; do not punish it.
                    (VerdictClass::AssumedLive, None)
                }
            } else if *status == 404 || *status == 410 {
                (
                    VerdictClass::ConfirmedDead,
                    Some(format!("HTTP {status}")),
                )
            } else {
                // Many working streams answer odd status codes to plain
                // GET probes.
                (VerdictClass::AssumedLive, Some(format!("HTTP {status}")))
            }
        }
        ProbeOutcome::TransportError(message) => {
            let lower = message.to_lowercase();
            if DEAD_ERROR_MARKERS.iter().any(|m| lower.contains(m)) {
                (VerdictClass::ConfirmedDead, Some(message.clone()))
            } else {
                (VerdictClass::AssumedLive, Some(message.clone()))
            }
        }
    }
}

/// Running progress for one validation pass, reported after each batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationProgress {
    pub checked: usize,
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
}

/// Result of one validation pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub verdicts: Vec<ValidationVerdict>,
    pub checked: usize,
    pub valid: usize,
    pub invalid: usize,
    /// True when the pass stopped early because the cancellation token
    /// fired; gathered verdicts are still complete up to that point.
    pub cancelled: bool,
}

pub struct StreamValidator {
    cache: Arc<VerdictCache>,
    prober: Arc<dyn AddressProber>,
    config: ValidationConfig,
}

impl StreamValidator {
    pub fn new(
        cache: Arc<VerdictCache>,
        prober: Arc<dyn AddressProber>,
        config: ValidationConfig,
    ) -> Self {
        Self {
            cache,
            prober,
            config,
        }
    }

    /// Production validator with the default HTTP prober.
    pub fn with_http_prober(cache: Arc<VerdictCache>, config: ValidationConfig) -> Self {
        let prober = Arc::new(HttpProber::new(config.probe_timeout()));
        Self::new(cache, prober, config)
    }

    pub fn cache(&self) -> &Arc<VerdictCache> {
        &self.cache
    }

    fn is_trusted(&self, address: &str) -> bool {
        self.config
            .trusted_patterns
            .iter()
            .any(|pattern| !pattern.is_empty() && address.contains(pattern))
    }

    /// Validate a batch of addresses under the concurrency contract:
    /// fixed-size batches, each awaited in full, a jittered pause between
    /// batches, progress after every batch, and cooperative cancellation
    /// checked before dispatching new work. Results gathered before
    /// cancellation are merged into the cache and returned.
    pub async fn validate_addresses(
        &self,
        addresses: &[String],
        cancel: &CancellationToken,
        mut on_progress: impl FnMut(ValidationProgress),
    ) -> ValidationReport {
        let total = addresses.len();
        let batch_size = self.config.batch_size.max(1);
        let mut report = ValidationReport::default();

        info!(
            "Validating {} addresses in batches of {}",
            total, batch_size
        );

        let mut batches = addresses.chunks(batch_size).peekable();
        while let Some(batch) = batches.next() {
            if cancel.is_cancelled() {
                warn!(
                    "Validation cancelled after {} of {} addresses",
                    report.checked, total
                );
                report.cancelled = true;
                break;
            }

            let mut to_probe: Vec<&String> = Vec::new();

            for address in batch {
                if self.is_trusted(address) {
                    debug!("Trusted address, skipping probe: {address}");
                    self.record(
                        ValidationVerdict::new(address.clone(), VerdictClass::Trusted)
                            .with_latency(0),
                        &mut report,
                    );
                } else if let Some(cached) = self.cache.get(address) {
                    debug!("Cache hit for {address}");
                    self.record_cached(cached, &mut report);
                } else {
                    to_probe.push(address);
                }
            }

            let probed_any = !to_probe.is_empty();
            let probes = to_probe.into_iter().map(|address| async {
                let started = Instant::now();
                let outcome = self.prober.probe(address).await;
                let latency_ms = started.elapsed().as_millis() as u64;
                (address.clone(), outcome, latency_ms)
            });

            for (address, outcome, latency_ms) in join_all(probes).await {
                let (class, detail) = classify_outcome(&outcome);
                let mut verdict = ValidationVerdict::new(address, class).with_latency(latency_ms);
                verdict.error_detail = detail;
                self.cache.insert(verdict.clone());
                self.record(verdict, &mut report);
            }

            on_progress(ValidationProgress {
                checked: report.checked,
                total,
                valid: report.valid,
                invalid: report.invalid,
            });

            // Inter-batch pause to avoid bursty load on shared hosts; only
            // when the batch actually hit the network and more work remains.
            if probed_any && batches.peek().is_some() {
                let pause = self.config.batch_pause();
                let jitter = Duration::from_millis(fastrand::u64(0..=pause.as_millis() as u64 / 2));
                tokio::time::sleep(pause + jitter).await;
            }
        }

        info!(
            "Validation finished: {} checked, {} valid, {} invalid{}",
            report.checked,
            report.valid,
            report.invalid,
            if report.cancelled { " (cancelled)" } else { "" }
        );

        report
    }

    /// Thin single-address client over the batch contract (batch size of
    /// one), for callers judging the health of an individual channel.
    pub async fn validate_one(&self, address: &str) -> ValidationVerdict {
        let addresses = [address.to_string()];
        let cancel = CancellationToken::new();
        let mut report = self.validate_addresses(&addresses, &cancel, |_| {}).await;
        report
            .verdicts
            .pop()
            .unwrap_or_else(|| ValidationVerdict::new(address, VerdictClass::AssumedLive))
    }

    fn record(&self, verdict: ValidationVerdict, report: &mut ValidationReport) {
        report.checked += 1;
        if verdict.is_reachable {
            report.valid += 1;
        } else {
            report.invalid += 1;
        }
        report.verdicts.push(verdict);
    }

    fn record_cached(&self, verdict: ValidationVerdict, report: &mut ValidationReport) {
        // Cached verdicts are reused verbatim: checked_at stays at probe
        // time so TTL expiry keeps its meaning.
        self.record(verdict, report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: u16, body: &str) -> ProbeOutcome {
        ProbeOutcome::Response {
            status,
            body_prefix: body.to_string(),
        }
    }

    #[test]
    fn test_manifest_body_confirms_live() {
        let (class, _) = classify_outcome(&outcome(200, "#EXTM3U\n#EXT-X-VERSION:3"));
        assert_eq!(class, VerdictClass::ConfirmedLive);
    }

    #[test]
    fn test_success_without_markers_is_assumed_live() {
        let (class, _) = classify_outcome(&outcome(200, "<html>hello</html>"));
        assert_eq!(class, VerdictClass::AssumedLive);
    }

    #[test]
    fn test_gone_statuses_confirm_dead() {
        assert_eq!(
            classify_outcome(&outcome(404, "")).0,
            VerdictClass::ConfirmedDead
        );
        assert_eq!(
            classify_outcome(&outcome(410, "")).0,
            VerdictClass::ConfirmedDead
        );
    }

    #[test]
    fn test_odd_statuses_are_assumed_live() {
        for status in [401, 403, 405, 418, 500, 503] {
            assert_eq!(
                classify_outcome(&outcome(status, "")).0,
                VerdictClass::AssumedLive,
                "status {status}"
            );
        }
    }

    #[test]
    fn test_dns_and_refusal_errors_confirm_dead() {
        for message in [
            "error sending request: dns error: failed to lookup address information",
            "tcp connect error: Connection refused (os error 111)",
        ] {
            let (class, detail) =
                classify_outcome(&ProbeOutcome::TransportError(message.to_string()));
            assert_eq!(class, VerdictClass::ConfirmedDead);
            assert!(detail.is_some());
        }
    }

    struct StubProber(ProbeOutcome);

    #[async_trait]
    impl AddressProber for StubProber {
        async fn probe(&self, _address: &str) -> ProbeOutcome {
            self.0.clone()
        }
    }

    #[test]
    fn test_validate_one_judges_a_single_address() {
        let cache = Arc::new(VerdictCache::new(Duration::from_secs(60)));
        let config = ValidationConfig {
            enabled: true,
            batch_size: 6,
            probe_timeout_secs: 8,
            batch_pause_ms: 0,
            cache_ttl_secs: 60,
            trusted_patterns: Vec::new(),
        };
        let validator =
            StreamValidator::new(cache, Arc::new(StubProber(outcome(404, ""))), config);

        let verdict =
            tokio_test::block_on(validator.validate_one("http://gone.example.com/x.m3u8"));
        assert_eq!(verdict.class, VerdictClass::ConfirmedDead);
        assert!(!verdict.is_reachable);
        assert_eq!(verdict.address, "http://gone.example.com/x.m3u8");
    }

    #[test]
    fn test_opaque_transport_errors_are_assumed_live() {
        let (class, _) = classify_outcome(&ProbeOutcome::TransportError(
            "request blocked by intermediary".to_string(),
        ));
        assert_eq!(class, VerdictClass::AssumedLive);
    }
}
