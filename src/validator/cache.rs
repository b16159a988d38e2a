//! Process-wide verdict cache with read-time TTL filtering
//!
//! The cache outlives individual import runs. It is append/overwrite only;
//! staleness is judged when a verdict is read, never at write time, so an
//! expired verdict simply behaves as absent and triggers a re-probe.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;

use crate::models::ValidationVerdict;

pub struct VerdictCache {
    inner: Mutex<HashMap<String, ValidationVerdict>>,
    ttl: Duration,
}

impl VerdictCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Fresh verdict for an address, or `None` when absent or older than
    /// the TTL. A verdict checked exactly TTL ago is already stale.
    pub fn get(&self, address: &str) -> Option<ValidationVerdict> {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::zero());
        let guard = self.inner.lock().expect("verdict cache poisoned");
        guard
            .get(address)
            .filter(|verdict| Utc::now() - verdict.checked_at < ttl)
            .cloned()
    }

    pub fn insert(&self, verdict: ValidationVerdict) {
        let mut guard = self.inner.lock().expect("verdict cache poisoned");
        guard.insert(verdict.address.clone(), verdict);
    }

    pub fn insert_all(&self, verdicts: impl IntoIterator<Item = ValidationVerdict>) {
        let mut guard = self.inner.lock().expect("verdict cache poisoned");
        for verdict in verdicts {
            guard.insert(verdict.address.clone(), verdict);
        }
    }

    pub fn clear(&self) {
        self.inner.lock().expect("verdict cache poisoned").clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("verdict cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current contents, stale entries included. Callers that
    /// mirror the cache to durable storage use this.
    pub fn snapshot(&self) -> Vec<ValidationVerdict> {
        let guard = self.inner.lock().expect("verdict cache poisoned");
        guard.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VerdictClass;

    #[test]
    fn test_fresh_verdict_is_returned() {
        let cache = VerdictCache::new(Duration::from_secs(60));
        cache.insert(ValidationVerdict::new("http://a/1", VerdictClass::ConfirmedLive));

        let hit = cache.get("http://a/1").expect("fresh verdict");
        assert_eq!(hit.class, VerdictClass::ConfirmedLive);
    }

    #[test]
    fn test_stale_verdict_is_treated_as_absent() {
        let cache = VerdictCache::new(Duration::from_secs(60));
        let mut verdict = ValidationVerdict::new("http://a/1", VerdictClass::ConfirmedLive);
        verdict.checked_at = Utc::now() - chrono::Duration::seconds(61);
        cache.insert(verdict);

        assert!(cache.get("http://a/1").is_none());
        // The entry itself is not evicted; staleness is a read-time filter.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_verdict_at_exact_ttl_is_stale() {
        let cache = VerdictCache::new(Duration::from_secs(60));
        let mut verdict = ValidationVerdict::new("http://a/1", VerdictClass::ConfirmedLive);
        verdict.checked_at = Utc::now() - chrono::Duration::seconds(60);
        cache.insert(verdict);

        assert!(cache.get("http://a/1").is_none());
    }

    #[test]
    fn test_overwrite_replaces_verdict() {
        let cache = VerdictCache::new(Duration::from_secs(60));
        cache.insert(ValidationVerdict::new("http://a/1", VerdictClass::ConfirmedDead));
        cache.insert(ValidationVerdict::new("http://a/1", VerdictClass::ConfirmedLive));

        assert_eq!(cache.len(), 1);
        assert!(cache.get("http://a/1").unwrap().is_reachable);
    }

    #[test]
    fn test_clear() {
        let cache = VerdictCache::new(Duration::from_secs(60));
        cache.insert(ValidationVerdict::new("http://a/1", VerdictClass::AssumedLive));
        cache.clear();
        assert!(cache.is_empty());
    }
}
