//! Replay-attack cache.
//!
//! Maps the SHA-256 fingerprint of a verified claim payload to the second
//! at which it expires (`iat + freshness_window`). Admission is a single
//! atomic entry operation: a fingerprint already present with an unexpired
//! bucket is a replay. A housekeeping sweep removes every entry whose
//! expiry has passed.
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("duplicate claims within the freshness window")]
pub struct ReplayRejected;

#[derive(Default)]
#[derive(Debug)]
pub struct ReplayAttackCache {
    entries: DashMap<[u8; 32], i64>,
}

impl ReplayAttackCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits the fingerprint or rejects it as a replay, atomically. An
    /// expired leftover entry is overwritten rather than rejected.
    pub fn admit(&self, fingerprint: [u8; 32], expiry: i64, now: i64) -> Result<(), ReplayRejected> {
        match self.entries.entry(fingerprint) {
            Entry::Occupied(mut occupied) => {
                if *occupied.get() > now {
                    return Err(ReplayRejected);
                }
                occupied.insert(expiry);
                Ok(())
            }
            Entry::Vacant(vacant) => {
                vacant.insert(expiry);
                Ok(())
            }
        }
    }

    /// Removes every entry with `expiry <= now`.
    pub fn sweep(&self, now: i64) {
        self.entries.retain(|_, expiry| *expiry > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: i64 = 60;
    const NOW: i64 = 1_577_836_800;

    #[test]
    fn second_admit_within_window_is_rejected() {
        let cache = ReplayAttackCache::new();
        let fingerprint = [7u8; 32];
        cache.admit(fingerprint, NOW + WINDOW, NOW).expect("first admit");
        assert!(cache.admit(fingerprint, NOW + WINDOW, NOW + 1).is_err());
    }

    #[test]
    fn fingerprint_is_admissible_again_after_sweeping_past_expiry() {
        let cache = ReplayAttackCache::new();
        let fingerprint = [7u8; 32];
        cache.admit(fingerprint, NOW + WINDOW, NOW).expect("first admit");

        // One sweep per second; at expiry the entry is evicted.
        for second in NOW..=NOW + WINDOW {
            cache.sweep(second);
        }
        assert!(cache.is_empty());
        cache
            .admit(fingerprint, NOW + 2 * WINDOW + 1, NOW + WINDOW + 1)
            .expect("admissible after window");
    }

    #[test]
    fn expired_leftover_entry_is_overwritten_without_a_sweep() {
        let cache = ReplayAttackCache::new();
        let fingerprint = [9u8; 32];
        cache.admit(fingerprint, NOW + WINDOW, NOW).expect("first admit");
        // Well past expiry, no sweep has run yet.
        cache
            .admit(fingerprint, NOW + 3 * WINDOW, NOW + 2 * WINDOW)
            .expect("expired entry is not a replay");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_fingerprints_do_not_interfere() {
        let cache = ReplayAttackCache::new();
        cache.admit([1u8; 32], NOW + WINDOW, NOW).expect("first");
        cache.admit([2u8; 32], NOW + WINDOW, NOW).expect("second");
        assert_eq!(cache.len(), 2);
    }
}
