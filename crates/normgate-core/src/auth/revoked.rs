//! In-memory revoked-token set.
//!
//! Process-lifetime only; tolerated loss on restart because tokens carry a
//! short expiry. Reads vastly outnumber writes, which suits a sharded
//! concurrent map.

use dashmap::DashMap;

/// Concurrent set of revoked token ids (`jti`), each with the token's
/// embedded expiry so stale entries can be pruned.
#[derive(Debug, Default)]
pub struct RevokedTokens {
    entries: DashMap<String, u64>,
}

impl RevokedTokens {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Revoke a token id until its expiry.
    pub fn revoke(&self, jti: &str, exp: u64) {
        self.entries.insert(jti.to_string(), exp);
    }

    /// Membership test consulted on every authenticated request.
    pub fn is_revoked(&self, jti: &str) -> bool {
        self.entries.contains_key(jti)
    }

    /// Drop entries whose embedded expiry has passed; returns how many were
    /// removed.
    pub fn prune_expired(&self, now: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, exp| *exp > now);
        before - self.entries.len()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revoke_and_check() {
        let set = RevokedTokens::new();
        assert!(!set.is_revoked("j-1"));
        set.revoke("j-1", 100);
        assert!(set.is_revoked("j-1"));
        assert!(!set.is_revoked("j-2"));
    }

    #[test]
    fn test_prune_expired_only_drops_stale() {
        let set = RevokedTokens::new();
        set.revoke("old", 100);
        set.revoke("new", 10_000);
        assert_eq!(set.prune_expired(5_000), 1);
        assert!(!set.is_revoked("old"));
        assert!(set.is_revoked("new"));
    }

    #[test]
    fn test_concurrent_revocation() {
        use std::sync::Arc;
        let set = Arc::new(RevokedTokens::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let set = Arc::clone(&set);
                std::thread::spawn(move || {
                    for j in 0..100 {
                        set.revoke(&format!("jti-{i}-{j}"), 1_000);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(set.len(), 800);
    }
}
