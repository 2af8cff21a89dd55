//! Pure matchmaking queue logic.
//!
//! The queue itself lives in the store, one bucket per time control. This
//! module holds the decisions: which entry a joiner claims, and when a
//! creator's own entry has expired. The store's atomic remove-if-present
//! resolves the race between simultaneous claimers, so the pick here only
//! has to be deterministic.

use gambit_types::QueueEntry;

/// How long a queue entry lives before its creator withdraws it, in
/// milliseconds.
pub const QUEUE_ENTRY_TTL_MS: u64 = 60_000;

/// True once an entry has outlived its deadline.
///
/// Only the entry's own creator sweeps on this, so the comparison never
/// crosses two peers' clocks.
pub fn entry_expired(entry: &QueueEntry, now_ms: u64) -> bool {
    now_ms.saturating_sub(entry.created_at_ms) >= QUEUE_ENTRY_TTL_MS
}

/// Pick the entry a joiner should claim from a bucket.
///
/// Entries arrive in insertion order; the deterministic pick is the first
/// entry that has not expired. Expired entries are skipped rather than
/// claimed - their creators may already have given up waiting.
pub fn claimable(entries: &[QueueEntry], now_ms: u64) -> Option<&QueueEntry> {
    entries.iter().find(|entry| !entry_expired(entry, now_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gambit_types::{SessionId, TimeControl};

    fn entry(id: &str, created_at_ms: u64) -> QueueEntry {
        QueueEntry {
            session_id: SessionId::parse(id).unwrap(),
            time_control: TimeControl::Rapid,
            created_at_ms,
        }
    }

    #[test]
    fn fresh_entry_is_not_expired() {
        let e = entry("AAAA1", 1_000);
        assert!(!entry_expired(&e, 1_000 + QUEUE_ENTRY_TTL_MS - 1));
    }

    #[test]
    fn entry_expires_at_deadline() {
        let e = entry("AAAA1", 1_000);
        assert!(entry_expired(&e, 1_000 + QUEUE_ENTRY_TTL_MS));
        assert!(entry_expired(&e, 1_000 + QUEUE_ENTRY_TTL_MS + 5_000));
    }

    #[test]
    fn clock_regression_does_not_expire() {
        // now earlier than created_at: saturating_sub keeps the entry live.
        let e = entry("AAAA1", 10_000);
        assert!(!entry_expired(&e, 5_000));
    }

    #[test]
    fn claim_picks_lowest_insertion_order() {
        let entries = vec![entry("AAAA1", 100), entry("BBBB2", 200)];
        let picked = claimable(&entries, 500).unwrap();
        assert_eq!(picked.session_id.as_str(), "AAAA1");
    }

    #[test]
    fn claim_skips_expired_entries() {
        let entries = vec![
            entry("AAAA1", 0),
            entry("BBBB2", QUEUE_ENTRY_TTL_MS + 1_000),
        ];
        let now = QUEUE_ENTRY_TTL_MS + 2_000;
        let picked = claimable(&entries, now).unwrap();
        assert_eq!(picked.session_id.as_str(), "BBBB2");
    }

    #[test]
    fn empty_bucket_yields_nothing() {
        assert!(claimable(&[], 1_000).is_none());
    }

    #[test]
    fn all_expired_yields_nothing() {
        let entries = vec![entry("AAAA1", 0), entry("BBBB2", 10)];
        assert!(claimable(&entries, QUEUE_ENTRY_TTL_MS * 2).is_none());
    }
}
