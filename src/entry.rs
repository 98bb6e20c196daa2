//! Stored record with its TTL bookkeeping.

use bytes::Bytes;

use crate::clock::Timestamp;

/// Largest TTL an entry will hold. Longer TTLs are clamped so the expiry
/// time and the remaining seconds stay representable.
pub const MAX_TTL_SECONDS: u64 = i64::MAX as u64 / 1_000;

/// A single key/value record.
///
/// Each entry tracks:
/// - A monotonic id assigned when the key was first created
/// - The stored value
/// - When the entry was last touched (the base of the TTL countdown)
/// - The TTL in whole seconds, where 0 means the entry never expires
///
/// Entries are owned by the [`Store`](crate::storage::Store); callers only
/// ever see shared references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub(crate) id: u64,
    pub(crate) key: Bytes,
    pub(crate) value: Bytes,
    pub(crate) last_touched_at: Timestamp,
    pub(crate) ttl_seconds: u64,
}

impl Entry {
    pub(crate) fn new(id: u64, key: Bytes, value: Bytes, now: Timestamp) -> Self {
        Self {
            id,
            key,
            value,
            last_touched_at: now,
            ttl_seconds: 0,
        }
    }

    /// When this entry expires, or `None` if it has no TTL.
    pub fn expires_at(&self) -> Option<Timestamp> {
        if self.ttl_seconds == 0 {
            None
        } else {
            Some(
                self.last_touched_at
                    .saturating_add(self.ttl_seconds.saturating_mul(1_000)),
            )
        }
    }

    /// Check if this entry is logically expired at `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        match self.expires_at() {
            Some(expires) => now >= expires,
            None => false,
        }
    }

    /// Whole seconds left before expiry, `-1` when there is no TTL.
    ///
    /// The result can be zero or negative for an entry that has expired but
    /// has not been removed yet.
    pub fn remaining_at(&self, now: Timestamp) -> i64 {
        match self.expires_at() {
            Some(expires) if expires >= now => seconds((expires - now) / 1_000),
            Some(expires) => -seconds((now - expires) / 1_000),
            None => -1,
        }
    }

    pub(crate) fn set_ttl(&mut self, ttl_seconds: u64) {
        self.ttl_seconds = ttl_seconds.min(MAX_TTL_SECONDS);
    }

    pub(crate) fn touch_at(&mut self, now: Timestamp) {
        self.last_touched_at = now;
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn key(&self) -> &Bytes {
        &self.key
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    pub fn last_touched_at(&self) -> Timestamp {
        self.last_touched_at
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }
}

fn seconds(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX)
}
