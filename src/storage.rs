//! The cache engine.
//!
//! [`Store`] maps keys to [`Entry`] records and keeps a secondary expiry
//! schedule bucketed by absolute second. TTLs are enforced twice: lazily on
//! every read, and proactively by [`Store::sweep`], which only visits the
//! buckets that have come due.
//!
//! The store has no interior locking. It is owned by exactly one task (the
//! dispatcher) and every method takes `&mut self`.

use bytes::Bytes;
use indexmap::IndexSet;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::clock::{Clock, SystemClock, Timestamp};
use crate::entry::Entry;
use crate::parse::parse_int;
use crate::stats::CacheStats;

/// Keys whose expiry falls within the same second.
type Bucket = IndexSet<Bytes>;

#[derive(Debug)]
pub struct Store {
    entries: HashMap<Bytes, Entry>,

    /// Expiry second (rounded up) -> keys scheduled to expire then.
    /// Each entry with a TTL sits in exactly one bucket, the one matching
    /// its current expiry.
    schedule: BTreeMap<u64, Bucket>,

    /// Id of the most recently created entry.
    last_id: u64,

    clock: Arc<dyn Clock>,
    stats: CacheStats,
}

impl Store {
    /// Create an empty store reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            schedule: BTreeMap::new(),
            last_id: 0,
            clock,
            stats: CacheStats::new(),
        }
    }

    /// The store's notion of the current time.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Whether a live entry exists for `key`.
    pub fn exists(&mut self, key: &[u8]) -> bool {
        let now = self.now();
        self.purge_expired(key, now)
    }

    /// Look up a live entry.
    ///
    /// An expired entry is deleted and reported as absent. The touch time is
    /// left alone.
    pub fn get(&mut self, key: &[u8]) -> Option<&Entry> {
        let now = self.now();
        if self.purge_expired(key, now) {
            self.stats.record_hit();
            self.entries.get(key)
        } else {
            self.stats.record_miss();
            None
        }
    }

    /// Create or overwrite `key`.
    ///
    /// The touch time is always refreshed. A positive `ttl_seconds` replaces
    /// the entry's TTL; zero keeps whatever TTL the entry already had.
    pub fn set(&mut self, key: Bytes, value: Bytes, ttl_seconds: u64) -> &Entry {
        let now = self.now();
        self.purge_expired(&key, now);
        self.upsert(key, value, ttl_seconds, now)
    }

    /// Remove `key`. Returns whether a live entry was removed.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        let now = self.now();
        if !self.purge_expired(key, now) {
            return false;
        }
        if let Some(entry) = self.entries.remove(key) {
            Self::unschedule(&mut self.schedule, &entry);
        }
        self.stats.record_delete();
        true
    }

    /// Replace the TTL of an existing entry and refresh its touch time.
    ///
    /// A TTL of zero makes the entry permanent. Returns `false` if the key
    /// is absent.
    pub fn set_ttl(&mut self, key: &[u8], ttl_seconds: u64) -> bool {
        let now = self.now();
        if !self.purge_expired(key, now) {
            return false;
        }
        match self.entries.get_mut(key) {
            Some(entry) => {
                Self::unschedule(&mut self.schedule, entry);
                entry.set_ttl(ttl_seconds);
                entry.touch_at(now);
                Self::schedule_key(&mut self.schedule, entry);
                true
            }
            None => false,
        }
    }

    /// Remaining TTL in whole seconds.
    ///
    /// `-1` means the key has no TTL, `0` means the key is absent.
    pub fn get_ttl(&mut self, key: &[u8]) -> i64 {
        let now = self.now();
        if !self.purge_expired(key, now) {
            return 0;
        }
        self.entries
            .get(key)
            .map(|entry| entry.remaining_at(now))
            .unwrap_or(0)
    }

    /// Refresh the touch time of an existing entry without changing its
    /// value or TTL. Returns `false` if the key is absent.
    pub fn touch(&mut self, key: &[u8]) -> bool {
        let now = self.now();
        if !self.purge_expired(key, now) {
            return false;
        }
        match self.entries.get_mut(key) {
            Some(entry) => {
                Self::unschedule(&mut self.schedule, entry);
                entry.touch_at(now);
                Self::schedule_key(&mut self.schedule, entry);
                true
            }
            None => false,
        }
    }

    /// Add `delta` to the integer stored at `key`.
    ///
    /// A missing key starts at `"0"` with no TTL. A value that does not
    /// parse as an integer counts as 0. The sum saturates at the `i64`
    /// bounds and is stored back as decimal text.
    pub fn incr(&mut self, key: Bytes, delta: i64) -> &Entry {
        let now = self.now();
        self.purge_expired(&key, now);
        let current = self
            .entries
            .get(&key)
            .map(|entry| parse_int(&entry.value))
            .unwrap_or(0);
        let value = Bytes::from(current.saturating_add(delta).to_string());
        self.upsert(key, value, 0, now)
    }

    /// Subtract `delta` from the integer stored at `key`.
    pub fn decr(&mut self, key: Bytes, delta: i64) -> &Entry {
        self.incr(key, delta.saturating_neg())
    }

    /// Remove every scheduled key that is still expired at `now`.
    ///
    /// All buckets due at or before `now` are dropped from the schedule
    /// whatever happens to their keys; a key that turns out to be live is
    /// filed under its current expiry. Returns the number of entries removed.
    pub fn sweep(&mut self, now: Timestamp) -> usize {
        let cutoff = (now / 1_000).saturating_add(1);
        let pending = self.schedule.split_off(&cutoff);
        let due = std::mem::replace(&mut self.schedule, pending);

        let mut removed = 0;
        for key in due.into_values().flatten() {
            let expired = match self.entries.get(&key) {
                Some(entry) => entry.is_expired_at(now),
                None => continue,
            };
            if expired {
                self.entries.remove(&key);
                removed += 1;
            } else if let Some(entry) = self.entries.get(&key) {
                Self::schedule_key(&mut self.schedule, entry);
            }
        }

        self.stats.record_swept(removed);
        removed
    }

    /// Number of entries held, including expired ones not yet removed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of expiry buckets still waiting for a sweep.
    pub fn pending_buckets(&self) -> usize {
        self.schedule.len()
    }

    /// Number of keys across all expiry buckets.
    pub fn scheduled_keys(&self) -> usize {
        self.schedule.values().map(IndexSet::len).sum()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Drop `key` if its entry is expired. Returns whether a live entry
    /// remains.
    fn purge_expired(&mut self, key: &[u8], now: Timestamp) -> bool {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired_at(now),
            None => return false,
        };
        if expired {
            if let Some(entry) = self.entries.remove(key) {
                Self::unschedule(&mut self.schedule, &entry);
            }
            self.stats.record_lazy_expiration();
        }
        !expired
    }

    fn upsert(&mut self, key: Bytes, value: Bytes, ttl_seconds: u64, now: Timestamp) -> &Entry {
        let last_id = &mut self.last_id;
        let entry = self.entries.entry(key).or_insert_with_key(|key| {
            *last_id += 1;
            Entry::new(*last_id, key.clone(), Bytes::new(), now)
        });

        Self::unschedule(&mut self.schedule, entry);
        entry.value = value;
        entry.touch_at(now);
        if ttl_seconds > 0 {
            entry.set_ttl(ttl_seconds);
        }
        Self::schedule_key(&mut self.schedule, entry);
        self.stats.record_set();
        entry
    }

    fn schedule_key(schedule: &mut BTreeMap<u64, Bucket>, entry: &Entry) {
        if let Some(expires_at) = entry.expires_at() {
            schedule
                .entry(bucket_second(expires_at))
                .or_default()
                .insert(entry.key.clone());
        }
    }

    /// Take `entry` out of the bucket for its current expiry. Must run
    /// before the touch time or TTL changes.
    fn unschedule(schedule: &mut BTreeMap<u64, Bucket>, entry: &Entry) {
        let Some(expires_at) = entry.expires_at() else {
            return;
        };
        let second = bucket_second(expires_at);
        if let Some(bucket) = schedule.get_mut(&second) {
            bucket.swap_remove(&entry.key);
            if bucket.is_empty() {
                schedule.remove(&second);
            }
        }
    }
}

/// Expiry time rounded up to a whole second.
fn bucket_second(expires_at: Timestamp) -> u64 {
    expires_at / 1_000 + u64::from(expires_at % 1_000 != 0)
}

impl Default for Store {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}
