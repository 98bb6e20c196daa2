//! Operation counters for the cache engine and dispatcher.
//!
//! Only the dispatcher task touches these counters, so they are plain
//! integers rather than atomics. Use `Cache::stats()` to get a snapshot.

/// Counters kept by the [`Store`](crate::storage::Store).
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    /// Reads that found a live entry.
    hits: u64,

    /// Reads that found nothing (absent or expired).
    misses: u64,

    /// Entries removed because a read found them expired.
    lazy_expirations: u64,

    /// Entries removed by the proactive sweep.
    swept: u64,

    /// Total number of set operations performed.
    sets: u64,

    /// Explicit deletes that removed an entry.
    deletes: u64,
}

impl CacheStats {
    /// Create a new stats instance with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_lazy_expiration(&mut self) {
        self.lazy_expirations += 1;
    }

    pub fn record_swept(&mut self, count: usize) {
        self.swept += count as u64;
    }

    pub fn record_set(&mut self) {
        self.sets += 1;
    }

    pub fn record_delete(&mut self) {
        self.deletes += 1;
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn lazy_expirations(&self) -> u64 {
        self.lazy_expirations
    }

    pub fn swept(&self) -> u64 {
        self.swept
    }

    pub fn sets(&self) -> u64 {
        self.sets
    }

    pub fn deletes(&self) -> u64 {
        self.deletes
    }

    /// Calculate the hit rate as a percentage (0.0 to 100.0).
    /// Returns 0.0 if no reads have been performed.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }

    /// Create a snapshot with the engine's current size.
    ///
    /// Dispatcher-level fields (`clients`, `commands`, `errors`) start at
    /// zero and are filled in by the caller.
    pub fn snapshot(&self, size: usize) -> StatsSnapshot {
        StatsSnapshot {
            size: size as u64,
            hits: self.hits,
            misses: self.misses,
            lazy_expirations: self.lazy_expirations,
            swept: self.swept,
            sets: self.sets,
            deletes: self.deletes,
            hit_rate: self.hit_rate(),
            clients: 0,
            commands: 0,
            errors: 0,
        }
    }
}

/// A point-in-time snapshot of server statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsSnapshot {
    pub size: u64,
    pub hits: u64,
    pub misses: u64,
    pub lazy_expirations: u64,
    pub swept: u64,
    pub sets: u64,
    pub deletes: u64,
    pub hit_rate: f64,
    /// Connections currently in the live client table.
    pub clients: u64,
    /// Command lines executed.
    pub commands: u64,
    /// Command lines that produced a protocol error.
    pub errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_stats() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits(), 0);
        assert_eq!(stats.misses(), 0);
        assert_eq!(stats.swept(), 0);
    }

    #[test]
    fn test_hit_rate() {
        let mut stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);

        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();

        assert!((stats.hit_rate() - 75.0).abs() < 0.01);
    }

    #[test]
    fn test_snapshot() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_set();
        stats.record_swept(3);
        stats.record_lazy_expiration();

        let snapshot = stats.snapshot(7);
        assert_eq!(snapshot.size, 7);
        assert_eq!(snapshot.hits, 1);
        assert_eq!(snapshot.sets, 1);
        assert_eq!(snapshot.swept, 3);
        assert_eq!(snapshot.lazy_expirations, 1);
        assert_eq!(snapshot.clients, 0);
    }
}
