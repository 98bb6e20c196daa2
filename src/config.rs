//! Configuration for the key/value server.
//!
//! This module provides a builder pattern for the listen address, the
//! proactive sweep interval, the dispatcher queue bound, key validation and
//! the clock used for TTL bookkeeping.

use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};

/// Address used when none is given.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:1234";

/// Longest request line accepted by default, newline excluded.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 64 * 1024;

/// Configuration for a server and its dispatcher.
///
/// Use the builder pattern to construct configuration:
///
/// ```
/// use kvline::Config;
/// use std::time::Duration;
///
/// let config = Config::new()
///     .listen_addr("127.0.0.1:6400")
///     .sweep_interval(Duration::from_millis(500))
///     .build();
///
/// assert_eq!(config.get_listen_addr(), "127.0.0.1:6400");
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// `host:port` the TCP listener binds to.
    pub(crate) listen_addr: String,

    /// Interval between proactive expiry sweeps.
    /// `None` disables the sweeper (lazy expiration only).
    pub(crate) sweep_interval: Option<Duration>,

    /// Bound of the dispatcher's inbound queue.
    pub(crate) queue_capacity: usize,

    /// Reject keys that do not start with an ASCII letter.
    pub(crate) strict_keys: bool,

    /// Longest request line a connection may send before it is closed.
    pub(crate) max_line_length: usize,

    /// Time source for TTL bookkeeping.
    pub(crate) clock: Arc<dyn Clock>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            sweep_interval: Some(Duration::from_secs(1)),
            queue_capacity: 1024,
            strict_keys: false,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            clock: Arc::new(SystemClock),
        }
    }
}

impl Config {
    /// Create a new configuration builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the `host:port` to listen on.
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }

    /// Set the interval for the proactive expiry sweep.
    ///
    /// `Duration::ZERO` disables the sweeper; expired entries are then only
    /// removed when read.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = if interval.is_zero() {
            None
        } else {
            Some(interval)
        };
        self
    }

    /// Set the bound of the dispatcher queue. Zero is raised to 1.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Enable or disable key validation.
    pub fn strict_keys(mut self, enabled: bool) -> Self {
        self.strict_keys = enabled;
        self
    }

    /// Set the longest request line, in bytes. Zero is raised to 1.
    pub fn max_line_length(mut self, length: usize) -> Self {
        self.max_line_length = length.max(1);
        self
    }

    /// Replace the clock used for TTLs.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the final configuration.
    pub fn build(self) -> Self {
        self
    }

    pub fn get_listen_addr(&self) -> &str {
        &self.listen_addr
    }

    pub fn get_sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval
    }
}
