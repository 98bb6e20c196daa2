//! # kvline
//!
//! An in-memory key/value store served over a line-oriented TCP protocol,
//! with per-key time-to-live.
//!
//! ## Features
//!
//! - **Text protocol**: one command per line, double quotes for arguments
//!   containing whitespace, one reply line per request
//! - **TTL support**: expired entries are never served (lazy expiry) and are
//!   reclaimed in the background by a sweep bucketed per second
//! - **Serialized access**: a single dispatcher task owns the store, so
//!   commands from any number of clients are applied one at a time
//! - **Zero unsafe code**: Built entirely with safe Rust
//!
//! ## Commands
//!
//! `GET`, `SET`, `DEL`, `EXISTS`, `ADD`, `INCR`, `DECR`, `TTL`, `SETX` and
//! `TOUCH`, matched case-insensitively.
//!
//! ## Quick Start
//!
//! ```no_run
//! use kvline::{Config, Server};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), kvline::ServerError> {
//! let config = Config::new().listen_addr("127.0.0.1:1234").build();
//! let server = Server::bind(&config).await?;
//! server.run().await
//! # }
//! ```
//!
//! The store can also be driven in-process through a [`Cache`] handle:
//!
//! ```
//! use kvline::{Cache, Config};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), kvline::ServerError> {
//! let cache = Cache::spawn(&Config::default());
//! cache.execute("SET hits 10").await?.unwrap();
//! let reply = cache.execute("INCR hits 5").await?;
//! assert_eq!(reply.unwrap(), "15");
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod cli;
pub mod clock;
pub mod command;
pub mod config;
pub mod entry;
pub mod error;
pub mod parse;
pub mod server;
pub mod stats;
pub mod storage;

pub(crate) mod dispatcher;

pub use cache::Cache;
pub use cli::{ClientCli, ClientCommand, ServerCli};
pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use command::{Command, Interpreter};
pub use config::Config;
pub use dispatcher::ClientId;
pub use entry::Entry;
pub use error::{CommandError, Reply, ServerError, ServerResult};
pub use server::Server;
pub use stats::{CacheStats, StatsSnapshot};
pub use storage::Store;
