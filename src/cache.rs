//! The main cache interface.
//!
//! [`Cache`] is a cheap, cloneable handle to a running dispatcher task.
//! Every clone feeds the same FIFO queue, so operations from any number of
//! tasks are applied one at a time in the order they were queued.

use bytes::Bytes;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::config::Config;
use crate::dispatcher::{ClientId, Dispatcher, Request};
use crate::error::{Reply, ServerError, ServerResult};
use crate::stats::StatsSnapshot;

/// Handle to the dispatcher that owns the key/value store.
///
/// # Example
/// ```
/// use kvline::{Cache, Config};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), kvline::ServerError> {
/// let cache = Cache::spawn(&Config::default());
///
/// let reply = cache.execute("SET greeting \"hello world\"").await?;
/// assert_eq!(reply.unwrap(), "hello world");
///
/// let reply = cache.execute("GET greeting").await?;
/// assert_eq!(reply.unwrap(), "hello world");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Cache {
    tx: mpsc::Sender<Request>,
}

impl Cache {
    /// Start a dispatcher (and, if configured, the sweeper) on the current
    /// Tokio runtime.
    ///
    /// The dispatcher stops once every `Cache` handle has been dropped.
    pub fn spawn(config: &Config) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        tokio::spawn(Dispatcher::new(config).run(rx));

        if let Some(interval) = config.sweep_interval {
            spawn_sweeper(tx.downgrade(), interval);
        }

        Self { tx }
    }

    /// Run one protocol line and return its reply.
    ///
    /// The outer `Result` fails only if the dispatcher is gone; protocol
    /// errors are carried in the inner [`Reply`].
    pub async fn execute(&self, line: impl Into<Bytes>) -> ServerResult<Reply> {
        self.submit(None, line.into()).await
    }

    /// Ask the dispatcher to run a sweep now.
    pub async fn sweep(&self) -> ServerResult<()> {
        self.send(Request::Sweep).await
    }

    /// Get a snapshot of the server statistics.
    pub async fn stats(&self) -> ServerResult<StatsSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Stats { reply }).await?;
        rx.await.map_err(|_| ServerError::DispatcherClosed)
    }

    pub(crate) async fn execute_for(&self, client: ClientId, line: Bytes) -> ServerResult<Reply> {
        self.submit(Some(client), line).await
    }

    pub(crate) async fn connect(&self, id: ClientId, peer: SocketAddr) -> ServerResult<()> {
        self.send(Request::Connect { id, peer }).await
    }

    pub(crate) async fn disconnect(&self, id: ClientId, reason: String) -> ServerResult<()> {
        self.send(Request::Disconnect { id, reason }).await
    }

    async fn submit(&self, client: Option<ClientId>, line: Bytes) -> ServerResult<Reply> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Execute {
            client,
            line,
            reply,
        })
        .await?;
        rx.await.map_err(|_| ServerError::DispatcherClosed)
    }

    async fn send(&self, request: Request) -> ServerResult<()> {
        self.tx
            .send(request)
            .await
            .map_err(|_| ServerError::DispatcherClosed)
    }
}

/// Spawns a task that queues a sweep every `interval`.
///
/// The task holds only a weak sender so it never keeps the dispatcher
/// alive on its own; it exits once the last `Cache` handle is dropped.
fn spawn_sweeper(tx: mpsc::WeakSender<Request>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(?interval, "sweeper started");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let Some(tx) = tx.upgrade() else { break };
            if tx.send(Request::Sweep).await.is_err() {
                break;
            }
        }

        debug!("sweeper stopped");
    })
}
