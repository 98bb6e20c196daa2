//! The single owner of the cache engine.
//!
//! Connection tasks, the sweeper and [`Cache`](crate::Cache) handles never
//! touch the [`Store`] directly. They queue a [`Request`] and the dispatcher
//! task applies requests one at a time in arrival order, so no two commands
//! ever interleave and the store needs no locking of its own.

use bytes::Bytes;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::command::Interpreter;
use crate::config::Config;
use crate::error::Reply;
use crate::stats::StatsSnapshot;
use crate::storage::Store;

/// Identifier assigned to each accepted connection, starting at 1.
pub type ClientId = u64;

/// Work sent to the dispatcher.
#[derive(Debug)]
pub(crate) enum Request {
    /// A connection was accepted and is now active.
    Connect { id: ClientId, peer: SocketAddr },
    /// A connection has closed.
    Disconnect { id: ClientId, reason: String },
    /// Run one protocol line. `client` is `None` for library callers.
    Execute {
        client: Option<ClientId>,
        line: Bytes,
        reply: oneshot::Sender<Reply>,
    },
    /// Evict whatever the expiry schedule says is due.
    Sweep,
    Stats {
        reply: oneshot::Sender<StatsSnapshot>,
    },
}

#[derive(Debug)]
struct ClientInfo {
    peer: SocketAddr,
    connected_at: Instant,
}

#[derive(Debug)]
pub(crate) struct Dispatcher {
    store: Store,
    interpreter: Interpreter,
    /// Live client table.
    clients: HashMap<ClientId, ClientInfo>,
    commands: u64,
    errors: u64,
}

impl Dispatcher {
    pub(crate) fn new(config: &Config) -> Self {
        Self {
            store: Store::new(config.clock.clone()),
            interpreter: Interpreter::new(config.strict_keys),
            clients: HashMap::new(),
            commands: 0,
            errors: 0,
        }
    }

    /// Process requests until every sender is gone.
    pub(crate) async fn run(mut self, mut rx: mpsc::Receiver<Request>) {
        debug!("dispatcher started");

        while let Some(request) = rx.recv().await {
            self.handle(request);
        }

        let stats = self.stats();
        info!(
            keys = stats.size,
            commands = stats.commands,
            "dispatcher stopped"
        );
    }

    fn handle(&mut self, request: Request) {
        match request {
            Request::Connect { id, peer } => {
                self.clients.insert(
                    id,
                    ClientInfo {
                        peer,
                        connected_at: Instant::now(),
                    },
                );
                info!(client = id, %peer, clients = self.clients.len(), "client connected");
            }
            Request::Disconnect { id, reason } => {
                if let Some(client) = self.clients.remove(&id) {
                    info!(
                        client = id,
                        peer = %client.peer,
                        connected_for = ?client.connected_at.elapsed(),
                        %reason,
                        "client disconnected"
                    );
                }
            }
            Request::Execute {
                client,
                line,
                reply,
            } => {
                debug!(client, line = %String::from_utf8_lossy(&line), "command");
                let result = self.execute(&line);
                // The connection may be gone; its reply is simply dropped.
                let _ = reply.send(result);
            }
            Request::Sweep => {
                let now = self.store.now();
                let removed = self.store.sweep(now);
                if removed > 0 {
                    info!(removed, remaining = self.store.len(), "swept expired keys");
                } else {
                    debug!("sweep found nothing to remove");
                }
            }
            Request::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
        }
    }

    fn execute(&mut self, line: &[u8]) -> Reply {
        self.commands += 1;
        let result = self.interpreter.run(&mut self.store, line);
        if let Err(err) = &result {
            self.errors += 1;
            debug!(error = %err, "command rejected");
        }
        result
    }

    fn stats(&self) -> StatsSnapshot {
        let mut snapshot = self.store.stats().snapshot(self.store.len());
        snapshot.clients = self.clients.len() as u64;
        snapshot.commands = self.commands;
        snapshot.errors = self.errors;
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::CommandError;
    use std::sync::Arc;
    use std::time::Duration;

    fn dispatcher(clock: &ManualClock) -> Dispatcher {
        Dispatcher::new(&Config::new().clock(Arc::new(clock.clone())).build())
    }

    fn execute(d: &mut Dispatcher, line: &str) -> Reply {
        let (reply, mut rx) = oneshot::channel();
        d.handle(Request::Execute {
            client: Some(1),
            line: Bytes::copy_from_slice(line.as_bytes()),
            reply,
        });
        rx.try_recv().unwrap()
    }

    #[test]
    fn test_client_table() {
        let clock = ManualClock::new(0);
        let mut d = dispatcher(&clock);
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        d.handle(Request::Connect { id: 1, peer });
        d.handle(Request::Connect { id: 2, peer });
        assert_eq!(d.stats().clients, 2);

        d.handle(Request::Disconnect {
            id: 1,
            reason: "closed by peer".into(),
        });
        // Unknown ids are ignored.
        d.handle(Request::Disconnect {
            id: 9,
            reason: "closed by peer".into(),
        });
        assert_eq!(d.stats().clients, 1);
    }

    #[test]
    fn test_execute_counts_commands_and_errors() {
        let clock = ManualClock::new(0);
        let mut d = dispatcher(&clock);

        assert_eq!(execute(&mut d, "SET k v"), Ok(Bytes::from_static(b"v")));
        assert_eq!(execute(&mut d, "NOPE"), Err(CommandError::WrongCommand));

        let stats = d.stats();
        assert_eq!(stats.commands, 2);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_reply_to_closed_connection_is_dropped() {
        let clock = ManualClock::new(0);
        let mut d = dispatcher(&clock);
        let (reply, rx) = oneshot::channel();
        drop(rx);

        d.handle(Request::Execute {
            client: Some(1),
            line: Bytes::from_static(b"SET k v"),
            reply,
        });
        assert_eq!(execute(&mut d, "GET k"), Ok(Bytes::from_static(b"v")));
    }

    #[test]
    fn test_sweep_request() {
        let clock = ManualClock::new(1_700_000_000_000);
        let mut d = dispatcher(&clock);

        execute(&mut d, "SET k v 1").unwrap();
        clock.advance(Duration::from_secs(2));
        d.handle(Request::Sweep);

        let stats = d.stats();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.swept, 1);
    }
}
