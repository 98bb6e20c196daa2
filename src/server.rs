//! TCP front end.
//!
//! Each accepted socket gets a numeric id and its own task. The task reads
//! newline-terminated lines, hands each one to the dispatcher through a
//! [`Cache`] handle and writes back exactly one reply line per request line.
//! When the peer closes or a socket error occurs, the connection is removed
//! from the dispatcher's client table and dropped; nothing more is written.

use bytes::{Bytes, BytesMut};
use std::future::Future;
use std::net::SocketAddr;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::cache::Cache;
use crate::command::encode_reply;
use crate::config::Config;
use crate::dispatcher::ClientId;
use crate::error::{ServerError, ServerResult};

/// A bound listener plus the dispatcher it feeds.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    cache: Cache,
    max_line_length: usize,
}

impl Server {
    /// Bind the listen address and start the dispatcher.
    ///
    /// Failing to bind is the only fatal error the server has.
    pub async fn bind(config: &Config) -> ServerResult<Self> {
        let listener = TcpListener::bind(&config.listen_addr)
            .await
            .map_err(|e| ServerError::bind(&config.listen_addr, e))?;

        let cache = Cache::spawn(config);
        info!(addr = %listener.local_addr()?, "listening");

        Ok(Self {
            listener,
            cache,
            max_line_length: config.max_line_length,
        })
    }

    /// The address actually bound, useful when the configured port is 0.
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// A handle to the same dispatcher the connections use.
    pub fn cache(&self) -> Cache {
        self.cache.clone()
    }

    /// Accept connections until ctrl-c.
    pub async fn run(self) -> ServerResult<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Accept connections until `shutdown` completes.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> ServerResult<()> {
        tokio::pin!(shutdown);
        let mut last_id: ClientId = 0;

        loop {
            tokio::select! {
                result = self.listener.accept() => match result {
                    Ok((socket, peer)) => {
                        last_id += 1;
                        let id = last_id;
                        let cache = self.cache.clone();
                        let limit = self.max_line_length;
                        tokio::spawn(async move {
                            handle_connection(socket, peer, id, cache, limit).await;
                        });
                    }
                    Err(e) => warn!(error = %e, "failed to accept connection"),
                },
                _ = &mut shutdown => break,
            }
        }

        info!("shutting down");
        if let Ok(stats) = self.cache.stats().await {
            info!(
                keys = stats.size,
                clients = stats.clients,
                commands = stats.commands,
                errors = stats.errors,
                hits = stats.hits,
                misses = stats.misses,
                hit_rate = stats.hit_rate,
                "final stats"
            );
        }
        Ok(())
    }
}

/// Drive one client from accept to close.
async fn handle_connection(
    mut socket: TcpStream,
    peer: SocketAddr,
    id: ClientId,
    cache: Cache,
    limit: usize,
) {
    if cache.connect(id, peer).await.is_err() {
        return;
    }

    let reason = match serve(&mut socket, id, &cache, limit).await {
        Ok(()) => "closed by peer".to_string(),
        Err(e) => {
            debug!(client = id, error = %e, "connection error");
            e.to_string()
        }
    };

    let _ = cache.disconnect(id, reason).await;
}

/// Read lines and write replies until EOF or an error.
///
/// A line longer than `limit` bytes ends the connection once the replies
/// to the lines before it have been written.
async fn serve(
    socket: &mut TcpStream,
    id: ClientId,
    cache: &Cache,
    limit: usize,
) -> ServerResult<()> {
    let mut buf = BytesMut::with_capacity(4096);
    let mut out = BytesMut::with_capacity(1024);
    // Bytes of `buf` already searched for a newline.
    let mut scanned = 0;

    loop {
        let mut overflow = false;
        while let Some(line) = next_line(&mut buf, &mut scanned) {
            if line.len() > limit {
                overflow = true;
                break;
            }
            let reply = cache.execute_for(id, line).await?;
            encode_reply(&reply, &mut out);
        }

        if !out.is_empty() {
            socket.write_all(&out).await?;
            out.clear();
        }

        if overflow || buf.len() > limit {
            return Err(ServerError::LineTooLong { limit });
        }

        // A partial line left in `buf` at EOF is discarded.
        if socket.read_buf(&mut buf).await? == 0 {
            return Ok(());
        }
    }
}

/// Split the next complete line off `buf`, without its `\n` or `\r\n`.
///
/// `scanned` remembers how far a previous call searched, so a long partial
/// line is only scanned once.
fn next_line(buf: &mut BytesMut, scanned: &mut usize) -> Option<Bytes> {
    let Some(offset) = buf[*scanned..].iter().position(|&b| b == b'\n') else {
        *scanned = buf.len();
        return None;
    };
    let end = *scanned + offset;
    *scanned = 0;
    let mut line = buf.split_to(end + 1);
    line.truncate(end);
    if line.last() == Some(&b'\r') {
        line.truncate(end - 1);
    }
    Some(line.freeze())
}
