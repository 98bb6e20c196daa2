//! End-to-end tests over real TCP connections.

use kvline::{Cache, Config, ManualClock, Server};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

async fn start_server(config: Config) -> (SocketAddr, Cache) {
    let config = config.listen_addr("127.0.0.1:0");
    let server = Server::bind(&config).await.expect("bind");
    let addr = server.local_addr().expect("local addr");
    let cache = server.cache();

    tokio::spawn(async move {
        let _ = server.run_until(std::future::pending()).await;
    });

    (addr, cache)
}

struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        let (reader, writer) = stream.into_split();
        Self {
            reader: BufReader::new(reader),
            writer,
        }
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).await.expect("write");
    }

    async fn read_line(&mut self) -> String {
        let mut line = Vec::new();
        self.reader.read_until(b'\n', &mut line).await.expect("read");
        assert_eq!(line.pop(), Some(b'\n'), "reply must end with a newline");
        String::from_utf8(line).expect("utf8 reply")
    }

    async fn cmd(&mut self, line: &str) -> String {
        self.send_raw(format!("{line}\n").as_bytes()).await;
        self.read_line().await
    }
}

async fn wait_for_clients(cache: &Cache, expected: u64) {
    for _ in 0..100 {
        if cache.stats().await.unwrap().clients == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("client table never reached {expected}");
}

#[tokio::test]
async fn test_basic_workflow() {
    let (addr, _) = start_server(Config::new()).await;
    let mut client = Client::connect(addr).await;

    assert_eq!(client.cmd("GET missing").await, "nil");
    assert_eq!(client.cmd("SET key1 value1").await, "value1");
    assert_eq!(client.cmd("get key1").await, "value1");
    assert_eq!(client.cmd("EXISTS key1").await, "true");
    assert_eq!(client.cmd("DEL key1").await, "true");
    assert_eq!(client.cmd("DEL key1").await, "false");
    assert_eq!(client.cmd("EXISTS key1").await, "false");
}

#[tokio::test]
async fn test_quoted_values() {
    let (addr, _) = start_server(Config::new()).await;
    let mut client = Client::connect(addr).await;

    assert_eq!(client.cmd(r#"SET greeting "hello world" 10"#).await, "hello world");
    assert_eq!(client.cmd("GET greeting").await, "hello world");
    assert_eq!(client.cmd("TTL greeting").await, "10");
}

#[tokio::test]
async fn test_errors_keep_connection_open() {
    let (addr, _) = start_server(Config::new()).await;
    let mut client = Client::connect(addr).await;

    assert_eq!(client.cmd("").await, "emptycommand");
    assert_eq!(client.cmd("   ").await, "emptycommand");
    assert_eq!(client.cmd("PING").await, "wrongcommand");
    assert_eq!(client.cmd("SET onlykey").await, "protoerr");
    assert_eq!(client.cmd("SET k v").await, "v");
}

#[tokio::test]
async fn test_strict_keys() {
    let (addr, _) = start_server(Config::new().strict_keys(true)).await;
    let mut client = Client::connect(addr).await;

    assert_eq!(client.cmd("SET 9lives v").await, "invalidkey");
    assert_eq!(client.cmd("SET lives v").await, "v");
}

#[tokio::test]
async fn test_pipelined_lines_answer_in_order() {
    let (addr, _) = start_server(Config::new()).await;
    let mut client = Client::connect(addr).await;

    client.send_raw(b"SET a 1\r\nINCR a\nINCR a 5\nGET a\n").await;
    assert_eq!(client.read_line().await, "1");
    assert_eq!(client.read_line().await, "2");
    assert_eq!(client.read_line().await, "7");
    assert_eq!(client.read_line().await, "7");
}

#[tokio::test]
async fn test_line_split_across_writes() {
    let (addr, _) = start_server(Config::new()).await;
    let mut client = Client::connect(addr).await;

    client.send_raw(b"SET sp").await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.send_raw(b"lit value\n").await;
    assert_eq!(client.read_line().await, "value");
    assert_eq!(client.cmd("GET split").await, "value");
}

#[tokio::test]
async fn test_ttl_scenario() {
    let clock = ManualClock::new(1_700_000_000_000);
    let config = Config::new().clock(Arc::new(clock.clone()));
    let (addr, _) = start_server(config).await;
    let mut client = Client::connect(addr).await;

    assert_eq!(client.cmd("SET a 1").await, "1");
    assert_eq!(client.cmd("INCR a").await, "2");
    assert_eq!(client.cmd("TTL a").await, "-1");
    assert_eq!(client.cmd("SETX a 5").await, "true");
    let remaining = client.cmd("TTL a").await;
    assert!(remaining == "4" || remaining == "5", "unexpected ttl {remaining}");

    clock.advance(Duration::from_secs(6));
    assert_eq!(client.cmd("GET a").await, "nil");
}

#[tokio::test]
async fn test_ttl_expires_in_real_time() {
    let (addr, _) = start_server(Config::new()).await;
    let mut client = Client::connect(addr).await;

    assert_eq!(client.cmd("SET k v 1").await, "v");
    assert_eq!(client.cmd("GET k").await, "v");

    tokio::time::sleep(Duration::from_millis(2_100)).await;

    assert_eq!(client.cmd("GET k").await, "nil");
    assert_eq!(client.cmd("EXISTS k").await, "false");
}

#[tokio::test]
async fn test_add_never_overwrites() {
    let (addr, _) = start_server(Config::new()).await;
    let mut client = Client::connect(addr).await;

    assert_eq!(client.cmd("ADD k original").await, "original");
    assert_eq!(client.cmd("ADD k replacement 30").await, "nil");
    assert_eq!(client.cmd("GET k").await, "original");
    assert_eq!(client.cmd("TTL k").await, "-1");
}

#[tokio::test]
async fn test_touch_and_setx() {
    let clock = ManualClock::new(1_700_000_000_000);
    let (addr, _) = start_server(Config::new().clock(Arc::new(clock.clone()))).await;
    let mut client = Client::connect(addr).await;

    assert_eq!(client.cmd("TOUCH k").await, "false");
    assert_eq!(client.cmd("SETX k 5").await, "false");
    assert_eq!(client.cmd("SET k v 3").await, "v");

    clock.advance(Duration::from_secs(2));
    assert_eq!(client.cmd("TOUCH k").await, "true");
    clock.advance(Duration::from_secs(2));
    assert_eq!(client.cmd("GET k").await, "v");

    assert_eq!(client.cmd("SETX k 0").await, "true");
    clock.advance(Duration::from_secs(3_600));
    assert_eq!(client.cmd("GET k").await, "v");
}

#[tokio::test]
async fn test_concurrent_increments() {
    const CLIENTS: usize = 8;
    const COMMANDS: usize = 200;

    let (addr, _) = start_server(Config::new()).await;

    let handles: Vec<_> = (0..CLIENTS)
        .map(|_| {
            tokio::spawn(async move {
                let mut client = Client::connect(addr).await;
                for _ in 0..COMMANDS {
                    client.cmd("INCR shared").await;
                }
            })
        })
        .collect();

    for handle in handles {
        handle.await.expect("client task panicked");
    }

    let mut client = Client::connect(addr).await;
    assert_eq!(client.cmd("GET shared").await, (CLIENTS * COMMANDS).to_string());
}

#[tokio::test]
async fn test_disconnect_leaves_other_clients_alone() {
    let (addr, cache) = start_server(Config::new()).await;

    let mut staying = Client::connect(addr).await;
    let mut leaving = Client::connect(addr).await;
    assert_eq!(leaving.cmd("SET from leaving").await, "leaving");
    assert_eq!(staying.cmd("GET from").await, "leaving");
    wait_for_clients(&cache, 2).await;

    // Half a line pending at close is dropped with the connection.
    leaving.send_raw(b"SET partial x").await;
    drop(leaving);
    wait_for_clients(&cache, 1).await;

    assert_eq!(staying.cmd("GET from").await, "leaving");
    assert_eq!(staying.cmd("EXISTS partial").await, "false");
}

async fn assert_closed(client: &mut Client) {
    let mut rest = Vec::new();
    let result = tokio::time::timeout(Duration::from_secs(5), client.reader.read_to_end(&mut rest))
        .await
        .expect("connection was not closed");
    // Unread input on the server side may turn the close into a reset.
    assert!(matches!(result, Ok(0) | Err(_)), "unexpected data {rest:?}");
}

#[tokio::test]
async fn test_overlong_lines_close_the_connection() {
    let (addr, cache) = start_server(Config::new().max_line_length(16)).await;

    let mut ok = Client::connect(addr).await;
    assert_eq!(ok.cmd("SET k 0123456789").await, "0123456789");

    let mut partial = Client::connect(addr).await;
    partial.send_raw(&[b'x'; 64]).await;
    assert_closed(&mut partial).await;

    let mut complete = Client::connect(addr).await;
    assert_eq!(complete.cmd("GET k").await, "0123456789");
    let _ = complete.writer.write_all(b"SET k 0123456789abcdef\n").await;
    assert_closed(&mut complete).await;

    wait_for_clients(&cache, 1).await;
    assert_eq!(ok.cmd("GET k").await, "0123456789");
}

#[tokio::test]
async fn test_graceful_shutdown() {
    let config = Config::new().listen_addr("127.0.0.1:0");
    let server = Server::bind(&config).await.unwrap();
    let addr = server.local_addr().unwrap();

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let running = tokio::spawn(server.run_until(async {
        let _ = stop_rx.await;
    }));

    let mut client = Client::connect(addr).await;
    assert_eq!(client.cmd("SET k v").await, "v");

    stop_tx.send(()).unwrap();
    let result = running.await.unwrap();
    assert!(result.is_ok());
}
