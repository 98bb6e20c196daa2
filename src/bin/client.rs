//! Key/value client.
//!
//! This binary sends a single command to a running server and prints the
//! reply line.

use clap::Parser;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
};

use kvline::ClientCli;

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = ClientCli::parse();

    let stream = match TcpStream::connect(&args.host).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to connect to server at {}: {}", args.host, e);
            eprintln!("Make sure the server is running with: cargo run --bin server");
            std::process::exit(1);
        }
    };

    let (reader, mut writer) = stream.into_split();

    let mut line = args.command.to_line();
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;

    let mut reply = Vec::new();
    let n = BufReader::new(reader).read_until(b'\n', &mut reply).await?;
    if n == 0 {
        eprintln!("Server closed the connection without replying");
        std::process::exit(1);
    }

    if reply.last() == Some(&b'\n') {
        reply.pop();
    }

    match reply.as_slice() {
        b"protoerr" | b"wrongcommand" | b"emptycommand" | b"invalidkey" => {
            eprintln!("Error: {}", String::from_utf8_lossy(&reply));
            std::process::exit(1);
        }
        value => println!("{}", String::from_utf8_lossy(value)),
    }

    Ok(())
}
