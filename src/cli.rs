//! Command-line interface definitions.
//!
//! This module defines the CLI structure for the server and client binaries
//! using clap.

use clap::{Parser, Subcommand};

use crate::config::DEFAULT_LISTEN_ADDR;

/// Key/value server with per-key TTL.
#[derive(Parser, Debug)]
#[command(name = "kvline-server")]
#[command(author, version, about, long_about = None)]
pub struct ServerCli {
    /// Address to listen on.
    #[arg(long, default_value = DEFAULT_LISTEN_ADDR)]
    pub host: String,

    /// Reject keys that do not start with a letter.
    #[arg(long)]
    pub strict_keys: bool,
}

/// Key/value client.
///
/// Sends one command to a running server and prints the reply.
///
/// Errors travel as plain reply lines, so a stored value that reads
/// `protoerr`, `wrongcommand`, `emptycommand` or `invalidkey` is reported as
/// that error. Keys and values cannot contain a double quote.
#[derive(Parser, Debug)]
#[command(name = "kvline-client")]
#[command(author, version, about, long_about = None)]
pub struct ClientCli {
    /// Server address.
    #[arg(long, default_value = "127.0.0.1:1234")]
    pub host: String,

    /// The command to execute.
    #[command(subcommand)]
    pub command: ClientCommand,
}

/// Available client commands.
#[derive(Subcommand, Debug)]
pub enum ClientCommand {
    /// Get a value by key. Prints `nil` if the key is absent.
    Get {
        #[arg(value_parser = plain_arg)]
        key: String,
    },

    /// Set a value, optionally with a TTL in seconds.
    Set {
        #[arg(value_parser = plain_arg)]
        key: String,
        #[arg(value_parser = plain_arg)]
        value: String,
        ttl: Option<i64>,
    },

    /// Delete a key.
    Del {
        #[arg(value_parser = plain_arg)]
        key: String,
    },

    /// Check whether a key exists.
    Exists {
        #[arg(value_parser = plain_arg)]
        key: String,
    },

    /// Set a value only if the key does not exist yet.
    Add {
        #[arg(value_parser = plain_arg)]
        key: String,
        #[arg(value_parser = plain_arg)]
        value: String,
        ttl: Option<i64>,
    },

    /// Increment an integer value.
    Incr {
        #[arg(value_parser = plain_arg)]
        key: String,
        delta: Option<i64>,
    },

    /// Decrement an integer value.
    Decr {
        #[arg(value_parser = plain_arg)]
        key: String,
        delta: Option<i64>,
    },

    /// Show the remaining TTL of a key.
    Ttl {
        #[arg(value_parser = plain_arg)]
        key: String,
    },

    /// Change the TTL of an existing key.
    Setx {
        #[arg(value_parser = plain_arg)]
        key: String,
        ttl: i64,
    },

    /// Refresh the last-touched time of a key.
    Touch {
        #[arg(value_parser = plain_arg)]
        key: String,
    },
}

impl ClientCommand {
    /// Render this command as one protocol line, without the newline.
    pub fn to_line(&self) -> String {
        let (name, args): (&str, Vec<String>) = match self {
            ClientCommand::Get { key } => ("GET", vec![key.clone()]),
            ClientCommand::Set { key, value, ttl } => ("SET", with_opt(vec![key.clone(), value.clone()], ttl)),
            ClientCommand::Del { key } => ("DEL", vec![key.clone()]),
            ClientCommand::Exists { key } => ("EXISTS", vec![key.clone()]),
            ClientCommand::Add { key, value, ttl } => ("ADD", with_opt(vec![key.clone(), value.clone()], ttl)),
            ClientCommand::Incr { key, delta } => ("INCR", with_opt(vec![key.clone()], delta)),
            ClientCommand::Decr { key, delta } => ("DECR", with_opt(vec![key.clone()], delta)),
            ClientCommand::Ttl { key } => ("TTL", vec![key.clone()]),
            ClientCommand::Setx { key, ttl } => ("SETX", vec![key.clone(), ttl.to_string()]),
            ClientCommand::Touch { key } => ("TOUCH", vec![key.clone()]),
        };

        let mut line = name.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(&quote(&arg));
        }
        line
    }
}

fn with_opt(mut args: Vec<String>, extra: &Option<i64>) -> Vec<String> {
    if let Some(extra) = extra {
        args.push(extra.to_string());
    }
    args
}

/// Accept a key or value only if it survives quoting unchanged.
fn plain_arg(arg: &str) -> Result<String, String> {
    if arg.contains('"') {
        Err("double quotes cannot be sent over the protocol".to_string())
    } else {
        Ok(arg.to_string())
    }
}

/// Wrap an argument in double quotes if it is empty or contains whitespace.
fn quote(arg: &str) -> String {
    if arg.is_empty() || arg.chars().any(char::is_whitespace) {
        format!("\"{arg}\"")
    } else {
        arg.to_string()
    }
}
