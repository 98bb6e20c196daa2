//! Command interpreter for the line protocol.
//!
//! The first token of a line names the command and is looked up
//! case-insensitively in a static table. Each command checks its own
//! argument count and then runs a plain handler function against the
//! [`Store`].

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CommandError, Reply};
use crate::parse::{parse_int, parse_line};
use crate::storage::Store;

const NIL: Bytes = Bytes::from_static(b"nil");
const TRUE: Bytes = Bytes::from_static(b"true");
const FALSE: Bytes = Bytes::from_static(b"false");

/// Commands supported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `GET key`
    Get,
    /// `SET key value [ttl]`
    Set,
    /// `DEL key`
    Del,
    /// `EXISTS key`
    Exists,
    /// `ADD key value [ttl]`, a SET that never overwrites.
    Add,
    /// `INCR key [delta]`
    Incr,
    /// `DECR key [delta]`
    Decr,
    /// `TTL key`
    Ttl,
    /// `SETX key ttl`
    Setx,
    /// `TOUCH key`
    Touch,
}

type Handler = fn(&mut Store, &[Bytes]) -> Reply;

const COMMANDS: [(&str, Command); 10] = [
    ("get", Command::Get),
    ("set", Command::Set),
    ("del", Command::Del),
    ("exists", Command::Exists),
    ("add", Command::Add),
    ("incr", Command::Incr),
    ("decr", Command::Decr),
    ("ttl", Command::Ttl),
    ("setx", Command::Setx),
    ("touch", Command::Touch),
];

impl Command {
    /// Find a command by name, ignoring ASCII case.
    pub fn lookup(name: &[u8]) -> Option<Command> {
        COMMANDS
            .iter()
            .find(|(known, _)| known.as_bytes().eq_ignore_ascii_case(name))
            .map(|&(_, command)| command)
    }

    /// Find a command by name, or fail with `WrongCommand`.
    pub fn parse(name: &[u8]) -> Result<Command, CommandError> {
        Self::lookup(name).ok_or(CommandError::WrongCommand)
    }

    /// Get the string representation of this command.
    pub fn as_str(&self) -> &'static str {
        COMMANDS
            .iter()
            .find(|(_, command)| command == self)
            .map(|&(name, _)| name)
            .unwrap_or("unknown")
    }

    /// Number of arguments required after the command name.
    pub fn min_args(&self) -> usize {
        match self {
            Command::Set | Command::Add | Command::Setx => 2,
            _ => 1,
        }
    }

    fn handler(self) -> Handler {
        match self {
            Command::Get => get,
            Command::Set => set,
            Command::Del => del,
            Command::Exists => exists,
            Command::Add => add,
            Command::Incr => incr,
            Command::Decr => decr,
            Command::Ttl => ttl,
            Command::Setx => setx,
            Command::Touch => touch,
        }
    }

    /// Run this command with `args` (the tokens after the name).
    pub fn execute(self, store: &mut Store, args: &[Bytes]) -> Reply {
        if args.len() < self.min_args() {
            return Err(CommandError::Protocol);
        }
        (self.handler())(store, args)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Turns raw protocol lines into store operations.
#[derive(Debug, Clone, Copy, Default)]
pub struct Interpreter {
    strict_keys: bool,
}

impl Interpreter {
    /// With `strict_keys`, every key must start with an ASCII letter.
    pub fn new(strict_keys: bool) -> Self {
        Self { strict_keys }
    }

    /// Tokenize, look up and execute one line.
    pub fn run(&self, store: &mut Store, line: &[u8]) -> Reply {
        let tokens = parse_line(line)?;
        let command = Command::parse(&tokens[0])?;
        let args = &tokens[1..];

        if self.strict_keys && args.len() >= command.min_args() && !valid_key(&args[0]) {
            return Err(CommandError::InvalidKey);
        }
        command.execute(store, args)
    }
}

fn valid_key(key: &[u8]) -> bool {
    key.first().is_some_and(u8::is_ascii_alphabetic)
}

/// Append the wire form of `reply` to `dst`: the value bytes or the error
/// literal, then a newline.
pub fn encode_reply(reply: &Reply, dst: &mut BytesMut) {
    match reply {
        Ok(value) => dst.put_slice(value),
        Err(err) => dst.put_slice(err.to_string().as_bytes()),
    }
    dst.put_u8(b'\n');
}

fn flag(value: bool) -> Bytes {
    if value {
        TRUE
    } else {
        FALSE
    }
}

/// Optional TTL argument. Missing or negative means "no new TTL"; the store
/// clamps anything above `MAX_TTL_SECONDS`.
fn ttl_arg(raw: Option<&Bytes>) -> u64 {
    raw.map(|raw| parse_int(raw).max(0) as u64).unwrap_or(0)
}

/// Optional INCR/DECR delta. Missing or non-positive means 1.
fn delta_arg(raw: Option<&Bytes>) -> i64 {
    match raw.map(|raw| parse_int(raw)) {
        Some(delta) if delta > 0 => delta,
        _ => 1,
    }
}

fn get(store: &mut Store, args: &[Bytes]) -> Reply {
    Ok(store
        .get(&args[0])
        .map(|entry| entry.value().clone())
        .unwrap_or(NIL))
}

fn set(store: &mut Store, args: &[Bytes]) -> Reply {
    let ttl = ttl_arg(args.get(2));
    store.set(args[0].clone(), args[1].clone(), ttl);
    Ok(args[1].clone())
}

fn del(store: &mut Store, args: &[Bytes]) -> Reply {
    Ok(flag(store.delete(&args[0])))
}

fn exists(store: &mut Store, args: &[Bytes]) -> Reply {
    Ok(flag(store.exists(&args[0])))
}

fn add(store: &mut Store, args: &[Bytes]) -> Reply {
    if store.exists(&args[0]) {
        return Ok(NIL);
    }
    set(store, args)
}

fn incr(store: &mut Store, args: &[Bytes]) -> Reply {
    store.incr(args[0].clone(), delta_arg(args.get(1)));
    get(store, args)
}

fn decr(store: &mut Store, args: &[Bytes]) -> Reply {
    store.decr(args[0].clone(), delta_arg(args.get(1)));
    get(store, args)
}

fn ttl(store: &mut Store, args: &[Bytes]) -> Reply {
    if !store.exists(&args[0]) {
        return Ok(NIL);
    }
    Ok(Bytes::from(store.get_ttl(&args[0]).to_string()))
}

fn setx(store: &mut Store, args: &[Bytes]) -> Reply {
    let ttl = parse_int(&args[1]);
    if ttl < 0 {
        return Ok(FALSE);
    }
    Ok(flag(store.set_ttl(&args[0], ttl as u64)))
}

fn touch(store: &mut Store, args: &[Bytes]) -> Reply {
    Ok(flag(store.touch(&args[0])))
}
