//! Tokenizer for protocol lines.
//!
//! A line is split on whitespace. A double quote toggles quoting: whitespace
//! inside quotes is kept verbatim and the quote characters themselves are
//! dropped. A closing quote always ends the current token, so `""` yields an
//! empty token. An unterminated quote runs to the end of the line.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::CommandError;

const QUOTE: u8 = b'"';

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

/// Split `line` into tokens.
///
/// # Example
/// ```
/// use kvline::parse::tokenize;
///
/// let tokens = tokenize(br#"SET greeting "hello world" 10"#);
/// assert_eq!(tokens, vec!["SET", "greeting", "hello world", "10"]);
/// ```
pub fn tokenize(line: &[u8]) -> Vec<Bytes> {
    let mut tokens = Vec::new();
    let mut word = BytesMut::new();
    let mut quoted = false;

    for &b in line {
        match b {
            QUOTE if quoted => {
                quoted = false;
                tokens.push(word.split().freeze());
            }
            QUOTE => quoted = true,
            b if is_space(b) && !quoted => {
                if !word.is_empty() {
                    tokens.push(word.split().freeze());
                }
            }
            other => word.put_u8(other),
        }
    }

    if quoted || !word.is_empty() {
        tokens.push(word.freeze());
    }
    tokens
}

/// Tokenize a line, rejecting one with no tokens at all.
pub fn parse_line(line: &[u8]) -> Result<Vec<Bytes>, CommandError> {
    let tokens = tokenize(line);
    if tokens.is_empty() {
        return Err(CommandError::EmptyCommand);
    }
    Ok(tokens)
}

/// Read a signed decimal integer argument. Anything unparseable is 0.
pub fn parse_int(raw: &[u8]) -> i64 {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}
