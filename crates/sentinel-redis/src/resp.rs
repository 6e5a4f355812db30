//! RESP2 reply decoding and command encoding.
//!
//! The decoder is incremental: `decode` returns `Ok(None)` until the
//! buffer holds a complete value, then advances the buffer past it.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Deepest array nesting accepted from a peer.
const MAX_DEPTH: usize = 32;

/// A decoded server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// `+OK\r\n`
    Simple(String),
    /// `-ERR message\r\n`
    Error(String),
    /// `:1\r\n`
    Integer(i64),
    /// `$5\r\nhello\r\n`
    Bulk(Bytes),
    /// `$-1\r\n` or `*-1\r\n`
    Null,
    /// `*2\r\n...`
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Text content of a simple, bulk, or integer reply.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Simple(s) => Some(s.clone()),
            Self::Bulk(b) => Some(String::from_utf8_lossy(b).into_owned()),
            Self::Integer(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RespError {
    #[error("invalid {0}")]
    Invalid(&'static str),

    #[error("unknown reply type byte {0:#04x}")]
    UnknownType(u8),
}

/// Decode one complete value from the front of `buf`.
pub fn decode(buf: &mut BytesMut) -> Result<Option<RespValue>, RespError> {
    match parse_value(buf, 0)? {
        Some((value, consumed)) => {
            buf.advance(consumed);
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

/// Encode a command as an array of bulk strings.
pub fn encode_command(args: &[&str]) -> BytesMut {
    let mut out = BytesMut::with_capacity(16 + args.iter().map(|a| a.len() + 16).sum::<usize>());
    out.put_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        out.put_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.put_slice(arg.as_bytes());
        out.put_slice(b"\r\n");
    }
    out
}

fn parse_value(buf: &[u8], depth: usize) -> Result<Option<(RespValue, usize)>, RespError> {
    let Some(&kind) = buf.first() else {
        return Ok(None);
    };
    match kind {
        b'+' => Ok(parse_line(buf).map(|(s, n)| (RespValue::Simple(s), n))),
        b'-' => Ok(parse_line(buf).map(|(s, n)| (RespValue::Error(s), n))),
        b':' => match parse_length(buf, "integer")? {
            Some((n, consumed)) => Ok(Some((RespValue::Integer(n), consumed))),
            None => Ok(None),
        },
        b'$' => parse_bulk(buf),
        b'*' => parse_array(buf, depth),
        other => Err(RespError::UnknownType(other)),
    }
}

/// Find `\r\n`, returning the position of `\r`.
fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn parse_line(buf: &[u8]) -> Option<(String, usize)> {
    let pos = find_crlf(buf)?;
    let line = String::from_utf8_lossy(&buf[1..pos]).into_owned();
    Some((line, pos + 2))
}

fn parse_length(buf: &[u8], what: &'static str) -> Result<Option<(i64, usize)>, RespError> {
    let Some(pos) = find_crlf(buf) else {
        return Ok(None);
    };
    let n = std::str::from_utf8(&buf[1..pos])
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(RespError::Invalid(what))?;
    Ok(Some((n, pos + 2)))
}

fn parse_bulk(buf: &[u8]) -> Result<Option<(RespValue, usize)>, RespError> {
    let Some((len, header)) = parse_length(buf, "bulk length")? else {
        return Ok(None);
    };
    if len == -1 {
        return Ok(Some((RespValue::Null, header)));
    }
    let len = usize::try_from(len).map_err(|_| RespError::Invalid("bulk length"))?;

    let end = header + len;
    if buf.len() < end + 2 {
        return Ok(None);
    }
    if &buf[end..end + 2] != b"\r\n" {
        return Err(RespError::Invalid("bulk terminator"));
    }
    Ok(Some((
        RespValue::Bulk(Bytes::copy_from_slice(&buf[header..end])),
        end + 2,
    )))
}

fn parse_array(buf: &[u8], depth: usize) -> Result<Option<(RespValue, usize)>, RespError> {
    if depth >= MAX_DEPTH {
        return Err(RespError::Invalid("nesting"));
    }
    let Some((len, header)) = parse_length(buf, "array length")? else {
        return Ok(None);
    };
    if len == -1 {
        return Ok(Some((RespValue::Null, header)));
    }
    let len = usize::try_from(len).map_err(|_| RespError::Invalid("array length"))?;

    let mut items = Vec::with_capacity(len.min(1024));
    let mut offset = header;
    for _ in 0..len {
        match parse_value(&buf[offset..], depth + 1)? {
            Some((value, consumed)) => {
                items.push(value);
                offset += consumed;
            }
            None => return Ok(None),
        }
    }
    Ok(Some((RespValue::Array(items), offset)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_command() {
        let out = encode_command(&["SENTINEL", "sentinels", "mymaster"]);
        assert_eq!(
            &out[..],
            b"*3\r\n$8\r\nSENTINEL\r\n$9\r\nsentinels\r\n$8\r\nmymaster\r\n"
        );
    }

    #[test]
    fn decodes_scalars() {
        let mut buf = BytesMut::from("+PONG\r\n-ERR boom\r\n:3\r\n$-1\r\n");
        assert_eq!(decode(&mut buf).unwrap(), Some(RespValue::Simple("PONG".into())));
        assert_eq!(decode(&mut buf).unwrap(), Some(RespValue::Error("ERR boom".into())));
        assert_eq!(decode(&mut buf).unwrap(), Some(RespValue::Integer(3)));
        assert_eq!(decode(&mut buf).unwrap(), Some(RespValue::Null));
        assert!(buf.is_empty());
    }

    #[test]
    fn decodes_subscribe_push() {
        let mut buf = BytesMut::from("*3\r\n$9\r\nsubscribe\r\n$14\r\n+switch-master\r\n:1\r\n");
        let value = decode(&mut buf).unwrap().unwrap();
        assert_eq!(
            value,
            RespValue::Array(vec![
                RespValue::Bulk(Bytes::from_static(b"subscribe")),
                RespValue::Bulk(Bytes::from_static(b"+switch-master")),
                RespValue::Integer(1),
            ])
        );
    }

    #[test]
    fn waits_for_incomplete_values() {
        let mut buf = BytesMut::from("*2\r\n$4\r\nname\r\n$3\r\nmy");
        assert_eq!(decode(&mut buf).unwrap(), None);
        assert_eq!(buf.len(), 20);

        buf.extend_from_slice(b"m\r\n");
        assert!(matches!(decode(&mut buf).unwrap(), Some(RespValue::Array(_))));
        assert!(buf.is_empty());
    }

    #[test]
    fn bulk_may_contain_crlf() {
        let mut buf = BytesMut::from("$4\r\na\r\nb\r\n");
        assert_eq!(
            decode(&mut buf).unwrap(),
            Some(RespValue::Bulk(Bytes::from_static(b"a\r\nb")))
        );
    }

    #[test]
    fn rejects_deep_nesting() {
        let mut buf = BytesMut::from("*1\r\n".repeat(100_000).as_str());
        assert_eq!(decode(&mut buf), Err(RespError::Invalid("nesting")));

        let mut nested = "*1\r\n".repeat(MAX_DEPTH - 1);
        nested.push_str("*0\r\n");
        let mut buf = BytesMut::from(nested.as_str());
        assert!(decode(&mut buf).unwrap().is_some());
        assert!(buf.is_empty());
    }

    #[test]
    fn rejects_garbage() {
        let mut buf = BytesMut::from("?what\r\n");
        assert_eq!(decode(&mut buf), Err(RespError::UnknownType(b'?')));

        let mut buf = BytesMut::from("$x\r\n");
        assert_eq!(decode(&mut buf), Err(RespError::Invalid("bulk length")));
    }
}
