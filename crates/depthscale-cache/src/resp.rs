//! Minimal RESP2 codec.
//!
//! # Wire format
//!
//! ```text
//! Client → Server (array of bulk strings):
//!   *3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n
//!
//! Server → Client:
//!   +OK\r\n                 simple string
//!   -ERR message\r\n        error
//!   :42\r\n                 integer
//!   $5\r\nhello\r\n         bulk string ($-1\r\n is nil)
//!   *2\r\n...               array (*-1\r\n is nil)
//! ```

use crate::error::{CacheError, CacheResult};

/// A decoded RESP value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Vec<u8>>),
    Array(Option<Vec<Reply>>),
}

/// Encode a command as a RESP array of bulk strings.
pub fn encode_command(args: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + args.iter().map(|a| a.len() + 16).sum::<usize>());
    out.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        out.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
    out
}

/// Try to decode one reply from the front of `buf`.
///
/// Returns `Ok(None)` when more bytes are needed, otherwise the reply and
/// the number of bytes it occupied.
pub fn parse_reply(buf: &[u8]) -> CacheResult<Option<(Reply, usize)>> {
    let Some((line, mut pos)) = read_line(buf, 0)? else {
        return Ok(None);
    };
    let (&tag, body) = line
        .split_first()
        .ok_or_else(|| CacheError::Protocol("empty reply line".to_string()))?;

    let reply = match tag {
        b'+' => Reply::Simple(utf8(body)?),
        b'-' => Reply::Error(utf8(body)?),
        b':' => Reply::Integer(parse_int(body)?),
        b'$' => {
            let len = parse_int(body)?;
            if len < 0 {
                Reply::Bulk(None)
            } else {
                let len = len as usize;
                let end = pos
                    .checked_add(len)
                    .and_then(|n| n.checked_add(2))
                    .ok_or_else(|| CacheError::Protocol(format!("bulk length {len} out of range")))?;
                if buf.len() < end {
                    return Ok(None);
                }
                if &buf[pos + len..pos + len + 2] != b"\r\n" {
                    return Err(CacheError::Protocol("bulk string missing terminator".to_string()));
                }
                let data = buf[pos..pos + len].to_vec();
                pos += len + 2;
                Reply::Bulk(Some(data))
            }
        }
        b'*' => {
            let len = parse_int(body)?;
            if len < 0 {
                Reply::Array(None)
            } else {
                // The element count comes from the server; cap the up-front allocation.
                let mut items = Vec::with_capacity((len as usize).min(64));
                for _ in 0..len {
                    match parse_reply(&buf[pos..])? {
                        Some((item, used)) => {
                            items.push(item);
                            pos += used;
                        }
                        None => return Ok(None),
                    }
                }
                Reply::Array(Some(items))
            }
        }
        other => {
            return Err(CacheError::Protocol(format!(
                "unexpected reply type byte 0x{other:02x}"
            )));
        }
    };

    Ok(Some((reply, pos)))
}

/// Find the `\r\n`-terminated line starting at `start`.
fn read_line(buf: &[u8], start: usize) -> CacheResult<Option<(&[u8], usize)>> {
    let rest = &buf[start..];
    match rest.windows(2).position(|w| w == b"\r\n") {
        Some(end) => Ok(Some((&rest[..end], start + end + 2))),
        None => Ok(None),
    }
}

fn utf8(bytes: &[u8]) -> CacheResult<String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| CacheError::Protocol(e.to_string()))
}

fn parse_int(bytes: &[u8]) -> CacheResult<i64> {
    utf8(bytes)?
        .parse::<i64>()
        .map_err(|e| CacheError::Protocol(format!("bad integer: {e}")))
}
