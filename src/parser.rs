// ABOUTME: Push-based RESP reply decoder — explicit stack so partial arrays resume across chunks
// ABOUTME: StackParser is the one shipped ReplyParser implementation; see DESIGN.md for why

use crate::error::RedisError;
use crate::value::Value;
use bytes::{Buf, Bytes, BytesMut};

/// A capability seam for decoding the reply stream. One implementation
/// ships (`StackParser`); the trait stays public so an alternate decoding
/// strategy can be registered under a different name later without
/// breaking callers. See DESIGN.md's `src/parser.rs` entry.
pub trait ReplyParser: Send {
    /// Feeds newly-read bytes into the parser. Returns every complete reply
    /// that could be decoded from the accumulated buffer, in arrival order.
    /// A malformed frame is reported via `RedisError::Protocol` and is
    /// always fatal — the caller must tear down the connection.
    fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Value>, RedisError>;
}

/// One level of an in-progress array: how many elements remain and the
/// elements decoded so far. Nested arrays push a new frame; completing an
/// array pops its frame and folds the finished `Value::Array` into its
/// parent (or yields it as a top-level reply when the stack is empty).
struct ParseFrame {
    remaining: usize,
    items: Vec<Value>,
}

/// Which wire shape is being decoded at the head of `buf`. `Bulk` carries
/// the expected payload length once the `$len\r\n` header line has been
/// read, so a payload split across reads doesn't force a re-parse of the
/// header.
enum Pending {
    None,
    Bulk { expected_len: i64 },
}

pub struct StackParser {
    buf: BytesMut,
    stack: Vec<ParseFrame>,
    pending: Pending,
}

impl Default for StackParser {
    fn default() -> Self {
        StackParser::new()
    }
}

impl StackParser {
    pub fn new() -> Self {
        StackParser {
            buf: BytesMut::new(),
            stack: Vec::new(),
            pending: Pending::None,
        }
    }

    /// Pulls one `\r\n`-terminated line out of `buf` without consuming it,
    /// returning `None` if the terminator hasn't arrived yet.
    fn take_line(&mut self) -> Option<Bytes> {
        let pos = self
            .buf
            .windows(2)
            .position(|w| w == b"\r\n")?;
        let line = self.buf.split_to(pos).freeze();
        self.buf.advance(2);
        Some(line)
    }

    /// Attempts to decode exactly one `Value` (which may itself be a nested
    /// array) starting at the front of `buf`. Returns `Ok(None)` when more
    /// bytes are needed.
    fn try_decode_one(&mut self) -> Result<Option<Value>, RedisError> {
        if let Pending::Bulk { expected_len } = self.pending {
            let len = expected_len as usize;
            if self.buf.len() < len + 2 {
                return Ok(None);
            }
            let payload = self.buf.split_to(len).freeze();
            self.buf.advance(2);
            self.pending = Pending::None;
            return Ok(Some(Value::Bulk(Some(payload))));
        }

        let Some(line) = self.take_line() else {
            return Ok(None);
        };
        if line.is_empty() {
            return Err(RedisError::Protocol("empty reply line".into()));
        }
        let prefix = line[0];
        let rest = &line[1..];

        match prefix {
            b'+' => Ok(Some(Value::SimpleString(decode_utf8(rest)?))),
            b'-' => Ok(Some(Value::Error(decode_utf8(rest)?))),
            b':' => Ok(Some(Value::Integer(decode_i64(rest)?))),
            b'$' => {
                let len = decode_i64(rest)?;
                if len < 0 {
                    return Ok(Some(Value::Bulk(None)));
                }
                self.pending = Pending::Bulk { expected_len: len };
                self.try_decode_one()
            }
            b'*' => {
                let len = decode_i64(rest)?;
                if len < 0 {
                    return Ok(Some(Value::Array(None)));
                }
                if len == 0 {
                    return Ok(Some(Value::Array(Some(Vec::new()))));
                }
                self.stack.push(ParseFrame {
                    remaining: len as usize,
                    items: Vec::with_capacity(len as usize),
                });
                Ok(None)
            }
            other => Err(RedisError::Protocol(format!(
                "unrecognized reply prefix {:?}",
                other as char
            ))),
        }
    }

    /// Folds one fully-decoded `Value` into the array frame at the top of
    /// the stack, popping and recursing when that completes the frame.
    /// Returns the value as a top-level reply once the stack is empty.
    fn fold(&mut self, value: Value) -> Option<Value> {
        match self.stack.last_mut() {
            None => Some(value),
            Some(frame) => {
                frame.items.push(value);
                if frame.items.len() == frame.remaining {
                    let frame = self.stack.pop().unwrap();
                    self.fold(Value::Array(Some(frame.items)))
                } else {
                    None
                }
            }
        }
    }
}

impl ReplyParser for StackParser {
    fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Value>, RedisError> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();
        loop {
            match self.try_decode_one()? {
                Some(value) => {
                    if let Some(complete) = self.fold(value) {
                        out.push(complete);
                    }
                }
                None => break,
            }
        }
        Ok(out)
    }
}

fn decode_utf8(bytes: &[u8]) -> Result<String, RedisError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| RedisError::Protocol("non-utf8 reply line".into()))
}

fn decode_i64(bytes: &[u8]) -> Result<i64, RedisError> {
    decode_utf8(bytes)?
        .parse()
        .map_err(|_| RedisError::Protocol("malformed integer in reply".into()))
}
