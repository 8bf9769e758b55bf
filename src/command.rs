// ABOUTME: The Command record submitted to the engine and its one-shot completion handle
// ABOUTME: Arg distinguishes plain text arguments from raw byte arguments for buffer_args encoding

use crate::error::RedisError;
use crate::value::Value;
use bytes::Bytes;
use tokio::sync::oneshot;

/// One command argument. `Bytes` arguments force the slow per-argument
/// `write_request` encoding path and suppress `detect_buffers` coercion on
/// the matching reply, per §4.2/§4.4.
#[derive(Debug, Clone)]
pub enum Arg {
    Text(String),
    Bytes(Bytes),
}

impl Arg {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Arg::Text(s) => s.as_bytes(),
            Arg::Bytes(b) => b,
        }
    }

    pub fn is_bytes(&self) -> bool {
        matches!(self, Arg::Bytes(_))
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Arg::Text(s.to_owned())
    }
}

impl From<String> for Arg {
    fn from(s: String) -> Self {
        Arg::Text(s)
    }
}

impl From<Bytes> for Arg {
    fn from(b: Bytes) -> Self {
        Arg::Bytes(b)
    }
}

impl From<Vec<u8>> for Arg {
    fn from(b: Vec<u8>) -> Self {
        Arg::Bytes(Bytes::from(b))
    }
}

impl From<i64> for Arg {
    fn from(n: i64) -> Self {
        Arg::Text(n.to_string())
    }
}

/// A queued command record: the argument vector plus the one-shot handle its
/// reply (or failure) is delivered through. `select_call` commands skip
/// reply coercion; `is_subscribe`/`is_unsubscribe` mark the commands the
/// pub/sub overlay must also track outside the pending queue.
#[derive(Debug)]
pub struct Command {
    pub args: Vec<Arg>,
    pub reply: PendingReply,
}

impl Command {
    pub fn new(args: Vec<Arg>) -> (Self, oneshot::Receiver<Result<Value, RedisError>>) {
        let (tx, rx) = oneshot::channel();
        (
            Command {
                args,
                reply: PendingReply(tx),
            },
            rx,
        )
    }

    /// The command name, lowercased, as used for pub/sub routing and the
    /// command catalog lookup. Empty argument vectors never occur —
    /// `send_command` validates against them before a `Command` is built.
    pub fn name(&self) -> String {
        String::from_utf8_lossy(self.args[0].as_bytes()).to_ascii_lowercase()
    }

    /// True if any argument carries raw bytes rather than text, forcing the
    /// slow-path encoder and suppressing `detect_buffers` reply coercion.
    pub fn has_byte_args(&self) -> bool {
        self.args.iter().any(Arg::is_bytes)
    }
}

/// Wraps the `oneshot::Sender` half of a command's completion channel.
/// Delivering twice, or never, is not an error at this layer — a dropped
/// `PendingReply` simply drops its receiver's `Err(RecvError)`, which the
/// `Client` surfaces as `RedisError::ConnectionGone`.
#[derive(Debug)]
pub struct PendingReply(oneshot::Sender<Result<Value, RedisError>>);

impl PendingReply {
    pub fn complete(self, result: Result<Value, RedisError>) {
        let _ = self.0.send(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_name_is_lowercased() {
        let (cmd, _rx) = Command::new(vec![Arg::from("GET"), Arg::from("foo")]);
        assert_eq!(cmd.name(), "get");
    }

    #[test]
    fn has_byte_args_detects_bytes_variant() {
        let (cmd, _rx) = Command::new(vec![Arg::from("set"), Arg::from(Bytes::from_static(b"x"))]);
        assert!(cmd.has_byte_args());

        let (cmd, _rx) = Command::new(vec![Arg::from("set"), Arg::from("x")]);
        assert!(!cmd.has_byte_args());
    }

    #[tokio::test]
    async fn pending_reply_delivers_result() {
        let (cmd, rx) = Command::new(vec![Arg::from("ping")]);
        cmd.reply.complete(Ok(Value::SimpleString("PONG".into())));
        assert_eq!(rx.await.unwrap().unwrap(), Value::SimpleString("PONG".into()));
    }

    #[tokio::test]
    async fn dropped_pending_reply_yields_recv_error() {
        let (cmd, rx) = Command::new(vec![Arg::from("ping")]);
        drop(cmd);
        assert!(rx.await.is_err());
    }
}
