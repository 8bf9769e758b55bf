// ABOUTME: The connection state machine — lifecycle, send_command gating, reply dispatch, backoff
// ABOUTME: Single-owner task design: the engine alone touches the transport and both queues

use crate::command::{Arg, Command};
use crate::encode::{encode_request, write_request};
use crate::error::{RedisError, RedisResult};
use crate::events::Event;
use crate::options::ClientOptions;
use crate::parser::{ReplyParser, StackParser};
use crate::pubsub::{self, Route, SubKind, SubscriptionSet};
use crate::queue::CommandQueue;
use crate::value::Value;

use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Blanket marker for anything the engine can read from and write to.
/// Lets the engine stay generic over `TcpStream`, `UnixStream`, and (in
/// tests) `tokio::io::DuplexStream`, without an explicit trait per
/// transport kind.
pub trait AsyncDuplex: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncDuplex for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connecting,
    Authenticating,
    ReadyCheck,
    Ready,
    ReconnectWait,
    Closing,
}

/// Snapshot of the fields that must survive a reconnect and be restored
/// once the new connection reaches `Ready`, per lifecycle steps 5/6.
#[derive(Debug, Clone, Default)]
struct OldState {
    monitoring: bool,
    pub_sub_mode: bool,
    selected_db: Option<i64>,
}

/// Why [`Engine::drive`] returned.
enum Outcome {
    /// The transport closed, errored, or a framing error was fatal. Carries
    /// a human-readable reason for the `ConnectionGone` error and the
    /// `reconnecting` event.
    Gone(String),
    /// `quit` was submitted and the transport shut down cleanly.
    Closed,
}

/// What [`Engine::handle_connection_gone`] decided.
enum Backoff {
    Wait(u64),
    Stop,
    Exhausted,
}

/// Owns every field from §3's data model plus the two command queues. A
/// single task holds the only `&mut Engine` in existence, matching §5's
/// "one owning task or mutex" requirement without actually needing a mutex.
pub struct Engine {
    options: ClientOptions,
    state: ConnState,
    offline: CommandQueue,
    pending: CommandQueue,
    subs: SubscriptionSet,
    pub_sub_mode: bool,
    monitoring: bool,
    closing: bool,
    should_buffer: bool,
    selected_db: Option<i64>,
    old_state: Option<OldState>,
    retry_delay: u64,
    retry_totaltime: u64,
    attempts: u32,
}

impl Engine {
    pub fn new(options: ClientOptions) -> Self {
        Engine {
            options,
            state: ConnState::Disconnected,
            offline: CommandQueue::new(),
            pending: CommandQueue::new(),
            subs: SubscriptionSet::new(),
            pub_sub_mode: false,
            monitoring: false,
            closing: false,
            should_buffer: false,
            selected_db: None,
            old_state: None,
            retry_delay: 200,
            retry_totaltime: 0,
            attempts: 1,
        }
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    /// Runs the engine for its entire lifetime: connects, drives the
    /// connection until it's lost, backs off, and reconnects — until either
    /// `quit` is submitted or a terminal condition (`max_attempts`,
    /// `connect_timeout`) is reached. `connect` is invoked once per attempt
    /// and produces the next transport; this is the "transport factory"
    /// from lifecycle step 1, supplied by the caller so the engine stays
    /// agnostic to TCP vs. unix-socket vs. in-memory-duplex.
    pub async fn run<F, Fut, T>(
        &mut self,
        mut connect: F,
        submissions: &mut mpsc::Receiver<Command>,
        events: &mpsc::UnboundedSender<Event>,
    ) -> RedisResult<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::io::Result<T>>,
        T: AsyncDuplex,
    {
        loop {
            self.state = ConnState::Connecting;
            let _ = events.send(Event::Connecting);
            debug!("connecting");

            let mut transport = match connect().await {
                Ok(t) => t,
                Err(e) => {
                    warn!(error = %e, "connect attempt failed");
                    match self
                        .handle_connection_gone(e.to_string(), events)
                        .await
                    {
                        Backoff::Wait(delay) => {
                            sleep(Duration::from_millis(delay)).await;
                            continue;
                        }
                        Backoff::Stop => return Ok(()),
                        Backoff::Exhausted => return Err(RedisError::RetryExhausted),
                    }
                }
            };

            match self.drive(&mut transport, submissions, events).await {
                Outcome::Closed => {
                    let _ = events.send(Event::End);
                    return Ok(());
                }
                Outcome::Gone(reason) => {
                    warn!(%reason, "connection lost");
                    match self.handle_connection_gone(reason, events).await {
                        Backoff::Wait(delay) => sleep(Duration::from_millis(delay)).await,
                        Backoff::Stop => return Ok(()),
                        Backoff::Exhausted => return Err(RedisError::RetryExhausted),
                    }
                }
            }
        }
    }

    /// Drives a single established connection through handshake and then
    /// the steady-state select loop, per lifecycle steps 2-7.
    pub async fn drive<T: AsyncDuplex>(
        &mut self,
        transport: &mut T,
        submissions: &mut mpsc::Receiver<Command>,
        events: &mpsc::UnboundedSender<Event>,
    ) -> Outcome {
        self.state = ConnState::Authenticating;
        let mut parser = StackParser::new();

        if let Some(pass) = self.options.auth_pass.clone() {
            if let Err(outcome) = self
                .authenticate(transport, &mut parser, submissions, events, &pass)
                .await
            {
                return outcome;
            }
        }

        self.state = ConnState::ReadyCheck;
        if !self.options.no_ready_check {
            if let Err(outcome) = self.ready_check(transport, &mut parser, submissions).await {
                return outcome;
            }
        }

        if let Err(outcome) = self.enter_ready(transport, &mut parser, submissions, events).await {
            return outcome;
        }

        self.main_loop(transport, &mut parser, submissions, events)
            .await
    }

    /// Step 3: `AUTH <pass>`. `LOADING` is retried after 2s; "no password is
    /// set" is treated as success (the server simply has no `requirepass`).
    async fn authenticate<T: AsyncDuplex>(
        &mut self,
        transport: &mut T,
        parser: &mut StackParser,
        submissions: &mut mpsc::Receiver<Command>,
        events: &mpsc::UnboundedSender<Event>,
        pass: &str,
    ) -> Result<(), Outcome> {
        loop {
            let args = vec![Arg::from("AUTH"), Arg::from(pass.to_owned())];
            if let Err(e) = transport.write_all(&encode_request(&args)).await {
                return Err(Outcome::Gone(e.to_string()));
            }
            let reply = self
                .recv_one(transport, parser, submissions)
                .await
                .map_err(Outcome::Gone)?;
            match reply {
                Value::SimpleString(_) => return Ok(()),
                Value::Error(message) if message.contains("LOADING") => {
                    sleep(Duration::from_secs(2)).await;
                    continue;
                }
                Value::Error(message) if message.contains("no password is set") => return Ok(()),
                Value::Error(message) => {
                    warn!(%message, "auth rejected");
                    let _ = events.send(Event::Warning(format!("auth rejected: {message}")));
                    return Ok(());
                }
                _ => return Ok(()),
            }
        }
    }

    /// Step 4: `INFO`, parsed just enough to detect a `loading:` field.
    async fn ready_check<T: AsyncDuplex>(
        &mut self,
        transport: &mut T,
        parser: &mut StackParser,
        submissions: &mut mpsc::Receiver<Command>,
    ) -> Result<(), Outcome> {
        loop {
            let args = vec![Arg::from("INFO")];
            if let Err(e) = transport.write_all(&encode_request(&args)).await {
                return Err(Outcome::Gone(e.to_string()));
            }
            let reply = self
                .recv_one(transport, parser, submissions)
                .await
                .map_err(Outcome::Gone)?;
            let text = match reply {
                Value::Bulk(Some(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
                _ => return Ok(()),
            };
            let info = parse_info(&text);
            let loading = info
                .get("loading")
                .map(|v| v != "0")
                .unwrap_or(false);
            if !loading {
                return Ok(());
            }
            let eta_seconds: u64 = info
                .get("loading_eta_seconds")
                .and_then(|v| v.parse().ok())
                .unwrap_or(1);
            let wait_ms = (eta_seconds * 1000).min(1000);
            sleep(Duration::from_millis(wait_ms)).await;
        }
    }

    /// Step 5: restore state from a prior disconnect, re-select the
    /// database, re-subscribe, then drain the offline queue and emit
    /// `ready`.
    async fn enter_ready<T: AsyncDuplex>(
        &mut self,
        transport: &mut T,
        parser: &mut StackParser,
        submissions: &mut mpsc::Receiver<Command>,
        events: &mpsc::UnboundedSender<Event>,
    ) -> Result<(), Outcome> {
        if let Some(old) = self.old_state.take() {
            self.monitoring = old.monitoring;
            self.pub_sub_mode = old.pub_sub_mode;
            self.selected_db = old.selected_db;
        }

        if let Some(db) = self.selected_db {
            let args = vec![Arg::from("SELECT"), Arg::from(db)];
            if let Err(e) = transport.write_all(&encode_request(&args)).await {
                return Err(Outcome::Gone(e.to_string()));
            }
            self.recv_one(transport, parser, submissions)
                .await
                .map_err(Outcome::Gone)?;
        }

        if self.pub_sub_mode {
            let subs: Vec<(SubKind, String)> = self.subs.iter().cloned().collect();
            for (kind, target) in subs {
                let verb = match kind {
                    SubKind::Channel => "SUBSCRIBE",
                    SubKind::Pattern => "PSUBSCRIBE",
                };
                let args = vec![Arg::from(verb), Arg::from(target)];
                if let Err(e) = transport.write_all(&encode_request(&args)).await {
                    return Err(Outcome::Gone(e.to_string()));
                }
                let reply = self
                    .recv_one(transport, parser, submissions)
                    .await
                    .map_err(Outcome::Gone)?;
                if let Some(confirmation) = pubsub::parse_confirmation(&verb.to_ascii_lowercase(), &reply) {
                    let _ = events.send(confirmation_event(&confirmation));
                }
            }
        } else {
            // Routed through the same `handle_submit` modal-routing gating
            // live submissions get, so a `SUBSCRIBE` queued before
            // readiness still flips `pub_sub_mode` and populates
            // `subs` at drain time, same as one submitted after.
            let mut drained = Vec::new();
            self.offline.drain(|cmd| drained.push(cmd));
            for command in drained {
                if let Err(e) = self.handle_submit(command, transport).await {
                    return Err(Outcome::Gone(e.to_string()));
                }
            }
        }

        self.state = ConnState::Ready;
        self.attempts = 1;
        self.retry_delay = 200;
        self.retry_totaltime = 0;
        let _ = events.send(Event::Ready);
        info!("ready");
        if !self.should_buffer {
            let _ = events.send(Event::Drain);
        }
        Ok(())
    }

    /// The steady-state loop: transport reads feed the parser and dispatch
    /// replies; submissions arrive over the channel and go through
    /// `send_command` gating.
    async fn main_loop<T: AsyncDuplex>(
        &mut self,
        transport: &mut T,
        parser: &mut StackParser,
        submissions: &mut mpsc::Receiver<Command>,
        events: &mpsc::UnboundedSender<Event>,
    ) -> Outcome {
        let mut buf = [0u8; 4096];
        loop {
            tokio::select! {
                result = transport.read(&mut buf) => {
                    match result {
                        Ok(0) => return Outcome::Gone("transport closed".into()),
                        Ok(n) => {
                            match parser.feed(&buf[..n]) {
                                Ok(values) => {
                                    for value in values {
                                        self.dispatch_reply(value, events);
                                    }
                                }
                                Err(e) => return Outcome::Gone(e.to_string()),
                            }
                        }
                        Err(e) => return Outcome::Gone(e.to_string()),
                    }
                }
                maybe_command = submissions.recv() => {
                    match maybe_command {
                        Some(command) => {
                            if let Err(e) = self.handle_submit(command, transport).await {
                                return Outcome::Gone(e.to_string());
                            }
                            if self.closing {
                                let _ = transport.flush().await;
                                return Outcome::Closed;
                            }
                        }
                        None => {
                            self.closing = true;
                            return Outcome::Closed;
                        }
                    }
                }
            }
        }
    }

    /// `send_command` gating from §4.4: modal routing, pub/sub-mode
    /// rejection, pending-queue enqueue, encode, write, backpressure.
    async fn handle_submit<T: AsyncDuplex>(
        &mut self,
        command: Command,
        transport: &mut T,
    ) -> std::io::Result<()> {
        let name = command.name();

        if self.pub_sub_mode && !is_subscribe_family(&name) {
            command.reply.complete(Err(RedisError::Validation(
                "only subscriber commands may be used while subscribed".into(),
            )));
            return Ok(());
        }

        if is_subscribe_family(&name) {
            self.pub_sub_mode = true;
            let kind = if name.starts_with('p') {
                SubKind::Pattern
            } else {
                SubKind::Channel
            };
            let unsubscribing = name.starts_with("uns") || name.starts_with("puns");
            for arg in command.args.iter().skip(1) {
                let target = String::from_utf8_lossy(arg.as_bytes()).into_owned();
                if unsubscribing {
                    self.subs.remove(kind, &target);
                } else {
                    self.subs.add(kind, &target);
                }
            }
        } else if name == "monitor" {
            self.monitoring = true;
        } else if name == "quit" {
            self.closing = true;
            self.write_command(transport, &command).await?;
            command.reply.complete(Ok(Value::SimpleString("OK".into())));
            return Ok(());
        } else if name == "select" {
            if let Some(Arg::Text(db)) = command.args.get(1) {
                self.selected_db = db.parse().ok();
            }
        }

        self.write_command(transport, &command).await?;
        self.pending.push(command);

        if self.pending.len() >= self.options.command_queue_high_water {
            self.should_buffer = true;
        }
        Ok(())
    }

    async fn write_command<T: AsyncDuplex>(
        &self,
        transport: &mut T,
        command: &Command,
    ) -> std::io::Result<()> {
        if command.has_byte_args() {
            write_request(transport, &command.args).await
        } else {
            transport.write_all(&encode_request(&command.args)).await
        }
    }

    /// Reply dispatch from §4.4: monitor-mode lines first (they pair with
    /// nothing once the `MONITOR` command itself has been acknowledged),
    /// then pub/sub routing, then pairing with the pending queue head, then
    /// the per-reply dispatch rules.
    fn dispatch_reply(&mut self, value: Value, events: &mpsc::UnboundedSender<Event>) {
        if self.monitoring && self.pending.is_empty() {
            if let Value::SimpleString(line) = &value {
                if let Some((timestamp, args)) = parse_monitor_line(line) {
                    let _ = events.send(Event::Monitor { timestamp, args });
                    return;
                }
            }
        }

        match self.subs.route(&value) {
            Route::PubSubPush(push) => {
                let _ = events.send(push_event(push));
                return;
            }
            Route::Pipelined => {}
        }

        let Some(command) = self.pending.shift() else {
            warn!("reply with nothing pending, discarding");
            return;
        };
        let name = command.name();

        if self.pending.is_empty() && !self.pub_sub_mode {
            let _ = events.send(Event::Idle);
        }
        if self.should_buffer && self.pending.len() <= self.options.command_queue_low_water {
            self.should_buffer = false;
            let _ = events.send(Event::Drain);
        }

        if let Value::Error(message) = &value {
            command.reply.complete(Err(RedisError::Server {
                command_used: Some(name.to_ascii_uppercase()),
                message: message.clone(),
            }));
            return;
        }

        if let Some(confirmation) = pubsub::parse_confirmation(&name, &value) {
            if confirmation.count == 0 {
                self.pub_sub_mode = false;
            }
            let _ = events.send(confirmation_event(&confirmation));
            command.reply.complete(Ok(value));
            return;
        }

        // Coercion to strings is the default. `return_buffers` opts out
        // unconditionally; `detect_buffers` opts out only for the commands
        // that had a byte-typed argument (or for `exec`, per §4.4).
        let value = if self.options.return_buffers {
            value
        } else if self.options.detect_buffers {
            if command.has_byte_args() || name == "exec" {
                value
            } else {
                value.coerce_to_strings()
            }
        } else {
            value.coerce_to_strings()
        };

        if name == "hgetall" {
            let mapped = match value.into_hash_mapping() {
                Some(map) => Value::Array(Some(
                    map.into_iter()
                        .flat_map(|(k, v)| [Value::SimpleString(k), v])
                        .collect(),
                )),
                None => Value::Array(None),
            };
            command.reply.complete(Ok(mapped));
            return;
        }

        command.reply.complete(Ok(value));
    }

    /// Step 6: drain both queues with a single `ConnectionGone` error,
    /// compute the next backoff delay, and decide whether to keep retrying.
    async fn handle_connection_gone(
        &mut self,
        reason: String,
        events: &mpsc::UnboundedSender<Event>,
    ) -> Backoff {
        if self.old_state.is_none() {
            self.old_state = Some(OldState {
                monitoring: self.monitoring,
                pub_sub_mode: self.pub_sub_mode,
                selected_db: self.selected_db,
            });
            self.monitoring = false;
            self.pub_sub_mode = false;
            self.selected_db = None;
        }

        let _ = events.send(Event::End);
        self.pending
            .drain(|cmd| cmd.reply.complete(Err(RedisError::ConnectionGone(reason.clone()))));
        self.offline
            .drain(|cmd| cmd.reply.complete(Err(RedisError::ConnectionGone(reason.clone()))));

        if self.closing {
            return Backoff::Stop;
        }

        let delay = if self.options.retry_max_delay_ms > 0 {
            self.retry_delay.min(self.options.retry_max_delay_ms)
        } else {
            self.retry_delay
        };
        self.retry_totaltime += delay;

        if let Some(max_attempts) = self.options.max_attempts {
            if self.attempts >= max_attempts {
                return Backoff::Exhausted;
            }
        }
        if self.retry_totaltime >= self.options.connect_timeout_ms {
            return Backoff::Exhausted;
        }

        self.attempts += 1;
        let _ = events.send(Event::Reconnecting {
            reason,
            attempt: self.attempts,
        });
        self.retry_delay = ((self.retry_delay as f64) * 1.7).floor() as u64;
        Backoff::Wait(delay)
    }

    /// Pushes a command straight onto the offline queue. Used by tests that
    /// drive `drive` directly against an already-established transport,
    /// seeding commands as if they'd arrived before the connection reached
    /// `Ready`.
    #[cfg(test)]
    pub fn queue_offline(&mut self, command: Command) {
        self.offline.push(command);
    }

    /// Drains submissions arriving during handshake (auth/ready-check) into
    /// the offline queue, while concurrently waiting for exactly one
    /// decoded reply from the transport.
    async fn recv_one<T: AsyncDuplex>(
        &mut self,
        transport: &mut T,
        parser: &mut StackParser,
        submissions: &mut mpsc::Receiver<Command>,
    ) -> Result<Value, String> {
        let mut buf = [0u8; 4096];
        loop {
            tokio::select! {
                result = transport.read(&mut buf) => {
                    match result {
                        Ok(0) => return Err("transport closed".into()),
                        Ok(n) => match parser.feed(&buf[..n]) {
                            Ok(mut values) if !values.is_empty() => return Ok(values.remove(0)),
                            Ok(_) => continue,
                            Err(e) => return Err(e.to_string()),
                        },
                        Err(e) => return Err(e.to_string()),
                    }
                }
                maybe_command = submissions.recv() => {
                    if let Some(command) = maybe_command {
                        if self.options.enable_offline_queue {
                            self.offline.push(command);
                            self.should_buffer = true;
                        } else {
                            command.reply.complete(Err(RedisError::NotWritable));
                        }
                    }
                }
            }
        }
    }
}

fn is_subscribe_family(name: &str) -> bool {
    matches!(name, "subscribe" | "unsubscribe" | "psubscribe" | "punsubscribe")
}

fn confirmation_event(confirmation: &pubsub::Confirmation) -> Event {
    let target = confirmation.target.clone();
    let count = confirmation.count;
    match confirmation.kind {
        "subscribe" => Event::Subscribe { channel: target, count },
        "unsubscribe" => Event::Unsubscribe { channel: target, count },
        "psubscribe" => Event::PSubscribe { pattern: target, count },
        _ => Event::PUnsubscribe { pattern: target, count },
    }
}

fn push_event(push: pubsub::PushMessage) -> Event {
    match push {
        pubsub::PushMessage::Message { channel, payload } => Event::Message { channel, payload },
        pubsub::PushMessage::PMessage {
            pattern,
            channel,
            payload,
        } => Event::PMessage {
            pattern,
            channel,
            payload,
        },
    }
}

/// Parses a `MONITOR`-mode line: `<timestamp> "<arg0>" "<arg1>" ...`. The
/// timestamp is the prefix up to the first space; the remainder is
/// double-quoted, space-separated arguments with `\"` escaping `"`.
fn parse_monitor_line(line: &str) -> Option<(String, Vec<String>)> {
    let (timestamp, rest) = line.split_once(' ')?;
    let mut args = Vec::new();
    let mut chars = rest.trim_start().chars().peekable();
    while chars.peek() == Some(&'"') {
        chars.next();
        let mut arg = String::new();
        loop {
            match chars.next()? {
                '\\' if chars.peek() == Some(&'"') => {
                    chars.next();
                    arg.push('"');
                }
                '"' => break,
                c => arg.push(c),
            }
        }
        args.push(arg);
        while chars.peek() == Some(&' ') {
            chars.next();
        }
    }
    Some((timestamp.to_owned(), args))
}

fn parse_info(text: &str) -> std::collections::HashMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_owned(), v.trim().to_owned()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Arg;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    fn opts() -> ClientOptions {
        ClientOptions::default().no_ready_check(true)
    }

    #[tokio::test]
    async fn offline_commands_flush_in_order_on_ready() {
        let (client_side, mut server_side) = duplex(4096);
        let mut engine = Engine::new(opts());
        let (tx, mut rx) = mpsc::channel(8);
        let (events_tx, _events_rx) = mpsc::unbounded_channel();

        let (set_cmd, set_rx) = Command::new(vec![Arg::from("SET"), Arg::from("foo"), Arg::from("bar")]);
        let (get_cmd, get_rx) = Command::new(vec![Arg::from("GET"), Arg::from("foo")]);
        engine.queue_offline(set_cmd);
        engine.queue_offline(get_cmd);

        let mut transport = client_side;
        let drive = tokio::spawn(async move {
            engine.drive(&mut transport, &mut rx, &events_tx).await;
        });

        let mut received = vec![0u8; 64];
        let n = server_side.read(&mut received).await.unwrap();
        assert_eq!(
            &received[..n],
            b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n" as &[u8]
        );

        server_side.write_all(b"+OK\r\n$3\r\nbar\r\n").await.unwrap();
        assert_eq!(set_rx.await.unwrap().unwrap(), Value::SimpleString("OK".into()));
        assert_eq!(
            get_rx.await.unwrap().unwrap(),
            Value::SimpleString("bar".into())
        );

        drop(tx);
        let _ = drive.await;
    }

    #[tokio::test]
    async fn connection_gone_fails_pending_commands() {
        let (client_side, server_side) = duplex(4096);
        let mut engine = Engine::new(opts());
        let (_tx, mut rx) = mpsc::channel(8);
        let (events_tx, _events_rx) = mpsc::unbounded_channel();

        let (cmd, cmd_rx) = Command::new(vec![Arg::from("GET"), Arg::from("foo")]);
        engine.queue_offline(cmd);

        let mut transport = client_side;
        drop(server_side);

        let outcome = engine.drive(&mut transport, &mut rx, &events_tx).await;
        assert!(matches!(outcome, Outcome::Gone(_)));
        assert!(matches!(cmd_rx.await.unwrap(), Err(RedisError::ConnectionGone(_))));
    }

    #[tokio::test]
    async fn subscribe_then_message_push_does_not_consume_pending() {
        let (client_side, mut server_side) = duplex(4096);
        let mut engine = Engine::new(opts());
        let (tx, mut rx) = mpsc::channel(8);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let mut transport = client_side;
        let drive = tokio::spawn(async move {
            engine.drive(&mut transport, &mut rx, &events_tx).await;
        });

        let (sub_cmd, sub_rx) = Command::new(vec![Arg::from("SUBSCRIBE"), Arg::from("ch1")]);
        tx.send(sub_cmd).await.unwrap();

        let mut received = vec![0u8; 64];
        let n = server_side.read(&mut received).await.unwrap();
        assert_eq!(&received[..n], b"*2\r\n$9\r\nSUBSCRIBE\r\n$3\r\nch1\r\n" as &[u8]);

        server_side
            .write_all(b"*3\r\n$9\r\nsubscribe\r\n$3\r\nch1\r\n:1\r\n")
            .await
            .unwrap();
        sub_rx.await.unwrap().unwrap();
        assert_eq!(
            events_rx.recv().await.unwrap(),
            Event::Subscribe { channel: "ch1".into(), count: 1 }
        );

        server_side
            .write_all(b"*3\r\n$7\r\nmessage\r\n$3\r\nch1\r\n$5\r\nhello\r\n")
            .await
            .unwrap();
        assert_eq!(
            events_rx.recv().await.unwrap(),
            Event::Message {
                channel: "ch1".into(),
                payload: Value::Bulk(Some(bytes::Bytes::from_static(b"hello"))),
            }
        );

        drop(tx);
        let _ = drive.await;
    }

    #[tokio::test]
    async fn non_subscribe_command_rejected_while_subscribed() {
        let (client_side, mut server_side) = duplex(4096);
        let mut engine = Engine::new(opts());
        let (tx, mut rx) = mpsc::channel(8);
        let (events_tx, _events_rx) = mpsc::unbounded_channel();

        let mut transport = client_side;
        let drive = tokio::spawn(async move {
            engine.drive(&mut transport, &mut rx, &events_tx).await;
        });

        let (sub_cmd, sub_rx) = Command::new(vec![Arg::from("SUBSCRIBE"), Arg::from("ch1")]);
        tx.send(sub_cmd).await.unwrap();
        let mut received = vec![0u8; 64];
        let n = server_side.read(&mut received).await.unwrap();
        let _ = &received[..n];
        server_side
            .write_all(b"*3\r\n$9\r\nsubscribe\r\n$3\r\nch1\r\n:1\r\n")
            .await
            .unwrap();
        sub_rx.await.unwrap().unwrap();

        let (get_cmd, get_rx) = Command::new(vec![Arg::from("GET"), Arg::from("foo")]);
        tx.send(get_cmd).await.unwrap();
        assert!(matches!(get_rx.await.unwrap(), Err(RedisError::Validation(_))));

        drop(tx);
        let _ = drive.await;
    }

    #[tokio::test]
    async fn hgetall_converts_even_length_array_and_empty_to_null() {
        let (client_side, mut server_side) = duplex(4096);
        let mut engine = Engine::new(opts());
        let (tx, mut rx) = mpsc::channel(8);
        let (events_tx, _events_rx) = mpsc::unbounded_channel();

        let mut transport = client_side;
        let drive = tokio::spawn(async move {
            engine.drive(&mut transport, &mut rx, &events_tx).await;
        });

        let (cmd, reply_rx) = Command::new(vec![Arg::from("HGETALL"), Arg::from("h")]);
        tx.send(cmd).await.unwrap();
        let mut received = vec![0u8; 64];
        let _ = server_side.read(&mut received).await.unwrap();
        server_side
            .write_all(b"*4\r\n$1\r\na\r\n$1\r\n1\r\n$1\r\nb\r\n$1\r\n2\r\n")
            .await
            .unwrap();
        let reply = reply_rx.await.unwrap().unwrap();
        let map = reply.into_hash_mapping().expect("even-length array converts");
        assert_eq!(map.get("a"), Some(&Value::SimpleString("1".into())));
        assert_eq!(map.get("b"), Some(&Value::SimpleString("2".into())));

        let (cmd, reply_rx) = Command::new(vec![Arg::from("HGETALL"), Arg::from("empty")]);
        tx.send(cmd).await.unwrap();
        let _ = server_side.read(&mut received).await.unwrap();
        server_side.write_all(b"*0\r\n").await.unwrap();
        assert_eq!(reply_rx.await.unwrap().unwrap(), Value::Array(None));

        drop(tx);
        let _ = drive.await;
    }

    #[tokio::test]
    async fn auth_no_password_set_is_swallowed_as_success() {
        let (client_side, mut server_side) = duplex(4096);
        let mut engine = Engine::new(opts().auth_pass(Some("hunter2".to_owned())));
        let (tx, mut rx) = mpsc::channel(8);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let mut transport = client_side;
        let drive = tokio::spawn(async move {
            engine.drive(&mut transport, &mut rx, &events_tx).await
        });

        let mut received = vec![0u8; 64];
        let n = server_side.read(&mut received).await.unwrap();
        assert_eq!(
            &received[..n],
            b"*2\r\n$4\r\nAUTH\r\n$7\r\nhunter2\r\n" as &[u8]
        );
        server_side
            .write_all(b"-ERR Client sent AUTH, but no password is set\r\n")
            .await
            .unwrap();

        assert_eq!(events_rx.recv().await.unwrap(), Event::Ready);

        drop(tx);
        let outcome = drive.await.unwrap();
        assert!(matches!(outcome, Outcome::Closed));
    }

    #[tokio::test]
    async fn drain_fires_only_on_the_falling_edge_of_should_buffer() {
        let options = opts().command_queue_high_water(1).command_queue_low_water(0);
        let (client_side, mut server_side) = duplex(4096);
        let mut engine = Engine::new(options);
        let (tx, mut rx) = mpsc::channel(8);
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let mut transport = client_side;
        let drive = tokio::spawn(async move {
            engine.drive(&mut transport, &mut rx, &events_tx).await
        });

        // Entering Ready with nothing buffered emits Ready then Drain on its
        // own (§4.4 lifecycle step 5); drain those before exercising the
        // high/low-water transition below.
        assert_eq!(events_rx.recv().await.unwrap(), Event::Ready);
        assert_eq!(events_rx.recv().await.unwrap(), Event::Drain);

        let (cmd, reply_rx) = Command::new(vec![Arg::from("GET"), Arg::from("foo")]);
        tx.send(cmd).await.unwrap();

        let mut received = vec![0u8; 64];
        let n = server_side.read(&mut received).await.unwrap();
        assert_eq!(&received[..n], b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n" as &[u8]);

        // Crossing high_water (pending len 1 >= 1) must not emit a Drain event
        // on its own: the rising edge has no event per §8's testable property.
        server_side.write_all(b"$3\r\nbar\r\n").await.unwrap();
        reply_rx.await.unwrap().unwrap();

        assert_eq!(events_rx.recv().await.unwrap(), Event::Idle);
        assert_eq!(events_rx.recv().await.unwrap(), Event::Drain);

        drop(tx);
        let _ = drive.await;
    }

    #[test]
    fn backoff_delay_matches_geometric_series() {
        let mut delay: f64 = 200.0;
        let expected = [200u64, 340, 578];
        for &want in &expected {
            assert_eq!(delay.floor() as u64, want);
            delay = (delay * 1.7).floor();
        }
    }
}
