// ABOUTME: ClientOptions collects every recognized construction option behind a Default plus setters
// ABOUTME: Mirrors the teacher's builder-style ClientOptions/KeepAliveConfig shape

use crate::macros::builder_setters;

/// Construction-time options for [`crate::Client::connect`]. Every field has
/// the documented default; override with the fluent setters below (named
/// after the field, following the teacher's `builder_setters!` convention).
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Which registered `ReplyParser` implementation to use. Only `"stack"`
    /// (the shipped `StackParser`) is currently registered; see DESIGN.md.
    pub parser: String,
    /// Always deliver bulk replies as raw bytes, never coerced to strings.
    pub return_buffers: bool,
    /// Deliver bulk replies as raw bytes only when the paired command had a
    /// byte-typed argument; otherwise coerce to strings. Ignored when
    /// `return_buffers` is set.
    pub detect_buffers: bool,
    pub socket_nodelay: bool,
    /// Accepted for parity with the recognized-options table; not applied at
    /// the socket layer (see DESIGN.md — no keepalive-capable dependency is
    /// otherwise needed in this crate).
    pub socket_keepalive: bool,
    pub command_queue_high_water: usize,
    pub command_queue_low_water: usize,
    /// Reconnect attempt cap. `None` means unlimited (bounded only by
    /// `connect_timeout`).
    pub max_attempts: Option<u32>,
    pub connect_timeout_ms: u64,
    pub retry_max_delay_ms: u64,
    pub enable_offline_queue: bool,
    pub auth_pass: Option<String>,
    pub no_ready_check: bool,
    pub family: AddressFamily,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    V4,
    V6,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            parser: "stack".to_owned(),
            return_buffers: false,
            detect_buffers: false,
            socket_nodelay: true,
            socket_keepalive: true,
            command_queue_high_water: 1000,
            command_queue_low_water: 0,
            max_attempts: None,
            connect_timeout_ms: 86_400_000,
            retry_max_delay_ms: u64::MAX,
            enable_offline_queue: true,
            auth_pass: None,
            no_ready_check: false,
            family: AddressFamily::V4,
        }
    }
}

impl ClientOptions {
    pub fn new() -> Self {
        ClientOptions::default()
    }

    builder_setters! {
        parser: String,
        return_buffers: bool,
        detect_buffers: bool,
        socket_nodelay: bool,
        socket_keepalive: bool,
        command_queue_high_water: usize,
        command_queue_low_water: usize,
        max_attempts: Option<u32>,
        connect_timeout_ms: u64,
        retry_max_delay_ms: u64,
        enable_offline_queue: bool,
        auth_pass: Option<String>,
        no_ready_check: bool,
        family: AddressFamily,
    }
}
