// ABOUTME: The emitted-event surface delivered alongside a Client from connect()
// ABOUTME: Mirrors the lifecycle, pub/sub, and backpressure notifications listed in the external interface

use crate::value::Value;

/// An event emitted by the connection engine. Delivered over the
/// `mpsc::UnboundedReceiver<Event>` returned from [`crate::Client::connect`];
/// dropping the receiver is not an error, the engine keeps running.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Entered `CONNECTING`: a TCP/unix-socket connect attempt has started.
    Connecting,
    /// The handshake (`AUTHENTICATING`/`READY_CHECK`) finished and the
    /// connection is accepting commands.
    Ready,
    /// The transport closed or errored; `RECONNECT_WAIT` is about to begin.
    Reconnecting { reason: String, attempt: u32 },
    /// The transport is entering `CLOSING` at caller request (`quit`/drop).
    End,
    /// A non-fatal warning surfaced by the engine (e.g. a malformed
    /// out-of-band reply it chose to ignore rather than tear down for).
    Warning(String),
    /// `should_buffer` cleared: the pending queue has dropped to
    /// `command_queue_low_water` and the caller may resume writing without
    /// backpressure. Also emitted once on entering `READY` if no writes were
    /// buffered during the offline-queue drain. Never emitted on the rising
    /// edge (`should_buffer` becoming `true`) — that transition has no event
    /// of its own, per §8's testable "drain fires exactly on the
    /// true-to-false transition" property.
    Drain,
    /// No commands remain pending and pub/sub is not active.
    Idle,
    /// A `message` push on a subscribed channel.
    Message { channel: String, payload: Value },
    /// A `pmessage` push on a subscribed pattern.
    PMessage {
        pattern: String,
        channel: String,
        payload: Value,
    },
    Subscribe { channel: String, count: i64 },
    Unsubscribe { channel: String, count: i64 },
    PSubscribe { pattern: String, count: i64 },
    PUnsubscribe { pattern: String, count: i64 },
    /// A `MONITOR`-mode line: `timestamp` is the leading numeric prefix,
    /// `args` the quoted, unescaped argument list that followed it.
    Monitor { timestamp: String, args: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_comparable_for_test_assertions() {
        assert_eq!(Event::Ready, Event::Ready);
        assert_ne!(Event::Ready, Event::End);
    }
}
