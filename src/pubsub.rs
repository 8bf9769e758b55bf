// ABOUTME: Subscription tracking and the pub/sub dispatch overlay
// ABOUTME: Route is a tagged enum of dispatch modes rather than a boolean "is this a push" check

use crate::value::Value;
use std::collections::HashSet;

/// Which subscription command kind a channel/pattern was registered under.
/// Kept distinct because `unsubscribe`/`punsubscribe` only drop entries of
/// the matching kind, and resubscription on reconnect re-issues the
/// original command name per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubKind {
    Channel,
    Pattern,
}

/// How an incoming reply should be dispatched. Only `message`/`pmessage`
/// are genuinely unsolicited — they never pop the pending queue. A
/// `subscribe`/`unsubscribe`/`psubscribe`/`punsubscribe` confirmation still
/// pairs with the command that produced it, so it routes as `Pipelined` like
/// any other reply; the engine additionally calls [`parse_confirmation`] on
/// it once popped. Modeled as a tagged enum rather than an `is_pubsub: bool`
/// check per DESIGN NOTES' guidance.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Pipelined,
    PubSubPush(PushMessage),
}

/// A decoded unsolicited pub/sub push.
#[derive(Debug, Clone, PartialEq)]
pub enum PushMessage {
    Message { channel: String, payload: Value },
    PMessage {
        pattern: String,
        channel: String,
        payload: Value,
    },
}

/// A decoded subscribe/unsubscribe confirmation, extracted from a reply
/// already popped off the pending queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Confirmation {
    pub kind: &'static str,
    pub target: String,
    pub count: i64,
}

/// Tracks active subscriptions, keyed the way §4.5 specifies
/// (`"sub <channel>"` / `"psub <pattern>"`) so channel and pattern
/// namespaces never collide on an identical string.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    active: HashSet<(SubKind, String)>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        SubscriptionSet::default()
    }

    pub fn add(&mut self, kind: SubKind, target: &str) {
        self.active.insert((kind, target.to_owned()));
    }

    pub fn remove(&mut self, kind: SubKind, target: &str) {
        self.active.remove(&(kind, target.to_owned()));
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn is_active(&self) -> bool {
        !self.active.is_empty()
    }

    /// Every active subscription, in no particular order, for reconnect
    /// resubscription per §4.5 ("re-issued on reconnect before `ready`").
    pub fn iter(&self) -> impl Iterator<Item = &(SubKind, String)> {
        self.active.iter()
    }

    /// Classifies an incoming reply as a pipelined reply or an unsolicited
    /// push. A reply only routes as a push while at least one subscription
    /// is active (the sticky `pub_sub_mode` flag from Open Question 1) and
    /// its array head is `message` or `pmessage`.
    pub fn route(&self, value: &Value) -> Route {
        if !self.is_active() {
            return Route::Pipelined;
        }
        match value.array_head().as_deref() {
            Some("message") => match extract_message(value) {
                Some(push) => Route::PubSubPush(push),
                None => Route::Pipelined,
            },
            Some("pmessage") => match extract_pmessage(value) {
                Some(push) => Route::PubSubPush(push),
                None => Route::Pipelined,
            },
            _ => Route::Pipelined,
        }
    }
}

/// Extracts a subscribe-family confirmation from a reply already paired
/// with its command. `command_name` disambiguates which of the four verbs
/// produced it, since the reply shape itself doesn't distinguish
/// `subscribe` from `psubscribe`.
pub fn parse_confirmation(command_name: &str, value: &Value) -> Option<Confirmation> {
    let kind = match command_name {
        "subscribe" => "subscribe",
        "unsubscribe" => "unsubscribe",
        "psubscribe" => "psubscribe",
        "punsubscribe" => "punsubscribe",
        _ => return None,
    };
    let items = array_items(value)?;
    if items.len() != 3 {
        return None;
    }
    let target = bulk_string(&items[1])?;
    let count = match &items[2] {
        Value::Integer(n) => *n,
        _ => return None,
    };
    Some(Confirmation { kind, target, count })
}

fn array_items(value: &Value) -> Option<&[Value]> {
    match value {
        Value::Array(Some(items)) => Some(items),
        _ => None,
    }
}

fn bulk_string(value: &Value) -> Option<String> {
    match value {
        Value::Bulk(Some(b)) => String::from_utf8(b.to_vec()).ok(),
        Value::SimpleString(s) => Some(s.clone()),
        _ => None,
    }
}

fn extract_message(value: &Value) -> Option<PushMessage> {
    let items = array_items(value)?;
    if items.len() != 3 {
        return None;
    }
    Some(PushMessage::Message {
        channel: bulk_string(&items[1])?,
        payload: items[2].clone(),
    })
}

fn extract_pmessage(value: &Value) -> Option<PushMessage> {
    let items = array_items(value)?;
    if items.len() != 4 {
        return None;
    }
    Some(PushMessage::PMessage {
        pattern: bulk_string(&items[1])?,
        channel: bulk_string(&items[2])?,
        payload: items[3].clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn bulk(s: &str) -> Value {
        Value::Bulk(Some(Bytes::from(s.as_bytes().to_vec())))
    }

    #[test]
    fn routes_as_pipelined_when_no_subscriptions() {
        let subs = SubscriptionSet::new();
        let reply = Value::Array(Some(vec![bulk("message"), bulk("ch"), bulk("hi")]));
        assert_eq!(subs.route(&reply), Route::Pipelined);
    }

    #[test]
    fn routes_message_as_push_once_subscribed() {
        let mut subs = SubscriptionSet::new();
        subs.add(SubKind::Channel, "ch");
        let reply = Value::Array(Some(vec![bulk("message"), bulk("ch"), bulk("hi")]));
        assert_eq!(
            subs.route(&reply),
            Route::PubSubPush(PushMessage::Message {
                channel: "ch".into(),
                payload: bulk("hi"),
            })
        );
    }

    #[test]
    fn routes_pmessage_as_push() {
        let mut subs = SubscriptionSet::new();
        subs.add(SubKind::Pattern, "ch*");
        let reply = Value::Array(Some(vec![
            bulk("pmessage"),
            bulk("ch*"),
            bulk("ch1"),
            bulk("hi"),
        ]));
        assert_eq!(
            subs.route(&reply),
            Route::PubSubPush(PushMessage::PMessage {
                pattern: "ch*".into(),
                channel: "ch1".into(),
                payload: bulk("hi"),
            })
        );
    }

    #[test]
    fn subscribe_confirmations_route_as_pipelined() {
        let mut subs = SubscriptionSet::new();
        subs.add(SubKind::Channel, "ch");
        let reply = Value::Array(Some(vec![bulk("subscribe"), bulk("ch"), Value::Integer(1)]));
        assert_eq!(subs.route(&reply), Route::Pipelined);
    }

    #[test]
    fn parse_confirmation_extracts_target_and_count() {
        let reply = Value::Array(Some(vec![bulk("subscribe"), bulk("ch"), Value::Integer(1)]));
        assert_eq!(
            parse_confirmation("subscribe", &reply),
            Some(Confirmation {
                kind: "subscribe",
                target: "ch".into(),
                count: 1,
            })
        );
    }

    #[test]
    fn parse_confirmation_rejects_unrelated_command() {
        let reply = Value::Array(Some(vec![bulk("subscribe"), bulk("ch"), Value::Integer(1)]));
        assert_eq!(parse_confirmation("get", &reply), None);
    }

    #[test]
    fn stays_active_until_last_subscription_removed() {
        let mut subs = SubscriptionSet::new();
        subs.add(SubKind::Channel, "ch");
        subs.add(SubKind::Pattern, "p*");
        subs.remove(SubKind::Channel, "ch");
        assert!(subs.is_active());
        subs.remove(SubKind::Pattern, "p*");
        assert!(!subs.is_active());
    }
}
