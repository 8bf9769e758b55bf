// ABOUTME: The decoded reply value — a tagged union over the five RESP reply shapes
// ABOUTME: Also carries the byte-to-string coercion and hgetall mapping helpers used at dispatch

use bytes::Bytes;
use std::collections::HashMap;

/// A decoded reply. Mirrors the five wire shapes from the reply parser
/// one-for-one; nulls are folded into the `Option` of the shape that can be
/// null (`$-1\r\n` and `*-1\r\n`) rather than a separate variant.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    SimpleString(String),
    Error(String),
    Integer(i64),
    Bulk(Option<Bytes>),
    Array(Option<Vec<Value>>),
}

impl Value {
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// The reply's first array element as a lowercased string, if this is a
    /// non-empty array whose head is a bulk or simple string. Used by the
    /// engine to recognize pub/sub push shapes (`message`, `pmessage`,
    /// `subscribe`, ...) without fully matching the reply.
    pub fn array_head(&self) -> Option<String> {
        match self {
            Value::Array(Some(items)) => match items.first()? {
                Value::SimpleString(s) => Some(s.to_ascii_lowercase()),
                Value::Bulk(Some(b)) => std::str::from_utf8(b).ok().map(|s| s.to_ascii_lowercase()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Coerces bulk byte payloads in this value (recursively) to UTF-8
    /// strings, represented as `SimpleString`, leaving non-UTF-8 payloads as
    /// bulk bytes. Applied at dispatch time when `detect_buffers` is set and
    /// the paired command had no byte-typed arguments.
    pub fn coerce_to_strings(self) -> Value {
        match self {
            Value::Bulk(Some(b)) => match String::from_utf8(b.to_vec()) {
                Ok(s) => Value::SimpleString(s),
                Err(e) => Value::Bulk(Some(Bytes::from(e.into_bytes()))),
            },
            Value::Array(Some(items)) => {
                Value::Array(Some(items.into_iter().map(Value::coerce_to_strings).collect()))
            }
            other => other,
        }
    }

    /// `hgetall`-style conversion: an even-length array becomes a mapping of
    /// first-element keys to second-element values. A zero-length or
    /// non-array reply yields `None`. Per DESIGN.md's resolution of Open
    /// Question 2, this is the single call site for this conversion.
    pub fn into_hash_mapping(self) -> Option<HashMap<String, Value>> {
        match self {
            Value::Array(Some(items)) if !items.is_empty() && items.len() % 2 == 0 => {
                let mut map = HashMap::with_capacity(items.len() / 2);
                let mut it = items.into_iter();
                while let (Some(key), Some(val)) = (it.next(), it.next()) {
                    let key = match key {
                        Value::SimpleString(s) => s,
                        Value::Bulk(Some(b)) => String::from_utf8_lossy(&b).into_owned(),
                        _ => continue,
                    };
                    map.insert(key, val);
                }
                Some(map)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_head_detects_pubsub_shape() {
        let v = Value::Array(Some(vec![
            Value::Bulk(Some(Bytes::from_static(b"message"))),
            Value::Bulk(Some(Bytes::from_static(b"ch1"))),
            Value::Bulk(Some(Bytes::from_static(b"hello"))),
        ]));
        assert_eq!(v.array_head().as_deref(), Some("message"));
    }

    #[test]
    fn hgetall_conversion_builds_map() {
        let v = Value::Array(Some(vec![
            Value::Bulk(Some(Bytes::from_static(b"a"))),
            Value::Bulk(Some(Bytes::from_static(b"1"))),
            Value::Bulk(Some(Bytes::from_static(b"b"))),
            Value::Bulk(Some(Bytes::from_static(b"2"))),
        ]));
        let map = v.into_hash_mapping().expect("even-length array converts");
        assert_eq!(map.get("a"), Some(&Value::Bulk(Some(Bytes::from_static(b"1")))));
        assert_eq!(map.get("b"), Some(&Value::Bulk(Some(Bytes::from_static(b"2")))));
    }

    #[test]
    fn hgetall_conversion_rejects_empty_array() {
        let v = Value::Array(Some(vec![]));
        assert!(v.into_hash_mapping().is_none());
    }

    #[test]
    fn hgetall_conversion_rejects_non_array() {
        assert!(Value::Integer(1).into_hash_mapping().is_none());
    }

    #[test]
    fn coerce_to_strings_is_recursive() {
        let v = Value::Array(Some(vec![Value::Bulk(Some(Bytes::from_static(b"hi")))]));
        let coerced = v.coerce_to_strings();
        assert_eq!(
            coerced,
            Value::Array(Some(vec![Value::SimpleString("hi".into())]))
        );
    }
}
