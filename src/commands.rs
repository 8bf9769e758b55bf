// ABOUTME: The RedisCommands trait — per-command entry points that normalize argument shapes
// ABOUTME: and forward to send_command; CATALOG carries the per-command readonly/key-index metadata

use crate::command::Arg;
use crate::error::{RedisError, RedisResult};
use crate::macros::redis_command;
use crate::value::Value;
use std::collections::HashMap;

/// Per-command metadata the teacher's `client/traits.rs` layered-trait design
/// would otherwise compute at load time from the server's `COMMAND` reply.
/// Kept as a static table instead, since this crate ships a fixed, curated
/// subset of the full command set rather than discovering it from the server.
#[derive(Debug, Clone, Copy)]
pub struct CommandMeta {
    pub name: &'static str,
    pub readonly: bool,
    pub first_key_index: usize,
}

pub const CATALOG: &[CommandMeta] = &[
    CommandMeta { name: "get", readonly: true, first_key_index: 1 },
    CommandMeta { name: "set", readonly: false, first_key_index: 1 },
    CommandMeta { name: "del", readonly: false, first_key_index: 1 },
    CommandMeta { name: "exists", readonly: true, first_key_index: 1 },
    CommandMeta { name: "expire", readonly: false, first_key_index: 1 },
    CommandMeta { name: "incr", readonly: false, first_key_index: 1 },
    CommandMeta { name: "hset", readonly: false, first_key_index: 1 },
    CommandMeta { name: "hget", readonly: true, first_key_index: 1 },
    CommandMeta { name: "hgetall", readonly: true, first_key_index: 1 },
    CommandMeta { name: "hmset", readonly: false, first_key_index: 1 },
    CommandMeta { name: "lpush", readonly: false, first_key_index: 1 },
    CommandMeta { name: "rpush", readonly: false, first_key_index: 1 },
    CommandMeta { name: "lrange", readonly: true, first_key_index: 1 },
    CommandMeta { name: "sadd", readonly: false, first_key_index: 1 },
    CommandMeta { name: "srem", readonly: false, first_key_index: 1 },
    CommandMeta { name: "smembers", readonly: true, first_key_index: 1 },
    CommandMeta { name: "eval", readonly: false, first_key_index: 0 },
    CommandMeta { name: "select", readonly: false, first_key_index: 0 },
    CommandMeta { name: "auth", readonly: false, first_key_index: 0 },
    CommandMeta { name: "subscribe", readonly: false, first_key_index: 0 },
    CommandMeta { name: "unsubscribe", readonly: false, first_key_index: 0 },
    CommandMeta { name: "psubscribe", readonly: false, first_key_index: 0 },
    CommandMeta { name: "punsubscribe", readonly: false, first_key_index: 0 },
    CommandMeta { name: "monitor", readonly: false, first_key_index: 0 },
    CommandMeta { name: "quit", readonly: false, first_key_index: 0 },
];

/// Looks up a command's catalog entry by its lowercase name.
pub fn lookup(name: &str) -> Option<&'static CommandMeta> {
    CATALOG.iter().find(|meta| meta.name == name)
}

/// The command surface. Implemented for [`crate::Client`]; every default
/// method normalizes its arguments and forwards to `send_command`, the sole
/// submission path per §4.4. Split out as a trait (rather than inherent
/// methods) so the normalization layer stays separable from the handle that
/// owns the submission channel, mirroring the teacher's layered
/// `client/traits.rs` design.
pub trait RedisCommands {
    /// The sole submission path: builds a `Command` from `args` and awaits
    /// its reply. Implementors own the channel into the engine task.
    async fn send_command(&mut self, args: Vec<Arg>) -> RedisResult<Value>;

    redis_command!(get, key);
    redis_command!(del, key);
    redis_command!(exists, key);
    redis_command!(expire, key, seconds);
    redis_command!(incr, key);
    redis_command!(hset, key, field, value);
    redis_command!(hget, key, field);
    redis_command!(lpush, key, value);
    redis_command!(rpush, key, value);
    redis_command!(lrange, key, start, stop);
    redis_command!(smembers, key);

    /// `SADD key member [member ...]`. Per §4.4's flattening rule for `sadd`,
    /// the caller passes every member at once rather than issuing one call
    /// per member.
    async fn sadd(
        &mut self,
        key: impl Into<Arg> + Send,
        members: Vec<impl Into<Arg> + Send>,
    ) -> RedisResult<Value> {
        let mut args = vec![Arg::from("sadd"), key.into()];
        args.extend(members.into_iter().map(Into::into));
        self.send_command(args).await
    }

    /// `SREM key member [member ...]`. Per §4.4's flattening rule for `srem`.
    async fn srem(
        &mut self,
        key: impl Into<Arg> + Send,
        members: Vec<impl Into<Arg> + Send>,
    ) -> RedisResult<Value> {
        let mut args = vec![Arg::from("srem"), key.into()];
        args.extend(members.into_iter().map(Into::into));
        self.send_command(args).await
    }

    /// Plain `SET key value`, with no expiry or existence modifier. An
    /// absent `value` is a validation failure per §4.4's "absent or null
    /// final value" rule, surfaced directly rather than reaching the wire —
    /// `Option` stands in for the source's null/undefined check, since a
    /// typed `Arg` has no null representation of its own.
    async fn set(
        &mut self,
        key: impl Into<Arg> + Send,
        value: Option<impl Into<Arg> + Send>,
    ) -> RedisResult<Value> {
        let value = value
            .map(Into::into)
            .ok_or_else(|| RedisError::Validation("set: value must not be null".into()))?;
        self.send_command(vec![Arg::from("set"), key.into(), value]).await
    }

    /// `SET key value` with an `EX`/`PX` expiry and/or an `NX`/`XX`
    /// existence modifier, per §4.6. `expiry` pairs a unit flag (`true` for
    /// `PX` milliseconds, `false` for `EX` seconds) with its magnitude.
    async fn set_with_options(
        &mut self,
        key: impl Into<Arg> + Send,
        value: Option<impl Into<Arg> + Send>,
        expiry: Option<(bool, i64)>,
        condition: Option<SetCondition>,
    ) -> RedisResult<Value> {
        let value = value
            .map(Into::into)
            .ok_or_else(|| RedisError::Validation("set: value must not be null".into()))?;
        let mut args = vec![Arg::from("set"), key.into(), value];
        if let Some((is_millis, magnitude)) = expiry {
            args.push(Arg::from(if is_millis { "PX" } else { "EX" }));
            args.push(Arg::from(magnitude));
        }
        if let Some(condition) = condition {
            args.push(Arg::from(condition.as_str()));
        }
        self.send_command(args).await
    }

    /// `HSET` once per field/value pair, per the entries of `fields` — the
    /// flattening `hmset` never got as its own verb after `HMSET` was folded
    /// into `HSET` server-side, kept here under its historical name since
    /// that's the irregular shape DESIGN NOTES §9 calls out.
    async fn hmset(
        &mut self,
        key: impl Into<Arg> + Send,
        fields: HashMap<String, String>,
    ) -> RedisResult<Value> {
        let mut args = vec![Arg::from("hmset"), key.into()];
        for (field, value) in fields {
            args.push(Arg::from(field));
            args.push(Arg::from(value));
        }
        self.send_command(args).await
    }

    /// `HGETALL key`, converted via [`Value::into_hash_mapping`] rather than
    /// left as a flat array — the one call site for that conversion per
    /// DESIGN.md's resolution of Open Question 2.
    async fn hgetall(&mut self, key: impl Into<Arg> + Send) -> RedisResult<HashMap<String, Value>> {
        let reply = self.send_command(vec![Arg::from("hgetall"), key.into()]).await?;
        Ok(reply.into_hash_mapping().unwrap_or_default())
    }

    /// `EVAL script numkeys key [key ...] arg [arg ...]`, splitting the
    /// combined `keys_and_args` into its `numkeys`-prefixed halves.
    async fn eval(
        &mut self,
        script: impl Into<Arg> + Send,
        keys: Vec<String>,
        extra_args: Vec<String>,
    ) -> RedisResult<Value> {
        let mut args = vec![Arg::from("eval"), script.into(), Arg::from(keys.len() as i64)];
        args.extend(keys.into_iter().map(Arg::from));
        args.extend(extra_args.into_iter().map(Arg::from));
        self.send_command(args).await
    }

    /// `SELECT db`. Tracked as `selected_db` by the engine so it is
    /// re-issued automatically after a reconnect.
    async fn select(&mut self, db: i64) -> RedisResult<Value> {
        self.send_command(vec![Arg::from("select"), Arg::from(db)]).await
    }

    /// `AUTH password`. Ordinarily issued automatically by the engine during
    /// the handshake when `auth_pass` is set; exposed here for re-auth on an
    /// already-ready connection.
    async fn auth(&mut self, password: impl Into<Arg> + Send) -> RedisResult<Value> {
        self.send_command(vec![Arg::from("auth"), password.into()]).await
    }

    /// `SUBSCRIBE channel`. One channel per call: the engine pairs each
    /// confirmation reply 1:1 with the pending-queue entry that produced it,
    /// so a single multi-channel `SUBSCRIBE` would desynchronize that
    /// pairing on its second and third confirmations. Subscribing to several
    /// channels means calling this once per channel.
    async fn subscribe(&mut self, channel: impl Into<Arg> + Send) -> RedisResult<Value> {
        self.send_command(vec![Arg::from("subscribe"), channel.into()]).await
    }

    /// `UNSUBSCRIBE channel`. Single-target for the same reason as
    /// [`RedisCommands::subscribe`].
    async fn unsubscribe(&mut self, channel: impl Into<Arg> + Send) -> RedisResult<Value> {
        self.send_command(vec![Arg::from("unsubscribe"), channel.into()]).await
    }

    /// `PSUBSCRIBE pattern`. Single-target for the same reason as
    /// [`RedisCommands::subscribe`].
    async fn psubscribe(&mut self, pattern: impl Into<Arg> + Send) -> RedisResult<Value> {
        self.send_command(vec![Arg::from("psubscribe"), pattern.into()]).await
    }

    /// `PUNSUBSCRIBE pattern`. Single-target for the same reason as
    /// [`RedisCommands::subscribe`].
    async fn punsubscribe(&mut self, pattern: impl Into<Arg> + Send) -> RedisResult<Value> {
        self.send_command(vec![Arg::from("punsubscribe"), pattern.into()]).await
    }
}

/// The `NX`/`XX` existence modifier for [`RedisCommands::set_with_options`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetCondition {
    IfNotExists,
    IfExists,
}

impl SetCondition {
    fn as_str(self) -> &'static str {
        match self {
            SetCondition::IfNotExists => "NX",
            SetCondition::IfExists => "XX",
        }
    }
}
