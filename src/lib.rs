//! An async client core for a Redis-style key-value server.
//!
//! This crate implements the connection lifecycle, the request/reply protocol
//! engine, command pipelining, and the pub/sub modal overlay for a single
//! duplex connection. It does not implement clustering, sentinel discovery,
//! connection pooling, TLS, or wire compression, and it does not ship the
//! full server command catalog — only a representative set plus the
//! special-shaped commands (`hmset`, `eval`, `set`, `select`, `auth`, the
//! subscribe family).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use redis_engine::{Client, ClientOptions, RedisCommands};
//!
//! # async fn example() -> redis_engine::RedisResult<()> {
//! let (mut client, mut events) = Client::connect("127.0.0.1:6379", ClientOptions::default()).await?;
//!
//! tokio::spawn(async move {
//!     while let Some(event) = events.recv().await {
//!         tracing::debug!(?event, "redis event");
//!     }
//! });
//!
//! client.set("foo", Some("bar")).await?;
//! let value = client.get("foo").await?;
//! # let _ = value;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! * [`parser`] — the push-based reply decoder (`ReplyParser` trait, `StackParser` impl).
//! * [`encode`] — multi-bulk request encoding.
//! * [`queue`] — the offline and pending FIFOs.
//! * [`engine`] — the connection state machine and the task that owns the transport.
//! * [`pubsub`] — subscription tracking and push/pipeline dispatch routing.
//! * [`commands`] — the command surface (`RedisCommands` trait).
//! * [`client`] — the public `Client` handle and construction API.

pub mod client;
pub mod command;
pub mod commands;
pub mod encode;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod events;
mod macros;
pub mod options;
pub mod parser;
pub mod pubsub;
pub mod queue;
pub mod value;

pub use client::Client;
pub use commands::RedisCommands;
pub use endpoint::{Endpoint, EndpointError};
pub use error::{RedisError, RedisResult};
pub use events::Event;
pub use options::ClientOptions;
pub use value::Value;
