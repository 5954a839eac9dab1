//! # slirc-client
//!
//! A chat client engine speaking IRC over WebSocket, for servers in the
//! style of large chat deployments: one logical connection, typed wire
//! codec, server-mandated sliding-window rate limits with transparent
//! queueing, per-channel membership tracking, and supervised reconnection
//! with exponential backoff.
//!
//! The engine runs as a single task; callers interact through a
//! cloneable [`EngineHandle`] and receive typed [`Event`]s:
//!
//! ```no_run
//! use slirc_client::{Engine, EngineConfig, Event};
//!
//! # async fn demo() -> Result<(), slirc_client::EngineError> {
//! let mut config = EngineConfig::new("wss://irc-ws.chat.example.net", "mybot");
//! config.token = Some("opaque-token".into());
//! config.capabilities = vec!["message-tags".into()];
//!
//! let (handle, mut events) = Engine::spawn(config);
//! handle.connect().await?;
//!
//! while let Some(event) = events.recv().await {
//!     match event {
//!         Event::Ready { .. } => {
//!             handle.join("#lobby").await?;
//!         }
//!         Event::Privmsg { target, sender, text, .. } => {
//!             println!("[{target}] <{sender}> {text}");
//!         }
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Decoding, rate limiting, queue draining, registry updates, and
//! reconnect scheduling all happen on the engine task, so protocol state
//! is totally ordered: messages dispatch in arrival order, and requests
//! within a category go out FIFO.

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod backoff;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod event;
pub mod limiter;
pub mod queue;
pub mod registry;
pub mod transport;

pub use self::config::{
    ConfigError, EngineConfig, RateLimitConfig, ReconnectConfig, TimingConfig,
};
pub use self::connection::{ConnState, SendStatus};
pub use self::engine::{Engine, EngineHandle, EventStream};
pub use self::error::EngineError;
pub use self::event::Event;
pub use self::queue::Category;
pub use self::registry::Channel;
pub use self::transport::{Transport, TransportConn, TransportError, WebSocketTransport};

/// Re-export of the wire codec crate.
pub use slirc_wire as wire;
