//! # slirc-wire
//!
//! Wire codec for the Straylight chat client engine: parsing and
//! serializing the IRC line format spoken by IRC-over-WebSocket chat
//! servers, including IRCv3 message tags.
//!
//! The codec is pure: no I/O, no clocks, no connection state. A line of
//! input either decodes into a [`Message`] or fails with a [`ParseError`];
//! serializing a [`Message`] via `Display` is the exact inverse of
//! decoding for every well-formed command/parameter combination.
//!
//! ## Parsing
//!
//! ```rust
//! use slirc_wire::{Command, Message};
//!
//! let raw = "@badges=subscriber/6 :nick!nick@host.tv PRIVMSG #chan :Hello!";
//! let msg: Message = raw.parse().unwrap();
//!
//! assert_eq!(msg.tag_value("badges"), Some("subscriber/6"));
//! assert_eq!(msg.source_nickname(), Some("nick"));
//! assert!(matches!(msg.command, Command::PRIVMSG(_, _)));
//! ```
//!
//! ## Constructing
//!
//! ```rust
//! use slirc_wire::Message;
//!
//! let msg = Message::privmsg("#chan", "Hello world!");
//! assert_eq!(msg.to_string(), "PRIVMSG #chan :Hello world!\r\n");
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod command;
pub mod error;
pub mod message;
pub mod prefix;
pub mod tags;

pub use self::command::{CapSubCommand, Command};
pub use self::error::ParseError;
pub use self::message::Message;
pub use self::prefix::Prefix;
pub use self::tags::Tag;

/// Maximum length of a single IRC line (modern convention, tags included).
pub const MAX_LINE_LEN: usize = 8191;

/// Maximum number of command parameters (RFC 2812).
pub const MAX_PARAMS: usize = 15;
