//! Events emitted to the engine's subscriber.

use std::time::Duration;

use slirc_wire::{Message, Tag};

/// Typed protocol events delivered to the event sink.
///
/// The engine does not retain subscriber state; events are pushed onto
/// the channel returned by [`Engine::spawn`](crate::Engine::spawn) in
/// arrival order.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum Event {
    /// The transport connection is established (before authentication).
    Connected,
    /// Authentication confirmed; outbound requests are now admitted.
    Ready {
        /// Nickname the server registered us under.
        nickname: String,
    },
    /// Authentication failed; the engine will not retry on its own.
    AuthFailed {
        /// Human-readable reason.
        reason: String,
    },
    /// The transport was lost unexpectedly.
    ConnectionLost {
        /// Human-readable reason.
        reason: String,
    },
    /// The connection was closed at the caller's request.
    Disconnected,
    /// A reconnect attempt has been scheduled.
    ReconnectScheduled {
        /// 1-based attempt number.
        attempt: u32,
        /// Delay before the attempt.
        delay: Duration,
    },
    /// Reconnect attempts are exhausted; a new `connect()` call resumes.
    ReconnectExhausted {
        /// Attempts that were made.
        attempts: u32,
    },
    /// The local user's membership in a channel is confirmed.
    ChannelJoined {
        /// Channel name.
        channel: String,
    },
    /// The local user left a channel; its registry entry is gone.
    ChannelLeft {
        /// Channel name.
        channel: String,
    },
    /// Another user joined a tracked channel.
    UserJoined {
        /// Channel name.
        channel: String,
        /// The user's nickname.
        nickname: String,
    },
    /// Another user left a tracked channel.
    UserLeft {
        /// Channel name.
        channel: String,
        /// The user's nickname.
        nickname: String,
    },
    /// A chat message.
    Privmsg {
        /// Message target (usually a channel).
        target: String,
        /// Sender nickname; empty if the prefix carried none.
        sender: String,
        /// Message text.
        text: String,
        /// Message tags.
        tags: Vec<Tag>,
    },
    /// A server notice.
    Notice {
        /// Notice target.
        target: String,
        /// Notice text.
        text: String,
    },
    /// Every successfully decoded line, in arrival order.
    Raw {
        /// The original wire line.
        line: String,
        /// The decoded message.
        message: Message,
    },
    /// A line that failed to decode and was skipped.
    DecodeError {
        /// The offending line.
        line: String,
        /// Why decoding failed.
        reason: String,
    },
    /// A non-fatal protocol irregularity (e.g. rejected capabilities).
    ProtocolError {
        /// Description of the irregularity.
        reason: String,
    },
}
