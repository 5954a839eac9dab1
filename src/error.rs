//! Engine error taxonomy.
//!
//! Decode errors never surface here: malformed inbound lines are logged,
//! reported as events, and skipped. Rate-limit denial is not an error
//! either; denied requests queue transparently. What remains is the
//! caller-facing taxonomy below.

use thiserror::Error;

use crate::connection::ConnState;
use crate::queue::Category;
use crate::transport::TransportError;

/// Errors surfaced to engine callers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// The connection is not in the `Ready` state; the request was not
    /// queued.
    #[error("connection not ready (state: {0})")]
    NotReady(ConnState),

    /// Authentication was rejected or timed out. Not retried with the
    /// same credentials.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The reconnect attempt budget is spent; an explicit `connect()`
    /// resumes.
    #[error("reconnection exhausted after {attempts} attempts")]
    ReconnectExhausted {
        /// Attempts that were made.
        attempts: u32,
    },

    /// The outbound queue for this category is at capacity; the request
    /// was rejected, queued entries are preserved.
    #[error("outbound {category} queue full")]
    QueueFull {
        /// Which category's queue overflowed.
        category: Category,
    },

    /// A transport-level failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// `connect()` while a connection attempt or session is active.
    #[error("already connected")]
    AlreadyConnected,

    /// The engine task has shut down.
    #[error("engine terminated")]
    Terminated,
}
