//! Bounded FIFO queues for rate-limited outbound messages.

use std::collections::VecDeque;
use std::fmt;

use slirc_wire::Message;
use tokio::time::Instant;

/// Outbound traffic categories with independent limiters and queues.
///
/// Requests within a category are delivered in FIFO order; there is no
/// ordering guarantee across categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Chat messages (PRIVMSG).
    Message,
    /// Channel membership changes (JOIN/PART).
    Join,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Message => f.write_str("message"),
            Category::Join => f.write_str("join"),
        }
    }
}

/// A queued outbound message.
#[derive(Debug)]
pub struct Pending {
    /// The message awaiting admission.
    pub message: Message,
    /// When the message was queued.
    pub enqueued_at: Instant,
}

/// A bounded FIFO of outbound messages denied by the rate limiter.
///
/// The bound is the backpressure decision: enqueueing past `cap` is
/// rejected so sustained overload surfaces to the caller instead of
/// growing memory without limit. Existing entries are never dropped.
#[derive(Debug)]
pub struct PendingQueue {
    entries: VecDeque<Pending>,
    cap: usize,
}

impl PendingQueue {
    /// Create a queue bounded at `cap` entries.
    pub fn new(cap: usize) -> Self {
        PendingQueue {
            entries: VecDeque::new(),
            cap,
        }
    }

    /// Append a message; `false` when the queue is at capacity.
    pub fn push(&mut self, message: Message, now: Instant) -> bool {
        if self.entries.len() >= self.cap {
            return false;
        }
        self.entries.push_back(Pending {
            message,
            enqueued_at: now,
        });
        true
    }

    /// Remove and return the oldest entry.
    pub fn pop(&mut self) -> Option<Pending> {
        self.entries.pop_front()
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Discard all entries (connection teardown).
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
