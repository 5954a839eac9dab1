//! Connection state machine: one session over one transport connection.
//!
//! A session owns the transport, the per-connection registry, both rate
//! limiters, and both outbound queues, and runs them from a single
//! `tokio::select!` loop:
//!
//! ```text
//!                ┌──────────────────────────────────────────┐
//!                │              Session task                │
//!   transport ──▶│ read_line ─▶ decode ─▶ registry ─▶ events│──▶ event sink
//!                │                                          │
//!   handle    ──▶│ commands ─▶ limiter ─▶ write / queue     │──▶ transport
//!                │                ▲                         │
//!                │   drain tick ──┘   keepalive, auth timer │
//!                └──────────────────────────────────────────┘
//! ```
//!
//! Lifecycle: `Disconnected → Connecting → Connected → Authenticating →
//! Ready → Closing → Disconnected`. Outbound JOIN/PRIVMSG/PART requests
//! are admitted to rate limiting only in `Ready`; in any other state they
//! fail synchronously with a not-ready error. Registry mutation always
//! happens before the corresponding event is emitted.

use std::fmt;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, sleep_until, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use slirc_wire::{CapSubCommand, Command, Message};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::event::Event;
use crate::limiter::RateLimiter;
use crate::queue::{Category, PendingQueue};
use crate::registry::{normalize_channel, Channel, ChannelRegistry, MembershipChange};
use crate::transport::{TransportConn, TransportError};

/// Keepalive interval stand-in when client pings are disabled; the tick
/// fires but does nothing.
const KEEPALIVE_FALLBACK: Duration = Duration::from_secs(3600);

/// Connection lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// No transport.
    Disconnected,
    /// Transport being opened.
    Connecting,
    /// Transport open; handshake sent, awaiting server acknowledgment.
    Connected,
    /// Handshake acknowledged; awaiting the welcome reply.
    Authenticating,
    /// Fully registered; outbound requests are admitted.
    Ready,
    /// Caller-initiated teardown in progress.
    Closing,
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnState::Disconnected => "disconnected",
            ConnState::Connecting => "connecting",
            ConnState::Connected => "connected",
            ConnState::Authenticating => "authenticating",
            ConnState::Ready => "ready",
            ConnState::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// Whether an admitted request went straight out or was queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    /// Written to the transport immediately.
    Sent,
    /// Held in the category queue until the limiter admits it.
    Queued,
}

/// A caller reply slot.
pub(crate) type ReplyTo<T> = oneshot::Sender<Result<T, EngineError>>;

/// Commands marshaled from [`EngineHandle`](crate::EngineHandle) onto the
/// engine task.
pub(crate) enum Cmd {
    /// Begin connecting (only meaningful while disconnected).
    Connect { reply: ReplyTo<()> },
    /// Close the connection; cancels pending timers, queues, and retries.
    Disconnect { reply: ReplyTo<()> },
    /// Send a chat message.
    Privmsg {
        channel: String,
        text: String,
        reply: ReplyTo<SendStatus>,
    },
    /// Join a channel.
    Join {
        channel: String,
        reply: ReplyTo<SendStatus>,
    },
    /// Leave a channel.
    Part {
        channel: String,
        reason: Option<String>,
        reply: ReplyTo<SendStatus>,
    },
    /// Snapshot the channel registry.
    Channels {
        reply: oneshot::Sender<Vec<Channel>>,
    },
}

impl Cmd {
    /// Fail the command with `err` without performing it.
    pub(crate) fn reject(self, err: EngineError) {
        match self {
            Cmd::Connect { reply } => {
                let _ = reply.send(Err(err));
            }
            Cmd::Disconnect { reply } => {
                let _ = reply.send(Err(err));
            }
            Cmd::Privmsg { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Cmd::Join { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Cmd::Part { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Cmd::Channels { reply } => {
                let _ = reply.send(Vec::new());
            }
        }
    }
}

/// Why a session ended; drives the reconnection supervisor.
#[derive(Debug)]
pub(crate) enum SessionEnd {
    /// The caller closed the connection (or every handle is gone).
    /// Never supervised.
    Closed,
    /// Authentication failed. Never supervised.
    AuthFailed(String),
    /// The transport failed or the server closed on us. Supervised.
    TransportLost {
        reason: String,
        /// Whether this session reached `Ready` (resets the backoff).
        was_ready: bool,
    },
}

/// Why a submitted request could not be accepted.
enum SubmitFailure {
    /// The category queue is at capacity.
    QueueFull,
    /// The transport write failed; the session is over.
    Transport(TransportError),
}

/// One connection's state, driven by [`run`](Session::run).
pub(crate) struct Session<C: TransportConn> {
    conn: C,
    state: ConnState,
    nick: String,
    was_ready: bool,
    registry: ChannelRegistry,
    message_limiter: RateLimiter,
    join_limiter: RateLimiter,
    message_queue: PendingQueue,
    join_queue: PendingQueue,
    events: mpsc::UnboundedSender<Event>,
    config: EngineConfig,
}

impl<C: TransportConn> Session<C> {
    pub(crate) fn new(
        conn: C,
        config: &EngineConfig,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Session {
            conn,
            state: ConnState::Connecting,
            nick: config.nickname.clone(),
            was_ready: false,
            registry: ChannelRegistry::new(),
            message_limiter: RateLimiter::new(
                config.limits.message_limit,
                config.limits.message_window(),
            ),
            join_limiter: RateLimiter::new(config.limits.join_limit, config.limits.join_window()),
            message_queue: PendingQueue::new(config.limits.queue_cap),
            join_queue: PendingQueue::new(config.limits.queue_cap),
            events,
            config: config.clone(),
        }
    }

    /// Drive the session until it ends. Timers are locals of this scope,
    /// so ending the session cancels them; the queues die with `self`.
    pub(crate) async fn run(mut self, commands: &mut mpsc::UnboundedReceiver<Cmd>) -> SessionEnd {
        if let Err(e) = self.handshake().await {
            return self.lost(e.to_string());
        }

        let drain_period = self.config.timing.drain_interval();
        let mut drain = interval_at(Instant::now() + drain_period, drain_period);
        drain.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let keepalive_period = self.config.timing.keepalive().unwrap_or(KEEPALIVE_FALLBACK);
        let mut keepalive = interval_at(Instant::now() + keepalive_period, keepalive_period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let auth_timeout = sleep_until(Instant::now() + self.config.timing.auth_timeout());
        tokio::pin!(auth_timeout);

        loop {
            tokio::select! {
                inbound = self.conn.read_line() => match inbound {
                    Some(Ok(line)) => {
                        if let Err(end) = self.handle_line(&line).await {
                            return end;
                        }
                    }
                    Some(Err(e)) => return self.lost(e.to_string()),
                    None => return self.lost("connection closed by server".to_owned()),
                },

                cmd = commands.recv() => match cmd {
                    Some(cmd) => {
                        if let Some(end) = self.handle_cmd(cmd).await {
                            return end;
                        }
                    }
                    None => {
                        self.conn.close().await;
                        return SessionEnd::Closed;
                    }
                },

                _ = drain.tick() => {
                    if self.state == ConnState::Ready {
                        if let Err(e) = self.drain_queues().await {
                            return self.lost(e.to_string());
                        }
                    }
                },

                _ = keepalive.tick() => {
                    if self.config.timing.keepalive().is_some() && self.state == ConnState::Ready {
                        if let Err(e) = self.write(Message::ping(Some(self.nick.clone()))).await {
                            return self.lost(e.to_string());
                        }
                    }
                },

                _ = &mut auth_timeout, if self.state != ConnState::Ready => {
                    return SessionEnd::AuthFailed("no welcome from server before deadline".to_owned());
                },
            }
        }
    }

    fn lost(&self, reason: String) -> SessionEnd {
        SessionEnd::TransportLost {
            reason,
            was_ready: self.was_ready,
        }
    }

    /// Capability negotiation and credentials, sent on transport open.
    async fn handshake(&mut self) -> Result<(), TransportError> {
        self.state = ConnState::Connected;
        let _ = self.events.send(Event::Connected);

        if !self.config.capabilities.is_empty() {
            self.write(Message::cap_req(&self.config.capabilities)).await?;
        }
        if let Some(token) = self.config.token.clone() {
            self.write(Message::pass(token)).await?;
        }
        self.write(Message::nick(self.config.nickname.clone())).await?;

        if self.config.capabilities.is_empty() {
            // Nothing to acknowledge; wait straight for the welcome.
            self.state = ConnState::Authenticating;
        }
        Ok(())
    }

    async fn write(&mut self, message: Message) -> Result<(), TransportError> {
        let line = message.to_string();
        debug!(line = %line.trim_end(), "send");
        self.conn.write_line(&line).await
    }

    /// Decode one inbound line; decode failures are reported and skipped,
    /// never fatal.
    async fn handle_line(&mut self, line: &str) -> Result<(), SessionEnd> {
        let message: Message = match line.parse() {
            Ok(message) => message,
            Err(e) => {
                warn!(line, error = %e, "skipping undecodable line");
                let _ = self.events.send(Event::DecodeError {
                    line: line.to_owned(),
                    reason: e.to_string(),
                });
                return Ok(());
            }
        };
        self.dispatch(line, message).await
    }

    /// Apply a decoded message: protocol reflexes first, registry
    /// mutation second, events last.
    async fn dispatch(&mut self, line: &str, message: Message) -> Result<(), SessionEnd> {
        let sender = message.source_nickname().map(str::to_owned);
        let mut changes: Vec<MembershipChange> = Vec::new();
        let mut followups: Vec<Event> = Vec::new();
        let mut end: Option<SessionEnd> = None;

        match &message.command {
            Command::PING(token) => {
                let pong = Message::pong(token.clone());
                if let Err(e) = self.write(pong).await {
                    end = Some(self.lost(e.to_string()));
                }
            }
            Command::PONG(_) => {}
            Command::JOIN(channel) => {
                if let Some(nick) = sender.as_deref() {
                    changes.push(self.registry.apply_join(channel, nick, &self.nick));
                }
            }
            Command::PART(channel, _) => {
                if let Some(nick) = sender.as_deref() {
                    changes.push(self.registry.apply_part(channel, nick, &self.nick));
                }
            }
            Command::PRIVMSG(target, text) => {
                followups.push(Event::Privmsg {
                    target: target.clone(),
                    sender: sender.clone().unwrap_or_default(),
                    text: text.clone(),
                    tags: message.tags.clone(),
                });
            }
            Command::NOTICE(target, text) => {
                if target == "*" && self.state != ConnState::Ready {
                    // The reference server rejects credentials with a
                    // NOTICE to "*" instead of a numeric.
                    end = Some(SessionEnd::AuthFailed(text.clone()));
                } else {
                    followups.push(Event::Notice {
                        target: target.clone(),
                        text: text.clone(),
                    });
                }
            }
            Command::CAP(_, CapSubCommand::ACK, _) => {
                if self.state == ConnState::Connected {
                    self.state = ConnState::Authenticating;
                }
            }
            Command::CAP(_, CapSubCommand::NAK, caps) => {
                followups.push(Event::ProtocolError {
                    reason: format!(
                        "server rejected capabilities: {}",
                        caps.as_deref().unwrap_or("(unspecified)")
                    ),
                });
                if self.state == ConnState::Connected {
                    self.state = ConnState::Authenticating;
                }
            }
            Command::CAP(_, _, _) => {}
            Command::Reply(1, params) => {
                if self.state != ConnState::Ready {
                    if let Some(assigned) = params.first() {
                        if !assigned.is_empty() {
                            self.nick = assigned.clone();
                        }
                    }
                    self.state = ConnState::Ready;
                    self.was_ready = true;
                    info!(nick = %self.nick, "registered with server");
                    followups.push(Event::Ready {
                        nickname: self.nick.clone(),
                    });
                }
            }
            Command::Reply(353, params) => {
                if params.len() >= 2 {
                    let names = &params[params.len() - 1];
                    let channel = &params[params.len() - 2];
                    self.registry.apply_names(channel, names, &self.nick);
                }
            }
            Command::Reply(464, params) => {
                let reason = params
                    .last()
                    .cloned()
                    .unwrap_or_else(|| "password mismatch".to_owned());
                end = Some(SessionEnd::AuthFailed(reason));
            }
            Command::Reply(_, _) => {}
            Command::Raw(name, _) if name == "RECONNECT" => {
                info!("server requested reconnect");
                end = Some(self.lost("server requested reconnect".to_owned()));
            }
            Command::Raw(_, _) | Command::NICK(_) | Command::PASS(_) => {}
            _ => {}
        }

        let _ = self.events.send(Event::Raw {
            line: line.to_owned(),
            message,
        });
        for change in changes {
            self.emit_change(change);
        }
        for event in followups {
            let _ = self.events.send(event);
        }

        match end {
            Some(end) => Err(end),
            None => Ok(()),
        }
    }

    fn emit_change(&self, change: MembershipChange) {
        let event = match change {
            MembershipChange::LocalJoined { channel } => Event::ChannelJoined { channel },
            MembershipChange::LocalParted { channel } => Event::ChannelLeft { channel },
            MembershipChange::UserJoined { channel, nickname } => {
                Event::UserJoined { channel, nickname }
            }
            MembershipChange::UserLeft { channel, nickname } => {
                Event::UserLeft { channel, nickname }
            }
            MembershipChange::NoChange => return,
        };
        let _ = self.events.send(event);
    }

    /// Serve one caller command. Returns the session end when the command
    /// finishes the session.
    pub(crate) async fn handle_cmd(&mut self, cmd: Cmd) -> Option<SessionEnd> {
        match cmd {
            Cmd::Connect { reply } => {
                let _ = reply.send(Err(EngineError::AlreadyConnected));
                None
            }
            Cmd::Disconnect { reply } => {
                self.state = ConnState::Closing;
                self.message_queue.clear();
                self.join_queue.clear();
                self.conn.close().await;
                self.state = ConnState::Disconnected;
                info!("disconnected at caller request");
                let _ = self.events.send(Event::Disconnected);
                let _ = reply.send(Ok(()));
                Some(SessionEnd::Closed)
            }
            Cmd::Privmsg {
                channel,
                text,
                reply,
            } => {
                if self.state != ConnState::Ready {
                    let _ = reply.send(Err(EngineError::NotReady(self.state)));
                    return None;
                }
                let channel = normalize_channel(&channel);
                let outcome = self
                    .submit(Category::Message, Message::privmsg(channel, text))
                    .await;
                self.finish_send(Category::Message, outcome, reply)
            }
            Cmd::Join { channel, reply } => {
                if self.state != ConnState::Ready {
                    let _ = reply.send(Err(EngineError::NotReady(self.state)));
                    return None;
                }
                let channel = normalize_channel(&channel);
                self.registry.track_pending(&channel);
                let outcome = self.submit(Category::Join, Message::join(channel)).await;
                self.finish_send(Category::Join, outcome, reply)
            }
            Cmd::Part {
                channel,
                reason,
                reply,
            } => {
                if self.state != ConnState::Ready {
                    let _ = reply.send(Err(EngineError::NotReady(self.state)));
                    return None;
                }
                let channel = normalize_channel(&channel);
                let outcome = self
                    .submit(Category::Join, Message::part(channel, reason))
                    .await;
                self.finish_send(Category::Join, outcome, reply)
            }
            Cmd::Channels { reply } => {
                let _ = reply.send(self.registry.channels().cloned().collect());
                None
            }
        }
    }

    fn finish_send(
        &mut self,
        category: Category,
        outcome: Result<SendStatus, SubmitFailure>,
        reply: ReplyTo<SendStatus>,
    ) -> Option<SessionEnd> {
        match outcome {
            Ok(status) => {
                let _ = reply.send(Ok(status));
                None
            }
            Err(SubmitFailure::QueueFull) => {
                warn!(%category, "outbound queue full; rejecting request");
                let _ = reply.send(Err(EngineError::QueueFull { category }));
                None
            }
            Err(SubmitFailure::Transport(e)) => {
                let reason = e.to_string();
                let _ = reply.send(Err(EngineError::Transport(e)));
                Some(self.lost(reason))
            }
        }
    }

    /// Admit an outbound request: immediate write when the limiter allows
    /// and nothing is already queued (FIFO within a category), otherwise
    /// queue it for the drain tick.
    async fn submit(
        &mut self,
        category: Category,
        message: Message,
    ) -> Result<SendStatus, SubmitFailure> {
        let now = Instant::now();
        let queue_empty = match category {
            Category::Message => self.message_queue.is_empty(),
            Category::Join => self.join_queue.is_empty(),
        };
        let admitted = queue_empty
            && match category {
                Category::Message => self.message_limiter.check(now),
                Category::Join => self.join_limiter.check(now),
            };

        if admitted {
            self.write(message)
                .await
                .map_err(SubmitFailure::Transport)?;
            return Ok(SendStatus::Sent);
        }

        let queue = match category {
            Category::Message => &mut self.message_queue,
            Category::Join => &mut self.join_queue,
        };
        if !queue.push(message, now) {
            return Err(SubmitFailure::QueueFull);
        }
        debug!(%category, depth = queue.len(), "rate limited; request queued");
        Ok(SendStatus::Queued)
    }

    /// Send queued messages, oldest first, while the limiters admit.
    async fn drain_queues(&mut self) -> Result<(), TransportError> {
        loop {
            if self.message_queue.is_empty() {
                break;
            }
            if !self.message_limiter.check(Instant::now()) {
                break;
            }
            let Some(pending) = self.message_queue.pop() else {
                break;
            };
            self.write(pending.message).await?;
        }
        loop {
            if self.join_queue.is_empty() {
                break;
            }
            if !self.join_limiter.check(Instant::now()) {
                break;
            }
            let Some(pending) = self.join_queue.pop() else {
                break;
            };
            self.write(pending.message).await?;
        }
        Ok(())
    }
}
