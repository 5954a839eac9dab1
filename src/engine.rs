//! Engine task, caller handle, and reconnection supervision.
//!
//! The engine is a single task owning the connection lifecycle. Callers
//! hold a cloneable [`EngineHandle`]; every call is marshaled onto the
//! task through a command channel and answered over a oneshot, so all
//! protocol state is mutated from exactly one place.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::backoff::ReconnectPolicy;
use crate::config::EngineConfig;
use crate::connection::{Cmd, ConnState, SendStatus, Session, SessionEnd};
use crate::error::EngineError;
use crate::event::Event;
use crate::registry::Channel;
use crate::transport::{Transport, WebSocketTransport};

/// Stream of engine events, delivered in arrival order.
pub type EventStream = mpsc::UnboundedReceiver<Event>;

/// The connection engine. Spawned once; owns its transport, limiters,
/// queues, and registry for as long as the task lives.
pub struct Engine<T: Transport> {
    config: EngineConfig,
    transport: T,
    commands: mpsc::UnboundedReceiver<Cmd>,
    events: mpsc::UnboundedSender<Event>,
    reconnect: ReconnectPolicy,
}

impl Engine<WebSocketTransport> {
    /// Spawn an engine over the production WebSocket transport.
    ///
    /// Returns the caller handle and the event stream. The engine stays
    /// disconnected until [`EngineHandle::connect`] is called, and shuts
    /// down when every handle is dropped.
    pub fn spawn(config: EngineConfig) -> (EngineHandle, EventStream) {
        Engine::spawn_with_transport(config, WebSocketTransport)
    }
}

impl<T: Transport> Engine<T> {
    /// Spawn an engine over a caller-provided transport.
    pub fn spawn_with_transport(config: EngineConfig, transport: T) -> (EngineHandle, EventStream) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let reconnect = ReconnectPolicy::new(
            config.reconnect.base_delay(),
            config.reconnect.cap_delay(),
            config.reconnect.max_attempts,
        );
        let engine = Engine {
            config,
            transport,
            commands: cmd_rx,
            events: event_tx,
            reconnect,
        };
        tokio::spawn(engine.run());
        (EngineHandle { commands: cmd_tx }, event_rx)
    }

    /// Task body: idle until a connect request, then run a supervised
    /// connect cycle; repeat until every handle is gone.
    async fn run(mut self) {
        while let Some(cmd) = self.commands.recv().await {
            match cmd {
                Cmd::Connect { reply } => {
                    let _ = reply.send(Ok(()));
                    self.run_supervised().await;
                }
                Cmd::Disconnect { reply } => {
                    // Already disconnected; a no-op close succeeds.
                    let _ = reply.send(Ok(()));
                }
                Cmd::Channels { reply } => {
                    let _ = reply.send(Vec::new());
                }
                other => other.reject(EngineError::NotReady(ConnState::Disconnected)),
            }
        }
        debug!("all handles dropped; engine stopping");
    }

    /// One connect cycle: sessions and supervised retries. Returns once
    /// the engine is staying disconnected, whether from a caller close,
    /// an auth failure, or an exhausted retry budget.
    async fn run_supervised(&mut self) {
        self.reconnect.reset();
        loop {
            match self.connect_once().await {
                SessionEnd::Closed => return,
                SessionEnd::AuthFailed(reason) => {
                    warn!(reason, "authentication failed");
                    let _ = self.events.send(Event::AuthFailed { reason });
                    return;
                }
                SessionEnd::TransportLost { reason, was_ready } => {
                    warn!(reason, "connection lost");
                    let _ = self.events.send(Event::ConnectionLost { reason });
                    if was_ready {
                        self.reconnect.reset();
                    }
                    match self.reconnect.next_delay() {
                        Some(delay) => {
                            let attempt = self.reconnect.attempt();
                            info!(attempt, ?delay, "scheduling reconnect");
                            let _ = self.events.send(Event::ReconnectScheduled { attempt, delay });
                            if !self.wait_backoff(delay).await {
                                return;
                            }
                        }
                        None => {
                            let attempts = self.reconnect.max_attempts();
                            warn!(attempts, "reconnect attempts exhausted");
                            let _ = self.events.send(Event::ReconnectExhausted { attempts });
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Open the transport and run one session to completion. Commands
    /// arriving while the transport opens are still served.
    async fn connect_once(&mut self) -> SessionEnd {
        info!(url = %self.config.url, "connecting");
        let url = self.config.url.clone();
        let open = self.transport.open(&url);
        tokio::pin!(open);

        let conn = loop {
            tokio::select! {
                result = &mut open => match result {
                    Ok(conn) => break conn,
                    Err(e) => {
                        return SessionEnd::TransportLost {
                            reason: e.to_string(),
                            was_ready: false,
                        };
                    }
                },
                cmd = self.commands.recv() => match cmd {
                    Some(Cmd::Disconnect { reply }) => {
                        let _ = reply.send(Ok(()));
                        let _ = self.events.send(Event::Disconnected);
                        return SessionEnd::Closed;
                    }
                    Some(Cmd::Connect { reply }) => {
                        let _ = reply.send(Err(EngineError::AlreadyConnected));
                    }
                    Some(other) => other.reject(EngineError::NotReady(ConnState::Connecting)),
                    None => return SessionEnd::Closed,
                },
            }
        };

        let session = Session::new(conn, &self.config, self.events.clone());
        session.run(&mut self.commands).await
    }

    /// Sleep out the backoff delay while still serving commands. Returns
    /// `false` when the wait was cancelled (disconnect or shutdown).
    async fn wait_backoff(&mut self, delay: Duration) -> bool {
        let wakeup = sleep(delay);
        tokio::pin!(wakeup);
        loop {
            tokio::select! {
                _ = &mut wakeup => return true,
                cmd = self.commands.recv() => match cmd {
                    Some(Cmd::Disconnect { reply }) => {
                        debug!("reconnect cancelled by caller");
                        let _ = reply.send(Ok(()));
                        let _ = self.events.send(Event::Disconnected);
                        return false;
                    }
                    Some(Cmd::Connect { reply }) => {
                        let _ = reply.send(Err(EngineError::AlreadyConnected));
                    }
                    Some(other) => other.reject(EngineError::NotReady(ConnState::Disconnected)),
                    None => return false,
                },
            }
        }
    }
}

/// Cloneable caller handle; all calls run on the engine task.
///
/// The engine is single-owner by design: handles never touch connection
/// state directly, they enqueue commands and await replies.
#[derive(Clone)]
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<Cmd>,
}

impl EngineHandle {
    async fn request<R>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<R, EngineError>>) -> Cmd,
    ) -> Result<R, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .map_err(|_| EngineError::Terminated)?;
        rx.await.map_err(|_| EngineError::Terminated)?
    }

    /// Connect to the configured server; also resumes after an auth
    /// failure or an exhausted reconnect budget.
    ///
    /// Resolves once the request is accepted; readiness is signaled by
    /// [`Event::Ready`].
    pub async fn connect(&self) -> Result<(), EngineError> {
        self.request(|reply| Cmd::Connect { reply }).await
    }

    /// Close the connection. Cancels pending timers, queues, and any
    /// scheduled reconnect; never triggers the supervisor.
    pub async fn disconnect(&self) -> Result<(), EngineError> {
        self.request(|reply| Cmd::Disconnect { reply }).await
    }

    /// Send a chat message to a channel. Fails immediately with
    /// [`EngineError::NotReady`] unless the connection is `Ready`.
    pub async fn privmsg(
        &self,
        channel: impl Into<String>,
        text: impl Into<String>,
    ) -> Result<SendStatus, EngineError> {
        let channel = channel.into();
        let text = text.into();
        self.request(|reply| Cmd::Privmsg {
            channel,
            text,
            reply,
        })
        .await
    }

    /// Join a channel (leading `#` optional). The registry entry is
    /// created eagerly; confirmation arrives as [`Event::ChannelJoined`].
    pub async fn join(&self, channel: impl Into<String>) -> Result<SendStatus, EngineError> {
        let channel = channel.into();
        self.request(|reply| Cmd::Join { channel, reply }).await
    }

    /// Leave a channel. The registry entry is removed when the server
    /// confirms, arriving as [`Event::ChannelLeft`].
    pub async fn part(
        &self,
        channel: impl Into<String>,
        reason: Option<String>,
    ) -> Result<SendStatus, EngineError> {
        let channel = channel.into();
        self.request(|reply| Cmd::Part {
            channel,
            reason,
            reply,
        })
        .await
    }

    /// Snapshot the tracked channels; empty while disconnected.
    pub async fn channels(&self) -> Result<Vec<Channel>, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Cmd::Channels { reply: tx })
            .map_err(|_| EngineError::Terminated)?;
        rx.await.map_err(|_| EngineError::Terminated)
    }
}
