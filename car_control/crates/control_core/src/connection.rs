use crate::config::ControlConfig;
use crate::error::{ControlError, TransportError};
use crate::transport::{FrameSink, FrameStream, Transport};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use url::Url;

pub const COMMAND_CAP: usize = 256;
pub const EVENT_CAP: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    Closed,
    Error(String),
}

/// Everything the connection reports, delivered in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    Opened,
    Disconnected {
        reason: DisconnectReason,
        retry_in: Duration,
    },
    Message(String),
}

enum LinkCommand {
    Send(String),
    Shutdown,
}

/// The dispatcher's view of the connection.
pub trait Link {
    fn is_ready(&self) -> bool;
    fn send(&self, text: String) -> Result<(), ControlError>;
}

#[derive(Clone)]
pub struct ConnectionHandle {
    tx: mpsc::Sender<LinkCommand>,
    state: watch::Receiver<ConnectionState>,
}

impl ConnectionHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Stops the actor, closing the socket or cancelling a pending reconnect.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(LinkCommand::Shutdown).await;
    }
}

impl Link for ConnectionHandle {
    fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Connected && !self.tx.is_closed()
    }

    fn send(&self, text: String) -> Result<(), ControlError> {
        if !self.is_ready() {
            return Err(ControlError::NotConnected);
        }
        self.tx.try_send(LinkCommand::Send(text)).map_err(|e| match e {
            TrySendError::Full(_) => ControlError::Transport(TransportError::QueueFull),
            TrySendError::Closed(_) => ControlError::NotConnected,
        })
    }
}

/// Starts the connection actor. It connects immediately and keeps
/// reconnecting after every loss until shut down or until every handle and
/// the event receiver are gone. Must be called inside a tokio runtime.
pub fn spawn<T: Transport>(
    transport: T,
    config: &ControlConfig,
) -> (ConnectionHandle, mpsc::Receiver<ConnectionEvent>) {
    let (tx, commands) = mpsc::channel(COMMAND_CAP);
    let (events, event_rx) = mpsc::channel(EVENT_CAP);
    let (state_tx, state) = watch::channel(ConnectionState::Disconnected);

    let actor = ConnectionActor {
        transport,
        endpoint: config.endpoint.clone(),
        reconnect_delay: config.reconnect_delay,
        commands,
        events,
        state: state_tx,
    };
    tokio::spawn(actor.run());

    (ConnectionHandle { tx, state }, event_rx)
}

struct ConnectionActor<T> {
    transport: T,
    endpoint: Url,
    reconnect_delay: Duration,
    commands: mpsc::Receiver<LinkCommand>,
    events: mpsc::Sender<ConnectionEvent>,
    state: watch::Sender<ConnectionState>,
}

impl<T: Transport> ConnectionActor<T> {
    async fn run(mut self) {
        loop {
            tracing::info!(endpoint = %self.endpoint, "connecting");
            let open = self.transport.open(&self.endpoint);
            let opened = tokio::select! {
                res = open => res,
                _ = idle_until_shutdown(&mut self.commands) => return,
            };

            let reason = match opened {
                Ok((sink, stream)) => {
                    self.state.send_replace(ConnectionState::Connected);
                    tracing::info!(endpoint = %self.endpoint, "connected");
                    if self.events.send(ConnectionEvent::Opened).await.is_err() {
                        return;
                    }
                    match self.session(sink, stream).await {
                        Some(reason) => reason,
                        None => {
                            self.state.send_replace(ConnectionState::Disconnected);
                            return;
                        }
                    }
                }
                Err(e) => DisconnectReason::Error(e.to_string()),
            };

            self.state.send_replace(ConnectionState::Disconnected);
            tracing::warn!(
                reason = ?reason,
                retry_in_ms = self.reconnect_delay.as_millis() as u64,
                "connection lost, will retry"
            );
            let lost = ConnectionEvent::Disconnected {
                reason,
                retry_in: self.reconnect_delay,
            };
            if self.events.send(lost).await.is_err() {
                return;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = idle_until_shutdown(&mut self.commands) => return,
            }
        }
    }

    /// Pumps one open connection. `None` means the actor was asked to stop.
    async fn session(
        &mut self,
        mut sink: FrameSink,
        mut stream: FrameStream,
    ) -> Option<DisconnectReason> {
        loop {
            tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(LinkCommand::Send(text)) => {
                        if let Err(e) = sink.send(text).await {
                            return Some(DisconnectReason::Error(e.to_string()));
                        }
                    }
                    Some(LinkCommand::Shutdown) | None => {
                        let _ = sink.close().await;
                        return None;
                    }
                },
                incoming = stream.next() => match incoming {
                    Some(Ok(text)) => {
                        if self.events.send(ConnectionEvent::Message(text)).await.is_err() {
                            let _ = sink.close().await;
                            return None;
                        }
                    }
                    Some(Err(e)) => return Some(DisconnectReason::Error(e.to_string())),
                    None => return Some(DisconnectReason::Closed),
                },
            }
        }
    }
}

/// Drops sends while there is no connection; returns once shutdown is requested.
async fn idle_until_shutdown(commands: &mut mpsc::Receiver<LinkCommand>) {
    loop {
        match commands.recv().await {
            Some(LinkCommand::Send(_)) => {
                tracing::warn!("dropping command, not connected");
            }
            Some(LinkCommand::Shutdown) | None => return,
        }
    }
}
