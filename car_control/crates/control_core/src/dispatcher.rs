use crate::config::ControlConfig;
use crate::connection::{ConnectionEvent, ConnectionState, DisconnectReason, Link};
use crate::error::ControlError;
use crate::history::{History, HistoryEntry};
use crate::notice::Notice;
use crate::timer::Deadline;
use car_protocol::{operation_id, CommandEnvelope, ServerMessage};
use chrono::{DateTime, Local, Utc};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

pub const IDLE_LABEL: &str = "IDLE";

/// What the vehicle was last told to do, shown until the revert deadline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MovementIndicator {
    Idle,
    Active(String),
}

impl MovementIndicator {
    pub fn label(&self) -> &str {
        match self {
            MovementIndicator::Idle => IDLE_LABEL,
            MovementIndicator::Active(action) => action,
        }
    }
}

/// Owns everything the panel shows: connection status, movement indicator,
/// command history and pending notices. Input and connection events are fed
/// in from a single task; nothing here is shared.
pub struct Dispatcher<L> {
    link: L,
    device_id: u32,
    revert_delay: Duration,
    history: History,
    indicator: MovementIndicator,
    revert: Deadline,
    status: ConnectionState,
    notices: VecDeque<Notice>,
}

impl<L: Link> Dispatcher<L> {
    pub fn new(link: L, config: &ControlConfig) -> Self {
        Self {
            link,
            device_id: config.device_id,
            revert_delay: config.revert_delay,
            history: History::new(config.history_cap),
            indicator: MovementIndicator::Idle,
            revert: Deadline::default(),
            status: ConnectionState::Disconnected,
            notices: VecDeque::new(),
        }
    }

    pub fn dispatch(&mut self, action: &str) -> Result<CommandEnvelope, ControlError> {
        self.dispatch_at(action, Local::now(), Instant::now())
    }

    /// `wall` stamps the envelope and history; `now` arms the revert timer.
    pub fn dispatch_at(
        &mut self,
        action: &str,
        wall: DateTime<Local>,
        now: Instant,
    ) -> Result<CommandEnvelope, ControlError> {
        match self.try_send(action, wall) {
            Ok(envelope) => {
                self.history.push(HistoryEntry {
                    action: action.to_string(),
                    display_time: wall.format("%H:%M:%S").to_string(),
                });
                self.indicator = MovementIndicator::Active(action.to_string());
                self.revert.arm(now, self.revert_delay);
                Ok(envelope)
            }
            Err(e) => {
                self.notices.push_back(Notice::error(e.to_string()));
                Err(e)
            }
        }
    }

    fn try_send(
        &self,
        action: &str,
        wall: DateTime<Local>,
    ) -> Result<CommandEnvelope, ControlError> {
        if !self.link.is_ready() {
            return Err(ControlError::NotConnected);
        }
        let op = operation_id(action)
            .ok_or_else(|| ControlError::InvalidAction(action.to_string()))?;

        let at = wall.with_timezone(&Utc);
        let envelope = CommandEnvelope::control(action, self.device_id, op, at);
        let payload = serde_json::to_string(&envelope)?;
        tracing::debug!(action, operation_id = op, "sending command");
        self.link.send(payload)?;
        Ok(envelope)
    }

    pub fn handle_inbound_text(&mut self, text: &str) {
        match serde_json::from_str::<ServerMessage>(text) {
            Ok(msg) => self.handle_inbound(msg),
            Err(e) => tracing::warn!(error = %e, "ignoring undecodable server message"),
        }
    }

    pub fn handle_inbound(&mut self, msg: ServerMessage) {
        tracing::debug!(?msg, "server message");
        match msg {
            ServerMessage::ControlResponse { message, action } => {
                let text = message.unwrap_or_else(|| {
                    format!("Command {} executed", action.as_deref().unwrap_or("unknown"))
                });
                self.notices.push_back(Notice::success(text));
            }
            ServerMessage::Error { message } => {
                let err = ControlError::Remote(message.unwrap_or_default());
                tracing::warn!(error = %err, "server reported an error");
                self.notices.push_back(Notice::error(err.to_string()));
            }
            ServerMessage::Connection { message } => {
                tracing::info!(message = message.as_deref().unwrap_or(""), "connection info");
            }
            ServerMessage::Pong { .. } | ServerMessage::Unknown => {}
        }
    }

    pub fn on_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Opened => {
                self.status = ConnectionState::Connected;
                self.notices.push_back(Notice::success("Connected to the IoT vehicle"));
            }
            ConnectionEvent::Disconnected { reason, .. } => {
                self.status = ConnectionState::Disconnected;
                let text = match reason {
                    DisconnectReason::Closed => "Connection lost - reconnecting...",
                    DisconnectReason::Error(_) => "Connection error",
                };
                self.notices.push_back(Notice::error(text));
            }
            ConnectionEvent::Message(text) => self.handle_inbound_text(&text),
        }
    }

    /// Reverts the movement indicator once its deadline has passed.
    pub fn tick(&mut self, now: Instant) {
        if self.revert.fire(now) {
            self.indicator = MovementIndicator::Idle;
        }
    }

    pub fn revert_deadline(&self) -> Option<Instant> {
        self.revert.at()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    pub fn status(&self) -> ConnectionState {
        self.status
    }

    pub fn indicator(&self) -> &MovementIndicator {
        &self.indicator
    }

    pub fn history(&self) -> &History {
        &self.history
    }
}
