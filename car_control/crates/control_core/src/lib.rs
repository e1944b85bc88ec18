pub mod bindings;
pub mod config;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod history;
pub mod notice;
pub mod timer;
pub mod transport;

pub use car_protocol as protocol;
pub use config::ControlConfig;
pub use connection::{ConnectionEvent, ConnectionHandle, ConnectionState, DisconnectReason, Link};
pub use dispatcher::{Dispatcher, MovementIndicator};
pub use error::{ControlError, TransportError};
pub use history::{History, HistoryEntry};
pub use notice::{Notice, NoticeLevel};
pub use transport::{Transport, WsTransport};
