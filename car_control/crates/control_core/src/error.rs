use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("outbound queue full")]
    QueueFull,
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("not connected to the server")]
    NotConnected,
    #[error("invalid action: {0}")]
    InvalidAction(String),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Error: {0}")]
    Remote(String),
    #[error("failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
}
