use tokio_tungstenite::tungstenite;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid live channel target '{0}'")]
    InvalidTarget(String),
    #[error("websocket transport error: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("live channel closed")]
    Closed,
}
