use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("not subscribed to any room")]
    NotSubscribed,

    #[error("relay link closed")]
    Closed,

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("frame codec error: {0}")]
    Codec(#[from] serde_json::Error),
}
