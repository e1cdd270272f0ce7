use thiserror::Error;

#[derive(Debug, Error)]
pub enum SttError {
    #[error("websocket handshake failed: {0}")]
    Handshake(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("session already closed")]
    Closed,

    #[error("url error: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, SttError>;
