use thiserror::Error;

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket error: {0}")]
    Websocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("session already finished")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TtsError>;
