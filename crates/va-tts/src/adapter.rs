use async_trait::async_trait;

use crate::error::Result;
use crate::session::TtsSessionHandle;

/// Text-to-speech adapter (C8), exposing the two modes from spec.md §4.8:
/// one-shot `synthesize` and a live streaming session.
#[async_trait]
pub trait TtsAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// One-shot: returns complete 8kHz mu-law audio, no container.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;

    /// Opens a live text-in/audio-out session. `on_audio` is invoked on raw
    /// mu-law frames as they arrive from the provider.
    async fn open_session(&self, on_audio: OnAudio) -> Result<TtsSessionHandle>;
}

/// Callback invoked with each raw audio frame produced by a live session.
pub type OnAudio = Box<dyn Fn(Vec<u8>) + Send + Sync>;
