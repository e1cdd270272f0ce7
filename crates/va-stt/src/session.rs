use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, SttError};
use crate::events::SttEvent;

/// A live duplex STT session: raw mu-law audio flows in on `send_audio`,
/// [`SttEvent`]s flow out on `events`. Restartable — dropping a handle and
/// calling [`crate::adapter::SttAdapter::open_session`] again starts a new
/// one; nothing here is shared between sessions.
pub struct SttSessionHandle {
    audio_tx: mpsc::Sender<Vec<u8>>,
    pub events: mpsc::Receiver<SttEvent>,
    task: JoinHandle<()>,
}

impl SttSessionHandle {
    pub(crate) fn new(audio_tx: mpsc::Sender<Vec<u8>>, events: mpsc::Receiver<SttEvent>, task: JoinHandle<()>) -> Self {
        Self { audio_tx, events, task }
    }

    /// Forward one chunk of raw 8kHz mu-law audio to the ASR.
    pub async fn send_audio(&self, chunk: Vec<u8>) -> Result<()> {
        self.audio_tx.send(chunk).await.map_err(|_| SttError::Closed)
    }

    /// Gracefully end the session and await the background task's exit.
    pub async fn close(mut self) {
        drop(self.audio_tx);
        let _ = (&mut self.task).await;
    }
}

impl Drop for SttSessionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
