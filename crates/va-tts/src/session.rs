use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Result, TtsError};

pub(crate) enum TtsCommand {
    Send(String),
    Finish,
}

/// A live TTS session. `send` is synchronous and non-blocking: text chunks
/// queue on an unbounded channel that the background connection task
/// drains, so calls made before the underlying connection finishes opening
/// are queued and flushed in order once it does, per spec.md §4.8.
pub struct TtsSessionHandle {
    commands: mpsc::UnboundedSender<TtsCommand>,
    task: JoinHandle<()>,
}

impl TtsSessionHandle {
    pub(crate) fn new(commands: mpsc::UnboundedSender<TtsCommand>, task: JoinHandle<()>) -> Self {
        Self { commands, task }
    }

    /// Queue a chunk of text to be synthesized and streamed as audio.
    pub fn send(&self, text_chunk: impl Into<String>) -> Result<()> {
        self.commands
            .send(TtsCommand::Send(text_chunk.into()))
            .map_err(|_| TtsError::Closed)
    }

    /// Signal no more text is coming and await the session's clean exit.
    pub async fn finish(mut self) {
        let _ = self.commands.send(TtsCommand::Finish);
        let _ = (&mut self.task).await;
    }
}

impl Drop for TtsSessionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
