//! Dedicated writer task for the `/media-stream` socket.
//!
//! The TTS adapter's `on_audio` callback (`Fn(Vec<u8>) + Send + Sync`) has
//! no way to hold a `SplitSink` across awaits, so audio frames are queued
//! onto an unbounded channel drained by a background task that owns the
//! sink exclusively — the same shape the inbound side uses for its STT
//! session, just in the outbound direction.

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use va_protocol::frames::MediaStreamFrame;

enum OutboundFrame {
    Media(Vec<u8>),
    Clear,
}

/// Cheaply cloneable handle used by the orchestrator and the TTS `on_audio`
/// callback to push frames at the writer task.
#[derive(Clone)]
pub struct OutboundHandle {
    tx: mpsc::UnboundedSender<OutboundFrame>,
}

impl OutboundHandle {
    /// Queue a chunk of mu-law audio to be base64-wrapped and sent.
    pub fn send_media(&self, mu_law_bytes: Vec<u8>) {
        let _ = self.tx.send(OutboundFrame::Media(mu_law_bytes));
    }

    /// Queue a `clear` frame telling the provider to drop buffered audio —
    /// used on barge-in.
    pub fn send_clear(&self) {
        let _ = self.tx.send(OutboundFrame::Clear);
    }

    /// A boxed callback suitable for [`va_tts::adapter::OnAudio`].
    pub fn as_tts_callback(&self) -> va_tts::adapter::OnAudio {
        let handle = self.clone();
        Box::new(move |bytes| handle.send_media(bytes))
    }
}

/// Spawns the writer task and returns a handle to feed it plus its join handle.
pub fn spawn_writer(mut sink: SplitSink<WebSocket, Message>, stream_sid: String) -> (OutboundHandle, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundFrame>();
    let task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let ms_frame = match frame {
                OutboundFrame::Media(bytes) => MediaStreamFrame::outbound_media(&stream_sid, &bytes),
                OutboundFrame::Clear => MediaStreamFrame::outbound_clear(&stream_sid),
            };
            let json = match serde_json::to_string(&ms_frame) {
                Ok(j) => j,
                Err(err) => {
                    warn!(%err, "failed to serialize outbound media frame");
                    continue;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });
    (OutboundHandle { tx }, task)
}
