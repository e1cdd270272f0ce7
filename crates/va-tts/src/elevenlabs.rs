use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::adapter::{OnAudio, TtsAdapter};
use crate::error::{Result, TtsError};
use crate::session::{TtsCommand, TtsSessionHandle};

/// One-shot and live-session TTS over an ElevenLabs-style streaming API,
/// requesting raw 8kHz mu-law output (no container) for direct playback
/// on the telephony media socket.
pub struct ElevenLabsTtsAdapter {
    base_url: String,
    api_key: String,
    voice_id: String,
    model_id: String,
    http: reqwest::Client,
}

impl ElevenLabsTtsAdapter {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            voice_id: voice_id.into(),
            model_id: "eleven_turbo_v2_5".to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn synth_url(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{}?output_format=ulaw_8000",
            self.base_url.trim_end_matches('/'),
            self.voice_id
        )
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{}/stream-input?model_id={}&output_format=ulaw_8000",
            self.base_url.trim_end_matches('/').replacen("https://", "wss://", 1).replacen("http://", "ws://", 1),
            self.voice_id,
            self.model_id,
        )
    }
}

#[async_trait::async_trait]
impl TtsAdapter for ElevenLabsTtsAdapter {
    fn name(&self) -> &str {
        "elevenlabs"
    }

    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let resp = self
            .http
            .post(self.synth_url())
            .header("xi-api-key", &self.api_key)
            .json(&json!({ "text": text, "model_id": self.model_id }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TtsError::Provider { status, body });
        }

        Ok(resp.bytes().await?.to_vec())
    }

    async fn open_session(&self, on_audio: OnAudio) -> Result<TtsSessionHandle> {
        let mut request = self.stream_url().into_client_request()?;
        request
            .headers_mut()
            .insert("xi-api-key", self.api_key.parse().expect("valid header value"));

        let (ws, _resp) = tokio_tungstenite::connect_async(request).await?;
        let (mut sink, mut stream) = ws.split();

        // ElevenLabs' streaming protocol requires an initial "open" frame
        // carrying voice settings before any text chunks.
        let open_frame = json!({
            "text": " ",
            "voice_settings": { "stability": 0.5, "similarity_boost": 0.8 },
        });
        sink.send(Message::Text(open_frame.to_string().into())).await?;

        let (commands_tx, mut commands_rx) = mpsc::unbounded_channel::<TtsCommand>();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    cmd = commands_rx.recv() => {
                        match cmd {
                            Some(TtsCommand::Send(text)) => {
                                let frame = json!({ "text": text, "try_trigger_generation": true });
                                if sink.send(Message::Text(frame.to_string().into())).await.is_err() {
                                    break;
                                }
                            }
                            Some(TtsCommand::Finish) | None => {
                                let _ = sink.send(Message::Text(json!({ "text": "" }).to_string().into())).await;
                                break;
                            }
                        }
                    }
                    msg = stream.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                if let Some(audio) = parse_audio_frame(&text) {
                                    on_audio(audio);
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Err(e)) => {
                                debug!(error = %e, "TTS stream error");
                                break;
                            }
                            _ => {}
                        }
                    }
                }
            }

            // Drain any remaining audio already in flight before exiting.
            while let Some(Ok(Message::Text(text))) = stream.next().await {
                if let Some(audio) = parse_audio_frame(&text) {
                    on_audio(audio);
                } else {
                    break;
                }
            }
        });

        Ok(TtsSessionHandle::new(commands_tx, task))
    }
}

#[derive(Deserialize)]
struct AudioFrame {
    audio: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    is_final: bool,
}

fn parse_audio_frame(text: &str) -> Option<Vec<u8>> {
    let frame: AudioFrame = serde_json::from_str(text).ok()?;
    let audio_b64 = frame.audio?;
    match base64::engine::general_purpose::STANDARD.decode(&audio_b64) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!(error = %e, "failed to decode base64 audio frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_audio_frame_with_payload() {
        let b64 = base64::engine::general_purpose::STANDARD.encode([1u8, 2, 3]);
        let json = format!(r#"{{"audio":"{b64}","isFinal":false}}"#);
        let decoded = parse_audio_frame(&json).unwrap();
        assert_eq!(decoded, vec![1, 2, 3]);
    }

    #[test]
    fn frame_without_audio_field_is_none() {
        assert!(parse_audio_frame(r#"{"isFinal":true}"#).is_none());
    }

    #[test]
    fn stream_url_uses_wss_scheme() {
        let adapter = ElevenLabsTtsAdapter::new("https://api.elevenlabs.io", "key", "voice1");
        assert!(adapter.stream_url().starts_with("wss://"));
    }
}
