use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::adapter::SttAdapter;
use crate::error::Result;
use crate::events::SttEvent;
use crate::session::SttSessionHandle;

const EVENT_CHANNEL_CAPACITY: usize = 64;
const AUDIO_CHANNEL_CAPACITY: usize = 64;

/// Duplex adapter over a Deepgram-style streaming ASR WebSocket.
///
/// Negotiates `preferred_model` first; on handshake failure, retries once
/// against `stable_model` without surfacing the first failure to the
/// caller, per spec.md §4.7.
pub struct DeepgramSttAdapter {
    base_url: String,
    api_key: String,
    preferred_model: String,
    stable_model: String,
}

impl DeepgramSttAdapter {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            preferred_model: "nova-3".to_string(),
            stable_model: "nova-2".to_string(),
        }
    }

    pub fn with_models(mut self, preferred: impl Into<String>, stable: impl Into<String>) -> Self {
        self.preferred_model = preferred.into();
        self.stable_model = stable.into();
        self
    }

    fn url_for(&self, model: &str) -> String {
        format!(
            "{}/v1/listen?encoding=mulaw&sample_rate=8000&channels=1&model={}&interim_results=true&utterance_end_ms=1000&vad_events=true",
            self.base_url.trim_end_matches('/'),
            model
        )
    }

    async fn connect(&self, model: &str) -> Result<tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>> {
        use tokio_tungstenite::tungstenite::client::IntoClientRequest;
        let url = self.url_for(model);
        let mut request = url.into_client_request()?;
        request.headers_mut().insert(
            "Authorization",
            format!("Token {}", self.api_key).parse().expect("valid header value"),
        );
        let (stream, _resp) = tokio_tungstenite::connect_async(request).await?;
        Ok(stream)
    }
}

#[async_trait::async_trait]
impl SttAdapter for DeepgramSttAdapter {
    fn name(&self) -> &str {
        "deepgram"
    }

    async fn open_session(&self) -> Result<SttSessionHandle> {
        let ws = match self.connect(&self.preferred_model).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!(model = %self.preferred_model, error = %e, "preferred ASR model handshake failed, falling back to stable model");
                self.connect(&self.stable_model).await?
            }
        };

        let (mut sink, mut stream) = ws.split();
        let (audio_tx, mut audio_rx) = mpsc::channel::<Vec<u8>>(AUDIO_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<SttEvent>(EVENT_CHANNEL_CAPACITY);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    chunk = audio_rx.recv() => {
                        match chunk {
                            Some(bytes) => {
                                if sink.send(Message::Binary(bytes)).await.is_err() {
                                    break;
                                }
                            }
                            None => {
                                let _ = sink.send(Message::Text("{\"type\":\"CloseStream\"}".into())).await;
                                break;
                            }
                        }
                    }
                    msg = stream.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                if let Some(event) = parse_deepgram_message(&text) {
                                    if event_tx.send(event).await.is_err() {
                                        break;
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Err(e)) => {
                                debug!(error = %e, "ASR stream error");
                                break;
                            }
                            _ => {}
                        }
                    }
                }
            }
            info!("ASR session task exiting");
        });

        Ok(SttSessionHandle::new(audio_tx, event_rx, task))
    }
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum DeepgramMessage {
    Results {
        channel: DeepgramChannel,
        is_final: bool,
        speech_final: bool,
    },
    #[serde(rename = "SpeechStarted")]
    SpeechStarted,
    #[serde(rename = "UtteranceEnd")]
    UtteranceEnd,
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(Deserialize)]
struct DeepgramAlternative {
    transcript: String,
    confidence: Option<f64>,
}

fn parse_deepgram_message(text: &str) -> Option<SttEvent> {
    let parsed: DeepgramMessage = serde_json::from_str(text).ok()?;
    match parsed {
        DeepgramMessage::Results { channel, is_final, speech_final } => {
            let alt = channel.alternatives.into_iter().next()?;
            if alt.transcript.is_empty() {
                return None;
            }
            if is_final || speech_final {
                Some(SttEvent::Final { text: alt.transcript, confidence: alt.confidence })
            } else {
                Some(SttEvent::Partial { text: alt.transcript, confidence: alt.confidence })
            }
        }
        DeepgramMessage::SpeechStarted => Some(SttEvent::SpeechStarted),
        DeepgramMessage::UtteranceEnd => Some(SttEvent::UtteranceEnd),
        DeepgramMessage::Other => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_interim_result_as_partial() {
        let json = r#"{"type":"Results","is_final":false,"speech_final":false,"channel":{"alternatives":[{"transcript":"hello there","confidence":0.82}]}}"#;
        let event = parse_deepgram_message(json).unwrap();
        assert_eq!(event, SttEvent::Partial { text: "hello there".to_string(), confidence: Some(0.82) });
    }

    #[test]
    fn parses_final_result() {
        let json = r#"{"type":"Results","is_final":true,"speech_final":true,"channel":{"alternatives":[{"transcript":"book me friday","confidence":0.95}]}}"#;
        let event = parse_deepgram_message(json).unwrap();
        assert_eq!(event, SttEvent::Final { text: "book me friday".to_string(), confidence: Some(0.95) });
    }

    #[test]
    fn empty_transcript_yields_no_event() {
        let json = r#"{"type":"Results","is_final":false,"speech_final":false,"channel":{"alternatives":[{"transcript":"","confidence":0.1}]}}"#;
        assert!(parse_deepgram_message(json).is_none());
    }

    #[test]
    fn speech_started_and_utterance_end() {
        assert_eq!(parse_deepgram_message(r#"{"type":"SpeechStarted"}"#).unwrap(), SttEvent::SpeechStarted);
        assert_eq!(parse_deepgram_message(r#"{"type":"UtteranceEnd"}"#).unwrap(), SttEvent::UtteranceEnd);
    }
}
