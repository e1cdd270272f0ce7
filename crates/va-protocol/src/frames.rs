use serde::{Deserialize, Serialize};

/// Inbound `{event:"start", start:{...}}` — opens the duplex audio channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartPayload {
    #[serde(rename = "streamSid")]
    pub stream_sid: String,
    #[serde(rename = "callSid")]
    pub call_sid: String,
    #[serde(rename = "customParameters", default)]
    pub custom_parameters: CustomParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CustomParameters {
    #[serde(rename = "tenantId")]
    pub tenant_id: Option<String>,
    #[serde(rename = "callerPhone")]
    pub caller_phone: Option<String>,
}

/// Inbound `{event:"media", media:{payload: base64(mu-law@8k)}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaPayload {
    pub payload: String,
}

/// One frame on the `/media-stream` WS, in either direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum MediaStreamFrame {
    #[serde(rename = "start")]
    Start { start: StartPayload },
    #[serde(rename = "media")]
    Media {
        #[serde(rename = "streamSid", skip_serializing_if = "Option::is_none")]
        stream_sid: Option<String>,
        media: MediaPayload,
    },
    #[serde(rename = "stop")]
    Stop,
    #[serde(rename = "clear")]
    Clear {
        #[serde(rename = "streamSid")]
        stream_sid: String,
    },
}

impl MediaStreamFrame {
    /// Build the outbound frame carrying a chunk of synthesized mu-law audio.
    pub fn outbound_media(stream_sid: impl Into<String>, mu_law_bytes: &[u8]) -> Self {
        use base64::Engine;
        let payload = base64::engine::general_purpose::STANDARD.encode(mu_law_bytes);
        MediaStreamFrame::Media {
            stream_sid: Some(stream_sid.into()),
            media: MediaPayload { payload },
        }
    }

    /// Build the outbound frame instructing the far side to drop buffered audio.
    pub fn outbound_clear(stream_sid: impl Into<String>) -> Self {
        MediaStreamFrame::Clear {
            stream_sid: stream_sid.into(),
        }
    }

    /// Decode a `media` frame's base64 payload into raw mu-law bytes.
    pub fn decode_media_payload(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.decode(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_frame() {
        let json = r#"{"event":"start","start":{"streamSid":"MZ1","callSid":"CA1","customParameters":{"tenantId":"t1","callerPhone":"+15551234567"}}}"#;
        let frame: MediaStreamFrame = serde_json::from_str(json).unwrap();
        match frame {
            MediaStreamFrame::Start { start } => {
                assert_eq!(start.stream_sid, "MZ1");
                assert_eq!(start.call_sid, "CA1");
                assert_eq!(start.custom_parameters.tenant_id.as_deref(), Some("t1"));
            }
            _ => panic!("expected start frame"),
        }
    }

    #[test]
    fn parses_stop_frame() {
        let json = r#"{"event":"stop"}"#;
        let frame: MediaStreamFrame = serde_json::from_str(json).unwrap();
        assert!(matches!(frame, MediaStreamFrame::Stop));
    }

    #[test]
    fn outbound_media_round_trips_payload() {
        let bytes = vec![0u8, 1, 2, 255];
        let frame = MediaStreamFrame::outbound_media("MZ1", &bytes);
        let json = serde_json::to_string(&frame).unwrap();
        let parsed: MediaStreamFrame = serde_json::from_str(&json).unwrap();
        match parsed {
            MediaStreamFrame::Media { media, stream_sid } => {
                assert_eq!(stream_sid.as_deref(), Some("MZ1"));
                let decoded = MediaStreamFrame::decode_media_payload(&media.payload).unwrap();
                assert_eq!(decoded, bytes);
            }
            _ => panic!("expected media frame"),
        }
    }

    #[test]
    fn outbound_clear_serializes_event_name() {
        let frame = MediaStreamFrame::outbound_clear("MZ1");
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains(r#""event":"clear""#));
        assert!(json.contains(r#""streamSid":"MZ1""#));
    }
}
