use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::warn;

use crate::stream::{BlockDelta, BlockKind, LlmStreamEvent};
use crate::types::Usage;

/// Parse a single SSE line: `event: <type>` or `data: <json>`.
fn parse_sse_line(line: &str) -> Option<SseParsed> {
    if let Some(event_type) = line.strip_prefix("event: ") {
        Some(SseParsed::Event(event_type.to_string()))
    } else {
        line.strip_prefix("data: ")
            .map(|data| SseParsed::Data(data.to_string()))
    }
}

enum SseParsed {
    Event(String),
    Data(String),
}

/// Read an Anthropic-style streaming `/v1/messages` response and translate
/// each SSE event into an `LlmStreamEvent`, preserving per-index content
/// block boundaries (§4.9) rather than the flatter delta/done shape a
/// non-streaming caller would see.
pub async fn process_stream(resp: reqwest::Response, tx: mpsc::Sender<LlmStreamEvent>) {
    use futures_util::StreamExt;

    let mut current_event = String::new();
    let mut block_index: u32 = 0;
    let mut tokens_in: u32 = 0;
    let mut tokens_out: u32 = 0;
    let mut line_buf = String::new();

    let mut byte_stream = resp.bytes_stream();

    if tx.send(LlmStreamEvent::MessageStart).await.is_err() {
        return;
    }

    while let Some(chunk) = byte_stream.next().await {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                let _ = tx.send(LlmStreamEvent::Error(e.to_string())).await;
                return;
            }
        };

        let text = match std::str::from_utf8(&chunk) {
            Ok(t) => t,
            Err(_) => continue,
        };

        line_buf.push_str(text);
        let lines: Vec<&str> = line_buf.split('\n').collect();
        let (complete, remainder) = lines.split_at(lines.len() - 1);
        let remainder = remainder.first().unwrap_or(&"").to_string();

        for line in complete {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(parsed) = parse_sse_line(line) {
                match parsed {
                    SseParsed::Event(ev) => current_event = ev,
                    SseParsed::Data(data) => {
                        if let Some(event) = parse_data_block(
                            &current_event,
                            &data,
                            &mut block_index,
                            &mut tokens_in,
                            &mut tokens_out,
                        ) {
                            if tx.send(event).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        }

        line_buf = remainder;
    }

    let _ = tx
        .send(LlmStreamEvent::Usage(Usage {
            input_tokens: tokens_in,
            output_tokens: tokens_out,
        }))
        .await;
    let _ = tx.send(LlmStreamEvent::MessageStop).await;
}

fn parse_data_block(
    event_type: &str,
    data: &str,
    block_index: &mut u32,
    tokens_in: &mut u32,
    tokens_out: &mut u32,
) -> Option<LlmStreamEvent> {
    match event_type {
        "message_start" => {
            if let Ok(msg) = serde_json::from_str::<MessageStart>(data) {
                *tokens_in = msg.message.usage.input_tokens;
            }
            None
        }

        "content_block_start" => {
            let block_start: ContentBlockStart = serde_json::from_str(data).ok()?;
            *block_index = block_start.index;
            let kind = match block_start.content_block.block_type.as_str() {
                "tool_use" => BlockKind::ToolUse {
                    id: block_start.content_block.id.unwrap_or_default(),
                    name: block_start.content_block.name.unwrap_or_default(),
                },
                _ => BlockKind::Text,
            };
            Some(LlmStreamEvent::ContentBlockStart {
                index: block_start.index,
                kind,
            })
        }

        "content_block_delta" => {
            let delta: ContentBlockDelta = serde_json::from_str(data).ok()?;
            let block_delta = match delta.delta.delta_type.as_str() {
                "text_delta" => BlockDelta::TextDelta(delta.delta.text.unwrap_or_default()),
                "input_json_delta" => {
                    BlockDelta::InputJsonDelta(delta.delta.partial_json.unwrap_or_default())
                }
                _ => return None,
            };
            Some(LlmStreamEvent::ContentBlockDelta {
                index: delta.index,
                delta: block_delta,
            })
        }

        "content_block_stop" => {
            let stop: ContentBlockStop = serde_json::from_str(data).ok()?;
            Some(LlmStreamEvent::ContentBlockStop { index: stop.index })
        }

        "message_delta" => {
            if let Ok(delta) = serde_json::from_str::<MessageDelta>(data) {
                *tokens_out = delta.usage.output_tokens;
            }
            None
        }

        "error" => {
            warn!(data, "LLM stream error event");
            Some(LlmStreamEvent::Error(data.to_string()))
        }

        _ => None,
    }
}

#[derive(Deserialize)]
struct MessageStart {
    message: MessageStartInner,
}

#[derive(Deserialize)]
struct MessageStartInner {
    usage: InputUsage,
}

#[derive(Deserialize)]
struct InputUsage {
    input_tokens: u32,
}

#[derive(Deserialize)]
struct ContentBlockStart {
    index: u32,
    content_block: ContentBlockMeta,
}

#[derive(Deserialize)]
struct ContentBlockMeta {
    #[serde(rename = "type")]
    block_type: String,
    id: Option<String>,
    name: Option<String>,
}

#[derive(Deserialize)]
struct ContentBlockDelta {
    index: u32,
    delta: DeltaContent,
}

#[derive(Deserialize)]
struct DeltaContent {
    #[serde(rename = "type")]
    delta_type: String,
    text: Option<String>,
    partial_json: Option<String>,
}

#[derive(Deserialize)]
struct ContentBlockStop {
    index: u32,
}

#[derive(Deserialize)]
struct MessageDelta {
    usage: OutputUsage,
}

#[derive(Deserialize)]
struct OutputUsage {
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_delta_event() {
        let mut idx = 0;
        let mut tin = 0;
        let mut tout = 0;
        let event = parse_data_block(
            "content_block_delta",
            r#"{"index":0,"delta":{"type":"text_delta","text":"hi"}}"#,
            &mut idx,
            &mut tin,
            &mut tout,
        );
        match event {
            Some(LlmStreamEvent::ContentBlockDelta { index: 0, delta: BlockDelta::TextDelta(text) }) => {
                assert_eq!(text, "hi");
            }
            _ => panic!("expected text delta"),
        }
    }

    #[test]
    fn parses_tool_use_block_start() {
        let mut idx = 0;
        let mut tin = 0;
        let mut tout = 0;
        let event = parse_data_block(
            "content_block_start",
            r#"{"index":1,"content_block":{"type":"tool_use","id":"call_1","name":"check_availability"}}"#,
            &mut idx,
            &mut tin,
            &mut tout,
        );
        match event {
            Some(LlmStreamEvent::ContentBlockStart { index: 1, kind: BlockKind::ToolUse { id, name } }) => {
                assert_eq!(id, "call_1");
                assert_eq!(name, "check_availability");
            }
            _ => panic!("expected tool_use block start"),
        }
        assert_eq!(idx, 1);
    }
}
