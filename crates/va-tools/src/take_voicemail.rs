use async_trait::async_trait;
use serde_json::json;

use crate::tool::{Tool, ToolResult};

/// `take_voicemail` tool: the LLM's escape hatch when it can't (or the
/// caller doesn't want to) complete a booking. Returns a sentinel the
/// orchestrator recognizes to end the call and hand off to the voicemail
/// flow rather than text the LLM is free to rephrase.
pub struct TakeVoicemailTool;

/// The orchestrator matches on this literal (by tool name, not `is_error`)
/// to detect the voicemail escape hatch rather than feeding the result
/// back to the LLM.
pub const VOICEMAIL_SENTINEL: &str = "TRIGGER_VOICEMAIL_FALLBACK";

#[async_trait]
impl Tool for TakeVoicemailTool {
    fn name(&self) -> &str {
        "take_voicemail"
    }

    fn description(&self) -> &str {
        "Take a voicemail instead of booking an appointment, when the caller can't or won't complete a booking."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "reason": {"type": "string", "description": "Why a voicemail is being taken instead of a booking"},
            },
            "required": [],
        })
    }

    async fn execute(&self, _input: serde_json::Value) -> ToolResult {
        ToolResult::success(VOICEMAIL_SENTINEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_voicemail_sentinel() {
        let tool = TakeVoicemailTool;
        let result = tool.execute(json!({"reason": "caller hung up"})).await;
        assert_eq!(result.content, VOICEMAIL_SENTINEL);
        assert!(!result.is_error);
    }
}
