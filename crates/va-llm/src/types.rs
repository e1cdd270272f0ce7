use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a history entry. `Tool` results are mapped onto the wire-level
/// `user` role with `tool_result` content blocks when a provider adapter
/// serializes the request; callers never need to know that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryRole {
    User,
    Assistant,
    Tool,
}

/// One block of message content. Assistant turns may mix text and tool-use
/// blocks in a single message; tool turns carry exactly one tool-result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

/// A single entry in call history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: HistoryRole,
    pub content: Vec<ContentBlock>,
}

impl HistoryMessage {
    pub fn text(role: HistoryRole, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn tool_result(tool_use_id: impl Into<String>, content: impl Into<String>, is_error: bool) -> Self {
        Self {
            role: HistoryRole::Tool,
            content: vec![ContentBlock::ToolResult {
                tool_use_id: tool_use_id.into(),
                content: content.into(),
                is_error,
            }],
        }
    }

    /// Heuristic used by history pruning (4.12.6): does this message likely
    /// carry a booking-critical identity token?
    pub fn mentions_identity_token(&self) -> bool {
        self.content.iter().any(|block| {
            let text = match block {
                ContentBlock::Text { text } => text.as_str(),
                ContentBlock::ToolResult { content, .. } => content.as_str(),
                ContentBlock::ToolUse { .. } => return false,
            };
            let lower = text.to_lowercase();
            ["name", "phone", "email", "@", "captured"]
                .iter()
                .any(|needle| lower.contains(needle))
        })
    }
}

/// A tool definition offered to the LLM for tool-calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_heuristic_matches_expected_needles() {
        let msg = HistoryMessage::text(HistoryRole::User, "my email is d@example.com");
        assert!(msg.mentions_identity_token());

        let msg = HistoryMessage::text(HistoryRole::User, "what time works for you");
        assert!(!msg.mentions_identity_token());
    }

    #[test]
    fn tool_result_carries_matching_id() {
        let msg = HistoryMessage::tool_result("call_1", "Appointment booked successfully. Reference ID: 42", false);
        match &msg.content[0] {
            ContentBlock::ToolResult { tool_use_id, .. } => assert_eq!(tool_use_id, "call_1"),
            _ => panic!("expected tool result"),
        }
    }
}
