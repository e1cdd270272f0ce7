use serde::{Deserialize, Serialize};

use crate::types::Usage;

/// The kind of content block a streaming provider has opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockKind {
    Text,
    ToolUse { id: String, name: String },
}

/// An incremental update to an open content block.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockDelta {
    TextDelta(String),
    InputJsonDelta(String),
}

/// Discriminated event stream produced by `LlmAdapter::generate_stream`, per
/// spec.md §4.9. Consumers accumulate `ContentBlockDelta` text into running
/// text and buffer `input_json_delta` chunks per tool-use block index until
/// the matching `ContentBlockStop`.
#[derive(Debug, Clone)]
pub enum LlmStreamEvent {
    MessageStart,
    ContentBlockStart { index: u32, kind: BlockKind },
    ContentBlockDelta { index: u32, delta: BlockDelta },
    ContentBlockStop { index: u32 },
    MessageStop,
    Usage(Usage),
    /// Transport-level failure surfaced mid-stream; not part of the
    /// provider's own event vocabulary.
    Error(String),
}
