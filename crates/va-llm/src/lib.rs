pub mod anthropic;
pub mod anthropic_stream;
pub mod error;
pub mod prompt;
pub mod provider;
pub mod stream;
pub mod types;

pub use anthropic::AnthropicLlmAdapter;
pub use error::{LlmError, Result};
pub use prompt::{build_system_prompt, BookingContext, SystemPrompt};
pub use provider::{LlmAdapter, MAX_OUTPUT_TOKENS, TEMPERATURE};
pub use stream::{BlockDelta, BlockKind, LlmStreamEvent};
pub use types::{ContentBlock, HistoryMessage, HistoryRole, ToolDefinition, Usage};
