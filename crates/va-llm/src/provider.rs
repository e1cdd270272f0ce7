use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::Result;
use crate::prompt::BookingContext;
use crate::stream::LlmStreamEvent;
use crate::types::{HistoryMessage, ToolDefinition};

/// Fixed per spec.md §4.9: the orchestrator never varies these per call.
pub const TEMPERATURE: f32 = 0.1;
pub const MAX_OUTPUT_TOKENS: u32 = 500;

/// Adapter over a streaming tool-calling LLM (C9). `generate_stream` opens
/// one request and returns the discriminated event stream as it arrives;
/// callers drive the orchestrator's serialization loop (§4.12.4) from it.
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn generate_stream(
        &self,
        history: &[HistoryMessage],
        context: &BookingContext,
        tools: &[ToolDefinition],
    ) -> Result<ReceiverStream<LlmStreamEvent>>;
}

/// Helper for adapter implementations: create the channel pair used to
/// bridge a background request task into a `ReceiverStream`.
pub(crate) fn event_channel() -> (mpsc::Sender<LlmStreamEvent>, ReceiverStream<LlmStreamEvent>) {
    let (tx, rx) = mpsc::channel(64);
    (tx, ReceiverStream::new(rx))
}
