use async_trait::async_trait;

use crate::error::Result;
use crate::session::SttSessionHandle;

/// Duplex speech-to-text adapter (C7). Implementations negotiate a
/// preferred model and MUST fall back to a stable model on handshake
/// failure rather than surface an error up to the orchestrator, per
/// spec.md §4.7.
#[async_trait]
pub trait SttAdapter: Send + Sync {
    fn name(&self) -> &str;

    async fn open_session(&self) -> Result<SttSessionHandle>;
}
