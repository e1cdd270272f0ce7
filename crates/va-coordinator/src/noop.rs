use async_trait::async_trait;

use crate::coordinator::{AdmitPolicy, AdmitResult, Coordinator};
use crate::error::Result;

/// Degraded single-instance mode used when `COORDINATOR_URL` is unset.
/// Every webhook looks fresh and every call is admitted — there is no
/// shared backend to track replays or cross-instance counters against, so
/// the gateway falls back to trusting its own process as the only writer.
pub struct NoopCoordinator;

#[async_trait]
impl Coordinator for NoopCoordinator {
    async fn mark_webhook_processed(&self, _key: &str, _ttl_secs: u64) -> Result<bool> {
        Ok(true)
    }

    async fn admit_call(&self, _call_sid: &str, _tenant_id: &str, _policy: AdmitPolicy) -> Result<AdmitResult> {
        Ok(AdmitResult::admitted())
    }

    async fn refresh_call(&self, _call_sid: &str, _tenant_id: &str, _ttl_secs: u64) -> Result<()> {
        Ok(())
    }

    async fn release_call(&self, _call_sid: &str, _tenant_id: &str) -> Result<()> {
        Ok(())
    }

    fn is_distributed(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_admits_and_always_fresh() {
        let c = NoopCoordinator;
        let policy = AdmitPolicy {
            max_global_active_calls: 0,
            max_tenant_active_calls: 0,
            queue_enabled: false,
            queue_max_size: 0,
            ttl_secs: 60,
        };
        assert_eq!(c.admit_call("CA1", "acme", policy).await.unwrap(), AdmitResult::admitted());
        assert!(c.mark_webhook_processed("k", 60).await.unwrap());
        assert!(c.mark_webhook_processed("k", 60).await.unwrap());
        assert!(!c.is_distributed());
    }
}
