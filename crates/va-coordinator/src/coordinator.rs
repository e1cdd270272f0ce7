use async_trait::async_trait;

use crate::error::Result;

/// Result of an `admit_call` attempt, per spec.md §4.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmitResult {
    pub admitted: bool,
    pub queued: bool,
}

impl AdmitResult {
    pub fn admitted() -> Self {
        Self {
            admitted: true,
            queued: false,
        }
    }

    pub fn queued() -> Self {
        Self {
            admitted: false,
            queued: true,
        }
    }

    pub fn rejected() -> Self {
        Self {
            admitted: false,
            queued: false,
        }
    }
}

/// Policy knobs for a single `admit_call` call — read fresh from tenant
/// config + `AdmissionConfig` by the caller on every inbound webhook.
#[derive(Debug, Clone, Copy)]
pub struct AdmitPolicy {
    pub max_global_active_calls: u32,
    pub max_tenant_active_calls: u32,
    pub queue_enabled: bool,
    pub queue_max_size: usize,
    pub ttl_secs: u64,
}

/// Cluster-wide webhook idempotency and admission counters (C6).
///
/// Two implementations: [`crate::redis_backend::RedisCoordinator`] backs a
/// multi-instance deployment sharing state through `COORDINATOR_URL`;
/// [`crate::noop::NoopCoordinator`] is the degraded single-instance mode
/// used when no coordinator backend is configured, per spec.md §4.6.
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Compare-and-set idempotency key. Returns `true` if this call is the
    /// first to see `key` (i.e. "fresh"); `false` if it's a replay.
    async fn mark_webhook_processed(&self, key: &str, ttl_secs: u64) -> Result<bool>;

    /// Atomically increments the global and per-tenant active-call
    /// counters and marks the per-session key. On over-cap, decrements
    /// back and either queues (if enabled and room remains) or rejects.
    async fn admit_call(&self, call_sid: &str, tenant_id: &str, policy: AdmitPolicy) -> Result<AdmitResult>;

    /// Refreshes the TTL on an admitted call's counters/session key.
    async fn refresh_call(&self, call_sid: &str, tenant_id: &str, ttl_secs: u64) -> Result<()>;

    /// Releases an admitted call's counters/session key.
    async fn release_call(&self, call_sid: &str, tenant_id: &str) -> Result<()>;

    /// Whether this coordinator is backed by a shared, cross-instance store.
    fn is_distributed(&self) -> bool;
}
