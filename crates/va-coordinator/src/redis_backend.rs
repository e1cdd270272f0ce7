use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tracing::{debug, warn};

use crate::coordinator::{AdmitPolicy, AdmitResult, Coordinator};
use crate::error::Result;

/// Atomically increments `active:global` and `active:tenant:<id>`, rolling
/// both back on over-cap and falling through to a per-tenant FIFO queue
/// (keyed `queue:tenant:<id>`) when enabled and under `queue_max_size`.
/// Returns `[admitted: 0|1, queued: 0|1]`.
///
/// A queued call's own earlier entry is dropped before re-evaluating
/// capacity: the telephony `<Redirect>` loop re-POSTs `/voice` with the
/// same `call_sid` on every retry, and without this the queue would keep
/// one stale entry per retry forever instead of reflecting only calls
/// still actually waiting.
const ADMIT_SCRIPT: &str = r#"
local global_key = KEYS[1]
local tenant_key = KEYS[2]
local session_key = KEYS[3]
local queue_key = KEYS[4]
local max_global = tonumber(ARGV[1])
local max_tenant = tonumber(ARGV[2])
local ttl = tonumber(ARGV[3])
local queue_enabled = ARGV[4]
local queue_max = tonumber(ARGV[5])
local call_sid = ARGV[6]

redis.call('LREM', queue_key, 0, call_sid)

local global = redis.call('INCR', global_key)
redis.call('EXPIRE', global_key, ttl)
local tenant = redis.call('INCR', tenant_key)
redis.call('EXPIRE', tenant_key, ttl)

if global > max_global or tenant > max_tenant then
    redis.call('DECR', global_key)
    redis.call('DECR', tenant_key)
    if queue_enabled == '1' then
        local qlen = redis.call('LLEN', queue_key)
        if qlen < queue_max then
            redis.call('RPUSH', queue_key, call_sid)
            redis.call('EXPIRE', queue_key, ttl)
            return {0, 1}
        end
    end
    return {0, 0}
end

redis.call('SET', session_key, '1', 'EX', ttl)
return {1, 0}
"#;

/// Shared cross-instance coordinator backed by Redis, enabled by setting
/// `COORDINATOR_URL` per spec.md §6.
pub struct RedisCoordinator {
    conn: ConnectionManager,
    admit_script: Script,
}

impl RedisCoordinator {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self {
            conn,
            admit_script: Script::new(ADMIT_SCRIPT),
        })
    }

    fn global_key() -> String {
        "active:global".to_string()
    }

    fn tenant_key(tenant_id: &str) -> String {
        format!("active:tenant:{tenant_id}")
    }

    fn session_key(call_sid: &str) -> String {
        format!("session:{call_sid}")
    }

    fn queue_key(tenant_id: &str) -> String {
        format!("queue:tenant:{tenant_id}")
    }
}

#[async_trait]
impl Coordinator for RedisCoordinator {
    async fn mark_webhook_processed(&self, key: &str, ttl_secs: u64) -> Result<bool> {
        let mut conn = self.conn.clone();
        let set: Option<String> = redis::cmd("SET")
            .arg(format!("webhook:{key}"))
            .arg(1)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await?;
        let fresh = set.is_some();
        debug!(key, fresh, "webhook idempotency check");
        Ok(fresh)
    }

    async fn admit_call(&self, call_sid: &str, tenant_id: &str, policy: AdmitPolicy) -> Result<AdmitResult> {
        let mut conn = self.conn.clone();
        let (admitted, queued): (i64, i64) = self
            .admit_script
            .key(Self::global_key())
            .key(Self::tenant_key(tenant_id))
            .key(Self::session_key(call_sid))
            .key(Self::queue_key(tenant_id))
            .arg(policy.max_global_active_calls)
            .arg(policy.max_tenant_active_calls)
            .arg(policy.ttl_secs)
            .arg(if policy.queue_enabled { "1" } else { "0" })
            .arg(policy.queue_max_size)
            .arg(call_sid)
            .invoke_async(&mut conn)
            .await?;

        if admitted == 0 && queued == 0 {
            warn!(tenant_id, call_sid, "admission rejected: over capacity, queue full or disabled");
        }

        Ok(AdmitResult {
            admitted: admitted == 1,
            queued: queued == 1,
        })
    }

    async fn refresh_call(&self, call_sid: &str, tenant_id: &str, ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.expire(Self::global_key(), ttl_secs as i64).await?;
        let _: () = conn.expire(Self::tenant_key(tenant_id), ttl_secs as i64).await?;
        let _: () = conn.expire(Self::session_key(call_sid), ttl_secs as i64).await?;
        Ok(())
    }

    async fn release_call(&self, call_sid: &str, tenant_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let existed: bool = conn.del::<_, i64>(Self::session_key(call_sid)).await? > 0;
        if existed {
            let _: i64 = conn.decr(Self::global_key(), 1).await?;
            let _: i64 = conn.decr(Self::tenant_key(tenant_id), 1).await?;
            // A slot just freed for this tenant; drop the oldest queue
            // entry so the queue's length tracks callers still actually
            // waiting instead of growing without bound.
            let _: Option<String> = conn.lpop(Self::queue_key(tenant_id), None).await?;
        }
        Ok(())
    }

    fn is_distributed(&self) -> bool {
        true
    }
}
