use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::{debug, info};
use va_core::types::{Tenant, TenantConfig, TenantId, TenantStatus};

use crate::db;
use crate::error::{Result, TenantError};

/// Maximum number of phone → tenant_id pairs kept in the in-process cache.
/// Simple eviction: when full, drop the oldest half.
const CACHE_MAX: usize = 512;

/// Owns the shared `tenants` table and the hot `find_by_phone` path used
/// by every inbound webhook to resolve the called number to a tenant.
pub struct TenantRegistry {
    db: Arc<Mutex<Connection>>,
    /// Key: E.164 phone, Value: tenant_id.
    cache: Mutex<HashMap<String, String>>,
    cache_order: Mutex<Vec<String>>,
}

impl TenantRegistry {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self {
            db,
            cache: Mutex::new(HashMap::new()),
            cache_order: Mutex::new(Vec::new()),
        }
    }

    /// Register a new tenant. Fails with `DuplicatePhone` if the phone is
    /// already claimed, `InvalidConfig` if validation fails.
    pub fn register(&self, config: TenantConfig, timezone: &str) -> Result<Tenant> {
        validate_config(&config)?;
        let tz = chrono_tz::Tz::from_str(timezone)
            .map_err(|_| TenantError::InvalidConfig(format!("unresolvable timezone: {timezone}")))?;

        let conn = self.db.lock().unwrap();
        if db::find_by_phone(&conn, &config.phone_number)?.is_some() {
            return Err(TenantError::DuplicatePhone(config.phone_number.clone()));
        }

        let now = chrono::Utc::now();
        let tenant = Tenant {
            tenant_id: TenantId::from(config.tenant_id.clone()),
            display_name: config.business_name.clone(),
            phone_number: config.phone_number.clone(),
            timezone: tz,
            status: TenantStatus::Trial,
            config,
            created_at: now,
            updated_at: now,
        };
        db::insert_tenant(&conn, &tenant)?;
        info!(tenant_id = %tenant.tenant_id, "tenant registered");
        Ok(tenant)
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<Tenant>> {
        let conn = self.db.lock().unwrap();
        Ok(db::find_by_id(&conn, id)?)
    }

    /// E.164 exact-match lookup, used on the webhook ingress hot path.
    pub fn find_by_phone(&self, phone: &str) -> Result<Option<Tenant>> {
        if let Some(tenant_id) = self.cache_lookup(phone) {
            debug!(phone, tenant_id, "tenant phone cache hit");
            let conn = self.db.lock().unwrap();
            if let Some(tenant) = db::find_by_id(&conn, &tenant_id)? {
                return Ok(Some(tenant));
            }
            self.cache_remove(phone);
        }

        let conn = self.db.lock().unwrap();
        let found = db::find_by_phone(&conn, phone)?;
        if let Some(ref tenant) = found {
            self.cache_insert(phone.to_string(), tenant.tenant_id.as_str().to_string());
        }
        Ok(found)
    }

    pub fn list_active(&self) -> Result<Vec<Tenant>> {
        let conn = self.db.lock().unwrap();
        Ok(db::list_active(&conn)?)
    }

    pub fn list_all(&self) -> Result<Vec<Tenant>> {
        let conn = self.db.lock().unwrap();
        Ok(db::list_all(&conn)?)
    }

    /// Enforces monotone transitions except `suspended` <-> `active`.
    pub fn update_status(&self, id: &str, status: TenantStatus) -> Result<()> {
        let conn = self.db.lock().unwrap();
        let tenant = db::find_by_id(&conn, id)?.ok_or_else(|| TenantError::NotFound(id.to_string()))?;
        if !tenant.status.can_transition_to(status) {
            return Err(TenantError::IllegalStatusTransition {
                from: tenant.status.to_string(),
                to: status.to_string(),
            });
        }
        db::update_status(&conn, id, status)?;
        let _ = db::append_audit_log(
            &conn,
            &uuid::Uuid::new_v4().to_string(),
            Some(id),
            "system",
            "update_status",
            &serde_json::json!({ "from": tenant.status.to_string(), "to": status.to_string() }),
        );
        drop(conn);
        self.invalidate_phone(&tenant.phone_number);
        Ok(())
    }

    pub fn update_config(&self, id: &str, config: TenantConfig) -> Result<()> {
        validate_config(&config)?;
        let conn = self.db.lock().unwrap();
        if db::find_by_id(&conn, id)?.is_none() {
            return Err(TenantError::NotFound(id.to_string()));
        }
        db::update_config(&conn, id, &config)?;
        let _ = db::append_audit_log(
            &conn,
            &uuid::Uuid::new_v4().to_string(),
            Some(id),
            "system",
            "update_config",
            &serde_json::json!({ "business_name": config.business_name }),
        );
        Ok(())
    }

    fn cache_lookup(&self, phone: &str) -> Option<String> {
        self.cache.lock().unwrap().get(phone).cloned()
    }

    fn cache_remove(&self, phone: &str) {
        let mut cache = self.cache.lock().unwrap();
        let mut order = self.cache_order.lock().unwrap();
        cache.remove(phone);
        order.retain(|k| k != phone);
    }

    fn cache_insert(&self, phone: String, tenant_id: String) {
        let mut cache = self.cache.lock().unwrap();
        let mut order = self.cache_order.lock().unwrap();

        if cache.contains_key(&phone) {
            cache.insert(phone, tenant_id);
            return;
        }

        if cache.len() >= CACHE_MAX {
            let evict_count = CACHE_MAX / 2;
            let to_remove: Vec<_> = order.drain(..evict_count).collect();
            for k in to_remove {
                cache.remove(&k);
            }
        }

        order.push(phone.clone());
        cache.insert(phone, tenant_id);
    }

    fn invalidate_phone(&self, phone: &str) {
        self.cache_remove(phone);
    }
}

/// `tenant_id`, `business_name`, `phone_number` non-empty; calendar
/// provider is already a closed enum so no further check is needed there.
fn validate_config(config: &TenantConfig) -> Result<()> {
    if config.tenant_id.trim().is_empty() {
        return Err(TenantError::InvalidConfig("tenant_id is empty".to_string()));
    }
    if config.business_name.trim().is_empty() {
        return Err(TenantError::InvalidConfig(
            "business_name is empty".to_string(),
        ));
    }
    if config.phone_number.trim().is_empty() {
        return Err(TenantError::InvalidConfig(
            "phone_number is empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use va_core::types::{AiSettings, CalendarProviderKind, CalendarSelection, RoutingConfig};

    fn sample_config(tenant_id: &str, phone: &str) -> TenantConfig {
        TenantConfig {
            tenant_id: tenant_id.to_string(),
            business_name: "Acme Dental".to_string(),
            phone_number: phone.to_string(),
            business_hours: vec![],
            holidays: vec![],
            appointment_types: vec![],
            calendar: CalendarSelection {
                provider: CalendarProviderKind::Google,
                calendar_id: "primary".to_string(),
            },
            routing: RoutingConfig {
                after_hours_action: "voicemail".to_string(),
                fallback_number: None,
                voicemail_enabled: true,
            },
            ai: AiSettings {
                greeting_text: "Thanks for calling Acme Dental.".to_string(),
                max_retries: 2,
                require_service_type: false,
            },
        }
    }

    fn in_memory_registry() -> TenantRegistry {
        let conn = Connection::open_in_memory().unwrap();
        db::init_db(&conn).unwrap();
        TenantRegistry::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn register_rejects_duplicate_phone() {
        let registry = in_memory_registry();
        registry
            .register(sample_config("t1", "+15551234567"), "America/New_York")
            .unwrap();
        let err = registry
            .register(sample_config("t2", "+15551234567"), "America/New_York")
            .unwrap_err();
        assert!(matches!(err, TenantError::DuplicatePhone(_)));
    }

    #[test]
    fn find_by_phone_is_exact_match() {
        let registry = in_memory_registry();
        registry
            .register(sample_config("t1", "+15551234567"), "America/New_York")
            .unwrap();
        assert!(registry.find_by_phone("+15551234567").unwrap().is_some());
        assert!(registry.find_by_phone("+15551234568").unwrap().is_none());
    }

    #[test]
    fn status_transition_suspended_to_trial_is_illegal() {
        let registry = in_memory_registry();
        let tenant = registry
            .register(sample_config("t1", "+15551234567"), "America/New_York")
            .unwrap();
        registry
            .update_status(tenant.tenant_id.as_str(), TenantStatus::Suspended)
            .unwrap();
        let err = registry
            .update_status(tenant.tenant_id.as_str(), TenantStatus::Trial)
            .unwrap_err();
        assert!(matches!(err, TenantError::IllegalStatusTransition { .. }));
    }
}
