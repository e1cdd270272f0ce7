use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use va_core::types::{CalendarCredential, CalendarProviderKind};
use va_tenants::registry::TenantRegistry;

use crate::crypto::{self, EncryptionKey};
use crate::db;
use crate::error::{Result, VaultError};

/// A credential with both tokens decrypted — only ever held in memory by
/// the calendar adapter that needs to place an outbound call; never
/// serialized across a process or external-facing boundary.
#[derive(Clone)]
pub struct DecryptedCredential {
    pub provider: CalendarProviderKind,
    pub refresh_token: String,
    pub access_token: String,
    pub token_expiry_epoch_ms: i64,
    pub calendar_id: String,
    pub account_email: Option<String>,
    pub timezone: Option<String>,
}

/// Owns the `calendar_credentials` table in the shared registry database.
/// Every write consults the tenant registry first and rejects unknown
/// tenants, per spec.md §4.3.
pub struct CredentialVault {
    db: Arc<Mutex<Connection>>,
    registry: Arc<TenantRegistry>,
    key: EncryptionKey,
}

impl CredentialVault {
    pub fn new(db: Arc<Mutex<Connection>>, registry: Arc<TenantRegistry>, key: EncryptionKey) -> Self {
        Self { db, registry, key }
    }

    fn ensure_tenant_exists(&self, tenant_id: &str) -> Result<()> {
        match self.registry.find_by_id(tenant_id)? {
            Some(_) => Ok(()),
            None => Err(VaultError::UnknownTenant(tenant_id.to_string())),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn upsert(
        &self,
        tenant_id: &str,
        provider: CalendarProviderKind,
        refresh_token: &str,
        access_token: &str,
        token_expiry_epoch_ms: i64,
        calendar_id: &str,
        account_email: Option<String>,
        timezone: Option<String>,
    ) -> Result<()> {
        self.ensure_tenant_exists(tenant_id)?;

        let cred = CalendarCredential {
            tenant_id: tenant_id.into(),
            provider,
            encrypted_refresh_token: crypto::encrypt(&self.key, refresh_token.as_bytes())?,
            encrypted_access_token: crypto::encrypt(&self.key, access_token.as_bytes())?,
            token_expiry_epoch_ms,
            calendar_id: calendar_id.to_string(),
            account_email,
            timezone,
        };

        let conn = self.db.lock().unwrap();
        db::upsert_credential(&conn, &cred)?;
        Ok(())
    }

    /// Returns the credential with both tokens decrypted for immediate use
    /// by a calendar adapter call. Fails with `NotFound` if no credential
    /// is on file for `(tenant_id, provider)`.
    pub fn get(&self, tenant_id: &str, provider: CalendarProviderKind) -> Result<DecryptedCredential> {
        self.ensure_tenant_exists(tenant_id)?;

        let conn = self.db.lock().unwrap();
        let cred = db::find_credential(&conn, tenant_id, provider)?.ok_or_else(|| VaultError::NotFound {
            tenant_id: tenant_id.to_string(),
            provider: provider.to_string(),
        })?;
        drop(conn);

        let refresh_token = crypto::decrypt(&self.key, &cred.encrypted_refresh_token)?;
        let access_token = crypto::decrypt(&self.key, &cred.encrypted_access_token)?;

        Ok(DecryptedCredential {
            provider: cred.provider,
            refresh_token: String::from_utf8(refresh_token)
                .map_err(|e| VaultError::Encryption(e.to_string()))?,
            access_token: String::from_utf8(access_token)
                .map_err(|e| VaultError::Encryption(e.to_string()))?,
            token_expiry_epoch_ms: cred.token_expiry_epoch_ms,
            calendar_id: cred.calendar_id,
            account_email: cred.account_email,
            timezone: cred.timezone,
        })
    }

    pub fn set_calendar_selection(
        &self,
        tenant_id: &str,
        provider: CalendarProviderKind,
        calendar_id: &str,
    ) -> Result<()> {
        self.ensure_tenant_exists(tenant_id)?;

        let conn = self.db.lock().unwrap();
        let rows = db::set_calendar_selection(&conn, tenant_id, provider, calendar_id)?;
        if rows == 0 {
            return Err(VaultError::NotFound {
                tenant_id: tenant_id.to_string(),
                provider: provider.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use va_core::types::{
        AiSettings, CalendarSelection, RoutingConfig, TenantConfig,
    };

    fn sample_config(tenant_id: &str) -> TenantConfig {
        TenantConfig {
            tenant_id: tenant_id.to_string(),
            business_name: "Acme Dental".to_string(),
            phone_number: "+15551234567".to_string(),
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
                greeting_text: "Thanks for calling.".to_string(),
                max_retries: 2,
                require_service_type: false,
            },
        }
    }

    fn test_key() -> EncryptionKey {
        EncryptionKey::from_hex(&"ab".repeat(32)).unwrap()
    }

    fn setup() -> (CredentialVault, Arc<TenantRegistry>) {
        let conn = Connection::open_in_memory().unwrap();
        va_tenants::db::init_db(&conn).unwrap();
        db::init_db(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let registry = Arc::new(TenantRegistry::new(conn.clone()));
        let vault = CredentialVault::new(conn, registry.clone(), test_key());
        (vault, registry)
    }

    #[test]
    fn rejects_unknown_tenant() {
        let (vault, _registry) = setup();
        let err = vault
            .upsert(
                "ghost",
                CalendarProviderKind::Google,
                "rt",
                "at",
                0,
                "primary",
                None,
                None,
            )
            .unwrap_err();
        assert!(matches!(err, VaultError::UnknownTenant(_)));
    }

    #[test]
    fn upsert_then_get_round_trips_plaintext_tokens() {
        let (vault, registry) = setup();
        registry.register(sample_config("acme"), "America/New_York").unwrap();

        vault
            .upsert(
                "acme",
                CalendarProviderKind::Google,
                "refresh-abc",
                "access-xyz",
                1_700_000_000_000,
                "primary",
                Some("owner@acme.test".to_string()),
                None,
            )
            .unwrap();

        let cred = vault.get("acme", CalendarProviderKind::Google).unwrap();
        assert_eq!(cred.refresh_token, "refresh-abc");
        assert_eq!(cred.access_token, "access-xyz");
        assert_eq!(cred.account_email.as_deref(), Some("owner@acme.test"));
    }

    #[test]
    fn get_without_prior_upsert_is_not_found() {
        let (vault, registry) = setup();
        registry.register(sample_config("acme"), "America/New_York").unwrap();
        let err = vault.get("acme", CalendarProviderKind::Outlook).unwrap_err();
        assert!(matches!(err, VaultError::NotFound { .. }));
    }
}
