use thiserror::Error;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("unknown tenant: {0}")]
    UnknownTenant(String),

    #[error("no {provider} credential on file for tenant {tenant_id}")]
    NotFound { tenant_id: String, provider: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("tenant registry error: {0}")]
    Tenant(#[from] va_tenants::error::TenantError),
}

pub type Result<T> = std::result::Result<T, VaultError>;
