use thiserror::Error;

/// Tenant-registry errors. Kept separate from `VoiceAgentError` so the
/// gateway maps them to webhook-ingress responses without coupling layers.
#[derive(Debug, Error)]
pub enum TenantError {
    #[error("Tenant not found: {0}")]
    NotFound(String),

    #[error("Phone number already registered: {0}")]
    DuplicatePhone(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    #[error("Invalid tenant config: {0}")]
    InvalidConfig(String),

    #[error("Illegal status transition: {from} -> {to}")]
    IllegalStatusTransition { from: String, to: String },
}

pub type Result<T> = std::result::Result<T, TenantError>;
