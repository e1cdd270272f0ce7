use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Any read/write against a tenant with no provisioned store file.
    #[error("unknown tenant: {0}")]
    UnknownTenant(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
