use thiserror::Error;

/// Top-level error enum covering every error kind crossing an HTTP/WS
/// boundary (webhook ingress, call session orchestrator, admin API).
#[derive(Debug, Error)]
pub enum VoiceAgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown tenant: {tenant_id}")]
    UnknownTenant { tenant_id: String },

    #[error("Tenant suspended: {tenant_id}")]
    TenantSuspended { tenant_id: String },

    #[error("Webhook signature invalid")]
    SignatureInvalid,

    #[error("Duplicate webhook delivery: {delivery_id}")]
    DuplicateWebhook { delivery_id: String },

    #[error("Admission rejected: {reason}")]
    AdmissionRejected { reason: String },

    #[error("Authorization expired")]
    AuthExpired,

    #[error("Permission denied: {reason}")]
    PermissionDenied { reason: String },

    #[error("Upstream provider error ({provider}): {reason}")]
    UpstreamError { provider: String, reason: String },

    #[error("Missing or invalid booking fields: {0}")]
    MissingOrInvalidBookingFields(String),

    #[error("Speech recognition confidence too low: {confidence}")]
    SttLowConfidence { confidence: f64 },

    #[error("LLM transient error: {0}")]
    LlmTransient(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Request timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VoiceAgentError {
    /// Short error code, used in webhook acks, WS error frames, and logs.
    pub fn code(&self) -> &'static str {
        match self {
            VoiceAgentError::Config(_) => "CONFIG_ERROR",
            VoiceAgentError::UnknownTenant { .. } => "UNKNOWN_TENANT",
            VoiceAgentError::TenantSuspended { .. } => "TENANT_SUSPENDED",
            VoiceAgentError::SignatureInvalid => "SIGNATURE_INVALID",
            VoiceAgentError::DuplicateWebhook { .. } => "DUPLICATE_WEBHOOK",
            VoiceAgentError::AdmissionRejected { .. } => "ADMISSION_REJECTED",
            VoiceAgentError::AuthExpired => "AUTH_EXPIRED",
            VoiceAgentError::PermissionDenied { .. } => "PERMISSION_DENIED",
            VoiceAgentError::UpstreamError { .. } => "UPSTREAM_ERROR",
            VoiceAgentError::MissingOrInvalidBookingFields(_) => "INVALID_BOOKING_FIELDS",
            VoiceAgentError::SttLowConfidence { .. } => "STT_LOW_CONFIDENCE",
            VoiceAgentError::LlmTransient(_) => "LLM_TRANSIENT",
            VoiceAgentError::Database(_) => "DATABASE_ERROR",
            VoiceAgentError::Encryption(_) => "ENCRYPTION_ERROR",
            VoiceAgentError::Serialization(_) => "SERIALIZATION_ERROR",
            VoiceAgentError::Io(_) => "IO_ERROR",
            VoiceAgentError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            VoiceAgentError::Timeout { .. } => "TIMEOUT",
            VoiceAgentError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether retrying the same operation immediately might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            VoiceAgentError::LlmTransient(_)
                | VoiceAgentError::Timeout { .. }
                | VoiceAgentError::UpstreamError { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, VoiceAgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tenant_code() {
        let err = VoiceAgentError::UnknownTenant {
            tenant_id: "t_123".to_string(),
        };
        assert_eq!(err.code(), "UNKNOWN_TENANT");
        assert!(!err.is_transient());
    }

    #[test]
    fn llm_transient_is_retryable() {
        let err = VoiceAgentError::LlmTransient("connection reset".to_string());
        assert!(err.is_transient());
    }
}
