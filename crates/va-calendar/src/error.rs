use thiserror::Error;

/// Errors surfaced by a calendar adapter. Provider HTTP status codes map
/// onto these per spec.md §4.4: 401 -> `AuthExpired`, 403 -> `PermissionDenied`,
/// 404 -> `NotFound`, everything else -> `UpstreamError` with message preserved.
#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("calendar authorization expired")]
    AuthExpired,

    #[error("calendar access denied: {0}")]
    PermissionDenied(String),

    #[error("calendar resource not found: {0}")]
    NotFound(String),

    #[error("no credential on file for tenant {0}")]
    NoCredential(String),

    #[error("upstream calendar error ({provider}): {message}")]
    UpstreamError { provider: String, message: String },

    #[error("vault error: {0}")]
    Vault(#[from] va_vault::VaultError),
}

impl CalendarError {
    /// Maps a provider HTTP response status into the closed error set.
    pub fn from_status(provider: &str, status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 => CalendarError::AuthExpired,
            403 => CalendarError::PermissionDenied(body.to_string()),
            404 => CalendarError::NotFound(body.to_string()),
            _ => CalendarError::UpstreamError {
                provider: provider.to_string(),
                message: body.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, CalendarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_closed_set() {
        assert!(matches!(
            CalendarError::from_status("google", reqwest::StatusCode::UNAUTHORIZED, ""),
            CalendarError::AuthExpired
        ));
        assert!(matches!(
            CalendarError::from_status("google", reqwest::StatusCode::FORBIDDEN, "denied"),
            CalendarError::PermissionDenied(_)
        ));
        assert!(matches!(
            CalendarError::from_status("google", reqwest::StatusCode::NOT_FOUND, "missing"),
            CalendarError::NotFound(_)
        ));
        assert!(matches!(
            CalendarError::from_status("google", reqwest::StatusCode::INTERNAL_SERVER_ERROR, "oops"),
            CalendarError::UpstreamError { .. }
        ));
    }
}
