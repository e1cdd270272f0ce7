use serde::Deserialize;

use crate::error::CalendarError;

/// Google and Microsoft both speak the standard OAuth2
/// `grant_type=refresh_token` form POST; this is shared by both adapters.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

pub struct RefreshedToken {
    pub access_token: String,
    pub expiry_epoch_ms: i64,
    /// Present only for providers that rotate the refresh token on use.
    pub refresh_token: Option<String>,
}

pub async fn refresh_access_token(
    http: &reqwest::Client,
    provider: &str,
    token_url: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<RefreshedToken, CalendarError> {
    let resp = http
        .post(token_url)
        .form(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ])
        .send()
        .await
        .map_err(|e| CalendarError::UpstreamError {
            provider: provider.to_string(),
            message: e.to_string(),
        })?;

    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(CalendarError::from_status(provider, status, &body));
    }

    let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| CalendarError::UpstreamError {
        provider: provider.to_string(),
        message: format!("malformed token response: {e}"),
    })?;

    let expiry_epoch_ms = chrono::Utc::now().timestamp_millis() + parsed.expires_in * 1000;
    Ok(RefreshedToken {
        access_token: parsed.access_token,
        expiry_epoch_ms,
        refresh_token: parsed.refresh_token,
    })
}

/// 60-second safety margin before the recorded expiry.
pub fn needs_refresh(expiry_epoch_ms: i64) -> bool {
    chrono::Utc::now().timestamp_millis() + 60_000 >= expiry_epoch_ms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn far_future_expiry_does_not_need_refresh() {
        let far_future = chrono::Utc::now().timestamp_millis() + 3_600_000;
        assert!(!needs_refresh(far_future));
    }

    #[test]
    fn expiry_within_safety_margin_needs_refresh() {
        let soon = chrono::Utc::now().timestamp_millis() + 5_000;
        assert!(needs_refresh(soon));
    }

    #[test]
    fn already_expired_needs_refresh() {
        let past = chrono::Utc::now().timestamp_millis() - 1_000;
        assert!(needs_refresh(past));
    }
}
