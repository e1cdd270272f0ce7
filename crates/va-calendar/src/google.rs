use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde_json::json;
use va_core::types::CalendarProviderKind;
use va_vault::CredentialVault;

use crate::adapter::CalendarAdapter;
use crate::error::{CalendarError, Result};
use crate::oauth;
use crate::types::{BusyInterval, CalendarEvent, NewEvent};

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const AUTH_BASE: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const SCOPE: &str = "https://www.googleapis.com/auth/calendar";

pub struct GoogleCalendarAdapter {
    http: reqwest::Client,
    vault: Arc<CredentialVault>,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl GoogleCalendarAdapter {
    pub fn new(
        http: reqwest::Client,
        vault: Arc<CredentialVault>,
        client_id: String,
        client_secret: String,
        redirect_uri: String,
    ) -> Self {
        Self {
            http,
            vault,
            client_id,
            client_secret,
            redirect_uri,
        }
    }

    /// Returns a valid access token, refreshing it via the vault first if
    /// it's within 60s of expiry.
    async fn access_token(&self, tenant_id: &str) -> Result<String> {
        let cred = self
            .vault
            .get(tenant_id, CalendarProviderKind::Google)
            .map_err(|e| match e {
                va_vault::VaultError::NotFound { .. } => CalendarError::NoCredential(tenant_id.to_string()),
                other => CalendarError::Vault(other),
            })?;

        if !oauth::needs_refresh(cred.token_expiry_epoch_ms) {
            return Ok(cred.access_token);
        }

        let refreshed = oauth::refresh_access_token(
            &self.http,
            "google",
            TOKEN_URL,
            &self.client_id,
            &self.client_secret,
            &cred.refresh_token,
        )
        .await?;

        self.vault.upsert(
            tenant_id,
            CalendarProviderKind::Google,
            refreshed.refresh_token.as_deref().unwrap_or(&cred.refresh_token),
            &refreshed.access_token,
            refreshed.expiry_epoch_ms,
            &cred.calendar_id,
            cred.account_email.clone(),
            cred.timezone.clone(),
        )?;

        Ok(refreshed.access_token)
    }

    async fn calendar_id(&self, tenant_id: &str) -> Result<String> {
        Ok(self.vault.get(tenant_id, CalendarProviderKind::Google)?.calendar_id)
    }
}

#[async_trait]
impl CalendarAdapter for GoogleCalendarAdapter {
    fn name(&self) -> &str {
        "google"
    }

    async fn auth_url(&self, tenant_id: &str) -> Result<String> {
        let mut url = url::Url::parse(AUTH_BASE).expect("AUTH_BASE is a valid URL");
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("scope", SCOPE)
            .append_pair("state", tenant_id);
        Ok(url.to_string())
    }

    async fn complete_oauth(&self, tenant_id: &str, code: &str) -> Result<()> {
        let resp = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| CalendarError::UpstreamError {
                provider: "google".to_string(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(CalendarError::from_status("google", status, &body));
        }

        #[derive(serde::Deserialize)]
        struct Exchange {
            access_token: String,
            refresh_token: String,
            expires_in: i64,
        }
        let parsed: Exchange = serde_json::from_str(&body).map_err(|e| CalendarError::UpstreamError {
            provider: "google".to_string(),
            message: format!("malformed token exchange response: {e}"),
        })?;

        let expiry_epoch_ms = chrono::Utc::now().timestamp_millis() + parsed.expires_in * 1000;
        self.vault.upsert(
            tenant_id,
            CalendarProviderKind::Google,
            &parsed.refresh_token,
            &parsed.access_token,
            expiry_epoch_ms,
            "primary",
            None,
            None,
        )?;
        Ok(())
    }

    async fn busy_times(
        &self,
        tenant_id: &str,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    ) -> Result<Vec<BusyInterval>> {
        let token = self.access_token(tenant_id).await?;
        let calendar_id = self.calendar_id(tenant_id).await?;

        let resp = self
            .http
            .post(format!("{API_BASE}/freeBusy"))
            .bearer_auth(token)
            .json(&json!({
                "timeMin": from.to_rfc3339(),
                "timeMax": to.to_rfc3339(),
                "items": [{ "id": calendar_id }],
            }))
            .send()
            .await
            .map_err(|e| CalendarError::UpstreamError {
                provider: "google".to_string(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(CalendarError::from_status("google", status, &body));
        }

        let parsed: serde_json::Value = serde_json::from_str(&body).map_err(|e| CalendarError::UpstreamError {
            provider: "google".to_string(),
            message: format!("malformed freeBusy response: {e}"),
        })?;

        let busy = parsed["calendars"][&calendar_id]["busy"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        busy.into_iter()
            .map(|entry| {
                let start = parse_rfc3339(entry["start"].as_str().unwrap_or_default())?;
                let end = parse_rfc3339(entry["end"].as_str().unwrap_or_default())?;
                Ok(BusyInterval { start, end })
            })
            .collect()
    }

    async fn create_event(&self, tenant_id: &str, event: NewEvent) -> Result<String> {
        let token = self.access_token(tenant_id).await?;
        let calendar_id = self.calendar_id(tenant_id).await?;

        let resp = self
            .http
            .post(format!("{API_BASE}/calendars/{calendar_id}/events"))
            .bearer_auth(token)
            .json(&json!({
                "summary": event.summary,
                "description": event.description,
                "start": { "dateTime": event.start.to_rfc3339() },
                "end": { "dateTime": event.end.to_rfc3339() },
                "attendees": event.attendees.iter().map(|email| json!({ "email": email })).collect::<Vec<_>>(),
            }))
            .send()
            .await
            .map_err(|e| CalendarError::UpstreamError {
                provider: "google".to_string(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(CalendarError::from_status("google", status, &body));
        }

        let parsed: serde_json::Value = serde_json::from_str(&body).map_err(|e| CalendarError::UpstreamError {
            provider: "google".to_string(),
            message: format!("malformed event-create response: {e}"),
        })?;
        parsed["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CalendarError::UpstreamError {
                provider: "google".to_string(),
                message: "response missing event id".to_string(),
            })
    }

    async fn list_events(
        &self,
        tenant_id: &str,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    ) -> Result<Vec<CalendarEvent>> {
        let token = self.access_token(tenant_id).await?;
        let calendar_id = self.calendar_id(tenant_id).await?;

        let resp = self
            .http
            .get(format!("{API_BASE}/calendars/{calendar_id}/events"))
            .bearer_auth(token)
            .query(&[
                ("timeMin", from.to_rfc3339()),
                ("timeMax", to.to_rfc3339()),
                ("singleEvents", "true".to_string()),
            ])
            .send()
            .await
            .map_err(|e| CalendarError::UpstreamError {
                provider: "google".to_string(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(CalendarError::from_status("google", status, &body));
        }

        let parsed: serde_json::Value = serde_json::from_str(&body).map_err(|e| CalendarError::UpstreamError {
            provider: "google".to_string(),
            message: format!("malformed events-list response: {e}"),
        })?;

        let items = parsed["items"].as_array().cloned().unwrap_or_default();
        items
            .into_iter()
            .map(|item| {
                let start = parse_rfc3339(item["start"]["dateTime"].as_str().unwrap_or_default())?;
                let end = parse_rfc3339(item["end"]["dateTime"].as_str().unwrap_or_default())?;
                let attendees = item["attendees"]
                    .as_array()
                    .map(|a| {
                        a.iter()
                            .filter_map(|at| at["email"].as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(CalendarEvent {
                    event_id: item["id"].as_str().unwrap_or_default().to_string(),
                    summary: item["summary"].as_str().unwrap_or_default().to_string(),
                    description: item["description"].as_str().map(str::to_string),
                    start,
                    end,
                    attendees,
                })
            })
            .collect()
    }
}

fn parse_rfc3339(s: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).map_err(|e| CalendarError::UpstreamError {
        provider: "google".to_string(),
        message: format!("malformed timestamp {s:?}: {e}"),
    })
}
