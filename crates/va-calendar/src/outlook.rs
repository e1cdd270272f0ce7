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

const TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";
const AUTH_BASE: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/authorize";
const API_BASE: &str = "https://graph.microsoft.com/v1.0";
const SCOPE: &str = "offline_access Calendars.ReadWrite";

pub struct OutlookCalendarAdapter {
    http: reqwest::Client,
    vault: Arc<CredentialVault>,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
}

impl OutlookCalendarAdapter {
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

    async fn access_token(&self, tenant_id: &str) -> Result<String> {
        let cred = self
            .vault
            .get(tenant_id, CalendarProviderKind::Outlook)
            .map_err(|e| match e {
                va_vault::VaultError::NotFound { .. } => CalendarError::NoCredential(tenant_id.to_string()),
                other => CalendarError::Vault(other),
            })?;

        if !oauth::needs_refresh(cred.token_expiry_epoch_ms) {
            return Ok(cred.access_token);
        }

        let refreshed = oauth::refresh_access_token(
            &self.http,
            "outlook",
            TOKEN_URL,
            &self.client_id,
            &self.client_secret,
            &cred.refresh_token,
        )
        .await?;

        self.vault.upsert(
            tenant_id,
            CalendarProviderKind::Outlook,
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
        Ok(self.vault.get(tenant_id, CalendarProviderKind::Outlook)?.calendar_id)
    }
}

#[async_trait]
impl CalendarAdapter for OutlookCalendarAdapter {
    fn name(&self) -> &str {
        "outlook"
    }

    async fn auth_url(&self, tenant_id: &str) -> Result<String> {
        let mut url = url::Url::parse(AUTH_BASE).expect("AUTH_BASE is a valid URL");
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("response_mode", "query")
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
                ("scope", SCOPE),
            ])
            .send()
            .await
            .map_err(|e| CalendarError::UpstreamError {
                provider: "outlook".to_string(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(CalendarError::from_status("outlook", status, &body));
        }

        #[derive(serde::Deserialize)]
        struct Exchange {
            access_token: String,
            refresh_token: String,
            expires_in: i64,
        }
        let parsed: Exchange = serde_json::from_str(&body).map_err(|e| CalendarError::UpstreamError {
            provider: "outlook".to_string(),
            message: format!("malformed token exchange response: {e}"),
        })?;

        let expiry_epoch_ms = chrono::Utc::now().timestamp_millis() + parsed.expires_in * 1000;
        self.vault.upsert(
            tenant_id,
            CalendarProviderKind::Outlook,
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

        let resp = self
            .http
            .post(format!("{API_BASE}/me/calendar/getSchedule"))
            .bearer_auth(token)
            .json(&json!({
                "schedules": [self.calendar_id(tenant_id).await?],
                "startTime": { "dateTime": from.to_rfc3339(), "timeZone": "UTC" },
                "endTime": { "dateTime": to.to_rfc3339(), "timeZone": "UTC" },
                "availabilityViewInterval": 30,
            }))
            .send()
            .await
            .map_err(|e| CalendarError::UpstreamError {
                provider: "outlook".to_string(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(CalendarError::from_status("outlook", status, &body));
        }

        let parsed: serde_json::Value = serde_json::from_str(&body).map_err(|e| CalendarError::UpstreamError {
            provider: "outlook".to_string(),
            message: format!("malformed getSchedule response: {e}"),
        })?;

        let items = parsed["value"][0]["scheduleItems"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        items
            .into_iter()
            .map(|item| {
                let start = parse_rfc3339(item["start"]["dateTime"].as_str().unwrap_or_default())?;
                let end = parse_rfc3339(item["end"]["dateTime"].as_str().unwrap_or_default())?;
                Ok(BusyInterval { start, end })
            })
            .collect()
    }

    async fn create_event(&self, tenant_id: &str, event: NewEvent) -> Result<String> {
        let token = self.access_token(tenant_id).await?;

        let resp = self
            .http
            .post(format!("{API_BASE}/me/calendar/events"))
            .bearer_auth(token)
            .json(&json!({
                "subject": event.summary,
                "body": { "contentType": "text", "content": event.description.unwrap_or_default() },
                "start": { "dateTime": event.start.to_rfc3339(), "timeZone": "UTC" },
                "end": { "dateTime": event.end.to_rfc3339(), "timeZone": "UTC" },
                "attendees": event.attendees.iter().map(|email| json!({
                    "emailAddress": { "address": email },
                    "type": "required",
                })).collect::<Vec<_>>(),
            }))
            .send()
            .await
            .map_err(|e| CalendarError::UpstreamError {
                provider: "outlook".to_string(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(CalendarError::from_status("outlook", status, &body));
        }

        let parsed: serde_json::Value = serde_json::from_str(&body).map_err(|e| CalendarError::UpstreamError {
            provider: "outlook".to_string(),
            message: format!("malformed event-create response: {e}"),
        })?;
        parsed["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CalendarError::UpstreamError {
                provider: "outlook".to_string(),
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

        let resp = self
            .http
            .get(format!("{API_BASE}/me/calendarView"))
            .bearer_auth(token)
            .query(&[
                ("startDateTime", from.to_rfc3339()),
                ("endDateTime", to.to_rfc3339()),
            ])
            .send()
            .await
            .map_err(|e| CalendarError::UpstreamError {
                provider: "outlook".to_string(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(CalendarError::from_status("outlook", status, &body));
        }

        let parsed: serde_json::Value = serde_json::from_str(&body).map_err(|e| CalendarError::UpstreamError {
            provider: "outlook".to_string(),
            message: format!("malformed calendarView response: {e}"),
        })?;

        let items = parsed["value"].as_array().cloned().unwrap_or_default();
        items
            .into_iter()
            .map(|item| {
                let start = parse_rfc3339(item["start"]["dateTime"].as_str().unwrap_or_default())?;
                let end = parse_rfc3339(item["end"]["dateTime"].as_str().unwrap_or_default())?;
                let attendees = item["attendees"]
                    .as_array()
                    .map(|a| {
                        a.iter()
                            .filter_map(|at| at["emailAddress"]["address"].as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(CalendarEvent {
                    event_id: item["id"].as_str().unwrap_or_default().to_string(),
                    summary: item["subject"].as_str().unwrap_or_default().to_string(),
                    description: item["bodyPreview"].as_str().map(str::to_string),
                    start,
                    end,
                    attendees,
                })
            })
            .collect()
    }
}

/// Graph returns `dateTimeTimeZone` values without a UTC offset when the
/// zone is UTC (the default `Prefer: outlook.timezone` unless the tenant
/// overrides it) — fall back to parsing as naive-UTC before giving up.
fn parse_rfc3339(s: &str) -> Result<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc().fixed_offset())
        .map_err(|e| CalendarError::UpstreamError {
            provider: "outlook".to_string(),
            message: format!("malformed timestamp {s:?}: {e}"),
        })
}
