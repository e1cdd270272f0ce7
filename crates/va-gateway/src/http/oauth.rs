//! Calendar OAuth endpoints — `/auth/{provider}/login`, `/callback`,
//! `/select-calendar`. Thin HTTP shims over [`va_calendar::CalendarAdapter`]
//! and [`va_vault::CredentialVault`]; all provider-specific token exchange
//! lives in the adapter.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::warn;
use va_core::types::CalendarProviderKind;

use crate::app::AppState;

fn parse_provider(raw: &str) -> Option<CalendarProviderKind> {
    match raw {
        "google" => Some(CalendarProviderKind::Google),
        "outlook" => Some(CalendarProviderKind::Outlook),
        _ => None,
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

#[derive(Debug, serde::Deserialize)]
pub struct LoginQuery {
    #[serde(rename = "tenantId")]
    tenant_id: String,
}

/// GET `/auth/{provider}/login?tenantId=` — redirects the tenant's admin
/// to the provider's consent screen.
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<LoginQuery>,
) -> Response {
    if parse_provider(&provider).is_none() {
        return error_response(StatusCode::NOT_FOUND, "unknown calendar provider");
    }
    let Some(adapter) = state.calendars.get(&provider) else {
        return error_response(StatusCode::NOT_IMPLEMENTED, "calendar provider not configured");
    };
    match adapter.auth_url(&query.tenant_id).await {
        Ok(url) => Redirect::temporary(&url).into_response(),
        Err(err) => {
            warn!(%err, provider, tenant_id = %query.tenant_id, "failed to build calendar auth url");
            error_response(StatusCode::BAD_GATEWAY, err.to_string())
        }
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct CallbackQuery {
    code: String,
    /// Carries the tenant id through the provider's redirect round trip.
    state: String,
}

/// GET `/auth/{provider}/callback?code=&state=` — completes the OAuth
/// exchange and persists the resulting credential in the vault.
pub async fn callback_handler(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    if parse_provider(&provider).is_none() {
        return error_response(StatusCode::NOT_FOUND, "unknown calendar provider");
    }
    let Some(adapter) = state.calendars.get(&provider) else {
        return error_response(StatusCode::NOT_IMPLEMENTED, "calendar provider not configured");
    };
    match adapter.complete_oauth(&query.state, &query.code).await {
        Ok(()) => Json(json!({ "status": "connected", "tenantId": query.state, "provider": provider })).into_response(),
        Err(err) => {
            warn!(%err, provider, tenant_id = %query.state, "oauth completion failed");
            error_response(StatusCode::BAD_GATEWAY, err.to_string())
        }
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct SelectCalendarBody {
    #[serde(rename = "tenantId")]
    tenant_id: String,
    #[serde(rename = "calendarId")]
    calendar_id: String,
}

/// POST `/auth/{provider}/select-calendar` — persists which of the
/// tenant's calendars (by provider id) future bookings write to.
pub async fn select_calendar_handler(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Json(body): Json<SelectCalendarBody>,
) -> Response {
    let Some(kind) = parse_provider(&provider) else {
        return error_response(StatusCode::NOT_FOUND, "unknown calendar provider");
    };
    match state.vault.set_calendar_selection(&body.tenant_id, kind, &body.calendar_id) {
        Ok(()) => Json(json!({ "status": "ok" } as Value)).into_response(),
        Err(err) => {
            warn!(%err, provider, tenant_id = %body.tenant_id, "failed to persist calendar selection");
            error_response(StatusCode::BAD_REQUEST, err.to_string())
        }
    }
}
