//! Telephony webhook ingress — `/voice`, `/status-callback`,
//! `/voicemail-callback`. Implements the signature-verify, idempotency,
//! tenant-resolution, admission pipeline in that order; every branch ends
//! in a 200 with a TwiML-shaped body except a signature mismatch, which
//! is the only case the provider should retry.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use va_core::types::{CallDirection, CallSession, CallStatus, MetricPoint};
use va_coordinator::AdmitPolicy;
use va_protocol::twiml::{empty_response, polite_hangup, queued_response, VoiceResponse};

use crate::app::AppState;

const WEBHOOK_IDEMPOTENCY_TTL_SECS: u64 = 86_400;
const QUEUE_RETRY_PAUSE_SECS: u32 = 5;

#[derive(Debug, serde::Deserialize)]
pub struct TenantQuery {
    #[serde(rename = "tenantId")]
    tenant_id: Option<String>,
}

fn xml_response(status: StatusCode, body: impl Into<String>) -> Response {
    (status, [("content-type", "text/xml")], body.into()).into_response()
}

fn form_param<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

fn request_url(state: &AppState, headers: &HeaderMap, uri: &Uri) -> String {
    let forwarded_proto = headers.get("x-forwarded-proto").and_then(|v| v.to_str().ok());
    let forwarded_host = headers.get("x-forwarded-host").and_then(|v| v.to_str().ok());
    let host_header = headers.get("host").and_then(|v| v.to_str().ok());
    let default_scheme = if state.config.server.public_url.starts_with("https") {
        "https"
    } else {
        "http"
    };
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or(uri.path());
    crate::signature::reconstruct_url(
        forwarded_proto,
        forwarded_host,
        host_header,
        default_scheme,
        path_and_query,
    )
}

/// `true` if the request should bypass signature validation: the operator
/// presented the admin key on the bypass header. Used for local development
/// against providers that can't be configured to sign to a loopback URL.
fn dev_bypass(state: &AppState, headers: &HeaderMap) -> bool {
    match (&state.config.security.admin_api_key, headers.get("x-admin-bypass")) {
        (Some(expected), Some(got)) => got.to_str().map(|g| g == expected).unwrap_or(false),
        _ => false,
    }
}

/// Verifies the inbound signature against the configured account-level
/// telephony auth token. Returns `Ok(())` when the request may proceed.
fn verify_signature(
    state: &AppState,
    headers: &HeaderMap,
    uri: &Uri,
    form: &[(String, String)],
) -> Result<(), Response> {
    if dev_bypass(state, headers) {
        return Ok(());
    }
    let Some(telephony) = state.config.providers.telephony.as_ref() else {
        warn!("telephony provider not configured; rejecting signed webhook");
        return Err(xml_response(StatusCode::FORBIDDEN, empty_response().to_string()));
    };
    let Some(candidate) = headers
        .get("x-telephony-signature")
        .and_then(|v| v.to_str().ok())
    else {
        return Err(xml_response(StatusCode::FORBIDDEN, empty_response().to_string()));
    };
    let url = request_url(state, headers, uri);
    if crate::signature::verify(&telephony.auth_token, &url, form, candidate) {
        Ok(())
    } else {
        warn!(url, "webhook signature mismatch");
        Err(xml_response(StatusCode::FORBIDDEN, empty_response().to_string()))
    }
}

/// The full field set the Webhook Envelope (§3) hashes into an idempotency
/// key: `path`, the raw query-string `suffix`, `call_sid`, `recording_url`,
/// `call_status`, `tenant_id`, and `event_kind`. Pass `""` for any field
/// that doesn't apply to a given endpoint.
struct WebhookKeyParts<'a> {
    path: &'a str,
    suffix: &'a str,
    call_sid: &'a str,
    recording_url: &'a str,
    call_status: &'a str,
    tenant_id: &'a str,
    event_kind: &'a str,
}

fn idempotency_key(parts: WebhookKeyParts) -> String {
    let mut hasher = Sha256::new();
    let fields = [
        parts.path,
        parts.suffix,
        parts.call_sid,
        parts.recording_url,
        parts.call_status,
        parts.tenant_id,
        parts.event_kind,
    ];
    for (i, part) in fields.iter().enumerate() {
        if i > 0 {
            hasher.update(b"\0");
        }
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

fn record_metric_best_effort(state: &AppState, tenant_id: Option<&str>, name: &str, value: f64) {
    let Some(tenant_id) = tenant_id else { return };
    let point = MetricPoint {
        tenant_id: Some(va_core::types::TenantId(tenant_id.to_string())),
        name: name.to_string(),
        value,
        metadata: None,
        timestamp: chrono::Utc::now(),
    };
    if let Err(err) = state.store.record_metric(tenant_id, &point) {
        warn!(%err, tenant_id, name, "failed to record webhook metric");
    }
}

fn map_call_status(raw: &str) -> CallStatus {
    match raw {
        "completed" => CallStatus::Completed,
        "failed" => CallStatus::Failed,
        "busy" => CallStatus::Failed,
        "no-answer" => CallStatus::NoAnswer,
        _ => CallStatus::InProgress,
    }
}

/// POST `/voice` — the initial inbound-call webhook.
pub async fn voice_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TenantQuery>,
    uri: Uri,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let form: Vec<(String, String)> = url::form_urlencoded::parse(&body).into_owned().collect();

    if let Err(resp) = verify_signature(&state, &headers, &uri, &form) {
        return resp;
    }

    let call_sid = form_param(&form, "CallSid").unwrap_or_default().to_string();
    let from = form_param(&form, "From").unwrap_or_default().to_string();
    let to = form_param(&form, "To").unwrap_or_default().to_string();
    let call_status = form_param(&form, "CallStatus").unwrap_or_default().to_string();

    // Tenant id for the key comes from the query param, not the Registry
    // lookup below: §4.11 resolves the tenant only after this idempotency
    // check, and the raw query suffix is what distinguishes a genuine
    // provider retry (identical URL) from the queued-call `<Redirect>`
    // re-entry (carries a fresh `qt` token, see `queued_response` below).
    let key = idempotency_key(WebhookKeyParts {
        path: "/voice",
        suffix: uri.query().unwrap_or(""),
        call_sid: &call_sid,
        recording_url: "",
        call_status: &call_status,
        tenant_id: query.tenant_id.as_deref().unwrap_or(""),
        event_kind: "voice",
    });
    match state.coordinator.mark_webhook_processed(&key, WEBHOOK_IDEMPOTENCY_TTL_SECS).await {
        Ok(true) => {}
        Ok(false) => return xml_response(StatusCode::OK, empty_response().to_string()),
        Err(err) => {
            warn!(%err, "coordinator unavailable for idempotency check; proceeding degraded");
        }
    }

    let tenant = match query.tenant_id.as_deref() {
        Some(id) => state.tenants.find_by_id(id).ok().flatten(),
        None => state.tenants.find_by_phone(&to).ok().flatten(),
    };

    let Some(tenant) = tenant else {
        record_metric_best_effort(&state, None, "voice_webhook_error", 1.0);
        return xml_response(
            StatusCode::OK,
            polite_hangup("Sorry, we couldn't connect your call. Please try again later."),
        );
    };
    let tenant_id = tenant.tenant_id.as_str().to_string();

    if tenant.status == va_core::types::TenantStatus::Suspended {
        record_metric_best_effort(&state, Some(&tenant_id), "voice_webhook_error", 1.0);
        return xml_response(
            StatusCode::OK,
            polite_hangup("This number is not currently accepting calls."),
        );
    }

    let policy = AdmitPolicy {
        max_global_active_calls: state.config.admission.max_global_active_calls,
        max_tenant_active_calls: state.config.admission.max_tenant_active_calls,
        queue_enabled: state.config.admission.queue_enabled,
        queue_max_size: state.config.admission.queue_max_size,
        ttl_secs: state.config.call.max_call_duration_ms / 1000 + 60,
    };
    let admit = match state.coordinator.admit_call(&call_sid, &tenant_id, policy).await {
        Ok(result) => result,
        Err(err) => {
            warn!(%err, "coordinator admit_call failed; admitting degraded");
            va_coordinator::AdmitResult::admitted()
        }
    };

    if !admit.admitted && admit.queued {
        record_metric_best_effort(&state, Some(&tenant_id), "voice_webhook_ok", 1.0);
        // The redirect carries a fresh token so its query suffix differs
        // from this request's; without it the re-POST would hash to the
        // same idempotency key as this one and get silently dropped as a
        // duplicate instead of re-entering admission.
        let retry_token = chrono::Utc::now().timestamp_millis();
        return xml_response(
            StatusCode::OK,
            queued_response(
                "All of our lines are busy. Please hold and we'll connect you shortly.",
                &format!("/voice?tenantId={tenant_id}&qt={retry_token}"),
                QUEUE_RETRY_PAUSE_SECS,
            ),
        );
    }
    if !admit.admitted {
        record_metric_best_effort(&state, Some(&tenant_id), "voice_webhook_error", 1.0);
        return xml_response(
            StatusCode::OK,
            polite_hangup("All of our lines are busy right now. Please try again later."),
        );
    }

    let session = CallSession {
        call_sid: va_core::types::CallSid(call_sid.clone()),
        tenant_id: tenant.tenant_id.clone(),
        caller_phone: from,
        direction: CallDirection::Inbound,
        status: CallStatus::Initiated,
        duration_secs: None,
        detected_intent: None,
        error_text: None,
        created_at: chrono::Utc::now(),
    };
    if let Err(err) = state.store.insert_call_session(&session) {
        warn!(%err, tenant_id, call_sid, "failed to pre-create call session (store likely unprovisioned)");
    }

    let ws_scheme = if state.config.server.public_url.starts_with("https") {
        "wss"
    } else {
        "ws"
    };
    let host = state
        .config
        .server
        .public_url
        .splitn(2, "://")
        .nth(1)
        .unwrap_or(&state.config.server.public_url);
    let stream_url = format!("{ws_scheme}://{host}/media-stream?callSid={call_sid}&tenantId={tenant_id}");

    record_metric_best_effort(&state, Some(&tenant_id), "voice_webhook_ok", 1.0);
    info!(tenant_id, call_sid, "admitted inbound call");
    xml_response(
        StatusCode::OK,
        VoiceResponse::new(
            stream_url,
            tenant_id,
            "I'm sorry, we're unable to connect you right now. Please leave a message after the tone.",
            "/voicemail-callback",
        )
        .to_string(),
    )
}

/// POST `/status-callback` — call lifecycle updates (ringing, completed, failed, …).
pub async fn status_callback_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TenantQuery>,
    uri: Uri,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let form: Vec<(String, String)> = url::form_urlencoded::parse(&body).into_owned().collect();
    if let Err(resp) = verify_signature(&state, &headers, &uri, &form) {
        return resp;
    }

    let call_sid = form_param(&form, "CallSid").unwrap_or_default().to_string();
    let raw_status = form_param(&form, "CallStatus").unwrap_or_default().to_string();
    let duration_secs: Option<u32> = form_param(&form, "CallDuration").and_then(|v| v.parse().ok());

    let key = idempotency_key(WebhookKeyParts {
        path: "/status-callback",
        suffix: uri.query().unwrap_or(""),
        call_sid: &call_sid,
        recording_url: "",
        call_status: &raw_status,
        tenant_id: query.tenant_id.as_deref().unwrap_or(""),
        event_kind: "status-callback",
    });
    match state.coordinator.mark_webhook_processed(&key, WEBHOOK_IDEMPOTENCY_TTL_SECS).await {
        Ok(false) => return xml_response(StatusCode::OK, empty_response().to_string()),
        Ok(true) => {}
        Err(err) => warn!(%err, "coordinator unavailable for idempotency check; proceeding degraded"),
    }

    if let Some(tenant_id) = query.tenant_id.as_deref() {
        let status = map_call_status(&raw_status);
        if let Err(err) = state.store.update_call_status(tenant_id, &call_sid, status, duration_secs, None) {
            warn!(%err, tenant_id, call_sid, "failed to update call status");
        }
    }

    xml_response(StatusCode::OK, empty_response().to_string())
}

#[derive(Debug, serde::Deserialize)]
pub struct VoicemailQuery {
    #[serde(rename = "tenantId")]
    tenant_id: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// POST `/voicemail-callback` — the `<Record>` action callback, fired twice
/// per recording (once immediately, once for the transcription).
pub async fn voicemail_callback_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VoicemailQuery>,
    uri: Uri,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let form: Vec<(String, String)> = url::form_urlencoded::parse(&body).into_owned().collect();
    if let Err(resp) = verify_signature(&state, &headers, &uri, &form) {
        return resp;
    }

    let call_sid = form_param(&form, "CallSid").unwrap_or_default().to_string();
    let recording_url = form_param(&form, "RecordingUrl").unwrap_or_default().to_string();
    let transcription = form_param(&form, "TranscriptionText").map(|s| s.to_string());
    let duration_secs: Option<u32> = form_param(&form, "RecordingDuration").and_then(|v| v.parse().ok());
    let event_kind = query.kind.as_deref().unwrap_or("recording");

    let key = idempotency_key(WebhookKeyParts {
        path: "/voicemail-callback",
        suffix: uri.query().unwrap_or(""),
        call_sid: &call_sid,
        recording_url: &recording_url,
        call_status: "",
        tenant_id: query.tenant_id.as_deref().unwrap_or(""),
        event_kind,
    });
    match state.coordinator.mark_webhook_processed(&key, WEBHOOK_IDEMPOTENCY_TTL_SECS).await {
        Ok(false) => return xml_response(StatusCode::OK, empty_response().to_string()),
        Ok(true) => {}
        Err(err) => warn!(%err, "coordinator unavailable for idempotency check; proceeding degraded"),
    }

    if let Some(tenant_id) = query.tenant_id.as_deref() {
        let voicemail = va_store::types::Voicemail {
            call_sid: call_sid.clone(),
            recording_url,
            transcription,
            duration_secs,
            created_at: chrono::Utc::now(),
        };
        if let Err(err) = state.store.insert_voicemail(tenant_id, &voicemail) {
            warn!(%err, tenant_id, call_sid, "failed to record voicemail");
        }
    }

    xml_response(StatusCode::OK, empty_response().to_string())
}
