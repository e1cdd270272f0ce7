use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque tenant identifier (UUIDv7 — time-sortable for log correlation).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TenantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TenantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Random per-call identifier assigned by the telephony provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallSid(pub String);

impl CallSid {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallSid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CallSid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CallSid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Status transitions are monotone except `suspended` <-> `active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Trial,
    Suspended,
}

impl TenantStatus {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: TenantStatus) -> bool {
        use TenantStatus::*;
        match (*self, next) {
            (a, b) if a == b => true,
            (Suspended, Active) | (Active, Suspended) => true,
            (Trial, Active) | (Trial, Suspended) => true,
            (Suspended, Trial) | (Active, Trial) => false,
        }
    }
}

impl fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TenantStatus::Active => write!(f, "active"),
            TenantStatus::Trial => write!(f, "trial"),
            TenantStatus::Suspended => write!(f, "suspended"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarProviderKind {
    Google,
    Outlook,
}

impl fmt::Display for CalendarProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalendarProviderKind::Google => write!(f, "google"),
            CalendarProviderKind::Outlook => write!(f, "outlook"),
        }
    }
}

/// One weekday's open/close window, local to the tenant's timezone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessHoursWindow {
    pub weekday: u8, // 0 = Sunday .. 6 = Saturday
    pub open: String,
    pub close: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentType {
    pub name: String,
    pub duration_minutes: u32,
    pub pre_buffer_minutes: u32,
    pub post_buffer_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarSelection {
    pub provider: CalendarProviderKind,
    pub calendar_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    pub after_hours_action: String,
    pub fallback_number: Option<String>,
    pub voicemail_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiSettings {
    pub greeting_text: String,
    pub max_retries: u32,
    pub require_service_type: bool,
}

/// JSON config blob attached to a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    pub tenant_id: String,
    pub business_name: String,
    pub phone_number: String,
    #[serde(default)]
    pub business_hours: Vec<BusinessHoursWindow>,
    #[serde(default)]
    pub holidays: Vec<String>,
    #[serde(default)]
    pub appointment_types: Vec<AppointmentType>,
    pub calendar: CalendarSelection,
    pub routing: RoutingConfig,
    pub ai: AiSettings,
}

/// A tenant account — owned by the tenant registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub tenant_id: TenantId,
    pub display_name: String,
    pub phone_number: String,
    pub timezone: chrono_tz::Tz,
    pub status: TenantStatus,
    pub config: TenantConfig,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDirection {
    Inbound,
    Outbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallStatus {
    Initiated,
    InProgress,
    Completed,
    Failed,
    NoAnswer,
}

/// A single phone call — owned by the per-tenant store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSession {
    pub call_sid: CallSid,
    pub tenant_id: TenantId,
    pub caller_phone: String,
    pub direction: CallDirection,
    pub status: CallStatus,
    pub duration_secs: Option<u32>,
    pub detected_intent: Option<String>,
    pub error_text: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
}

/// Cap on stored turn content, per spec.
pub const MAX_TURN_CONTENT_BYTES: usize = 4 * 1024;

/// One utterance in a call — strictly ordered per `call_sid` by `turn_number`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub call_sid: CallSid,
    pub turn_number: u32,
    pub role: TurnRole,
    pub content: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl ConversationTurn {
    /// Truncates `content` to [`MAX_TURN_CONTENT_BYTES`] on a UTF-8 boundary.
    pub fn truncate_content(content: &str) -> String {
        if content.len() <= MAX_TURN_CONTENT_BYTES {
            return content.to_string();
        }
        let mut end = MAX_TURN_CONTENT_BYTES;
        while !content.is_char_boundary(end) {
            end -= 1;
        }
        content[..end].to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

/// A materialized view row over the external calendar — never the source
/// of truth. Unique on `(tenant_id, calendar_event_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentCacheRow {
    pub tenant_id: TenantId,
    pub calendar_event_id: String,
    pub provider: CalendarProviderKind,
    pub start: chrono::DateTime<chrono::FixedOffset>,
    pub end: chrono::DateTime<chrono::FixedOffset>,
    pub duration_minutes: u32,
    pub status: AppointmentStatus,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub service_type: Option<String>,
    pub synced_at: chrono::DateTime<chrono::Utc>,
}

/// One row per `(tenant_id, provider)` — owned by the credential vault.
/// Refresh tokens are never returned in plaintext through any external
/// interface; only the encrypted envelope is stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarCredential {
    pub tenant_id: TenantId,
    pub provider: CalendarProviderKind,
    pub encrypted_refresh_token: String,
    pub encrypted_access_token: String,
    pub token_expiry_epoch_ms: i64,
    pub calendar_id: String,
    pub account_email: Option<String>,
    pub timezone: Option<String>,
}

/// Ephemeral idempotency fingerprint for one inbound webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEnvelope {
    pub idempotency_key: String,
    pub ttl_secs: u64,
}

/// In-memory admission counters, bounded by TTL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActiveSessionCounters {
    pub global: u32,
    pub per_tenant: u32,
}

/// The closed set of metric names emitted by the system (see external
/// interfaces for the full list); kept as a plain string here so new
/// names don't require a core release to add.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricPoint {
    pub tenant_id: Option<TenantId>,
    pub name: String,
    pub value: f64,
    pub metadata: Option<serde_json::Value>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_status_transitions_are_monotone_except_suspend_active() {
        assert!(TenantStatus::Active.can_transition_to(TenantStatus::Suspended));
        assert!(TenantStatus::Suspended.can_transition_to(TenantStatus::Active));
        assert!(!TenantStatus::Active.can_transition_to(TenantStatus::Trial));
        assert!(!TenantStatus::Suspended.can_transition_to(TenantStatus::Trial));
    }

    #[test]
    fn turn_content_truncates_on_char_boundary() {
        let content = "a".repeat(MAX_TURN_CONTENT_BYTES + 10);
        let truncated = ConversationTurn::truncate_content(&content);
        assert_eq!(truncated.len(), MAX_TURN_CONTENT_BYTES);
    }
}
