use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

// Protocol / timing constants from spec §5, §6.
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const MAX_PAYLOAD_BYTES: usize = 128 * 1024;
pub const DEFAULT_ASR_CONFIDENCE_THRESHOLD: f64 = 0.6;
pub const DEFAULT_SILENCE_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_MAX_CALL_DURATION_MS: u64 = 600_000;
pub const DEFAULT_INACTIVITY_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_CALENDAR_SYNC_INTERVAL_MIN: u64 = 30;
pub const DEFAULT_MAX_HISTORY: usize = 20;
pub const DEFAULT_KEEP_RECENT: usize = 10;
pub const TELEPHONY_CONTROL_TIMEOUT_SECS: u64 = 5;
pub const CALENDAR_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Top-level configuration (`agent.toml` + `VOICEAGENT_*` env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceAgentConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
    #[serde(default)]
    pub call: CallConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub features: FeatureFlags,
}

impl Default for VoiceAgentConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: default_port(),
                bind: default_bind(),
                public_url: default_public_url(),
            },
            database: DatabaseConfig::default(),
            security: SecurityConfig::default(),
            admission: AdmissionConfig::default(),
            call: CallConfig::default(),
            providers: ProvidersConfig::default(),
            features: FeatureFlags::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// External base used to synthesize WS URLs and OAuth redirect URLs.
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding the shared store plus one `client-<tenant_id>.db` per tenant.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Secrets and admin access. `encryption_key` and `admin_api_key` are
/// read from env only — never written back to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecurityConfig {
    /// 64 hex chars (32 bytes), required in production.
    pub encryption_key: Option<String>,
    /// Gates admin endpoints and the webhook dev signature bypass.
    pub admin_api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    #[serde(default = "default_max_global")]
    pub max_global_active_calls: u32,
    #[serde(default = "default_max_tenant")]
    pub max_tenant_active_calls: u32,
    #[serde(default)]
    pub queue_enabled: bool,
    #[serde(default = "default_queue_max")]
    pub queue_max_size: usize,
    /// If set, enables distributed idempotency/admission; otherwise degraded mode.
    pub coordinator_url: Option<String>,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            max_global_active_calls: default_max_global(),
            max_tenant_active_calls: default_max_tenant(),
            queue_enabled: false,
            queue_max_size: default_queue_max(),
            coordinator_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallConfig {
    #[serde(default = "default_asr_threshold")]
    pub asr_confidence_threshold: f64,
    #[serde(default = "default_silence_timeout_ms")]
    pub silence_timeout_ms: u64,
    #[serde(default = "default_max_call_duration_ms")]
    pub max_call_duration_ms: u64,
    #[serde(default = "default_inactivity_timeout_ms")]
    pub inactivity_timeout_ms: u64,
    #[serde(default = "default_sync_interval_min")]
    pub calendar_sync_interval_min: u64,
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            asr_confidence_threshold: default_asr_threshold(),
            silence_timeout_ms: default_silence_timeout_ms(),
            max_call_duration_ms: default_max_call_duration_ms(),
            inactivity_timeout_ms: default_inactivity_timeout_ms(),
            calendar_sync_interval_min: default_sync_interval_min(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub stt: Option<SttProviderConfig>,
    pub tts: Option<TtsProviderConfig>,
    pub llm: Option<LlmProviderConfig>,
    pub telephony: Option<TelephonyProviderConfig>,
    pub google_calendar: Option<CalendarProviderConfig>,
    pub outlook_calendar: Option<CalendarProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttProviderConfig {
    pub api_key: String,
    #[serde(default = "default_stt_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsProviderConfig {
    pub api_key: String,
    #[serde(default = "default_tts_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    pub api_key: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
}

/// Per-tenant auth tokens live in `va-vault`; this carries the shared
/// account-level signing secret used to validate inbound webhooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelephonyProviderConfig {
    pub auth_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_oauth_redirect_base")]
    pub redirect_base: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FeatureFlags {
    #[serde(default = "bool_true")]
    pub streaming_llm: bool,
    #[serde(default = "bool_true")]
    pub streaming_tts: bool,
    #[serde(default)]
    pub sms_notifications: bool,
    #[serde(default = "bool_true")]
    pub recording: bool,
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_public_url() -> String {
    format!("http://{}:{}", DEFAULT_BIND, DEFAULT_PORT)
}
fn default_data_dir() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.voice-agent/data", home)
}
fn default_max_global() -> u32 {
    200
}
fn default_max_tenant() -> u32 {
    10
}
fn default_queue_max() -> usize {
    50
}
fn default_asr_threshold() -> f64 {
    DEFAULT_ASR_CONFIDENCE_THRESHOLD
}
fn default_silence_timeout_ms() -> u64 {
    DEFAULT_SILENCE_TIMEOUT_MS
}
fn default_max_call_duration_ms() -> u64 {
    DEFAULT_MAX_CALL_DURATION_MS
}
fn default_inactivity_timeout_ms() -> u64 {
    DEFAULT_INACTIVITY_TIMEOUT_MS
}
fn default_sync_interval_min() -> u64 {
    DEFAULT_CALENDAR_SYNC_INTERVAL_MIN
}
fn default_stt_base_url() -> String {
    "https://api.stt.example.com".to_string()
}
fn default_tts_base_url() -> String {
    "https://api.tts.example.com".to_string()
}
fn default_llm_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_llm_model() -> String {
    "claude-sonnet-4-6".to_string()
}
fn default_oauth_redirect_base() -> String {
    default_public_url()
}

impl VoiceAgentConfig {
    /// Load config from a TOML file with `VOICEAGENT_*` env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. `VOICE_AGENT_CONFIG` env var
    ///   3. `~/.voice-agent/agent.toml`
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .or_else(|| std::env::var("VOICE_AGENT_CONFIG").ok())
            .unwrap_or_else(default_config_path);

        let config: VoiceAgentConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("VOICEAGENT_").split("__"))
            .extract()
            .map_err(|e| crate::error::VoiceAgentError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.voice-agent/agent.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let cfg = VoiceAgentConfig::default();
        assert_eq!(cfg.call.max_call_duration_ms, 600_000);
        assert_eq!(cfg.call.inactivity_timeout_ms, 30_000);
        assert_eq!(cfg.call.asr_confidence_threshold, 0.6);
        assert_eq!(cfg.admission.coordinator_url, None);
    }
}
