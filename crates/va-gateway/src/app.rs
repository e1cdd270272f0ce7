use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use dashmap::DashMap;
use tokio::sync::watch;
use va_core::config::VoiceAgentConfig;
use va_coordinator::Coordinator;
use va_hooks::HookEngine;
use va_llm::LlmAdapter;
use va_scheduler::SchedulerCore;
use va_store::StoreManager;
use va_stt::SttAdapter;
use va_tenants::registry::TenantRegistry;
use va_tts::TtsAdapter;
use va_vault::CredentialVault;

use crate::ws::orchestrator::ActiveCall;

/// Central shared state — passed as `Arc<AppState>` to every Axum handler
/// and into each call's orchestrator task.
pub struct AppState {
    pub config: VoiceAgentConfig,
    pub tenants: Arc<TenantRegistry>,
    pub store: Arc<StoreManager>,
    pub vault: Arc<CredentialVault>,
    pub calendars: Arc<va_calendar::CalendarAdapterRegistry>,
    pub scheduler: SchedulerCore,
    pub coordinator: Arc<dyn Coordinator>,
    pub stt: Arc<dyn SttAdapter>,
    pub tts: Arc<dyn TtsAdapter>,
    pub llm: Arc<dyn LlmAdapter>,
    pub hooks: Arc<HookEngine>,
    pub http: reqwest::Client,
    /// `call_sid` -> handle used to observe/abort an in-flight call from
    /// an HTTP path (e.g. a future admin "hang up this call" endpoint).
    pub active_calls: DashMap<String, ActiveCall>,
    /// Flips to `true` on graceful shutdown; observed by the calendar sync
    /// loop and any long-lived per-call timers.
    pub shutdown: watch::Sender<bool>,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: VoiceAgentConfig,
        tenants: Arc<TenantRegistry>,
        store: Arc<StoreManager>,
        vault: Arc<CredentialVault>,
        calendars: Arc<va_calendar::CalendarAdapterRegistry>,
        scheduler: SchedulerCore,
        coordinator: Arc<dyn Coordinator>,
        stt: Arc<dyn SttAdapter>,
        tts: Arc<dyn TtsAdapter>,
        llm: Arc<dyn LlmAdapter>,
        hooks: Arc<HookEngine>,
        shutdown: watch::Sender<bool>,
    ) -> Self {
        Self {
            config,
            tenants,
            store,
            vault,
            calendars,
            scheduler,
            coordinator,
            stt,
            tts,
            llm,
            hooks,
            http: reqwest::Client::new(),
            active_calls: DashMap::new(),
            shutdown,
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(crate::http::health::healthz_handler))
        .route("/voice", post(crate::http::webhooks::voice_handler))
        .route(
            "/status-callback",
            post(crate::http::webhooks::status_callback_handler),
        )
        .route(
            "/voicemail-callback",
            post(crate::http::webhooks::voicemail_callback_handler),
        )
        .route("/auth/{provider}/login", get(crate::http::oauth::login_handler))
        .route(
            "/auth/{provider}/callback",
            get(crate::http::oauth::callback_handler),
        )
        .route(
            "/auth/{provider}/select-calendar",
            post(crate::http::oauth::select_calendar_handler),
        )
        .route("/media-stream", get(crate::ws::connection::media_stream_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
