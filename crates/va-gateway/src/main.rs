use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use va_calendar::{CalendarAdapterRegistry, GoogleCalendarAdapter, OutlookCalendarAdapter};
use va_core::config::VoiceAgentConfig;
use va_coordinator::{Coordinator, NoopCoordinator, RedisCoordinator};
use va_hooks::HookEngine;
use va_llm::{AnthropicLlmAdapter, LlmAdapter};
use va_scheduler::{CalendarSyncLoop, SchedulerCore};
use va_stt::{DeepgramSttAdapter, SttAdapter};
use va_store::StoreManager;
use va_tenants::registry::TenantRegistry;
use va_tts::{ElevenLabsTtsAdapter, TtsAdapter};
use va_vault::{CredentialVault, EncryptionKey};

mod app;
mod http;
mod signature;
mod ws;

fn open_shared_db(data_dir: &std::path::Path) -> anyhow::Result<rusqlite::Connection> {
    std::fs::create_dir_all(data_dir)?;
    let conn = rusqlite::Connection::open(data_dir.join("shared.db"))?;
    va_tenants::db::init_db(&conn)?;
    va_vault::db::init_db(&conn)?;
    Ok(conn)
}

fn build_encryption_key(config: &VoiceAgentConfig) -> anyhow::Result<EncryptionKey> {
    match config.security.encryption_key.as_deref() {
        Some(hex_key) => Ok(EncryptionKey::from_hex(hex_key)?),
        None => {
            warn!("ENCRYPTION_KEY not set; generating an ephemeral key for this process only");
            Ok(EncryptionKey::generate())
        }
    }
}

async fn build_coordinator(config: &VoiceAgentConfig) -> Arc<dyn Coordinator> {
    match config.admission.coordinator_url.as_deref() {
        Some(url) => match RedisCoordinator::connect(url).await {
            Ok(coordinator) => {
                info!("distributed coordinator connected");
                Arc::new(coordinator)
            }
            Err(err) => {
                warn!(%err, "failed to connect coordinator backend; falling back to degraded single-instance mode");
                Arc::new(NoopCoordinator)
            }
        },
        None => {
            info!("COORDINATOR_URL not set; running in degraded single-instance admission mode");
            Arc::new(NoopCoordinator)
        }
    }
}

fn build_calendar_registry(
    config: &VoiceAgentConfig,
    http: reqwest::Client,
    vault: Arc<CredentialVault>,
) -> Arc<CalendarAdapterRegistry> {
    let mut registry = CalendarAdapterRegistry::new();
    if let Some(google) = config.providers.google_calendar.as_ref() {
        registry.register(Box::new(GoogleCalendarAdapter::new(
            http.clone(),
            vault.clone(),
            google.client_id.clone(),
            google.client_secret.clone(),
            format!("{}/auth/google/callback", google.redirect_base),
        )));
    }
    if let Some(outlook) = config.providers.outlook_calendar.as_ref() {
        registry.register(Box::new(OutlookCalendarAdapter::new(
            http.clone(),
            vault.clone(),
            outlook.client_id.clone(),
            outlook.client_secret.clone(),
            format!("{}/auth/outlook/callback", outlook.redirect_base),
        )));
    }
    Arc::new(registry)
}

fn build_stt_adapter(config: &VoiceAgentConfig) -> Arc<dyn SttAdapter> {
    match config.providers.stt.as_ref() {
        Some(stt) => Arc::new(DeepgramSttAdapter::new(stt.base_url.clone(), stt.api_key.clone())),
        None => {
            warn!("no STT provider configured; adapter will fail to open sessions until one is set");
            Arc::new(DeepgramSttAdapter::new("https://api.deepgram.com", "unset"))
        }
    }
}

fn build_tts_adapter(config: &VoiceAgentConfig) -> Arc<dyn TtsAdapter> {
    match config.providers.tts.as_ref() {
        Some(tts) => Arc::new(ElevenLabsTtsAdapter::new(tts.base_url.clone(), tts.api_key.clone(), "default")),
        None => {
            warn!("no TTS provider configured; adapter will fail to synthesize until one is set");
            Arc::new(ElevenLabsTtsAdapter::new("https://api.elevenlabs.io", "unset", "default"))
        }
    }
}

fn build_llm_adapter(config: &VoiceAgentConfig) -> Arc<dyn LlmAdapter> {
    match config.providers.llm.as_ref() {
        Some(llm) => Arc::new(
            AnthropicLlmAdapter::new(llm.api_key.clone(), llm.model.clone()).with_base_url(llm.base_url.clone()),
        ),
        None => {
            warn!("no LLM provider configured; adapter will fail to stream until one is set");
            Arc::new(AnthropicLlmAdapter::new("unset", "claude-sonnet-4-6"))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "va_gateway=info,tower_http=debug".into()),
        )
        .init();

    let config_path = std::env::var("VOICE_AGENT_CONFIG").ok();
    let config = VoiceAgentConfig::load(config_path.as_deref()).unwrap_or_else(|err| {
        warn!(%err, "config load failed, using defaults");
        VoiceAgentConfig::default()
    });

    let data_dir = std::path::PathBuf::from(&config.database.data_dir);
    let shared_db = Arc::new(std::sync::Mutex::new(open_shared_db(&data_dir)?));

    let tenants = Arc::new(TenantRegistry::new(shared_db.clone()));
    let store = Arc::new(StoreManager::new(data_dir.clone()));
    for tenant in tenants.list_all()? {
        store.provision(tenant.tenant_id.as_str())?;
    }
    let encryption_key = build_encryption_key(&config)?;
    let vault = Arc::new(CredentialVault::new(shared_db.clone(), tenants.clone(), encryption_key));

    let http_client = reqwest::Client::new();
    let calendars = build_calendar_registry(&config, http_client, vault.clone());
    let scheduler = SchedulerCore::new(tenants.clone(), calendars.clone(), store.clone());
    let coordinator = build_coordinator(&config).await;
    let stt = build_stt_adapter(&config);
    let tts = build_tts_adapter(&config);
    let llm = build_llm_adapter(&config);
    let hooks = Arc::new(HookEngine::new());

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let sync_loop = CalendarSyncLoop::new(
        tenants.clone(),
        calendars.clone(),
        store.clone(),
        config.call.calendar_sync_interval_min,
    );
    tokio::spawn(sync_loop.run(shutdown_rx));

    let bind = config.server.bind.clone();
    let port = config.server.port;

    let state = Arc::new(app::AppState::new(
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
        shutdown_tx.clone(),
    ));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!(%addr, "voice agent gateway listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            let _ = shutdown_tx.send(true);
            info!("shutdown signal received");
        })
        .await?;

    Ok(())
}
