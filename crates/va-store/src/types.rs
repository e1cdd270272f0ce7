use serde::{Deserialize, Serialize};

/// §6 names a `calendar_sync_runs` table but §3's data model doesn't model
/// it explicitly; this mirrors the `sync_run` record mentioned in §4.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncRunStatus {
    Running,
    Ok,
    Failed,
}

impl std::fmt::Display for SyncRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncRunStatus::Running => write!(f, "running"),
            SyncRunStatus::Ok => write!(f, "ok"),
            SyncRunStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: String,
    pub status: SyncRunStatus,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
    pub duration_ms: Option<i64>,
    pub event_count: Option<u32>,
    pub error: Option<String>,
}

/// A recorded voicemail (the `voicemails` table named in §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voicemail {
    pub call_sid: String,
    pub recording_url: String,
    pub transcription: Option<String>,
    pub duration_secs: Option<u32>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
