use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::{debug, info};
use va_core::types::{
    AppointmentCacheRow, CallSession, ConversationTurn, MetricPoint, MAX_TURN_CONTENT_BYTES,
};

use crate::db;
use crate::error::{Result, StoreError};
use crate::types::{SyncRun, SyncRunStatus, Voicemail};

/// One connection per tenant, opened lazily and kept for the process
/// lifetime. `provision` is the only path allowed to create a file on
/// disk — every other method must fail with `UnknownTenant` rather than
/// create one, so a misrouted call can never grow an unbounded set of
/// stray database files (the "disk-bomb" concern from the per-tenant
/// store's design notes).
pub struct StoreManager {
    data_dir: PathBuf,
    connections: Mutex<HashMap<String, Arc<Mutex<Connection>>>>,
}

impl StoreManager {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            connections: Mutex::new(HashMap::new()),
        }
    }

    fn file_path(&self, tenant_id: &str) -> PathBuf {
        self.data_dir.join(format!("client-{tenant_id}.db"))
    }

    /// Explicitly provision a tenant's store file. Creates it (and its
    /// schema) if it doesn't exist yet, and is idempotent if called again
    /// for a tenant that's already provisioned.
    pub fn provision(&self, tenant_id: &str) -> Result<()> {
        if self.connections.lock().unwrap().contains_key(tenant_id) {
            return Ok(());
        }
        std::fs::create_dir_all(&self.data_dir)?;
        let path = self.file_path(tenant_id);
        let conn = Connection::open(&path)?;
        db::init_db(&conn)?;
        info!(tenant_id, path = %path.display(), "tenant store provisioned");
        self.connections
            .lock()
            .unwrap()
            .insert(tenant_id.to_string(), Arc::new(Mutex::new(conn)));
        Ok(())
    }

    /// Every read/write path but `provision` goes through here. Reopens a
    /// store whose file already exists on disk (e.g. after a process
    /// restart) but never creates one — an unprovisioned tenant always
    /// fails with `UnknownTenant`.
    fn get_conn(&self, tenant_id: &str) -> Result<Arc<Mutex<Connection>>> {
        if let Some(conn) = self.connections.lock().unwrap().get(tenant_id) {
            return Ok(conn.clone());
        }

        let path = self.file_path(tenant_id);
        if !path.exists() {
            return Err(StoreError::UnknownTenant(tenant_id.to_string()));
        }
        debug!(tenant_id, "reopening existing tenant store file");
        let conn = Connection::open(&path)?;
        db::init_db(&conn)?;
        let conn = Arc::new(Mutex::new(conn));
        self.connections
            .lock()
            .unwrap()
            .insert(tenant_id.to_string(), conn.clone());
        Ok(conn)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    // ── call sessions ────────────────────────────────────────────────

    pub fn insert_call_session(&self, session: &CallSession) -> Result<()> {
        let conn = self.get_conn(session.tenant_id.as_str())?;
        let conn = conn.lock().unwrap();
        Ok(db::insert_call_session(&conn, session)?)
    }

    pub fn update_call_status(
        &self,
        tenant_id: &str,
        call_sid: &str,
        status: va_core::types::CallStatus,
        duration_secs: Option<u32>,
        error_text: Option<&str>,
    ) -> Result<()> {
        let conn = self.get_conn(tenant_id)?;
        let conn = conn.lock().unwrap();
        db::update_call_status(&conn, call_sid, status, duration_secs, error_text)?;
        Ok(())
    }

    // ── conversation turns ───────────────────────────────────────────

    /// Appends a turn, auto-assigning the next `turn_number` for the call
    /// and truncating `content` to [`MAX_TURN_CONTENT_BYTES`].
    pub fn append_turn(
        &self,
        tenant_id: &str,
        call_sid: &str,
        role: va_core::types::TurnRole,
        content: &str,
    ) -> Result<ConversationTurn> {
        let conn = self.get_conn(tenant_id)?;
        let conn = conn.lock().unwrap();
        let next_turn = db::max_turn_number(&conn, call_sid)? + 1;
        let turn = ConversationTurn {
            call_sid: call_sid.into(),
            turn_number: next_turn,
            role,
            content: ConversationTurn::truncate_content(content),
            created_at: chrono::Utc::now(),
        };
        debug_assert!(turn.content.len() <= MAX_TURN_CONTENT_BYTES);
        db::insert_turn(&conn, &turn)?;
        Ok(turn)
    }

    pub fn list_turns(&self, tenant_id: &str, call_sid: &str) -> Result<Vec<ConversationTurn>> {
        let conn = self.get_conn(tenant_id)?;
        let conn = conn.lock().unwrap();
        Ok(db::list_turns(&conn, call_sid)?)
    }

    // ── appointment cache ────────────────────────────────────────────

    pub fn upsert_appointment_cache_row(&self, row: &AppointmentCacheRow) -> Result<()> {
        let conn = self.get_conn(row.tenant_id.as_str())?;
        let conn = conn.lock().unwrap();
        Ok(db::upsert_appointment_cache_row(&conn, row)?)
    }

    // ── metrics ──────────────────────────────────────────────────────

    pub fn record_metric(&self, tenant_id: &str, point: &MetricPoint) -> Result<()> {
        let conn = self.get_conn(tenant_id)?;
        let conn = conn.lock().unwrap();
        Ok(db::record_metric(&conn, point)?)
    }

    // ── calendar sync runs ───────────────────────────────────────────

    pub fn start_sync_run(&self, tenant_id: &str, id: &str) -> Result<chrono::DateTime<chrono::Utc>> {
        let conn = self.get_conn(tenant_id)?;
        let conn = conn.lock().unwrap();
        let started_at = chrono::Utc::now();
        db::start_sync_run(&conn, id, started_at)?;
        Ok(started_at)
    }

    pub fn finish_sync_run(
        &self,
        tenant_id: &str,
        id: &str,
        status: SyncRunStatus,
        started_at: chrono::DateTime<chrono::Utc>,
        event_count: u32,
        error: Option<&str>,
    ) -> Result<SyncRun> {
        let conn = self.get_conn(tenant_id)?;
        let conn = conn.lock().unwrap();
        let finished_at = chrono::Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds();
        db::finish_sync_run(&conn, id, status, finished_at, duration_ms, event_count, error)?;
        Ok(SyncRun {
            id: id.to_string(),
            status,
            started_at,
            finished_at: Some(finished_at),
            duration_ms: Some(duration_ms),
            event_count: Some(event_count),
            error: error.map(str::to_string),
        })
    }

    // ── voicemails ───────────────────────────────────────────────────

    pub fn insert_voicemail(&self, tenant_id: &str, voicemail: &Voicemail) -> Result<()> {
        let conn = self.get_conn(tenant_id)?;
        let conn = conn.lock().unwrap();
        Ok(db::insert_voicemail(&conn, voicemail)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use va_core::types::{CallDirection, CallStatus, TenantId, TurnRole};

    fn sample_session(tenant_id: &str, call_sid: &str) -> CallSession {
        CallSession {
            call_sid: call_sid.into(),
            tenant_id: TenantId::from(tenant_id),
            caller_phone: "+15551234567".to_string(),
            direction: CallDirection::Inbound,
            status: CallStatus::Initiated,
            duration_secs: None,
            detected_intent: None,
            error_text: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn operations_on_unprovisioned_tenant_fail_with_unknown_tenant() {
        let dir = tempfile_dir();
        let mgr = StoreManager::new(&dir);
        let err = mgr
            .insert_call_session(&sample_session("ghost", "CA1"))
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownTenant(ref t) if t == "ghost"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn provision_then_insert_then_reopen_round_trips() {
        let dir = tempfile_dir();
        {
            let mgr = StoreManager::new(&dir);
            mgr.provision("acme").unwrap();
            mgr.insert_call_session(&sample_session("acme", "CA1")).unwrap();
            mgr.append_turn("acme", "CA1", TurnRole::User, "hello").unwrap();
        }
        // Fresh manager instance simulates a process restart: the file
        // exists on disk so operations against it must still succeed.
        let mgr = StoreManager::new(&dir);
        let turns = mgr.list_turns("acme", "CA1").unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "hello");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn appointment_cache_upsert_is_idempotent_on_conflict() {
        let dir = tempfile_dir();
        let mgr = StoreManager::new(&dir);
        mgr.provision("acme").unwrap();
        let mut row = sample_appointment_row();
        mgr.upsert_appointment_cache_row(&row).unwrap();
        row.status = va_core::types::AppointmentStatus::Cancelled;
        mgr.upsert_appointment_cache_row(&row).unwrap();
        std::fs::remove_dir_all(&dir).ok();
    }

    fn sample_appointment_row() -> AppointmentCacheRow {
        use va_core::types::{AppointmentStatus, CalendarProviderKind};
        let now = chrono::Utc::now();
        let fixed = now.with_timezone(&chrono::FixedOffset::east_opt(0).unwrap());
        AppointmentCacheRow {
            tenant_id: TenantId::from("acme"),
            calendar_event_id: "evt-1".to_string(),
            provider: CalendarProviderKind::Google,
            start: fixed,
            end: fixed + chrono::Duration::minutes(30),
            duration_minutes: 30,
            status: AppointmentStatus::Confirmed,
            customer_name: Some("Jane Doe".to_string()),
            customer_phone: None,
            customer_email: None,
            service_type: Some("cleaning".to_string()),
            synced_at: now,
        }
    }

    fn tempfile_dir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push(format!("va-store-test-{}", uuid::Uuid::new_v4()));
        dir
    }
}
