use rusqlite::{Connection, Result};
use va_core::types::{
    AppointmentCacheRow, AppointmentStatus, CalendarProviderKind, CallDirection, CallSession,
    CallStatus, ConversationTurn, MetricPoint, TurnRole,
};

use crate::types::{SyncRunStatus, Voicemail};

/// Initialize one tenant's store file. Safe to call on every startup
/// (idempotent) — but the caller (`StoreManager::provision`) only invokes
/// this the first time a tenant's file is created, per §12.3: full column
/// sets up front, no runtime `ALTER TABLE`.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    create_call_logs_table(conn)?;
    create_conversation_turns_table(conn)?;
    create_appointment_cache_table(conn)?;
    create_client_metrics_table(conn)?;
    create_calendar_sync_runs_table(conn)?;
    create_voicemails_table(conn)?;
    Ok(())
}

fn create_call_logs_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS call_logs (
            call_sid        TEXT PRIMARY KEY NOT NULL,
            tenant_id       TEXT NOT NULL,
            caller_phone    TEXT NOT NULL,
            direction       TEXT NOT NULL,
            status          TEXT NOT NULL,
            duration_secs   INTEGER,
            detected_intent TEXT,
            error_text      TEXT,
            created_at      TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_call_logs_sid ON call_logs(call_sid);",
    )
}

fn create_conversation_turns_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS conversation_turns (
            call_sid     TEXT NOT NULL,
            turn_number  INTEGER NOT NULL,
            role         TEXT NOT NULL,
            content      TEXT NOT NULL,
            created_at   TEXT NOT NULL,
            PRIMARY KEY (call_sid, turn_number)
        );
        CREATE INDEX IF NOT EXISTS idx_turns_call ON conversation_turns(call_sid, turn_number);",
    )
}

fn create_appointment_cache_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS appointment_cache (
            tenant_id          TEXT NOT NULL,
            calendar_event_id  TEXT NOT NULL,
            provider           TEXT NOT NULL,
            start              TEXT NOT NULL,
            end                TEXT NOT NULL,
            duration_minutes   INTEGER NOT NULL,
            status             TEXT NOT NULL,
            customer_name      TEXT,
            customer_phone     TEXT,
            customer_email     TEXT,
            service_type       TEXT,
            synced_at          TEXT NOT NULL,
            PRIMARY KEY (tenant_id, calendar_event_id)
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_appt_cache_key
            ON appointment_cache(tenant_id, calendar_event_id);",
    )
}

fn create_client_metrics_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS client_metrics (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            tenant_id   TEXT,
            name        TEXT NOT NULL,
            value       REAL NOT NULL,
            metadata    TEXT,
            timestamp   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_metrics_tenant_ts
            ON client_metrics(tenant_id, timestamp);",
    )
}

fn create_calendar_sync_runs_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS calendar_sync_runs (
            id            TEXT PRIMARY KEY NOT NULL,
            status        TEXT NOT NULL,
            started_at    TEXT NOT NULL,
            finished_at   TEXT,
            duration_ms   INTEGER,
            event_count   INTEGER,
            error         TEXT
        );",
    )
}

fn create_voicemails_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS voicemails (
            call_sid        TEXT PRIMARY KEY NOT NULL,
            recording_url    TEXT NOT NULL,
            transcription    TEXT,
            duration_secs    INTEGER,
            created_at       TEXT NOT NULL
        );",
    )
}

// ── call_logs ────────────────────────────────────────────────────────────

pub fn insert_call_session(conn: &Connection, session: &CallSession) -> Result<()> {
    conn.execute(
        "INSERT INTO call_logs
         (call_sid, tenant_id, caller_phone, direction, status, duration_secs,
          detected_intent, error_text, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            session.call_sid.as_str(),
            session.tenant_id.as_str(),
            session.caller_phone,
            direction_str(session.direction),
            status_str(session.status),
            session.duration_secs,
            session.detected_intent,
            session.error_text,
            session.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn update_call_status(
    conn: &Connection,
    call_sid: &str,
    status: CallStatus,
    duration_secs: Option<u32>,
    error_text: Option<&str>,
) -> Result<usize> {
    conn.execute(
        "UPDATE call_logs SET status = ?2, duration_secs = ?3, error_text = ?4 WHERE call_sid = ?1",
        rusqlite::params![call_sid, status_str(status), duration_secs, error_text],
    )
}

fn direction_str(d: CallDirection) -> &'static str {
    match d {
        CallDirection::Inbound => "inbound",
        CallDirection::Outbound => "outbound",
    }
}

fn status_str(s: CallStatus) -> &'static str {
    match s {
        CallStatus::Initiated => "initiated",
        CallStatus::InProgress => "in-progress",
        CallStatus::Completed => "completed",
        CallStatus::Failed => "failed",
        CallStatus::NoAnswer => "no-answer",
    }
}

// ── conversation_turns ───────────────────────────────────────────────────

pub fn insert_turn(conn: &Connection, turn: &ConversationTurn) -> Result<()> {
    conn.execute(
        "INSERT INTO conversation_turns (call_sid, turn_number, role, content, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            turn.call_sid.as_str(),
            turn.turn_number,
            role_str(turn.role),
            turn.content,
            turn.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn max_turn_number(conn: &Connection, call_sid: &str) -> Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(turn_number), 0) FROM conversation_turns WHERE call_sid = ?1",
        rusqlite::params![call_sid],
        |row| row.get(0),
    )
}

pub fn list_turns(conn: &Connection, call_sid: &str) -> Result<Vec<ConversationTurn>> {
    let mut stmt = conn.prepare(
        "SELECT call_sid, turn_number, role, content, created_at
         FROM conversation_turns WHERE call_sid = ?1 ORDER BY turn_number",
    )?;
    let rows = stmt.query_map(rusqlite::params![call_sid], row_to_turn)?;
    rows.collect()
}

fn role_str(r: TurnRole) -> &'static str {
    match r {
        TurnRole::User => "user",
        TurnRole::Assistant => "assistant",
    }
}

fn row_to_turn(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConversationTurn> {
    let role_str: String = row.get(2)?;
    let role = match role_str.as_str() {
        "user" => TurnRole::User,
        "assistant" => TurnRole::Assistant,
        other => {
            return Err(rusqlite::Error::InvalidColumnType(
                2,
                format!("unknown turn role: {other}"),
                rusqlite::types::Type::Text,
            ))
        }
    };
    Ok(ConversationTurn {
        call_sid: row.get::<_, String>(0)?.into(),
        turn_number: row.get(1)?,
        role,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

// ── appointment_cache ────────────────────────────────────────────────────

/// `ON CONFLICT UPDATE` semantics keyed on `(tenant_id, calendar_event_id)`.
pub fn upsert_appointment_cache_row(conn: &Connection, row: &AppointmentCacheRow) -> Result<()> {
    conn.execute(
        "INSERT INTO appointment_cache
         (tenant_id, calendar_event_id, provider, start, end, duration_minutes,
          status, customer_name, customer_phone, customer_email, service_type, synced_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(tenant_id, calendar_event_id) DO UPDATE SET
            provider = excluded.provider,
            start = excluded.start,
            end = excluded.end,
            duration_minutes = excluded.duration_minutes,
            status = excluded.status,
            customer_name = excluded.customer_name,
            customer_phone = excluded.customer_phone,
            customer_email = excluded.customer_email,
            service_type = excluded.service_type,
            synced_at = excluded.synced_at",
        rusqlite::params![
            row.tenant_id.as_str(),
            row.calendar_event_id,
            provider_str(row.provider),
            row.start.to_rfc3339(),
            row.end.to_rfc3339(),
            row.duration_minutes,
            appt_status_str(row.status),
            row.customer_name,
            row.customer_phone,
            row.customer_email,
            row.service_type,
            row.synced_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn provider_str(p: CalendarProviderKind) -> &'static str {
    match p {
        CalendarProviderKind::Google => "google",
        CalendarProviderKind::Outlook => "outlook",
    }
}

fn appt_status_str(s: AppointmentStatus) -> &'static str {
    match s {
        AppointmentStatus::Confirmed => "confirmed",
        AppointmentStatus::Cancelled => "cancelled",
        AppointmentStatus::Completed => "completed",
        AppointmentStatus::NoShow => "no-show",
    }
}

// ── client_metrics ───────────────────────────────────────────────────────

pub fn record_metric(conn: &Connection, point: &MetricPoint) -> Result<()> {
    conn.execute(
        "INSERT INTO client_metrics (tenant_id, name, value, metadata, timestamp)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            point.tenant_id.as_ref().map(|t| t.as_str()),
            point.name,
            point.value,
            point.metadata.as_ref().map(|v| v.to_string()),
            point.timestamp.to_rfc3339(),
        ],
    )?;
    Ok(())
}

// ── calendar_sync_runs ───────────────────────────────────────────────────

pub fn start_sync_run(conn: &Connection, id: &str, started_at: chrono::DateTime<chrono::Utc>) -> Result<()> {
    conn.execute(
        "INSERT INTO calendar_sync_runs (id, status, started_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![id, SyncRunStatus::Running.to_string(), started_at.to_rfc3339()],
    )?;
    Ok(())
}

pub fn finish_sync_run(
    conn: &Connection,
    id: &str,
    status: SyncRunStatus,
    finished_at: chrono::DateTime<chrono::Utc>,
    duration_ms: i64,
    event_count: u32,
    error: Option<&str>,
) -> Result<()> {
    conn.execute(
        "UPDATE calendar_sync_runs SET status=?2, finished_at=?3, duration_ms=?4, event_count=?5, error=?6 WHERE id=?1",
        rusqlite::params![
            id,
            status.to_string(),
            finished_at.to_rfc3339(),
            duration_ms,
            event_count,
            error
        ],
    )?;
    Ok(())
}

// ── voicemails ───────────────────────────────────────────────────────────

pub fn insert_voicemail(conn: &Connection, voicemail: &Voicemail) -> Result<()> {
    conn.execute(
        "INSERT INTO voicemails (call_sid, recording_url, transcription, duration_secs, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            voicemail.call_sid,
            voicemail.recording_url,
            voicemail.transcription,
            voicemail.duration_secs,
            voicemail.created_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}
