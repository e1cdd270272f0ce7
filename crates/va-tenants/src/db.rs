use std::str::FromStr;

use rusqlite::{Connection, Result};
use va_core::types::{Tenant, TenantConfig, TenantId, TenantStatus};

/// Map a SELECT row (column order from `TENANT_SELECT_SQL`) to a Tenant.
/// Centralised here so every query in this crate stays consistent.
pub(crate) fn row_to_tenant(row: &rusqlite::Row<'_>) -> rusqlite::Result<Tenant> {
    let status_str: String = row.get(3)?;
    let status = match status_str.as_str() {
        "active" => TenantStatus::Active,
        "trial" => TenantStatus::Trial,
        "suspended" => TenantStatus::Suspended,
        other => {
            return Err(rusqlite::Error::InvalidColumnType(
                3,
                format!("unknown tenant status: {other}"),
                rusqlite::types::Type::Text,
            ))
        }
    };
    let tz_str: String = row.get(2)?;
    let timezone = chrono_tz::Tz::from_str(&tz_str).unwrap_or(chrono_tz::UTC);
    let config_json: String = row.get(4)?;
    let config: TenantConfig = serde_json::from_str(&config_json).map_err(|e| {
        rusqlite::Error::InvalidColumnType(4, e.to_string(), rusqlite::types::Type::Text)
    })?;

    Ok(Tenant {
        tenant_id: TenantId(row.get(0)?),
        display_name: row.get(1)?,
        phone_number: row.get(5)?,
        timezone,
        status,
        config,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

const TENANT_SELECT_SQL: &str = "SELECT id, display_name, timezone, status, config, phone_number, created_at, updated_at FROM tenants";

/// Initialize the tenants table. Safe to call on every startup — `CREATE
/// TABLE IF NOT EXISTS` means it's idempotent.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS tenants (
            id              TEXT PRIMARY KEY NOT NULL,
            display_name    TEXT NOT NULL,
            phone_number    TEXT NOT NULL UNIQUE,
            timezone        TEXT NOT NULL,
            status          TEXT NOT NULL DEFAULT 'trial',
            config          TEXT NOT NULL DEFAULT '{}',
            created_at      TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tenants_phone ON tenants (phone_number);
        CREATE TABLE IF NOT EXISTS admin_audit_logs (
            id          TEXT PRIMARY KEY NOT NULL,
            tenant_id   TEXT,
            actor       TEXT NOT NULL,
            action      TEXT NOT NULL,
            detail      TEXT NOT NULL DEFAULT '{}',
            created_at  TEXT NOT NULL
        );",
    )
}

pub fn insert_tenant(conn: &Connection, tenant: &Tenant) -> Result<()> {
    let config_json =
        serde_json::to_string(&tenant.config).expect("TenantConfig serializes infallibly");
    conn.execute(
        "INSERT INTO tenants (id, display_name, phone_number, timezone, status, config, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            tenant.tenant_id.as_str(),
            tenant.display_name,
            tenant.phone_number,
            tenant.timezone.name(),
            tenant.status.to_string(),
            config_json,
            tenant.created_at.to_rfc3339(),
            tenant.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

pub fn find_by_id(conn: &Connection, tenant_id: &str) -> Result<Option<Tenant>> {
    let sql = format!("{TENANT_SELECT_SQL} WHERE id = ?1");
    conn.query_row(&sql, rusqlite::params![tenant_id], row_to_tenant)
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })
}

pub fn find_by_phone(conn: &Connection, phone: &str) -> Result<Option<Tenant>> {
    let sql = format!("{TENANT_SELECT_SQL} WHERE phone_number = ?1");
    conn.query_row(&sql, rusqlite::params![phone], row_to_tenant)
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })
}

pub fn list_active(conn: &Connection) -> Result<Vec<Tenant>> {
    let sql = format!("{TENANT_SELECT_SQL} WHERE status != 'suspended' ORDER BY created_at");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_tenant)?;
    rows.collect()
}

pub fn list_all(conn: &Connection) -> Result<Vec<Tenant>> {
    let sql = format!("{TENANT_SELECT_SQL} ORDER BY created_at");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_tenant)?;
    rows.collect()
}

pub fn update_status(conn: &Connection, tenant_id: &str, status: TenantStatus) -> Result<usize> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE tenants SET status = ?2, updated_at = ?3 WHERE id = ?1",
        rusqlite::params![tenant_id, status.to_string(), now],
    )
}

pub fn update_config(conn: &Connection, tenant_id: &str, config: &TenantConfig) -> Result<usize> {
    let config_json =
        serde_json::to_string(config).expect("TenantConfig serializes infallibly");
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE tenants SET config = ?2, updated_at = ?3 WHERE id = ?1",
        rusqlite::params![tenant_id, config_json, now],
    )
}

pub fn append_audit_log(
    conn: &Connection,
    id: &str,
    tenant_id: Option<&str>,
    actor: &str,
    action: &str,
    detail: &serde_json::Value,
) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO admin_audit_logs (id, tenant_id, actor, action, detail, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![id, tenant_id, actor, action, detail.to_string(), now],
    )?;
    Ok(())
}
