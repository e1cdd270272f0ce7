use rusqlite::{Connection, Result};
use va_core::types::{CalendarCredential, CalendarProviderKind};

/// Lives in the shared registry database, alongside `tenants` — the vault
/// consults the tenant registry before every write, so keeping the two
/// tables in one file avoids a cross-database join for that check.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS calendar_credentials (
            tenant_id                  TEXT NOT NULL,
            provider                   TEXT NOT NULL,
            encrypted_refresh_token    TEXT NOT NULL,
            encrypted_access_token     TEXT NOT NULL,
            token_expiry_epoch_ms      INTEGER NOT NULL,
            calendar_id                TEXT NOT NULL,
            account_email              TEXT,
            timezone                   TEXT,
            PRIMARY KEY (tenant_id, provider)
        );",
    )
}

fn provider_str(p: CalendarProviderKind) -> &'static str {
    match p {
        CalendarProviderKind::Google => "google",
        CalendarProviderKind::Outlook => "outlook",
    }
}

fn parse_provider(s: &str) -> rusqlite::Result<CalendarProviderKind> {
    match s {
        "google" => Ok(CalendarProviderKind::Google),
        "outlook" => Ok(CalendarProviderKind::Outlook),
        other => Err(rusqlite::Error::InvalidColumnType(
            1,
            format!("unknown calendar provider: {other}"),
            rusqlite::types::Type::Text,
        )),
    }
}

fn row_to_credential(row: &rusqlite::Row<'_>) -> rusqlite::Result<CalendarCredential> {
    let provider_str: String = row.get(1)?;
    Ok(CalendarCredential {
        tenant_id: row.get::<_, String>(0)?.into(),
        provider: parse_provider(&provider_str)?,
        encrypted_refresh_token: row.get(2)?,
        encrypted_access_token: row.get(3)?,
        token_expiry_epoch_ms: row.get(4)?,
        calendar_id: row.get(5)?,
        account_email: row.get(6)?,
        timezone: row.get(7)?,
    })
}

const CREDENTIAL_SELECT_SQL: &str = "SELECT tenant_id, provider, encrypted_refresh_token, \
    encrypted_access_token, token_expiry_epoch_ms, calendar_id, account_email, timezone \
    FROM calendar_credentials";

/// `ON CONFLICT UPDATE` keyed on `(tenant_id, provider)` — `upsert` per §4.3.
pub fn upsert_credential(conn: &Connection, cred: &CalendarCredential) -> Result<()> {
    conn.execute(
        "INSERT INTO calendar_credentials
         (tenant_id, provider, encrypted_refresh_token, encrypted_access_token,
          token_expiry_epoch_ms, calendar_id, account_email, timezone)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(tenant_id, provider) DO UPDATE SET
            encrypted_refresh_token = excluded.encrypted_refresh_token,
            encrypted_access_token = excluded.encrypted_access_token,
            token_expiry_epoch_ms = excluded.token_expiry_epoch_ms,
            calendar_id = excluded.calendar_id,
            account_email = excluded.account_email,
            timezone = excluded.timezone",
        rusqlite::params![
            cred.tenant_id.as_str(),
            provider_str(cred.provider),
            cred.encrypted_refresh_token,
            cred.encrypted_access_token,
            cred.token_expiry_epoch_ms,
            cred.calendar_id,
            cred.account_email,
            cred.timezone,
        ],
    )?;
    Ok(())
}

pub fn find_credential(
    conn: &Connection,
    tenant_id: &str,
    provider: CalendarProviderKind,
) -> Result<Option<CalendarCredential>> {
    let sql = format!("{CREDENTIAL_SELECT_SQL} WHERE tenant_id = ?1 AND provider = ?2");
    conn.query_row(
        &sql,
        rusqlite::params![tenant_id, provider_str(provider)],
        row_to_credential,
    )
    .map(Some)
    .or_else(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(other),
    })
}

/// Updates only `calendar_id` for an existing credential row.
pub fn set_calendar_selection(
    conn: &Connection,
    tenant_id: &str,
    provider: CalendarProviderKind,
    calendar_id: &str,
) -> Result<usize> {
    conn.execute(
        "UPDATE calendar_credentials SET calendar_id = ?3 WHERE tenant_id = ?1 AND provider = ?2",
        rusqlite::params![tenant_id, provider_str(provider), calendar_id],
    )
}
