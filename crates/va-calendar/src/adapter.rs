use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};

use crate::error::Result;
use crate::types::{BusyInterval, CalendarEvent, NewEvent};

/// Uniform capability set exposed per calendar provider (google, outlook).
///
/// Implementations are responsible for their own OAuth token refresh —
/// callers never see a provider-specific token shape, only the
/// `tenant_id` whose credential the vault holds.
#[async_trait]
pub trait CalendarAdapter: Send + Sync {
    /// Stable lowercase identifier (`"google"` / `"outlook"`), used as the
    /// key inside [`CalendarAdapterRegistry`](crate::manager::CalendarAdapterRegistry).
    fn name(&self) -> &str;

    /// URL the tenant visits to grant calendar access.
    async fn auth_url(&self, tenant_id: &str) -> Result<String>;

    /// Exchanges an OAuth authorization code for tokens and stores them
    /// in the vault.
    async fn complete_oauth(&self, tenant_id: &str, code: &str) -> Result<()>;

    /// Busy sub-intervals in `[from, to)`. An empty result means fully free.
    async fn busy_times(
        &self,
        tenant_id: &str,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    ) -> Result<Vec<BusyInterval>>;

    /// Creates an event on the tenant's selected calendar, returning the
    /// provider's event id.
    async fn create_event(&self, tenant_id: &str, event: NewEvent) -> Result<String>;

    /// Lists events in `[from, to)` on the tenant's selected calendar.
    async fn list_events(
        &self,
        tenant_id: &str,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
    ) -> Result<Vec<CalendarEvent>>;
}
