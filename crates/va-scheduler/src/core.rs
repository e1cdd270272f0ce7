use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use tracing::info;
use va_calendar::{BusyInterval, CalendarAdapterRegistry, NewEvent};
use va_core::types::{AppointmentCacheRow, AppointmentStatus, TenantId};
use va_store::StoreManager;
use va_tenants::registry::TenantRegistry;

use crate::error::{Result, SchedulerError};
use crate::types::BookingRequest;

/// Scheduler Core (C5): availability queries and booking writes against the
/// tenant's chosen calendar provider, with an appointment cache upsert on
/// success. Holds no per-tenant state of its own — everything routes
/// through the registry/adapters/store it's constructed with, shared via
/// `Arc` so it can be cloned cheaply into per-call tool handles.
#[derive(Clone)]
pub struct SchedulerCore {
    tenants: Arc<TenantRegistry>,
    calendars: Arc<CalendarAdapterRegistry>,
    store: Arc<StoreManager>,
}

impl SchedulerCore {
    pub fn new(
        tenants: Arc<TenantRegistry>,
        calendars: Arc<CalendarAdapterRegistry>,
        store: Arc<StoreManager>,
    ) -> Self {
        Self {
            tenants,
            calendars,
            store,
        }
    }

    /// Busy sub-intervals in `[start, end)`; an empty result means fully free.
    pub async fn check_availability(
        &self,
        tenant_id: &str,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Vec<BusyInterval>> {
        let adapter = self.adapter_for(tenant_id)?;
        Ok(adapter.busy_times(tenant_id, start, end).await?)
    }

    /// Validates `req`, writes the event to the provider, and on success
    /// upserts the appointment cache row. On provider failure the cache is
    /// left untouched — the caller sees `upstream_error` either way.
    pub async fn book_appointment(&self, tenant_id: &str, req: BookingRequest) -> Result<String> {
        validate_booking(&req)?;

        let tenant = self
            .tenants
            .find_by_id(tenant_id)
            .ok()
            .flatten()
            .ok_or_else(|| SchedulerError::Calendar(va_calendar::CalendarError::NoCredential(tenant_id.to_string())))?;
        let provider = tenant.config.calendar.provider;
        let adapter = self
            .calendars
            .get(&provider.to_string())
            .ok_or_else(|| SchedulerError::Calendar(va_calendar::CalendarError::NoCredential(tenant_id.to_string())))?;

        let event_id = adapter
            .create_event(
                tenant_id,
                NewEvent {
                    summary: format!("Appointment: {}", req.customer_name),
                    description: req.description.clone(),
                    start: req.start,
                    end: req.end,
                    attendees: vec![req.customer_email.clone()],
                },
            )
            .await?;

        let duration_minutes = (req.end - req.start).num_minutes().max(0) as u32;
        let row = AppointmentCacheRow {
            tenant_id: TenantId::from(tenant_id),
            calendar_event_id: event_id.clone(),
            provider,
            start: req.start,
            end: req.end,
            duration_minutes,
            status: AppointmentStatus::Confirmed,
            customer_name: Some(req.customer_name),
            customer_phone: Some(req.customer_phone),
            customer_email: Some(req.customer_email),
            service_type: None,
            synced_at: chrono::Utc::now(),
        };
        self.store.upsert_appointment_cache_row(&row)?;

        info!(tenant_id, event_id = %event_id, "appointment booked");
        Ok(event_id)
    }

    fn adapter_for(&self, tenant_id: &str) -> Result<&dyn va_calendar::CalendarAdapter> {
        let tenant = self
            .tenants
            .find_by_id(tenant_id)
            .ok()
            .flatten()
            .ok_or_else(|| SchedulerError::Calendar(va_calendar::CalendarError::NoCredential(tenant_id.to_string())))?;
        let provider_name = tenant.config.calendar.provider.to_string();
        self.calendars
            .get(&provider_name)
            .ok_or_else(|| SchedulerError::Calendar(va_calendar::CalendarError::NoCredential(tenant_id.to_string())))
    }
}

fn validate_booking(req: &BookingRequest) -> Result<()> {
    if req.start >= req.end {
        return Err(SchedulerError::InvalidTimeRange);
    }
    if req.customer_name.trim().is_empty() {
        return Err(SchedulerError::MissingCustomerName);
    }
    let digit_count = req.customer_phone.chars().filter(|c| c.is_ascii_digit()).count();
    if digit_count < 10 {
        return Err(SchedulerError::InvalidCustomerPhone);
    }
    if !is_plausible_email(&req.customer_email) {
        return Err(SchedulerError::InvalidCustomerEmail);
    }
    Ok(())
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() {
        return false;
    }
    let Some((_, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_request() -> BookingRequest {
        let start = chrono::Utc::now()
            .with_timezone(&FixedOffset::east_opt(0).unwrap())
            + Duration::days(1);
        BookingRequest {
            customer_name: "Dick Cheney".to_string(),
            customer_phone: "2024561414".to_string(),
            customer_email: "d@example.com".to_string(),
            start,
            end: start + Duration::hours(1),
            description: None,
        }
    }

    #[test]
    fn rejects_inverted_time_range() {
        let mut req = sample_request();
        std::mem::swap(&mut req.start, &mut req.end);
        assert!(matches!(validate_booking(&req), Err(SchedulerError::InvalidTimeRange)));
    }

    #[test]
    fn rejects_short_phone() {
        let mut req = sample_request();
        req.customer_phone = "12345".to_string();
        assert!(matches!(validate_booking(&req), Err(SchedulerError::InvalidCustomerPhone)));
    }

    #[test]
    fn rejects_malformed_email() {
        let mut req = sample_request();
        req.customer_email = "not-an-email".to_string();
        assert!(matches!(validate_booking(&req), Err(SchedulerError::InvalidCustomerEmail)));
    }

    #[test]
    fn accepts_well_formed_request() {
        assert!(validate_booking(&sample_request()).is_ok());
    }
}
