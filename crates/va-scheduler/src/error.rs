use thiserror::Error;

/// Closed error set the scheduler can surface; maps onto the §7 error kinds
/// `upstream_error` and `missing_or_invalid_booking_fields`.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("start time must be before end time")]
    InvalidTimeRange,

    #[error("customer name is required")]
    MissingCustomerName,

    #[error("customer phone does not contain enough digits")]
    InvalidCustomerPhone,

    #[error("customer email does not match the expected pattern")]
    InvalidCustomerEmail,

    #[error("calendar error: {0}")]
    Calendar(#[from] va_calendar::CalendarError),

    #[error("store error: {0}")]
    Store(#[from] va_store::StoreError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
