use chrono::{DateTime, FixedOffset};

/// Caller-supplied request to `book_appointment`. Name/phone/email are
/// expected to already be normalized by the caller (the Tool Executor,
/// per spec.md §4.10); this crate only validates the result.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub description: Option<String>,
}
