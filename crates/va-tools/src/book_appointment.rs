use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::json;
use va_scheduler::{BookingRequest, SchedulerCore};

use crate::normalize::{is_valid_email, is_valid_phone, normalize_email, normalize_phone};
use crate::tool::{Tool, ToolResult};

#[derive(Debug, Deserialize)]
struct Input {
    customer_name: String,
    customer_phone: String,
    customer_email: String,
    start_time: DateTime<FixedOffset>,
    end_time: DateTime<FixedOffset>,
    #[serde(default)]
    description: Option<String>,
}

/// `book_appointment` tool: normalizes the spoken name/phone/email, then
/// writes the event through the Scheduler Core. Invalid fields never reach
/// the scheduler — they're rejected here with a literal error string the
/// orchestrator can pattern-match on to re-ask the caller.
pub struct BookAppointmentTool {
    tenant_id: String,
    scheduler: SchedulerCore,
}

impl BookAppointmentTool {
    pub fn new(tenant_id: String, scheduler: SchedulerCore) -> Self {
        Self { tenant_id, scheduler }
    }
}

#[async_trait]
impl Tool for BookAppointmentTool {
    fn name(&self) -> &str {
        "book_appointment"
    }

    fn description(&self) -> &str {
        "Book an appointment once name, phone, email, and a time range have all been collected."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "customer_name": {"type": "string"},
                "customer_phone": {"type": "string"},
                "customer_email": {"type": "string"},
                "start_time": {"type": "string", "format": "date-time"},
                "end_time": {"type": "string", "format": "date-time"},
                "description": {"type": "string"},
            },
            "required": ["customer_name", "customer_phone", "customer_email", "start_time", "end_time"],
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let input: Input = match serde_json::from_value(input) {
            Ok(v) => v,
            Err(e) => return ToolResult::error(format!("invalid input: {e}")),
        };

        let name_ok = !input.customer_name.trim().is_empty();
        let phone = normalize_phone(&input.customer_phone);
        let phone_ok = is_valid_phone(&phone);
        let email = normalize_email(&input.customer_email);
        let email_ok = is_valid_email(&email);

        if !name_ok || !phone_ok || !email_ok {
            return ToolResult::error(format!(
                "missing_or_invalid_booking_fields (name={name_ok}, phone={phone_ok}, email={email_ok})"
            ));
        }

        let req = BookingRequest {
            customer_name: input.customer_name.trim().to_string(),
            customer_phone: phone,
            customer_email: email,
            start: input.start_time,
            end: input.end_time,
            description: input.description,
        };

        match self.scheduler.book_appointment(&self.tenant_id, req).await {
            Ok(event_id) => ToolResult::success(format!("Appointment booked successfully. Reference ID: {event_id}")),
            Err(e) => ToolResult::error(format!("upstream_error: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_each_invalid_field_independently() {
        let name_ok = false;
        let phone_ok = true;
        let email_ok = true;
        let msg = format!("missing_or_invalid_booking_fields (name={name_ok}, phone={phone_ok}, email={email_ok})");
        assert_eq!(msg, "missing_or_invalid_booking_fields (name=false, phone=true, email=true)");
    }
}
