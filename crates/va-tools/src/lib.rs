//! Tool Executor (spec.md §4.10): the booking tools exposed to the LLM
//! during a call — availability checks, appointment booking, and the
//! voicemail escape hatch — plus the phone/email normalization the
//! transcript-sourced booking fields need before they reach the scheduler.

pub mod book_appointment;
pub mod check_availability;
pub mod normalize;
pub mod take_voicemail;
pub mod tool;

use chrono_tz::Tz;
use va_scheduler::SchedulerCore;

pub use book_appointment::BookAppointmentTool;
pub use check_availability::CheckAvailabilityTool;
pub use take_voicemail::{TakeVoicemailTool, VOICEMAIL_SENTINEL};
pub use tool::{to_definitions, Tool, ToolResult};

/// Builds the fixed tool catalog for one tenant's call session.
pub fn catalog_for_tenant(tenant_id: String, timezone: Tz, scheduler: SchedulerCore) -> Vec<Box<dyn Tool>> {
    vec![
        Box::new(CheckAvailabilityTool::new(tenant_id.clone(), timezone, scheduler.clone())),
        Box::new(BookAppointmentTool::new(tenant_id, scheduler)),
        Box::new(TakeVoicemailTool),
    ]
}
