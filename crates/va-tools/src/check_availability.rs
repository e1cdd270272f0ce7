use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::json;
use va_scheduler::SchedulerCore;

use crate::tool::{Tool, ToolResult};

#[derive(Debug, Deserialize)]
struct Input {
    start_time: DateTime<FixedOffset>,
    end_time: DateTime<FixedOffset>,
}

/// `check_availability` tool: reports busy sub-intervals of `[start, end)`
/// against the tenant's calendar, phrased as a sentence the voice layer can
/// read back directly.
pub struct CheckAvailabilityTool {
    tenant_id: String,
    timezone: Tz,
    scheduler: SchedulerCore,
}

impl CheckAvailabilityTool {
    pub fn new(tenant_id: String, timezone: Tz, scheduler: SchedulerCore) -> Self {
        Self {
            tenant_id,
            timezone,
            scheduler,
        }
    }
}

#[async_trait]
impl Tool for CheckAvailabilityTool {
    fn name(&self) -> &str {
        "check_availability"
    }

    fn description(&self) -> &str {
        "Check whether a time range is free on the business's calendar."
    }

    fn input_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "start_time": {"type": "string", "format": "date-time", "description": "RFC3339 start of the window"},
                "end_time": {"type": "string", "format": "date-time", "description": "RFC3339 end of the window"},
            },
            "required": ["start_time", "end_time"],
        })
    }

    async fn execute(&self, input: serde_json::Value) -> ToolResult {
        let input: Input = match serde_json::from_value(input) {
            Ok(v) => v,
            Err(e) => return ToolResult::error(format!("invalid input: {e}")),
        };

        let busy = match self
            .scheduler
            .check_availability(&self.tenant_id, input.start_time, input.end_time)
            .await
        {
            Ok(b) => b,
            Err(e) => return ToolResult::error(format!("upstream_error: {e}")),
        };

        if busy.is_empty() {
            return ToolResult::success("That entire time range is free.");
        }

        let mut times: Vec<String> = busy
            .iter()
            .map(|b| b.start.with_timezone(&self.timezone).format("%-I:%M %p").to_string())
            .collect();
        times.dedup();

        ToolResult::success(format!(
            "I have existing appointments at: {}. Times outside of these are available.",
            times.join(", ")
        ))
    }
}
