use serde_json::Value;

/// Business context injected into the system prompt: name and timezone
/// (spec.md §4.9).
#[derive(Debug, Clone)]
pub struct BookingContext {
    pub business_name: String,
    pub timezone: String,
}

/// Two-tier system prompt: a static tier (booking-protocol invariants, tool
/// contracts) shared across every call for a tenant, and a volatile tier
/// (current local time) that changes every turn and so is never cached.
///
/// Unlike a per-user profile tier, there is no third tier here: every caller
/// on a tenant's line gets the identical static instructions.
#[derive(Debug, Clone)]
pub struct SystemPrompt {
    pub static_tier: String,
    pub volatile_tier: String,
}

impl SystemPrompt {
    pub fn to_plain_text(&self) -> String {
        if self.volatile_tier.is_empty() {
            self.static_tier.clone()
        } else {
            format!("{}\n\n{}", self.static_tier, self.volatile_tier)
        }
    }

    /// Anthropic content-block form with a single cache breakpoint after the
    /// static tier; the volatile tier is placed last, uncached, so it never
    /// breaks the cached prefix.
    pub fn to_anthropic_blocks(&self) -> Vec<Value> {
        let mut blocks = vec![serde_json::json!({
            "type": "text",
            "text": self.static_tier,
            "cache_control": { "type": "ephemeral" },
        })];

        if !self.volatile_tier.is_empty() {
            blocks.push(serde_json::json!({
                "type": "text",
                "text": self.volatile_tier,
            }));
        }

        blocks
    }
}

/// Builds the system prompt enforcing booking-protocol invariants: only
/// `book_appointment` moves the call into confirmation; fields must be
/// normalized before booking; `take_voicemail` is the escape hatch.
pub fn build_system_prompt(context: &BookingContext, now_local: impl Into<String>) -> SystemPrompt {
    let static_tier = format!(
        "You are the phone receptionist for {business}. Speak naturally, as a human \
         receptionist would, in short conversational sentences suited to a phone call.\n\n\
         ## Booking protocol\n\
         - Before calling `book_appointment`, you must have the caller's name, phone \
           number, and email, plus a requested start and end time.\n\
         - Use `check_availability` to confirm a time is open before offering it.\n\
         - Never repeat back the caller's phone or email digit-by-digit unless asked; \
           confirm naturally instead (\"got it, I'll use that\").\n\
         - If the caller cannot or will not provide the required fields, or asks for a \
           human, call `take_voicemail` rather than guessing at missing information.\n\
         - All times you discuss with the caller are in {timezone}; convert to that \
           timezone before calling any tool that accepts a timestamp.\n\
         - Never fabricate a booking confirmation; only a successful `book_appointment` \
           call means an appointment exists.",
        business = context.business_name,
        timezone = context.timezone,
    );

    SystemPrompt {
        static_tier,
        volatile_tier: format!("[Current local time: {}]", now_local.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_tier_carries_business_name_and_timezone() {
        let context = BookingContext {
            business_name: "Acme Dental".to_string(),
            timezone: "America/New_York".to_string(),
        };
        let prompt = build_system_prompt(&context, "2026-01-19T10:00:00-05:00");
        assert!(prompt.static_tier.contains("Acme Dental"));
        assert!(prompt.static_tier.contains("America/New_York"));
    }

    #[test]
    fn anthropic_blocks_place_cache_breakpoint_on_static_tier_only() {
        let context = BookingContext {
            business_name: "Acme Dental".to_string(),
            timezone: "America/New_York".to_string(),
        };
        let prompt = build_system_prompt(&context, "2026-01-19T10:00:00-05:00");
        let blocks = prompt.to_anthropic_blocks();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].get("cache_control").is_some());
        assert!(blocks[1].get("cache_control").is_none());
    }
}
