//! Builds the voice-response XML document returned by `/voice`.
//!
//! Hand-rolled rather than pulled from a general XML crate: the surface is
//! four fixed elements with one text-escaping concern, so a builder plus a
//! `Display` impl is simpler than wiring a serializer for it.

use std::fmt;

/// `<Response><Connect><Stream>…</Stream></Connect><Say>…</Say><Record …/></Response>`
pub struct VoiceResponse {
    pub stream_url: String,
    pub tenant_id: String,
    pub fallback_say: String,
    pub voicemail_action_base: String,
}

impl VoiceResponse {
    pub fn new(
        stream_url: impl Into<String>,
        tenant_id: impl Into<String>,
        fallback_say: impl Into<String>,
        voicemail_action_base: impl Into<String>,
    ) -> Self {
        Self {
            stream_url: stream_url.into(),
            tenant_id: tenant_id.into(),
            fallback_say: fallback_say.into(),
            voicemail_action_base: voicemail_action_base.into(),
        }
    }
}

impl fmt::Display for VoiceResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                r#"<Response>"#,
                r#"<Connect><Stream url="{stream_url}">"#,
                r#"<Parameter name="tenantId" value="{tenant_id}"/>"#,
                r#"</Stream></Connect>"#,
                r#"<Say>{fallback_say}</Say>"#,
                r#"<Record action="{voicemail_action}" maxLength="120" transcribe="true" transcribeCallback="{transcribe_action}"/>"#,
                r#"</Response>"#,
            ),
            stream_url = escape_xml(&self.stream_url),
            tenant_id = escape_xml(&self.tenant_id),
            fallback_say = escape_xml(&self.fallback_say),
            voicemail_action = escape_xml(&format!(
                "{}?tenantId={}",
                self.voicemail_action_base, self.tenant_id
            )),
            transcribe_action = escape_xml(&format!(
                "{}?tenantId={}&type=transcription",
                self.voicemail_action_base, self.tenant_id
            )),
        )
    }
}

/// Empty `<Response/>` acknowledgement for status-callback and duplicate
/// webhook deliveries.
pub fn empty_response() -> &'static str {
    r#"<?xml version="1.0" encoding="UTF-8"?><Response/>"#
}

/// A `<Response><Say>…</Say><Hangup/></Response>` for unresolved-tenant /
/// suspended-tenant polite hangups.
pub fn polite_hangup(message: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><Response><Say>{}</Say><Hangup/></Response>"#,
        escape_xml(message)
    )
}

/// A `<Response><Say>…</Say><Pause/><Redirect/></Response>` used when
/// admission queues a call rather than admitting or rejecting it outright:
/// the caller hears a short message, waits, then the provider re-POSTs
/// `/voice` so the call re-enters admission.
pub fn queued_response(message: &str, retry_url: &str, pause_secs: u32) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<Response>"#,
            r#"<Say>{message}</Say>"#,
            r#"<Pause length="{pause_secs}"/>"#,
            r#"<Redirect method="POST">{retry_url}</Redirect>"#,
            r#"</Response>"#,
        ),
        message = escape_xml(message),
        pause_secs = pause_secs,
        retry_url = escape_xml(retry_url),
    )
}

fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_response_embeds_stream_url_and_tenant_param() {
        let resp = VoiceResponse::new(
            "wss://host/media-stream?callSid=CA1&tenantId=t1",
            "t1",
            "Sorry, we could not connect you.",
            "/voicemail-callback",
        );
        let xml = resp.to_string();
        assert!(xml.contains(r#"<Connect><Stream url="wss://host/media-stream?callSid=CA1&amp;tenantId=t1">"#));
        assert!(xml.contains(r#"<Parameter name="tenantId" value="t1"/>"#));
        assert!(xml.contains(r#"maxLength="120""#));
    }

    #[test]
    fn escapes_ampersand_in_say_text() {
        let xml = polite_hangup("Tom & Jerry's office is closed");
        assert!(xml.contains("Tom &amp; Jerry&apos;s office is closed"));
    }

    #[test]
    fn empty_response_is_well_formed() {
        assert_eq!(empty_response(), r#"<?xml version="1.0" encoding="UTF-8"?><Response/>"#);
    }

    #[test]
    fn queued_response_embeds_pause_and_redirect() {
        let xml = queued_response("Please hold.", "/voice?tenantId=t1", 5);
        assert!(xml.contains(r#"<Pause length="5"/>"#));
        assert!(xml.contains(r#"<Redirect method="POST">/voice?tenantId=t1</Redirect>"#));
    }
}
