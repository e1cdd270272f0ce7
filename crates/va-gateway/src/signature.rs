//! Webhook signature validation (spec.md §6, §4.11 step 1).
//!
//! HMAC-SHA1 over `url || concat(sorted_by_key(k+v))`, base64-encoded, the
//! same scheme Twilio uses for its `X-Twilio-Signature` header. `url` is
//! reconstructed from the request honoring `X-Forwarded-Proto` /
//! `X-Forwarded-Host` so the gateway validates correctly behind a
//! reverse proxy or load balancer.

use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Builds the signing string: the full URL followed by every form/query
/// key-value pair, sorted by key, concatenated with no separator.
fn signing_string(url: &str, params: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut s = String::from(url);
    for (k, v) in sorted {
        s.push_str(k);
        s.push_str(v);
    }
    s
}

/// Computes the base64 HMAC-SHA1 signature for `url`+`params` under `auth_token`.
pub fn sign(auth_token: &str, url: &str, params: &[(String, String)]) -> String {
    use base64::Engine;
    let message = signing_string(url, params);
    let mut mac =
        HmacSha1::new_from_slice(auth_token.as_bytes()).expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}

/// Verifies `candidate` (as received in the signature header) against the
/// signature computed from `auth_token`/`url`/`params`. Constant-time via
/// `Mac::verify_slice`.
pub fn verify(auth_token: &str, url: &str, params: &[(String, String)], candidate: &str) -> bool {
    use base64::Engine;
    let Ok(candidate_bytes) = base64::engine::general_purpose::STANDARD.decode(candidate) else {
        return false;
    };
    let message = signing_string(url, params);
    let Ok(mut mac) = HmacSha1::new_from_slice(auth_token.as_bytes()) else {
        return false;
    };
    mac.update(message.as_bytes());
    mac.verify_slice(&candidate_bytes).is_ok()
}

/// Reconstructs the externally-visible URL for a request, honoring
/// `X-Forwarded-Proto` / `X-Forwarded-Host` ahead of the socket-local
/// scheme/host, per spec.md §6.
pub fn reconstruct_url(
    forwarded_proto: Option<&str>,
    forwarded_host: Option<&str>,
    host_header: Option<&str>,
    default_scheme: &str,
    path_and_query: &str,
) -> String {
    let scheme = forwarded_proto.unwrap_or(default_scheme);
    let host = forwarded_host.or(host_header).unwrap_or("");
    format!("{scheme}://{host}{path_and_query}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let params = vec![
            ("CallSid".to_string(), "CA123".to_string()),
            ("From".to_string(), "+15551234567".to_string()),
        ];
        let sig = sign("secret-token", "https://host/voice", &params);
        assert!(verify("secret-token", "https://host/voice", &params, &sig));
    }

    #[test]
    fn single_byte_mutation_flips_verification() {
        let params = vec![("CallSid".to_string(), "CA123".to_string())];
        let sig = sign("secret-token", "https://host/voice", &params);
        let mut mutated = params.clone();
        mutated[0].1 = "CA124".to_string();
        assert!(!verify("secret-token", "https://host/voice", &mutated, &sig));
    }

    #[test]
    fn wrong_auth_token_fails() {
        let params = vec![("CallSid".to_string(), "CA123".to_string())];
        let sig = sign("secret-token", "https://host/voice", &params);
        assert!(!verify("other-token", "https://host/voice", &params, &sig));
    }

    #[test]
    fn forwarded_headers_take_priority_over_host() {
        let url = reconstruct_url(
            Some("https"),
            Some("public.example.com"),
            Some("internal:8080"),
            "http",
            "/voice",
        );
        assert_eq!(url, "https://public.example.com/voice");
    }

    #[test]
    fn falls_back_to_host_header_when_no_forwarded_headers() {
        let url = reconstruct_url(None, None, Some("localhost:3000"), "http", "/voice");
        assert_eq!(url, "http://localhost:3000/voice");
    }
}
