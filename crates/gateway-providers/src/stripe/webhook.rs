//! # Stripe Webhook Handling
//!
//! Signature verification for the `Stripe-Signature` header and mapping of
//! verified payloads onto [`ProviderEvent`]s.

use chrono::{DateTime, Utc};
use gateway_core::{GatewayError, GatewayResult, ProviderEvent};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

/// Signatures older than this are rejected (seconds)
pub const TIMESTAMP_TOLERANCE: i64 = 300;

/// Events created endpoints subscribe to
pub const WEBHOOK_EVENTS: &[&str] = &[
    "charge.succeeded",
    "charge.failed",
    "charge.refunded",
    "payment_intent.succeeded",
    "payment_intent.payment_failed",
    "invoice.paid",
    "invoice.payment_failed",
    "customer.subscription.created",
    "customer.subscription.updated",
    "customer.subscription.deleted",
];

/// Events that lead to ledger writes
const PROCESSABLE_EVENTS: &[&str] = &[
    "charge.succeeded",
    "charge.failed",
    "charge.refunded",
    "invoice.paid",
    "customer.subscription.deleted",
];

pub fn should_process(event_type: &str) -> bool {
    PROCESSABLE_EVENTS.contains(&event_type)
}

pub(crate) struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<String>,
}

pub(crate) fn parse_signature_header(header: &str) -> GatewayResult<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => signatures.push(value.to_string()),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        GatewayError::WebhookVerificationFailed("Missing timestamp in signature".to_string())
    })?;

    if signatures.is_empty() {
        return Err(GatewayError::WebhookVerificationFailed(
            "No v1 signature found".to_string(),
        ));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

/// Check `header` against `payload` signed with `secret` at time `now`
pub(crate) fn verify_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    now: i64,
) -> GatewayResult<()> {
    let parsed = parse_signature_header(header)?;

    let within_tolerance = now
        .checked_sub(parsed.timestamp)
        .and_then(i64::checked_abs)
        .is_some_and(|skew| skew <= TIMESTAMP_TOLERANCE);
    if !within_tolerance {
        return Err(GatewayError::WebhookVerificationFailed(
            "Timestamp outside tolerance".to_string(),
        ));
    }

    let expected = compute_signature(secret, parsed.timestamp, payload)?;
    let valid = parsed
        .signatures
        .iter()
        .any(|sig| constant_time_compare(sig, &expected));

    if !valid {
        return Err(GatewayError::WebhookVerificationFailed(
            "Signature mismatch".to_string(),
        ));
    }
    Ok(())
}

/// Hex HMAC-SHA256 over `"{timestamp}.{payload}"`
pub(crate) fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> GatewayResult<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| GatewayError::WebhookVerificationFailed(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[derive(Debug, Deserialize)]
struct StripeWebhookEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    created: i64,
    data: StripeEventData,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    object: serde_json::Value,
}

/// Parse a verified payload into a provider event; `data` holds the event's object
pub(crate) fn parse_event(payload: &[u8]) -> GatewayResult<ProviderEvent> {
    let event: StripeWebhookEvent = serde_json::from_slice(payload)
        .map_err(|e| GatewayError::Serialization(format!("Failed to parse webhook: {}", e)))?;

    Ok(ProviderEvent {
        id: event.id,
        event_type: event.event_type,
        data: event.data.object,
        created_at: DateTime::from_timestamp(event.created, 0).unwrap_or_else(Utc::now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const PAYLOAD: &[u8] = br#"{"id":"evt_1","type":"charge.succeeded","created":1700000000,"data":{"object":{"id":"ch_1","amount":2500}}}"#;

    fn header(timestamp: i64) -> String {
        format!(
            "t={},v1={}",
            timestamp,
            compute_signature(SECRET, timestamp, PAYLOAD).unwrap()
        )
    }

    #[test]
    fn test_parse_signature_header() {
        let parsed = parse_signature_header("t=1234567890,v1=abc123,v1=def456").unwrap();
        assert_eq!(parsed.timestamp, 1234567890);
        assert_eq!(parsed.signatures, vec!["abc123", "def456"]);

        assert!(parse_signature_header("v1=abc").is_err());
        assert!(parse_signature_header("t=1").is_err());
    }

    #[test]
    fn test_valid_signature() {
        let now = 1_700_000_100;
        assert!(verify_signature(SECRET, &header(now - 10), PAYLOAD, now).is_ok());
    }

    #[test]
    fn test_stale_signature() {
        let now = 1_700_000_100;
        let result = verify_signature(SECRET, &header(now - TIMESTAMP_TOLERANCE - 1), PAYLOAD, now);
        assert!(matches!(result, Err(GatewayError::WebhookVerificationFailed(_))));
    }

    #[test]
    fn test_extreme_timestamps_are_outside_tolerance() {
        let now = 1_700_000_000;
        let result = verify_signature(SECRET, "t=-9223372036854775808,v1=00", PAYLOAD, now);
        assert!(matches!(result, Err(GatewayError::WebhookVerificationFailed(_))));

        let result = verify_signature(SECRET, &header(i64::MAX), PAYLOAD, i64::MIN);
        assert!(matches!(result, Err(GatewayError::WebhookVerificationFailed(_))));
    }

    #[test]
    fn test_wrong_secret() {
        let now = 1_700_000_100;
        let result = verify_signature("whsec_other", &header(now), PAYLOAD, now);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_event() {
        let event = parse_event(PAYLOAD).unwrap();
        assert_eq!(event.id, "evt_1");
        assert_eq!(event.event_type, "charge.succeeded");
        assert_eq!(event.data["amount"], 2500);
        assert_eq!(event.created_at.timestamp(), 1_700_000_000);
        assert!(should_process(&event.event_type));
        assert!(!should_process("customer.created"));
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("abc123", "abc123"));
        assert!(!constant_time_compare("abc123", "abc124"));
        assert!(!constant_time_compare("abc", "abcd"));
    }
}
