//! Provider webhook signature checks.
//!
//! Stripe signs `"<t>.<body>"` and sends `Stripe-Signature: t=<ts>,v1=<hex>`.
//! PayPal deliveries are checked against a shared secret over
//! `"<transmission id>|<transmission time>|<sha256 hex of body>"`.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Accepted clock skew for timestamps in the future.
const MAX_FUTURE_SKEW_SECONDS: i64 = 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("Missing signature header")]
    MissingHeader,
    #[error("Malformed signature header")]
    MalformedHeader,
    #[error("Signature timestamp outside tolerance")]
    TimestampOutOfTolerance,
    #[error("Signature mismatch")]
    InvalidSignature,
}

pub fn verify_stripe_signature(
    secret: &str,
    payload: &[u8],
    header: &str,
    tolerance_seconds: i64,
    now_unix: i64,
) -> Result<(), WebhookError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse().ok(),
            "v1" => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(WebhookError::MalformedHeader);
    }

    let age = now_unix
        .checked_sub(timestamp)
        .ok_or(WebhookError::TimestampOutOfTolerance)?;
    if age > tolerance_seconds || age < -MAX_FUTURE_SKEW_SECONDS {
        return Err(WebhookError::TimestampOutOfTolerance);
    }

    let mut signed = timestamp.to_string().into_bytes();
    signed.push(b'.');
    signed.extend_from_slice(payload);

    if signatures
        .iter()
        .any(|candidate| verify_hex_mac(secret, &signed, candidate))
    {
        Ok(())
    } else {
        Err(WebhookError::InvalidSignature)
    }
}

pub fn verify_paypal_signature(
    secret: &str,
    transmission_id: &str,
    transmission_time: &str,
    signature: &str,
    payload: &[u8],
) -> Result<(), WebhookError> {
    if transmission_id.is_empty() || transmission_time.is_empty() || signature.is_empty() {
        return Err(WebhookError::MissingHeader);
    }
    let signed = paypal_signed_message(transmission_id, transmission_time, payload);

    if verify_hex_mac(secret, signed.as_bytes(), signature) {
        Ok(())
    } else {
        Err(WebhookError::InvalidSignature)
    }
}

/// The string PayPal signs: `<transmission id>|<transmission time>|<hex sha256 of body>`.
pub fn paypal_signed_message(transmission_id: &str, transmission_time: &str, payload: &[u8]) -> String {
    let body_digest = hex::encode(Sha256::digest(payload));
    format!("{}|{}|{}", transmission_id, transmission_time, body_digest)
}

/// Hex HMAC-SHA256 of `message`, as providers put it on the wire.
pub fn sign_hex(secret: &str, message: &[u8]) -> String {
    let mut mac = new_mac(secret);
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

fn verify_hex_mac(secret: &str, message: &[u8], candidate: &str) -> bool {
    let Ok(expected) = hex::decode(candidate) else {
        return false;
    };
    let mut mac = new_mac(secret);
    mac.update(message);
    // constant-time comparison
    mac.verify_slice(&expected).is_ok()
}

fn new_mac(secret: &str) -> HmacSha256 {
    // HMAC accepts keys of any length, so this never fails.
    <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC key length is unrestricted"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = br#"{"type":"payment_intent.succeeded"}"#;

    fn stripe_header(ts: i64) -> String {
        let mut signed = ts.to_string().into_bytes();
        signed.push(b'.');
        signed.extend_from_slice(BODY);
        format!("t={},v1={}", ts, sign_hex(SECRET, &signed))
    }

    #[test]
    fn test_stripe_valid_signature() {
        let now = 1_760_000_000;
        assert_eq!(verify_stripe_signature(SECRET, BODY, &stripe_header(now - 10), 300, now), Ok(()));
    }

    #[test]
    fn test_stripe_rejects_tampered_body() {
        let now = 1_760_000_000;
        let header = stripe_header(now);
        let result = verify_stripe_signature(SECRET, b"{}", &header, 300, now);
        assert_eq!(result, Err(WebhookError::InvalidSignature));
    }

    #[test]
    fn test_stripe_rejects_old_timestamp() {
        let now = 1_760_000_000;
        let header = stripe_header(now - 600);
        let result = verify_stripe_signature(SECRET, BODY, &header, 300, now);
        assert_eq!(result, Err(WebhookError::TimestampOutOfTolerance));
    }

    #[test]
    fn test_stripe_rejects_header_without_timestamp() {
        let result = verify_stripe_signature(SECRET, BODY, "v1=abcdef", 300, 0);
        assert_eq!(result, Err(WebhookError::MalformedHeader));
    }

    #[test]
    fn test_stripe_rejects_extreme_timestamps() {
        for header in ["t=-9223372036854775808,v1=00", "t=9223372036854775807,v1=00"] {
            assert_eq!(
                verify_stripe_signature(SECRET, BODY, header, 300, 1_760_000_000),
                Err(WebhookError::TimestampOutOfTolerance)
            );
        }
        assert_eq!(
            verify_stripe_signature(SECRET, BODY, "t=2,v1=00", 300, i64::MIN + 1),
            Err(WebhookError::TimestampOutOfTolerance)
        );
    }

    #[test]
    fn test_paypal_signature() {
        let digest = hex::encode(Sha256::digest(BODY));
        let signed = format!("tx-1|2026-01-01T00:00:00Z|{}", digest);
        let sig = sign_hex(SECRET, signed.as_bytes());

        assert_eq!(
            verify_paypal_signature(SECRET, "tx-1", "2026-01-01T00:00:00Z", &sig, BODY),
            Ok(())
        );
        assert_eq!(
            verify_paypal_signature(SECRET, "tx-2", "2026-01-01T00:00:00Z", &sig, BODY),
            Err(WebhookError::InvalidSignature)
        );
    }
}
