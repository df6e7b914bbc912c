//! Webhook signature verification.
//!
//! Stripe signs each delivery with HMAC-SHA256 over `"{timestamp}.{payload}"`
//! and sends the result in the `Stripe-Signature` header as `t=<ts>,v1=<sig>`.
//! Nothing downstream of this check may run on an unverified payload.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::errors::AppError;

type HmacSha256 = Hmac<Sha256>;

/// Verifies a provider webhook signature header against the raw payload.
pub fn verify_signature(
    payload: &[u8],
    signature_header: &str,
    webhook_secret: &str,
) -> Result<(), AppError> {
    let mut timestamp = None;
    let mut signature = None;

    for part in signature_header.split(',') {
        match part.split_once('=') {
            Some(("t", v)) => timestamp = Some(v),
            Some(("v1", v)) => signature = Some(v),
            _ => {}
        }
    }

    let (timestamp, signature) = match (timestamp, signature) {
        (Some(t), Some(s)) => (t, s),
        _ => return Err(AppError::SignatureVerification),
    };

    let payload = std::str::from_utf8(payload).map_err(|_| AppError::SignatureVerification)?;
    let signed_payload = format!("{timestamp}.{payload}");

    let mut mac = HmacSha256::new_from_slice(webhook_secret.as_bytes())
        .map_err(|_| AppError::SignatureVerification)?;
    mac.update(signed_payload.as_bytes());

    let expected = hex::encode(mac.finalize().into_bytes());

    if expected.as_bytes().ct_eq(signature.as_bytes()).into() {
        Ok(())
    } else {
        Err(AppError::SignatureVerification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &[u8], timestamp: &str, secret: &str) -> String {
        let signed = format!("{timestamp}.{}", std::str::from_utf8(payload).unwrap());
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(signed.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn test_valid_signature_passes() {
        let secret = "whsec_test_secret";
        let payload = b"{\"type\":\"checkout.session.completed\"}";
        let sig = sign(payload, "1700000000", secret);
        let header = format!("t=1700000000,v1={sig}");
        assert!(verify_signature(payload, &header, secret).is_ok());
    }

    #[test]
    fn test_tampered_payload_fails() {
        let secret = "whsec_test_secret";
        let sig = sign(b"original", "1700000000", secret);
        let header = format!("t=1700000000,v1={sig}");
        assert!(verify_signature(b"tampered", &header, secret).is_err());
    }

    #[test]
    fn test_wrong_secret_fails() {
        let payload = b"payload";
        let sig = sign(payload, "1700000000", "secret_a");
        let header = format!("t=1700000000,v1={sig}");
        assert!(verify_signature(payload, &header, "secret_b").is_err());
    }

    #[test]
    fn test_malformed_header_fails() {
        assert!(verify_signature(b"payload", "not-a-header", "secret").is_err());
        assert!(verify_signature(b"payload", "t=123", "secret").is_err());
        assert!(verify_signature(b"payload", "v1=abc", "secret").is_err());
    }
}
