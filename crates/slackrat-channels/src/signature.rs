//! Slack request signature verification.
//!
//! Every webhook Slack sends carries `X-Slack-Request-Timestamp` and
//! `X-Slack-Signature`. The signature is
//! `v0=` + hex(HMAC-SHA256(signing_secret, "v0:{timestamp}:{raw_body}")).
//!
//! The raw body bytes are hashed exactly as received, the comparison runs in
//! constant time, and timestamps outside a 5-minute window are rejected.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Maximum distance between the request timestamp and now, in seconds.
pub const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_HEADER: &str = "x-slack-signature";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signing secret is not configured")]
    MissingSecret,

    #[error("missing {0} header")]
    MissingHeader(&'static str),

    #[error("malformed request timestamp")]
    InvalidTimestamp,

    #[error("request timestamp outside the allowed window")]
    Stale,

    #[error("signature mismatch")]
    Mismatch,
}

/// Compute the `v0=` signature Slack would send for this request.
pub fn compute_signature(secret: &str, timestamp: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length, so this never fails in practice.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return String::new(),
    };
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    format!("v0={}", hex::encode(mac.finalize().into_bytes()))
}

/// Verify a Slack request.
///
/// `now_secs` is the current Unix time; callers pass it in so the replay
/// window is testable.
pub fn verify_signature(
    secret: &str,
    timestamp: Option<&str>,
    body: &[u8],
    signature: Option<&str>,
    now_secs: i64,
) -> Result<(), SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::MissingSecret);
    }
    let timestamp = timestamp.ok_or(SignatureError::MissingHeader(TIMESTAMP_HEADER))?;
    let signature = signature.ok_or(SignatureError::MissingHeader(SIGNATURE_HEADER))?;

    if !validate_timestamp(timestamp) {
        return Err(SignatureError::InvalidTimestamp);
    }
    let ts = timestamp
        .split('.')
        .next()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or(SignatureError::InvalidTimestamp)?;
    if (now_secs - ts).abs() > MAX_TIMESTAMP_AGE_SECS {
        return Err(SignatureError::Stale);
    }

    let expected = compute_signature(secret, timestamp, body);
    let expected = expected.as_bytes();
    let provided = signature.as_bytes();

    if expected.len() != provided.len() {
        let _ = expected.ct_eq(expected);
        return Err(SignatureError::Mismatch);
    }

    if bool::from(expected.ct_eq(provided)) {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

/// Digits with at most one dot, at most 32 chars.
pub fn validate_timestamp(ts: &str) -> bool {
    if ts.is_empty() || ts.len() > 32 {
        return false;
    }
    let mut dots = 0;
    for c in ts.chars() {
        if c == '.' {
            dots += 1;
            if dots > 1 {
                return false;
            }
        } else if !c.is_ascii_digit() {
            return false;
        }
    }
    true
}

/// Current Unix time in seconds.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
