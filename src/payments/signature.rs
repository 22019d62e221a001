//! Webhook signature verification.
//!
//! The gateway sends `x-signature: ts=<unix>,v1=<hex hmac>` and
//! `x-request-id`. The HMAC-SHA256 is computed over
//! `id:<data id>;request-id:<request id>;ts:<ts>;` with the shared secret.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature header missing ts or v1")]
    MalformedHeader,
    #[error("request id header missing")]
    MissingRequestId,
    #[error("signature mismatch")]
    Mismatch,
}

pub fn signed_template(data_id: &str, request_id: &str, ts: &str) -> String {
    format!("id:{data_id};request-id:{request_id};ts:{ts};")
}

/// Hex HMAC the gateway is expected to send as `v1`.
pub fn compute_signature(secret: &str, data_id: &str, request_id: &str, ts: &str) -> String {
    hex::encode(mac(secret, data_id, request_id, ts).finalize().into_bytes())
}

/// Verifies a webhook delivery. With no secret configured every delivery is
/// accepted.
pub fn verify_webhook_signature(
    secret: Option<&str>,
    signature_header: Option<&str>,
    request_id: Option<&str>,
    data_id: &str,
) -> Result<(), SignatureError> {
    let Some(secret) = secret else { return Ok(()) };

    let mut ts = None;
    let mut v1 = None;
    for part in signature_header.unwrap_or_default().split(',') {
        if let Some((key, value)) = part.split_once('=') {
            match key.trim() {
                "ts" => ts = Some(value.trim()),
                "v1" => v1 = Some(value.trim()),
                _ => {}
            }
        }
    }
    let (Some(ts), Some(v1)) = (ts.filter(|s| !s.is_empty()), v1.filter(|s| !s.is_empty())) else {
        return Err(SignatureError::MalformedHeader);
    };
    let request_id = request_id.map(str::trim).filter(|s| !s.is_empty()).ok_or(SignatureError::MissingRequestId)?;

    let expected = hex::decode(v1).map_err(|_| SignatureError::Mismatch)?;
    mac(secret, data_id, request_id, ts).verify_slice(&expected).map_err(|_| SignatureError::Mismatch)
}

fn mac(secret: &str, data_id: &str, request_id: &str, ts: &str) -> HmacSha256 {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(signed_template(data_id, request_id, ts).as_bytes());
    mac
}
