//! TC3-HMAC-SHA256 request signing for Tencent Cloud APIs
//!
//! Only the subset Lighthouse needs: `POST /`, no query string, JSON body,
//! and `content-type;host` as the signed headers.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "TC3-HMAC-SHA256";
pub const CONTENT_TYPE: &str = "application/json; charset=utf-8";
const SIGNED_HEADERS: &str = "content-type;host";

/// Inputs of one signature. Borrowed so a request can be signed without
/// copying the payload.
#[derive(Debug, Clone, Copy)]
pub struct SigningRequest<'a> {
    pub secret_id: &'a str,
    pub secret_key: &'a str,
    pub service: &'a str,
    pub host: &'a str,
    pub payload: &'a str,
    /// Unix seconds; also determines the credential scope date (UTC).
    pub timestamp: i64,
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => unreachable!("HMAC-SHA256 accepts any key length"),
    };
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// UTC date (`YYYY-MM-DD`) used in the credential scope.
pub fn scope_date(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .unwrap_or_default()
        .format("%Y-%m-%d")
        .to_string()
}

fn canonical_request(req: &SigningRequest<'_>) -> String {
    format!(
        "POST\n/\n\ncontent-type:{CONTENT_TYPE}\nhost:{}\n\n{SIGNED_HEADERS}\n{}",
        req.host,
        sha256_hex(req.payload.as_bytes())
    )
}

/// Hex signature over the request.
pub fn signature(req: &SigningRequest<'_>) -> String {
    let date = scope_date(req.timestamp);
    let scope = format!("{date}/{}/tc3_request", req.service);
    let string_to_sign = format!(
        "{ALGORITHM}\n{}\n{scope}\n{}",
        req.timestamp,
        sha256_hex(canonical_request(req).as_bytes())
    );

    let secret_date = hmac_sha256(format!("TC3{}", req.secret_key).as_bytes(), date.as_bytes());
    let secret_service = hmac_sha256(&secret_date, req.service.as_bytes());
    let secret_signing = hmac_sha256(&secret_service, b"tc3_request");
    hex::encode(hmac_sha256(&secret_signing, string_to_sign.as_bytes()))
}

/// Value of the `Authorization` header.
pub fn authorization(req: &SigningRequest<'_>) -> String {
    format!(
        "{ALGORITHM} Credential={}/{}/{}/tc3_request, SignedHeaders={SIGNED_HEADERS}, Signature={}",
        req.secret_id,
        scope_date(req.timestamp),
        req.service,
        signature(req)
    )
}
