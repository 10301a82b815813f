use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Base64-encoded HMAC-SHA256 of `data` under `key`. This is the signature format used for gateway callbacks and for
/// the client payment parameters.
pub fn calculate_hmac(key: &str, data: &[u8]) -> String {
    // HMAC accepts keys of any length, so this cannot fail
    let mut mac = match HmacSha256::new_from_slice(key.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(data);
    base64::encode(mac.finalize().into_bytes())
}

/// Constant-time comparison of a presented signature against the expected one.
pub fn verify_hmac(key: &str, data: &[u8], signature: &str) -> bool {
    let Ok(decoded) = base64::decode(signature.trim()) else {
        return false;
    };
    match HmacSha256::new_from_slice(key.as_bytes()) {
        Ok(mut mac) => {
            mac.update(data);
            mac.verify_slice(&decoded).is_ok()
        },
        Err(_) => false,
    }
}
