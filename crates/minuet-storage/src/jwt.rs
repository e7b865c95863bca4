//! Best-effort expiry-claim decoding for access tokens.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Decode the `exp` claim (epoch seconds) from a JWT access token.
///
/// Returns `None` on any decode failure: a token without a readable expiry
/// is treated as "expiry unknown", never as an error. Callers must handle
/// the unknown case explicitly rather than defaulting it to zero or
/// infinity, since those two defaults have opposite safety implications.
pub fn decode_exp(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    claims.get("exp")?.as_i64()
}
