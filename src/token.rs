use base64::Engine;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use time::OffsetDateTime;

use crate::error::Error;

const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &base64::alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &base64::alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claims read from a structured token's payload segment.
///
/// Unverified: the signature is never checked, the payload is only
/// inspected to decide when to renew.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenClaims {
    /// Expiry, seconds since the Unix epoch. May be fractional.
    #[serde(default)]
    pub exp: Option<f64>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, JsonValue>,
}

/// Decode the payload of a three-segment token.
///
/// Returns `Ok(None)` for opaque tokens that are not three segments.
///
/// # Errors
///
/// Returns [`Error::Token`] if the token has three segments but the middle
/// one is not base64-encoded JSON.
pub fn decode_claims(token: &str) -> Result<Option<TokenClaims>, Error> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Ok(None);
    }

    let payload = decode_segment(parts[1])?;
    let claims = serde_json::from_slice::<TokenClaims>(&payload)
        .map_err(|e| Error::Token(format!("invalid payload: {e}")))?;
    Ok(Some(claims))
}

/// Whether `token` has expired at `now`.
///
/// Opaque tokens, tokens without `exp` and tokens with `exp: 0` never expire.
///
/// # Errors
///
/// Returns [`Error::Token`] if a structured token cannot be decoded.
#[allow(clippy::cast_precision_loss)]
pub fn is_expired(token: &str, now: OffsetDateTime) -> Result<bool, Error> {
    let Some(exp) = decode_claims(token)?.and_then(|c| c.exp) else {
        return Ok(false);
    };
    if exp == 0.0 {
        return Ok(false);
    }
    let now_ms = (now.unix_timestamp_nanos() / 1_000_000) as f64;
    Ok(now_ms >= exp * 1000.0)
}

/// Payload segments come url-safe and unpadded in practice; padded and
/// standard-alphabet encodings are accepted as well.
fn decode_segment(segment: &str) -> Result<Vec<u8>, Error> {
    URL_SAFE_LENIENT
        .decode(segment)
        .or_else(|_| STANDARD_LENIENT.decode(segment))
        .map_err(|e| Error::Token(format!("invalid payload encoding: {e}")))
}
