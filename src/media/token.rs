//! Random key tokens
//!
//! Bytes come straight from the OS entropy source. A failing source is a
//! broken environment, so errors are returned, never retried.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::TryRngCore;

use super::MediaError;

/// Fill `len` bytes from the OS entropy source
pub fn random_bytes(len: usize) -> Result<Vec<u8>, MediaError> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| MediaError::EntropySource(e.to_string()))?;
    Ok(bytes)
}

/// URL-safe base64 token without padding
pub fn url_safe_token(len: usize) -> Result<String, MediaError> {
    Ok(URL_SAFE_NO_PAD.encode(random_bytes(len)?))
}

/// Lowercase hex token
pub fn hex_token(len: usize) -> Result<String, MediaError> {
    Ok(hex::encode(random_bytes(len)?))
}
