use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use ring::rand::SecureRandom;
use thiserror::Error;

/// Random bytes in refresh token ids.
pub(crate) const TOKEN_ID_BYTES: usize = 32;

pub(crate) fn base64url_decode(input: &str) -> Result<Vec<u8>, UtilError> {
    URL_SAFE_NO_PAD
        .decode(input)
        .map_err(|_| UtilError::Format("Failed to decode base64url".to_string()))
}

/// `len` random bytes from the system CSPRNG, base64url encoded without padding.
pub fn gen_random_string(len: usize) -> Result<String, UtilError> {
    let rng = ring::rand::SystemRandom::new();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes)
        .map_err(|_| UtilError::Crypto("Failed to generate random string".to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Whether `token_id` has the shape of a value from `gen_random_string(TOKEN_ID_BYTES)`.
pub(crate) fn is_token_id(token_id: &str) -> bool {
    base64url_decode(token_id).is_ok_and(|bytes| bytes.len() == TOKEN_ID_BYTES)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UtilError {
    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Invalid format: {0}")]
    Format(String),
}
