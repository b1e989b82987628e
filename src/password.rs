//! Credential service: salted bcrypt hashes and their verification.
//!
//! The `_blocking` wrappers run bcrypt on tokio's blocking pool.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("hashing task aborted: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Produces a salted hash of `plaintext` at the given bcrypt cost.
pub fn hash(plaintext: &str, cost: u32) -> Result<String, CredentialError> {
    Ok(bcrypt::hash(plaintext, cost)?)
}

/// Checks `plaintext` against a stored hash.
///
/// A malformed or foreign hash is treated as a mismatch, never as an error.
pub fn verify(plaintext: &str, hash: &str) -> bool {
    match bcrypt::verify(plaintext, hash) {
        Ok(matches) => matches,
        Err(e) => {
            tracing::warn!("stored password hash could not be parsed: {}", e);
            false
        }
    }
}

pub async fn hash_blocking(plaintext: String, cost: u32) -> Result<String, CredentialError> {
    tokio::task::spawn_blocking(move || hash(&plaintext, cost)).await?
}

pub async fn verify_blocking(plaintext: String, hash: String) -> bool {
    match tokio::task::spawn_blocking(move || verify(&plaintext, &hash)).await {
        Ok(matches) => matches,
        Err(e) => {
            tracing::error!("password verification task failed: {}", e);
            false
        }
    }
}
