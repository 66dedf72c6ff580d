//! Cryptographic utilities: random values, email hashing and credential hashing

use crate::error::{AppError, Result};
use argon2::{
    password_hash::{
        rand_core::OsRng as SaltRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
    },
    Argon2,
};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, Rng, RngCore};
use sha2::Sha256;

/// Length in bytes of the random part of every session and short-lived token.
pub const TOKEN_BYTES: usize = 32;

/// Fixed-length random value, hex encoded.
pub fn random_token_value() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Longest numeric code whose range fits in a `u32`.
pub const MAX_CODE_DIGITS: u32 = 9;

/// Zero-padded numeric code for out-of-band delivery.
///
/// `digits` is clamped to `1..=MAX_CODE_DIGITS`.
pub fn random_numeric_code(digits: u32) -> String {
    let digits = digits.clamp(1, MAX_CODE_DIGITS);
    let upper = 10u32.pow(digits);
    let value = OsRng.gen_range(0..upper);
    format!("{:0width$}", value, width = digits as usize)
}

/// One-way keyed hash of a normalized email address.
///
/// The Global Directory only ever sees this value. HMAC with a deployment
/// pepper keeps the hash stable across regions without being a plain digest.
#[derive(Clone)]
pub struct EmailHasher {
    key: Vec<u8>,
}

impl EmailHasher {
    pub fn new(key: impl Into<Vec<u8>>) -> Self {
        Self { key: key.into() }
    }

    pub fn hash(&self, normalized_email: &str) -> Result<String> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init error: {}", e)))?;
        mac.update(normalized_email.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl std::fmt::Debug for EmailHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailHasher").finish_non_exhaustive()
    }
}

/// Slow one-way password hashing.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash(&self, plain: &str) -> Result<String>;
    async fn verify(&self, plain: &str, hash: &str) -> Result<bool>;
}

/// Argon2id hasher. Hashing runs on the blocking pool so request tasks keep moving.
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher;

#[async_trait]
impl CredentialHasher for Argon2Hasher {
    async fn hash(&self, plain: &str) -> Result<String> {
        let plain = plain.to_string();
        tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(&mut SaltRng);
            Argon2::default()
                .hash_password(plain.as_bytes(), &salt)
                .map(|h| h.to_string())
                .map_err(|e| {
                    AppError::Internal(anyhow::anyhow!("Failed to hash credential: {}", e))
                })
        })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Hashing task failed: {}", e)))?
    }

    async fn verify(&self, plain: &str, hash: &str) -> Result<bool> {
        let plain = plain.to_string();
        let hash = hash.to_string();
        tokio::task::spawn_blocking(move || {
            let parsed = PasswordHash::new(&hash)
                .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid hash: {}", e)))?;
            Ok(Argon2::default()
                .verify_password(plain.as_bytes(), &parsed)
                .is_ok())
        })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Hashing task failed: {}", e)))?
    }
}
