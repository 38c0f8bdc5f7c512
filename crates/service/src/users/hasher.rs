use std::sync::Arc;

use argon2::{password_hash::{PasswordHasher, SaltString}, Argon2};
use configs::{SecurityConfig, ALGORITHM_ARGON2, ALGORITHM_HMAC_SHA256};
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use sha2::Sha256;

use super::errors::UserError;

type HmacSha256 = Hmac<Sha256>;

/// One-way password digests. Implementations never log the plaintext.
pub trait CredentialHasher: Send + Sync {
    fn algorithm(&self) -> &'static str;
    fn hash(&self, plaintext: &str) -> Result<String, UserError>;
}

/// Deterministic hex HMAC-SHA256 keyed with a server secret.
pub struct HmacSha256Hasher {
    secret: String,
}

impl HmacSha256Hasher {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    fn mac(&self, plaintext: &str) -> Result<HmacSha256, UserError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| UserError::Internal(format!("hashing error: {e}")))?;
        mac.update(plaintext.as_bytes());
        Ok(mac)
    }
}

impl CredentialHasher for HmacSha256Hasher {
    fn algorithm(&self) -> &'static str {
        ALGORITHM_HMAC_SHA256
    }

    fn hash(&self, plaintext: &str) -> Result<String, UserError> {
        Ok(hex::encode(self.mac(plaintext)?.finalize().into_bytes()))
    }
}

/// Salted argon2 PHC strings. Two hashes of one password differ.
#[derive(Default)]
pub struct Argon2Hasher;

impl CredentialHasher for Argon2Hasher {
    fn algorithm(&self) -> &'static str {
        ALGORITHM_ARGON2
    }

    fn hash(&self, plaintext: &str) -> Result<String, UserError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| UserError::Internal(format!("hashing error: {e}")))
    }
}

/// Build the hasher named by `security.password_algorithm`.
pub fn hasher_from_config(cfg: &SecurityConfig) -> anyhow::Result<Arc<dyn CredentialHasher>> {
    match cfg.password_algorithm.as_str() {
        ALGORITHM_HMAC_SHA256 => {
            if cfg.hashing_secret.is_empty() {
                anyhow::bail!("{ALGORITHM_HMAC_SHA256} requires a hashing secret");
            }
            Ok(Arc::new(HmacSha256Hasher::new(cfg.hashing_secret.clone())))
        }
        ALGORITHM_ARGON2 => Ok(Arc::new(Argon2Hasher)),
        other => anyhow::bail!("unsupported password algorithm: {other}"),
    }
}
