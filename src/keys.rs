// src/keys.rs
//! Key derivation and generation
//!
//! Two key flavours exist and the type system keeps them apart:
//!
//! - [`LegacyKey`] — deterministically derived from a principal's credential
//!   secret via PBKDF2. Only useful for decrypting old data; anyone who
//!   learns the credential can re-derive it offline, which is exactly why
//!   the scheme was retired. The codecs accept it for legacy decryption and
//!   nothing else.
//! - [`RandomKey`] — random 256-bit key generated once per user on first
//!   protected write and persisted on the user record. The current scheme
//!   accepts only this type, so a caller can never accidentally feed a
//!   derived key into a new write.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::TryRngCore;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::consts::{KEY_LEN, LEGACY_SALT_LEN};
use crate::enums::PayloadVersion;
use crate::error::{EngineError, Result};

/// Credential-derived 256-bit key for one legacy scheme. Zeroized on drop.
#[derive(Debug, Zeroize, ZeroizeOnDrop)]
pub struct LegacyKey([u8; KEY_LEN]);

impl LegacyKey {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

/// Random persisted 256-bit key for the current scheme. Zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct RandomKey([u8; KEY_LEN]);

impl RandomKey {
    /// Generate a fresh key from OS randomness. Called exactly once per
    /// user, on first write under the current scheme.
    pub fn generate() -> Result<Self> {
        let mut buf = [0u8; KEY_LEN];
        OsRng
            .try_fill_bytes(&mut buf)
            .map_err(|_| EngineError::RandomnessFailure)?;
        Ok(RandomKey(buf))
    }

    /// Base64 form stored in the user record's `currentKey` field.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| EngineError::MalformedBlob(format!("currentKey is not Base64: {e}")))?;
        let arr: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| EngineError::MalformedBlob("currentKey is not 32 bytes".into()))?;
        Ok(RandomKey(arr))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

/// Derive the legacy key for one principal under one legacy scheme.
///
/// Salt is SHA-256(principal_id ‖ scheme salt tag) truncated to 16 bytes,
/// then the credential secret is stretched with PBKDF2-HMAC-SHA256.
/// Deterministic by design — that determinism is what makes old data
/// recoverable without a stored key, and what made the scheme unsound.
///
/// The iteration count is a parameter so the registry can pay the stretch
/// cost once per probe and tests can run with a small count; production
/// callers pass [`crate::consts::LEGACY_KDF_ITERATIONS`].
pub fn derive_legacy_key(
    principal_id: &str,
    credential_secret: &str,
    scheme: PayloadVersion,
    iterations: u32,
) -> Result<LegacyKey> {
    if credential_secret.is_empty() {
        return Err(EngineError::InvalidInput("credential secret is empty"));
    }
    let tag = scheme
        .salt_tag()
        .ok_or(EngineError::InvalidInput("current scheme has no derived key"))?;

    let mut hasher = Sha256::new();
    hasher.update(principal_id.as_bytes());
    hasher.update(tag);
    let digest = hasher.finalize();
    let salt = &digest[..LEGACY_SALT_LEN];

    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(credential_secret.as_bytes(), salt, iterations, &mut key);
    Ok(LegacyKey(key))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Small iteration count: these tests exercise determinism, not stretch cost.
    const ITER: u32 = 64;

    #[test]
    fn derivation_is_deterministic() {
        let a = derive_legacy_key("u1", "p1", PayloadVersion::LegacyGcmV1, ITER).unwrap();
        let b = derive_legacy_key("u1", "p1", PayloadVersion::LegacyGcmV1, ITER).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn schemes_and_principals_yield_distinct_keys() {
        let v1 = derive_legacy_key("u1", "p1", PayloadVersion::LegacyGcmV1, ITER).unwrap();
        let v2 = derive_legacy_key("u1", "p1", PayloadVersion::LegacyGcmV2, ITER).unwrap();
        let other = derive_legacy_key("u2", "p1", PayloadVersion::LegacyGcmV1, ITER).unwrap();
        assert_ne!(v1.as_bytes(), v2.as_bytes());
        assert_ne!(v1.as_bytes(), other.as_bytes());
    }

    #[test]
    fn empty_credential_is_rejected() {
        let err = derive_legacy_key("u1", "", PayloadVersion::LegacyGcmV1, ITER).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn current_scheme_has_no_derivation_path() {
        let err = derive_legacy_key("u1", "p1", PayloadVersion::CurrentCbc, ITER).unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn random_key_base64_roundtrip() {
        let key = RandomKey::generate().unwrap();
        let restored = RandomKey::from_base64(&key.to_base64()).unwrap();
        assert_eq!(key.as_bytes(), restored.as_bytes());
    }
}
