// src/crypto/legacy.rs
//! Legacy schemes: AES-256-GCM under credential-derived keys
//!
//! Blob framing, Base64-encoded:
//!
//! ```text
//!  0..12  nonce       random, fresh per call
//! 12..28  auth tag    GCM tag over ciphertext + domain AAD
//! 28..    ciphertext
//! ```
//!
//! Two historical variants (`legacy-gcm-v1`, `legacy-gcm-v2`) share this
//! framing and differ only in how their key was instantiated — the salt tag
//! fed into derivation. Callers must not try to identify the variant by
//! inspecting the blob: derive each candidate key, attempt the decrypt, and
//! trust only success.

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::TryRngCore;

use crate::consts::{GCM_DOMAIN_TAG, GCM_MIN_BLOB_LEN, GCM_NONCE_LEN, GCM_TAG_LEN};
use crate::error::{EngineError, Result};
use crate::keys::LegacyKey;

/// Encrypt under a legacy scheme. Only used to produce fixtures and to
/// round-trip data that is about to be re-migrated; new writes always go
/// through the current scheme.
pub fn encrypt_legacy_authenticated(plaintext: &str, key: &LegacyKey) -> Result<String> {
    if plaintext.is_empty() {
        return Err(EngineError::InvalidInput("plaintext is empty"));
    }

    let mut nonce_bytes = [0u8; GCM_NONCE_LEN];
    OsRng
        .try_fill_bytes(&mut nonce_bytes)
        .map_err(|_| EngineError::RandomnessFailure)?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).expect("key is always 32 bytes");
    // aes-gcm appends the tag to the ciphertext; the stored framing wants
    // nonce ‖ tag ‖ ciphertext, so split and reorder.
    let sealed = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext.as_bytes(),
                aad: GCM_DOMAIN_TAG,
            },
        )
        .map_err(|_| EngineError::AuthenticationFailed)?;
    let (ciphertext, tag) = sealed.split_at(sealed.len() - GCM_TAG_LEN);

    let mut blob = Vec::with_capacity(GCM_NONCE_LEN + sealed.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(tag);
    blob.extend_from_slice(ciphertext);
    Ok(STANDARD.encode(blob))
}

/// Decrypt a legacy blob. A tag mismatch means the wrong key (wrong variant,
/// wrong credential) or tampering — indistinguishable by design.
pub fn decrypt_legacy_authenticated(cipher_blob: &str, key: &LegacyKey) -> Result<String> {
    let blob = STANDARD
        .decode(cipher_blob)
        .map_err(|e| EngineError::MalformedBlob(format!("not Base64: {e}")))?;
    if blob.len() < GCM_MIN_BLOB_LEN {
        return Err(EngineError::MalformedBlob(format!(
            "legacy blob is {} bytes, minimum is {GCM_MIN_BLOB_LEN}",
            blob.len()
        )));
    }

    let nonce = Nonce::from_slice(&blob[..GCM_NONCE_LEN]);
    let tag = &blob[GCM_NONCE_LEN..GCM_MIN_BLOB_LEN];
    let ciphertext = &blob[GCM_MIN_BLOB_LEN..];

    // Reassemble the ciphertext ‖ tag layout aes-gcm expects.
    let mut sealed = Vec::with_capacity(ciphertext.len() + GCM_TAG_LEN);
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).expect("key is always 32 bytes");
    let plaintext = cipher
        .decrypt(
            nonce,
            Payload {
                msg: &sealed,
                aad: GCM_DOMAIN_TAG,
            },
        )
        .map_err(|_| EngineError::AuthenticationFailed)?;

    String::from_utf8(plaintext).map_err(|_| EngineError::DecryptionFailed)
}
