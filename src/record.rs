// src/record.rs
//! User record and protected item data model
//!
//! Field names are serialized in camelCase and must stay byte-stable:
//! `isProtected`, `needsClientDerivedKey`, `payloadVersion`, `cipherBlob`
//! and `currentKey` were all written by earlier code with exactly these
//! semantics, and old data round-trips through this model.

use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::TryRngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::consts::{ITEM_ID_LENGTH_HEX, KEY_LEN, LEGACY_SALT_LEN};
use crate::enums::{ItemState, PayloadVersion};
use crate::error::{EngineError, Result};
use crate::keys::RandomKey;

/// Stable item id: BLAKE3 of the plaintext code, truncated. Survives
/// re-encryption because it is derived from the code, not the blob.
pub fn item_id_for_code(code: &str) -> String {
    let hex = blake3::hash(code.as_bytes()).to_hex().to_string();
    hex[..ITEM_ID_LENGTH_HEX].to_string()
}

/// One stored loyalty-card code, in plaintext, properly encrypted, or
/// bulk-migrated placeholder form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectedItem {
    pub item_id: String,
    /// Display label ("grocery card"), never sensitive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Plaintext code — present only while the item is still unprotected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_code: Option<String>,
    pub is_protected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cipher_blob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_version: Option<PayloadVersion>,
    /// True only for items a bulk tool moved into the blob field verbatim,
    /// without key material. The blob is plaintext-equivalent: treat the
    /// item as NOT protected for any security decision.
    #[serde(default)]
    pub needs_client_derived_key: bool,
    /// Transient read-path flag: "needs re-migration". Never persisted.
    #[serde(skip)]
    pub decryption_failed: bool,
}

impl ProtectedItem {
    /// New item from a plaintext code, not yet protected.
    pub fn unprotected(code: &str) -> Self {
        ProtectedItem {
            item_id: item_id_for_code(code),
            label: None,
            card_code: Some(code.to_string()),
            is_protected: false,
            cipher_blob: None,
            payload_version: None,
            needs_client_derived_key: false,
            decryption_failed: false,
        }
    }

    /// Infer the migration state from stored flags. `payloadVersion` is not
    /// always recorded, so a protected blob without one is assumed legacy
    /// and left to the scheme probe.
    pub fn state(&self) -> ItemState {
        if self.needs_client_derived_key {
            return ItemState::BulkAutoMigrated;
        }
        if self.decryption_failed {
            return ItemState::NeedsManualRecovery;
        }
        match (&self.cipher_blob, self.payload_version) {
            (Some(_), Some(PayloadVersion::CurrentCbc)) => ItemState::Current,
            (Some(_), _) => ItemState::LegacyProtected,
            (None, _) => ItemState::Unprotected,
        }
    }

    /// Whether the item counts as protected for security decisions. Bulk
    /// auto-migrated items say `isProtected` but hold plaintext.
    pub fn is_effectively_protected(&self) -> bool {
        self.is_protected && !self.needs_client_derived_key
    }
}

/// Per-user salted credential hash, checked before any legacy derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialHash {
    pub salt: String,
    pub hash: String,
    pub iterations: u32,
}

impl CredentialHash {
    pub fn create(secret: &str, iterations: u32) -> Result<Self> {
        if secret.is_empty() {
            return Err(EngineError::InvalidInput("credential secret is empty"));
        }
        let mut salt = [0u8; LEGACY_SALT_LEN];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|_| EngineError::RandomnessFailure)?;
        let mut digest = [0u8; KEY_LEN];
        pbkdf2_hmac::<Sha256>(secret.as_bytes(), &salt, iterations, &mut digest);
        Ok(CredentialHash {
            salt: STANDARD.encode(salt),
            hash: STANDARD.encode(digest),
            iterations,
        })
    }

    pub fn matches(&self, secret: &str) -> bool {
        let Ok(salt) = STANDARD.decode(&self.salt) else {
            return false;
        };
        let mut digest = [0u8; KEY_LEN];
        pbkdf2_hmac::<Sha256>(secret.as_bytes(), &salt, self.iterations, &mut digest);
        // Compare hashes of the digests so the comparison itself leaks no
        // byte-position timing.
        blake3::hash(&digest) == blake3::hash(self.hash_bytes().as_slice())
    }

    fn hash_bytes(&self) -> Vec<u8> {
        STANDARD.decode(&self.hash).unwrap_or_default()
    }
}

/// Proof that a credential secret was checked against the stored hash.
/// Constructible only through [`UserRecord::verify_credential`] — the legacy
/// decrypt path cannot be handed an unverified password.
pub struct VerifiedCredential {
    secret: String,
}

impl VerifiedCredential {
    pub(crate) fn secret(&self) -> &str {
        &self.secret
    }
}

/// Whole user record as the engine receives and returns it. The store that
/// persists it is an external collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub principal_id: String,
    /// Base64 256-bit current-scheme key. Immutable once set; there is no
    /// rotation path. Loss makes current-scheme items permanently lost.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_hash: Option<CredentialHash>,
    #[serde(default)]
    pub items: Vec<ProtectedItem>,
    /// Optimistic-concurrency counter; bumped by the store on every save.
    #[serde(default)]
    pub version: u64,
}

impl UserRecord {
    pub fn new(principal_id: &str) -> Self {
        UserRecord {
            principal_id: principal_id.to_string(),
            current_key: None,
            credential_hash: None,
            items: Vec::new(),
            version: 0,
        }
    }

    /// Validate a credential secret against the stored hash. The only way
    /// to obtain a [`VerifiedCredential`].
    pub fn verify_credential(&self, secret: &str) -> Result<VerifiedCredential> {
        let hash = self
            .credential_hash
            .as_ref()
            .ok_or(EngineError::CredentialRequired)?;
        if hash.matches(secret) {
            Ok(VerifiedCredential {
                secret: secret.to_string(),
            })
        } else {
            Err(EngineError::InvalidCredential(self.principal_id.clone()))
        }
    }

    /// Parse the stored current-scheme key, if one exists.
    pub fn current_random_key(&self) -> Result<Option<RandomKey>> {
        match &self.current_key {
            Some(encoded) => Ok(Some(RandomKey::from_base64(encoded)?)),
            None => Ok(None),
        }
    }

    /// Return the current-scheme key, generating and persisting it on first
    /// use. Never regenerates an existing key.
    pub fn ensure_current_key(&mut self) -> Result<RandomKey> {
        if self.current_key.is_none() {
            let key = RandomKey::generate()?;
            self.current_key = Some(key.to_base64());
            return Ok(key);
        }
        self.current_random_key()?
            .ok_or_else(|| EngineError::MissingKey(self.principal_id.clone()))
    }

    /// Key material view handed to the item-level encrypt/decrypt API.
    pub fn key_material(&self) -> UserKeyMaterial {
        UserKeyMaterial {
            principal_id: self.principal_id.clone(),
            current_key: self.current_key.clone(),
        }
    }
}

/// The slice of a user record the codecs need: identity plus stored key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserKeyMaterial {
    pub principal_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_key: Option<String>,
}

impl UserKeyMaterial {
    pub fn random_key(&self) -> Result<Option<RandomKey>> {
        match &self.current_key {
            Some(encoded) => Ok(Some(RandomKey::from_base64(encoded)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_ids_are_stable_and_truncated() {
        let a = item_id_for_code("4006000000000000");
        let b = item_id_for_code("4006000000000000");
        assert_eq!(a, b);
        assert_eq!(a.len(), ITEM_ID_LENGTH_HEX);
    }

    #[test]
    fn state_inference_without_payload_version() {
        let mut item = ProtectedItem::unprotected("123");
        assert_eq!(item.state(), ItemState::Unprotected);

        // Protected blob with no recorded version: assume legacy, probe later.
        item.card_code = None;
        item.cipher_blob = Some("AAAA".into());
        item.is_protected = true;
        assert_eq!(item.state(), ItemState::LegacyProtected);

        item.needs_client_derived_key = true;
        assert_eq!(item.state(), ItemState::BulkAutoMigrated);
    }

    #[test]
    fn credential_hash_verifies_and_rejects() {
        let hash = CredentialHash::create("p1", 64).unwrap();
        assert!(hash.matches("p1"));
        assert!(!hash.matches("p2"));

        let mut record = UserRecord::new("u1");
        record.credential_hash = Some(hash);
        assert!(record.verify_credential("p1").is_ok());
        assert!(matches!(
            record.verify_credential("wrong"),
            Err(EngineError::InvalidCredential(_))
        ));
    }

    #[test]
    fn ensure_current_key_is_generate_once() {
        let mut record = UserRecord::new("u1");
        let first = record.ensure_current_key().unwrap();
        let second = record.ensure_current_key().unwrap();
        assert_eq!(first.as_bytes(), second.as_bytes());
    }

    #[test]
    fn persisted_field_names_are_stable() {
        let mut item = ProtectedItem::unprotected("9001234567");
        item.card_code = None;
        item.cipher_blob = Some("9001234567".into());
        item.is_protected = true;
        item.needs_client_derived_key = true;

        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("isProtected").is_some());
        assert!(json.get("needsClientDerivedKey").is_some());
        assert!(json.get("cipherBlob").is_some());
        // Transient flag never serializes.
        assert!(json.get("decryptionFailed").is_none());
    }

    #[test]
    fn payload_version_serializes_with_stable_names() {
        let json = serde_json::to_string(&PayloadVersion::LegacyGcmV1).unwrap();
        assert_eq!(json, "\"legacy-gcm-v1\"");
        let json = serde_json::to_string(&PayloadVersion::CurrentCbc).unwrap();
        assert_eq!(json, "\"current-cbc\"");
    }
}
