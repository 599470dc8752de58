// src/migrate.rs
//! Card record migration — the per-item state machine
//!
//! One migration pass drives every item toward `Current`:
//!
//! - Unprotected → encrypt under the current scheme → Current
//! - LegacyProtected → probe-decrypt → re-encrypt → Current,
//!   or → NeedsManualRecovery (blob kept untouched, flagged, never deleted)
//! - BulkAutoMigrated → blob holds plaintext verbatim; re-encrypt properly
//!   once a live key is in hand → Current
//! - Current → terminal, untouched
//!
//! Re-running a pass is a no-op for `Current` items and a retry for failed
//! ones. Re-encoding always replaces the whole blob atomically — an item is
//! never partially updated.

use tracing::{debug, warn};

use crate::crypto::encrypt_current;
use crate::enums::{ItemState, PayloadVersion};
use crate::error::{EngineError, Result};
use crate::record::{ProtectedItem, UserKeyMaterial, UserRecord, VerifiedCredential};
use crate::registry::SchemeRegistry;

/// What one migration pass would do to an item. Pure classification —
/// `plan_item` never touches the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    /// Encrypt the stored plaintext under the current scheme.
    EncryptPlaintext,
    /// Probe-decrypt a legacy blob and re-encrypt it.
    ReencryptLegacy,
    /// Re-encrypt the plaintext a bulk tool parked in the blob field.
    CompleteBulkMigration,
    /// Already current; nothing to do.
    Keep,
}

pub fn plan_item(item: &ProtectedItem) -> ItemAction {
    match item.state() {
        ItemState::Unprotected => ItemAction::EncryptPlaintext,
        // A failed item is retried on the next pass — a previously-wrong
        // credential may have been corrected.
        ItemState::LegacyProtected | ItemState::NeedsManualRecovery => {
            ItemAction::ReencryptLegacy
        }
        ItemState::BulkAutoMigrated => ItemAction::CompleteBulkMigration,
        ItemState::Current => ItemAction::Keep,
    }
}

/// Outcome of one migration pass over one user record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordOutcome {
    pub migrated: u64,
    pub failures: Vec<String>,
}

/// Run one migration pass over every item in the record.
///
/// Requires a verified credential because legacy blobs need derived keys.
/// Idempotent: a second pass over fully-migrated data reports zero migrated
/// items and leaves every blob byte-identical.
pub fn migrate_record(
    record: &mut UserRecord,
    credential: &VerifiedCredential,
    registry: &SchemeRegistry,
) -> Result<RecordOutcome> {
    let mut outcome = RecordOutcome::default();

    if record
        .items
        .iter()
        .all(|item| plan_item(item) == ItemAction::Keep)
    {
        return Ok(outcome);
    }

    let key = record.ensure_current_key()?;
    let principal_id = record.principal_id.clone();

    for item in &mut record.items {
        match plan_item(item) {
            ItemAction::Keep => {}
            ItemAction::EncryptPlaintext => {
                let Some(code) = item.card_code.take() else {
                    warn!(%principal_id, item_id = %item.item_id, "unprotected item has no code");
                    outcome.failures.push(item.item_id.clone());
                    continue;
                };
                match encrypt_current(&code, &key) {
                    Ok(blob) => {
                        item.cipher_blob = Some(blob);
                        item.payload_version = Some(PayloadVersion::CurrentCbc);
                        item.is_protected = true;
                        outcome.migrated += 1;
                    }
                    Err(err) => {
                        // Failures stay local to the item — put the code back.
                        warn!(%principal_id, item_id = %item.item_id, %err, "encrypt failed");
                        item.card_code = Some(code);
                        outcome.failures.push(item.item_id.clone());
                    }
                }
            }
            ItemAction::CompleteBulkMigration => {
                // The blob field holds the plaintext verbatim.
                let Some(code) = item.cipher_blob.clone() else {
                    outcome.failures.push(item.item_id.clone());
                    continue;
                };
                match encrypt_current(&code, &key) {
                    Ok(blob) => {
                        item.cipher_blob = Some(blob);
                        item.payload_version = Some(PayloadVersion::CurrentCbc);
                        item.needs_client_derived_key = false;
                        item.is_protected = true;
                        outcome.migrated += 1;
                    }
                    Err(err) => {
                        warn!(%principal_id, item_id = %item.item_id, %err, "encrypt failed");
                        outcome.failures.push(item.item_id.clone());
                    }
                }
            }
            ItemAction::ReencryptLegacy => {
                let Some(blob) = item.cipher_blob.clone() else {
                    outcome.failures.push(item.item_id.clone());
                    continue;
                };
                match registry.try_decrypt_any(&blob, &principal_id, Some(credential), Some(&key))
                {
                    Ok(found) if found.scheme.is_legacy() => match encrypt_current(&found.plaintext, &key) {
                        Ok(new_blob) => {
                            item.cipher_blob = Some(new_blob);
                            item.payload_version = Some(PayloadVersion::CurrentCbc);
                            item.is_protected = true;
                            item.decryption_failed = false;
                            outcome.migrated += 1;
                        }
                        Err(err) => {
                            // Old blob stays in place, nothing is lost.
                            warn!(%principal_id, item_id = %item.item_id, %err, "re-encrypt failed");
                            outcome.failures.push(item.item_id.clone());
                        }
                    },
                    Ok(_) => {
                        // Decrypted under the current scheme after all — only
                        // the recorded version was missing. Repair metadata,
                        // leave the blob bytes alone.
                        debug!(%principal_id, item_id = %item.item_id, "blob already current");
                        item.payload_version = Some(PayloadVersion::CurrentCbc);
                        item.decryption_failed = false;
                    }
                    Err(err) => {
                        // Blob stays untouched; flagged for manual recovery.
                        warn!(%principal_id, item_id = %item.item_id, %err, "item not recoverable");
                        item.decryption_failed = true;
                        outcome.failures.push(item.item_id.clone());
                    }
                }
            }
        }
    }

    Ok(outcome)
}

/// Credential-less bulk preparation: Unprotected → BulkAutoMigrated only.
///
/// The plaintext moves verbatim into the blob position and the item is
/// flagged `needsClientDerivedKey`. The record is NOT protected afterwards —
/// this exists purely so a later credential-bearing pass (or read with a
/// live key) can finish the job seamlessly. Legacy blobs are never touched
/// here; there is no key material to touch them with.
pub fn prepare_bulk(record: &mut UserRecord) -> Result<u64> {
    if !crate::config::load().features.allow_bulk_plaintext_migration {
        return Err(EngineError::InvalidInput(
            "bulk plaintext migration is disabled by configuration",
        ));
    }

    let mut prepared = 0u64;
    for item in &mut record.items {
        if item.state() != ItemState::Unprotected {
            continue;
        }
        let Some(code) = item.card_code.take() else {
            continue;
        };
        item.cipher_blob = Some(code);
        item.needs_client_derived_key = true;
        item.is_protected = true;
        item.payload_version = None;
        prepared += 1;
    }
    Ok(prepared)
}

/// Encrypt a new or edited card code under the current scheme.
///
/// The user record must already carry its random key — callers that may be
/// writing for the first time go through [`UserRecord::ensure_current_key`]
/// before building the key material.
pub fn encrypt(plaintext: &str, keys: &UserKeyMaterial) -> Result<ProtectedItem> {
    let key = keys
        .random_key()?
        .ok_or_else(|| EngineError::MissingKey(keys.principal_id.clone()))?;

    let mut item = ProtectedItem::unprotected(plaintext);
    item.cipher_blob = Some(encrypt_current(plaintext, &key)?);
    item.card_code = None;
    item.payload_version = Some(PayloadVersion::CurrentCbc);
    item.is_protected = true;
    Ok(item)
}

/// Recover the display plaintext for one item.
///
/// Never crashes the read path: a blob no scheme can decrypt marks the item
/// `decryptionFailed` (the display layer's "needs re-migration" affordance)
/// and returns `NotDecryptable` for this item only. Bulk-migrated items
/// return their stored value verbatim — no cipher decode is attempted on
/// what is already plaintext.
pub fn decrypt(
    item: &mut ProtectedItem,
    keys: &UserKeyMaterial,
    credential: Option<&VerifiedCredential>,
    registry: &SchemeRegistry,
) -> Result<String> {
    match item.state() {
        ItemState::Unprotected => item
            .card_code
            .clone()
            .ok_or(EngineError::InvalidInput("unprotected item has no code")),
        ItemState::BulkAutoMigrated => {
            let code = item
                .cipher_blob
                .clone()
                .ok_or(EngineError::InvalidInput("bulk item has no stored value"))?;
            // Finish the interrupted migration opportunistically when the
            // read arrives with a live key.
            if let Some(key) = keys.random_key()? {
                item.cipher_blob = Some(encrypt_current(&code, &key)?);
                item.payload_version = Some(PayloadVersion::CurrentCbc);
                item.needs_client_derived_key = false;
                item.is_protected = true;
            }
            Ok(code)
        }
        _ => {
            let blob = item
                .cipher_blob
                .clone()
                .ok_or(EngineError::InvalidInput("protected item has no blob"))?;
            let stored_key = keys.random_key()?;
            match registry.try_decrypt_any(&blob, &keys.principal_id, credential, stored_key.as_ref())
            {
                Ok(found) => {
                    item.decryption_failed = false;
                    Ok(found.plaintext)
                }
                Err(err) => {
                    item.decryption_failed = true;
                    Err(err)
                }
            }
        }
    }
}
