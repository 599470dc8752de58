// src/enums.rs
//! Public enum types used throughout the crate
//!
//! Central location for the #[derive(...)] enums whose on-disk names must
//! stay byte-stable — old data was written with exactly these strings.

use serde::{Deserialize, Serialize};

use crate::consts::{SALT_TAG_GCM_V1, SALT_TAG_GCM_V2};

/// Which encryption scheme produced a stored blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum PayloadVersion {
    #[serde(rename = "legacy-gcm-v1")]
    LegacyGcmV1,
    #[serde(rename = "legacy-gcm-v2")]
    LegacyGcmV2,
    #[serde(rename = "current-cbc")]
    CurrentCbc,
}

impl PayloadVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadVersion::LegacyGcmV1 => "legacy-gcm-v1",
            PayloadVersion::LegacyGcmV2 => "legacy-gcm-v2",
            PayloadVersion::CurrentCbc => "current-cbc",
        }
    }

    pub fn is_legacy(&self) -> bool {
        !matches!(self, PayloadVersion::CurrentCbc)
    }

    /// Salt tag mixed into legacy key derivation. The current scheme has no
    /// derivation path at all — its key is random and persisted.
    pub fn salt_tag(&self) -> Option<&'static [u8]> {
        match self {
            PayloadVersion::LegacyGcmV1 => Some(SALT_TAG_GCM_V1),
            PayloadVersion::LegacyGcmV2 => Some(SALT_TAG_GCM_V2),
            PayloadVersion::CurrentCbc => None,
        }
    }
}

impl std::fmt::Display for PayloadVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an item sits in the migration state machine. Inferred from stored
/// flags — `payloadVersion` is not always recorded by old writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemState {
    /// Plaintext code, never encrypted.
    Unprotected,
    /// Encrypted by a legacy credential-derived-key scheme.
    LegacyProtected,
    /// Bulk tool moved the plaintext into the blob field verbatim. Treated
    /// as NOT protected for any security decision, only for display.
    BulkAutoMigrated,
    /// Encrypted under the current scheme. Terminal for a migration pass.
    Current,
    /// A previous pass failed to decrypt it. Kept untouched, retried on the
    /// next pass, never deleted.
    NeedsManualRecovery,
}
