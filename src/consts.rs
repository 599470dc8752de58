// src/consts.rs
//! Shared constants — security parameters and framing sizes

/// Symmetric key size for every scheme, legacy and current (256 bits).
pub const KEY_LEN: usize = 32;

/// PBKDF2-HMAC-SHA256 iterations for legacy key derivation.
// Matches what the historical writers used — changing this orphans old data.
pub const LEGACY_KDF_ITERATIONS: u32 = 100_000;

/// Legacy scheme salt length: SHA-256(principal ‖ scheme tag) truncated.
pub const LEGACY_SALT_LEN: usize = 16;

/// CBC initialization vector length (one AES block).
pub const CBC_IV_LEN: usize = 16;

/// Minimum current-scheme blob: IV plus one padded cipher block.
pub const CBC_MIN_BLOB_LEN: usize = CBC_IV_LEN + 16;

/// GCM nonce length (96 bits).
pub const GCM_NONCE_LEN: usize = 12;

/// GCM authentication tag length.
pub const GCM_TAG_LEN: usize = 16;

/// Minimum legacy blob: nonce plus tag (zero-length ciphertext is framable
/// but encryption rejects empty plaintext, so shorter is always malformed).
pub const GCM_MIN_BLOB_LEN: usize = GCM_NONCE_LEN + GCM_TAG_LEN;

/// Additional authenticated data bound into every legacy blob.
pub const GCM_DOMAIN_TAG: &[u8] = b"card-code-vault/card-code";

/// Salt tags mixed into legacy key derivation, one per scheme generation.
pub const SALT_TAG_GCM_V1: &[u8] = b"gcm-v1";
pub const SALT_TAG_GCM_V2: &[u8] = b"gcm-v2";

/// Hex characters of the BLAKE3 code hash used as a stable item id.
pub const ITEM_ID_LENGTH_HEX: usize = 20;
