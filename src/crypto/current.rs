// src/crypto/current.rs
//! Current scheme: AES-256-CBC under the per-user random key
//!
//! Blob framing, Base64-encoded:
//!
//! ```text
//!  0..16  IV          random, fresh per call
//! 16..    ciphertext  PKCS#7-padded
//! ```
//!
//! Known weakness, kept deliberately: CBC gives confidentiality but no
//! integrity — there is no authentication tag. Fixing it changes the wire
//! format, so it stays a documented property rather than a silent "fix".

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::TryRngCore;

use crate::consts::{CBC_IV_LEN, CBC_MIN_BLOB_LEN};
use crate::error::{EngineError, Result};
use crate::keys::RandomKey;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Encrypt a card code under the current scheme. A fresh random IV is drawn
/// per call and never reused.
pub fn encrypt_current(plaintext: &str, key: &RandomKey) -> Result<String> {
    if plaintext.is_empty() {
        return Err(EngineError::InvalidInput("plaintext is empty"));
    }

    let mut iv = [0u8; CBC_IV_LEN];
    OsRng
        .try_fill_bytes(&mut iv)
        .map_err(|_| EngineError::RandomnessFailure)?;

    let cipher = Aes256CbcEnc::new_from_slices(key.as_bytes(), &iv)
        .expect("key and IV lengths are fixed");
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

    let mut blob = Vec::with_capacity(CBC_IV_LEN + ciphertext.len());
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(blob))
}

/// Decrypt a current-scheme blob. Padding or UTF-8 mismatch means a wrong
/// key or a corrupted blob — CBC cannot tell those apart.
pub fn decrypt_current(cipher_blob: &str, key: &RandomKey) -> Result<String> {
    let blob = STANDARD
        .decode(cipher_blob)
        .map_err(|e| EngineError::MalformedBlob(format!("not Base64: {e}")))?;
    if blob.len() < CBC_MIN_BLOB_LEN {
        return Err(EngineError::MalformedBlob(format!(
            "current-scheme blob is {} bytes, minimum is {CBC_MIN_BLOB_LEN}",
            blob.len()
        )));
    }

    let (iv, ciphertext) = blob.split_at(CBC_IV_LEN);
    let cipher = Aes256CbcDec::new_from_slices(key.as_bytes(), iv)
        .expect("key and IV lengths are fixed");
    let plaintext = cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| EngineError::DecryptionFailed)?;

    String::from_utf8(plaintext).map_err(|_| EngineError::DecryptionFailed)
}
