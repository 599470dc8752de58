// src/registry.rs
//! Scheme registry — ordered multi-scheme decrypt probing
//!
//! One place knows which schemes exist, which one is current, and in what
//! order to try them. Adding a future scheme is a change here, not a
//! call-site rewrite.
//!
//! Probe order is fixed: current scheme first (cheap, needs only the stored
//! key), then each legacy scheme (each costs a full PBKDF2 stretch, so
//! legacy probing only happens where a credential was just verified — login
//! or an explicit re-migration — never on every page load).

use tracing::{debug, info};

use crate::crypto::{decrypt_current, decrypt_legacy_authenticated};
use crate::enums::PayloadVersion;
use crate::error::{EngineError, Result};
use crate::keys::{derive_legacy_key, RandomKey};
use crate::record::VerifiedCredential;

/// All schemes the engine can read, in probe priority order.
pub const PROBE_ORDER: [PayloadVersion; 3] = [
    PayloadVersion::CurrentCbc,
    PayloadVersion::LegacyGcmV1,
    PayloadVersion::LegacyGcmV2,
];

/// A successful probe: the recovered plaintext and the scheme that produced
/// the blob, so callers can decide whether migration is warranted.
#[derive(Debug, Clone, PartialEq)]
pub struct Decrypted {
    pub plaintext: String,
    pub scheme: PayloadVersion,
}

pub struct SchemeRegistry {
    kdf_iterations: u32,
}

impl SchemeRegistry {
    /// Registry with the configured legacy KDF iteration count.
    pub fn new() -> Self {
        SchemeRegistry {
            kdf_iterations: crate::config::load().kdf.legacy_iterations,
        }
    }

    /// Override the stretch cost. Fixture writers and tests use small
    /// counts; data written with one count only decrypts with the same.
    pub fn with_kdf_iterations(kdf_iterations: u32) -> Self {
        SchemeRegistry { kdf_iterations }
    }

    pub fn current_scheme(&self) -> PayloadVersion {
        PayloadVersion::CurrentCbc
    }

    pub fn kdf_iterations(&self) -> u32 {
        self.kdf_iterations
    }

    /// Attempt every applicable scheme in priority order.
    ///
    /// Each attempt is independent: a tag mismatch or malformed framing in
    /// one scheme never prevents trying the next. Legacy schemes are skipped
    /// (not errored) when no verified credential is supplied. Only full
    /// exhaustion yields `NotDecryptable`.
    pub fn try_decrypt_any(
        &self,
        cipher_blob: &str,
        principal_id: &str,
        credential: Option<&VerifiedCredential>,
        stored_key: Option<&RandomKey>,
    ) -> Result<Decrypted> {
        let mut attempted = 0usize;

        for scheme in PROBE_ORDER {
            let outcome = match scheme {
                PayloadVersion::CurrentCbc => {
                    let Some(key) = stored_key else { continue };
                    attempted += 1;
                    decrypt_current(cipher_blob, key)
                }
                PayloadVersion::LegacyGcmV1 | PayloadVersion::LegacyGcmV2 => {
                    let Some(credential) = credential else { continue };
                    attempted += 1;
                    derive_legacy_key(
                        principal_id,
                        credential.secret(),
                        scheme,
                        self.kdf_iterations,
                    )
                    .and_then(|key| decrypt_legacy_authenticated(cipher_blob, &key))
                }
            };

            match outcome {
                Ok(plaintext) => {
                    if scheme.is_legacy() {
                        info!(principal_id, scheme = %scheme, "decrypted under legacy scheme");
                    }
                    return Ok(Decrypted { plaintext, scheme });
                }
                Err(err) => {
                    debug!(principal_id, scheme = %scheme, %err, "decrypt attempt failed");
                }
            }
        }

        debug!(principal_id, attempted, "all schemes exhausted");
        Err(EngineError::NotDecryptable)
    }
}

impl Default for SchemeRegistry {
    fn default() -> Self {
        SchemeRegistry::new()
    }
}
