// src/config/defaults.rs
use crate::config::app::{Features, Kdf};
use crate::consts::LEGACY_KDF_ITERATIONS;

pub fn default_kdf() -> Kdf {
    Kdf {
        legacy_iterations: LEGACY_KDF_ITERATIONS,
    }
}

pub fn default_features() -> Features {
    Features {
        allow_bulk_plaintext_migration: true,
    }
}
