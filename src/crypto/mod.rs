// src/crypto/mod.rs
//! Pure cryptographic operations — no I/O, no record store
//!
//! All functions work on in-memory strings and return self-describing
//! Base64 blobs. Scheme selection lives in `registry`, not here.

mod current;
mod legacy;

pub use current::{decrypt_current, encrypt_current};
pub use legacy::{decrypt_legacy_authenticated, encrypt_legacy_authenticated};
