// src/error.rs
//! Public error type for the entire crate
//!
//! Cryptographic failures are local to one item: callers must never let a
//! single `NotDecryptable` abort a batch or crash the read of other items.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    /// Caller bug — empty plaintext or credential passed to a pure function.
    /// Never retried.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),

    /// The stored blob itself is suspect: too short for its framing, or not
    /// valid Base64. Surfaced, not retried.
    #[error("malformed cipher blob: {0}")]
    MalformedBlob(String),

    /// GCM tag mismatch. Expected (and tried-next) when probing multiple
    /// schemes; logged when it was the only scheme attempted.
    #[error("authentication tag mismatch")]
    AuthenticationFailed,

    /// CBC padding or UTF-8 mismatch — wrong key or corrupted blob. The
    /// current scheme carries no auth tag, so this is the closest signal
    /// it can give.
    #[error("decryption failed (wrong key or corrupted blob)")]
    DecryptionFailed,

    /// Every known scheme was attempted and none produced a plaintext. The
    /// original ciphertext is preserved untouched; the display layer shows
    /// this as "needs re-migration", never as a server error.
    #[error("no known scheme could decrypt this blob")]
    NotDecryptable,

    /// A legacy decrypt was requested without a verified credential. This is
    /// a contract violation in the caller, fatal to that call.
    #[error("legacy decryption requires a verified credential")]
    CredentialRequired,

    /// The credential secret did not match the stored credential hash.
    #[error("credential verification failed for principal {0}")]
    InvalidCredential(String),

    #[error("unknown user: {0}")]
    UserNotFound(String),

    /// Optimistic version check failed — another migration of the same user
    /// won the race. Per-user migrations are serialized via this error.
    #[error("save conflict for user {0}: record modified concurrently")]
    SaveConflict(String),

    /// An operation needed the per-user current-scheme key and the record
    /// does not carry one. If the key is genuinely lost, every current-scheme
    /// item is permanently NotDecryptable — there is no derivation fallback.
    #[error("current-scheme key missing for principal {0}")]
    MissingKey(String),

    #[error("system randomness unavailable")]
    RandomnessFailure,
}

pub type Result<T> = std::result::Result<T, EngineError>;
