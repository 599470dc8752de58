// src/lib.rs
//! card-code-vault — per-user card-code encryption and format migration
//!
//! Features:
//! - AES-256-CBC current scheme under a random persisted per-user key
//! - AES-256-GCM legacy schemes under credential-derived keys, read-only
//! - Ordered multi-scheme decrypt probing with a first-class exhaustion path
//! - Idempotent, resumable migration that never deletes undecryptable data
//!
//! Operator note: the current-scheme key is random and non-derivable. If a
//! user record loses its `currentKey`, every current-scheme item of that
//! user is permanently `NotDecryptable`. There is no rotation path.

pub mod config;
pub mod consts;
pub mod crypto;
pub mod enums;
pub mod error;
pub mod keys;
pub mod migrate;
pub mod orchestrator;
pub mod record;
pub mod registry;

// Re-export everything users need at the crate root
pub use config::load as load_config;
pub use crypto::{
    decrypt_current, decrypt_legacy_authenticated, encrypt_current, encrypt_legacy_authenticated,
};
pub use enums::{ItemState, PayloadVersion};
pub use error::{EngineError, Result};
pub use keys::{derive_legacy_key, LegacyKey, RandomKey};
pub use migrate::{decrypt, encrypt, migrate_record, plan_item, prepare_bulk, ItemAction};
pub use orchestrator::{
    BatchReport, MemoryStore, MigrationOrchestrator, MigrationPlan, MigrationReport, UserStore,
};
pub use record::{
    item_id_for_code, CredentialHash, ProtectedItem, UserKeyMaterial, UserRecord,
    VerifiedCredential,
};
pub use registry::{Decrypted, SchemeRegistry, PROBE_ORDER};
