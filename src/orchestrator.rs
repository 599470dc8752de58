// src/orchestrator.rs
//! Migration orchestration across user records
//!
//! The record store itself is an external collaborator — this module only
//! defines the trait it must satisfy and drives load → migrate → save per
//! user. Per-user migration is serialized through optimistic versioning
//! (a concurrent save loses with `SaveConflict`); migrations for different
//! users need no shared lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::enums::ItemState;
use crate::error::{EngineError, Result};
use crate::migrate::{migrate_record, prepare_bulk};
use crate::record::UserRecord;
use crate::registry::SchemeRegistry;

/// Read/write access to whole user records. The engine never issues
/// queries; it only receives and returns records.
pub trait UserStore {
    fn load(&self, user_id: &str) -> Result<UserRecord>;

    /// Persist a record. Must fail with [`EngineError::SaveConflict`] when
    /// the stored version no longer matches the one the record was loaded
    /// at, and bump the version on success.
    fn save(&self, record: &UserRecord) -> Result<()>;

    fn user_ids(&self) -> Result<Vec<String>>;
}

/// In-process store used by tests and batch tooling.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, UserRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    pub fn insert(&self, record: UserRecord) {
        self.inner
            .lock()
            .expect("store lock poisoned")
            .insert(record.principal_id.clone(), record);
    }
}

impl UserStore for MemoryStore {
    fn load(&self, user_id: &str) -> Result<UserRecord> {
        self.inner
            .lock()
            .expect("store lock poisoned")
            .get(user_id)
            .cloned()
            .ok_or_else(|| EngineError::UserNotFound(user_id.to_string()))
    }

    fn save(&self, record: &UserRecord) -> Result<()> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let stored = inner
            .get(&record.principal_id)
            .ok_or_else(|| EngineError::UserNotFound(record.principal_id.clone()))?;
        if stored.version != record.version {
            return Err(EngineError::SaveConflict(record.principal_id.clone()));
        }
        let mut updated = record.clone();
        updated.version += 1;
        inner.insert(updated.principal_id.clone(), updated);
        Ok(())
    }

    fn user_ids(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self
            .inner
            .lock()
            .expect("store lock poisoned")
            .keys()
            .cloned()
            .collect();
        ids.sort();
        Ok(ids)
    }
}

/// Dry-run view: how many items sit in each migration state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationPlan {
    pub principal_id: String,
    pub unprotected: u64,
    pub legacy_protected: u64,
    pub bulk_auto_migrated: u64,
    pub current: u64,
    pub total: u64,
}

/// What one orchestrated migration actually did for one user.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub principal_id: String,
    pub migrated_count: u64,
    pub prepared_count: u64,
    pub failures: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Batch summary for the credential-less bulk run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub users_processed: u64,
    pub users_failed: u64,
    pub prepared_total: u64,
    pub stopped_early: bool,
}

pub struct MigrationOrchestrator<S: UserStore> {
    store: S,
    registry: SchemeRegistry,
}

impl<S: UserStore> MigrationOrchestrator<S> {
    pub fn new(store: S) -> Self {
        MigrationOrchestrator {
            store,
            registry: SchemeRegistry::new(),
        }
    }

    /// Construct with an explicit registry (tests use a cheap KDF count).
    pub fn with_registry(store: S, registry: SchemeRegistry) -> Self {
        MigrationOrchestrator { store, registry }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &SchemeRegistry {
        &self.registry
    }

    /// Pure read: count items per state for dry-run reporting. No mutation.
    pub fn plan_for_user(&self, user_id: &str) -> Result<MigrationPlan> {
        let record = self.store.load(user_id)?;
        let mut plan = MigrationPlan {
            principal_id: record.principal_id.clone(),
            unprotected: 0,
            legacy_protected: 0,
            bulk_auto_migrated: 0,
            current: 0,
            total: record.items.len() as u64,
        };
        for item in &record.items {
            match item.state() {
                ItemState::Unprotected => plan.unprotected += 1,
                ItemState::LegacyProtected | ItemState::NeedsManualRecovery => {
                    plan.legacy_protected += 1
                }
                ItemState::BulkAutoMigrated => plan.bulk_auto_migrated += 1,
                ItemState::Current => plan.current += 1,
            }
        }
        Ok(plan)
    }

    /// Full migration for one user. The credential secret is validated
    /// against the stored hash here, before any legacy derivation — this
    /// path must never serve as a password-guessing oracle for derived keys.
    pub fn migrate_user(&self, user_id: &str, credential_secret: &str) -> Result<MigrationReport> {
        let started_at = Utc::now();
        let mut record = self.store.load(user_id)?;
        let credential = record.verify_credential(credential_secret)?;

        let outcome = migrate_record(&mut record, &credential, &self.registry)?;
        self.store.save(&record)?;

        info!(
            principal_id = user_id,
            migrated = outcome.migrated,
            failed = outcome.failures.len(),
            "migration pass complete"
        );
        Ok(MigrationReport {
            principal_id: record.principal_id,
            migrated_count: outcome.migrated,
            prepared_count: 0,
            failures: outcome.failures,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Credential-less bulk path: only Unprotected → BulkAutoMigrated. No
    /// legacy decryption is ever attempted — there is no key material here.
    pub fn migrate_user_auto_no_credential(&self, user_id: &str) -> Result<MigrationReport> {
        let started_at = Utc::now();
        let mut record = self.store.load(user_id)?;
        let prepared = prepare_bulk(&mut record)?;
        if prepared > 0 {
            self.store.save(&record)?;
        }

        Ok(MigrationReport {
            principal_id: record.principal_id,
            migrated_count: 0,
            prepared_count: prepared,
            failures: Vec::new(),
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Bulk-prepare every user. Each user is processed independently: a
    /// failure (locked record, save conflict) is logged and skipped, never
    /// aborting the batch. The stop flag is checked between users so a long
    /// run can be interrupted without leaving anyone half-migrated.
    pub fn run_bulk_migration(&self, stop: &AtomicBool) -> Result<BatchReport> {
        let mut report = BatchReport {
            users_processed: 0,
            users_failed: 0,
            prepared_total: 0,
            stopped_early: false,
        };

        for user_id in self.store.user_ids()? {
            if stop.load(Ordering::Relaxed) {
                report.stopped_early = true;
                info!("bulk migration stopped at checkpoint");
                break;
            }
            match self.migrate_user_auto_no_credential(&user_id) {
                Ok(user_report) => {
                    report.users_processed += 1;
                    report.prepared_total += user_report.prepared_count;
                }
                Err(err) => {
                    warn!(%user_id, %err, "bulk migration failed for user, continuing");
                    report.users_failed += 1;
                }
            }
        }
        Ok(report)
    }
}
