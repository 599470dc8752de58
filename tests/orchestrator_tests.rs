// tests/orchestrator_tests.rs
mod common;

use std::sync::atomic::{AtomicBool, Ordering};

use card_code_vault::crypto::encrypt_legacy_authenticated;
use card_code_vault::keys::derive_legacy_key;
use card_code_vault::orchestrator::{MemoryStore, MigrationOrchestrator, UserStore};
use card_code_vault::record::{CredentialHash, ProtectedItem, UserRecord};
use card_code_vault::registry::SchemeRegistry;
use card_code_vault::{EngineError, ItemState, PayloadVersion};

const TEST_KDF_ITERATIONS: u32 = 256;

fn orchestrator(store: MemoryStore) -> MigrationOrchestrator<MemoryStore> {
    MigrationOrchestrator::with_registry(
        store,
        SchemeRegistry::with_kdf_iterations(TEST_KDF_ITERATIONS),
    )
}

fn seeded_user(principal_id: &str, secret: &str) -> UserRecord {
    let mut record = UserRecord::new(principal_id);
    record.credential_hash = Some(CredentialHash::create(secret, TEST_KDF_ITERATIONS).unwrap());
    record.items.push(ProtectedItem::unprotected("1000"));

    let key = derive_legacy_key(
        principal_id,
        secret,
        PayloadVersion::LegacyGcmV2,
        TEST_KDF_ITERATIONS,
    )
    .unwrap();
    let mut legacy = ProtectedItem::unprotected("2000");
    legacy.card_code = None;
    legacy.cipher_blob = Some(encrypt_legacy_authenticated("2000", &key).unwrap());
    legacy.is_protected = true;
    record.items.push(legacy);
    record
}

#[test]
fn test_plan_for_user_is_pure_read() {
    let store = MemoryStore::new();
    store.insert(seeded_user("u1", "p1"));
    let orch = orchestrator(store);

    let plan = orch.plan_for_user("u1").unwrap();
    assert_eq!(plan.unprotected, 1);
    assert_eq!(plan.legacy_protected, 1);
    assert_eq!(plan.current, 0);
    assert_eq!(plan.total, 2);

    // Planning mutated nothing.
    let record = orch.store().load("u1").unwrap();
    assert_eq!(record.version, 0);
    assert_eq!(record.items[0].state(), ItemState::Unprotected);
}

#[test]
fn test_migrate_user_end_to_end() {
    common::setup();
    let store = MemoryStore::new();
    store.insert(seeded_user("u1", "p1"));
    let orch = orchestrator(store);

    let report = orch.migrate_user("u1", "p1").unwrap();
    assert_eq!(report.migrated_count, 2);
    assert!(report.failures.is_empty());
    assert!(report.finished_at >= report.started_at);

    let record = orch.store().load("u1").unwrap();
    assert_eq!(record.version, 1);
    assert!(record.current_key.is_some());
    assert!(record.items.iter().all(|i| i.state() == ItemState::Current));

    // Second run is a no-op on already-migrated data.
    let again = orch.migrate_user("u1", "p1").unwrap();
    assert_eq!(again.migrated_count, 0);
}

#[test]
fn test_migrate_user_rejects_wrong_credential_before_any_decryption() {
    let store = MemoryStore::new();
    store.insert(seeded_user("u1", "p1"));
    let orch = orchestrator(store);

    assert!(matches!(
        orch.migrate_user("u1", "guess"),
        Err(EngineError::InvalidCredential(_))
    ));
    // Nothing was touched.
    let record = orch.store().load("u1").unwrap();
    assert_eq!(record.version, 0);
    assert!(record.current_key.is_none());
}

#[test]
fn test_migrate_unknown_user() {
    let orch = orchestrator(MemoryStore::new());
    assert!(matches!(
        orch.migrate_user("ghost", "p1"),
        Err(EngineError::UserNotFound(_))
    ));
}

#[test]
fn test_auto_migration_prepares_only_unprotected_items() {
    let store = MemoryStore::new();
    store.insert(seeded_user("u1", "p1"));
    let orch = orchestrator(store);

    let report = orch.migrate_user_auto_no_credential("u1").unwrap();
    assert_eq!(report.prepared_count, 1);
    assert_eq!(report.migrated_count, 0);

    let record = orch.store().load("u1").unwrap();
    // The plaintext item is parked in the blob field, flagged.
    assert_eq!(record.items[0].state(), ItemState::BulkAutoMigrated);
    assert_eq!(record.items[0].cipher_blob.as_deref(), Some("1000"));
    assert!(!record.items[0].is_effectively_protected());
    // The legacy item was never touched — no key material to touch it with.
    assert_eq!(record.items[1].state(), ItemState::LegacyProtected);
    // No current-scheme key was invented for the credential-less path.
    assert!(record.current_key.is_none());
}

#[test]
fn test_bulk_then_credentialed_migration_converges() {
    let store = MemoryStore::new();
    store.insert(seeded_user("u1", "p1"));
    let orch = orchestrator(store);

    orch.migrate_user_auto_no_credential("u1").unwrap();
    let report = orch.migrate_user("u1", "p1").unwrap();
    assert_eq!(report.migrated_count, 2);

    let record = orch.store().load("u1").unwrap();
    assert!(record.items.iter().all(|i| i.state() == ItemState::Current));
}

#[test]
fn test_batch_continues_past_failing_user() {
    let store = MemoryStore::new();
    store.insert(seeded_user("u1", "p1"));
    // A record the store will refuse to load consistently is hard to fake
    // with MemoryStore, so simulate per-user failure via a poisoned id list:
    // u2 exists in ids but not as a loadable record.
    store.insert(seeded_user("u3", "p3"));
    let orch = orchestrator(store);

    struct Flaky<'a>(&'a MemoryStore);
    impl UserStore for Flaky<'_> {
        fn load(&self, user_id: &str) -> card_code_vault::Result<UserRecord> {
            if user_id == "u2" {
                return Err(EngineError::SaveConflict("u2".into()));
            }
            self.0.load(user_id)
        }
        fn save(&self, record: &UserRecord) -> card_code_vault::Result<()> {
            self.0.save(record)
        }
        fn user_ids(&self) -> card_code_vault::Result<Vec<String>> {
            Ok(vec!["u1".into(), "u2".into(), "u3".into()])
        }
    }

    let flaky = MigrationOrchestrator::with_registry(
        Flaky(orch.store()),
        SchemeRegistry::with_kdf_iterations(TEST_KDF_ITERATIONS),
    );
    let stop = AtomicBool::new(false);
    let report = flaky.run_bulk_migration(&stop).unwrap();

    assert_eq!(report.users_processed, 2);
    assert_eq!(report.users_failed, 1);
    assert_eq!(report.prepared_total, 2);
    assert!(!report.stopped_early);
}

#[test]
fn test_batch_honors_stop_checkpoint() {
    let store = MemoryStore::new();
    store.insert(seeded_user("u1", "p1"));
    store.insert(seeded_user("u2", "p2"));
    let orch = orchestrator(store);

    let stop = AtomicBool::new(false);
    stop.store(true, Ordering::Relaxed);
    let report = orch.run_bulk_migration(&stop).unwrap();
    assert!(report.stopped_early);
    assert_eq!(report.users_processed, 0);
}

#[test]
fn test_save_conflict_serializes_concurrent_migrations() {
    let store = MemoryStore::new();
    store.insert(seeded_user("u1", "p1"));

    // Simulate a racing writer: bump the stored version after load.
    let stale = store.load("u1").unwrap();
    let mut winner = stale.clone();
    store.save(&winner).unwrap(); // version 0 → 1
    winner.version = 1;

    assert!(matches!(
        store.save(&stale),
        Err(EngineError::SaveConflict(_))
    ));
    assert!(store.save(&winner).is_ok());
}
