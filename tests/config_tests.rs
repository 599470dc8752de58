// tests/config_tests.rs
//! Config loading gets its own binary: the global config initializes once
//! per process, so everything that depends on a non-default config lives in
//! a single test.

use std::io::Write;

use card_code_vault::migrate::prepare_bulk;
use card_code_vault::record::{ProtectedItem, UserRecord};
use card_code_vault::registry::SchemeRegistry;
use card_code_vault::EngineError;

#[test]
fn test_toml_config_overrides_defaults_and_gates_bulk_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[kdf]
legacy_iterations = 777

[features]
allow_bulk_plaintext_migration = false
"#
    )
    .unwrap();
    std::env::set_var("CCV_CONFIG", file.path());

    let config = card_code_vault::load_config();
    assert_eq!(config.kdf.legacy_iterations, 777);
    assert!(!config.features.allow_bulk_plaintext_migration);

    // The registry picks up the configured stretch cost.
    assert_eq!(SchemeRegistry::new().kdf_iterations(), 777);

    // With the feature off, no new "fake encrypted" records can be created.
    let mut record = UserRecord::new("u1");
    record.items.push(ProtectedItem::unprotected("1000"));
    assert!(matches!(
        prepare_bulk(&mut record),
        Err(EngineError::InvalidInput(_))
    ));
    // And the item was left alone.
    assert_eq!(record.items[0].card_code.as_deref(), Some("1000"));
}
