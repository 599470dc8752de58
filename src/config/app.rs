// src/config/app.rs
use super::defaults::*;
use serde::Deserialize;
use std::sync::OnceLock;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub kdf: Kdf,
    pub features: Features,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Kdf {
    /// PBKDF2 iterations for legacy key derivation. Must match what the
    /// historical writers used, or their data becomes undecryptable.
    pub legacy_iterations: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Features {
    /// Permit the credential-less bulk path that parks plaintext in the
    /// blob field. Off means bulk migration refuses to create new
    /// "fake encrypted" records and synchronous key availability is forced.
    pub allow_bulk_plaintext_migration: bool,
}

static CONFIG: OnceLock<Config> = OnceLock::new();

pub fn load() -> &'static Config {
    CONFIG.get_or_init(|| {
        let config_path =
            std::env::var("CCV_CONFIG").unwrap_or_else(|_| "ccv-config.toml".to_string());

        if std::path::Path::new(&config_path).exists() {
            let content =
                std::fs::read_to_string(&config_path).expect("failed to read ccv-config.toml");
            toml::from_str(&content).expect("invalid TOML in ccv-config.toml")
        } else {
            Config {
                kdf: default_kdf(),
                features: default_features(),
            }
        }
    })
}
