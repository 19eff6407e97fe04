use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{LtkError, LtkResult};
use crate::types::SchemaIds;

/// Top-level configuration (loaded from ltokey.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LtokeyConfig {
    pub fingerprint: FingerprintConfig,
    pub schema: SchemaConfig,
    pub accounts: AccountsConfig,
}

/// Argon2id cost settings for the human-checkable fingerprints.
///
/// These govern how expensive it is to brute-force a fingerprint back to
/// key material, so lowering them weakens the validation scheme for every
/// fingerprint computed afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub mem_cost_kib: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            mem_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

/// Labels and schema identifiers for the SLIP-0021 tree and the KAD string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// First-level SLIP-0021 label under the master node
    pub tree_label: String,
    /// Label of the validation child used for fingerprints
    pub validation_label: String,
    /// Schema identifiers rendered into the KAD string
    pub ids: SchemaIds,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            tree_label: "LTO tape encryption".to_string(),
            validation_label: "Validation".to_string(),
            ids: SchemaIds::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    /// Directory under which account record blobs are placed
    pub dir: PathBuf,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("Accounts"),
        }
    }
}

impl LtokeyConfig {
    /// Load configuration from a TOML file; missing sections fall back to
    /// defaults per `#[serde(default)]`.
    pub fn load(path: &Path) -> LtkResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| LtkError::Config(format!("{}: {e}", path.display())))
    }
}
