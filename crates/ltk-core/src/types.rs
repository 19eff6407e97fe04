use serde::{Deserialize, Serialize};

/// Rollover counters for the three hierarchy levels.
///
/// A rollover retires every key derived below that level: bumping the tape
/// counter re-keys one cartridge, bumping the account counter re-keys every
/// tape in the account, bumping the global counter re-keys everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloverCounters {
    pub global: u64,
    pub account: u64,
    pub tape: u64,
}

/// Schema identifiers embedded in the KAD string so a future reader of the
/// cartridge can tell which derivation/validation/hashing scheme produced
/// the key it was written with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaIds {
    pub kdf: String,
    pub validation: String,
    pub hashing: String,
}

impl Default for SchemaIds {
    fn default() -> Self {
        Self {
            kdf: "s21".to_string(),
            validation: "v1".to_string(),
            hashing: "a2id".to_string(),
        }
    }
}

/// Cartridge barcode as printed on the label, e.g. `LTO123L6`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Barcode(pub String);

impl Barcode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Barcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
