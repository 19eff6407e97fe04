//! Key-Associated-Data builder.
//!
//! The KAD string rides on the tape next to the encrypted data and is the
//! only on-cartridge record of *which* key the tape was written with:
//! barcode, the three rollover counters, schema identifiers, an account-id
//! hash and the tape fingerprint. Rendering is deterministic; the SCSI
//! layer splits the string across authenticated/unauthenticated KAD
//! descriptors as the drive's capabilities allow.

use ltk_core::types::{Barcode, RolloverCounters, SchemaIds};

use crate::codec::{z85_char, z85_crc32};

/// Account-id hash carried in the KAD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountHash {
    /// Z85(CRC32(account id)) — the default compact form.
    Crc32,
    /// An explicit MCF/PHC-style hash, split into scheme id and suffix
    /// (the suffix carries the `$`-separated parameter/salt/hash tail).
    Mcf { scheme: String, suffix: String },
}

/// The value object behind `get_kad()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAssociatedData {
    pub barcode: Barcode,
    pub rollovers: RolloverCounters,
    pub schema: SchemaIds,
    pub account_id: String,
    pub account_hash: AccountHash,
    pub tape_fingerprint: String,
}

impl KeyAssociatedData {
    /// Render the wire-format KAD string. Trailing space is significant.
    pub fn get_kad(&self) -> String {
        format!(
            "{}*{}{}{}*{}*[{}] {}:{} {} ",
            self.barcode,
            z85_char(self.rollovers.global),
            z85_char(self.rollovers.account),
            z85_char(self.rollovers.tape),
            self.schema.kdf,
            self.account_hash_field(),
            self.schema.validation,
            self.schema.hashing,
            self.tape_fingerprint,
        )
    }

    fn account_hash_field(&self) -> String {
        match &self.account_hash {
            AccountHash::Crc32 => z85_crc32(self.account_id.as_bytes()),
            AccountHash::Mcf { scheme, suffix } => match scheme.as_str() {
                // Legacy scheme ids are not PHC-compatible; translate them
                // to distinguishable prefixes.
                "" => format!("$ {suffix}"),
                "_" => format!("$_{suffix}"),
                id => format!("${id}{suffix}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_kad() -> KeyAssociatedData {
        KeyAssociatedData {
            barcode: Barcode("LTO123L6".to_string()),
            rollovers: RolloverCounters::default(),
            schema: SchemaIds::default(),
            account_id: "0".to_string(),
            account_hash: AccountHash::Crc32,
            tape_fingerprint: "abcde".to_string(),
        }
    }

    #[test]
    fn default_layout() {
        let kad = base_kad();
        let expected = format!(
            "LTO123L6*000*s21*[{}] v1:a2id abcde ",
            z85_crc32(b"0")
        );
        assert_eq!(kad.get_kad(), expected);
    }

    #[test]
    fn rollovers_render_as_single_z85_chars() {
        let mut kad = base_kad();
        kad.rollovers = RolloverCounters {
            global: 1,
            account: 10,
            tape: 86,
        };
        // 86 % 85 == 1
        assert!(kad.get_kad().contains("*1a1*"));
    }

    #[test]
    fn trailing_space_is_kept() {
        assert!(base_kad().get_kad().ends_with("abcde "));
    }

    #[test]
    fn mcf_hash_renders_phc_prefix() {
        let mut kad = base_kad();
        kad.account_hash = AccountHash::Mcf {
            scheme: "argon2id".to_string(),
            suffix: "$v=19$m=65536,t=3,p=4$c2FsdA$aGFzaA".to_string(),
        };
        assert!(kad
            .get_kad()
            .contains("[$argon2id$v=19$m=65536,t=3,p=4$c2FsdA$aGFzaA]"));
    }

    #[test]
    fn legacy_scheme_ids_translate() {
        let mut kad = base_kad();
        kad.account_hash = AccountHash::Mcf {
            scheme: String::new(),
            suffix: "$legacyhash".to_string(),
        };
        assert!(kad.get_kad().contains("[$ $legacyhash]"));

        kad.account_hash = AccountHash::Mcf {
            scheme: "_".to_string(),
            suffix: "$legacyhash".to_string(),
        };
        assert!(kad.get_kad().contains("[$_$legacyhash]"));
    }

    #[test]
    fn deterministic() {
        assert_eq!(base_kad().get_kad(), base_kad().get_kad());
    }
}
