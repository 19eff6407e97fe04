//! Encrypted, signable account records.
//!
//! The account node's derivation key (left half) is the only node-derived
//! value that ever reaches non-volatile storage, and it is RSA-encrypted
//! by an external protector (TPM-backed keypair) before it does. The
//! record also carries the derivation path, the global rollover count and
//! the fingerprints used to name the on-disk blob, plus a signature over
//! all of it.
//!
//! Record layout (UTF-8): fields joined by 0x1F unit separators, then a
//! 0x1E record separator and the hex signature.

use std::path::PathBuf;

use crate::error::DeriveError;
use crate::slip21::Slip21Node;

/// Seam to the hardware-protected asymmetric keypair. The private half
/// never leaves the protector; this core only sees the three operations.
pub trait KeyProtector {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, DeriveError>;
    fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, DeriveError>;
    fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, DeriveError>;
}

const UNIT_SEP: u8 = 0x1F;
const RECORD_SEP: u8 = 0x1E;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    /// RSA-encrypted account derivation key, hex.
    pub encrypted_left_hex: String,
    /// SLIP-0021 path of the sealed node.
    pub derivation_path: String,
    pub global_rollover: u64,
    pub global_fingerprint: Option<String>,
    /// Requires `global_fingerprint` to be present (nested layout).
    pub account_fingerprint: Option<String>,
    pub signature: Option<Vec<u8>>,
}

impl AccountRecord {
    /// Seal an account node: encrypt its derivation key and sign the
    /// resulting record.
    pub fn seal(
        node: &Slip21Node,
        global_rollover: u64,
        global_fingerprint: Option<String>,
        account_fingerprint: Option<String>,
        protector: &dyn KeyProtector,
    ) -> Result<Self, DeriveError> {
        if account_fingerprint.is_some() && global_fingerprint.is_none() {
            return Err(DeriveError::MalformedRecord(
                "account fingerprint without global fingerprint",
            ));
        }
        let encrypted = protector.encrypt(node.derivation_key())?;
        let mut record = Self {
            encrypted_left_hex: hex::encode(encrypted),
            derivation_path: node.path().to_string(),
            global_rollover,
            global_fingerprint,
            account_fingerprint,
            signature: None,
        };
        let signature = protector.sign(&record.signable_part())?;
        record.signature = Some(signature);
        Ok(record)
    }

    /// Decrypt the derivation key and rebuild a derivation-capable node.
    pub fn unseal(&self, protector: &dyn KeyProtector) -> Result<Slip21Node, DeriveError> {
        let encrypted = hex::decode(&self.encrypted_left_hex)
            .map_err(|e| DeriveError::BadHex(e.to_string()))?;
        let plain = protector.decrypt(&encrypted)?;
        let left: [u8; 32] = plain
            .as_slice()
            .try_into()
            .map_err(|_| DeriveError::MalformedRecord("decrypted key is not 32 bytes"))?;
        Ok(Slip21Node::resume(left, self.derivation_path.clone()))
    }

    /// The signed byte range: every field except the signature itself.
    pub fn signable_part(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(self.encrypted_left_hex.as_bytes());
        out.push(UNIT_SEP);
        out.extend_from_slice(self.derivation_path.as_bytes());
        out.push(UNIT_SEP);
        out.extend_from_slice(self.global_rollover.to_string().as_bytes());
        if let Some(gfp) = &self.global_fingerprint {
            out.push(UNIT_SEP);
            out.extend_from_slice(gfp.as_bytes());
            if let Some(afp) = &self.account_fingerprint {
                out.push(UNIT_SEP);
                out.extend_from_slice(afp.as_bytes());
            }
        }
        out
    }

    /// Persistable blob: signable part, 0x1E, hex signature.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.signable_part();
        if let Some(sig) = &self.signature {
            out.push(RECORD_SEP);
            out.extend_from_slice(hex::encode(sig).as_bytes());
        }
        out
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, DeriveError> {
        let mut records = data.split(|&b| b == RECORD_SEP);
        let signable = records
            .next()
            .ok_or(DeriveError::MalformedRecord("empty blob"))?;
        let signature = match records.next() {
            Some(hex_sig) => {
                let text = std::str::from_utf8(hex_sig)
                    .map_err(|_| DeriveError::MalformedRecord("signature is not UTF-8"))?;
                Some(hex::decode(text).map_err(|e| DeriveError::BadHex(e.to_string()))?)
            }
            None => None,
        };
        if records.next().is_some() {
            return Err(DeriveError::MalformedRecord("more than one record separator"));
        }

        let fields: Vec<&[u8]> = signable.split(|&b| b == UNIT_SEP).collect();
        if !(3..=5).contains(&fields.len()) {
            return Err(DeriveError::MalformedRecord("wrong field count"));
        }
        let text = |bytes: &[u8], what: &'static str| -> Result<String, DeriveError> {
            std::str::from_utf8(bytes)
                .map(str::to_string)
                .map_err(|_| DeriveError::MalformedRecord(what))
        };
        let encrypted_left_hex = text(fields[0], "encrypted key is not UTF-8")?;
        hex::decode(&encrypted_left_hex).map_err(|e| DeriveError::BadHex(e.to_string()))?;
        let derivation_path = text(fields[1], "path is not UTF-8")?;
        let global_rollover = text(fields[2], "rollover is not UTF-8")?
            .parse::<u64>()
            .map_err(|_| DeriveError::MalformedRecord("rollover is not a number"))?;
        let global_fingerprint = fields
            .get(3)
            .map(|f| text(f, "global fingerprint is not UTF-8"))
            .transpose()?;
        let account_fingerprint = fields
            .get(4)
            .map(|f| text(f, "account fingerprint is not UTF-8"))
            .transpose()?;
        Ok(Self {
            encrypted_left_hex,
            derivation_path,
            global_rollover,
            global_fingerprint,
            account_fingerprint,
            signature,
        })
    }

    /// Relative blob path:
    /// `Accounts/<hex(UTF8(globalFp))>/<hex(UTF8(accountFp))>.blob`.
    pub fn storage_rel_path(&self) -> Result<PathBuf, DeriveError> {
        let gfp = self
            .global_fingerprint
            .as_ref()
            .ok_or(DeriveError::MalformedRecord("missing global fingerprint"))?;
        let afp = self
            .account_fingerprint
            .as_ref()
            .ok_or(DeriveError::MalformedRecord("missing account fingerprint"))?;
        Ok(PathBuf::from("Accounts")
            .join(hex::encode(gfp.as_bytes()))
            .join(format!("{}.blob", hex::encode(afp.as_bytes()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Secret64;
    use sha2::{Digest, Sha256};

    /// Deterministic stand-in for the TPM seam. XOR "encryption" is enough
    /// to prove the plumbing; real protection lives outside this crate.
    struct MockProtector;

    impl KeyProtector for MockProtector {
        fn sign(&self, data: &[u8]) -> Result<Vec<u8>, DeriveError> {
            Ok(Sha256::digest(data).to_vec())
        }
        fn encrypt(&self, data: &[u8]) -> Result<Vec<u8>, DeriveError> {
            Ok(data.iter().map(|b| b ^ 0xAA).collect())
        }
        fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, DeriveError> {
            Ok(data.iter().map(|b| b ^ 0xAA).collect())
        }
    }

    fn account_node() -> Slip21Node {
        Slip21Node::master(&Secret64::from_bytes([0x42u8; 64]))
            .child("LTO tape encryption")
            .child("0")
            .child("backups")
            .child("0")
    }

    #[test]
    fn seal_roundtrip() {
        let node = account_node();
        let record = AccountRecord::seal(
            &node,
            0,
            Some("gfp".to_string()),
            Some("afp".to_string()),
            &MockProtector,
        )
        .unwrap();
        assert!(record.signature.is_some());

        let parsed = AccountRecord::from_bytes(&record.to_bytes()).unwrap();
        assert_eq!(parsed, record);

        let resumed = parsed.unseal(&MockProtector).unwrap();
        assert_eq!(resumed.path(), node.path());
        let a = node.child("TAPE01L8");
        let b = resumed.child("TAPE01L8");
        assert_eq!(a.symmetric_key(), b.symmetric_key());
    }

    #[test]
    fn raw_key_never_in_blob() {
        let node = account_node();
        let record =
            AccountRecord::seal(&node, 0, None, None, &MockProtector).unwrap();
        let blob = record.to_bytes();
        let raw_hex = hex::encode(node.derivation_key());
        assert!(!String::from_utf8_lossy(&blob).contains(&raw_hex));
    }

    #[test]
    fn account_fp_requires_global_fp() {
        let node = account_node();
        assert!(matches!(
            AccountRecord::seal(&node, 0, None, Some("afp".into()), &MockProtector),
            Err(DeriveError::MalformedRecord(_))
        ));
    }

    #[test]
    fn optional_fingerprints_roundtrip() {
        let node = account_node();
        let record = AccountRecord::seal(
            &node,
            7,
            Some("gfp".to_string()),
            None,
            &MockProtector,
        )
        .unwrap();
        let parsed = AccountRecord::from_bytes(&record.to_bytes()).unwrap();
        assert_eq!(parsed.global_rollover, 7);
        assert_eq!(parsed.global_fingerprint.as_deref(), Some("gfp"));
        assert_eq!(parsed.account_fingerprint, None);
    }

    #[test]
    fn storage_path_hexes_fingerprints() {
        let node = account_node();
        let record = AccountRecord::seal(
            &node,
            0,
            Some("g".to_string()),
            Some("a".to_string()),
            &MockProtector,
        )
        .unwrap();
        assert_eq!(
            record.storage_rel_path().unwrap(),
            PathBuf::from("Accounts/67/61.blob")
        );
    }

    #[test]
    fn malformed_blobs_rejected() {
        assert!(AccountRecord::from_bytes(b"just-one-field").is_err());
        assert!(AccountRecord::from_bytes(b"zz\x1fpath\x1fnot-a-number").is_err());
        assert!(AccountRecord::from_bytes(b"aa\x1fp\x1f0\x1e00\x1e00").is_err());
    }

    #[test]
    fn tampered_signable_part_changes_signature_input() {
        let node = account_node();
        let record = AccountRecord::seal(
            &node,
            0,
            Some("gfp".to_string()),
            None,
            &MockProtector,
        )
        .unwrap();
        let mut tampered = record.clone();
        tampered.global_rollover = 1;
        assert_ne!(record.signable_part(), tampered.signable_part());
    }
}
