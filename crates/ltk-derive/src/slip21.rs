//! SLIP-0021 symmetric key tree.
//!
//! `HMAC-SHA512("Symmetric key seed", seed)` roots the tree; each child is
//! `HMAC-SHA512(parent.left, 0x00 || label)`. The left half only ever
//! derives children, the right half is the node's symmetric key — the tape
//! node's right half is the AES-256 key the drive is loaded with.

use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::Zeroize;

use crate::material::Secret64;

type HmacSha512 = Hmac<Sha512>;

const MASTER_KEY: &[u8] = b"Symmetric key seed";

/// A SLIP-0021 node: move-only 64-byte material plus its derivation path.
pub struct Slip21Node {
    material: Secret64,
    path: String,
}

impl std::fmt::Debug for Slip21Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slip21Node")
            .field("path", &self.path)
            .field("material", &"[REDACTED]")
            .finish()
    }
}

impl Slip21Node {
    /// Root node from a BIP-39 binary seed.
    pub fn master(seed: &Secret64) -> Self {
        let mut mac = HmacSha512::new_from_slice(MASTER_KEY).expect("hmac accepts any key length");
        mac.update(seed.as_bytes());
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(&mac.finalize().into_bytes());
        let material = Secret64::from_bytes(bytes);
        bytes.zeroize();
        Self {
            material,
            path: "m".to_string(),
        }
    }

    /// Child under an opaque UTF-8 label. No hardened/normal distinction.
    pub fn child(&self, label: &str) -> Self {
        let mut mac = HmacSha512::new_from_slice(self.material.left())
            .expect("hmac accepts any key length");
        mac.update(&[0x00]);
        mac.update(label.as_bytes());
        let mut bytes = [0u8; 64];
        bytes.copy_from_slice(&mac.finalize().into_bytes());
        let material = Secret64::from_bytes(bytes);
        bytes.zeroize();
        Self {
            material,
            path: format!("{}/\"{}\"", self.path, label),
        }
    }

    /// Rebuild a derivation-capable node from an unsealed account record.
    ///
    /// Only the left half survives persistence, so the node's own symmetric
    /// key (right half) is absent; children derive normally.
    pub fn resume(mut left: [u8; 32], path: String) -> Self {
        let mut right = [0u8; 32];
        Self {
            material: Secret64::from_halves(&mut left, &mut right),
            path,
        }
    }

    /// Derivation path, e.g. `m/"LTO tape encryption"/"0"`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Derivation key half (what `resume` needs back).
    pub fn derivation_key(&self) -> &[u8; 32] {
        self.material.left()
    }

    /// Symmetric key half (what the drive is keyed with).
    pub fn symmetric_key(&self) -> &[u8; 32] {
        self.material.right()
    }

    pub fn is_wiped(&self) -> bool {
        self.material.is_wiped()
    }

    /// Retire the node once all required children have been derived.
    pub fn wipe(&mut self) {
        self.material.wipe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // SLIP-0021 published test vector: seed from the mnemonic
    // "all all all all all all all all all all all all", no passphrase.
    fn vector_seed() -> Secret64 {
        let bytes = hex::decode(
            "c76c4ac4f4e4a00d6b274d5c39c700bb4a7ddc04fbc6f78e85ca75007b5b495f\
             74a9043eeb77bdd53aa6fc3a0e31462270316fa04b8c19114c8798706cd02ac8",
        )
        .unwrap();
        Secret64::from_bytes(bytes.try_into().unwrap())
    }

    #[test]
    fn master_vector() {
        let m = Slip21Node::master(&vector_seed());
        assert_eq!(
            hex::encode(m.symmetric_key()),
            "dbf12b44133eaab506a740f6565cc117228cbf1dd70635cfa8ddfdc9af734756"
        );
    }

    #[test]
    fn child_vectors() {
        let m = Slip21Node::master(&vector_seed());
        let slip = m.child("SLIP-0021");
        assert_eq!(
            hex::encode(slip.symmetric_key()),
            "1d065e3ac1bbe5c7fad32cf2305f7d709dc070d672044a19e610c77cdf33de0d"
        );
        let enc = slip.child("Master encryption key");
        assert_eq!(
            hex::encode(enc.symmetric_key()),
            "ea163130e35bbafdf5ddee97a17b39cef2be4b4f390180d65b54cf05c6a82fde"
        );
        let auth = slip.child("Authentication key");
        assert_eq!(
            hex::encode(auth.symmetric_key()),
            "47194e938ab24cc82bfa25f6486ed54bebe79c40ae2a5a32ea6db294d81861a6"
        );
    }

    #[test]
    fn paths_quote_labels() {
        let m = Slip21Node::master(&vector_seed());
        let child = m.child("LTO tape encryption").child("0");
        assert_eq!(child.path(), "m/\"LTO tape encryption\"/\"0\"");
    }

    #[test]
    fn resume_derives_same_children() {
        let m = Slip21Node::master(&vector_seed());
        let account = m.child("account");
        let resumed =
            Slip21Node::resume(*account.derivation_key(), account.path().to_string());
        let a = account.child("tape");
        let b = resumed.child("tape");
        assert_eq!(a.symmetric_key(), b.symmetric_key());
        assert_eq!(a.path(), b.path());
    }

    #[test]
    fn wipe_is_observable() {
        let mut m = Slip21Node::master(&vector_seed());
        assert!(!m.is_wiped());
        m.wipe();
        assert!(m.is_wiped());
        assert_eq!(m.symmetric_key(), &[0u8; 32]);
    }
}
