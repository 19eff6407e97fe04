//! BIP-85: deterministic auxiliary entropy from a BIP-32 node.
//!
//! A node below the BIP-85 purpose (`m/83696968'/...`) yields up to 64
//! bytes of application entropy, and optionally an arbitrary-length
//! SHAKE-256 stream from the same seed. The stream is what seeds
//! deterministic RSA key generation; the generation itself lives outside
//! this crate.

use hmac::{Hmac, Mac};
use sha2::Sha512;
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::Shake256;
use zeroize::Zeroizing;

use crate::bip32::XNode;
use crate::error::DeriveError;

type HmacSha512 = Hmac<Sha512>;

/// BIP-85 purpose index ("BIPS" in ASCII), hardened, as a path prefix.
pub const PURPOSE_PREFIX: &str = "m/83696968'";

const ENTROPY_KEY: &[u8] = b"bip-entropy-from-k";

fn full_entropy(node: &XNode) -> Result<Zeroizing<[u8; 64]>, DeriveError> {
    if !node.path().starts_with(PURPOSE_PREFIX) {
        return Err(DeriveError::NotBip85Purpose(node.path().to_string()));
    }
    let key = node.private_key().ok_or(DeriveError::ParentNotUsable)?;
    let mut mac = HmacSha512::new_from_slice(ENTROPY_KEY).expect("hmac accepts any key length");
    Mac::update(&mut mac, key);
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

/// `HMAC-SHA512("bip-entropy-from-k", node.left)[..n]`, 1 ≤ n ≤ 64.
pub fn entropy_from_k(node: &XNode, n_bytes: usize) -> Result<Zeroizing<Vec<u8>>, DeriveError> {
    if n_bytes == 0 || n_bytes > 64 {
        return Err(DeriveError::EntropyRequestOutOfRange(n_bytes));
    }
    let full = full_entropy(node)?;
    Ok(Zeroizing::new(full[..n_bytes].to_vec()))
}

/// Unbounded deterministic byte stream: SHAKE-256 over the full 64-byte
/// entropy. Two readers for the same node produce identical streams.
pub struct EntropyStream {
    reader: Box<dyn XofReader>,
}

impl EntropyStream {
    pub fn new(node: &XNode) -> Result<Self, DeriveError> {
        let full = full_entropy(node)?;
        let mut hasher = Shake256::default();
        hasher.update(&full[..]);
        Ok(Self {
            reader: Box::new(hasher.finalize_xof()),
        })
    }

    pub fn read(&mut self, out: &mut [u8]) {
        self.reader.read(out);
    }
}

impl std::fmt::Debug for EntropyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntropyStream").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bip32::{child_node, master_node, Curve, HARDENED};

    fn bip85_node() -> XNode {
        let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let master = master_node(&seed, Curve::Secp256k1).unwrap();
        let purpose = child_node(&master, HARDENED + 83_696_968).unwrap();
        let app = child_node(&purpose, HARDENED).unwrap();
        child_node(&app, HARDENED).unwrap()
    }

    #[test]
    fn path_prefix_enforced() {
        let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let master = master_node(&seed, Curve::Secp256k1).unwrap();
        assert!(matches!(
            entropy_from_k(&master, 32),
            Err(DeriveError::NotBip85Purpose(_))
        ));
    }

    #[test]
    fn request_size_bounds() {
        let node = bip85_node();
        assert_eq!(
            entropy_from_k(&node, 0).unwrap_err(),
            DeriveError::EntropyRequestOutOfRange(0)
        );
        assert_eq!(
            entropy_from_k(&node, 65).unwrap_err(),
            DeriveError::EntropyRequestOutOfRange(65)
        );
        assert_eq!(entropy_from_k(&node, 64).unwrap().len(), 64);
    }

    #[test]
    fn prefix_of_longer_request() {
        let node = bip85_node();
        let short = entropy_from_k(&node, 16).unwrap();
        let long = entropy_from_k(&node, 64).unwrap();
        assert_eq!(&long[..16], &short[..]);
    }

    #[test]
    fn stream_is_deterministic() {
        let node = bip85_node();
        let mut a = [0u8; 128];
        let mut b = [0u8; 128];
        EntropyStream::new(&node).unwrap().read(&mut a);
        let mut s = EntropyStream::new(&node).unwrap();
        s.read(&mut b[..64]);
        s.read(&mut b[64..]);
        assert_eq!(a, b, "chunked reads must match a single read");
    }
}
