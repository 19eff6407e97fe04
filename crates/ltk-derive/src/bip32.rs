//! BIP-32 hierarchical keys over a named elliptic curve.
//!
//! secp256k1 follows BIP-32 exactly (an out-of-range master scalar is a
//! hard failure). NIST P-256 follows the SLIP-0010 rule instead: the
//! master HMAC is re-hashed until the scalar lands in range. Both curves
//! share the RustCrypto `elliptic-curve` API so the per-curve shims below
//! stay small.

use hmac::{Hmac, Mac};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::{Field, PrimeField};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256, Sha512};
use zeroize::{Zeroize, Zeroizing};

use crate::codec::{base58check_decode, base58check_encode};
use crate::error::DeriveError;
use crate::material::Secret64;

type HmacSha512 = Hmac<Sha512>;

/// Hardened-derivation bit (top bit of the child index).
pub const HARDENED: u32 = 0x8000_0000;

const VERSION_XPRV: [u8; 4] = [0x04, 0x88, 0xAD, 0xE4];
const VERSION_XPUB: [u8; 4] = [0x04, 0x88, 0xB2, 0x1E];
const PAYLOAD_LEN: usize = 78;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    Secp256k1,
    NistP256,
}

impl Curve {
    /// HMAC key used to turn a binary seed into the master node.
    fn seed_key(self) -> &'static [u8] {
        match self {
            Curve::Secp256k1 => b"Bitcoin seed",
            Curve::NistP256 => b"Nist256p1 seed",
        }
    }
}

// ── per-curve scalar/point shims ───────────────────────────────────────────

/// Scalar in [1, n-1]?
fn scalar_valid(curve: Curve, bytes: &[u8; 32]) -> bool {
    match curve {
        Curve::Secp256k1 => Option::<k256::Scalar>::from(k256::Scalar::from_repr((*bytes).into()))
            .is_some_and(|s| !bool::from(s.is_zero())),
        Curve::NistP256 => Option::<p256::Scalar>::from(p256::Scalar::from_repr((*bytes).into()))
            .is_some_and(|s| !bool::from(s.is_zero())),
    }
}

/// (IL + parent) mod n; `None` when IL >= n or the sum is zero.
fn tweak_add(curve: Curve, il: &[u8; 32], parent: &[u8; 32]) -> Option<[u8; 32]> {
    match curve {
        Curve::Secp256k1 => {
            let il = Option::<k256::Scalar>::from(k256::Scalar::from_repr((*il).into()))?;
            let parent = Option::<k256::Scalar>::from(k256::Scalar::from_repr((*parent).into()))
                .expect("parent scalar was validated at construction");
            let child = il + parent;
            if bool::from(child.is_zero()) {
                None
            } else {
                Some(child.to_repr().into())
            }
        }
        Curve::NistP256 => {
            let il = Option::<p256::Scalar>::from(p256::Scalar::from_repr((*il).into()))?;
            let parent = Option::<p256::Scalar>::from(p256::Scalar::from_repr((*parent).into()))
                .expect("parent scalar was validated at construction");
            let child = il + parent;
            if bool::from(child.is_zero()) {
                None
            } else {
                Some(child.to_repr().into())
            }
        }
    }
}

/// Compressed SEC1 point for a validated scalar. Panics on an invalid
/// scalar: that is a logic bug, not bad input.
fn compressed_point(curve: Curve, scalar: &[u8; 32]) -> [u8; 33] {
    match curve {
        Curve::Secp256k1 => {
            let sk = k256::SecretKey::from_slice(scalar)
                .expect("scalar was validated before point computation");
            let point = sk.public_key().to_encoded_point(true);
            point.as_bytes().try_into().expect("compressed point is 33 bytes")
        }
        Curve::NistP256 => {
            let sk = p256::SecretKey::from_slice(scalar)
                .expect("scalar was validated before point computation");
            let point = sk.public_key().to_encoded_point(true);
            point.as_bytes().try_into().expect("compressed point is 33 bytes")
        }
    }
}

fn point_valid(curve: Curve, sec1: &[u8; 33]) -> bool {
    match curve {
        Curve::Secp256k1 => k256::PublicKey::from_sec1_bytes(sec1).is_ok(),
        Curve::NistP256 => p256::PublicKey::from_sec1_bytes(sec1).is_ok(),
    }
}

fn hash160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(Sha256::digest(data)).into()
}

fn hmac_sha512(key: &[u8], parts: &[&[u8]]) -> Zeroizing<[u8; 64]> {
    let mut mac = HmacSha512::new_from_slice(key).expect("hmac accepts any key length");
    for p in parts {
        mac.update(p);
    }
    let mut out = [0u8; 64];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Zeroizing::new(out)
}

// ── the node ───────────────────────────────────────────────────────────────

/// An extended key. Left half of `material` is the private scalar (zeroed
/// for public-only nodes), right half the chain code. Move-only; `wipe()`
/// retires the node.
pub struct XNode {
    curve: Curve,
    depth: u8,
    parent_fingerprint: [u8; 4],
    child_index: u32,
    path: String,
    material: Secret64,
    public: [u8; 33],
    has_private: bool,
}

impl std::fmt::Debug for XNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XNode")
            .field("curve", &self.curve)
            .field("path", &self.path)
            .field("depth", &self.depth)
            .field("material", &"[REDACTED]")
            .finish()
    }
}

impl XNode {
    pub fn curve(&self) -> Curve {
        self.curve
    }

    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn child_index(&self) -> u32 {
        self.child_index
    }

    pub fn parent_fingerprint(&self) -> [u8; 4] {
        self.parent_fingerprint
    }

    /// Derivation path, `m` for the root, hardened steps rendered `n'`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Compressed SEC1 public key.
    pub fn public_key(&self) -> &[u8; 33] {
        &self.public
    }

    /// Private scalar, if this node carries one and has not been wiped.
    pub fn private_key(&self) -> Option<&[u8; 32]> {
        (self.has_private && !self.material.is_wiped()).then(|| self.material.left())
    }

    /// Chain code.
    pub fn chain_code(&self) -> &[u8; 32] {
        self.material.right()
    }

    /// First 4 bytes of RIPEMD160(SHA256(compressed public key)).
    pub fn fingerprint(&self) -> [u8; 4] {
        hash160(&self.public)[..4].try_into().expect("hash160 yields 20 bytes")
    }

    /// Destroy the key material. Children derived earlier stay valid.
    pub fn wipe(&mut self) {
        self.material.wipe();
        self.has_private = false;
    }

    fn usable_parent(&self) -> Result<(&[u8; 32], &[u8; 32]), DeriveError> {
        if !self.has_private || self.material.is_wiped() {
            return Err(DeriveError::ParentNotUsable);
        }
        let chain_code = self.material.right();
        if chain_code.iter().all(|b| *b == 0) {
            return Err(DeriveError::ParentNotUsable);
        }
        Ok((self.material.left(), chain_code))
    }

    /// Private extended key, Base58Check.
    pub fn serialize_private(&self) -> Result<String, DeriveError> {
        if !self.has_private || self.material.is_wiped() {
            return Err(DeriveError::ParentNotUsable);
        }
        let mut payload = Zeroizing::new(Vec::with_capacity(PAYLOAD_LEN));
        self.push_header(&mut payload, VERSION_XPRV);
        payload.push(0x00);
        payload.extend_from_slice(self.material.left());
        debug_assert_eq!(payload.len(), PAYLOAD_LEN);
        Ok(base58check_encode(&payload))
    }

    /// Public extended key, Base58Check.
    pub fn serialize_public(&self) -> String {
        let mut payload = Vec::with_capacity(PAYLOAD_LEN);
        self.push_header(&mut payload, VERSION_XPUB);
        payload.extend_from_slice(&self.public);
        debug_assert_eq!(payload.len(), PAYLOAD_LEN);
        base58check_encode(&payload)
    }

    fn push_header(&self, payload: &mut Vec<u8>, version: [u8; 4]) {
        payload.extend_from_slice(&version);
        payload.push(self.depth);
        payload.extend_from_slice(&self.parent_fingerprint);
        payload.extend_from_slice(&self.child_index.to_be_bytes());
        payload.extend_from_slice(self.material.right());
    }
}

/// Derive the master node from a binary seed.
pub fn master_node(seed: &[u8], curve: Curve) -> Result<XNode, DeriveError> {
    let mut data = Zeroizing::new(seed.to_vec());
    loop {
        let i = hmac_sha512(curve.seed_key(), &[data.as_slice()]);
        let mut il: [u8; 32] = i[..32].try_into().expect("left half");
        let mut ir: [u8; 32] = i[32..].try_into().expect("right half");
        if scalar_valid(curve, &il) {
            let public = compressed_point(curve, &il);
            return Ok(XNode {
                curve,
                depth: 0,
                parent_fingerprint: [0; 4],
                child_index: 0,
                path: "m".to_string(),
                material: Secret64::from_halves(&mut il, &mut ir),
                public,
                has_private: true,
            });
        }
        il.zeroize();
        ir.zeroize();
        match curve {
            Curve::Secp256k1 => return Err(DeriveError::InvalidMasterKey),
            // SLIP-0010: re-hash until the scalar lands in range. No
            // iteration cap; repeated failure is cryptographically
            // negligible.
            Curve::NistP256 => {
                data.zeroize();
                data.extend_from_slice(&i[..]);
            }
        }
    }
}

/// Derive a child node. Index bit 31 set means hardened.
pub fn child_node(parent: &XNode, index: u32) -> Result<XNode, DeriveError> {
    let (parent_key, chain_code) = parent.usable_parent()?;
    let index_be = index.to_be_bytes();
    let i = if index >= HARDENED {
        hmac_sha512(chain_code, &[&[0x00], parent_key, &index_be])
    } else {
        hmac_sha512(chain_code, &[&parent.public, &index_be])
    };
    let mut il: [u8; 32] = i[..32].try_into().expect("left half");
    let mut ir: [u8; 32] = i[32..].try_into().expect("right half");

    let Some(mut child_key) = tweak_add(parent.curve, &il, parent_key) else {
        il.zeroize();
        ir.zeroize();
        // BIP-32: invalid result, the caller proceeds with the next index.
        return Err(DeriveError::UnusableChild(index));
    };
    il.zeroize();

    let public = compressed_point(parent.curve, &child_key);
    let step = if index >= HARDENED {
        format!("{}'", index - HARDENED)
    } else {
        index.to_string()
    };
    Ok(XNode {
        curve: parent.curve,
        depth: parent.depth + 1,
        parent_fingerprint: parent.fingerprint(),
        child_index: index,
        path: format!("{}/{step}", parent.path),
        material: Secret64::from_halves(&mut child_key, &mut ir),
        public,
        has_private: true,
    })
}

/// Derive along a chain of indices, wiping each intermediate parent once
/// its child exists.
pub fn derive_path(seed: &[u8], curve: Curve, indices: &[u32]) -> Result<XNode, DeriveError> {
    let mut node = master_node(seed, curve)?;
    for &index in indices {
        let mut next = child_node(&node, index)?;
        std::mem::swap(&mut node, &mut next);
        next.wipe();
    }
    Ok(node)
}

/// Parse a Base58Check-serialized extended key.
///
/// Each structural violation is a distinct error so the operator sees the
/// actual reason an imported key was refused.
pub fn deserialize(text: &str, curve: Curve) -> Result<XNode, DeriveError> {
    let raw = Zeroizing::new(base58check_decode(text)?);
    if raw.len() != PAYLOAD_LEN {
        return Err(DeriveError::WrongPayloadLength(raw.len()));
    }
    let version: [u8; 4] = raw[0..4].try_into().expect("4 bytes");
    let is_private = match version {
        VERSION_XPRV => true,
        VERSION_XPUB => false,
        other => return Err(DeriveError::UnknownVersion(other)),
    };
    let depth = raw[4];
    let parent_fingerprint: [u8; 4] = raw[5..9].try_into().expect("4 bytes");
    let child_index = u32::from_be_bytes(raw[9..13].try_into().expect("4 bytes"));
    if depth == 0 && parent_fingerprint != [0; 4] {
        return Err(DeriveError::MasterWithParentFingerprint);
    }
    if depth == 0 && child_index != 0 {
        return Err(DeriveError::MasterWithChildIndex);
    }
    let mut chain_code: [u8; 32] = raw[13..45].try_into().expect("32 bytes");
    let key = &raw[45..78];

    let path = if depth == 0 {
        "m".to_string()
    } else if child_index >= HARDENED {
        format!("m/.../{}'", child_index - HARDENED)
    } else {
        format!("m/.../{child_index}")
    };

    if is_private {
        if key[0] != 0x00 {
            return Err(DeriveError::InvalidKeyPrefix(key[0]));
        }
        let mut scalar: [u8; 32] = key[1..33].try_into().expect("32 bytes");
        if !scalar_valid(curve, &scalar) {
            scalar.zeroize();
            chain_code.zeroize();
            return Err(DeriveError::ScalarOutOfRange);
        }
        let public = compressed_point(curve, &scalar);
        Ok(XNode {
            curve,
            depth,
            parent_fingerprint,
            child_index,
            path,
            material: Secret64::from_halves(&mut scalar, &mut chain_code),
            public,
            has_private: true,
        })
    } else {
        if key[0] != 0x02 && key[0] != 0x03 {
            return Err(DeriveError::InvalidKeyPrefix(key[0]));
        }
        let public: [u8; 33] = key.try_into().expect("33 bytes");
        if !point_valid(curve, &public) {
            return Err(DeriveError::InvalidPublicKey);
        }
        let mut zero = [0u8; 32];
        Ok(XNode {
            curve,
            depth,
            parent_fingerprint,
            child_index,
            path,
            material: Secret64::from_halves(&mut zero, &mut chain_code),
            public,
            has_private: false,
        })
    }
}
