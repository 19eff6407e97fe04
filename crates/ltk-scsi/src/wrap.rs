//! RSA key wrapping for the drive's wrapped-key format.
//!
//! The drive expects RSAES-OAEP-SHA256 where the OAEP label is the raw
//! bytes of two wrapped key descriptors (device identifier, then key
//! length). The `rsa` crate's OAEP padding only accepts string labels,
//! so the EME-OAEP encoding is done here over the raw RSA primitive.

use rand::rngs::OsRng;
use rand::RngCore;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::{ScsiError, ScsiResult};
use crate::pages::WrapPublicKey;

/// Wrapped key descriptor type: device server identifier.
pub const DESCRIPTOR_DEVICE_ID: u8 = 0x00;
/// Wrapped key descriptor type: wrapped key length.
pub const DESCRIPTOR_KEY_LENGTH: u8 = 0x01;

/// One wrapped key descriptor: [0] type, [1] reserved, [2-3] length,
/// [4..] value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKeyDescriptor {
    pub descriptor_type: u8,
    pub value: Vec<u8>,
}

impl WrappedKeyDescriptor {
    pub fn device_id(id: Vec<u8>) -> Self {
        Self {
            descriptor_type: DESCRIPTOR_DEVICE_ID,
            value: id,
        }
    }

    pub fn key_length(bits: u16) -> Self {
        Self {
            descriptor_type: DESCRIPTOR_KEY_LENGTH,
            value: bits.to_be_bytes().to_vec(),
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.descriptor_type);
        out.push(0x00);
        out.extend_from_slice(&(self.value.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.value);
    }
}

/// OAEP label bound to this drive and key size: the device identifier
/// descriptor followed by the key length descriptor, raw bytes in that
/// fixed order.
pub fn build_wrap_label(device_id: &[u8], key_bits: u16) -> Vec<u8> {
    let mut label = Vec::with_capacity(8 + device_id.len());
    WrappedKeyDescriptor::device_id(device_id.to_vec()).encode(&mut label);
    WrappedKeyDescriptor::key_length(key_bits).encode(&mut label);
    label
}

/// RSAES-OAEP-SHA256 encrypt `key` under the drive's public key with
/// `label` bound into the padding.
pub fn wrap_key(public: &WrapPublicKey, key: &[u8], label: &[u8]) -> ScsiResult<Vec<u8>> {
    let rsa_key = RsaPublicKey::new(
        BigUint::from_bytes_be(&public.modulus),
        BigUint::from_bytes_be(&public.exponent),
    )
    .map_err(|e| ScsiError::Wrap(e.to_string()))?;

    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    let result = wrap_key_with_seed(&rsa_key, key, label, &seed);
    seed.zeroize();
    result
}

fn wrap_key_with_seed(
    rsa_key: &RsaPublicKey,
    key: &[u8],
    label: &[u8],
    seed: &[u8; 32],
) -> ScsiResult<Vec<u8>> {
    let k = rsa_key.size();
    let mut em = oaep_encode(key, label, seed, k)?;
    let c = rsa::hazmat::rsa_encrypt(rsa_key, &BigUint::from_bytes_be(&em))
        .map_err(|e| ScsiError::Wrap(e.to_string()))?;
    em.zeroize();

    // Left-pad the integer back to the modulus size.
    let mut out = vec![0u8; k];
    let bytes = c.to_bytes_be();
    out[k - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}

/// EME-OAEP encoding per RFC 8017 §7.1.1 with SHA-256 and MGF1-SHA-256:
/// EM = 0x00 || maskedSeed || maskedDB where
/// DB = lHash || PS || 0x01 || M.
fn oaep_encode(msg: &[u8], label: &[u8], seed: &[u8; 32], k: usize) -> ScsiResult<Vec<u8>> {
    const H_LEN: usize = 32;
    if msg.len() + 2 * H_LEN + 2 > k {
        return Err(ScsiError::Wrap(format!(
            "message of {} bytes too long for {k}-byte modulus",
            msg.len()
        )));
    }

    let db_len = k - H_LEN - 1;
    let mut db = vec![0u8; db_len];
    db[..H_LEN].copy_from_slice(&Sha256::digest(label));
    db[db_len - msg.len() - 1] = 0x01;
    db[db_len - msg.len()..].copy_from_slice(msg);

    let db_mask = mgf1(seed, db_len);
    for (b, m) in db.iter_mut().zip(&db_mask) {
        *b ^= m;
    }
    let seed_mask = mgf1(&db, H_LEN);
    let mut masked_seed = *seed;
    for (b, m) in masked_seed.iter_mut().zip(&seed_mask) {
        *b ^= m;
    }

    let mut em = Vec::with_capacity(k);
    em.push(0x00);
    em.extend_from_slice(&masked_seed);
    em.append(&mut db);
    masked_seed.zeroize();
    Ok(em)
}

/// MGF1-SHA-256: concatenated SHA256(seed || counter) blocks.
fn mgf1(seed: &[u8], len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(len.div_ceil(32) * 32);
    let mut counter = 0u32;
    while out.len() < len {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        hasher.update(counter.to_be_bytes());
        out.extend_from_slice(&hasher.finalize());
        counter += 1;
    }
    out.truncate(len);
    out
}
