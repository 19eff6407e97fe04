//! 64-byte node material with enforced zeroization.
//!
//! BIP-32 and SLIP-0021 nodes share one shape: a 64-byte buffer whose left
//! half is private key material and whose right half is the chain code /
//! symmetric key. `Secret64` is move-only (no `Clone`), zeroizes on drop,
//! and supports explicit `wipe()` so a parent can be retired as soon as its
//! children exist. Reading through a stale alias after a wipe is impossible
//! because ownership moves with the buffer.

use zeroize::Zeroize;

/// Move-only 64-byte secret. Left = bytes 0..32, right = bytes 32..64.
pub struct Secret64 {
    bytes: [u8; 64],
}

impl Secret64 {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self { bytes }
    }

    /// Build from separate halves, zeroizing the inputs.
    pub fn from_halves(left: &mut [u8; 32], right: &mut [u8; 32]) -> Self {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(left);
        bytes[32..].copy_from_slice(right);
        left.zeroize();
        right.zeroize();
        Self { bytes }
    }

    /// Derivation / private key half.
    pub fn left(&self) -> &[u8; 32] {
        self.bytes[..32].try_into().expect("left half is 32 bytes")
    }

    /// Chain code / symmetric key half.
    pub fn right(&self) -> &[u8; 32] {
        self.bytes[32..].try_into().expect("right half is 32 bytes")
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.bytes
    }

    /// True once every byte is zero. A zeroed buffer is never valid derived
    /// material (HMAC-SHA512 output), so this doubles as the wiped flag.
    pub fn is_wiped(&self) -> bool {
        self.bytes.iter().all(|b| *b == 0)
    }

    /// Explicitly destroy the material. Dropping does the same; this form
    /// exists so call sites can show where a secret's life ends.
    pub fn wipe(&mut self) {
        self.bytes.zeroize();
    }
}

impl Drop for Secret64 {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for Secret64 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret64")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}
