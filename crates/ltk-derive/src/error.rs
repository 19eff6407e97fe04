use thiserror::Error;

/// Failures of the derivation engine.
///
/// Everything here is recoverable input- or crypto-validation; logic bugs
/// (a node that fails to serialize after successful construction) panic
/// instead of surfacing a variant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeriveError {
    /// Entropy length is not a positive multiple of 32 bits in 128..=256.
    #[error("invalid entropy length: {0} bits")]
    InvalidEntropyLength(usize),

    /// A word is not in the BIP-39 English dictionary.
    #[error("unknown mnemonic word: {0:?}")]
    UnknownWord(String),

    /// Recomputed checksum bits disagree with the mnemonic.
    #[error("mnemonic checksum mismatch")]
    ChecksumMismatch,

    /// secp256k1 master key material was zero or out of range.
    #[error("seed produced an invalid master key")]
    InvalidMasterKey,

    /// Parent node has no usable private key or a zeroed chain code.
    #[error("parent node not usable for derivation")]
    ParentNotUsable,

    /// IL >= n or derived scalar zero; caller proceeds with the next index.
    #[error("child index {0} yields an unusable key")]
    UnusableChild(u32),

    /// Serialized key carries an unrecognized version prefix.
    #[error("unknown extended key version {0:02x?}")]
    UnknownVersion([u8; 4]),

    /// Serialized key payload is not 78 bytes.
    #[error("extended key payload has wrong length: {0}")]
    WrongPayloadLength(usize),

    /// Depth-0 key with a nonzero parent fingerprint.
    #[error("master key carries a parent fingerprint")]
    MasterWithParentFingerprint,

    /// Depth-0 key with a nonzero child index.
    #[error("master key carries a child index")]
    MasterWithChildIndex,

    /// Key byte 45 is not 0x00 (private) or 0x02/0x03 (public).
    #[error("invalid key prefix byte {0:#04x}")]
    InvalidKeyPrefix(u8),

    /// Private scalar outside [1, n-1].
    #[error("private key scalar out of range")]
    ScalarOutOfRange,

    /// Compressed public key does not decode to a curve point.
    #[error("invalid public key encoding")]
    InvalidPublicKey,

    /// Base58Check checksum failure or malformed base58.
    #[error("base58check decoding failed")]
    BadChecksum,

    /// BIP-85 request outside 1..=64 bytes.
    #[error("bip85 entropy request of {0} bytes out of range")]
    EntropyRequestOutOfRange(usize),

    /// BIP-85 node path does not start with the purpose prefix.
    #[error("node path {0:?} is not below the bip85 purpose")]
    NotBip85Purpose(String),

    /// Z85 input length not a multiple of 4 (encode) / 5 (decode).
    #[error("z85 {op} length {len} is not a multiple of {unit}")]
    Z85Length {
        op: &'static str,
        len: usize,
        unit: usize,
    },

    /// Z85 input contains a character outside the alphabet.
    #[error("invalid z85 character {0:?}")]
    Z85Char(char),

    /// A 5-character Z85 group names a value above `u32::MAX`.
    #[error("z85 group {0:?} exceeds the 32-bit block range")]
    Z85GroupOverflow(String),

    /// Hex decoding failure in a record field.
    #[error("invalid hex field: {0}")]
    BadHex(String),

    /// Argon2 parameter or hashing failure.
    #[error("argon2id failure: {0}")]
    Argon2(String),

    /// Account record blob failed structural parsing.
    #[error("malformed account record: {0}")]
    MalformedRecord(&'static str),

    /// External signer/encryptor (TPM seam) reported failure.
    #[error("key protector failure: {0}")]
    Protector(String),
}
