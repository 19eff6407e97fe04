//! Text codecs: Z85, Base58Check, CRC32.
//!
//! Z85 is implemented here (ZeroMQ RFC 32/Z85): 4-byte blocks become 5
//! characters from an 85-symbol alphabet, most significant digit first.
//! The fingerprint engine feeds Z85 strings to Argon2id and renders its
//! output the same way, so the alphabet must never change.

use crate::error::DeriveError;

const Z85_ALPHABET: &[u8; 85] =
    b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ.-:+=^!/*?&<>()[]{}@%$#";

/// One Z85 symbol for a value already reduced mod 85. Used to render
/// rollover counters as single KAD characters.
pub fn z85_char(value: u64) -> char {
    Z85_ALPHABET[(value % 85) as usize] as char
}

/// Z85-encode `data`; length must be a multiple of 4.
pub fn z85_encode(data: &[u8]) -> Result<String, DeriveError> {
    if data.len() % 4 != 0 {
        return Err(DeriveError::Z85Length {
            op: "encode",
            len: data.len(),
            unit: 4,
        });
    }
    let mut out = String::with_capacity(data.len() / 4 * 5);
    for block in data.chunks_exact(4) {
        let mut value = u32::from_be_bytes(block.try_into().expect("4-byte block"));
        let mut digits = [0u8; 5];
        for d in digits.iter_mut().rev() {
            *d = (value % 85) as u8;
            value /= 85;
        }
        for d in digits {
            out.push(Z85_ALPHABET[d as usize] as char);
        }
    }
    Ok(out)
}

/// Decode a Z85 string; length must be a multiple of 5.
pub fn z85_decode(text: &str) -> Result<Vec<u8>, DeriveError> {
    if text.len() % 5 != 0 {
        return Err(DeriveError::Z85Length {
            op: "decode",
            len: text.len(),
            unit: 5,
        });
    }
    let mut out = Vec::with_capacity(text.len() / 5 * 4);
    let mut chars = text.chars();
    for _ in 0..text.len() / 5 {
        // 85^5 - 1 exceeds u32::MAX, so a syntactically valid group can
        // still name a value no 4-byte block has.
        let mut value: u64 = 0;
        let mut group = String::with_capacity(5);
        for _ in 0..5 {
            let c = chars.next().expect("length checked");
            let digit = Z85_ALPHABET
                .iter()
                .position(|&a| a as char == c)
                .ok_or(DeriveError::Z85Char(c))?;
            value = value * 85 + digit as u64;
            group.push(c);
        }
        let value =
            u32::try_from(value).map_err(|_| DeriveError::Z85GroupOverflow(group))?;
        out.extend_from_slice(&value.to_be_bytes());
    }
    Ok(out)
}

/// Base58Check encode (4-byte double-SHA256 checksum appended).
pub fn base58check_encode(payload: &[u8]) -> String {
    bs58::encode(payload).with_check().into_string()
}

/// Base58Check decode; checksum or alphabet failure is `BadChecksum`.
pub fn base58check_decode(text: &str) -> Result<Vec<u8>, DeriveError> {
    bs58::decode(text)
        .with_check(None)
        .into_vec()
        .map_err(|_| DeriveError::BadChecksum)
}

/// CRC32 (IEEE) of `data`.
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Z85 rendering of CRC32(data) — the default account-id hash in the KAD.
pub fn z85_crc32(data: &[u8]) -> String {
    z85_encode(&crc32(data).to_be_bytes()).expect("4 bytes encode cleanly")
}
