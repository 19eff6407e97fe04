//! BIP-39 mnemonic codec: entropy ↔ word indices ↔ phrase ↔ binary seed.
//!
//! The operator keys in recovery words by hand, so the engine works on word
//! *index* arrays (what the entry form binds to) rather than only parsed
//! phrases, and every failure is a distinct, reportable reason. The English
//! dictionary comes from the `bip39` crate; the bit slicing and checksum
//! are implemented here.

use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256, Sha512};
use std::collections::HashMap;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;
use zeroize::{Zeroize, Zeroizing};

use crate::error::DeriveError;
use crate::material::Secret64;

/// Number of words in the BIP-39 dictionary; indices are in [0, 2047].
pub const DICTIONARY_SIZE: u16 = 2048;

/// PBKDF2-HMAC-SHA512 iteration count fixed by BIP-39.
const SEED_ITERATIONS: u32 = 2048;

fn word_list() -> &'static [&'static str; 2048] {
    bip39::Language::English.word_list()
}

fn word_index_map() -> &'static HashMap<&'static str, u16> {
    static MAP: OnceLock<HashMap<&'static str, u16>> = OnceLock::new();
    MAP.get_or_init(|| {
        word_list()
            .iter()
            .enumerate()
            .map(|(i, w)| (*w, i as u16))
            .collect()
    })
}

fn valid_entropy_bits(bits: usize) -> bool {
    bits != 0 && bits % 32 == 0 && (128..=256).contains(&bits)
}

/// Convert entropy bytes to BIP-39 word indices.
///
/// Entropy || leading (bits/32) checksum bits of SHA-256(entropy), sliced
/// into 11-bit groups MSB-first.
pub fn entropy_to_words(entropy: &[u8]) -> Result<Vec<u16>, DeriveError> {
    let ent_bits = entropy.len() * 8;
    if !valid_entropy_bits(ent_bits) {
        return Err(DeriveError::InvalidEntropyLength(ent_bits));
    }
    let cs_bits = ent_bits / 32;
    let checksum = Sha256::digest(entropy)[0];

    let mut words = Vec::with_capacity((ent_bits + cs_bits) / 11);
    let mut acc: u32 = 0;
    let mut nbits = 0usize;
    let mut take = |acc: &mut u32, nbits: &mut usize, words: &mut Vec<u16>| {
        while *nbits >= 11 {
            words.push(((*acc >> (*nbits - 11)) & 0x7FF) as u16);
            *nbits -= 11;
            *acc &= (1u32 << *nbits) - 1;
        }
    };
    for &byte in entropy {
        acc = (acc << 8) | u32::from(byte);
        nbits += 8;
        take(&mut acc, &mut nbits, &mut words);
    }
    let cs_value = u32::from(checksum >> (8 - cs_bits));
    acc = (acc << cs_bits) | cs_value;
    nbits += cs_bits;
    take(&mut acc, &mut nbits, &mut words);
    debug_assert_eq!(nbits, 0, "entropy+checksum must divide into 11-bit words");
    Ok(words)
}

/// Recover entropy from word indices, verifying the checksum.
pub fn words_to_entropy(words: &[u16]) -> Result<Vec<u8>, DeriveError> {
    let total_bits = words.len() * 11;
    if total_bits % 33 != 0 {
        return Err(DeriveError::InvalidEntropyLength(total_bits));
    }
    let cs_bits = total_bits / 33;
    let ent_bits = total_bits - cs_bits;
    if !valid_entropy_bits(ent_bits) {
        return Err(DeriveError::InvalidEntropyLength(ent_bits));
    }

    let mut bytes = Vec::with_capacity(total_bits / 8 + 1);
    let mut acc: u32 = 0;
    let mut nbits = 0usize;
    for &w in words {
        if w >= DICTIONARY_SIZE {
            return Err(DeriveError::UnknownWord(format!("#{w}")));
        }
        acc = (acc << 11) | u32::from(w);
        nbits += 11;
        while nbits >= 8 {
            bytes.push(((acc >> (nbits - 8)) & 0xFF) as u8);
            nbits -= 8;
            acc &= (1u32 << nbits) - 1;
        }
    }

    // For 24 words the checksum is the trailing full byte; otherwise it is
    // the nbits (== cs_bits) left in the accumulator.
    let (entropy, actual_cs) = if cs_bits == 8 {
        debug_assert_eq!(nbits, 0);
        let cs = *bytes.last().expect("at least one byte");
        (&bytes[..bytes.len() - 1], cs)
    } else {
        debug_assert_eq!(nbits, cs_bits);
        (&bytes[..], (acc & ((1 << cs_bits) - 1)) as u8)
    };

    let expected_cs = if cs_bits == 8 {
        Sha256::digest(entropy)[0]
    } else {
        Sha256::digest(entropy)[0] >> (8 - cs_bits)
    };
    if actual_cs != expected_cs {
        bytes.zeroize();
        return Err(DeriveError::ChecksumMismatch);
    }
    let out = entropy.to_vec();
    bytes.zeroize();
    Ok(out)
}

/// Look up each whitespace-separated word in the dictionary.
pub fn phrase_to_words(phrase: &str) -> Result<Vec<u16>, DeriveError> {
    phrase
        .split_whitespace()
        .map(|w| {
            word_index_map()
                .get(w)
                .copied()
                .ok_or_else(|| DeriveError::UnknownWord(w.to_string()))
        })
        .collect()
}

/// Render word indices as a space-joined phrase.
pub fn words_to_phrase(words: &[u16]) -> Result<String, DeriveError> {
    let mut out = String::new();
    for (i, &w) in words.iter().enumerate() {
        if w >= DICTIONARY_SIZE {
            return Err(DeriveError::UnknownWord(format!("#{w}")));
        }
        if i > 0 {
            out.push(' ');
        }
        out.push_str(word_list()[w as usize]);
    }
    Ok(out)
}

/// Generate a fresh phrase from OS randomness. 12, 15, 18, 21 or 24 words.
pub fn generate_phrase(word_count: usize) -> Result<String, DeriveError> {
    let ent_bits = word_count * 32 / 3;
    if word_count % 3 != 0 || !valid_entropy_bits(ent_bits) {
        return Err(DeriveError::InvalidEntropyLength(ent_bits));
    }
    let mut entropy = Zeroizing::new(vec![0u8; ent_bits / 8]);
    rand::thread_rng().fill_bytes(&mut entropy);
    let words = entropy_to_words(&entropy)?;
    words_to_phrase(&words)
}

/// Derive the 64-byte binary seed from a phrase and passphrase.
///
/// PBKDF2-HMAC-SHA512 over NFKD(phrase) with salt "mnemonic" ||
/// NFKD(passphrase), 2048 iterations. The phrase is validated first so a
/// typo cannot silently become a different key hierarchy.
pub fn seed_from_phrase(
    phrase: &str,
    passphrase: &SecretString,
) -> Result<Secret64, DeriveError> {
    let words = phrase_to_words(phrase)?;
    let mut entropy = words_to_entropy(&words)?;
    entropy.zeroize();

    let password = Zeroizing::new(phrase.nfkd().collect::<String>());
    let mut salt = Zeroizing::new(String::from("mnemonic"));
    salt.push_str(&passphrase.expose_secret().nfkd().collect::<String>());

    let mut seed = [0u8; 64];
    pbkdf2::pbkdf2_hmac::<Sha512>(
        password.as_bytes(),
        salt.as_bytes(),
        SEED_ITERATIONS,
        &mut seed,
    );
    let out = Secret64::from_bytes(seed);
    seed.zeroize();
    Ok(out)
}
