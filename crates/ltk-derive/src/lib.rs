//! ltk-derive: deterministic key derivation for LTO tape encryption
//!
//! Everything the drive ever encrypts with is reproducible from a single
//! BIP-39 recovery phrase:
//!
//! ```text
//! mnemonic ──PBKDF2──▶ 64-byte seed ──HMAC-SHA512──▶ SLIP-0021 master
//!   m/"LTO tape encryption"/"<global rollover>"          (global node)
//!     /"<account id>"/"<account rollover>"               (account node)
//!       /"<barcode>"/"<tape rollover>"                   (tape node)
//! ```
//!
//! Each level is proven to the operator by an Argon2id fingerprint over the
//! node's validation child ([`validation`]), and the tape node's symmetric
//! key (right half) is what `ltk-scsi` wraps and loads into the drive.
//!
//! The BIP-32/BIP-85 modules cover the elliptic-curve side of the hierarchy
//! (account signing keys and deterministic auxiliary entropy); they share
//! the same 64-byte move-only node material as SLIP-0021.

pub mod account;
pub mod bip32;
pub mod bip85;
pub mod codec;
pub mod error;
pub mod hierarchy;
pub mod kad;
pub mod material;
pub mod mnemonic;
pub mod slip21;
pub mod validation;

pub use error::DeriveError;
pub use material::Secret64;
