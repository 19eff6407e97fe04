//! SCSI layer error taxonomy.

use thiserror::Error;

pub type ScsiResult<T> = Result<T, ScsiError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScsiError {
    /// The transport itself failed (ioctl error, device gone).
    #[error("transport error: {0}")]
    Transport(String),

    /// The drive reported a check condition and sense data resolved it.
    #[error("check condition: sense key {key:#x}, asc {asc:#02x}, ascq {ascq:#02x}")]
    CheckCondition { key: u8, asc: u8, ascq: u8 },

    /// Non-GOOD completion that the sense retry loop could not resolve.
    #[error("command failed with status {status:#x} and no usable sense data")]
    Unresolved { status: u8 },

    /// A response was shorter than its own headers claim.
    #[error("truncated {what} response: {got} of {need} bytes")]
    Truncated {
        what: &'static str,
        got: usize,
        need: usize,
    },

    #[error("malformed {what}: {detail}")]
    Malformed {
        what: &'static str,
        detail: String,
    },

    /// Key-associated data exceeds the drive's limit with no way to split it.
    #[error("key-associated data is {len} bytes but the drive accepts at most {max}")]
    KadTooLong { len: usize, max: usize },

    #[error("drive does not support the required algorithm (code {0:#010x})")]
    UnsupportedAlgorithm(u32),

    #[error("unsupported public key type {0:#010x}")]
    UnsupportedKeyType(u32),

    #[error("key wrap failed: {0}")]
    Wrap(String),
}
