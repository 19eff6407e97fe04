use thiserror::Error;

pub type LtkResult<T> = Result<T, LtkError>;

/// Errors raised by the shared core: configuration loading and the file
/// access behind it.
///
/// Library crates carry their own specific enums (`ltk-derive::DeriveError`,
/// `ltk-scsi::ScsiError`); the CLI folds all of them into `anyhow` at the
/// application boundary.
#[derive(Debug, Error)]
pub enum LtkError {
    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
