//! ltk-scsi: tape drive encryption control over SCSI
//!
//! # Overview
//! - `command`: fixed-size command/completion carriers and the `DeviceIo` seam
//! - `cdb`: command descriptor block builders (INQUIRY, SPIN/SPOUT, READ ATTRIBUTE)
//! - `sense`: fixed and descriptor sense data parsing
//! - `pages`: security protocol page codecs (capabilities, wrap key, status, set-key)
//! - `mam`: medium auxiliary memory attribute parsing
//! - `wrap`: RSA-OAEP key wrapping bound to drive-reported descriptors
//! - `drive`: the retry engine and high-level drive operations

pub mod cdb;
pub mod command;
pub mod drive;
pub mod error;
pub mod mam;
pub mod pages;
pub mod sense;
pub mod wrap;

pub use command::{DataDirection, DeviceIo, ScsiCommand, ScsiCompletion};
pub use drive::TapeDrive;
pub use error::{ScsiError, ScsiResult};
