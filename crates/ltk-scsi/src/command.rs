//! Fixed-size SCSI command carriers and the device transport seam.
//!
//! Buffer sizes follow the pass-through limits used by tape drivers:
//! a 32-byte CDB area (covers every 6/10/12/16-byte CDB used here), a
//! 32-byte sense area, and a 65280-byte data area (the largest transfer
//! length a drive will accept for a security protocol page).

use std::time::Duration;

use crate::error::{ScsiError, ScsiResult};

pub const CDB_SIZE: usize = 32;
pub const SENSE_SIZE: usize = 32;
pub const DATA_SIZE: usize = 65280;

/// Per-command transport timeout handed to the pass-through layer.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// GOOD completion status.
pub const STATUS_GOOD: u8 = 0x00;
/// CHECK CONDITION completion status.
pub const STATUS_CHECK_CONDITION: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDirection {
    None,
    ToDevice,
    FromDevice,
}

/// One pass-through command: CDB plus a data buffer sized for the worst
/// case. The buffer is boxed so commands stay cheap to move.
pub struct ScsiCommand {
    cdb: [u8; CDB_SIZE],
    cdb_len: usize,
    direction: DataDirection,
    data: Box<[u8; DATA_SIZE]>,
    data_len: usize,
    timeout: Duration,
}

impl ScsiCommand {
    /// A command that transfers no data (TEST UNIT READY and friends).
    pub fn control(cdb: &[u8]) -> Self {
        Self::new(cdb, DataDirection::None, &[], 0)
    }

    /// A device-to-host command expecting up to `alloc_len` bytes back.
    pub fn read(cdb: &[u8], alloc_len: usize) -> Self {
        Self::new(cdb, DataDirection::FromDevice, &[], alloc_len)
    }

    /// A host-to-device command carrying `payload`.
    pub fn write(cdb: &[u8], payload: &[u8]) -> Self {
        Self::new(cdb, DataDirection::ToDevice, payload, payload.len())
    }

    fn new(cdb: &[u8], direction: DataDirection, payload: &[u8], data_len: usize) -> Self {
        assert!(cdb.len() <= CDB_SIZE, "CDB longer than {CDB_SIZE} bytes");
        assert!(data_len <= DATA_SIZE, "transfer longer than {DATA_SIZE} bytes");
        assert!(payload.len() <= data_len);
        let mut cdb_buf = [0u8; CDB_SIZE];
        cdb_buf[..cdb.len()].copy_from_slice(cdb);
        let mut data = Box::new([0u8; DATA_SIZE]);
        data[..payload.len()].copy_from_slice(payload);
        Self {
            cdb: cdb_buf,
            cdb_len: cdb.len(),
            direction,
            data,
            data_len,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn cdb(&self) -> &[u8] {
        &self.cdb[..self.cdb_len]
    }

    pub fn direction(&self) -> DataDirection {
        self.direction
    }

    /// Requested transfer length in bytes.
    pub fn data_len(&self) -> usize {
        self.data_len
    }

    /// Outbound payload, or the area a FromDevice transfer fills in.
    pub fn data(&self) -> &[u8] {
        &self.data[..self.data_len]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data[..self.data_len]
    }
}

impl std::fmt::Debug for ScsiCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScsiCommand")
            .field("cdb", &hex::encode(self.cdb()))
            .field("direction", &self.direction)
            .field("data_len", &self.data_len)
            .finish()
    }
}

/// Completion for one command: status byte, any autosense the transport
/// captured, and how many data bytes actually moved.
#[derive(Debug, Clone)]
pub struct ScsiCompletion {
    pub status: u8,
    pub sense: [u8; SENSE_SIZE],
    pub sense_len: usize,
    pub transferred: usize,
}

impl ScsiCompletion {
    pub fn good(transferred: usize) -> Self {
        Self {
            status: STATUS_GOOD,
            sense: [0u8; SENSE_SIZE],
            sense_len: 0,
            transferred,
        }
    }

    pub fn sense_data(&self) -> &[u8] {
        &self.sense[..self.sense_len]
    }
}

/// Transport seam. Production backends issue the pass-through ioctl for
/// the platform; tests script completions.
pub trait DeviceIo {
    /// Issue one command. For FromDevice transfers the implementation
    /// writes into `cmd.data_mut()`. A transport-level failure is an
    /// `Err`; a drive-level failure is an `Ok` completion with a
    /// non-GOOD status.
    fn execute(&mut self, cmd: &mut ScsiCommand) -> ScsiResult<ScsiCompletion>;
}

impl ScsiError {
    pub(crate) fn truncated(what: &'static str, got: usize, need: usize) -> Self {
        ScsiError::Truncated { what, got, need }
    }

    pub(crate) fn malformed(what: &'static str, detail: impl Into<String>) -> Self {
        ScsiError::Malformed {
            what,
            detail: detail.into(),
        }
    }
}
