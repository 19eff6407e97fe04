//! Medium auxiliary memory (MAM) attribute parsing.
//!
//! READ ATTRIBUTE returns a 4-byte available-data header followed by
//! attribute entries. Drives return attributes sorted by identifier;
//! parsing stops at the first non-increasing identifier instead of
//! failing, so trailing garbage after the real list is ignored.

use crate::error::{ScsiError, ScsiResult};

/// Medium manufacturer, ASCII.
pub const ATTR_MEDIUM_MANUFACTURER: u16 = 0x0400;
/// Medium serial number, ASCII.
pub const ATTR_MEDIUM_SERIAL: u16 = 0x0401;
/// Barcode, ASCII.
pub const ATTR_BARCODE: u16 = 0x0806;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MamFormat {
    Binary,
    Ascii,
    Text,
    Reserved,
}

impl MamFormat {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0x00 => MamFormat::Binary,
            0x01 => MamFormat::Ascii,
            0x02 => MamFormat::Text,
            _ => MamFormat::Reserved,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMamAttribute {
    pub id: u16,
    pub format: MamFormat,
    pub read_only: bool,
    pub payload: Vec<u8>,
}

impl RawMamAttribute {
    /// Payload as trimmed ASCII, for the text-format attributes.
    pub fn as_text(&self) -> Option<String> {
        match self.format {
            MamFormat::Ascii | MamFormat::Text => std::str::from_utf8(&self.payload)
                .ok()
                .map(|s| s.trim_end_matches(['\0', ' ']).to_string()),
            _ => None,
        }
    }
}

/// Parse a READ ATTRIBUTE (attribute values) response.
pub fn parse_attributes(buf: &[u8]) -> ScsiResult<Vec<RawMamAttribute>> {
    if buf.len() < 4 {
        return Err(ScsiError::truncated("attribute list", buf.len(), 4));
    }
    let available = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    let end = buf.len().min(4 + available);
    let mut attrs = Vec::new();
    let mut offset = 4;
    let mut last_id: Option<u16> = None;

    while offset + 5 <= end {
        let id = u16::from_be_bytes([buf[offset], buf[offset + 1]]);
        if let Some(last) = last_id {
            if id <= last {
                break;
            }
        }
        let flags = buf[offset + 2];
        let len = u16::from_be_bytes([buf[offset + 3], buf[offset + 4]]) as usize;
        let payload_start = offset + 5;
        if payload_start + len > end {
            return Err(ScsiError::truncated(
                "attribute payload",
                end - payload_start,
                len,
            ));
        }
        attrs.push(RawMamAttribute {
            id,
            format: MamFormat::from_bits(flags),
            read_only: flags & 0x80 != 0,
            payload: buf[payload_start..payload_start + len].to_vec(),
        });
        last_id = Some(id);
        offset = payload_start + len;
    }
    Ok(attrs)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionList {
    pub first_partition: u8,
    pub partition_count: u8,
}

/// Parse a READ ATTRIBUTE (partition list) response.
pub fn parse_partition_list(buf: &[u8]) -> ScsiResult<PartitionList> {
    if buf.len() < 2 {
        return Err(ScsiError::truncated("partition list", buf.len(), 2));
    }
    Ok(PartitionList {
        first_partition: buf[0],
        partition_count: buf[1],
    })
}
