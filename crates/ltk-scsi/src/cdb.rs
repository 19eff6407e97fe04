//! Command descriptor block builders.
//!
//! All multi-byte fields are big-endian per SPC. Builders return the
//! exact CDB bytes; `ScsiCommand` pads to the carrier size.

/// SECURITY PROTOCOL IN.
pub const OP_SECURITY_PROTOCOL_IN: u8 = 0xA2;
/// SECURITY PROTOCOL OUT.
pub const OP_SECURITY_PROTOCOL_OUT: u8 = 0xB5;
/// READ ATTRIBUTE.
pub const OP_READ_ATTRIBUTE: u8 = 0x8C;
/// INQUIRY.
pub const OP_INQUIRY: u8 = 0x12;
/// REQUEST SENSE.
pub const OP_REQUEST_SENSE: u8 = 0x03;

/// Tape data encryption security protocol.
pub const PROTOCOL_TAPE_ENCRYPTION: u8 = 0x20;

/// SPIN page: data encryption capabilities.
pub const PAGE_ENCRYPTION_CAPABILITIES: u16 = 0x0010;
/// SPIN page: next block encryption status.
pub const PAGE_NEXT_BLOCK_STATUS: u16 = 0x0021;
/// SPIN page: device server key wrapping public key.
pub const PAGE_WRAPPED_KEY_PUBLIC: u16 = 0x0031;
/// SPOUT page: set data encryption.
pub const PAGE_SET_DATA_ENCRYPTION: u16 = 0x0010;

/// READ ATTRIBUTE service action: attribute values.
pub const SA_ATTRIBUTE_VALUES: u8 = 0x00;
/// READ ATTRIBUTE service action: partition list.
pub const SA_PARTITION_LIST: u8 = 0x03;

/// VPD page: device identification.
pub const VPD_DEVICE_IDENTIFICATION: u8 = 0x83;

/// INQUIRY, standard data.
pub fn inquiry(alloc_len: u16) -> [u8; 6] {
    let len = alloc_len.to_be_bytes();
    [OP_INQUIRY, 0x00, 0x00, len[0], len[1], 0x00]
}

/// INQUIRY with EVPD set, for one vital product data page.
pub fn inquiry_vpd(page: u8, alloc_len: u16) -> [u8; 6] {
    let len = alloc_len.to_be_bytes();
    [OP_INQUIRY, 0x01, page, len[0], len[1], 0x00]
}

/// REQUEST SENSE, fixed format.
pub fn request_sense(alloc_len: u8) -> [u8; 6] {
    [OP_REQUEST_SENSE, 0x00, 0x00, 0x00, alloc_len, 0x00]
}

/// SECURITY PROTOCOL IN for one tape-encryption page.
pub fn security_protocol_in(page: u16, alloc_len: u32) -> [u8; 12] {
    security_protocol(OP_SECURITY_PROTOCOL_IN, page, alloc_len)
}

/// SECURITY PROTOCOL OUT for one tape-encryption page.
pub fn security_protocol_out(page: u16, transfer_len: u32) -> [u8; 12] {
    security_protocol(OP_SECURITY_PROTOCOL_OUT, page, transfer_len)
}

fn security_protocol(op: u8, page: u16, len: u32) -> [u8; 12] {
    let page = page.to_be_bytes();
    let len = len.to_be_bytes();
    [
        op,
        PROTOCOL_TAPE_ENCRYPTION,
        page[0],
        page[1],
        0x00,
        0x00,
        len[0],
        len[1],
        len[2],
        len[3],
        0x00,
        0x00,
    ]
}

/// READ ATTRIBUTE for one partition, starting at `first_attribute`.
pub fn read_attribute(
    service_action: u8,
    partition: u8,
    first_attribute: u16,
    alloc_len: u32,
) -> [u8; 16] {
    let attr = first_attribute.to_be_bytes();
    let len = alloc_len.to_be_bytes();
    [
        OP_READ_ATTRIBUTE,
        service_action & 0x1F,
        0x00,
        0x00,
        0x00,
        0x00,
        0x00,
        partition,
        attr[0],
        attr[1],
        len[0],
        len[1],
        len[2],
        len[3],
        0x00,
        0x00,
    ]
}
