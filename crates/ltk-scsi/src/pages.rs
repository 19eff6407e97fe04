//! Security protocol page codecs for the tape data encryption protocol
//! (0x20). Every layout is spelled out field by field; all multi-byte
//! integers are big-endian.

use crate::error::{ScsiError, ScsiResult};

/// AES-256-GCM security algorithm code.
pub const ALGORITHM_AES_256_GCM: u32 = 0x0001_0014;

/// RSA-2048 public key type in the wrapped key page.
pub const KEY_TYPE_RSA_2048: u32 = 0x0000_0000;
/// Padded size of the RSA-2048 public key field (256-byte modulus
/// followed by 256-byte exponent, each left-padded with zeros).
pub const RSA_2048_FIELD_LEN: usize = 512;

/// KAD format: unstructured binary.
pub const KAD_FORMAT_BINARY: u8 = 0x01;
/// KAD format: unstructured ASCII.
pub const KAD_FORMAT_ASCII: u8 = 0x02;

/// Key format: plain key transferred in the clear.
pub const KEY_FORMAT_PLAIN: u8 = 0x00;
/// Key format: key wrapped by the device server's public key.
pub const KEY_FORMAT_WRAPPED: u8 = 0x02;

// ---------------------------------------------------------------------------
// Data encryption capabilities page (SPIN 0x0010)
// ---------------------------------------------------------------------------

/// One algorithm descriptor from the capabilities page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionAlgorithm {
    pub index: u8,
    pub encrypt_capable: bool,
    pub decrypt_capable: bool,
    pub kad_format_capable: bool,
    /// Unauthenticated KADs must be exactly `max_unauth_kad_len` bytes.
    pub fixed_unauth_kad: bool,
    /// Authenticated KADs must be exactly `max_auth_kad_len` bytes.
    pub fixed_auth_kad: bool,
    pub max_unauth_kad_len: u16,
    pub max_auth_kad_len: u16,
    pub key_size: u16,
    pub algorithm_code: u32,
}

impl EncryptionAlgorithm {
    pub fn is_aes_256_gcm(&self) -> bool {
        self.algorithm_code == ALGORITHM_AES_256_GCM
    }
}

const CAPABILITIES_HEADER_LEN: usize = 20;
const ALGORITHM_DESCRIPTOR_LEN: usize = 24;

/// Parse the data encryption capabilities page.
///
/// Layout: [0-1] page code, [2-3] page length (bytes following), [4]
/// configuration flags, [5-19] reserved, then 24-byte algorithm
/// descriptors:
///   [0] algorithm index, [1] reserved, [2-3] descriptor length,
///   [4] capability bits (decrypt in bits 3-2, encrypt in bits 1-0,
///       0 = none, 1 = software, 2 = hardware),
///   [5] KAD bits (0x08 KAD format capable, 0x02 fixed unauth length,
///       0x01 fixed auth length),
///   [6-7] max unauthenticated KAD bytes, [8-9] max authenticated KAD
///   bytes, [10-11] key size, [12-19] reserved,
///   [20-23] security algorithm code.
pub fn parse_capabilities(buf: &[u8]) -> ScsiResult<Vec<EncryptionAlgorithm>> {
    let body = page_body(buf, 0x0010, "capabilities page")?;
    if body.len() < CAPABILITIES_HEADER_LEN - 4 {
        return Err(ScsiError::truncated(
            "capabilities page",
            body.len() + 4,
            CAPABILITIES_HEADER_LEN,
        ));
    }
    let mut algorithms = Vec::new();
    let mut rest = &body[CAPABILITIES_HEADER_LEN - 4..];
    while !rest.is_empty() {
        if rest.len() < ALGORITHM_DESCRIPTOR_LEN {
            return Err(ScsiError::truncated(
                "algorithm descriptor",
                rest.len(),
                ALGORITHM_DESCRIPTOR_LEN,
            ));
        }
        let d = &rest[..ALGORITHM_DESCRIPTOR_LEN];
        algorithms.push(EncryptionAlgorithm {
            index: d[0],
            decrypt_capable: (d[4] >> 2) & 0x03 != 0,
            encrypt_capable: d[4] & 0x03 != 0,
            kad_format_capable: d[5] & 0x08 != 0,
            fixed_unauth_kad: d[5] & 0x02 != 0,
            fixed_auth_kad: d[5] & 0x01 != 0,
            max_unauth_kad_len: u16::from_be_bytes([d[6], d[7]]),
            max_auth_kad_len: u16::from_be_bytes([d[8], d[9]]),
            key_size: u16::from_be_bytes([d[10], d[11]]),
            algorithm_code: u32::from_be_bytes([d[20], d[21], d[22], d[23]]),
        });
        rest = &rest[ALGORITHM_DESCRIPTOR_LEN..];
    }
    Ok(algorithms)
}

// ---------------------------------------------------------------------------
// Device server key wrapping public key page (SPIN 0x0031)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapPublicKey {
    /// Modulus, leading zeros stripped.
    pub modulus: Vec<u8>,
    /// Public exponent, leading zeros stripped.
    pub exponent: Vec<u8>,
}

/// Parse the key wrapping public key page.
///
/// Layout: [0-1] page code, [2-3] page length, [4-7] public key type,
/// [8-11] public key field length, [12..12+512] the RSA-2048 field:
/// 256-byte modulus then 256-byte exponent, each left-padded.
pub fn parse_wrap_public_key(buf: &[u8]) -> ScsiResult<WrapPublicKey> {
    let body = page_body(buf, 0x0031, "wrapped key page")?;
    if body.len() < 8 + RSA_2048_FIELD_LEN {
        return Err(ScsiError::truncated(
            "wrapped key page",
            body.len() + 4,
            12 + RSA_2048_FIELD_LEN,
        ));
    }
    let key_type = u32::from_be_bytes([body[0], body[1], body[2], body[3]]);
    if key_type != KEY_TYPE_RSA_2048 {
        return Err(ScsiError::UnsupportedKeyType(key_type));
    }
    let field_len = u32::from_be_bytes([body[4], body[5], body[6], body[7]]) as usize;
    if field_len != RSA_2048_FIELD_LEN {
        return Err(ScsiError::malformed(
            "wrapped key page",
            format!("public key field is {field_len} bytes, expected {RSA_2048_FIELD_LEN}"),
        ));
    }
    let field = &body[8..8 + RSA_2048_FIELD_LEN];
    let strip = |half: &[u8]| -> Vec<u8> {
        let start = half.iter().position(|&b| b != 0).unwrap_or(half.len() - 1);
        half[start..].to_vec()
    };
    Ok(WrapPublicKey {
        modulus: strip(&field[..256]),
        exponent: strip(&field[256..]),
    })
}

// ---------------------------------------------------------------------------
// KAD descriptors
// ---------------------------------------------------------------------------

/// Unauthenticated key-associated data.
pub const KAD_TYPE_UNAUTH: u8 = 0x00;
/// Authenticated key-associated data.
pub const KAD_TYPE_AUTH: u8 = 0x01;

/// One KAD descriptor: [0] type, [1] flags, [2-3] length, [4..] bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KadDescriptor {
    pub kad_type: u8,
    pub data: Vec<u8>,
}

impl KadDescriptor {
    pub fn unauthenticated(data: Vec<u8>) -> Self {
        Self {
            kad_type: KAD_TYPE_UNAUTH,
            data,
        }
    }

    pub fn authenticated(data: Vec<u8>) -> Self {
        Self {
            kad_type: KAD_TYPE_AUTH,
            data,
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.kad_type);
        out.push(0x00);
        out.extend_from_slice(&(self.data.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.data);
    }

    fn decode(buf: &[u8]) -> ScsiResult<(Self, usize)> {
        if buf.len() < 4 {
            return Err(ScsiError::truncated("KAD descriptor", buf.len(), 4));
        }
        let len = u16::from_be_bytes([buf[2], buf[3]]) as usize;
        if buf.len() < 4 + len {
            return Err(ScsiError::truncated("KAD descriptor", buf.len(), 4 + len));
        }
        Ok((
            Self {
                kad_type: buf[0],
                data: buf[4..4 + len].to_vec(),
            },
            4 + len,
        ))
    }
}

/// Split a KAD across descriptors according to the algorithm's limits.
///
/// The first `max_auth_kad_len` bytes are authenticated; any overflow
/// goes into an unauthenticated descriptor, which must precede the
/// authenticated one in the encoded list. Algorithms that demand a
/// fixed authenticated length get the authenticated part padded (or
/// truncated) to exactly that length. Overflow with no unauthenticated
/// capacity is a hard failure.
pub fn process_kad(kad: &[u8], algorithm: &EncryptionAlgorithm) -> ScsiResult<Vec<KadDescriptor>> {
    let auth_cap = algorithm.max_auth_kad_len as usize;
    let unauth_cap = algorithm.max_unauth_kad_len as usize;

    let (auth_part, overflow) = if kad.len() > auth_cap {
        kad.split_at(auth_cap)
    } else {
        (kad, &[][..])
    };
    let mut auth = auth_part.to_vec();
    if algorithm.fixed_auth_kad {
        auth.resize(auth_cap, 0x00);
    }

    let mut descriptors = Vec::new();
    if !overflow.is_empty() {
        if unauth_cap == 0 {
            return Err(ScsiError::KadTooLong {
                len: kad.len(),
                max: auth_cap,
            });
        }
        if overflow.len() > unauth_cap {
            return Err(ScsiError::KadTooLong {
                len: kad.len(),
                max: auth_cap + unauth_cap,
            });
        }
        let mut unauth = overflow.to_vec();
        if algorithm.fixed_unauth_kad {
            unauth.resize(unauth_cap, 0x00);
        }
        descriptors.push(KadDescriptor::unauthenticated(unauth));
    }
    descriptors.push(KadDescriptor::authenticated(auth));
    Ok(descriptors)
}

// ---------------------------------------------------------------------------
// Next block encryption status page (SPIN 0x0021)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockEncryptionStatus {
    NotEncrypted,
    Encrypted,
    /// Any status code other than the two the drive defines for
    /// readable blocks.
    Unknown(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextBlockStatus {
    pub status: BlockEncryptionStatus,
    pub algorithm_index: u8,
    pub kad_format: u8,
    pub kads: Vec<KadDescriptor>,
}

impl NextBlockStatus {
    /// The KAD bytes as text, only when the drive reports ASCII format.
    pub fn ascii_kads(&self) -> Vec<String> {
        if self.kad_format != KAD_FORMAT_ASCII {
            return Vec::new();
        }
        self.kads
            .iter()
            .filter_map(|k| String::from_utf8(k.data.clone()).ok())
            .collect()
    }
}

/// Parse the next block encryption status page.
///
/// Layout: [0-1] page code, [2-3] page length, [4-11] logical object
/// number, [12] compression status (bits 7-4) and encryption status
/// (bits 3-0), [13] algorithm index, [14] flags, [15] KAD format,
/// [16..] KAD descriptors.
pub fn parse_next_block_status(buf: &[u8]) -> ScsiResult<NextBlockStatus> {
    let body = page_body(buf, 0x0021, "next block status page")?;
    if body.len() < 12 {
        return Err(ScsiError::truncated(
            "next block status page",
            body.len() + 4,
            16,
        ));
    }
    let status = match body[8] & 0x0F {
        0x05 => BlockEncryptionStatus::NotEncrypted,
        0x06 => BlockEncryptionStatus::Encrypted,
        other => BlockEncryptionStatus::Unknown(other),
    };
    let mut kads = Vec::new();
    let mut rest = &body[12..];
    while !rest.is_empty() {
        let (kad, used) = KadDescriptor::decode(rest)?;
        kads.push(kad);
        rest = &rest[used..];
    }
    Ok(NextBlockStatus {
        status,
        algorithm_index: body[9],
        kad_format: body[11],
        kads,
    })
}

// ---------------------------------------------------------------------------
// Set data encryption page (SPOUT 0x0010)
// ---------------------------------------------------------------------------

/// Build the set data encryption page.
///
/// Layout: [0-1] page code, [2-3] page length, [4] scope (bits 7-5,
/// 2 = all I_T nexus) and lock bit, [5] flags, [6] encryption mode
/// (0 disable, 2 encrypt), [7] decryption mode (0 disable, 3 mixed),
/// [8] algorithm index, [9] key format, [10] KAD format, [11-17]
/// reserved, [18-19] key length, [20..] key, then KAD descriptors.
///
/// An empty `key` with both modes zero clears the drive's key and
/// disables encryption.
pub fn build_set_data_encryption(
    algorithm_index: u8,
    key_format: u8,
    kad_format: u8,
    key: &[u8],
    kads: &[KadDescriptor],
) -> Vec<u8> {
    let enable = !key.is_empty();
    let mut out = Vec::with_capacity(20 + key.len());
    out.extend_from_slice(&0x0010u16.to_be_bytes());
    out.extend_from_slice(&[0, 0]); // page length, patched below
    out.push(2 << 5); // scope: all I_T nexus
    out.push(0x00);
    out.push(if enable { 0x02 } else { 0x00 }); // encryption mode
    out.push(if enable { 0x03 } else { 0x00 }); // decryption mode: mixed
    out.push(algorithm_index);
    out.push(key_format);
    out.push(kad_format);
    out.extend_from_slice(&[0u8; 7]);
    out.extend_from_slice(&(key.len() as u16).to_be_bytes());
    out.extend_from_slice(key);
    for kad in kads {
        kad.encode(&mut out);
    }
    let page_len = (out.len() - 4) as u16;
    out[2..4].copy_from_slice(&page_len.to_be_bytes());
    out
}

/// Common page header check: page code matches, declared length fits.
/// Returns the page body (bytes after the 4-byte header, bounded by the
/// declared page length).
fn page_body<'a>(buf: &'a [u8], page: u16, what: &'static str) -> ScsiResult<&'a [u8]> {
    if buf.len() < 4 {
        return Err(ScsiError::truncated(what, buf.len(), 4));
    }
    let code = u16::from_be_bytes([buf[0], buf[1]]);
    if code != page {
        return Err(ScsiError::malformed(
            what,
            format!("page code {code:#06x}, expected {page:#06x}"),
        ));
    }
    let len = u16::from_be_bytes([buf[2], buf[3]]) as usize;
    if buf.len() < 4 + len {
        return Err(ScsiError::truncated(what, buf.len(), 4 + len));
    }
    Ok(&buf[4..4 + len])
}
