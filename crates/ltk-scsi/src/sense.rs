//! Sense data parsing, fixed (0x70/0x71) and descriptor (0x72/0x73) format.

use crate::error::{ScsiError, ScsiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SenseData {
    pub response_code: u8,
    pub key: u8,
    pub asc: u8,
    pub ascq: u8,
}

impl SenseData {
    /// Sense key 0 with no additional code means "no sense to report".
    pub fn is_empty(&self) -> bool {
        self.key == 0 && self.asc == 0 && self.ascq == 0
    }

    pub fn into_error(self) -> ScsiError {
        ScsiError::CheckCondition {
            key: self.key,
            asc: self.asc,
            ascq: self.ascq,
        }
    }
}

/// Parse a sense buffer. An empty buffer parses as empty sense rather
/// than an error, since transports legitimately return no autosense.
pub fn parse(buf: &[u8]) -> ScsiResult<SenseData> {
    if buf.is_empty() {
        return Ok(SenseData::default());
    }
    let response_code = buf[0] & 0x7F;
    match response_code {
        // Fixed format: key in byte 2, ASC/ASCQ in bytes 12/13.
        0x70 | 0x71 => {
            if buf.len() < 3 {
                return Err(ScsiError::truncated("fixed sense", buf.len(), 3));
            }
            let key = buf[2] & 0x0F;
            let (asc, ascq) = if buf.len() >= 14 {
                (buf[12], buf[13])
            } else {
                (0, 0)
            };
            Ok(SenseData {
                response_code,
                key,
                asc,
                ascq,
            })
        }
        // Descriptor format: key/ASC/ASCQ in bytes 1..=3.
        0x72 | 0x73 => {
            if buf.len() < 4 {
                return Err(ScsiError::truncated("descriptor sense", buf.len(), 4));
            }
            Ok(SenseData {
                response_code,
                key: buf[1] & 0x0F,
                asc: buf[2],
                ascq: buf[3],
            })
        }
        other => Err(ScsiError::malformed(
            "sense data",
            format!("unknown response code {other:#04x}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_format() {
        let mut buf = [0u8; 18];
        buf[0] = 0xF0; // valid bit set, code 0x70
        buf[2] = 0x05; // illegal request
        buf[12] = 0x24;
        buf[13] = 0x00;
        let sense = parse(&buf).unwrap();
        assert_eq!(sense.key, 0x05);
        assert_eq!((sense.asc, sense.ascq), (0x24, 0x00));
        assert!(!sense.is_empty());
    }

    #[test]
    fn fixed_format_without_additional_bytes() {
        let buf = [0x70, 0, 0x02, 0, 0, 0, 0, 0];
        let sense = parse(&buf).unwrap();
        assert_eq!(sense.key, 0x02);
        assert_eq!((sense.asc, sense.ascq), (0, 0));
    }

    #[test]
    fn descriptor_format() {
        let buf = [0x72, 0x06, 0x28, 0x01];
        let sense = parse(&buf).unwrap();
        assert_eq!(sense.key, 0x06);
        assert_eq!((sense.asc, sense.ascq), (0x28, 0x01));
    }

    #[test]
    fn empty_buffer_is_empty_sense() {
        assert!(parse(&[]).unwrap().is_empty());
    }

    #[test]
    fn unknown_response_code_rejected() {
        assert!(matches!(
            parse(&[0x40, 0, 0, 0]),
            Err(ScsiError::Malformed { .. })
        ));
    }

    #[test]
    fn check_condition_error_carries_codes() {
        let sense = SenseData {
            response_code: 0x70,
            key: 0x03,
            asc: 0x0C,
            ascq: 0x00,
        };
        assert_eq!(
            sense.into_error(),
            ScsiError::CheckCondition {
                key: 0x03,
                asc: 0x0C,
                ascq: 0x00
            }
        );
    }
}
