//! High-level drive operations over a `DeviceIo` transport.
//!
//! One command is in flight per handle at a time; the drive object owns
//! its transport for the duration of a batch of commands and is dropped
//! (closing the handle) on every exit path.

use tracing::debug;

use crate::cdb;
use crate::command::{DeviceIo, ScsiCommand, DATA_SIZE, SENSE_SIZE, STATUS_GOOD};
use crate::error::{ScsiError, ScsiResult};
use crate::mam::{self, PartitionList, RawMamAttribute};
use crate::pages::{
    self, EncryptionAlgorithm, KadDescriptor, NextBlockStatus, WrapPublicKey,
    KAD_FORMAT_ASCII, KEY_FORMAT_PLAIN, KEY_FORMAT_WRAPPED,
};
use crate::sense;
use crate::wrap;

/// Non-GOOD status triggers REQUEST SENSE this many times before the
/// failure is reported unresolved.
const SENSE_RETRY_LIMIT: usize = 10;

/// AES-256 key length in bits, for the wrap label.
const WRAPPED_KEY_BITS: u16 = 256;

/// Everything known about the currently loaded cartridge. Replaced
/// wholesale each time cartridge memory is (re)read; none of it is
/// sensitive, so no explicit zeroing.
#[derive(Debug, Clone, Default)]
pub struct CurrentTape {
    pub barcode: Option<String>,
    pub partitions: Option<PartitionList>,
    pub attributes: Vec<RawMamAttribute>,
    pub next_block: Option<NextBlockStatus>,
}

/// A tape drive plus the state discovered from it.
pub struct TapeDrive<D: DeviceIo> {
    device: D,
    logical_unit_id: Vec<u8>,
    capabilities: Vec<EncryptionAlgorithm>,
    wrap_public_key: Option<WrapPublicKey>,
    wrap_label: Option<Vec<u8>>,
    current_tape: CurrentTape,
}

impl<D: DeviceIo> TapeDrive<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            logical_unit_id: Vec::new(),
            capabilities: Vec::new(),
            wrap_public_key: None,
            wrap_label: None,
            current_tape: CurrentTape::default(),
        }
    }

    pub fn logical_unit_id(&self) -> &[u8] {
        &self.logical_unit_id
    }

    pub fn capabilities(&self) -> &[EncryptionAlgorithm] {
        &self.capabilities
    }

    pub fn current_tape(&self) -> &CurrentTape {
        &self.current_tape
    }

    // -----------------------------------------------------------------------
    // command engine
    // -----------------------------------------------------------------------

    /// Issue one command. GOOD returns the transferred data; non-GOOD
    /// enters the sense retrieval loop: REQUEST SENSE up to ten times,
    /// stopping at the first nonzero sense key. All-zero sense after
    /// ten attempts leaves the original failure unresolved.
    fn issue(&mut self, mut cmd: ScsiCommand) -> ScsiResult<Vec<u8>> {
        let completion = self.device.execute(&mut cmd)?;
        if completion.status == STATUS_GOOD {
            let got = completion.transferred.min(cmd.data_len());
            return Ok(cmd.data()[..got].to_vec());
        }
        debug!(
            status = completion.status,
            cdb = %hex::encode(cmd.cdb()),
            "command failed, retrieving sense"
        );

        // Autosense from the failed command resolves without a round trip.
        if let Ok(autosense) = sense::parse(completion.sense_data()) {
            if !autosense.is_empty() {
                return Err(autosense.into_error());
            }
        }

        for attempt in 1..=SENSE_RETRY_LIMIT {
            let mut sense_cmd =
                ScsiCommand::read(&cdb::request_sense(SENSE_SIZE as u8), SENSE_SIZE);
            let sense_completion = self.device.execute(&mut sense_cmd)?;
            let got = sense_completion.transferred.min(SENSE_SIZE);
            let data = sense::parse(&sense_cmd.data()[..got])?;
            if data.key != 0 {
                debug!(attempt, key = data.key, asc = data.asc, "sense resolved");
                return Err(data.into_error());
            }
        }
        Err(ScsiError::Unresolved {
            status: completion.status,
        })
    }

    // -----------------------------------------------------------------------
    // operations
    // -----------------------------------------------------------------------

    /// INQUIRY for the device identification VPD page; records and
    /// returns the logical unit identifier.
    pub fn inquire_device_identifiers(&mut self) -> ScsiResult<Vec<u8>> {
        let cmd = ScsiCommand::read(
            &cdb::inquiry_vpd(cdb::VPD_DEVICE_IDENTIFICATION, 255),
            255,
        );
        let data = self.issue(cmd)?;
        let id = parse_logical_unit_id(&data)?;
        debug!(id = %hex::encode(&id), "logical unit identifier");
        self.logical_unit_id = id.clone();
        Ok(id)
    }

    /// Read the partition list and every partition's attributes, then
    /// replace `CurrentTape` wholesale.
    pub fn read_cartridge_memory(&mut self) -> ScsiResult<&CurrentTape> {
        let cmd = ScsiCommand::read(
            &cdb::read_attribute(cdb::SA_PARTITION_LIST, 0, 0, 64),
            64,
        );
        let data = self.issue(cmd)?;
        let partitions = mam::parse_partition_list(&data)?;

        let mut attributes = Vec::new();
        let first = partitions.first_partition;
        for partition in first..first.saturating_add(partitions.partition_count) {
            let cmd = ScsiCommand::read(
                &cdb::read_attribute(cdb::SA_ATTRIBUTE_VALUES, partition, 0, DATA_SIZE as u32),
                DATA_SIZE,
            );
            let data = self.issue(cmd)?;
            attributes.extend(mam::parse_attributes(&data)?);
        }

        let barcode = attributes
            .iter()
            .find(|a| a.id == mam::ATTR_BARCODE)
            .and_then(RawMamAttribute::as_text);
        debug!(
            barcode = barcode.as_deref().unwrap_or("<none>"),
            attributes = attributes.len(),
            "cartridge memory read"
        );
        self.current_tape = CurrentTape {
            barcode,
            partitions: Some(partitions),
            attributes,
            next_block: None,
        };
        Ok(&self.current_tape)
    }

    /// SPIN capabilities page; records and returns the algorithm list.
    pub fn query_encryption_capabilities(&mut self) -> ScsiResult<&[EncryptionAlgorithm]> {
        let cmd = ScsiCommand::read(
            &cdb::security_protocol_in(cdb::PAGE_ENCRYPTION_CAPABILITIES, DATA_SIZE as u32),
            DATA_SIZE,
        );
        let data = self.issue(cmd)?;
        self.capabilities = pages::parse_capabilities(&data)?;
        debug!(algorithms = self.capabilities.len(), "encryption capabilities");
        Ok(&self.capabilities)
    }

    /// SPIN wrapped public key page; records the key and derives the
    /// OAEP label from the logical unit identifier and the key size.
    /// Device identifiers must have been inquired first.
    pub fn query_key_wrap_public_key(&mut self) -> ScsiResult<&WrapPublicKey> {
        if self.logical_unit_id.is_empty() {
            return Err(ScsiError::malformed(
                "wrap label",
                "device identifiers not inquired yet",
            ));
        }
        let cmd = ScsiCommand::read(
            &cdb::security_protocol_in(cdb::PAGE_WRAPPED_KEY_PUBLIC, DATA_SIZE as u32),
            DATA_SIZE,
        );
        let data = self.issue(cmd)?;
        let key = pages::parse_wrap_public_key(&data)?;
        self.wrap_label = Some(wrap::build_wrap_label(&self.logical_unit_id, WRAPPED_KEY_BITS));
        Ok(&*self.wrap_public_key.insert(key))
    }

    /// SPIN next block status page.
    pub fn query_next_block_encryption_status(&mut self) -> ScsiResult<NextBlockStatus> {
        let cmd = ScsiCommand::read(
            &cdb::security_protocol_in(cdb::PAGE_NEXT_BLOCK_STATUS, DATA_SIZE as u32),
            DATA_SIZE,
        );
        let data = self.issue(cmd)?;
        let status = pages::parse_next_block_status(&data)?;
        self.current_tape.next_block = Some(status.clone());
        Ok(status)
    }

    /// Wrap a raw symmetric key under the drive's public key with the
    /// label bound to this drive.
    pub fn wrap_key(&self, key: &[u8]) -> ScsiResult<Vec<u8>> {
        let (public, label) = self
            .wrap_public_key
            .as_ref()
            .zip(self.wrap_label.as_ref())
            .ok_or_else(|| ScsiError::malformed("key wrap", "public key not queried yet"))?;
        wrap::wrap_key(public, key, label)
    }

    /// SPOUT the set data encryption page. `None` for both clears the
    /// key and disables encryption.
    pub fn set_data_encryption(
        &mut self,
        key: Option<(&[u8], u8)>,
        kads: &[KadDescriptor],
    ) -> ScsiResult<()> {
        let algorithm_index = self.aes_algorithm()?.index;
        let (key_bytes, key_format) = key.unwrap_or((&[], KEY_FORMAT_PLAIN));
        let kad_format = if kads.is_empty() { 0 } else { KAD_FORMAT_ASCII };
        let page = pages::build_set_data_encryption(
            algorithm_index,
            key_format,
            kad_format,
            key_bytes,
            kads,
        );
        let cmd = ScsiCommand::write(
            &cdb::security_protocol_out(cdb::PAGE_SET_DATA_ENCRYPTION, page.len() as u32),
            &page,
        );
        self.issue(cmd)?;
        Ok(())
    }

    /// Wrap the key, split the KAD, and load both into the drive.
    pub fn enable_encryption(&mut self, key: &[u8], kad: &[u8]) -> ScsiResult<()> {
        let kads = pages::process_kad(kad, self.aes_algorithm()?)?;
        let wrapped = self.wrap_key(key)?;
        debug!(kad_len = kad.len(), "enabling encryption");
        self.set_data_encryption(Some((&wrapped, KEY_FORMAT_WRAPPED)), &kads)
    }

    /// Clear the drive's key.
    pub fn disable_encryption(&mut self) -> ScsiResult<()> {
        debug!("disabling encryption");
        self.set_data_encryption(None, &[])
    }

    fn aes_algorithm(&self) -> ScsiResult<&EncryptionAlgorithm> {
        self.capabilities
            .iter()
            .find(|a| a.is_aes_256_gcm() && a.encrypt_capable)
            .ok_or(ScsiError::UnsupportedAlgorithm(pages::ALGORITHM_AES_256_GCM))
    }
}

/// Pull the logical unit identifier out of a device identification VPD
/// page: [0] peripheral, [1] page code, [2-3] page length, then
/// designation descriptors of [0] code set, [1] association/type, [2]
/// reserved, [3] length, [4..] identifier. The first logical-unit
/// association wins.
fn parse_logical_unit_id(buf: &[u8]) -> ScsiResult<Vec<u8>> {
    if buf.len() < 4 {
        return Err(ScsiError::truncated("device identification page", buf.len(), 4));
    }
    let len = u16::from_be_bytes([buf[2], buf[3]]) as usize;
    let end = buf.len().min(4 + len);
    let mut offset = 4;
    while offset + 4 <= end {
        let association = (buf[offset + 1] >> 4) & 0x03;
        let id_len = buf[offset + 3] as usize;
        if offset + 4 + id_len > end {
            return Err(ScsiError::truncated(
                "designation descriptor",
                end - offset - 4,
                id_len,
            ));
        }
        if association == 0 {
            return Ok(buf[offset + 4..offset + 4 + id_len].to_vec());
        }
        offset += 4 + id_len;
    }
    Err(ScsiError::malformed(
        "device identification page",
        "no logical unit designator",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{ScsiCompletion, STATUS_CHECK_CONDITION};
    use std::collections::VecDeque;

    /// Scripted transport: each execute pops one step and returns its
    /// completion, optionally filling the data buffer. Outbound payloads
    /// are recorded alongside the CDBs.
    struct MockDevice {
        steps: VecDeque<(Vec<u8>, ScsiCompletion)>,
        issued_cdbs: Vec<Vec<u8>>,
        issued_data: Vec<Vec<u8>>,
    }

    impl MockDevice {
        fn new() -> Self {
            Self {
                steps: VecDeque::new(),
                issued_cdbs: Vec::new(),
                issued_data: Vec::new(),
            }
        }

        fn respond(mut self, data: &[u8]) -> Self {
            self.steps
                .push_back((data.to_vec(), ScsiCompletion::good(data.len())));
            self
        }

        fn fail(mut self, status: u8) -> Self {
            let completion = ScsiCompletion {
                status,
                ..ScsiCompletion::good(0)
            };
            self.steps.push_back((Vec::new(), completion));
            self
        }
    }

    impl DeviceIo for MockDevice {
        fn execute(&mut self, cmd: &mut ScsiCommand) -> ScsiResult<ScsiCompletion> {
            self.issued_cdbs.push(cmd.cdb().to_vec());
            if cmd.direction() == crate::command::DataDirection::ToDevice {
                self.issued_data.push(cmd.data().to_vec());
            }
            let (data, completion) = self
                .steps
                .pop_front()
                .expect("unexpected command beyond script");
            let n = data.len().min(cmd.data_len());
            cmd.data_mut()[..n].copy_from_slice(&data[..n]);
            Ok(ScsiCompletion {
                transferred: n,
                ..completion
            })
        }
    }

    fn empty_sense() -> Vec<u8> {
        vec![0x70, 0, 0, 0, 0, 0, 0, 0]
    }

    fn illegal_request_sense() -> Vec<u8> {
        let mut buf = vec![0u8; 18];
        buf[0] = 0x70;
        buf[2] = 0x05;
        buf[12] = 0x24;
        buf
    }

    #[test]
    fn sense_retry_stops_after_exactly_ten_attempts() {
        let mut mock = MockDevice::new().fail(STATUS_CHECK_CONDITION);
        for _ in 0..SENSE_RETRY_LIMIT {
            mock = mock.respond(&empty_sense());
        }
        let mut drive = TapeDrive::new(mock);
        let err = drive.inquire_device_identifiers().unwrap_err();
        assert_eq!(err, ScsiError::Unresolved { status: 0x02 });
        // Original command plus exactly ten REQUEST SENSE attempts.
        let cdbs = &drive.device.issued_cdbs;
        assert_eq!(cdbs.len(), 1 + SENSE_RETRY_LIMIT);
        assert!(cdbs[1..].iter().all(|c| c[0] == cdb::OP_REQUEST_SENSE));
    }

    #[test]
    fn sense_retry_stops_at_first_nonzero_key() {
        let mock = MockDevice::new()
            .fail(STATUS_CHECK_CONDITION)
            .respond(&empty_sense())
            .respond(&empty_sense())
            .respond(&illegal_request_sense());
        let mut drive = TapeDrive::new(mock);
        let err = drive.inquire_device_identifiers().unwrap_err();
        assert_eq!(
            err,
            ScsiError::CheckCondition {
                key: 0x05,
                asc: 0x24,
                ascq: 0x00
            }
        );
        assert_eq!(drive.device.issued_cdbs.len(), 4);
    }

    #[test]
    fn autosense_resolves_without_request_sense() {
        let mut completion = ScsiCompletion::good(0);
        completion.status = STATUS_CHECK_CONDITION;
        let sense = illegal_request_sense();
        completion.sense[..sense.len()].copy_from_slice(&sense);
        completion.sense_len = sense.len();
        let mut mock = MockDevice::new();
        mock.steps.push_back((Vec::new(), completion));

        let mut drive = TapeDrive::new(mock);
        let err = drive.inquire_device_identifiers().unwrap_err();
        assert!(matches!(err, ScsiError::CheckCondition { key: 0x05, .. }));
        assert_eq!(drive.device.issued_cdbs.len(), 1);
    }

    fn identification_page(lun_id: &[u8]) -> Vec<u8> {
        let mut page = vec![0x01, 0x83];
        page.extend_from_slice(&((4 + lun_id.len()) as u16).to_be_bytes());
        page.extend_from_slice(&[0x01, 0x03, 0x00, lun_id.len() as u8]);
        page.extend_from_slice(lun_id);
        page
    }

    #[test]
    fn inquiry_extracts_logical_unit_id() {
        let lun = [0x60, 0x05, 0x07, 0x63];
        let mock = MockDevice::new().respond(&identification_page(&lun));
        let mut drive = TapeDrive::new(mock);
        assert_eq!(drive.inquire_device_identifiers().unwrap(), lun);
        assert_eq!(drive.logical_unit_id(), lun);
    }

    #[test]
    fn skips_port_association_designators() {
        let lun = [0xAB; 8];
        let mut page = vec![0x01, 0x83];
        page.extend_from_slice(&((4 + 2 + 4 + lun.len()) as u16).to_be_bytes());
        // Port association (0b01) first, logical unit second.
        page.extend_from_slice(&[0x01, 0x13, 0x00, 2, 0xFF, 0xFF]);
        page.extend_from_slice(&[0x01, 0x03, 0x00, lun.len() as u8]);
        page.extend_from_slice(&lun);
        let mock = MockDevice::new().respond(&page);
        let mut drive = TapeDrive::new(mock);
        assert_eq!(drive.inquire_device_identifiers().unwrap(), lun);
    }

    fn attribute_response(entries: &[(u16, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (id, payload) in entries {
            body.extend_from_slice(&id.to_be_bytes());
            body.push(0x01); // ascii
            body.extend_from_slice(&(payload.len() as u16).to_be_bytes());
            body.extend_from_slice(payload);
        }
        let mut out = (body.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn cartridge_memory_replaces_state_wholesale() {
        let mock = MockDevice::new()
            .respond(&[0, 1, 0, 0]) // one partition, starting at 0
            .respond(&attribute_response(&[
                (mam::ATTR_MEDIUM_SERIAL, b"S1"),
                (mam::ATTR_BARCODE, b"TAPE01L8"),
            ]));
        let mut drive = TapeDrive::new(mock);
        drive.current_tape.barcode = Some("STALE".to_string());

        let tape = drive.read_cartridge_memory().unwrap();
        assert_eq!(tape.barcode.as_deref(), Some("TAPE01L8"));
        assert_eq!(tape.attributes.len(), 2);
        assert!(tape.next_block.is_none());
    }

    fn capabilities_response() -> Vec<u8> {
        let mut d = [0u8; 24];
        d[0] = 1;
        d[2..4].copy_from_slice(&0x0014u16.to_be_bytes());
        d[4] = 0x0A;
        d[5] = 0x08;
        d[6..8].copy_from_slice(&32u16.to_be_bytes());
        d[8..10].copy_from_slice(&60u16.to_be_bytes());
        d[10..12].copy_from_slice(&32u16.to_be_bytes());
        d[20..24].copy_from_slice(&pages::ALGORITHM_AES_256_GCM.to_be_bytes());
        let mut page = 0x0010u16.to_be_bytes().to_vec();
        page.extend_from_slice(&(16u16 + 24).to_be_bytes());
        page.extend_from_slice(&[0u8; 16]);
        page.extend_from_slice(&d);
        page
    }

    #[test]
    fn disable_encryption_sends_clear_page() {
        let mock = MockDevice::new()
            .respond(&capabilities_response())
            .respond(&[]);
        let mut drive = TapeDrive::new(mock);
        drive.query_encryption_capabilities().unwrap();
        drive.disable_encryption().unwrap();

        let spout = drive.device.issued_cdbs.last().unwrap();
        assert_eq!(spout[0], cdb::OP_SECURITY_PROTOCOL_OUT);
        assert_eq!(u16::from_be_bytes([spout[2], spout[3]]), 0x0010);
        // 20-byte clear page: no key, no KADs.
        assert_eq!(u32::from_be_bytes([spout[6], spout[7], spout[8], spout[9]]), 20);
    }

    fn wrap_public_key_page(public: &rsa::RsaPublicKey) -> Vec<u8> {
        use rsa::traits::PublicKeyParts;
        let mut page = 0x0031u16.to_be_bytes().to_vec();
        page.extend_from_slice(&((8 + pages::RSA_2048_FIELD_LEN) as u16).to_be_bytes());
        page.extend_from_slice(&pages::KEY_TYPE_RSA_2048.to_be_bytes());
        page.extend_from_slice(&(pages::RSA_2048_FIELD_LEN as u32).to_be_bytes());
        let mut field = vec![0u8; pages::RSA_2048_FIELD_LEN];
        let n = public.n().to_bytes_be();
        field[256 - n.len()..256].copy_from_slice(&n);
        let e = public.e().to_bytes_be();
        let at = pages::RSA_2048_FIELD_LEN - e.len();
        field[at..].copy_from_slice(&e);
        page.extend_from_slice(&field);
        page
    }

    // Full sequence against one scripted device: inquire, capabilities,
    // wrap public key, enable. The final SPOUT page must carry a key the
    // drive's private key recovers and the KAD split across descriptors.
    #[test]
    fn enable_encryption_scripts_full_sequence() {
        use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
        use sha2::Sha256;

        let private = RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048).unwrap();
        let public = RsaPublicKey::from(&private);
        let lun = [0x60, 0x05, 0x07, 0x63];
        let mock = MockDevice::new()
            .respond(&identification_page(&lun))
            .respond(&capabilities_response())
            .respond(&wrap_public_key_page(&public))
            .respond(&[]);
        let mut drive = TapeDrive::new(mock);
        drive.inquire_device_identifiers().unwrap();
        drive.query_encryption_capabilities().unwrap();
        drive.query_key_wrap_public_key().unwrap();

        let key = [0x42u8; 32];
        let kad: Vec<u8> = (0..80).map(|i| b'A' + (i % 26) as u8).collect();
        drive.enable_encryption(&key, &kad).unwrap();

        let spout = drive.device.issued_cdbs.last().unwrap();
        assert_eq!(spout[0], cdb::OP_SECURITY_PROTOCOL_OUT);
        assert_eq!(u16::from_be_bytes([spout[2], spout[3]]), 0x0010);

        let page = drive.device.issued_data.last().unwrap();
        assert_eq!(page[8], 1, "algorithm index from capabilities");
        assert_eq!(page[9], KEY_FORMAT_WRAPPED);
        assert_eq!(page[10], KAD_FORMAT_ASCII);
        assert_eq!(u16::from_be_bytes([page[18], page[19]]), 256);

        // The wrapped key recovers under the label derived from the
        // inquired unit id and the 256-bit key size.
        let label = String::from_utf8(wrap::build_wrap_label(&lun, 256)).unwrap();
        let padding = Oaep::new_with_label::<Sha256, _>(label);
        assert_eq!(private.decrypt(padding, &page[20..276]).unwrap(), key);

        // 80-byte KAD against a 60-byte authenticated capacity: the
        // 20-byte unauthenticated overflow precedes the authenticated
        // descriptor.
        let kads = &page[276..];
        assert_eq!(kads[0], pages::KAD_TYPE_UNAUTH);
        assert_eq!(u16::from_be_bytes([kads[2], kads[3]]), 20);
        assert_eq!(&kads[4..24], &kad[60..]);
        assert_eq!(kads[24], pages::KAD_TYPE_AUTH);
        assert_eq!(u16::from_be_bytes([kads[26], kads[27]]), 60);
        assert_eq!(&kads[28..88], &kad[..60]);
        assert_eq!(kads.len(), 88);
    }

    #[test]
    fn enable_requires_supported_algorithm() {
        let mut drive = TapeDrive::new(MockDevice::new());
        assert_eq!(
            drive.disable_encryption().unwrap_err(),
            ScsiError::UnsupportedAlgorithm(pages::ALGORITHM_AES_256_GCM)
        );
    }

    #[test]
    fn wrap_key_requires_queried_public_key() {
        let drive = TapeDrive::new(MockDevice::new());
        assert!(matches!(
            drive.wrap_key(&[0u8; 32]),
            Err(ScsiError::Malformed { .. })
        ));
    }

    #[test]
    fn wrap_public_key_requires_device_identifiers() {
        let mut drive = TapeDrive::new(MockDevice::new());
        assert!(matches!(
            drive.query_key_wrap_public_key(),
            Err(ScsiError::Malformed { .. })
        ));
    }
}
