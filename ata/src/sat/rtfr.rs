// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Recovers the return task file registers from the sense data of an ATA PASS-THROUGH command.
//!
//! Descriptor format sense data carries them in an ATA Return descriptor. Fixed format sense
//! data only points at the ATA PASS-THROUGH results log page, which has to be read back.

use std::time::Duration;

use log::debug;
use log::warn;
use passthru::DataTransfer;
use passthru::Device;
use passthru::Error;
use passthru::Result;
use passthru::ScsiRequest;
use scsi::constants::ASCQ_ATA_PASS_THROUGH_INFORMATION_AVAILABLE;
use scsi::constants::ASC_NO_ADDITIONAL_SENSE;
use scsi::constants::ATA_RETURN_DESCRIPTOR;
use scsi::constants::ILLEGAL_REQUEST;
use scsi::constants::LOG_PAGE_ATA_PASS_THROUGH_RESULTS;
use scsi::constants::LOG_SENSE;
use scsi::descriptors;
use scsi::Sense;
use scsi::SenseFormat;
use scsi::ScsiStatus;
use scsi::FIXED_ADDITIONAL_LENGTH;
use scsi::FIXED_COMMAND_SPECIFIC_INFORMATION;
use scsi::FIXED_INFORMATION;
use scsi::FIXED_SENSE_LEN;
use scsi::SENSE_BUFFER_LEN;
use static_assertions::const_assert_eq;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

use crate::AtaCommand;
use crate::CommandType;
use crate::Rtfr;

/// ADDITIONAL LENGTH of a complete ATA Return descriptor.
pub const ATA_RETURN_DESCRIPTOR_ADDITIONAL_LENGTH: u8 = 0x0c;

const DESCRIPTOR_EXTEND: u8 = 1 << 0;

// Command-specific information byte 0 of fixed format sense data.
const FIXED_EXTEND: u8 = 1 << 7;
const FIXED_LOG_INDEX_MASK: u8 = 0x0f;

/// The additional length that covers the INFORMATION and COMMAND-SPECIFIC INFORMATION fields.
const FIXED_REGISTERS_ADDITIONAL_LENGTH: u8 = 10;

const LOG_PAGE_HEADER_LEN: usize = 4;
const LOG_PARAMETER_HEADER_LEN: usize = 4;
const LOG_PAGE_CODE_MASK: u8 = 0x3f;
/// Page control field selecting cumulative values.
const LOG_PC_CUMULATIVE: u8 = 0x01 << 6;
/// Enough for the fifteen parameters the results log can hold.
const RESULTS_LOG_ALLOC_LEN: u16 = 512;
const RESULTS_LOG_TIMEOUT: Duration = Duration::from_secs(15);

/// The ATA Return sense data descriptor, also the parameter value of the ATA PASS-THROUGH
/// results log page.
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq, Eq)]
#[repr(C, packed)]
pub struct AtaReturnDescriptor {
    pub code: u8,
    pub additional_length: u8,
    pub extend: u8,
    pub error: u8,
    pub count_ext: u8,
    pub count: u8,
    pub lba_low_ext: u8,
    pub lba_low: u8,
    pub lba_mid_ext: u8,
    pub lba_mid: u8,
    pub lba_high_ext: u8,
    pub lba_high: u8,
    pub device: u8,
    pub status: u8,
}

const_assert_eq!(std::mem::size_of::<AtaReturnDescriptor>(), 14);

impl AtaReturnDescriptor {
    pub fn new(rtfr: &Rtfr) -> Self {
        AtaReturnDescriptor {
            code: ATA_RETURN_DESCRIPTOR,
            additional_length: ATA_RETURN_DESCRIPTOR_ADDITIONAL_LENGTH,
            extend: if rtfr.extended { DESCRIPTOR_EXTEND } else { 0 },
            error: rtfr.error,
            count_ext: rtfr.count_ext,
            count: rtfr.count,
            lba_low_ext: rtfr.lba_low_ext,
            lba_low: rtfr.lba_low,
            lba_mid_ext: rtfr.lba_mid_ext,
            lba_mid: rtfr.lba_mid,
            lba_high_ext: rtfr.lba_high_ext,
            lba_high: rtfr.lba_high,
            device: rtfr.device,
            status: rtfr.status,
        }
    }

    /// The registers the descriptor reports. The `_ext` halves are only taken when EXTEND is
    /// set.
    pub fn rtfr(&self) -> Rtfr {
        let mut rtfr = Rtfr {
            status: self.status,
            error: self.error,
            device: self.device,
            count: self.count,
            lba_low: self.lba_low,
            lba_mid: self.lba_mid,
            lba_high: self.lba_high,
            ..Default::default()
        };
        if self.extend & DESCRIPTOR_EXTEND != 0 {
            rtfr.extended = true;
            rtfr.count_ext = self.count_ext;
            rtfr.lba_low_ext = self.lba_low_ext;
            rtfr.lba_mid_ext = self.lba_mid_ext;
            rtfr.lba_high_ext = self.lba_high_ext;
        }
        rtfr
    }
}

/// Returns the registers of the first complete ATA Return descriptor in descriptor format
/// sense data.
pub fn rtfrs_from_descriptor_sense(sense: &[u8]) -> Option<Rtfr> {
    let desc = descriptors(sense).find(|d| {
        d.code == ATA_RETURN_DESCRIPTOR
            && d.additional_length() >= ATA_RETURN_DESCRIPTOR_ADDITIONAL_LENGTH
    })?;
    let (desc, _) = AtaReturnDescriptor::read_from_prefix(desc.bytes).ok()?;
    Some(desc.rtfr())
}

/// What fixed format sense data says about the registers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FixedFormatRtfrs {
    /// The sense data does not report ATA PASS-THROUGH information.
    NotAvailable,
    /// The registers must be read from the ATA PASS-THROUGH results log page.
    ResultsLogRequired {
        /// Parameter code of the result in the log, if the sense data names one.
        log_index: Option<u8>,
        /// The registers the sense data did carry.
        partial: Option<Rtfr>,
    },
}

/// Classifies fixed format sense data returned for `cmd` without issuing any command.
///
/// Fixed format sense data has no room for the 48-bit registers, so ATA PASS-THROUGH
/// information always means a read of the results log. Whatever INFORMATION and
/// COMMAND-SPECIFIC INFORMATION carry is kept as `partial`.
pub fn parse_fixed_format_sense(sense: &[u8], cmd: &AtaCommand) -> FixedFormatRtfrs {
    if SenseFormat::of(sense) != Some(SenseFormat::Fixed) {
        return FixedFormatRtfrs::NotAvailable;
    }
    match Sense::parse(sense) {
        Some(Sense {
            asc: ASC_NO_ADDITIONAL_SENSE,
            ascq: ASCQ_ATA_PASS_THROUGH_INFORMATION_AVAILABLE,
            ..
        }) => {}
        _ => return FixedFormatRtfrs::NotAvailable,
    }
    if sense.len() < FIXED_SENSE_LEN
        || sense[FIXED_ADDITIONAL_LENGTH] < FIXED_REGISTERS_ADDITIONAL_LENGTH
    {
        return FixedFormatRtfrs::ResultsLogRequired {
            log_index: None,
            partial: None,
        };
    }

    let info = &sense[FIXED_INFORMATION..FIXED_INFORMATION + 4];
    let csi = &sense[FIXED_COMMAND_SPECIFIC_INFORMATION..FIXED_COMMAND_SPECIFIC_INFORMATION + 4];
    // LOG INDEX 0 names no parameter; the latest result is used.
    let log_index = Some(csi[0] & FIXED_LOG_INDEX_MASK).filter(|&i| i != 0);
    if info.iter().chain(csi).all(|&b| b == 0) {
        return FixedFormatRtfrs::ResultsLogRequired {
            log_index,
            partial: None,
        };
    }
    let partial = Rtfr {
        error: info[0],
        status: info[1],
        device: info[2],
        count: info[3],
        lba_low: csi[1],
        lba_mid: csi[2],
        lba_high: csi[3],
        extended: csi[0] & FIXED_EXTEND != 0 && cmd.command_type != CommandType::Taskfile28,
        ..Default::default()
    };
    FixedFormatRtfrs::ResultsLogRequired {
        log_index,
        partial: Some(partial),
    }
}

/// Reads the ATA PASS-THROUGH results log page and returns the result stored under parameter
/// code `log_index`, or the most recent result if `log_index` is `None`.
pub fn read_passthrough_results_log(device: &Device, log_index: Option<u8>) -> Result<Rtfr> {
    let alloc_len = RESULTS_LOG_ALLOC_LEN.to_be_bytes();
    let cdb = [
        LOG_SENSE,
        0,
        LOG_PC_CUMULATIVE | LOG_PAGE_ATA_PASS_THROUGH_RESULTS,
        0,
        0,
        0,
        0,
        alloc_len[0],
        alloc_len[1],
        0,
    ];
    let mut page = vec![0u8; RESULTS_LOG_ALLOC_LEN as usize];
    let mut sense = [0u8; SENSE_BUFFER_LEN];
    debug!(
        "{}: reading ATA PASS-THROUGH results log, index {:?}",
        device.name(),
        log_index
    );
    let reply = device
        .transport()
        .send_scsi(ScsiRequest {
            cdb: &cdb,
            data: DataTransfer::FromDevice(&mut page),
            sense: &mut sense,
            timeout: device.default_timeout().max(RESULTS_LOG_TIMEOUT),
        })
        .map_err(|e| {
            Error::DeviceCommunication(format!("reading ATA PASS-THROUGH results log: {}", e))
        })?;
    if reply.status != ScsiStatus::Good {
        let sense = Sense::parse(&sense[..reply.sense_len.min(SENSE_BUFFER_LEN)]);
        let detail = match sense {
            Some(s) if s.key == ILLEGAL_REQUEST => "log page not supported".to_string(),
            _ => format!("status {:?}, sense {:?}", reply.status, sense),
        };
        return Err(Error::DeviceCommunication(format!(
            "reading ATA PASS-THROUGH results log: {}",
            detail
        )));
    }
    parse_results_log(&page, log_index)
}

fn parse_results_log(page: &[u8], log_index: Option<u8>) -> Result<Rtfr> {
    if page.len() < LOG_PAGE_HEADER_LEN
        || page[0] & LOG_PAGE_CODE_MASK != LOG_PAGE_ATA_PASS_THROUGH_RESULTS
    {
        return Err(Error::DeviceCommunication(
            "malformed ATA PASS-THROUGH results log".to_string(),
        ));
    }
    let page_len = u16::from_be_bytes([page[2], page[3]]) as usize;
    let end = (LOG_PAGE_HEADER_LEN + page_len).min(page.len());
    let mut params = &page[LOG_PAGE_HEADER_LEN..end];
    let mut found = None;
    while params.len() >= LOG_PARAMETER_HEADER_LEN {
        let code = u16::from_be_bytes([params[0], params[1]]);
        let len = LOG_PARAMETER_HEADER_LEN + params[3] as usize;
        if len > params.len() {
            warn!("truncated ATA PASS-THROUGH results log parameter {:#x}", code);
            break;
        }
        let value = &params[LOG_PARAMETER_HEADER_LEN..len];
        params = &params[len..];
        if log_index.map_or(true, |i| code == i as u16) {
            found = AtaReturnDescriptor::read_from_prefix(value)
                .ok()
                .map(|(desc, _)| desc.rtfr());
            if log_index.is_some() {
                break;
            }
        }
    }
    found.ok_or_else(|| {
        Error::DeviceCommunication(format!(
            "ATA PASS-THROUGH results log has no result {:?}",
            log_index
        ))
    })
}

/// Recovers the registers from fixed format sense data by reading the results log page once.
pub fn rtfrs_from_fixed_format_sense(
    device: &Device,
    sense: &[u8],
    cmd: &AtaCommand,
) -> Result<Option<Rtfr>> {
    match parse_fixed_format_sense(sense, cmd) {
        FixedFormatRtfrs::NotAvailable => Ok(None),
        FixedFormatRtfrs::ResultsLogRequired { log_index, .. } => {
            read_passthrough_results_log(device, log_index).map(Some)
        }
    }
}

/// Recovers the registers `cmd` returned from its sense data. `Ok(None)` means the sense data
/// carries none.
pub fn extract_rtfrs(device: &Device, sense: &[u8], cmd: &AtaCommand) -> Result<Option<Rtfr>> {
    match SenseFormat::of(sense) {
        Some(SenseFormat::Descriptor) => Ok(rtfrs_from_descriptor_sense(sense)),
        Some(SenseFormat::Fixed) => rtfrs_from_fixed_format_sense(device, sense, cmd),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use scsi::constants::RECOVERED_ERROR;

    use super::*;
    use crate::sat::test_helpers::*;

    fn extended_rtfr() -> Rtfr {
        Rtfr {
            status: 0x51,
            error: 0x40,
            device: 0x40,
            count: 0x08,
            count_ext: 0x00,
            lba_low: 0x78,
            lba_mid: 0x56,
            lba_high: 0x34,
            lba_low_ext: 0x12,
            lba_mid_ext: 0x01,
            lba_high_ext: 0x00,
            extended: true,
        }
    }

    #[test]
    fn descriptor_with_extend() {
        let rtfr = extended_rtfr();
        let sense = descriptor_sense(&rtfr);
        assert_eq!(rtfrs_from_descriptor_sense(&sense), Some(rtfr));
        assert_eq!(rtfr.lba48(), 0x0001_1234_5678);
    }

    #[test]
    fn descriptor_without_extend_ignores_upper_halves() {
        let mut sense = descriptor_sense(&extended_rtfr());
        // Clear EXTEND; the upper bytes are left in place.
        sense[8 + 2] = 0;
        let rtfr = rtfrs_from_descriptor_sense(&sense).unwrap();
        assert!(!rtfr.extended);
        assert_eq!(rtfr.lba_low_ext, 0);
        assert_eq!(rtfr.lba_mid_ext, 0);
        assert_eq!(rtfr.lba_low, 0x78);
        assert_eq!(rtfr.status, 0x51);
    }

    #[test]
    fn descriptor_missing_or_short() {
        let mut sense = descriptor_sense(&extended_rtfr());
        sense[8 + 1] = 0x0a;
        sense[7] = 12;
        assert_eq!(rtfrs_from_descriptor_sense(&sense), None);

        let mut buf = [0u8; 18];
        Sense::new(ILLEGAL_REQUEST, 0x24, 0).write(SenseFormat::Descriptor, &mut buf);
        assert_eq!(rtfrs_from_descriptor_sense(&buf), None);
    }

    #[test]
    fn fixed_sense_always_needs_log() {
        let cmd = AtaCommand::read_dma(0, 1);
        let sense = fixed_sense(0x51, 0x04, 0xe0, 0x01, 0x00, [0x10, 0x20, 0x30]);
        let partial = Rtfr {
            status: 0x51,
            error: 0x04,
            device: 0xe0,
            count: 0x01,
            lba_low: 0x10,
            lba_mid: 0x20,
            lba_high: 0x30,
            ..Default::default()
        };
        assert_eq!(
            parse_fixed_format_sense(&sense, &cmd),
            FixedFormatRtfrs::ResultsLogRequired {
                log_index: None,
                partial: Some(partial)
            }
        );
    }

    #[test]
    fn fixed_without_registers_has_no_partial() {
        let cmd = AtaCommand::read_dma_ext(0, 1);
        let mut sense = [0u8; 18];
        Sense::new(
            RECOVERED_ERROR,
            ASC_NO_ADDITIONAL_SENSE,
            ASCQ_ATA_PASS_THROUGH_INFORMATION_AVAILABLE,
        )
        .write(SenseFormat::Fixed, &mut sense);
        let needs_log = FixedFormatRtfrs::ResultsLogRequired {
            log_index: None,
            partial: None,
        };
        assert_eq!(parse_fixed_format_sense(&sense, &cmd), needs_log);
        assert_eq!(parse_fixed_format_sense(&sense[..14], &cmd), needs_log);
        sense[FIXED_ADDITIONAL_LENGTH] = 6;
        assert_eq!(parse_fixed_format_sense(&sense, &cmd), needs_log);
    }

    #[test]
    fn fixed_log_index_and_extend() {
        // EXTEND, LBA UPPER NONZERO, log index 3.
        let sense = fixed_sense(0x50, 0, 0x40, 0x08, 0x80 | 0x20 | 0x03, [0x78, 0x56, 0x34]);
        match parse_fixed_format_sense(&sense, &AtaCommand::read_dma_ext(0, 8)) {
            FixedFormatRtfrs::ResultsLogRequired {
                log_index: Some(3),
                partial: Some(partial),
            } => {
                assert_eq!(partial.lba_low, 0x78);
                assert!(partial.extended);
            }
            other => panic!("unexpected {:?}", other),
        }
        // EXTEND means nothing for a 28-bit command.
        match parse_fixed_format_sense(&sense, &AtaCommand::read_dma(0, 8)) {
            FixedFormatRtfrs::ResultsLogRequired {
                log_index: Some(3),
                partial: Some(partial),
            } => assert!(!partial.extended),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn fixed_other_sense_is_not_available() {
        let cmd = AtaCommand::read_dma(0, 1);
        let mut sense = [0u8; 18];
        Sense::new(ILLEGAL_REQUEST, 0x24, 0).write(SenseFormat::Fixed, &mut sense);
        assert_eq!(
            parse_fixed_format_sense(&sense, &cmd),
            FixedFormatRtfrs::NotAvailable
        );
        assert_eq!(
            parse_fixed_format_sense(&descriptor_sense(&extended_rtfr()), &cmd),
            FixedFormatRtfrs::NotAvailable
        );
    }

    #[test]
    fn results_log_by_index_and_latest() {
        let first = Rtfr {
            status: 0x50,
            count: 1,
            extended: true,
            ..Default::default()
        };
        let second = extended_rtfr();
        let page = results_log_page(&[(0, first), (1, second)]);
        assert_eq!(parse_results_log(&page, Some(0)).unwrap(), first);
        assert_eq!(parse_results_log(&page, Some(1)).unwrap(), second);
        assert_eq!(parse_results_log(&page, None).unwrap(), second);
        assert!(matches!(
            parse_results_log(&page, Some(7)),
            Err(Error::DeviceCommunication(_))
        ));
        assert!(matches!(
            parse_results_log(&[0x0d, 0, 0, 0], None),
            Err(Error::DeviceCommunication(_))
        ));
    }

    #[test]
    fn results_log_read_through_device() {
        let rtfr = extended_rtfr();
        let mock = MockScsi::new();
        mock.push(MockReply::good_with_data(results_log_page(&[(2, rtfr)])));
        let device = ata_device(&mock);
        assert_eq!(read_passthrough_results_log(&device, Some(2)).unwrap(), rtfr);
        let cdbs = mock.cdbs();
        assert_eq!(cdbs.len(), 1);
        assert_eq!(&cdbs[0][..3], &[LOG_SENSE, 0, 0x56]);
    }

    #[test]
    fn results_log_read_failures() {
        let mock = MockScsi::new();
        mock.push(MockReply::check_condition(Sense::new(
            ILLEGAL_REQUEST,
            0x24,
            0,
        )));
        let device = ata_device(&mock);
        assert!(matches!(
            read_passthrough_results_log(&device, None),
            Err(Error::DeviceCommunication(_))
        ));

        mock.push(MockReply::passthrough_failure());
        assert!(matches!(
            read_passthrough_results_log(&device, None),
            Err(Error::DeviceCommunication(_))
        ));
    }

    #[test]
    fn extract_dispatches_on_format() {
        let mock = MockScsi::new();
        let device = ata_device(&mock);
        let cmd = AtaCommand::read_dma_ext(0, 8);
        let rtfr = extended_rtfr();
        assert_eq!(
            extract_rtfrs(&device, &descriptor_sense(&rtfr), &cmd).unwrap(),
            Some(rtfr)
        );
        assert_eq!(extract_rtfrs(&device, &[0u8; 18], &cmd).unwrap(), None);
        assert_eq!(extract_rtfrs(&device, &[], &cmd).unwrap(), None);
        assert!(mock.cdbs().is_empty());
    }

    #[test]
    fn extract_fixed_sense_reads_log() {
        let mock = MockScsi::new();
        let rtfr = extended_rtfr();
        mock.push(MockReply::good_with_data(results_log_page(&[
            (1, Rtfr::default()),
            (2, rtfr),
        ])));
        let device = ata_device(&mock);
        let mut sense = [0u8; 18];
        Sense::new(
            RECOVERED_ERROR,
            ASC_NO_ADDITIONAL_SENSE,
            ASCQ_ATA_PASS_THROUGH_INFORMATION_AVAILABLE,
        )
        .write(SenseFormat::Fixed, &mut sense);
        let cmd = AtaCommand::read_dma_ext(0, 8);
        assert_eq!(extract_rtfrs(&device, &sense, &cmd).unwrap(), Some(rtfr));
        let cdbs = mock.cdbs();
        assert_eq!(cdbs.len(), 1);
        assert_eq!(cdbs[0][0], LOG_SENSE);
    }
}
