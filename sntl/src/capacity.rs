// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! TEST UNIT READY, REQUEST SENSE, READ CAPACITY and REPORT LUNS.

use passthru::DataTransfer;
use scsi::constants::NO_SENSE;
use scsi::Sense;
use scsi::SenseFormat;
use scsi::FIXED_SENSE_LEN;

use crate::commands::ReadCapacity16;
use crate::commands::ReportLuns;
use crate::commands::RequestSense;
use crate::data::write_data_in;
use crate::unit::LogicalUnit;
use crate::Result;
use crate::TranslateError;

// READ CAPACITY(16) byte 14.
const LBPME: u8 = 1 << 7;
const LBPRZ: u8 = 1 << 6;

/// The unit is ready when the controller returns its health log.
pub(crate) fn test_unit_ready(unit: &LogicalUnit) -> Result<usize> {
    unit.smart_log()?;
    Ok(0)
}

/// There is never a pending condition to report, so REQUEST SENSE returns NO SENSE.
pub(crate) fn request_sense(command: &RequestSense, data: &mut DataTransfer) -> Result<usize> {
    let format = if command.descriptor_format() {
        SenseFormat::Descriptor
    } else {
        SenseFormat::Fixed
    };
    let mut outbuf = [0u8; FIXED_SENSE_LEN];
    let len = Sense::new(NO_SENSE, 0, 0).write(format, &mut outbuf);
    write_data_in(data, &outbuf[..len], command.alloc_len())
}

pub(crate) fn read_capacity_10(unit: &LogicalUnit, data: &mut DataTransfer) -> Result<usize> {
    let namespace = unit.identify_namespace()?;
    // Returned value is the block address of the last sector.
    // If the block address exceeds u32::MAX, we return u32::MAX.
    let block_address: u32 = namespace
        .nsze()
        .saturating_sub(1)
        .try_into()
        .unwrap_or(u32::MAX);
    let mut outbuf = [0u8; 8];
    outbuf[..4].copy_from_slice(&block_address.to_be_bytes());
    outbuf[4..8].copy_from_slice(&namespace.block_size().to_be_bytes());
    write_data_in(data, &outbuf, outbuf.len())
}

pub(crate) fn read_capacity_16(
    command: &ReadCapacity16,
    unit: &LogicalUnit,
    data: &mut DataTransfer,
) -> Result<usize> {
    let namespace = unit.identify_namespace()?;
    let controller = unit.identify_controller()?;
    let mut outbuf = [0u8; 32];
    // Last logical block address
    outbuf[..8].copy_from_slice(&namespace.nsze().saturating_sub(1).to_be_bytes());
    // Block size
    outbuf[8..12].copy_from_slice(&namespace.block_size().to_be_bytes());
    // Logical block provisioning management is only available through Dataset Management.
    if controller.dsm_supported() {
        outbuf[14] = LBPME;
        if namespace.deallocated_reads_zero() {
            outbuf[14] |= LBPRZ;
        }
    }
    write_data_in(data, &outbuf, command.alloc_len())
}

// SELECT REPORT values.
const REPORT_ALL: u8 = 0x00;
const REPORT_WELL_KNOWN: u8 = 0x01;
const REPORT_ALL_LOGICAL_UNITS: u8 = 0x02;

pub(crate) fn report_luns(command: &ReportLuns, data: &mut DataTransfer) -> Result<usize> {
    // We need at least 16 bytes.
    if command.alloc_len() < 16 {
        return Err(TranslateError::InvalidField);
    }
    let luns: &[u64] = match command.select_report() {
        // Each LUN takes 8 bytes and we only support LUN0.
        REPORT_ALL | REPORT_ALL_LOGICAL_UNITS => &[0],
        REPORT_WELL_KNOWN => &[],
        _ => return Err(TranslateError::InvalidField),
    };
    let mut outbuf = Vec::with_capacity(8 + luns.len() * 8);
    let lun_list_len = (luns.len() * 8) as u32;
    outbuf.extend_from_slice(&lun_list_len.to_be_bytes());
    outbuf.extend_from_slice(&[0; 4]);
    for lun in luns {
        outbuf.extend_from_slice(&lun.to_be_bytes());
    }
    write_data_in(data, &outbuf, command.alloc_len())
}
