// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

#![deny(missing_docs)]
//! This file contains values specified in spec.
//! SPC-4: <https://www.t10.org/cgi-bin/ac.pl?t=f&f=spc4r37.pdf>
//! SBC-3: <https://www.t10.org/cgi-bin/ac.pl?t=f&f=sbc3r36.pdf>
//! SAT-4: <https://www.t10.org/cgi-bin/ac.pl?t=f&f=sat4r06.pdf>

// OPERATION CODES
/// TEST UNIT READY
pub const TEST_UNIT_READY: u8 = 0x00;
/// REQUEST SENSE
pub const REQUEST_SENSE: u8 = 0x03;
/// READ(6)
pub const READ_6: u8 = 0x08;
/// WRITE(6)
pub const WRITE_6: u8 = 0x0a;
/// INQUIRY
pub const INQUIRY: u8 = 0x12;
/// MODE SELECT(6)
pub const MODE_SELECT_6: u8 = 0x15;
/// MODE SENSE(6)
pub const MODE_SENSE_6: u8 = 0x1a;
/// READ CAPACITY(10)
pub const READ_CAPACITY_10: u8 = 0x25;
/// READ(10)
pub const READ_10: u8 = 0x28;
/// WRITE(10)
pub const WRITE_10: u8 = 0x2a;
/// SYNCHRONIZE CACHE(10)
pub const SYNCHRONIZE_CACHE_10: u8 = 0x35;
/// UNMAP
pub const UNMAP: u8 = 0x42;
/// LOG SENSE
pub const LOG_SENSE: u8 = 0x4d;
/// MODE SELECT(10)
pub const MODE_SELECT_10: u8 = 0x55;
/// MODE SENSE(10)
pub const MODE_SENSE_10: u8 = 0x5a;
/// Variable length CDB. ATA PASS-THROUGH(32) is one of its service actions.
pub const VARIABLE_LENGTH_CDB: u8 = 0x7f;
/// ATA PASS-THROUGH(16)
pub const ATA_PASS_THROUGH_16: u8 = 0x85;
/// READ(16)
pub const READ_16: u8 = 0x88;
/// WRITE(16)
pub const WRITE_16: u8 = 0x8a;
/// SYNCHRONIZE CACHE(16)
pub const SYNCHRONIZE_CACHE_16: u8 = 0x91;
/// SERVICE ACTION IN(16)
pub const SERVICE_ACTION_IN_16: u8 = 0x9e;
/// REPORT LUNS
pub const REPORT_LUNS: u8 = 0xa0;
/// ATA PASS-THROUGH(12)
pub const ATA_PASS_THROUGH_12: u8 = 0xa1;
/// READ(12)
pub const READ_12: u8 = 0xa8;
/// WRITE(12)
pub const WRITE_12: u8 = 0xaa;

// SERVICE ACTIONS
/// READ CAPACITY(16), under SERVICE ACTION IN(16).
pub const READ_CAPACITY_16: u8 = 0x10;
/// ATA PASS-THROUGH(32), under the variable length CDB.
pub const ATA_PASS_THROUGH_32: u16 = 0x1ff0;

// PERIPHERAL DEVICE TYPES
/// Direct access block device.
pub const TYPE_DISK: u8 = 0x00;

// SENSE KEYS
/// Indicates that there is no specific sense key information to be reported.
pub const NO_SENSE: u8 = 0x00;
/// Indicates that the command completed successfully, with some recovery action performed.
pub const RECOVERED_ERROR: u8 = 0x01;
/// Indicates that the logical unit is not accessible.
pub const NOT_READY: u8 = 0x02;
/// Indicates an error that may have been caused by a flaw in the medium or an error in the
/// recorded data.
pub const MEDIUM_ERROR: u8 = 0x03;
/// Indicates that the device detected a non-recoverable hardware failure.
pub const HARDWARE_ERROR: u8 = 0x04;
/// Indicates an illegal parameter in the command descriptor block or in the additional
/// parameters.
pub const ILLEGAL_REQUEST: u8 = 0x05;
/// Indicates that a unit attention condition has been established.
pub const UNIT_ATTENTION: u8 = 0x06;
/// Indicates that a command that reads or writes the medium was attempted on a protected
/// block.
pub const DATA_PROTECT: u8 = 0x07;
/// Indicates that the device server aborted the command.
pub const ABORTED_COMMAND: u8 = 0x0b;
/// Indicates that the source data did not match the data read from the medium.
pub const MISCOMPARE: u8 = 0x0e;

// ADDITIONAL SENSE CODES
/// No additional sense information. Paired with ATA_PASS_THROUGH_INFORMATION_AVAILABLE.
pub const ASC_NO_ADDITIONAL_SENSE: u8 = 0x00;
/// Peripheral device write fault.
pub const ASC_PERIPHERAL_DEVICE_WRITE_FAULT: u8 = 0x03;
/// Logical unit not ready.
pub const ASC_LOGICAL_UNIT_NOT_READY: u8 = 0x04;
/// Logical block guard/tag check failed, qualified by the ASCQ.
pub const ASC_LOGICAL_BLOCK_CHECK_FAILED: u8 = 0x10;
/// Unrecovered read error.
pub const ASC_UNRECOVERED_READ_ERROR: u8 = 0x11;
/// Parameter list length error.
pub const ASC_PARAMETER_LIST_LENGTH_ERROR: u8 = 0x1a;
/// Miscompare during verify operation.
pub const ASC_MISCOMPARE_DURING_VERIFY: u8 = 0x1d;
/// Invalid command operation code. With ASCQ 0x02 it reads "access denied".
pub const ASC_INVALID_COMMAND_OPERATION_CODE: u8 = 0x20;
/// Logical block address out of range.
pub const ASC_LBA_OUT_OF_RANGE: u8 = 0x21;
/// Invalid field in CDB.
pub const ASC_INVALID_FIELD_IN_CDB: u8 = 0x24;
/// Logical unit not supported.
pub const ASC_LOGICAL_UNIT_NOT_SUPPORTED: u8 = 0x25;
/// Invalid field in parameter list.
pub const ASC_INVALID_FIELD_IN_PARAMETER_LIST: u8 = 0x26;
/// Write protected.
pub const ASC_WRITE_PROTECTED: u8 = 0x27;
/// Command sequence error.
pub const ASC_COMMAND_SEQUENCE_ERROR: u8 = 0x2c;
/// Saving parameters not supported.
pub const ASC_SAVING_PARAMETERS_NOT_SUPPORTED: u8 = 0x39;
/// Internal target failure.
pub const ASC_INTERNAL_TARGET_FAILURE: u8 = 0x44;
/// Failure prediction threshold exceeded.
pub const ASC_FAILURE_PREDICTION_THRESHOLD_EXCEEDED: u8 = 0x5d;

// ADDITIONAL SENSE CODE QUALIFIERS
/// Qualifies ASC_NO_ADDITIONAL_SENSE: ATA pass-through information available.
pub const ASCQ_ATA_PASS_THROUGH_INFORMATION_AVAILABLE: u8 = 0x1d;
/// Qualifies ASC_LOGICAL_UNIT_NOT_READY: format in progress.
pub const ASCQ_FORMAT_IN_PROGRESS: u8 = 0x04;
/// Qualifies ASC_INVALID_COMMAND_OPERATION_CODE: access denied, no access rights.
pub const ASCQ_NO_ACCESS_RIGHTS: u8 = 0x02;
/// Qualifies ASC_LOGICAL_BLOCK_CHECK_FAILED: guard check failed.
pub const ASCQ_GUARD_CHECK_FAILED: u8 = 0x01;
/// Qualifies ASC_LOGICAL_BLOCK_CHECK_FAILED: application tag check failed.
pub const ASCQ_APPLICATION_TAG_CHECK_FAILED: u8 = 0x02;
/// Qualifies ASC_LOGICAL_BLOCK_CHECK_FAILED: reference tag check failed.
pub const ASCQ_REFERENCE_TAG_CHECK_FAILED: u8 = 0x03;

// SENSE DATA DESCRIPTOR TYPES
/// ATA Status Return sense data descriptor.
pub const ATA_RETURN_DESCRIPTOR: u8 = 0x09;

// LOG PAGES
/// Supported log pages.
pub const LOG_PAGE_SUPPORTED_PAGES: u8 = 0x00;
/// Temperature log page.
pub const LOG_PAGE_TEMPERATURE: u8 = 0x0d;
/// Solid state media log page.
pub const LOG_PAGE_SOLID_STATE_MEDIA: u8 = 0x11;
/// ATA PASS-THROUGH results log page.
pub const LOG_PAGE_ATA_PASS_THROUGH_RESULTS: u8 = 0x16;
/// Informational exceptions log page.
pub const LOG_PAGE_INFORMATIONAL_EXCEPTIONS: u8 = 0x2f;

// MODE PAGES
/// Read-Write error recovery mode page.
pub const MODE_PAGE_READ_WRITE_ERROR_RECOVERY: u8 = 0x01;
/// Caching mode page.
pub const MODE_PAGE_CACHING: u8 = 0x08;
/// Control mode page.
pub const MODE_PAGE_CONTROL: u8 = 0x0a;
/// Return all mode pages.
pub const MODE_PAGE_ALL: u8 = 0x3f;

// VITAL PRODUCT DATA PAGES
/// Supported VPD pages.
pub const VPD_SUPPORTED_PAGES: u8 = 0x00;
/// Unit serial number.
pub const VPD_UNIT_SERIAL_NUMBER: u8 = 0x80;
/// Device identification.
pub const VPD_DEVICE_IDENTIFICATION: u8 = 0x83;
/// Block limits.
pub const VPD_BLOCK_LIMITS: u8 = 0xb0;
/// Block device characteristics.
pub const VPD_BLOCK_DEVICE_CHARACTERISTICS: u8 = 0xb1;
/// Logical block provisioning.
pub const VPD_LOGICAL_BLOCK_PROVISIONING: u8 = 0xb2;
