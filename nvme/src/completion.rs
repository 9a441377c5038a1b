// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fmt;

use static_assertions::const_assert_eq;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

/// Status code type field of a completion.
#[derive(Copy, Clone, Debug, PartialEq, Eq, enumn::N)]
#[repr(u8)]
pub enum StatusCodeType {
    Generic = 0,
    CommandSpecific = 1,
    MediaError = 2,
    PathRelated = 3,
    VendorSpecific = 7,
}

/// Generic command status values (SCT 0).
pub mod generic {
    pub const SUCCESS: u8 = 0x00;
    pub const INVALID_COMMAND_OPCODE: u8 = 0x01;
    pub const INVALID_FIELD_IN_COMMAND: u8 = 0x02;
    pub const DATA_TRANSFER_ERROR: u8 = 0x04;
    pub const ABORTED_POWER_LOSS: u8 = 0x05;
    pub const INTERNAL_ERROR: u8 = 0x06;
    pub const ABORT_REQUESTED: u8 = 0x07;
    pub const ABORTED_SQ_DELETION: u8 = 0x08;
    pub const ABORTED_FAILED_FUSED: u8 = 0x09;
    pub const ABORTED_MISSING_FUSED: u8 = 0x0a;
    pub const INVALID_NAMESPACE_OR_FORMAT: u8 = 0x0b;
    pub const COMMAND_SEQUENCE_ERROR: u8 = 0x0c;
    pub const NAMESPACE_WRITE_PROTECTED: u8 = 0x20;
    pub const LBA_OUT_OF_RANGE: u8 = 0x80;
    pub const CAPACITY_EXCEEDED: u8 = 0x81;
    pub const NAMESPACE_NOT_READY: u8 = 0x82;
    pub const RESERVATION_CONFLICT: u8 = 0x83;
    pub const FORMAT_IN_PROGRESS: u8 = 0x84;
}

/// Command specific status values (SCT 1).
pub mod command_specific {
    pub const FEATURE_NOT_SAVEABLE: u8 = 0x0d;
    pub const FEATURE_NOT_CHANGEABLE: u8 = 0x0e;
    pub const CONFLICTING_ATTRIBUTES: u8 = 0x80;
    pub const WRITE_TO_READ_ONLY_RANGE: u8 = 0x82;
}

/// Media and data integrity error values (SCT 2).
pub mod media_error {
    pub const WRITE_FAULT: u8 = 0x80;
    pub const UNRECOVERED_READ_ERROR: u8 = 0x81;
    pub const GUARD_CHECK_ERROR: u8 = 0x82;
    pub const APPLICATION_TAG_CHECK_ERROR: u8 = 0x83;
    pub const REFERENCE_TAG_CHECK_ERROR: u8 = 0x84;
    pub const COMPARE_FAILURE: u8 = 0x85;
    pub const ACCESS_DENIED: u8 = 0x86;
}

/// The status field of a completion queue entry.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NvmeStatus {
    pub sct: u8,
    pub sc: u8,
    pub more: bool,
    pub dnr: bool,
}

impl NvmeStatus {
    pub const SUCCESS: NvmeStatus = NvmeStatus::new(StatusCodeType::Generic, generic::SUCCESS);

    pub const fn new(sct: StatusCodeType, sc: u8) -> Self {
        NvmeStatus {
            sct: sct as u8,
            sc,
            more: false,
            dnr: false,
        }
    }

    pub fn code_type(&self) -> Option<StatusCodeType> {
        StatusCodeType::n(self.sct)
    }

    pub fn is_success(&self) -> bool {
        self.sct == StatusCodeType::Generic as u8 && self.sc == generic::SUCCESS
    }
}

impl fmt::Display for NvmeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sct {:#x} sc {:#04x}", self.sct, self.sc)?;
        if self.dnr {
            write!(f, " (dnr)")?;
        }
        Ok(())
    }
}

const DW3_PHASE: u32 = 1 << 16;
const DW3_SC_SHIFT: u32 = 17;
const DW3_SCT_SHIFT: u32 = 25;
const DW3_CRD_SHIFT: u32 = 28;
const DW3_MORE: u32 = 1 << 30;
const DW3_DNR: u32 = 1 << 31;

/// A completion queue entry.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct NvmeCompletion {
    /// Command specific result.
    pub dw0: u32,
    pub dw1: u32,
    /// Submission queue head pointer in bits 15:0, submission queue identifier in 31:16.
    pub dw2: u32,
    /// Command identifier, phase tag and status.
    pub dw3: u32,
}

const_assert_eq!(std::mem::size_of::<NvmeCompletion>(), 16);

impl NvmeCompletion {
    /// A completion carrying `status` and no command specific result.
    pub fn with_status(status: NvmeStatus) -> Self {
        let mut completion = NvmeCompletion::default();
        completion.set_status(status);
        completion
    }

    pub fn set_status(&mut self, status: NvmeStatus) {
        let mut dw3 = self.dw3 & (0xffff | DW3_PHASE);
        dw3 |= (status.sc as u32) << DW3_SC_SHIFT;
        dw3 |= ((status.sct & 0x7) as u32) << DW3_SCT_SHIFT;
        if status.more {
            dw3 |= DW3_MORE;
        }
        if status.dnr {
            dw3 |= DW3_DNR;
        }
        self.dw3 = dw3;
    }

    pub fn status(&self) -> NvmeStatus {
        NvmeStatus {
            sct: ((self.dw3 >> DW3_SCT_SHIFT) & 0x7) as u8,
            sc: (self.dw3 >> DW3_SC_SHIFT) as u8,
            more: self.dw3 & DW3_MORE != 0,
            dnr: self.dw3 & DW3_DNR != 0,
        }
    }

    pub fn command_retry_delay(&self) -> u8 {
        ((self.dw3 >> DW3_CRD_SHIFT) & 0x3) as u8
    }

    pub fn sq_head(&self) -> u16 {
        self.dw2 as u16
    }

    pub fn sq_id(&self) -> u16 {
        (self.dw2 >> 16) as u16
    }

    pub fn cid(&self) -> u16 {
        self.dw3 as u16
    }

    pub fn phase(&self) -> bool {
        self.dw3 & DW3_PHASE != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_bits() {
        let completion = NvmeCompletion {
            dw0: 0,
            dw1: 0,
            dw2: 0x0003_0011,
            // DNR, SCT 2, SC 0x81, phase, CID 7
            dw3: 0x8000_0000 | (2 << 25) | (0x81 << 17) | (1 << 16) | 7,
        };
        let status = completion.status();
        assert_eq!(status.code_type(), Some(StatusCodeType::MediaError));
        assert_eq!(status.sc, media_error::UNRECOVERED_READ_ERROR);
        assert!(status.dnr);
        assert!(!status.more);
        assert!(!status.is_success());
        assert!(completion.phase());
        assert_eq!(completion.cid(), 7);
        assert_eq!(completion.sq_head(), 0x11);
        assert_eq!(completion.sq_id(), 3);
    }

    #[test]
    fn set_status_keeps_cid_and_phase() {
        let mut completion = NvmeCompletion {
            dw3: DW3_PHASE | 0x42,
            ..Default::default()
        };
        let lba = NvmeStatus::new(StatusCodeType::Generic, generic::LBA_OUT_OF_RANGE);
        completion.set_status(lba);
        assert_eq!(completion.status(), lba);
        assert_eq!(completion.cid(), 0x42);
        assert!(completion.phase());
        completion.set_status(NvmeStatus::SUCCESS);
        assert!(completion.status().is_success());
    }

    #[test]
    fn display() {
        let status = NvmeStatus {
            dnr: true,
            ..NvmeStatus::new(StatusCodeType::Generic, generic::INVALID_FIELD_IN_COMMAND)
        };
        assert_eq!(status.to_string(), "sct 0x0 sc 0x02 (dnr)");
    }
}
