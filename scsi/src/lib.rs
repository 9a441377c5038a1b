// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! SCSI definitions shared by the SAT and SNTL translators.

pub mod constants;
mod sense;

pub use sense::descriptors;
pub use sense::Descriptors;
pub use sense::Sense;
pub use sense::SenseDescriptor;
pub use sense::SenseFormat;
pub use sense::DESCRIPTOR_ADDITIONAL_LENGTH;
pub use sense::DESCRIPTOR_SENSE_HEADER_LEN;
pub use sense::FIXED_ADDITIONAL_LENGTH;
pub use sense::FIXED_ASC;
pub use sense::FIXED_ASCQ;
pub use sense::FIXED_COMMAND_SPECIFIC_INFORMATION;
pub use sense::FIXED_INFORMATION;
pub use sense::FIXED_SENSE_KEY;
pub use sense::FIXED_SENSE_LEN;
pub use sense::SENSE_BUFFER_LEN;

/// SAM status codes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, enumn::N)]
#[repr(u8)]
pub enum ScsiStatus {
    Good = 0x00,
    /// Indicates that sense data has been delivered in the buffer.
    CheckCondition = 0x02,
    Busy = 0x08,
    ReservationConflict = 0x18,
    TaskSetFull = 0x28,
    AcaActive = 0x30,
    TaskAborted = 0x40,
}

impl ScsiStatus {
    pub fn is_good(self) -> bool {
        self == ScsiStatus::Good
    }
}
