// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! SCSI to NVMe translation.
//!
//! [`translate_scsi_command`] emulates a SCSI direct access block device on top of an NVMe
//! namespace. Each CDB is parsed into a [`commands::Command`] and carried out with zero or more
//! NVMe commands. A command the device fails, or a CDB that cannot be translated, completes with
//! CHECK CONDITION and sense data in the device's configured sense format.

mod capacity;
mod commands;
mod data;
mod inquiry;
mod log_sense;
mod mode;
mod rw;
mod status;
mod unit;

#[cfg(test)]
mod test_helpers;

use log::debug;
use nvme::NvmeStatus;
use passthru::Device;
use passthru::ScsiCompletion;
use passthru::ScsiContext;
use remain::sorted;
use scsi::constants::*;
use scsi::ScsiStatus;
use scsi::Sense;
use thiserror::Error as ThisError;

pub use commands::Command;
pub use status::nvme_status_to_scsi;

use crate::unit::LogicalUnit;

/// Errors that happen while translating a SCSI command.
///
/// Everything but [`TranslateError::Passthru`] completes the SCSI command with a status and
/// sense data instead of failing the request.
#[sorted]
#[derive(ThisError, Debug)]
pub enum TranslateError {
    #[error("invalid cdb field")]
    InvalidField,
    #[error("invalid field in parameter list")]
    InvalidParamField,
    #[error("logical block address out of range")]
    LbaOutOfRange,
    #[error("nvme command failed: {0}")]
    Nvme(NvmeStatus),
    #[error("parameter list length error")]
    ParamListLength,
    /// The request could not be carried out at all. Returned to the caller as is.
    #[error(transparent)]
    Passthru(#[from] passthru::Error),
    #[error("saving parameters not supported")]
    SavingParamNotSupported,
    #[error("unsupported scsi command: {0:#04x}")]
    Unsupported(u8),
}

impl TranslateError {
    /// The status and sense data the SCSI command completes with. The asc and ascq assignments
    /// are taken from the t10 SPC spec.
    pub fn as_status(&self) -> (ScsiStatus, Option<Sense>) {
        let sense = match self {
            TranslateError::InvalidField => {
                Sense::new(ILLEGAL_REQUEST, ASC_INVALID_FIELD_IN_CDB, 0)
            }
            TranslateError::InvalidParamField => {
                Sense::new(ILLEGAL_REQUEST, ASC_INVALID_FIELD_IN_PARAMETER_LIST, 0)
            }
            TranslateError::LbaOutOfRange => Sense::new(ILLEGAL_REQUEST, ASC_LBA_OUT_OF_RANGE, 0),
            TranslateError::Nvme(status) => return nvme_status_to_scsi(*status),
            TranslateError::ParamListLength => {
                Sense::new(ILLEGAL_REQUEST, ASC_PARAMETER_LIST_LENGTH_ERROR, 0)
            }
            // Never reported through sense data.
            TranslateError::Passthru(_) => Sense::new(ABORTED_COMMAND, 0, 0),
            TranslateError::SavingParamNotSupported => {
                Sense::new(ILLEGAL_REQUEST, ASC_SAVING_PARAMETERS_NOT_SUPPORTED, 0)
            }
            TranslateError::Unsupported(_) => {
                Sense::new(ILLEGAL_REQUEST, ASC_INVALID_COMMAND_OPERATION_CODE, 0)
            }
        };
        (ScsiStatus::CheckCondition, Some(sense))
    }
}

pub type Result<T> = std::result::Result<T, TranslateError>;

/// Translates the SCSI command in `ctx` into NVMe commands on `device`.
///
/// Returns `Err` only for transport failures and for requests the caller built wrong: an empty
/// or truncated CDB, a data buffer in the wrong direction, or one shorter than the transfer.
pub fn translate_scsi_command(
    device: &Device,
    ctx: &mut ScsiContext,
) -> passthru::Result<ScsiCompletion> {
    let unit = LogicalUnit::new(device);
    let result = Command::new(ctx.cdb).and_then(|command| command.execute(&unit, &mut ctx.data));
    match result {
        Ok(transferred) => Ok(ScsiCompletion {
            status: ScsiStatus::Good,
            sense_len: 0,
            transferred,
        }),
        Err(TranslateError::Passthru(e)) => Err(e),
        Err(e) => {
            debug!(
                "{}: scsi command {:#04x} failed: {}",
                device.name(),
                ctx.cdb[0],
                e
            );
            let (status, sense) = e.as_status();
            let sense_len = sense.map_or(0, |sense| sense.write(device.sense_format(), ctx.sense));
            Ok(ScsiCompletion {
                status,
                sense_len,
                transferred: 0,
            })
        }
    }
}
