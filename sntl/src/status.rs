// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use nvme::command_specific;
use nvme::generic;
use nvme::media_error;
use nvme::NvmeStatus;
use nvme::StatusCodeType;
use scsi::constants::*;
use scsi::ScsiStatus;
use scsi::Sense;

/// Maps an NVMe completion status to the SCSI status and sense data the translated command
/// completes with.
pub fn nvme_status_to_scsi(status: NvmeStatus) -> (ScsiStatus, Option<Sense>) {
    let sense = match (status.code_type(), status.sc) {
        (Some(StatusCodeType::Generic), sc) => match sc {
            generic::SUCCESS => return (ScsiStatus::Good, None),
            generic::INVALID_COMMAND_OPCODE => {
                Sense::new(ILLEGAL_REQUEST, ASC_INVALID_COMMAND_OPERATION_CODE, 0)
            }
            generic::INVALID_FIELD_IN_COMMAND => {
                Sense::new(ILLEGAL_REQUEST, ASC_INVALID_FIELD_IN_CDB, 0)
            }
            generic::DATA_TRANSFER_ERROR | generic::CAPACITY_EXCEEDED => {
                Sense::new(MEDIUM_ERROR, 0, 0)
            }
            generic::ABORTED_POWER_LOSS
            | generic::ABORT_REQUESTED
            | generic::ABORTED_SQ_DELETION
            | generic::ABORTED_FAILED_FUSED
            | generic::ABORTED_MISSING_FUSED => return (ScsiStatus::TaskAborted, None),
            generic::INTERNAL_ERROR => Sense::new(HARDWARE_ERROR, ASC_INTERNAL_TARGET_FAILURE, 0),
            generic::INVALID_NAMESPACE_OR_FORMAT => {
                Sense::new(ILLEGAL_REQUEST, ASC_LOGICAL_UNIT_NOT_SUPPORTED, 0)
            }
            generic::COMMAND_SEQUENCE_ERROR => {
                Sense::new(ILLEGAL_REQUEST, ASC_COMMAND_SEQUENCE_ERROR, 0)
            }
            generic::NAMESPACE_WRITE_PROTECTED => {
                Sense::new(DATA_PROTECT, ASC_WRITE_PROTECTED, 0)
            }
            generic::LBA_OUT_OF_RANGE => Sense::new(ILLEGAL_REQUEST, ASC_LBA_OUT_OF_RANGE, 0),
            generic::NAMESPACE_NOT_READY => Sense::new(NOT_READY, ASC_LOGICAL_UNIT_NOT_READY, 0),
            generic::RESERVATION_CONFLICT => return (ScsiStatus::ReservationConflict, None),
            generic::FORMAT_IN_PROGRESS => Sense::new(
                NOT_READY,
                ASC_LOGICAL_UNIT_NOT_READY,
                ASCQ_FORMAT_IN_PROGRESS,
            ),
            _ => Sense::new(ABORTED_COMMAND, 0, 0),
        },
        (Some(StatusCodeType::CommandSpecific), sc) => match sc {
            command_specific::FEATURE_NOT_SAVEABLE => {
                Sense::new(ILLEGAL_REQUEST, ASC_SAVING_PARAMETERS_NOT_SUPPORTED, 0)
            }
            command_specific::FEATURE_NOT_CHANGEABLE | command_specific::CONFLICTING_ATTRIBUTES => {
                Sense::new(ILLEGAL_REQUEST, ASC_INVALID_FIELD_IN_CDB, 0)
            }
            command_specific::WRITE_TO_READ_ONLY_RANGE => {
                Sense::new(DATA_PROTECT, ASC_WRITE_PROTECTED, 0)
            }
            _ => Sense::new(ABORTED_COMMAND, 0, 0),
        },
        (Some(StatusCodeType::MediaError), sc) => match sc {
            media_error::WRITE_FAULT => {
                Sense::new(MEDIUM_ERROR, ASC_PERIPHERAL_DEVICE_WRITE_FAULT, 0)
            }
            media_error::UNRECOVERED_READ_ERROR => {
                Sense::new(MEDIUM_ERROR, ASC_UNRECOVERED_READ_ERROR, 0)
            }
            media_error::GUARD_CHECK_ERROR => Sense::new(
                MEDIUM_ERROR,
                ASC_LOGICAL_BLOCK_CHECK_FAILED,
                ASCQ_GUARD_CHECK_FAILED,
            ),
            media_error::APPLICATION_TAG_CHECK_ERROR => Sense::new(
                MEDIUM_ERROR,
                ASC_LOGICAL_BLOCK_CHECK_FAILED,
                ASCQ_APPLICATION_TAG_CHECK_FAILED,
            ),
            media_error::REFERENCE_TAG_CHECK_ERROR => Sense::new(
                MEDIUM_ERROR,
                ASC_LOGICAL_BLOCK_CHECK_FAILED,
                ASCQ_REFERENCE_TAG_CHECK_FAILED,
            ),
            media_error::COMPARE_FAILURE => Sense::new(MISCOMPARE, ASC_MISCOMPARE_DURING_VERIFY, 0),
            media_error::ACCESS_DENIED => Sense::new(
                DATA_PROTECT,
                ASC_INVALID_COMMAND_OPERATION_CODE,
                ASCQ_NO_ACCESS_RIGHTS,
            ),
            _ => Sense::new(ABORTED_COMMAND, 0, 0),
        },
        _ => Sense::new(ABORTED_COMMAND, 0, 0),
    };
    (ScsiStatus::CheckCondition, Some(sense))
}
