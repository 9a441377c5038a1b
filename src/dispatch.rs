// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Routes a request to the translation its device's interface needs.

use std::time::Duration;

use ata::sat::send_sat_passthrough;
use ata::sat::SatOutcome;
use ata::AtaCommand;
use log::debug;
use nvme::NvmeCommand;
use nvme::NvmeCompletion;
use passthru::DataTransfer;
use passthru::Device;
use passthru::Error;
use passthru::InterfaceType;
use passthru::NvmeQueue;
use passthru::NvmeRequest;
use passthru::Result;
use passthru::ScsiCompletion;
use passthru::ScsiContext;
use passthru::ScsiRequest;

/// Issues the SCSI command in `ctx`.
///
/// SCSI and ATA devices receive the CDB as is. On an NVMe device the command is translated into
/// NVMe commands.
pub fn send_scsi_command(device: &Device, ctx: &mut ScsiContext) -> Result<ScsiCompletion> {
    match device.interface() {
        InterfaceType::Scsi | InterfaceType::Ata => {
            let Some(&opcode) = ctx.cdb.first() else {
                return Err(Error::BadParameter("empty cdb".to_string()));
            };
            debug!("{}: scsi command {:#04x}", device.name(), opcode);
            // The transport does not report a residual count.
            let len = ctx.data.len();
            let reply = device.transport().send_scsi(ScsiRequest {
                cdb: ctx.cdb,
                data: ctx.data.reborrow(),
                sense: &mut *ctx.sense,
                timeout: device.default_timeout(),
            })?;
            Ok(ScsiCompletion {
                status: reply.status,
                sense_len: reply.sense_len.min(ctx.sense.len()),
                transferred: if reply.status.is_good() { len } else { 0 },
            })
        }
        InterfaceType::Nvme => sntl::translate_scsi_command(device, ctx),
    }
}

/// Issues an ATA command through ATA PASS-THROUGH and records the returned registers in
/// `cmd.rtfr`.
pub fn send_ata_command(
    device: &Device,
    cmd: &mut AtaCommand,
    data: DataTransfer,
) -> Result<SatOutcome> {
    match device.interface() {
        InterfaceType::Ata | InterfaceType::Scsi => send_sat_passthrough(device, cmd, data),
        InterfaceType::Nvme => Err(Error::NotSupported(format!(
            "ATA command {:#04x} on NVMe device {}",
            cmd.taskfile.command,
            device.name()
        ))),
    }
}

/// Issues an NVMe command on `queue`. A `timeout` of `None` uses the device default.
///
/// The completion is returned whatever its status.
pub fn send_nvme_command(
    device: &Device,
    command: NvmeCommand,
    queue: NvmeQueue,
    data: DataTransfer,
    timeout: Option<Duration>,
) -> Result<NvmeCompletion> {
    match device.interface() {
        InterfaceType::Nvme => {
            debug!(
                "{}: nvme {:?} command {:#04x}",
                device.name(),
                queue,
                command.opcode()
            );
            device.transport().send_nvme(NvmeRequest {
                command,
                queue,
                data,
                timeout: timeout.unwrap_or_else(|| device.default_timeout()),
            })
        }
        InterfaceType::Scsi | InterfaceType::Ata => Err(Error::NotSupported(format!(
            "NVMe command {:#04x} on {:?} device {}",
            command.opcode(),
            device.interface(),
            device.name()
        ))),
    }
}
