// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use log::debug;
use log::warn;
use passthru::DataTransfer;
use passthru::Device;
use passthru::Error;
use passthru::Result;
use passthru::ScsiRequest;
use scsi::ScsiStatus;
use scsi::Sense;
use scsi::SENSE_BUFFER_LEN;

use crate::sat::build_sat_cdb;
use crate::sat::extract_rtfrs;
use crate::sat::SatOptions;
use crate::AtaCommand;
use crate::Direction;

/// How the device completed an ATA PASS-THROUGH command.
///
/// A device-reported error arrives here as a CHECK CONDITION status with its sense data, not as
/// an `Err`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SatOutcome {
    pub status: ScsiStatus,
    pub sense: Option<Sense>,
}

impl SatOutcome {
    pub fn is_good(&self) -> bool {
        self.status.is_good()
    }
}

fn check_transfer(cmd: &AtaCommand, data: &DataTransfer) -> Result<()> {
    let matches = matches!(
        (cmd.direction, data),
        (Direction::NoData, DataTransfer::None)
            | (Direction::In, DataTransfer::FromDevice(_))
            | (Direction::Out, DataTransfer::ToDevice(_))
    );
    if matches {
        Ok(())
    } else {
        Err(Error::BadParameter(format!(
            "{:?} command given a {} byte {} buffer",
            cmd.direction,
            data.len(),
            match data {
                DataTransfer::None => "empty",
                DataTransfer::FromDevice(_) => "read",
                DataTransfer::ToDevice(_) => "write",
            }
        )))
    }
}

/// Issues `cmd` as an ATA PASS-THROUGH command on `device` and fills `cmd.rtfr` with whatever
/// registers the sense data carries.
///
/// Registers are recovered whether or not the command succeeded, unless the passthrough request
/// never reached the device.
pub fn send_sat_passthrough(
    device: &Device,
    cmd: &mut AtaCommand,
    data: DataTransfer,
) -> Result<SatOutcome> {
    cmd.rtfr = None;
    check_transfer(cmd, &data)?;
    let cdb = build_sat_cdb(cmd, &SatOptions::from(device.config()))?;
    let mut sense = [0u8; SENSE_BUFFER_LEN];
    let timeout = cmd.timeout.unwrap_or_else(|| device.default_timeout());

    debug!(
        "{}: ATA command {:#04x} {:?}",
        device.name(),
        cmd.taskfile.command,
        cmd.protocol
    );
    let result = device.transport().send_scsi(ScsiRequest {
        cdb: cdb.as_bytes(),
        data,
        sense: &mut sense,
        timeout,
    });

    let result = match result {
        Err(Error::PassthroughFailure(e)) => {
            debug!("{}: passthrough failed, no registers: {}", device.name(), e);
            return Err(Error::PassthroughFailure(e));
        }
        other => other,
    };
    let sense_len = match &result {
        Ok(reply) => reply.sense_len.min(SENSE_BUFFER_LEN),
        // The device may have been reached; look at whatever sense data came back.
        Err(_) => SENSE_BUFFER_LEN,
    };
    let sense = &sense[..sense_len];

    match extract_rtfrs(device, sense, cmd) {
        Ok(rtfr) => cmd.rtfr = rtfr,
        Err(e) => warn!(
            "{}: could not recover registers of ATA command {:#04x}: {}",
            device.name(),
            cmd.taskfile.command,
            e
        ),
    }

    let reply = result?;
    Ok(SatOutcome {
        status: reply.status,
        sense: Sense::parse(sense),
    })
}
