// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Interfaces between the command translators and the OS passthrough backends.
//!
//! A backend implements [`Transport`] for one device handle. The translators only ever see a
//! [`Device`], which pairs that transport with its configuration and cached Identify data.

use std::io;
use std::time::Duration;

use nvme::NvmeCommand;
use nvme::NvmeCompletion;
use remain::sorted;
use scsi::ScsiStatus;
use thiserror::Error;

mod config;
mod device;

pub use config::DeviceConfig;
pub use config::InterfaceType;
pub use config::DEFAULT_TIMEOUT_SECS;
pub use device::Device;
pub use device::DriveInfo;

#[sorted]
#[derive(Error, Debug)]
pub enum Error {
    /// The command descriptor is malformed.
    #[error("bad parameter: {0}")]
    BadParameter(String),
    /// The device was reached but a command needed to complete the request failed.
    #[error("device communication error: {0}")]
    DeviceCommunication(String),
    /// The request has no equivalent on this device or transport.
    #[error("not supported: {0}")]
    NotSupported(String),
    /// The OS passthrough layer failed before the device was reached.
    #[error("passthrough request failed: {0}")]
    PassthroughFailure(#[source] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The data phase of a command.
#[derive(Debug)]
pub enum DataTransfer<'a> {
    None,
    /// Data moves from the device into the buffer.
    FromDevice(&'a mut [u8]),
    /// Data moves from the buffer to the device.
    ToDevice(&'a [u8]),
}

impl DataTransfer<'_> {
    pub fn len(&self) -> usize {
        match self {
            DataTransfer::None => 0,
            DataTransfer::FromDevice(buf) => buf.len(),
            DataTransfer::ToDevice(buf) => buf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reborrows the transfer for a shorter lifetime so it can be handed to a transport more
    /// than once.
    pub fn reborrow(&mut self) -> DataTransfer<'_> {
        match self {
            DataTransfer::None => DataTransfer::None,
            DataTransfer::FromDevice(buf) => DataTransfer::FromDevice(&mut **buf),
            DataTransfer::ToDevice(buf) => DataTransfer::ToDevice(&**buf),
        }
    }
}

/// A SCSI command handed to the transport.
#[derive(Debug)]
pub struct ScsiRequest<'a> {
    pub cdb: &'a [u8],
    pub data: DataTransfer<'a>,
    /// Receives sense data returned with the command.
    pub sense: &'a mut [u8],
    pub timeout: Duration,
}

/// What the transport reports for a SCSI command the device completed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScsiReply {
    pub status: ScsiStatus,
    /// Number of valid bytes written to the request's sense buffer.
    pub sense_len: usize,
}

/// Which queue an NVMe command is submitted to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NvmeQueue {
    Admin,
    Io,
}

/// An NVMe command handed to the transport.
#[derive(Debug)]
pub struct NvmeRequest<'a> {
    pub command: NvmeCommand,
    pub queue: NvmeQueue,
    pub data: DataTransfer<'a>,
    pub timeout: Duration,
}

/// A SCSI command to be translated or passed through: the CDB, its data phase and a buffer for
/// sense data.
#[derive(Debug)]
pub struct ScsiContext<'a> {
    pub cdb: &'a [u8],
    pub data: DataTransfer<'a>,
    pub sense: &'a mut [u8],
}

/// The outcome of a SCSI command issued through a [`ScsiContext`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScsiCompletion {
    pub status: ScsiStatus,
    /// Number of valid bytes in the context's sense buffer.
    pub sense_len: usize,
    /// Number of data bytes moved.
    pub transferred: usize,
}

/// A device handle as seen by the translators. Implemented by each OS passthrough backend.
///
/// Methods take `&self`; a backend that cannot issue commands concurrently on one handle
/// serializes them itself.
pub trait Transport: Send + Sync {
    /// Issues a SCSI command and waits for it to complete.
    ///
    /// `Ok` means the device completed the command, whatever its status. An error means the
    /// command may not have reached the device.
    fn send_scsi(&self, request: ScsiRequest) -> Result<ScsiReply>;

    /// Issues an NVMe command and waits for its completion queue entry.
    fn send_nvme(&self, request: NvmeRequest) -> Result<NvmeCompletion> {
        let _ = request;
        Err(Error::NotSupported(
            "transport does not carry NVMe commands".to_string(),
        ))
    }
}
