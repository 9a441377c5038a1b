// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Storage command passthrough for SCSI, ATA and NVMe devices.
//!
//! A [`Device`] pairs an OS passthrough [`Transport`] with the command set the device speaks. The
//! functions here route each request the way that command set needs: ATA commands are wrapped in
//! ATA PASS-THROUGH CDBs, and SCSI commands sent to an NVMe device are translated into NVMe
//! commands.

mod config;
mod dispatch;

pub use ata;
pub use config::load_device_config;
pub use config::ConfigError;
pub use dispatch::send_ata_command;
pub use dispatch::send_nvme_command;
pub use dispatch::send_scsi_command;
pub use nvme;
pub use passthru;
pub use passthru::Device;
pub use passthru::DeviceConfig;
pub use passthru::Error;
pub use passthru::InterfaceType;
pub use passthru::Result;
pub use passthru::Transport;
pub use scsi;
pub use sntl;
