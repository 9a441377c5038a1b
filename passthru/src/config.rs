// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use serde::Deserialize;
use serde::Serialize;

/// Command timeout used when neither the command nor the configuration names one.
pub const DEFAULT_TIMEOUT_SECS: u32 = 15;

fn device_config_timeout_secs_default() -> u32 {
    DEFAULT_TIMEOUT_SECS
}

fn device_config_nsid_default() -> u32 {
    1
}

/// The command set a device speaks natively.
#[derive(Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceType {
    Scsi,
    /// An ATA device reached through a SCSI transport.
    Ata,
    Nvme,
}

/// Parameters for setting up a device.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct DeviceConfig {
    /// The command set the device speaks.
    pub interface: InterfaceType,
    /// Default command timeout in seconds.
    #[serde(default = "device_config_timeout_secs_default")]
    pub timeout_secs: u32,
    /// Namespace the SCSI translation addresses on an NVMe device.
    #[serde(default = "device_config_nsid_default")]
    pub nsid: u32,
    /// Build 16-byte ATA PASS-THROUGH CDBs for 28-bit commands too.
    #[serde(default)]
    pub force_16_byte_sat: bool,
    /// Whether the SATL accepts a transfer length in the TPSIU field.
    #[serde(default)]
    pub tpsiu: bool,
    /// Report translated errors with descriptor format sense data.
    #[serde(default)]
    pub descriptor_sense: bool,
}

impl DeviceConfig {
    pub fn new(interface: InterfaceType) -> Self {
        DeviceConfig {
            interface,
            timeout_secs: device_config_timeout_secs_default(),
            nsid: device_config_nsid_default(),
            force_16_byte_sat: false,
            tpsiu: false,
            descriptor_sense: false,
        }
    }
}
