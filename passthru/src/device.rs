// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fmt;
use std::time::Duration;

use log::debug;
use nvme::IdentifyController;
use nvme::IdentifyNamespace;
use nvme::NvmeCommand;
use nvme::CNS_CONTROLLER;
use nvme::CNS_NAMESPACE;
use nvme::IDENTIFY_DATA_LEN;
use scsi::SenseFormat;

use crate::DataTransfer;
use crate::DeviceConfig;
use crate::Error;
use crate::InterfaceType;
use crate::NvmeQueue;
use crate::NvmeRequest;
use crate::Result;
use crate::Transport;

/// Identify data cached when the device was opened.
#[derive(Clone, Debug, Default)]
pub struct DriveInfo {
    pub controller: Option<IdentifyController>,
    pub namespace: Option<IdentifyNamespace>,
}

/// An open device: its transport, configuration and cached Identify data.
pub struct Device {
    name: String,
    config: DeviceConfig,
    transport: Box<dyn Transport>,
    drive_info: DriveInfo,
}

impl Device {
    pub fn new(name: impl Into<String>, config: DeviceConfig, transport: Box<dyn Transport>) -> Self {
        Device {
            name: name.into(),
            config,
            transport,
            drive_info: DriveInfo::default(),
        }
    }

    pub fn with_drive_info(mut self, drive_info: DriveInfo) -> Self {
        self.drive_info = drive_info;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn interface(&self) -> InterfaceType {
        self.config.interface
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs.into())
    }

    pub fn drive_info(&self) -> &DriveInfo {
        &self.drive_info
    }

    /// The sense data format translated errors are reported in.
    pub fn sense_format(&self) -> SenseFormat {
        if self.config.descriptor_sense {
            SenseFormat::Descriptor
        } else {
            SenseFormat::Fixed
        }
    }

    /// Reads Identify Controller and Identify Namespace from an NVMe device and caches them.
    pub fn refresh_drive_info(&mut self) -> Result<()> {
        if self.config.interface != InterfaceType::Nvme {
            return Err(Error::NotSupported(format!(
                "{}: identify data is only cached for NVMe devices",
                self.name
            )));
        }
        let controller = self.identify(CNS_CONTROLLER, 0)?;
        let namespace = self.identify(CNS_NAMESPACE, self.config.nsid)?;
        self.drive_info = DriveInfo {
            controller: Some(IdentifyController::from_bytes(&controller)),
            namespace: Some(IdentifyNamespace::from_bytes(&namespace)),
        };
        debug!("{}: cached identify data {:?}", self.name, self.drive_info);
        Ok(())
    }

    fn identify(&self, cns: u8, nsid: u32) -> Result<Vec<u8>> {
        let mut data = vec![0u8; IDENTIFY_DATA_LEN];
        let completion = self.transport.send_nvme(NvmeRequest {
            command: NvmeCommand::identify(cns, nsid),
            queue: NvmeQueue::Admin,
            data: DataTransfer::FromDevice(&mut data),
            timeout: self.default_timeout(),
        })?;
        let status = completion.status();
        if !status.is_success() {
            return Err(Error::DeviceCommunication(format!(
                "{}: identify cns {:#x} failed: {}",
                self.name, cns, status
            )));
        }
        Ok(data)
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish()
    }
}
