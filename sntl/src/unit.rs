// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::borrow::Cow;

use log::trace;
use nvme::FeatureSelect;
use nvme::IdentifyController;
use nvme::IdentifyNamespace;
use nvme::NvmeCommand;
use nvme::NvmeCompletion;
use nvme::SmartLog;
use nvme::CNS_CONTROLLER;
use nvme::CNS_NAMESPACE;
use nvme::FEATURE_VOLATILE_WRITE_CACHE;
use nvme::IDENTIFY_DATA_LEN;
use nvme::LOG_SMART_HEALTH;
use nvme::NSID_ALL;
use nvme::SMART_LOG_LEN;
use passthru::DataTransfer;
use passthru::Device;
use passthru::NvmeQueue;
use passthru::NvmeRequest;

use crate::Result;
use crate::TranslateError;

const VWC_ENABLE: u32 = 1 << 0;

/// The SCSI logical unit emulated on one NVMe namespace.
pub(crate) struct LogicalUnit<'a> {
    device: &'a Device,
}

impl<'a> LogicalUnit<'a> {
    pub fn new(device: &'a Device) -> Self {
        LogicalUnit { device }
    }

    pub fn nsid(&self) -> u32 {
        self.device.config().nsid
    }

    pub fn name(&self) -> &str {
        self.device.name()
    }

    pub fn admin(&self, command: NvmeCommand, data: DataTransfer) -> Result<NvmeCompletion> {
        self.submit(NvmeQueue::Admin, command, data)
    }

    pub fn io(&self, command: NvmeCommand, data: DataTransfer) -> Result<NvmeCompletion> {
        self.submit(NvmeQueue::Io, command, data)
    }

    /// Issues `command` and turns an unsuccessful completion status into an error.
    fn submit(
        &self,
        queue: NvmeQueue,
        command: NvmeCommand,
        data: DataTransfer,
    ) -> Result<NvmeCompletion> {
        trace!(
            "{}: nvme {:?} opcode {:#04x} nsid {:#x} cdw10 {:#x}",
            self.name(),
            queue,
            command.opcode(),
            command.nsid,
            command.cdw10
        );
        let completion = self.device.transport().send_nvme(NvmeRequest {
            command,
            queue,
            data,
            timeout: self.device.default_timeout(),
        })?;
        let status = completion.status();
        if status.is_success() {
            Ok(completion)
        } else {
            Err(TranslateError::Nvme(status))
        }
    }

    /// Identify Controller data, from the device cache if present.
    pub fn identify_controller(&self) -> Result<Cow<'a, IdentifyController>> {
        if let Some(controller) = &self.device.drive_info().controller {
            return Ok(Cow::Borrowed(controller));
        }
        let data = self.identify(CNS_CONTROLLER, 0)?;
        Ok(Cow::Owned(IdentifyController::from_bytes(&data)))
    }

    /// Identify Namespace data, from the device cache if present.
    pub fn identify_namespace(&self) -> Result<Cow<'a, IdentifyNamespace>> {
        if let Some(namespace) = &self.device.drive_info().namespace {
            return Ok(Cow::Borrowed(namespace));
        }
        let data = self.identify(CNS_NAMESPACE, self.nsid())?;
        Ok(Cow::Owned(IdentifyNamespace::from_bytes(&data)))
    }

    fn identify(&self, cns: u8, nsid: u32) -> Result<Vec<u8>> {
        let mut data = vec![0u8; IDENTIFY_DATA_LEN];
        self.admin(
            NvmeCommand::identify(cns, nsid),
            DataTransfer::FromDevice(&mut data),
        )?;
        Ok(data)
    }

    /// The controller-wide SMART / Health Information log.
    pub fn smart_log(&self) -> Result<SmartLog> {
        let mut log = SmartLog::default();
        self.admin(
            NvmeCommand::get_log_page(LOG_SMART_HEALTH, NSID_ALL, SMART_LOG_LEN),
            DataTransfer::FromDevice(log.as_bytes_mut()),
        )?;
        Ok(log)
    }

    /// Whether the volatile write cache is enabled, per the given Get Features select.
    pub fn write_cache_enabled(&self, select: FeatureSelect) -> Result<bool> {
        let completion = self.admin(
            NvmeCommand::get_features(FEATURE_VOLATILE_WRITE_CACHE, select),
            DataTransfer::None,
        )?;
        Ok(completion.dw0 & VWC_ENABLE != 0)
    }

    pub fn set_write_cache(&self, enable: bool, save: bool) -> Result<()> {
        let value = if enable { VWC_ENABLE } else { 0 };
        self.admin(
            NvmeCommand::set_features(FEATURE_VOLATILE_WRITE_CACHE, value, save),
            DataTransfer::None,
        )?;
        Ok(())
    }

    /// Whether translated errors are reported in descriptor format sense data.
    pub fn descriptor_sense(&self) -> bool {
        self.device.config().descriptor_sense
    }
}
