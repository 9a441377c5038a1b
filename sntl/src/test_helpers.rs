// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! A scripted NVMe transport and a namespace to translate against.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::Mutex;

use nvme::IdentifyController;
use nvme::IdentifyNamespace;
use nvme::NvmeCommand;
use nvme::NvmeCompletion;
use nvme::NvmeStatus;
use nvme::StatusCodeType;
use nvme::IDENTIFY_DATA_LEN;
use passthru::DataTransfer;
use passthru::Device;
use passthru::DeviceConfig;
use passthru::DriveInfo;
use passthru::Error;
use passthru::InterfaceType;
use passthru::NvmeQueue;
use passthru::NvmeRequest;
use passthru::Result;
use passthru::ScsiReply;
use passthru::ScsiRequest;
use passthru::Transport;

pub(crate) const NSID: u32 = 1;
/// 2 TiB of 512 byte blocks.
pub(crate) const NAMESPACE_BLOCKS: u64 = 1 << 32;

pub(crate) enum MockNvmeReply {
    Completion { completion: NvmeCompletion, data: Vec<u8> },
    PassthroughFailure,
}

impl MockNvmeReply {
    pub fn success() -> Self {
        Self::success_with_data(Vec::new())
    }

    pub fn success_with_data(data: Vec<u8>) -> Self {
        MockNvmeReply::Completion {
            completion: NvmeCompletion::default(),
            data,
        }
    }

    /// A successful completion with a command specific result in dword 0.
    pub fn success_with_dw0(dw0: u32) -> Self {
        MockNvmeReply::Completion {
            completion: NvmeCompletion {
                dw0,
                ..Default::default()
            },
            data: Vec::new(),
        }
    }

    pub fn status(sct: StatusCodeType, sc: u8) -> Self {
        MockNvmeReply::Completion {
            completion: NvmeCompletion::with_status(NvmeStatus::new(sct, sc)),
            data: Vec::new(),
        }
    }
}

#[derive(Default)]
struct MockState {
    replies: Mutex<VecDeque<MockNvmeReply>>,
    commands: Mutex<Vec<(NvmeQueue, NvmeCommand)>>,
    data_out: Mutex<Vec<Vec<u8>>>,
}

/// Completes each NVMe command with the next queued reply, or success once the queue is empty.
#[derive(Clone, Default)]
pub(crate) struct MockNvme {
    state: Arc<MockState>,
}

impl MockNvme {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: MockNvmeReply) {
        self.state.replies.lock().unwrap().push_back(reply);
    }

    /// Every command issued so far, with the queue it went to.
    pub fn commands(&self) -> Vec<(NvmeQueue, NvmeCommand)> {
        self.state.commands.lock().unwrap().clone()
    }

    /// The payload of every command that wrote data.
    pub fn data_out(&self) -> Vec<Vec<u8>> {
        self.state.data_out.lock().unwrap().clone()
    }
}

impl Transport for MockNvme {
    fn send_scsi(&self, _request: ScsiRequest) -> Result<ScsiReply> {
        Err(Error::NotSupported("scsi on an nvme mock".to_string()))
    }

    fn send_nvme(&self, request: NvmeRequest) -> Result<NvmeCompletion> {
        self.state
            .commands
            .lock()
            .unwrap()
            .push((request.queue, request.command));
        let reply = self
            .state
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(MockNvmeReply::success);
        match (reply, request.data) {
            (MockNvmeReply::PassthroughFailure, _) => Err(Error::PassthroughFailure(
                io::Error::from(io::ErrorKind::TimedOut),
            )),
            (MockNvmeReply::Completion { completion, data }, DataTransfer::FromDevice(buf)) => {
                let len = data.len().min(buf.len());
                buf[..len].copy_from_slice(&data[..len]);
                Ok(completion)
            }
            (MockNvmeReply::Completion { completion, .. }, DataTransfer::ToDevice(buf)) => {
                self.state.data_out.lock().unwrap().push(buf.to_vec());
                Ok(completion)
            }
            (MockNvmeReply::Completion { completion, .. }, DataTransfer::None) => Ok(completion),
        }
    }
}

pub(crate) fn nvme_config() -> DeviceConfig {
    DeviceConfig {
        nsid: NSID,
        ..DeviceConfig::new(InterfaceType::Nvme)
    }
}

/// Identify Controller of a controller with a volatile write cache, DSM and a 1 MiB MDTS.
pub(crate) fn controller_data() -> Vec<u8> {
    let mut data = vec![0u8; IDENTIFY_DATA_LEN];
    data[0..2].copy_from_slice(&0x1b36u16.to_le_bytes());
    fill(&mut data[4..24], b"SN0123456789");
    fill(&mut data[24..64], b"Example NVMe Model With A Long Name");
    fill(&mut data[64..72], b"FW1.2");
    data[73..76].copy_from_slice(&[0x56, 0x34, 0x12]);
    // MDTS 8: 4 KiB << 8 = 1 MiB.
    data[77] = 8;
    // Warning and critical composite temperature thresholds, Kelvin.
    data[266..268].copy_from_slice(&343u16.to_le_bytes());
    data[268..270].copy_from_slice(&358u16.to_le_bytes());
    data[516..520].copy_from_slice(&1u32.to_le_bytes());
    // ONCS: Dataset Management.
    data[520] = 1 << 2;
    // VWC present.
    data[525] = 1;
    data
}

/// Identify Namespace of a thin-provisioned namespace formatted with 512 byte blocks.
pub(crate) fn namespace_data() -> Vec<u8> {
    let mut data = vec![0u8; IDENTIFY_DATA_LEN];
    data[0..8].copy_from_slice(&NAMESPACE_BLOCKS.to_le_bytes());
    data[8..16].copy_from_slice(&NAMESPACE_BLOCKS.to_le_bytes());
    data[16..24].copy_from_slice(&(NAMESPACE_BLOCKS / 2).to_le_bytes());
    // Thin provisioning.
    data[24] = 1;
    // Two LBA formats, formatted with the first.
    data[25] = 1;
    data[26] = 0;
    // Deallocated blocks read as zeroes.
    data[33] = 1;
    data[104..120].copy_from_slice(&[
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee,
        0xff,
    ]);
    // LBAF0: 512 bytes, LBAF1: 4096 bytes.
    data[128 + 2] = 9;
    data[132 + 2] = 12;
    data
}

fn fill(field: &mut [u8], s: &[u8]) {
    field.fill(b' ');
    field[..s.len()].copy_from_slice(s);
}

/// An NVMe device with Identify data already cached.
pub(crate) fn nvme_device(mock: &MockNvme) -> Device {
    nvme_device_with(mock, |_, _| {})
}

/// Like `nvme_device`, with the cached Identify Controller and Identify Namespace bytes edited by
/// `edit` first.
pub(crate) fn nvme_device_with(mock: &MockNvme, edit: impl FnOnce(&mut [u8], &mut [u8])) -> Device {
    let mut controller = controller_data();
    let mut namespace = namespace_data();
    edit(&mut controller, &mut namespace);
    Device::new("nvme0n1", nvme_config(), Box::new(mock.clone())).with_drive_info(DriveInfo {
        controller: Some(IdentifyController::from_bytes(&controller)),
        namespace: Some(IdentifyNamespace::from_bytes(&namespace)),
    })
}

/// A SMART / Health Information log.
pub(crate) fn smart_log_data(
    critical_warning: u8,
    temperature_kelvin: u16,
    percentage_used: u8,
) -> Vec<u8> {
    let mut data = vec![0u8; nvme::SMART_LOG_LEN];
    data[0] = critical_warning;
    data[1..3].copy_from_slice(&temperature_kelvin.to_le_bytes());
    data[3] = 100;
    data[4] = 10;
    data[5] = percentage_used;
    data
}
