// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! A scripted SCSI transport and sense data builders for SAT tests.

use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::sync::Mutex;

use passthru::DataTransfer;
use passthru::Device;
use passthru::DeviceConfig;
use passthru::Error;
use passthru::InterfaceType;
use passthru::Result;
use passthru::ScsiReply;
use passthru::ScsiRequest;
use passthru::Transport;
use scsi::constants::ASCQ_ATA_PASS_THROUGH_INFORMATION_AVAILABLE;
use scsi::constants::ASC_NO_ADDITIONAL_SENSE;
use scsi::constants::LOG_PAGE_ATA_PASS_THROUGH_RESULTS;
use scsi::constants::RECOVERED_ERROR;
use scsi::ScsiStatus;
use scsi::Sense;
use scsi::SenseFormat;
use scsi::FIXED_SENSE_LEN;
use zerocopy::IntoBytes;

use crate::sat::AtaReturnDescriptor;
use crate::Rtfr;

pub(crate) enum MockOutcome {
    Status(ScsiStatus),
    PassthroughFailure,
}

pub(crate) struct MockReply {
    outcome: MockOutcome,
    sense: Vec<u8>,
    data: Vec<u8>,
}

impl MockReply {
    pub fn good() -> Self {
        MockReply {
            outcome: MockOutcome::Status(ScsiStatus::Good),
            sense: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn good_with_data(data: Vec<u8>) -> Self {
        MockReply {
            data,
            ..Self::good()
        }
    }

    pub fn with_sense(status: ScsiStatus, sense: Vec<u8>) -> Self {
        MockReply {
            outcome: MockOutcome::Status(status),
            sense,
            data: Vec::new(),
        }
    }

    pub fn check_condition(sense: Sense) -> Self {
        let mut buf = vec![0u8; FIXED_SENSE_LEN];
        sense.write(SenseFormat::Fixed, &mut buf);
        Self::with_sense(ScsiStatus::CheckCondition, buf)
    }

    /// The OS fails the request, leaving whatever sense bytes are given in the buffer.
    pub fn passthrough_failure_with_sense(sense: Vec<u8>) -> Self {
        MockReply {
            outcome: MockOutcome::PassthroughFailure,
            sense,
            data: Vec::new(),
        }
    }

    pub fn passthrough_failure() -> Self {
        Self::passthrough_failure_with_sense(Vec::new())
    }
}

#[derive(Default)]
struct MockState {
    replies: Mutex<VecDeque<MockReply>>,
    cdbs: Mutex<Vec<Vec<u8>>>,
}

/// Replies to each SCSI command with the next queued reply, or GOOD once the queue is empty.
#[derive(Clone, Default)]
pub(crate) struct MockScsi {
    state: Arc<MockState>,
}

impl MockScsi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: MockReply) {
        self.state.replies.lock().unwrap().push_back(reply);
    }

    /// Every CDB issued so far.
    pub fn cdbs(&self) -> Vec<Vec<u8>> {
        self.state.cdbs.lock().unwrap().clone()
    }
}

impl Transport for MockScsi {
    fn send_scsi(&self, request: ScsiRequest) -> Result<ScsiReply> {
        self.state.cdbs.lock().unwrap().push(request.cdb.to_vec());
        let reply = self
            .state
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(MockReply::good);
        let sense_len = reply.sense.len().min(request.sense.len());
        request.sense[..sense_len].copy_from_slice(&reply.sense[..sense_len]);
        if let DataTransfer::FromDevice(buf) = request.data {
            let len = reply.data.len().min(buf.len());
            buf[..len].copy_from_slice(&reply.data[..len]);
        }
        match reply.outcome {
            MockOutcome::Status(status) => Ok(ScsiReply { status, sense_len }),
            MockOutcome::PassthroughFailure => Err(Error::PassthroughFailure(io::Error::from(
                io::ErrorKind::TimedOut,
            ))),
        }
    }
}

pub(crate) fn ata_device(mock: &MockScsi) -> Device {
    Device::new(
        "sda",
        DeviceConfig::new(InterfaceType::Ata),
        Box::new(mock.clone()),
    )
}

/// Descriptor format sense data holding one ATA Return descriptor.
pub(crate) fn descriptor_sense(rtfr: &Rtfr) -> Vec<u8> {
    let desc = AtaReturnDescriptor::new(rtfr);
    let mut sense = vec![
        0x72,
        RECOVERED_ERROR,
        ASC_NO_ADDITIONAL_SENSE,
        ASCQ_ATA_PASS_THROUGH_INFORMATION_AVAILABLE,
        0,
        0,
        0,
        desc.as_bytes().len() as u8,
    ];
    sense.extend_from_slice(desc.as_bytes());
    sense
}

/// Fixed format sense data with the registers inline.
pub(crate) fn fixed_sense(
    status: u8,
    error: u8,
    device: u8,
    count: u8,
    csi0: u8,
    lba: [u8; 3],
) -> Vec<u8> {
    let mut sense = vec![0u8; FIXED_SENSE_LEN];
    Sense::new(
        RECOVERED_ERROR,
        ASC_NO_ADDITIONAL_SENSE,
        ASCQ_ATA_PASS_THROUGH_INFORMATION_AVAILABLE,
    )
    .write(SenseFormat::Fixed, &mut sense);
    sense[3..7].copy_from_slice(&[error, status, device, count]);
    sense[8] = csi0;
    sense[9..12].copy_from_slice(&lba);
    sense
}

/// An ATA PASS-THROUGH results log page holding `results` under their parameter codes.
pub(crate) fn results_log_page(results: &[(u16, Rtfr)]) -> Vec<u8> {
    let mut params = Vec::new();
    for (code, rtfr) in results {
        let desc = AtaReturnDescriptor::new(rtfr);
        params.extend_from_slice(&code.to_be_bytes());
        params.push(0x03);
        params.push(desc.as_bytes().len() as u8);
        params.extend_from_slice(desc.as_bytes());
    }
    let mut page = vec![LOG_PAGE_ATA_PASS_THROUGH_RESULTS, 0];
    page.extend_from_slice(&(params.len() as u16).to_be_bytes());
    page.extend_from_slice(&params);
    page
}
