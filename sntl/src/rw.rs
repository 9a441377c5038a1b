// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! READ, WRITE, SYNCHRONIZE CACHE and UNMAP.

use std::cmp;

use log::debug;
use nvme::dsm_range;
use nvme::IdentifyController;
use nvme::IdentifyNamespace;
use nvme::NvmeCommand;
use nvme::DSM_RANGE_LEN;
use nvme::MAX_BLOCKS_PER_COMMAND;
use nvme::MAX_DSM_RANGES;
use passthru::DataTransfer;
use passthru::Error;
use scsi::constants::UNMAP;

use crate::commands::Unmap;
use crate::data::data_in;
use crate::data::data_out;
use crate::unit::LogicalUnit;
use crate::Result;
use crate::TranslateError;

/// The transfer described by a READ or WRITE CDB.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub lba: u64,
    pub blocks: u32,
    /// Force unit access.
    pub fua: bool,
    /// The RDPROTECT or WRPROTECT field.
    pub protect: u8,
}

/// Checks that `blocks` blocks from `lba` lie within the namespace.
fn check_range(namespace: &IdentifyNamespace, lba: u64, blocks: u64) -> Result<()> {
    match lba.checked_add(blocks) {
        Some(end) if end <= namespace.nsze() => Ok(()),
        _ => Err(TranslateError::LbaOutOfRange),
    }
}

/// The most blocks one NVMe Read or Write may carry, limited by NLB and by MDTS.
fn max_blocks_per_command(controller: &IdentifyController, block_size: u32) -> u32 {
    let by_mdts = controller
        .max_transfer_bytes()
        .map_or(u32::MAX, |bytes| {
            u32::try_from(bytes / block_size as usize).unwrap_or(u32::MAX)
        });
    cmp::max(1, cmp::min(MAX_BLOCKS_PER_COMMAND, by_mdts))
}

/// Validates `transfer` and returns its length in bytes and the per-command block limit.
fn prepare(unit: &LogicalUnit, transfer: &Transfer) -> Result<(usize, u32, u32)> {
    if transfer.protect != 0 {
        // Protection information is not translated.
        return Err(TranslateError::InvalidField);
    }
    let namespace = unit.identify_namespace()?;
    check_range(&namespace, transfer.lba, transfer.blocks as u64)?;
    let block_size = namespace.block_size();
    let len = (transfer.blocks as usize)
        .checked_mul(block_size as usize)
        .ok_or_else(|| Error::BadParameter(format!("{} blocks is too long", transfer.blocks)))?;
    let controller = unit.identify_controller()?;
    Ok((len, block_size, max_blocks_per_command(&controller, block_size)))
}

/// Splits `transfer` into (lba, blocks, byte offset, byte length) chunks.
fn chunks(
    transfer: Transfer,
    block_size: u32,
    max_blocks: u32,
) -> impl Iterator<Item = (u64, u32, usize, usize)> {
    let mut done = 0u32;
    std::iter::from_fn(move || {
        if done >= transfer.blocks {
            return None;
        }
        let blocks = cmp::min(max_blocks, transfer.blocks - done);
        let offset = done as usize * block_size as usize;
        let chunk = (
            transfer.lba + done as u64,
            blocks,
            offset,
            blocks as usize * block_size as usize,
        );
        done += blocks;
        Some(chunk)
    })
}

pub(crate) fn read(unit: &LogicalUnit, transfer: Transfer, data: &mut DataTransfer) -> Result<usize> {
    if transfer.blocks == 0 {
        return Ok(0);
    }
    let (len, block_size, max_blocks) = prepare(unit, &transfer)?;
    let buf = data_in(data, len)?;
    for (lba, blocks, offset, chunk_len) in chunks(transfer, block_size, max_blocks) {
        unit.io(
            NvmeCommand::read(unit.nsid(), lba, blocks, transfer.fua),
            DataTransfer::FromDevice(&mut buf[offset..offset + chunk_len]),
        )?;
    }
    Ok(len)
}

pub(crate) fn write(
    unit: &LogicalUnit,
    transfer: Transfer,
    data: &mut DataTransfer,
) -> Result<usize> {
    if transfer.blocks == 0 {
        return Ok(0);
    }
    let (len, block_size, max_blocks) = prepare(unit, &transfer)?;
    let buf = data_out(data, len)?;
    for (lba, blocks, offset, chunk_len) in chunks(transfer, block_size, max_blocks) {
        unit.io(
            NvmeCommand::write(unit.nsid(), lba, blocks, transfer.fua),
            DataTransfer::ToDevice(&buf[offset..offset + chunk_len]),
        )?;
    }
    Ok(len)
}

/// SYNCHRONIZE CACHE flushes the whole namespace; the LBA range is ignored.
pub(crate) fn synchronize_cache(unit: &LogicalUnit) -> Result<usize> {
    unit.io(NvmeCommand::flush(unit.nsid()), DataTransfer::None)?;
    Ok(0)
}

// UNMAP parameter list header length and block descriptor length.
const UNMAP_HEADER_LEN: usize = 8;
const UNMAP_DESCRIPTOR_LEN: usize = 16;

pub(crate) fn unmap(command: &Unmap, unit: &LogicalUnit, data: &mut DataTransfer) -> Result<usize> {
    // Reject anchor == 1
    if command.anchor() {
        return Err(TranslateError::InvalidField);
    }
    let param_list_len = command.param_list_len();
    if param_list_len == 0 {
        return Ok(0);
    }
    if param_list_len < UNMAP_HEADER_LEN {
        return Err(TranslateError::ParamListLength);
    }
    let controller = unit.identify_controller()?;
    if !controller.dsm_supported() {
        debug!("{}: controller has no dataset management", unit.name());
        return Err(TranslateError::Unsupported(UNMAP));
    }
    let params = data_out(data, param_list_len)?;
    let block_data_len = u16::from_be_bytes([params[2], params[3]]) as usize;
    // A trailing partial descriptor is ignored.
    let count = cmp::min(block_data_len, param_list_len - UNMAP_HEADER_LEN) / UNMAP_DESCRIPTOR_LEN;

    let namespace = unit.identify_namespace()?;
    let mut ranges = Vec::with_capacity(count * DSM_RANGE_LEN);
    let mut range_count = 0;
    for desc in params[UNMAP_HEADER_LEN..]
        .chunks_exact(UNMAP_DESCRIPTOR_LEN)
        .take(count)
    {
        let mut lba = [0u8; 8];
        lba.copy_from_slice(&desc[0..8]);
        let lba = u64::from_be_bytes(lba);
        let blocks = u32::from_be_bytes([desc[8], desc[9], desc[10], desc[11]]);
        if blocks == 0 {
            continue;
        }
        check_range(&namespace, lba, blocks as u64)?;
        if range_count == MAX_DSM_RANGES {
            return Err(TranslateError::InvalidParamField);
        }
        ranges.extend_from_slice(&dsm_range(lba, blocks));
        range_count += 1;
    }
    if range_count > 0 {
        unit.io(
            NvmeCommand::deallocate(unit.nsid(), range_count),
            DataTransfer::ToDevice(&ranges),
        )?;
    }
    Ok(param_list_len)
}

#[cfg(test)]
mod tests {
    use nvme::generic;
    use nvme::StatusCodeType;
    use nvme::NVM_DATASET_MANAGEMENT;
    use nvme::NVM_FLUSH;
    use nvme::NVM_READ;
    use nvme::NVM_WRITE;
    use passthru::NvmeQueue;

    use super::*;
    use crate::test_helpers::*;

    fn transfer(lba: u64, blocks: u32) -> Transfer {
        Transfer {
            lba,
            blocks,
            fua: false,
            protect: 0,
        }
    }

    #[test]
    fn read_is_one_command() {
        let mock = MockNvme::new();
        mock.push(MockNvmeReply::success_with_data(vec![0xa5; 8 * 512]));
        let device = nvme_device(&mock);
        let unit = LogicalUnit::new(&device);
        let mut buf = vec![0u8; 8 * 512];
        let n = read(&unit, transfer(16, 8), &mut DataTransfer::FromDevice(&mut buf)).unwrap();
        assert_eq!(n, 8 * 512);
        assert!(buf.iter().all(|&b| b == 0xa5));
        let commands = mock.commands();
        assert_eq!(commands.len(), 1);
        let (queue, cmd) = commands[0];
        assert_eq!(queue, NvmeQueue::Io);
        assert_eq!(cmd.opcode(), NVM_READ);
        assert_eq!(cmd.nsid, NSID);
        assert_eq!(cmd.slba(), 16);
        assert_eq!(cmd.blocks(), 8);
    }

    #[test]
    fn large_read_splits_on_mdts() {
        let mock = MockNvme::new();
        // MDTS 5: 128 KiB, 256 blocks of 512 bytes.
        let device = nvme_device_with(&mock, |controller, _| controller[77] = 5);
        let unit = LogicalUnit::new(&device);
        let mut buf = vec![0u8; 600 * 512];
        read(&unit, transfer(1000, 600), &mut DataTransfer::FromDevice(&mut buf)).unwrap();
        let commands = mock.commands();
        let chunks: Vec<(u64, u32)> = commands.iter().map(|(_, c)| (c.slba(), c.blocks())).collect();
        assert_eq!(chunks, vec![(1000, 256), (1256, 256), (1512, 88)]);
    }

    #[test]
    fn large_write_splits_on_nlb() {
        let mock = MockNvme::new();
        // No MDTS limit.
        let device = nvme_device_with(&mock, |controller, _| controller[77] = 0);
        let unit = LogicalUnit::new(&device);
        let blocks = MAX_BLOCKS_PER_COMMAND + 16;
        let buf = vec![0u8; blocks as usize * 512];
        let n = write(&unit, transfer(0, blocks), &mut DataTransfer::ToDevice(&buf)).unwrap();
        assert_eq!(n, buf.len());
        let commands = mock.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].1.opcode(), NVM_WRITE);
        assert_eq!(commands[0].1.blocks(), MAX_BLOCKS_PER_COMMAND);
        assert_eq!(commands[1].1.slba(), MAX_BLOCKS_PER_COMMAND as u64);
        assert_eq!(commands[1].1.blocks(), 16);
    }

    #[test]
    fn zero_length_is_a_no_op() {
        let mock = MockNvme::new();
        let device = nvme_device(&mock);
        let unit = LogicalUnit::new(&device);
        assert_eq!(read(&unit, transfer(0, 0), &mut DataTransfer::None).unwrap(), 0);
        assert_eq!(write(&unit, transfer(0, 0), &mut DataTransfer::None).unwrap(), 0);
        assert!(mock.commands().is_empty());
    }

    #[test]
    fn protect_field_is_rejected() {
        let mock = MockNvme::new();
        let device = nvme_device(&mock);
        let unit = LogicalUnit::new(&device);
        let mut buf = vec![0u8; 512];
        let mut t = transfer(0, 1);
        t.protect = 3;
        assert!(matches!(
            read(&unit, t, &mut DataTransfer::FromDevice(&mut buf)),
            Err(TranslateError::InvalidField)
        ));
        assert!(mock.commands().is_empty());
    }

    #[test]
    fn out_of_range_is_not_sent() {
        let mock = MockNvme::new();
        let device = nvme_device(&mock);
        let unit = LogicalUnit::new(&device);
        let mut buf = vec![0u8; 2 * 512];
        assert!(matches!(
            read(
                &unit,
                transfer(NAMESPACE_BLOCKS - 1, 2),
                &mut DataTransfer::FromDevice(&mut buf)
            ),
            Err(TranslateError::LbaOutOfRange)
        ));
        assert!(matches!(
            read(
                &unit,
                transfer(u64::MAX, 2),
                &mut DataTransfer::FromDevice(&mut buf)
            ),
            Err(TranslateError::LbaOutOfRange)
        ));
        assert!(mock.commands().is_empty());
    }

    #[test]
    fn device_lba_out_of_range() {
        let mock = MockNvme::new();
        mock.push(MockNvmeReply::status(
            StatusCodeType::Generic,
            generic::LBA_OUT_OF_RANGE,
        ));
        let device = nvme_device(&mock);
        let unit = LogicalUnit::new(&device);
        let buf = vec![0u8; 512];
        assert!(matches!(
            write(&unit, transfer(0, 1), &mut DataTransfer::ToDevice(&buf)),
            Err(TranslateError::Nvme(s)) if s.sc == generic::LBA_OUT_OF_RANGE
        ));
    }

    #[test]
    fn short_buffer_is_caller_error() {
        let mock = MockNvme::new();
        let device = nvme_device(&mock);
        let unit = LogicalUnit::new(&device);
        let mut buf = vec![0u8; 512];
        assert!(matches!(
            read(&unit, transfer(0, 2), &mut DataTransfer::FromDevice(&mut buf)),
            Err(TranslateError::Passthru(Error::BadParameter(_)))
        ));
        assert!(matches!(
            write(&unit, transfer(0, 1), &mut DataTransfer::FromDevice(&mut buf)),
            Err(TranslateError::Passthru(Error::BadParameter(_)))
        ));
    }

    #[test]
    fn synchronize_cache_flushes() {
        let mock = MockNvme::new();
        let device = nvme_device(&mock);
        let unit = LogicalUnit::new(&device);
        synchronize_cache(&unit).unwrap();
        let commands = mock.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].1.opcode(), NVM_FLUSH);
        assert_eq!(commands[0].1.nsid, NSID);
    }

    fn unmap_cdb(param_list_len: u16) -> Unmap {
        let len = param_list_len.to_be_bytes();
        let cdb = [UNMAP, 0, 0, 0, 0, 0, 0, len[0], len[1], 0];
        match crate::Command::new(&cdb).unwrap() {
            crate::Command::Unmap(c) => c,
            command => panic!("unexpected command type: {:?}", command),
        }
    }

    fn unmap_params(descriptors: &[(u64, u32)]) -> Vec<u8> {
        let block_data_len = (descriptors.len() * UNMAP_DESCRIPTOR_LEN) as u16;
        let mut params = Vec::new();
        params.extend_from_slice(&(block_data_len + 6).to_be_bytes());
        params.extend_from_slice(&block_data_len.to_be_bytes());
        params.extend_from_slice(&[0; 4]);
        for (lba, blocks) in descriptors {
            params.extend_from_slice(&lba.to_be_bytes());
            params.extend_from_slice(&blocks.to_be_bytes());
            params.extend_from_slice(&[0; 4]);
        }
        params
    }

    #[test]
    fn unmap_encodes_dsm_ranges() {
        let mock = MockNvme::new();
        let device = nvme_device(&mock);
        let unit = LogicalUnit::new(&device);
        let params = unmap_params(&[(0x1234, 8), (0x10, 0), (0x8000_0000, 0x100)]);
        let command = unmap_cdb(params.len() as u16);
        unmap(&command, &unit, &mut DataTransfer::ToDevice(&params)).unwrap();

        let commands = mock.commands();
        assert_eq!(commands.len(), 1);
        let cmd = commands[0].1;
        assert_eq!(cmd.opcode(), NVM_DATASET_MANAGEMENT);
        // Two ranges, 0's based; the zero-length descriptor is skipped.
        assert_eq!(cmd.cdw10, 1);
        assert_eq!(cmd.cdw11, 1 << 2);
        let ranges = mock.data_out();
        assert_eq!(ranges.len(), 1);
        assert_eq!(
            ranges[0],
            [
                0, 0, 0, 0, 8, 0, 0, 0, 0x34, 0x12, 0, 0, 0, 0, 0, 0, //
                0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0x80, 0, 0, 0, 0,
            ]
        );
    }

    #[test]
    fn unmap_needs_dsm() {
        let mock = MockNvme::new();
        let device = nvme_device_with(&mock, |controller, _| controller[520] = 0);
        let unit = LogicalUnit::new(&device);
        let params = unmap_params(&[(0, 8)]);
        let command = unmap_cdb(params.len() as u16);
        assert!(matches!(
            unmap(&command, &unit, &mut DataTransfer::ToDevice(&params)),
            Err(TranslateError::Unsupported(UNMAP))
        ));
        assert!(mock.commands().is_empty());
    }

    #[test]
    fn unmap_parameter_checks() {
        let mock = MockNvme::new();
        let device = nvme_device(&mock);
        let unit = LogicalUnit::new(&device);

        let params = [0u8; 4];
        assert!(matches!(
            unmap(&unmap_cdb(4), &unit, &mut DataTransfer::ToDevice(&params)),
            Err(TranslateError::ParamListLength)
        ));

        let too_many: Vec<(u64, u32)> = (0..MAX_DSM_RANGES as u64 + 1).map(|i| (i * 8, 8)).collect();
        let params = unmap_params(&too_many);
        assert!(matches!(
            unmap(
                &unmap_cdb(params.len() as u16),
                &unit,
                &mut DataTransfer::ToDevice(&params)
            ),
            Err(TranslateError::InvalidParamField)
        ));

        let params = unmap_params(&[(NAMESPACE_BLOCKS, 1)]);
        assert!(matches!(
            unmap(
                &unmap_cdb(params.len() as u16),
                &unit,
                &mut DataTransfer::ToDevice(&params)
            ),
            Err(TranslateError::LbaOutOfRange)
        ));
        assert!(mock.commands().is_empty());

        // An empty parameter list does nothing.
        assert_eq!(
            unmap(&unmap_cdb(0), &unit, &mut DataTransfer::None).unwrap(),
            0
        );
    }
}
