// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use static_assertions::const_assert_eq;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

// Admin command set opcodes.
pub const ADMIN_GET_LOG_PAGE: u8 = 0x02;
pub const ADMIN_IDENTIFY: u8 = 0x06;
pub const ADMIN_SET_FEATURES: u8 = 0x09;
pub const ADMIN_GET_FEATURES: u8 = 0x0a;

// NVM command set opcodes.
pub const NVM_FLUSH: u8 = 0x00;
pub const NVM_WRITE: u8 = 0x01;
pub const NVM_READ: u8 = 0x02;
pub const NVM_DATASET_MANAGEMENT: u8 = 0x09;

// Identify CNS values.
pub const CNS_NAMESPACE: u8 = 0x00;
pub const CNS_CONTROLLER: u8 = 0x01;

// Log page identifiers.
pub const LOG_SMART_HEALTH: u8 = 0x02;

// Feature identifiers.
pub const FEATURE_VOLATILE_WRITE_CACHE: u8 = 0x06;

/// Applies a command to every namespace, or to the controller as a whole.
pub const NSID_ALL: u32 = 0xffff_ffff;

/// Select field of Get Features.
#[derive(Copy, Clone, Debug, PartialEq, Eq, enumn::N)]
#[repr(u8)]
pub enum FeatureSelect {
    Current = 0,
    Default = 1,
}

const CDW12_FUA: u32 = 1 << 30;
const CDW11_DSM_DEALLOCATE: u32 = 1 << 2;
const CDW10_SAVE: u32 = 1 << 31;

/// The largest number of logical blocks one Read or Write can move. NLB is a 0's based 16-bit
/// field.
pub const MAX_BLOCKS_PER_COMMAND: u32 = 1 << 16;
/// The largest number of ranges one Dataset Management command can carry.
pub const MAX_DSM_RANGES: usize = 256;
/// Size of one Dataset Management range entry.
pub const DSM_RANGE_LEN: usize = 16;

/// A submission queue entry.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromBytes, Immutable, IntoBytes, KnownLayout)]
pub struct NvmeCommand {
    /// Opcode in bits 7:0, fused operation in 9:8, command identifier in 31:16.
    pub cdw0: u32,
    pub nsid: u32,
    pub cdw2: u32,
    pub cdw3: u32,
    pub mptr: u64,
    pub dptr: [u64; 2],
    pub cdw10: u32,
    pub cdw11: u32,
    pub cdw12: u32,
    pub cdw13: u32,
    pub cdw14: u32,
    pub cdw15: u32,
}

const_assert_eq!(std::mem::size_of::<NvmeCommand>(), 64);

impl NvmeCommand {
    pub fn new(opcode: u8, nsid: u32) -> Self {
        NvmeCommand {
            cdw0: opcode as u32,
            nsid,
            ..Default::default()
        }
    }

    pub fn opcode(&self) -> u8 {
        self.cdw0 as u8
    }

    pub fn cid(&self) -> u16 {
        (self.cdw0 >> 16) as u16
    }

    pub fn set_cid(&mut self, cid: u16) {
        self.cdw0 = (self.cdw0 & 0xffff) | ((cid as u32) << 16);
    }

    /// Identify with the given CNS. The controller returns 4096 bytes.
    pub fn identify(cns: u8, nsid: u32) -> Self {
        NvmeCommand {
            cdw10: cns as u32,
            ..Self::new(ADMIN_IDENTIFY, nsid)
        }
    }

    /// Get Log Page for `len` bytes, which must be a non-zero multiple of four.
    pub fn get_log_page(lid: u8, nsid: u32, len: usize) -> Self {
        let numd = (len / 4).saturating_sub(1) as u32;
        NvmeCommand {
            cdw10: (lid as u32) | ((numd & 0xffff) << 16),
            cdw11: numd >> 16,
            ..Self::new(ADMIN_GET_LOG_PAGE, nsid)
        }
    }

    pub fn get_features(fid: u8, select: FeatureSelect) -> Self {
        NvmeCommand {
            cdw10: (fid as u32) | ((select as u32) << 8),
            ..Self::new(ADMIN_GET_FEATURES, 0)
        }
    }

    pub fn set_features(fid: u8, value: u32, save: bool) -> Self {
        NvmeCommand {
            cdw10: (fid as u32) | if save { CDW10_SAVE } else { 0 },
            cdw11: value,
            ..Self::new(ADMIN_SET_FEATURES, 0)
        }
    }

    /// Read of `blocks` logical blocks, 1 through `MAX_BLOCKS_PER_COMMAND`.
    pub fn read(nsid: u32, slba: u64, blocks: u32, fua: bool) -> Self {
        Self::read_write(NVM_READ, nsid, slba, blocks, fua)
    }

    /// Write of `blocks` logical blocks, 1 through `MAX_BLOCKS_PER_COMMAND`.
    pub fn write(nsid: u32, slba: u64, blocks: u32, fua: bool) -> Self {
        Self::read_write(NVM_WRITE, nsid, slba, blocks, fua)
    }

    fn read_write(opcode: u8, nsid: u32, slba: u64, blocks: u32, fua: bool) -> Self {
        debug_assert!(blocks > 0 && blocks <= MAX_BLOCKS_PER_COMMAND);
        NvmeCommand {
            cdw10: slba as u32,
            cdw11: (slba >> 32) as u32,
            cdw12: ((blocks - 1) & 0xffff) | if fua { CDW12_FUA } else { 0 },
            ..Self::new(opcode, nsid)
        }
    }

    pub fn flush(nsid: u32) -> Self {
        Self::new(NVM_FLUSH, nsid)
    }

    /// Dataset Management over `ranges` range entries with the deallocate attribute set.
    pub fn deallocate(nsid: u32, ranges: usize) -> Self {
        debug_assert!(ranges > 0 && ranges <= MAX_DSM_RANGES);
        NvmeCommand {
            cdw10: (ranges - 1) as u32,
            cdw11: CDW11_DSM_DEALLOCATE,
            ..Self::new(NVM_DATASET_MANAGEMENT, nsid)
        }
    }

    pub fn slba(&self) -> u64 {
        (self.cdw10 as u64) | ((self.cdw11 as u64) << 32)
    }

    /// The number of logical blocks of a Read or Write.
    pub fn blocks(&self) -> u32 {
        (self.cdw12 & 0xffff) + 1
    }

    pub fn fua(&self) -> bool {
        self.cdw12 & CDW12_FUA != 0
    }
}

/// Encodes one Dataset Management range entry.
pub fn dsm_range(slba: u64, blocks: u32) -> [u8; DSM_RANGE_LEN] {
    let mut range = [0u8; DSM_RANGE_LEN];
    // Bytes 0..4: context attributes, left at zero.
    range[4..8].copy_from_slice(&blocks.to_le_bytes());
    range[8..16].copy_from_slice(&slba.to_le_bytes());
    range
}
