// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Identify Controller and Identify Namespace data structures.

use std::fmt;

/// Size of every Identify data structure.
pub const IDENTIFY_DATA_LEN: usize = 4096;

// Identify Controller offsets.
const CTRL_VID: usize = 0;
const CTRL_SN: std::ops::Range<usize> = 4..24;
const CTRL_MN: std::ops::Range<usize> = 24..64;
const CTRL_FR: std::ops::Range<usize> = 64..72;
const CTRL_IEEE_OUI: std::ops::Range<usize> = 73..76;
const CTRL_MDTS: usize = 77;
const CTRL_VER: usize = 80;
const CTRL_OACS: usize = 256;
const CTRL_WCTEMP: usize = 266;
const CTRL_CCTEMP: usize = 268;
const CTRL_NN: usize = 516;
const CTRL_ONCS: usize = 520;
const CTRL_VWC: usize = 525;

const ONCS_DSM: u16 = 1 << 2;
const VWC_PRESENT: u8 = 1 << 0;

// Identify Namespace offsets.
const NS_NSZE: usize = 0;
const NS_NCAP: usize = 8;
const NS_NUSE: usize = 16;
const NS_NSFEAT: usize = 24;
const NS_NLBAF: usize = 25;
const NS_FLBAS: usize = 26;
const NS_DLFEAT: usize = 33;
const NS_NGUID: std::ops::Range<usize> = 104..120;
const NS_EUI64: std::ops::Range<usize> = 120..128;
const NS_LBAF: usize = 128;
const LBAF_LEN: usize = 4;

const NSFEAT_THIN_PROVISIONING: u8 = 1 << 0;
const FLBAS_INDEX_MASK: u8 = 0x0f;
const DLFEAT_READ_ZEROES: u8 = 0x01;

/// Smallest logical block size a namespace may report, as a power of two.
const MIN_LBADS: u8 = 9;

fn le_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn le_u32(data: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

fn le_u64(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

/// Copies `bytes` into a fresh 4 KiB buffer. Short input is zero-extended.
fn identify_buffer(bytes: &[u8]) -> Box<[u8; IDENTIFY_DATA_LEN]> {
    let mut data = Box::new([0u8; IDENTIFY_DATA_LEN]);
    let len = bytes.len().min(IDENTIFY_DATA_LEN);
    data[..len].copy_from_slice(&bytes[..len]);
    data
}

/// Returns an ASCII field with trailing spaces and NULs removed.
fn ascii_field(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&b| b != b' ' && b != 0)
        .map_or(0, |i| i + 1);
    &bytes[..end]
}

/// Identify Controller data (CNS 01h).
#[derive(Clone, PartialEq, Eq)]
pub struct IdentifyController {
    data: Box<[u8; IDENTIFY_DATA_LEN]>,
}

impl IdentifyController {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        IdentifyController {
            data: identify_buffer(bytes),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..]
    }

    /// Mutable access to the raw structure, for building test fixtures.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data[..]
    }

    pub fn vendor_id(&self) -> u16 {
        le_u16(&self.data[..], CTRL_VID)
    }

    /// Serial number with trailing padding removed.
    pub fn serial_number(&self) -> &[u8] {
        ascii_field(&self.data[CTRL_SN])
    }

    /// Model number with trailing padding removed.
    pub fn model_number(&self) -> &[u8] {
        ascii_field(&self.data[CTRL_MN])
    }

    /// Firmware revision with trailing padding removed.
    pub fn firmware_revision(&self) -> &[u8] {
        ascii_field(&self.data[CTRL_FR])
    }

    pub fn ieee_oui(&self) -> [u8; 3] {
        let oui = &self.data[CTRL_IEEE_OUI];
        // Stored least significant byte first.
        [oui[2], oui[1], oui[0]]
    }

    /// Maximum data transfer size as a power of two of the minimum memory page size. Zero means
    /// no limit.
    pub fn mdts(&self) -> u8 {
        self.data[CTRL_MDTS]
    }

    /// Maximum data transfer size in bytes, assuming a 4 KiB minimum page size.
    pub fn max_transfer_bytes(&self) -> Option<usize> {
        match self.mdts() {
            0 => None,
            mdts => 4096usize.checked_shl(mdts as u32),
        }
    }

    pub fn version(&self) -> u32 {
        le_u32(&self.data[..], CTRL_VER)
    }

    pub fn oacs(&self) -> u16 {
        le_u16(&self.data[..], CTRL_OACS)
    }

    /// Warning composite temperature threshold in Kelvin.
    pub fn wctemp(&self) -> u16 {
        le_u16(&self.data[..], CTRL_WCTEMP)
    }

    /// Critical composite temperature threshold in Kelvin.
    pub fn cctemp(&self) -> u16 {
        le_u16(&self.data[..], CTRL_CCTEMP)
    }

    pub fn namespace_count(&self) -> u32 {
        le_u32(&self.data[..], CTRL_NN)
    }

    pub fn oncs(&self) -> u16 {
        le_u16(&self.data[..], CTRL_ONCS)
    }

    pub fn dsm_supported(&self) -> bool {
        self.oncs() & ONCS_DSM != 0
    }

    pub fn vwc_present(&self) -> bool {
        self.data[CTRL_VWC] & VWC_PRESENT != 0
    }
}

impl fmt::Debug for IdentifyController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifyController")
            .field("model", &String::from_utf8_lossy(self.model_number()))
            .field("serial", &String::from_utf8_lossy(self.serial_number()))
            .field("firmware", &String::from_utf8_lossy(self.firmware_revision()))
            .field("mdts", &self.mdts())
            .finish()
    }
}

/// One LBA Format entry of Identify Namespace.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LbaFormat {
    /// Metadata bytes per logical block.
    pub metadata_size: u16,
    /// Logical block size as a power of two.
    pub lbads: u8,
    /// Relative performance, 0 being best.
    pub relative_performance: u8,
}

/// Identify Namespace data (CNS 00h).
#[derive(Clone, PartialEq, Eq)]
pub struct IdentifyNamespace {
    data: Box<[u8; IDENTIFY_DATA_LEN]>,
}

impl IdentifyNamespace {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        IdentifyNamespace {
            data: identify_buffer(bytes),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..]
    }

    /// Mutable access to the raw structure, for building test fixtures.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data[..]
    }

    /// Namespace size in logical blocks.
    pub fn nsze(&self) -> u64 {
        le_u64(&self.data[..], NS_NSZE)
    }

    pub fn ncap(&self) -> u64 {
        le_u64(&self.data[..], NS_NCAP)
    }

    pub fn nuse(&self) -> u64 {
        le_u64(&self.data[..], NS_NUSE)
    }

    pub fn thin_provisioned(&self) -> bool {
        self.data[NS_NSFEAT] & NSFEAT_THIN_PROVISIONING != 0
    }

    /// Number of LBA formats, converted from the 0's based field.
    pub fn lba_format_count(&self) -> usize {
        self.data[NS_NLBAF] as usize + 1
    }

    /// Index of the LBA format the namespace is formatted with.
    pub fn formatted_lba_index(&self) -> usize {
        (self.data[NS_FLBAS] & FLBAS_INDEX_MASK) as usize
    }

    pub fn lba_format(&self, index: usize) -> Option<LbaFormat> {
        if index >= 64 {
            return None;
        }
        let offset = NS_LBAF + index * LBAF_LEN;
        Some(LbaFormat {
            metadata_size: le_u16(&self.data[..], offset),
            lbads: self.data[offset + 2],
            relative_performance: self.data[offset + 3] & 0x3,
        })
    }

    /// Logical block size in bytes of the formatted LBA format. A zeroed or invalid format
    /// reports 512 bytes.
    pub fn block_size(&self) -> u32 {
        let lbads = self
            .lba_format(self.formatted_lba_index())
            .map_or(0, |f| f.lbads);
        if (MIN_LBADS..32).contains(&lbads) {
            1 << lbads
        } else {
            1 << MIN_LBADS
        }
    }

    /// Whether a read of deallocated blocks returns zeroes.
    pub fn deallocated_reads_zero(&self) -> bool {
        self.data[NS_DLFEAT] & 0x7 == DLFEAT_READ_ZEROES
    }

    /// Namespace globally unique identifier, or `None` if not reported.
    pub fn nguid(&self) -> Option<[u8; 16]> {
        let mut nguid = [0u8; 16];
        nguid.copy_from_slice(&self.data[NS_NGUID]);
        (nguid != [0u8; 16]).then_some(nguid)
    }

    /// IEEE extended unique identifier, or `None` if not reported.
    pub fn eui64(&self) -> Option<[u8; 8]> {
        let mut eui = [0u8; 8];
        eui.copy_from_slice(&self.data[NS_EUI64]);
        (eui != [0u8; 8]).then_some(eui)
    }
}

impl fmt::Debug for IdentifyNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifyNamespace")
            .field("nsze", &self.nsze())
            .field("block_size", &self.block_size())
            .finish()
    }
}
