// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! CDB layouts of the translated commands.
//!
//! SPC-4: <https://www.t10.org/cgi-bin/ac.pl?t=f&f=spc4r37.pdf>
//! SBC-3: <https://www.t10.org/cgi-bin/ac.pl?t=f&f=sbc3r36.pdf>

use log::warn;
use passthru::DataTransfer;
use passthru::Error;
use scsi::constants::*;
use static_assertions::const_assert_eq;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

use crate::capacity;
use crate::inquiry;
use crate::log_sense;
use crate::mode;
use crate::rw;
use crate::rw::Transfer;
use crate::unit::LogicalUnit;
use crate::Result;
use crate::TranslateError;

/// A parsed CDB.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Command {
    TestUnitReady(TestUnitReady),
    RequestSense(RequestSense),
    Read6(ReadWrite6),
    Write6(ReadWrite6),
    Inquiry(Inquiry),
    ModeSelect6(ModeSelect6),
    ModeSense6(ModeSense6),
    ReadCapacity10(ReadCapacity10),
    Read10(ReadWrite10),
    Write10(ReadWrite10),
    SynchronizeCache10(SynchronizeCache10),
    Unmap(Unmap),
    LogSense(LogSense),
    ModeSelect10(ModeSelect10),
    ModeSense10(ModeSense10),
    Read16(ReadWrite16),
    Write16(ReadWrite16),
    SynchronizeCache16(SynchronizeCache16),
    ReadCapacity16(ReadCapacity16),
    ReportLuns(ReportLuns),
    Read12(ReadWrite12),
    Write12(ReadWrite12),
}

impl Command {
    pub fn new(cdb: &[u8]) -> Result<Self> {
        let op = *cdb
            .first()
            .ok_or_else(|| Error::BadParameter("empty cdb".to_string()))?;
        match op {
            TEST_UNIT_READY => Ok(Self::TestUnitReady(parse_command(cdb)?)),
            REQUEST_SENSE => Ok(Self::RequestSense(parse_command(cdb)?)),
            READ_6 => Ok(Self::Read6(parse_command(cdb)?)),
            WRITE_6 => Ok(Self::Write6(parse_command(cdb)?)),
            INQUIRY => Ok(Self::Inquiry(parse_command(cdb)?)),
            MODE_SELECT_6 => Ok(Self::ModeSelect6(parse_command(cdb)?)),
            MODE_SENSE_6 => Ok(Self::ModeSense6(parse_command(cdb)?)),
            READ_CAPACITY_10 => Ok(Self::ReadCapacity10(parse_command(cdb)?)),
            READ_10 => Ok(Self::Read10(parse_command(cdb)?)),
            WRITE_10 => Ok(Self::Write10(parse_command(cdb)?)),
            SYNCHRONIZE_CACHE_10 => Ok(Self::SynchronizeCache10(parse_command(cdb)?)),
            UNMAP => Ok(Self::Unmap(parse_command(cdb)?)),
            LOG_SENSE => Ok(Self::LogSense(parse_command(cdb)?)),
            MODE_SELECT_10 => Ok(Self::ModeSelect10(parse_command(cdb)?)),
            MODE_SENSE_10 => Ok(Self::ModeSense10(parse_command(cdb)?)),
            READ_16 => Ok(Self::Read16(parse_command(cdb)?)),
            WRITE_16 => Ok(Self::Write16(parse_command(cdb)?)),
            SYNCHRONIZE_CACHE_16 => Ok(Self::SynchronizeCache16(parse_command(cdb)?)),
            SERVICE_ACTION_IN_16 => {
                let command: ReadCapacity16 = parse_command(cdb)?;
                match command.service_action() {
                    READ_CAPACITY_16 => Ok(Self::ReadCapacity16(command)),
                    sa => {
                        warn!("SERVICE ACTION IN(16) {:#x?} is not implemented", sa);
                        Err(TranslateError::Unsupported(op))
                    }
                }
            }
            REPORT_LUNS => Ok(Self::ReportLuns(parse_command(cdb)?)),
            READ_12 => Ok(Self::Read12(parse_command(cdb)?)),
            WRITE_12 => Ok(Self::Write12(parse_command(cdb)?)),
            _ => {
                warn!("SCSI command {:#x?} is not implemented", op);
                Err(TranslateError::Unsupported(op))
            }
        }
    }

    /// Carries out the command on `unit`. Returns the number of data bytes moved.
    pub(crate) fn execute(&self, unit: &LogicalUnit, data: &mut DataTransfer) -> Result<usize> {
        match self {
            Command::TestUnitReady(_) => capacity::test_unit_ready(unit),
            Command::RequestSense(c) => capacity::request_sense(c, data),
            Command::Read6(c) => rw::read(unit, c.transfer(), data),
            Command::Write6(c) => rw::write(unit, c.transfer(), data),
            Command::Inquiry(c) => inquiry::inquiry(c, unit, data),
            Command::ModeSelect6(c) => mode::mode_select(c.params(), unit, data),
            Command::ModeSense6(c) => mode::mode_sense(c.params(), unit, data),
            Command::ReadCapacity10(_) => capacity::read_capacity_10(unit, data),
            Command::Read10(c) => rw::read(unit, c.transfer(), data),
            Command::Write10(c) => rw::write(unit, c.transfer(), data),
            Command::SynchronizeCache10(_) | Command::SynchronizeCache16(_) => {
                rw::synchronize_cache(unit)
            }
            Command::Unmap(c) => rw::unmap(c, unit, data),
            Command::LogSense(c) => log_sense::log_sense(c, unit, data),
            Command::ModeSelect10(c) => mode::mode_select(c.params(), unit, data),
            Command::ModeSense10(c) => mode::mode_sense(c.params(), unit, data),
            Command::Read16(c) => rw::read(unit, c.transfer(), data),
            Command::Write16(c) => rw::write(unit, c.transfer(), data),
            Command::ReadCapacity16(c) => capacity::read_capacity_16(c, unit, data),
            Command::ReportLuns(c) => capacity::report_luns(c, data),
            Command::Read12(c) => rw::read(unit, c.transfer(), data),
            Command::Write12(c) => rw::write(unit, c.transfer(), data),
        }
    }
}

fn parse_command<T: FromBytes>(cdb: &[u8]) -> Result<T> {
    let (command, _) = T::read_from_prefix(cdb).map_err(|_| {
        Error::BadParameter(format!(
            "{} byte cdb too short for opcode {:#04x}",
            cdb.len(),
            cdb[0]
        ))
    })?;
    Ok(command)
}

#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq, Eq)]
#[repr(C, packed)]
pub struct TestUnitReady {
    opcode: u8,
    _reserved: [u8; 4],
    control: u8,
}

#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq, Eq)]
#[repr(C, packed)]
pub struct RequestSense {
    opcode: u8,
    desc_field: u8,
    _reserved: [u8; 2],
    alloc_len: u8,
    control: u8,
}

impl RequestSense {
    pub fn descriptor_format(&self) -> bool {
        self.desc_field & 0x1 != 0
    }

    pub fn alloc_len(&self) -> usize {
        self.alloc_len as usize
    }
}

#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq, Eq)]
#[repr(C, packed)]
pub struct ReadWrite6 {
    opcode: u8,
    lba_bytes: [u8; 3],
    xfer_len_byte: u8,
    control: u8,
}

impl ReadWrite6 {
    fn lba(&self) -> u32 {
        u32::from_be_bytes([
            0,
            // The top three bits are reserved.
            self.lba_bytes[0] & 0x1f,
            self.lba_bytes[1],
            self.lba_bytes[2],
        ])
    }

    fn xfer_len(&self) -> u32 {
        // The transfer length 0 means 256 blocks.
        match self.xfer_len_byte {
            0 => 256,
            n => n as u32,
        }
    }

    pub fn transfer(&self) -> Transfer {
        Transfer {
            lba: self.lba() as u64,
            blocks: self.xfer_len(),
            fua: false,
            protect: 0,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq, Eq)]
#[repr(C, packed)]
pub struct ReadWrite10 {
    opcode: u8,
    protect_dpo_fua: u8,
    lba_bytes: [u8; 4],
    group_number: u8,
    xfer_len_bytes: [u8; 2],
    control: u8,
}

impl ReadWrite10 {
    pub fn transfer(&self) -> Transfer {
        Transfer {
            lba: u32::from_be_bytes(self.lba_bytes) as u64,
            blocks: u16::from_be_bytes(self.xfer_len_bytes) as u32,
            fua: self.protect_dpo_fua & FUA != 0,
            protect: self.protect_dpo_fua >> PROTECT_SHIFT,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq, Eq)]
#[repr(C, packed)]
pub struct ReadWrite12 {
    opcode: u8,
    protect_dpo_fua: u8,
    lba_bytes: [u8; 4],
    xfer_len_bytes: [u8; 4],
    group_number: u8,
    control: u8,
}

impl ReadWrite12 {
    pub fn transfer(&self) -> Transfer {
        Transfer {
            lba: u32::from_be_bytes(self.lba_bytes) as u64,
            blocks: u32::from_be_bytes(self.xfer_len_bytes),
            fua: self.protect_dpo_fua & FUA != 0,
            protect: self.protect_dpo_fua >> PROTECT_SHIFT,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq, Eq)]
#[repr(C, packed)]
pub struct ReadWrite16 {
    opcode: u8,
    protect_dpo_fua: u8,
    lba_bytes: [u8; 8],
    xfer_len_bytes: [u8; 4],
    group_number: u8,
    control: u8,
}

impl ReadWrite16 {
    pub fn transfer(&self) -> Transfer {
        Transfer {
            lba: u64::from_be_bytes(self.lba_bytes),
            blocks: u32::from_be_bytes(self.xfer_len_bytes),
            fua: self.protect_dpo_fua & FUA != 0,
            protect: self.protect_dpo_fua >> PROTECT_SHIFT,
        }
    }
}

// Byte 1 of READ and WRITE (10), (12) and (16).
const FUA: u8 = 1 << 3;
const PROTECT_SHIFT: u8 = 5;

#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq, Eq)]
#[repr(C, packed)]
pub struct SynchronizeCache10 {
    opcode: u8,
    immed_byte: u8,
    lba_bytes: [u8; 4],
    group_number: u8,
    block_num_bytes: [u8; 2],
    control: u8,
}

#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq, Eq)]
#[repr(C, packed)]
pub struct SynchronizeCache16 {
    opcode: u8,
    immed_byte: u8,
    lba_bytes: [u8; 8],
    block_num_bytes: [u8; 4],
    group_number: u8,
    control: u8,
}

#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq, Eq)]
#[repr(C, packed)]
pub struct Inquiry {
    opcode: u8,
    vpd_field: u8,
    page_code: u8,
    alloc_len_bytes: [u8; 2],
    control: u8,
}

impl Inquiry {
    pub fn vital_product_data_enabled(&self) -> bool {
        self.vpd_field & 0x1 != 0
    }

    pub fn alloc_len(&self) -> usize {
        u16::from_be_bytes(self.alloc_len_bytes) as usize
    }

    pub fn page_code(&self) -> u8 {
        self.page_code
    }
}

/// The fields MODE SENSE (6) and (10) have in common.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ModeSenseParams {
    /// Disable block descriptors.
    pub dbd: bool,
    /// Long LBA accepted. Only MODE SENSE(10) has the bit.
    pub llbaa: bool,
    pub page_control: u8,
    pub page_code: u8,
    pub subpage_code: u8,
    pub alloc_len: usize,
    /// Whether the (10) header layout is used.
    pub ten_byte: bool,
}

#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq, Eq)]
#[repr(C, packed)]
pub struct ModeSense6 {
    opcode: u8,
    dbd_field: u8,
    page_control_and_page_code: u8,
    subpage_code: u8,
    alloc_len: u8,
    control: u8,
}

impl ModeSense6 {
    pub fn params(&self) -> ModeSenseParams {
        ModeSenseParams {
            dbd: self.dbd_field & DBD != 0,
            llbaa: false,
            // The top two bits represents page control field, and the rest is page code.
            page_control: self.page_control_and_page_code >> 6,
            page_code: self.page_control_and_page_code & 0x3f,
            subpage_code: self.subpage_code,
            alloc_len: self.alloc_len as usize,
            ten_byte: false,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq, Eq)]
#[repr(C, packed)]
pub struct ModeSense10 {
    opcode: u8,
    llbaa_dbd_field: u8,
    page_control_and_page_code: u8,
    subpage_code: u8,
    _reserved: [u8; 3],
    alloc_len_bytes: [u8; 2],
    control: u8,
}

impl ModeSense10 {
    pub fn params(&self) -> ModeSenseParams {
        ModeSenseParams {
            dbd: self.llbaa_dbd_field & DBD != 0,
            llbaa: self.llbaa_dbd_field & LLBAA != 0,
            page_control: self.page_control_and_page_code >> 6,
            page_code: self.page_control_and_page_code & 0x3f,
            subpage_code: self.subpage_code,
            alloc_len: u16::from_be_bytes(self.alloc_len_bytes) as usize,
            ten_byte: true,
        }
    }
}

const DBD: u8 = 1 << 3;
const LLBAA: u8 = 1 << 4;

/// The fields MODE SELECT (6) and (10) have in common.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ModeSelectParams {
    /// Page format: the parameter list is made of mode pages.
    pub pf: bool,
    /// Save pages.
    pub sp: bool,
    pub param_list_len: usize,
    pub ten_byte: bool,
}

// SPC-4 requires MODE SELECT(6) of devices that implement MODE SENSE(6).
#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq, Eq)]
#[repr(C, packed)]
pub struct ModeSelect6 {
    opcode: u8,
    pf_sp_field: u8,
    _reserved: [u8; 2],
    param_list_len: u8,
    control: u8,
}

impl ModeSelect6 {
    pub fn params(&self) -> ModeSelectParams {
        ModeSelectParams {
            pf: self.pf_sp_field & PF != 0,
            sp: self.pf_sp_field & SP != 0,
            param_list_len: self.param_list_len as usize,
            ten_byte: false,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq, Eq)]
#[repr(C, packed)]
pub struct ModeSelect10 {
    opcode: u8,
    pf_sp_field: u8,
    _reserved: [u8; 5],
    param_list_len_bytes: [u8; 2],
    control: u8,
}

impl ModeSelect10 {
    pub fn params(&self) -> ModeSelectParams {
        ModeSelectParams {
            pf: self.pf_sp_field & PF != 0,
            sp: self.pf_sp_field & SP != 0,
            param_list_len: u16::from_be_bytes(self.param_list_len_bytes) as usize,
            ten_byte: true,
        }
    }
}

const PF: u8 = 1 << 4;
const SP: u8 = 1 << 0;

#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq, Eq)]
#[repr(C, packed)]
pub struct LogSense {
    opcode: u8,
    sp_field: u8,
    page_control_and_page_code: u8,
    subpage_code: u8,
    _reserved: u8,
    param_pointer_bytes: [u8; 2],
    alloc_len_bytes: [u8; 2],
    control: u8,
}

impl LogSense {
    pub fn save_parameters(&self) -> bool {
        self.sp_field & 0x1 != 0
    }

    pub fn page_control(&self) -> u8 {
        self.page_control_and_page_code >> 6
    }

    pub fn page_code(&self) -> u8 {
        self.page_control_and_page_code & 0x3f
    }

    pub fn subpage_code(&self) -> u8 {
        self.subpage_code
    }

    pub fn param_pointer(&self) -> u16 {
        u16::from_be_bytes(self.param_pointer_bytes)
    }

    pub fn alloc_len(&self) -> usize {
        u16::from_be_bytes(self.alloc_len_bytes) as usize
    }
}

#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq, Eq)]
#[repr(C, packed)]
pub struct ReadCapacity10 {
    opcode: u8,
    _obsolete1: u8,
    _obsolete2: [u8; 4],
    _reserved: [u8; 2],
    _obsolete3: u8,
    control: u8,
}

#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq, Eq)]
#[repr(C, packed)]
pub struct ReadCapacity16 {
    opcode: u8,
    service_action_field: u8,
    _obsolete: [u8; 8],
    alloc_len_bytes: [u8; 4],
    _reserved: u8,
    control: u8,
}

impl ReadCapacity16 {
    fn service_action(&self) -> u8 {
        self.service_action_field & 0x1f
    }

    pub fn alloc_len(&self) -> usize {
        u32::from_be_bytes(self.alloc_len_bytes) as usize
    }
}

#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq, Eq)]
#[repr(C, packed)]
pub struct ReportLuns {
    opcode: u8,
    _reserved: u8,
    select_report: u8,
    _reserved2: [u8; 3],
    alloc_len_bytes: [u8; 4],
    _reserved3: u8,
    control: u8,
}

impl ReportLuns {
    pub fn select_report(&self) -> u8 {
        self.select_report
    }

    pub fn alloc_len(&self) -> usize {
        u32::from_be_bytes(self.alloc_len_bytes) as usize
    }
}

#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq, Eq)]
#[repr(C, packed)]
pub struct Unmap {
    opcode: u8,
    anchor_field: u8,
    _reserved: [u8; 4],
    group_number_field: u8,
    param_list_len_bytes: [u8; 2],
    control: u8,
}

impl Unmap {
    pub fn anchor(&self) -> bool {
        self.anchor_field & 0x01 != 0
    }

    pub fn param_list_len(&self) -> usize {
        u16::from_be_bytes(self.param_list_len_bytes) as usize
    }
}

const_assert_eq!(std::mem::size_of::<TestUnitReady>(), 6);
const_assert_eq!(std::mem::size_of::<RequestSense>(), 6);
const_assert_eq!(std::mem::size_of::<ReadWrite6>(), 6);
const_assert_eq!(std::mem::size_of::<ReadWrite10>(), 10);
const_assert_eq!(std::mem::size_of::<ReadWrite12>(), 12);
const_assert_eq!(std::mem::size_of::<ReadWrite16>(), 16);
const_assert_eq!(std::mem::size_of::<SynchronizeCache10>(), 10);
const_assert_eq!(std::mem::size_of::<SynchronizeCache16>(), 16);
const_assert_eq!(std::mem::size_of::<Inquiry>(), 6);
const_assert_eq!(std::mem::size_of::<ModeSense6>(), 6);
const_assert_eq!(std::mem::size_of::<ModeSense10>(), 10);
const_assert_eq!(std::mem::size_of::<ModeSelect6>(), 6);
const_assert_eq!(std::mem::size_of::<ModeSelect10>(), 10);
const_assert_eq!(std::mem::size_of::<LogSense>(), 10);
const_assert_eq!(std::mem::size_of::<ReadCapacity10>(), 10);
const_assert_eq!(std::mem::size_of::<ReadCapacity16>(), 16);
const_assert_eq!(std::mem::size_of::<ReportLuns>(), 12);
const_assert_eq!(std::mem::size_of::<Unmap>(), 10);
