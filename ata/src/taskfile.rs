// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The ATA register model: what to issue and what came back.

use std::time::Duration;

/// ATA protocols a command can be issued with.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AtaProtocol {
    HardReset,
    SoftReset,
    NoData,
    PioIn,
    PioOut,
    Dma,
    DmaQueued,
    Udma,
    FpDma,
    ExecDeviceDiag,
    DeviceReset,
    ReturnResponseInfo,
}

impl AtaProtocol {
    /// Whether the protocol can move data in `direction`.
    pub fn allows(self, direction: Direction) -> bool {
        use AtaProtocol::*;
        match self {
            HardReset | SoftReset | NoData | ExecDeviceDiag | DeviceReset | ReturnResponseInfo => {
                direction == Direction::NoData
            }
            PioIn => direction == Direction::In,
            PioOut => direction == Direction::Out,
            Dma | DmaQueued | Udma | FpDma => direction != Direction::NoData,
        }
    }

    /// Resets and diagnostics, which carry no LBA or count registers.
    pub fn is_control(self) -> bool {
        matches!(
            self,
            AtaProtocol::HardReset
                | AtaProtocol::SoftReset
                | AtaProtocol::DeviceReset
                | AtaProtocol::ExecDeviceDiag
        )
    }
}

/// Register width of a command.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandType {
    /// 28-bit LBA, 8-bit count and features.
    Taskfile28,
    /// 48-bit LBA, 16-bit count and features.
    ExtendedTaskfile48,
    /// 48-bit registers plus ICC and AUX, only expressible in the 32-byte CDB.
    CompleteTaskfileWithAux,
}

impl CommandType {
    pub fn is_extended(self) -> bool {
        self != CommandType::Taskfile28
    }
}

/// Which register holds the transfer length.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LengthLocation {
    NoData,
    Features,
    Count,
    /// The transport's protocol-specific transfer length field.
    Tpsiu,
}

/// The unit the transfer length is counted in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransferUnit {
    Bytes,
    Blocks512,
    /// Blocks of the device's logical sector size.
    LogicalSectors,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    /// From the device.
    In,
    /// To the device.
    Out,
    NoData,
}

/// LBA mode bit of the device register.
pub const DEVICE_LBA: u8 = 1 << 6;

/// The ATA command register block.
///
/// The `_ext` registers are the "previous" contents of a 48-bit command. `icc` and `aux` are
/// only carried by the 32-byte ATA PASS-THROUGH CDB.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Taskfile {
    pub features: u8,
    pub features_ext: u8,
    pub count: u8,
    pub count_ext: u8,
    pub lba_low: u8,
    pub lba_mid: u8,
    pub lba_high: u8,
    pub lba_low_ext: u8,
    pub lba_mid_ext: u8,
    pub lba_high_ext: u8,
    pub device: u8,
    pub command: u8,
    pub icc: u8,
    pub aux: u32,
}

impl Taskfile {
    pub fn new(command: u8) -> Self {
        Taskfile {
            command,
            ..Default::default()
        }
    }

    /// Sets a 28-bit LBA. Bits 27:24 go to the low nibble of the device register, which also
    /// gets the LBA mode bit.
    pub fn set_lba28(&mut self, lba: u32) {
        self.lba_low = lba as u8;
        self.lba_mid = (lba >> 8) as u8;
        self.lba_high = (lba >> 16) as u8;
        self.device = (self.device & 0xf0) | DEVICE_LBA | ((lba >> 24) as u8 & 0x0f);
    }

    pub fn lba28(&self) -> u32 {
        (self.lba_low as u32)
            | (self.lba_mid as u32) << 8
            | (self.lba_high as u32) << 16
            | ((self.device & 0x0f) as u32) << 24
    }

    /// Sets a 48-bit LBA across the current and previous LBA registers.
    pub fn set_lba48(&mut self, lba: u64) {
        self.lba_low = lba as u8;
        self.lba_mid = (lba >> 8) as u8;
        self.lba_high = (lba >> 16) as u8;
        self.lba_low_ext = (lba >> 24) as u8;
        self.lba_mid_ext = (lba >> 32) as u8;
        self.lba_high_ext = (lba >> 40) as u8;
        self.device |= DEVICE_LBA;
    }

    pub fn lba48(&self) -> u64 {
        (self.lba_low as u64)
            | (self.lba_mid as u64) << 8
            | (self.lba_high as u64) << 16
            | (self.lba_low_ext as u64) << 24
            | (self.lba_mid_ext as u64) << 32
            | (self.lba_high_ext as u64) << 40
    }

    pub fn set_count16(&mut self, count: u16) {
        self.count = count as u8;
        self.count_ext = (count >> 8) as u8;
    }

    pub fn count16(&self) -> u16 {
        u16::from_le_bytes([self.count, self.count_ext])
    }

    pub fn set_features16(&mut self, features: u16) {
        self.features = features as u8;
        self.features_ext = (features >> 8) as u8;
    }

    pub fn features16(&self) -> u16 {
        u16::from_le_bytes([self.features, self.features_ext])
    }

    /// Whether any register only a 48-bit command can carry is non-zero.
    pub fn has_extended_registers(&self) -> bool {
        self.features_ext != 0
            || self.count_ext != 0
            || self.lba_low_ext != 0
            || self.lba_mid_ext != 0
            || self.lba_high_ext != 0
    }
}

/// Return task file registers reported after a command completes.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Rtfr {
    pub status: u8,
    pub error: u8,
    pub device: u8,
    pub count: u8,
    pub count_ext: u8,
    pub lba_low: u8,
    pub lba_mid: u8,
    pub lba_high: u8,
    pub lba_low_ext: u8,
    pub lba_mid_ext: u8,
    pub lba_high_ext: u8,
    /// Whether the `_ext` registers were reported.
    pub extended: bool,
}

/// Status register bits.
pub mod status {
    pub const ERR: u8 = 1 << 0;
    pub const DRQ: u8 = 1 << 3;
    pub const DF: u8 = 1 << 5;
    pub const DRDY: u8 = 1 << 6;
    pub const BSY: u8 = 1 << 7;
}

impl Rtfr {
    pub fn lba28(&self) -> u32 {
        (self.lba_low as u32)
            | (self.lba_mid as u32) << 8
            | (self.lba_high as u32) << 16
            | ((self.device & 0x0f) as u32) << 24
    }

    pub fn lba48(&self) -> u64 {
        (self.lba_low as u64)
            | (self.lba_mid as u64) << 8
            | (self.lba_high as u64) << 16
            | (self.lba_low_ext as u64) << 24
            | (self.lba_mid_ext as u64) << 32
            | (self.lba_high_ext as u64) << 40
    }

    pub fn count16(&self) -> u16 {
        u16::from_le_bytes([self.count, self.count_ext])
    }

    /// Whether the device reported an error or a device fault.
    pub fn is_error(&self) -> bool {
        self.status & (status::ERR | status::DF) != 0
    }
}

/// ATA opcodes that only exist as 48-bit commands.
const EXTENDED_ONLY_OPCODES: &[u8] = &[
    0x06, // DATA SET MANAGEMENT
    0x07, // DATA SET MANAGEMENT XL
    0x24, // READ SECTOR(S) EXT
    0x25, // READ DMA EXT
    0x27, // READ NATIVE MAX ADDRESS EXT
    0x29, // READ MULTIPLE EXT
    0x2f, // READ LOG EXT
    0x34, // WRITE SECTOR(S) EXT
    0x35, // WRITE DMA EXT
    0x37, // SET MAX ADDRESS EXT
    0x39, // WRITE MULTIPLE EXT
    0x3d, // WRITE DMA FUA EXT
    0x3f, // WRITE LOG EXT
    0x42, // READ VERIFY SECTOR(S) EXT
    0x47, // READ LOG DMA EXT
    0x4a, // ZAC MANAGEMENT IN
    0x57, // WRITE LOG DMA EXT
    0x60, // READ FPDMA QUEUED
    0x61, // WRITE FPDMA QUEUED
    0x63, // NCQ NON-DATA
    0x64, // SEND FPDMA QUEUED
    0x65, // RECEIVE FPDMA QUEUED
    0x9f, // ZAC MANAGEMENT OUT
    0xce, // WRITE MULTIPLE FUA EXT
    0xea, // FLUSH CACHE EXT
];

/// Whether `opcode` is a command that needs 48-bit registers.
pub fn is_extended_only(opcode: u8) -> bool {
    EXTENDED_ONLY_OPCODES.contains(&opcode)
}

/// One ATA command to issue, plus the registers it returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AtaCommand {
    pub protocol: AtaProtocol,
    pub taskfile: Taskfile,
    pub command_type: CommandType,
    pub length_location: LengthLocation,
    pub transfer_unit: TransferUnit,
    /// log2 of the sectors per DRQ block for READ/WRITE MULTIPLE, 0 through 7.
    pub multiple_count: u8,
    /// Ask for sense data carrying the registers even when the command succeeds.
    pub check_condition: bool,
    /// Time the SATL waits for the device to come back after a reset, 0 through 3.
    pub offline: u8,
    pub direction: Direction,
    /// `None` uses the device default.
    pub timeout: Option<Duration>,
    /// Registers recovered from the completion. `None` if none could be recovered.
    pub rtfr: Option<Rtfr>,
}

impl AtaCommand {
    /// A command moving data in `direction`, with the transfer length in 512-byte blocks in the
    /// count register, or no data at all.
    pub fn new(
        protocol: AtaProtocol,
        direction: Direction,
        command_type: CommandType,
        taskfile: Taskfile,
    ) -> Self {
        let length_location = match direction {
            Direction::NoData => LengthLocation::NoData,
            Direction::In | Direction::Out => LengthLocation::Count,
        };
        AtaCommand {
            protocol,
            taskfile,
            command_type,
            length_location,
            transfer_unit: TransferUnit::Blocks512,
            multiple_count: 0,
            check_condition: false,
            offline: 0,
            direction,
            timeout: None,
            rtfr: None,
        }
    }

    /// IDENTIFY DEVICE, returning one 512-byte block.
    pub fn identify_device() -> Self {
        let mut taskfile = Taskfile::new(0xec);
        taskfile.count = 1;
        Self::new(
            AtaProtocol::PioIn,
            Direction::In,
            CommandType::Taskfile28,
            taskfile,
        )
    }

    /// READ DMA for up to 256 blocks at a 28-bit LBA. A count of 0 transfers 256 blocks.
    pub fn read_dma(lba: u32, count: u8) -> Self {
        let mut taskfile = Taskfile::new(0xc8);
        taskfile.set_lba28(lba);
        taskfile.count = count;
        Self::new(
            AtaProtocol::Dma,
            Direction::In,
            CommandType::Taskfile28,
            taskfile,
        )
    }

    /// READ DMA EXT for up to 65536 blocks at a 48-bit LBA.
    pub fn read_dma_ext(lba: u64, count: u16) -> Self {
        let mut taskfile = Taskfile::new(0x25);
        taskfile.set_lba48(lba);
        taskfile.set_count16(count);
        Self::new(
            AtaProtocol::Dma,
            Direction::In,
            CommandType::ExtendedTaskfile48,
            taskfile,
        )
    }

    /// CHECK POWER MODE. The result is only visible in the returned count register, so the
    /// command asks for the registers back.
    pub fn check_power_mode() -> Self {
        let mut cmd = Self::new(
            AtaProtocol::NoData,
            Direction::NoData,
            CommandType::Taskfile28,
            Taskfile::new(0xe5),
        );
        cmd.check_condition = true;
        cmd
    }
}
