// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! ATA PASS-THROUGH CDBs.
//!
//! Layouts are from SAT-4 t10 revision 6, sections 12.2.2 through 12.2.4.

use log::trace;
use passthru::DeviceConfig;
use passthru::Error;
use passthru::Result;
use scsi::constants::ATA_PASS_THROUGH_12;
use scsi::constants::ATA_PASS_THROUGH_16;
use scsi::constants::ATA_PASS_THROUGH_32;
use scsi::constants::VARIABLE_LENGTH_CDB;
use static_assertions::const_assert_eq;
use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::IntoBytes;
use zerocopy::KnownLayout;

use crate::AtaCommand;
use crate::AtaProtocol;
use crate::CommandType;
use crate::Direction;
use crate::LengthLocation;
use crate::Taskfile;
use crate::TransferUnit;

/// The longest ATA PASS-THROUGH CDB.
pub const SAT_CDB_MAX_LEN: usize = 32;

// Byte 1 (byte 10 of the 32-byte CDB).
const MULTIPLE_COUNT_SHIFT: u8 = 5;
const PROTOCOL_SHIFT: u8 = 1;
const PROTOCOL_MASK: u8 = 0x1e;
const EXTEND: u8 = 1 << 0;

// Byte 2 (byte 11 of the 32-byte CDB).
const OFF_LINE_SHIFT: u8 = 6;
const CK_COND: u8 = 1 << 5;
const T_TYPE: u8 = 1 << 4;
const T_DIR: u8 = 1 << 3;
const BYTE_BLOCK: u8 = 1 << 2;
const T_LENGTH_MASK: u8 = 0x03;

const ADDITIONAL_CDB_LENGTH_32: u8 = (SAT_CDB_MAX_LEN - 8) as u8;

/// Values of the PROTOCOL field.
#[derive(Copy, Clone, Debug, PartialEq, Eq, enumn::N)]
#[repr(u8)]
enum SatProtocol {
    HardReset = 0,
    SoftReset = 1,
    NonData = 3,
    PioDataIn = 4,
    PioDataOut = 5,
    Dma = 6,
    DmaQueued = 7,
    DeviceDiagnostic = 8,
    DeviceReset = 9,
    UdmaDataIn = 10,
    UdmaDataOut = 11,
    Fpdma = 12,
    ReturnResponseInformation = 15,
}

impl SatProtocol {
    fn of(protocol: AtaProtocol, direction: Direction) -> Self {
        match protocol {
            AtaProtocol::HardReset => SatProtocol::HardReset,
            AtaProtocol::SoftReset => SatProtocol::SoftReset,
            AtaProtocol::NoData => SatProtocol::NonData,
            AtaProtocol::PioIn => SatProtocol::PioDataIn,
            AtaProtocol::PioOut => SatProtocol::PioDataOut,
            AtaProtocol::Dma => SatProtocol::Dma,
            AtaProtocol::DmaQueued => SatProtocol::DmaQueued,
            AtaProtocol::Udma if direction == Direction::Out => SatProtocol::UdmaDataOut,
            AtaProtocol::Udma => SatProtocol::UdmaDataIn,
            AtaProtocol::FpDma => SatProtocol::Fpdma,
            AtaProtocol::ExecDeviceDiag => SatProtocol::DeviceDiagnostic,
            AtaProtocol::DeviceReset => SatProtocol::DeviceReset,
            AtaProtocol::ReturnResponseInfo => SatProtocol::ReturnResponseInformation,
        }
    }

    fn protocol(self) -> AtaProtocol {
        match self {
            SatProtocol::HardReset => AtaProtocol::HardReset,
            SatProtocol::SoftReset => AtaProtocol::SoftReset,
            SatProtocol::NonData => AtaProtocol::NoData,
            SatProtocol::PioDataIn => AtaProtocol::PioIn,
            SatProtocol::PioDataOut => AtaProtocol::PioOut,
            SatProtocol::Dma => AtaProtocol::Dma,
            SatProtocol::DmaQueued => AtaProtocol::DmaQueued,
            SatProtocol::DeviceDiagnostic => AtaProtocol::ExecDeviceDiag,
            SatProtocol::DeviceReset => AtaProtocol::DeviceReset,
            SatProtocol::UdmaDataIn | SatProtocol::UdmaDataOut => AtaProtocol::Udma,
            SatProtocol::Fpdma => AtaProtocol::FpDma,
            SatProtocol::ReturnResponseInformation => AtaProtocol::ReturnResponseInfo,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq, Eq)]
#[repr(C, packed)]
struct AtaPassThrough12 {
    opcode: u8,
    protocol: u8,
    flags: u8,
    features: u8,
    count: u8,
    lba_low: u8,
    lba_mid: u8,
    lba_high: u8,
    device: u8,
    command: u8,
    reserved: u8,
    control: u8,
}

#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq, Eq)]
#[repr(C, packed)]
struct AtaPassThrough16 {
    opcode: u8,
    protocol: u8,
    flags: u8,
    features_ext: u8,
    features: u8,
    count_ext: u8,
    count: u8,
    lba_low_ext: u8,
    lba_low: u8,
    lba_mid_ext: u8,
    lba_mid: u8,
    lba_high_ext: u8,
    lba_high: u8,
    device: u8,
    command: u8,
    control: u8,
}

#[derive(Copy, Clone, Debug, Default, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq, Eq)]
#[repr(C, packed)]
struct AtaPassThrough32 {
    opcode: u8,
    control: u8,
    reserved: [u8; 5],
    additional_cdb_length: u8,
    service_action_bytes: [u8; 2],
    protocol: u8,
    flags: u8,
    reserved2: [u8; 2],
    lba_bytes: [u8; 6],
    features_bytes: [u8; 2],
    count_bytes: [u8; 2],
    device: u8,
    command: u8,
    reserved3: u8,
    icc: u8,
    aux_bytes: [u8; 4],
}

const_assert_eq!(std::mem::size_of::<AtaPassThrough12>(), 12);
const_assert_eq!(std::mem::size_of::<AtaPassThrough16>(), 16);
const_assert_eq!(std::mem::size_of::<AtaPassThrough32>(), SAT_CDB_MAX_LEN);

impl AtaPassThrough32 {
    fn service_action(&self) -> u16 {
        u16::from_be_bytes(self.service_action_bytes)
    }

    fn lba(&self) -> u64 {
        let mut bytes = [0u8; 8];
        bytes[2..].copy_from_slice(&self.lba_bytes);
        u64::from_be_bytes(bytes)
    }
}

/// Transport capabilities that shape the CDB.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SatOptions {
    /// Use the 16-byte CDB for 28-bit commands too, with EXTEND clear.
    pub force_16_byte: bool,
    /// Whether the transport can carry a transfer length in TPSIU.
    pub tpsiu_supported: bool,
}

impl From<&DeviceConfig> for SatOptions {
    fn from(config: &DeviceConfig) -> Self {
        SatOptions {
            force_16_byte: config.force_16_byte_sat,
            tpsiu_supported: config.tpsiu,
        }
    }
}

/// A built ATA PASS-THROUGH CDB of 12, 16 or 32 bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SatCdb {
    bytes: [u8; SAT_CDB_MAX_LEN],
    len: usize,
}

impl SatCdb {
    fn new(cdb: &[u8]) -> Self {
        let mut bytes = [0u8; SAT_CDB_MAX_LEN];
        bytes[..cdb.len()].copy_from_slice(cdb);
        SatCdb {
            bytes,
            len: cdb.len(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Parses an ATA PASS-THROUGH CDB back into the command it encodes. The returned command has
    /// no timeout and no registers.
    pub fn decode(cdb: &[u8]) -> Result<AtaCommand> {
        match cdb.first() {
            Some(&ATA_PASS_THROUGH_12) => {
                let (c, _) = AtaPassThrough12::read_from_prefix(cdb)
                    .map_err(|_| short_cdb("ATA PASS-THROUGH(12)"))?;
                let taskfile = Taskfile {
                    features: c.features,
                    count: c.count,
                    lba_low: c.lba_low,
                    lba_mid: c.lba_mid,
                    lba_high: c.lba_high,
                    device: c.device,
                    command: c.command,
                    ..Default::default()
                };
                decode_fields(c.protocol, c.flags, CommandType::Taskfile28, taskfile)
            }
            Some(&ATA_PASS_THROUGH_16) => {
                let (c, _) = AtaPassThrough16::read_from_prefix(cdb)
                    .map_err(|_| short_cdb("ATA PASS-THROUGH(16)"))?;
                let command_type = if c.protocol & EXTEND != 0 {
                    CommandType::ExtendedTaskfile48
                } else {
                    CommandType::Taskfile28
                };
                let taskfile = Taskfile {
                    features: c.features,
                    features_ext: c.features_ext,
                    count: c.count,
                    count_ext: c.count_ext,
                    lba_low: c.lba_low,
                    lba_mid: c.lba_mid,
                    lba_high: c.lba_high,
                    lba_low_ext: c.lba_low_ext,
                    lba_mid_ext: c.lba_mid_ext,
                    lba_high_ext: c.lba_high_ext,
                    device: c.device,
                    command: c.command,
                    ..Default::default()
                };
                decode_fields(c.protocol, c.flags, command_type, taskfile)
            }
            Some(&VARIABLE_LENGTH_CDB) => {
                let (c, _) = AtaPassThrough32::read_from_prefix(cdb)
                    .map_err(|_| short_cdb("ATA PASS-THROUGH(32)"))?;
                if c.service_action() != ATA_PASS_THROUGH_32 {
                    return Err(Error::BadParameter(format!(
                        "service action {:#x} is not ATA PASS-THROUGH(32)",
                        c.service_action()
                    )));
                }
                let [features_ext, features] = c.features_bytes;
                let [count_ext, count] = c.count_bytes;
                let mut taskfile = Taskfile {
                    features,
                    features_ext,
                    count,
                    count_ext,
                    device: c.device,
                    command: c.command,
                    icc: c.icc,
                    aux: u32::from_be_bytes(c.aux_bytes),
                    ..Default::default()
                };
                // Keep the device register as transmitted.
                let device = taskfile.device;
                taskfile.set_lba48(c.lba());
                taskfile.device = device;
                decode_fields(
                    c.protocol,
                    c.flags,
                    CommandType::CompleteTaskfileWithAux,
                    taskfile,
                )
            }
            Some(op) => Err(Error::BadParameter(format!(
                "opcode {:#04x} is not an ATA PASS-THROUGH command",
                op
            ))),
            None => Err(short_cdb("ATA PASS-THROUGH")),
        }
    }
}

fn short_cdb(name: &str) -> Error {
    Error::BadParameter(format!("{} CDB is too short", name))
}

fn decode_fields(
    protocol: u8,
    flags: u8,
    command_type: CommandType,
    taskfile: Taskfile,
) -> Result<AtaCommand> {
    let raw = (protocol & PROTOCOL_MASK) >> PROTOCOL_SHIFT;
    let sat_protocol = SatProtocol::n(raw)
        .ok_or_else(|| Error::BadParameter(format!("reserved protocol {}", raw)))?;
    let length_location = match flags & T_LENGTH_MASK {
        0 => LengthLocation::NoData,
        1 => LengthLocation::Features,
        2 => LengthLocation::Count,
        _ => LengthLocation::Tpsiu,
    };
    let direction = if length_location == LengthLocation::NoData {
        Direction::NoData
    } else if flags & T_DIR != 0 {
        Direction::In
    } else {
        Direction::Out
    };
    let transfer_unit = match (flags & BYTE_BLOCK != 0, flags & T_TYPE != 0) {
        (false, _) => TransferUnit::Bytes,
        (true, false) => TransferUnit::Blocks512,
        (true, true) => TransferUnit::LogicalSectors,
    };
    let mut cmd = AtaCommand::new(sat_protocol.protocol(), direction, command_type, taskfile);
    cmd.length_location = length_location;
    cmd.transfer_unit = transfer_unit;
    cmd.multiple_count = protocol >> MULTIPLE_COUNT_SHIFT;
    cmd.check_condition = flags & CK_COND != 0;
    cmd.offline = flags >> OFF_LINE_SHIFT;
    Ok(cmd)
}

/// Checks that `cmd` can be expressed as an ATA PASS-THROUGH command.
fn validate(cmd: &AtaCommand, options: &SatOptions) -> Result<()> {
    let tf = &cmd.taskfile;
    match (cmd.protocol, cmd.command_type) {
        (AtaProtocol::FpDma, CommandType::Taskfile28) => {
            return Err(Error::NotSupported(
                "FPDMA commands need 48-bit registers".to_string(),
            ));
        }
        (protocol, command_type) if protocol.is_control() && command_type.is_extended() => {
            return Err(Error::NotSupported(format!(
                "{:?} cannot be issued as a {:?} command",
                protocol, command_type
            )));
        }
        _ => {}
    }
    if cmd.command_type == CommandType::Taskfile28 {
        if crate::is_extended_only(tf.command) {
            return Err(Error::BadParameter(format!(
                "command {:#04x} requires 48-bit registers",
                tf.command
            )));
        }
        if tf.has_extended_registers() {
            return Err(Error::BadParameter(
                "extended registers set on a 28-bit command".to_string(),
            ));
        }
    }
    if cmd.command_type != CommandType::CompleteTaskfileWithAux && (tf.icc != 0 || tf.aux != 0) {
        return Err(Error::BadParameter(
            "ICC and AUX are only carried by ATA PASS-THROUGH(32)".to_string(),
        ));
    }
    if !cmd.protocol.allows(cmd.direction) {
        return Err(Error::BadParameter(format!(
            "protocol {:?} cannot transfer data {:?}",
            cmd.protocol, cmd.direction
        )));
    }
    if (cmd.length_location == LengthLocation::NoData) != (cmd.direction == Direction::NoData) {
        return Err(Error::BadParameter(format!(
            "length location {:?} does not match direction {:?}",
            cmd.length_location, cmd.direction
        )));
    }
    if cmd.length_location == LengthLocation::Tpsiu && !options.tpsiu_supported {
        return Err(Error::BadParameter(
            "transport cannot carry a TPSIU transfer length".to_string(),
        ));
    }
    if cmd.multiple_count > 7 {
        return Err(Error::BadParameter(format!(
            "multiple count {} is out of range",
            cmd.multiple_count
        )));
    }
    if cmd.offline > 3 {
        return Err(Error::BadParameter(format!(
            "off-line time {} is out of range",
            cmd.offline
        )));
    }
    Ok(())
}

fn flags_byte(cmd: &AtaCommand) -> u8 {
    let mut flags = cmd.offline << OFF_LINE_SHIFT;
    if cmd.check_condition {
        flags |= CK_COND;
    }
    match cmd.transfer_unit {
        TransferUnit::Bytes => {}
        TransferUnit::Blocks512 => flags |= BYTE_BLOCK,
        TransferUnit::LogicalSectors => flags |= BYTE_BLOCK | T_TYPE,
    }
    if cmd.direction == Direction::In {
        flags |= T_DIR;
    }
    flags
        | match cmd.length_location {
            LengthLocation::NoData => 0,
            LengthLocation::Features => 1,
            LengthLocation::Count => 2,
            LengthLocation::Tpsiu => 3,
        }
}

/// Builds the ATA PASS-THROUGH CDB for `cmd`.
///
/// A 28-bit command gets the 12-byte CDB unless `options` force the 16-byte one, a 48-bit
/// command the 16-byte CDB, and a command with ICC/AUX the 32-byte CDB.
pub fn build_sat_cdb(cmd: &AtaCommand, options: &SatOptions) -> Result<SatCdb> {
    validate(cmd, options)?;
    let tf = &cmd.taskfile;
    let extend = if cmd.command_type.is_extended() {
        EXTEND
    } else {
        0
    };
    let protocol = (cmd.multiple_count << MULTIPLE_COUNT_SHIFT)
        | ((SatProtocol::of(cmd.protocol, cmd.direction) as u8) << PROTOCOL_SHIFT)
        | extend;
    let flags = flags_byte(cmd);

    let cdb = match cmd.command_type {
        CommandType::Taskfile28 if !options.force_16_byte => SatCdb::new(
            AtaPassThrough12 {
                opcode: ATA_PASS_THROUGH_12,
                protocol,
                flags,
                features: tf.features,
                count: tf.count,
                lba_low: tf.lba_low,
                lba_mid: tf.lba_mid,
                lba_high: tf.lba_high,
                device: tf.device,
                command: tf.command,
                reserved: 0,
                control: 0,
            }
            .as_bytes(),
        ),
        CommandType::Taskfile28 | CommandType::ExtendedTaskfile48 => SatCdb::new(
            AtaPassThrough16 {
                opcode: ATA_PASS_THROUGH_16,
                protocol,
                flags,
                features_ext: tf.features_ext,
                features: tf.features,
                count_ext: tf.count_ext,
                count: tf.count,
                lba_low_ext: tf.lba_low_ext,
                lba_low: tf.lba_low,
                lba_mid_ext: tf.lba_mid_ext,
                lba_mid: tf.lba_mid,
                lba_high_ext: tf.lba_high_ext,
                lba_high: tf.lba_high,
                device: tf.device,
                command: tf.command,
                control: 0,
            }
            .as_bytes(),
        ),
        CommandType::CompleteTaskfileWithAux => {
            let lba = tf.lba48().to_be_bytes();
            let mut lba_bytes = [0u8; 6];
            lba_bytes.copy_from_slice(&lba[2..]);
            SatCdb::new(
                AtaPassThrough32 {
                    opcode: VARIABLE_LENGTH_CDB,
                    control: 0,
                    additional_cdb_length: ADDITIONAL_CDB_LENGTH_32,
                    service_action_bytes: ATA_PASS_THROUGH_32.to_be_bytes(),
                    protocol,
                    flags,
                    lba_bytes,
                    features_bytes: tf.features16().to_be_bytes(),
                    count_bytes: tf.count16().to_be_bytes(),
                    device: tf.device,
                    command: tf.command,
                    icc: tf.icc,
                    aux_bytes: tf.aux.to_be_bytes(),
                    ..Default::default()
                }
                .as_bytes(),
            )
        }
    };
    trace!("ATA command {:#04x} as SAT CDB {:02x?}", tf.command, cdb.as_bytes());
    Ok(cdb)
}
