// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Offline helpers for storage passthrough: builds ATA PASS-THROUGH CDBs, decodes sense data and
//! shows how NVMe statuses translate to SCSI.

use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use argh::FromArgs;
use log::debug;
use storhal::ata::sat::build_sat_cdb;
use storhal::ata::sat::parse_fixed_format_sense;
use storhal::ata::sat::rtfrs_from_descriptor_sense;
use storhal::ata::sat::FixedFormatRtfrs;
use storhal::ata::sat::SatOptions;
use storhal::ata::AtaCommand;
use storhal::ata::AtaProtocol;
use storhal::ata::CommandType;
use storhal::ata::Direction;
use storhal::ata::Rtfr;
use storhal::ata::Taskfile;
use storhal::load_device_config;
use storhal::nvme::NvmeStatus;
use storhal::scsi::Sense;
use storhal::scsi::SenseFormat;
use storhal::sntl::nvme_status_to_scsi;
use storhal::DeviceConfig;
use storhal::InterfaceType;

#[derive(FromArgs)]
/// Storage command passthrough utilities.
struct Args {
    /// path to a JSON device configuration
    #[argh(option)]
    cfg: Option<PathBuf>,
    /// log filter in env_logger syntax, such as "debug"
    #[argh(option, default = "String::from(\"info\")")]
    log_level: String,
    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    BuildSatCdb(BuildSatCdbCommand),
    DecodeSense(DecodeSenseCommand),
    NvmeStatus(NvmeStatusCommand),
}

#[derive(FromArgs)]
#[argh(subcommand, name = "build-sat-cdb")]
/// Print the ATA PASS-THROUGH CDB for an ATA command.
struct BuildSatCdbCommand {
    /// ATA command opcode
    #[argh(positional, from_str_fn(parse_u8))]
    opcode: u8,
    /// protocol: hard-reset, soft-reset, non-data, pio-in, pio-out, dma, dma-queued, udma,
    /// fpdma, device-reset, device-diag or return-response-info
    #[argh(option, from_str_fn(parse_protocol))]
    protocol: AtaProtocol,
    /// data direction: in, out or none (default none)
    #[argh(option, from_str_fn(parse_direction), default = "Direction::NoData")]
    direction: Direction,
    /// use 48-bit registers
    #[argh(switch)]
    ext: bool,
    /// logical block address
    #[argh(option, from_str_fn(parse_u64), default = "0")]
    lba: u64,
    /// sector count
    #[argh(option, from_str_fn(parse_u64), default = "0")]
    count: u64,
    /// features register
    #[argh(option, from_str_fn(parse_u64), default = "0")]
    features: u64,
    /// ask for the returned registers even on success
    #[argh(switch)]
    check_condition: bool,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "decode-sense")]
/// Decode sense data returned for an ATA PASS-THROUGH command.
struct DecodeSenseCommand {
    /// the command was a 48-bit command
    #[argh(switch)]
    ext: bool,
    /// sense bytes in hex
    #[argh(positional)]
    sense: Vec<String>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "nvme-status")]
/// Print the SCSI status and sense data an NVMe status translates to.
struct NvmeStatusCommand {
    /// status code type
    #[argh(positional, from_str_fn(parse_u8))]
    sct: u8,
    /// status code
    #[argh(positional, from_str_fn(parse_u8))]
    sc: u8,
}

fn parse_u64(value: &str) -> std::result::Result<u64, String> {
    let parsed = match value.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid number {}: {}", value, e))
}

fn parse_u8(value: &str) -> std::result::Result<u8, String> {
    let v = parse_u64(value)?;
    u8::try_from(v).map_err(|_| format!("{} does not fit in a byte", value))
}

fn parse_protocol(value: &str) -> std::result::Result<AtaProtocol, String> {
    Ok(match value {
        "non-data" => AtaProtocol::NoData,
        "pio-in" => AtaProtocol::PioIn,
        "pio-out" => AtaProtocol::PioOut,
        "dma" => AtaProtocol::Dma,
        "dma-queued" => AtaProtocol::DmaQueued,
        "udma" => AtaProtocol::Udma,
        "fpdma" => AtaProtocol::FpDma,
        "hard-reset" => AtaProtocol::HardReset,
        "soft-reset" => AtaProtocol::SoftReset,
        "device-reset" => AtaProtocol::DeviceReset,
        "device-diag" => AtaProtocol::ExecDeviceDiag,
        "return-response-info" => AtaProtocol::ReturnResponseInfo,
        _ => return Err(format!("unknown protocol {}", value)),
    })
}

fn parse_direction(value: &str) -> std::result::Result<Direction, String> {
    Ok(match value {
        "in" => Direction::In,
        "out" => Direction::Out,
        "none" => Direction::NoData,
        _ => return Err(format!("unknown direction {}", value)),
    })
}

/// Parses hex bytes, either separated by whitespace or run together.
fn parse_hex_bytes(words: &[String]) -> Result<Vec<u8>> {
    let digits: String = words.concat().split_whitespace().collect();
    if !digits.is_ascii() {
        bail!("invalid hex bytes {}", digits);
    }
    if digits.len() % 2 != 0 {
        bail!("odd number of hex digits");
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .with_context(|| format!("invalid hex byte {}", &digits[i..i + 2]))
        })
        .collect()
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_sense(sense: &Sense) {
    println!(
        "sense key {:#04x} asc {:#04x} ascq {:#04x}",
        sense.key, sense.asc, sense.ascq
    );
}

fn print_rtfr(rtfr: &Rtfr) {
    println!(
        "status {:#04x} error {:#04x} device {:#04x}",
        rtfr.status, rtfr.error, rtfr.device
    );
    if rtfr.extended {
        println!("count {:#06x} lba {:#014x}", rtfr.count16(), rtfr.lba48());
    } else {
        println!("count {:#04x} lba {:#09x}", rtfr.count, rtfr.lba28());
    }
}

fn build_sat_cdb_cmd(cmd: BuildSatCdbCommand, config: &DeviceConfig) -> Result<()> {
    let mut taskfile = Taskfile::new(cmd.opcode);
    let command_type = if cmd.ext {
        let lba_limit = 1 << 48;
        if cmd.lba >= lba_limit || cmd.count > u16::MAX as u64 || cmd.features > u16::MAX as u64
        {
            bail!("register value out of range for a 48-bit command");
        }
        taskfile.set_lba48(cmd.lba);
        taskfile.set_count16(cmd.count as u16);
        taskfile.set_features16(cmd.features as u16);
        CommandType::ExtendedTaskfile48
    } else {
        let lba: u32 = cmd
            .lba
            .try_into()
            .ok()
            .filter(|lba: &u32| lba >> 28 == 0)
            .context("lba out of range for a 28-bit command")?;
        taskfile.set_lba28(lba);
        taskfile.count = u8::try_from(cmd.count).context("count out of range")?;
        taskfile.features = u8::try_from(cmd.features).context("features out of range")?;
        CommandType::Taskfile28
    };
    let mut ata_cmd = AtaCommand::new(cmd.protocol, cmd.direction, command_type, taskfile);
    ata_cmd.check_condition = cmd.check_condition;
    let cdb = build_sat_cdb(&ata_cmd, &SatOptions::from(config))
        .with_context(|| format!("cannot build a CDB for ATA command {:#04x}", cmd.opcode))?;
    println!("{}", hex(cdb.as_bytes()));
    Ok(())
}

fn decode_sense_cmd(cmd: DecodeSenseCommand) -> Result<()> {
    let sense = parse_hex_bytes(&cmd.sense)?;
    let Some(format) = SenseFormat::of(&sense) else {
        bail!("not sense data: {}", hex(&sense));
    };
    if let Some(parsed) = Sense::parse(&sense) {
        print_sense(&parsed);
    }
    match format {
        SenseFormat::Descriptor => match rtfrs_from_descriptor_sense(&sense) {
            Some(rtfr) => print_rtfr(&rtfr),
            None => println!("no ATA return descriptor"),
        },
        SenseFormat::Fixed => {
            let command_type = if cmd.ext {
                CommandType::ExtendedTaskfile48
            } else {
                CommandType::Taskfile28
            };
            let ata_cmd = AtaCommand::new(
                AtaProtocol::NoData,
                Direction::NoData,
                command_type,
                Taskfile::default(),
            );
            match parse_fixed_format_sense(&sense, &ata_cmd) {
                FixedFormatRtfrs::NotAvailable => println!("no ATA PASS-THROUGH information"),
                FixedFormatRtfrs::ResultsLogRequired { log_index, partial } => {
                    match log_index {
                        Some(index) => println!(
                            "registers are in results log parameter {:#04x}",
                            index
                        ),
                        None => println!("registers are in the latest results log entry"),
                    }
                    if let Some(rtfr) = partial {
                        print_rtfr(&rtfr);
                    }
                }
            }
        }
    }
    Ok(())
}

fn nvme_status_cmd(cmd: NvmeStatusCommand) -> Result<()> {
    let status = NvmeStatus {
        sct: cmd.sct,
        sc: cmd.sc,
        ..Default::default()
    };
    let (scsi_status, sense) = nvme_status_to_scsi(status);
    println!("{}: {:?}", status, scsi_status);
    if let Some(sense) = sense {
        print_sense(&sense);
    }
    Ok(())
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();
    env_logger::Builder::new()
        .parse_filters(&args.log_level)
        .init();

    let config = match &args.cfg {
        Some(path) => load_device_config(path)?,
        None => DeviceConfig::new(InterfaceType::Ata),
    };
    debug!("device config: {:?}", config);

    match args.command {
        Command::BuildSatCdb(cmd) => build_sat_cdb_cmd(cmd, &config),
        Command::DecodeSense(cmd) => decode_sense_cmd(cmd),
        Command::NvmeStatus(cmd) => nvme_status_cmd(cmd),
    }
}
