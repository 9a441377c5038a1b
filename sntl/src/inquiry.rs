// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! INQUIRY, built from Identify Controller and Identify Namespace.

use log::warn;
use passthru::DataTransfer;
use scsi::constants::*;

use crate::commands::Inquiry;
use crate::data::write_data_in;
use crate::unit::LogicalUnit;
use crate::Result;
use crate::TranslateError;

const STANDARD_INQUIRY_LEN: usize = 36;
const VENDOR_ID: &[u8] = b"NVMe";

// Designator code sets, types and association for the Device Identification page.
const CODE_SET_BINARY: u8 = 0x1;
const CODE_SET_ASCII: u8 = 0x2;
const DESIGNATOR_T10_VENDOR_ID: u8 = 0x1;
const DESIGNATOR_EUI64: u8 = 0x2;

// Block Device Characteristics: medium rotation rate of a non-rotating medium.
const NON_ROTATING_MEDIUM: u16 = 0x0001;

// Logical Block Provisioning flags.
const LBPU: u8 = 1 << 7;
const LBPRZ: u8 = 1 << 2;
const PROVISIONING_TYPE_THIN: u8 = 0x2;

pub(crate) fn inquiry(
    command: &Inquiry,
    unit: &LogicalUnit,
    data: &mut DataTransfer,
) -> Result<usize> {
    let outbuf = if command.vital_product_data_enabled() {
        vital_product_data_page(command.page_code(), unit)?
    } else {
        // PAGE CODE should be 0 when vpd bit is 0.
        if command.page_code() != 0 {
            return Err(TranslateError::InvalidField);
        }
        standard_inquiry_data(unit)?
    };
    write_data_in(data, &outbuf, command.alloc_len())
}

fn standard_inquiry_data(unit: &LogicalUnit) -> Result<Vec<u8>> {
    let controller = unit.identify_controller()?;
    let mut outbuf = vec![0u8; STANDARD_INQUIRY_LEN];
    // Peripheral
    outbuf[0] = TYPE_DISK;
    // Removable bit. NVMe namespaces are not removable.
    outbuf[1] = 0x0;
    // Version 0x6 indicates that the device complies to SPC-4.
    outbuf[2] = 0x6;
    // Response Data Format should be 2.
    outbuf[3] = 0x2;
    // Additional Length
    outbuf[4] = (STANDARD_INQUIRY_LEN - 5) as u8;
    // Cmdque: support full task management mode
    outbuf[7] = 0x2;
    // Vendor
    fill_left_aligned_ascii(&mut outbuf[8..16], VENDOR_ID);
    // Product ID
    fill_left_aligned_ascii(&mut outbuf[16..32], controller.model_number());
    // Product revision level
    fill_left_aligned_ascii(&mut outbuf[32..36], controller.firmware_revision());
    Ok(outbuf)
}

fn vital_product_data_page(page_code: u8, unit: &LogicalUnit) -> Result<Vec<u8>> {
    let controller = unit.identify_controller()?;
    let mut outbuf = vec![0u8; 4];
    // Peripheral
    outbuf[0] = TYPE_DISK;
    outbuf[1] = page_code;
    match page_code {
        VPD_SUPPORTED_PAGES => {
            outbuf.extend_from_slice(&[
                VPD_SUPPORTED_PAGES,
                VPD_UNIT_SERIAL_NUMBER,
                VPD_DEVICE_IDENTIFICATION,
                VPD_BLOCK_LIMITS,
                VPD_BLOCK_DEVICE_CHARACTERISTICS,
            ]);
            if controller.dsm_supported() {
                outbuf.push(VPD_LOGICAL_BLOCK_PROVISIONING);
            }
        }
        VPD_UNIT_SERIAL_NUMBER => {
            outbuf.extend_from_slice(controller.serial_number());
        }
        VPD_DEVICE_IDENTIFICATION => {
            let namespace = unit.identify_namespace()?;
            if let Some(nguid) = namespace.nguid() {
                push_designator(&mut outbuf, CODE_SET_BINARY, DESIGNATOR_EUI64, &nguid);
            } else if let Some(eui64) = namespace.eui64() {
                push_designator(&mut outbuf, CODE_SET_BINARY, DESIGNATOR_EUI64, &eui64);
            }
            // T10 vendor ID, then a vendor specific identifier made of the model and serial
            // number.
            let mut t10_id = vec![b' '; 8];
            fill_left_aligned_ascii(&mut t10_id, VENDOR_ID);
            t10_id.extend_from_slice(controller.model_number());
            t10_id.push(b'_');
            t10_id.extend_from_slice(controller.serial_number());
            t10_id.truncate(u8::MAX as usize);
            push_designator(&mut outbuf, CODE_SET_ASCII, DESIGNATOR_T10_VENDOR_ID, &t10_id);
        }
        VPD_BLOCK_LIMITS => {
            outbuf.resize(0x40, 0);
            let namespace = unit.identify_namespace()?;
            // Maximum transfer length in blocks; 0 means no limit.
            let max_transfer = controller.max_transfer_bytes().map_or(0, |bytes| {
                u32::try_from(bytes / namespace.block_size() as usize).unwrap_or(u32::MAX)
            });
            outbuf[8..12].copy_from_slice(&max_transfer.to_be_bytes());
            if controller.dsm_supported() {
                // Maximum unmap LBA count
                outbuf[20..24].fill(0xff);
                // Maximum unmap block descriptor count
                outbuf[24..28].copy_from_slice(&(nvme::MAX_DSM_RANGES as u32).to_be_bytes());
            }
        }
        VPD_BLOCK_DEVICE_CHARACTERISTICS => {
            outbuf.resize(0x40, 0);
            outbuf[4..6].copy_from_slice(&NON_ROTATING_MEDIUM.to_be_bytes());
        }
        VPD_LOGICAL_BLOCK_PROVISIONING if controller.dsm_supported() => {
            outbuf.resize(8, 0);
            let namespace = unit.identify_namespace()?;
            // skip outbuf[4]: threshold sets are not supported.
            outbuf[5] = LBPU;
            if namespace.deallocated_reads_zero() {
                outbuf[5] |= LBPRZ;
            }
            if namespace.thin_provisioned() {
                outbuf[6] = PROVISIONING_TYPE_THIN;
            }
        }
        _ => {
            warn!("unsupported vpd page code: {:#x?}", page_code);
            return Err(TranslateError::InvalidField);
        }
    };
    // Page length
    let page_len = (outbuf.len() - 4) as u16;
    outbuf[2..4].copy_from_slice(&page_len.to_be_bytes());
    Ok(outbuf)
}

fn push_designator(outbuf: &mut Vec<u8>, code_set: u8, designator_type: u8, designator: &[u8]) {
    outbuf.push(code_set);
    // ASSOCIATION: the designator is associated with the addressed logical unit.
    outbuf.push(designator_type);
    outbuf.push(0);
    outbuf.push(designator.len() as u8);
    outbuf.extend_from_slice(designator);
}

/// Copies `s` into `buf` left-aligned, padding with spaces and truncating to fit.
fn fill_left_aligned_ascii(buf: &mut [u8], s: &[u8]) {
    let len = s.len().min(buf.len());
    buf[..len].copy_from_slice(&s[..len]);
    buf[len..].fill(b' ');
}

#[cfg(test)]
mod tests {
    use nvme::generic;
    use nvme::StatusCodeType;
    use nvme::ADMIN_IDENTIFY;

    use super::*;
    use crate::test_helpers::*;

    fn run_inquiry(unit: &LogicalUnit, cdb: [u8; 6]) -> Result<Vec<u8>> {
        let command = match crate::Command::new(&cdb)? {
            crate::Command::Inquiry(c) => c,
            command => panic!("unexpected command type: {:?}", command),
        };
        let mut buf = vec![0u8; 512];
        let n = inquiry(&command, unit, &mut DataTransfer::FromDevice(&mut buf))?;
        buf.truncate(n);
        Ok(buf)
    }

    #[test]
    fn standard_data() {
        let mock = MockNvme::new();
        let device = nvme_device(&mock);
        let unit = LogicalUnit::new(&device);
        let data = run_inquiry(&unit, [INQUIRY, 0, 0, 0, 0xff, 0]).unwrap();
        assert_eq!(data.len(), 36);
        assert_eq!(data[0], TYPE_DISK);
        assert_eq!(data[4], 31);
        assert_eq!(&data[8..16], b"NVMe    ");
        // The model is truncated to 16 bytes.
        assert_eq!(&data[16..32], b"Example NVMe Mod");
        assert_eq!(&data[32..36], b"FW1.");
        // Cached identify data needs no NVMe command.
        assert!(mock.commands().is_empty());
    }

    #[test]
    fn standard_data_respects_allocation_length() {
        let mock = MockNvme::new();
        let device = nvme_device(&mock);
        let unit = LogicalUnit::new(&device);
        let data = run_inquiry(&unit, [INQUIRY, 0, 0, 0, 5, 0]).unwrap();
        assert_eq!(data.len(), 5);
    }

    #[test]
    fn page_code_without_evpd() {
        let mock = MockNvme::new();
        let device = nvme_device(&mock);
        let unit = LogicalUnit::new(&device);
        assert!(matches!(
            run_inquiry(&unit, [INQUIRY, 0, 0x80, 0, 0xff, 0]),
            Err(TranslateError::InvalidField)
        ));
    }

    #[test]
    fn identify_is_issued_without_cache() {
        let mock = MockNvme::new();
        mock.push(MockNvmeReply::success_with_data(controller_data()));
        let device = passthru::Device::new("nvme0n1", nvme_config(), Box::new(mock.clone()));
        let unit = LogicalUnit::new(&device);
        let data = run_inquiry(&unit, [INQUIRY, 0, 0, 0, 0xff, 0]).unwrap();
        assert_eq!(&data[16..32], b"Example NVMe Mod");
        let commands = mock.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].1.opcode(), ADMIN_IDENTIFY);
        assert_eq!(commands[0].1.cdw10, nvme::CNS_CONTROLLER as u32);
    }

    #[test]
    fn failed_identify_is_translated() {
        let mock = MockNvme::new();
        mock.push(MockNvmeReply::status(
            StatusCodeType::Generic,
            generic::INTERNAL_ERROR,
        ));
        let device = passthru::Device::new("nvme0n1", nvme_config(), Box::new(mock.clone()));
        let unit = LogicalUnit::new(&device);
        assert!(matches!(
            run_inquiry(&unit, [INQUIRY, 0, 0, 0, 0xff, 0]),
            Err(TranslateError::Nvme(s)) if s.sc == generic::INTERNAL_ERROR
        ));
    }

    #[test]
    fn supported_pages() {
        let mock = MockNvme::new();
        let device = nvme_device(&mock);
        let unit = LogicalUnit::new(&device);
        let data = run_inquiry(&unit, [INQUIRY, 1, 0x00, 0, 0xff, 0]).unwrap();
        assert_eq!(data, [0, 0, 0, 6, 0x00, 0x80, 0x83, 0xb0, 0xb1, 0xb2]);

        let device = nvme_device_with(&mock, |controller, _| controller[520] = 0);
        let unit = LogicalUnit::new(&device);
        let data = run_inquiry(&unit, [INQUIRY, 1, 0x00, 0, 0xff, 0]).unwrap();
        assert_eq!(data, [0, 0, 0, 5, 0x00, 0x80, 0x83, 0xb0, 0xb1]);
        assert!(matches!(
            run_inquiry(&unit, [INQUIRY, 1, 0xb2, 0, 0xff, 0]),
            Err(TranslateError::InvalidField)
        ));
    }

    #[test]
    fn unit_serial_number() {
        let mock = MockNvme::new();
        let device = nvme_device(&mock);
        let unit = LogicalUnit::new(&device);
        let data = run_inquiry(&unit, [INQUIRY, 1, 0x80, 0, 0xff, 0]).unwrap();
        assert_eq!(&data[..4], &[0, 0x80, 0, 12]);
        assert_eq!(&data[4..], b"SN0123456789");
    }

    #[test]
    fn device_identification() {
        let mock = MockNvme::new();
        let device = nvme_device(&mock);
        let unit = LogicalUnit::new(&device);
        let data = run_inquiry(&unit, [INQUIRY, 1, 0x83, 0, 0xff, 0]).unwrap();
        // NGUID designator.
        assert_eq!(&data[4..8], &[CODE_SET_BINARY, DESIGNATOR_EUI64, 0, 16]);
        assert_eq!(data[8], 0x00);
        assert_eq!(data[23], 0xff);
        // T10 vendor ID designator.
        assert_eq!(&data[24..28], &[CODE_SET_ASCII, DESIGNATOR_T10_VENDOR_ID, 0, 56]);
        assert_eq!(&data[28..36], b"NVMe    ");
        assert!(data.ends_with(b"Long Name_SN0123456789"));
        let page_len = u16::from_be_bytes([data[2], data[3]]) as usize;
        assert_eq!(page_len, data.len() - 4);
    }

    #[test]
    fn device_identification_falls_back_to_eui64() {
        let mock = MockNvme::new();
        let device = nvme_device_with(&mock, |_, namespace| {
            namespace[104..120].fill(0);
            namespace[120..128].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        });
        let unit = LogicalUnit::new(&device);
        let data = run_inquiry(&unit, [INQUIRY, 1, 0x83, 0, 0xff, 0]).unwrap();
        assert_eq!(&data[4..16], &[1, 2, 0, 8, 1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn block_limits() {
        let mock = MockNvme::new();
        let device = nvme_device(&mock);
        let unit = LogicalUnit::new(&device);
        let data = run_inquiry(&unit, [INQUIRY, 1, 0xb0, 0, 0xff, 0]).unwrap();
        assert_eq!(data.len(), 0x40);
        assert_eq!(&data[2..4], &[0, 0x3c]);
        // 1 MiB of 512 byte blocks.
        assert_eq!(&data[8..12], &2048u32.to_be_bytes());
        assert_eq!(&data[20..24], &[0xff; 4]);
        assert_eq!(&data[24..28], &256u32.to_be_bytes());
    }

    #[test]
    fn block_device_characteristics() {
        let mock = MockNvme::new();
        let device = nvme_device(&mock);
        let unit = LogicalUnit::new(&device);
        let data = run_inquiry(&unit, [INQUIRY, 1, 0xb1, 0, 0xff, 0]).unwrap();
        assert_eq!(&data[..6], &[0, 0xb1, 0, 0x3c, 0, 1]);
    }

    #[test]
    fn logical_block_provisioning() {
        let mock = MockNvme::new();
        let device = nvme_device(&mock);
        let unit = LogicalUnit::new(&device);
        let data = run_inquiry(&unit, [INQUIRY, 1, 0xb2, 0, 0xff, 0]).unwrap();
        assert_eq!(data, [0, 0xb2, 0, 4, 0, LBPU | LBPRZ, PROVISIONING_TYPE_THIN, 0]);
    }

    #[test]
    fn unknown_vpd_page() {
        let mock = MockNvme::new();
        let device = nvme_device(&mock);
        let unit = LogicalUnit::new(&device);
        assert!(matches!(
            run_inquiry(&unit, [INQUIRY, 1, 0x89, 0, 0xff, 0]),
            Err(TranslateError::InvalidField)
        ));
    }

    #[test]
    fn fill_truncates_and_pads() {
        let mut buf = [0u8; 4];
        fill_left_aligned_ascii(&mut buf, b"ab");
        assert_eq!(&buf, b"ab  ");
        fill_left_aligned_ascii(&mut buf, b"abcdef");
        assert_eq!(&buf, b"abcd");
    }
}
