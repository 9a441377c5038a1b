// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! MODE SENSE and MODE SELECT.
//!
//! Three mode pages are emulated: Read-Write Error Recovery, Caching and Control. Only the WCE bit
//! of the Caching page can be changed, through the Volatile Write Cache feature.

use nvme::FeatureSelect;
use passthru::DataTransfer;
use scsi::constants::*;

use crate::commands::ModeSelectParams;
use crate::commands::ModeSenseParams;
use crate::data::data_out;
use crate::data::write_data_in;
use crate::unit::LogicalUnit;
use crate::Result;
use crate::TranslateError;

/// The PC field of MODE SENSE.
#[derive(Copy, Clone, Debug, PartialEq, Eq, enumn::N)]
#[repr(u8)]
enum PageControl {
    Current = 0b00,
    Changeable = 0b01,
    Default = 0b10,
    Saved = 0b11,
}

const READ_WRITE_ERROR_RECOVERY_PAGE_LEN: u8 = 0x0a;
const CACHING_PAGE_LEN: u8 = 0x12;
const CONTROL_PAGE_LEN: u8 = 0x0a;

// Read-Write Error Recovery: automatic write reallocation enabled.
const AWRE: u8 = 1 << 7;
// Caching: write cache enable.
const WCE: u8 = 1 << 2;
// Control: descriptor format sense data.
const D_SENSE: u8 = 1 << 2;
// Device specific parameter: DPO and FUA bits are supported.
const DPOFUA: u8 = 1 << 4;
// MODE SENSE(10) header: long LBA block descriptors.
const LONGLBA: u8 = 1 << 0;
// SPF bit of a mode page: the page has the subpage format.
const SPF: u8 = 1 << 6;

const SHORT_BLOCK_DESCRIPTOR_LEN: usize = 8;
const LONG_BLOCK_DESCRIPTOR_LEN: usize = 16;

fn header_len(ten_byte: bool) -> usize {
    if ten_byte {
        8
    } else {
        4
    }
}

pub(crate) fn mode_sense(
    params: ModeSenseParams,
    unit: &LogicalUnit,
    data: &mut DataTransfer,
) -> Result<usize> {
    // Two bits, so every value is a PageControl.
    let page_control = PageControl::n(params.page_control).ok_or(TranslateError::InvalidField)?;
    // We do not support saved values.
    if page_control == PageControl::Saved {
        return Err(TranslateError::SavingParamNotSupported);
    }
    // There are no subpages, and asking for all of them is the same as asking for none.
    match (params.page_code, params.subpage_code) {
        (_, 0x00) | (MODE_PAGE_ALL, 0xff) => {}
        _ => return Err(TranslateError::InvalidField),
    }

    let namespace = unit.identify_namespace()?;
    let mut outbuf = vec![0u8; header_len(params.ten_byte)];
    // Device specific parameter
    let device_specific = DPOFUA;
    if params.ten_byte {
        outbuf[3] = device_specific;
    } else {
        outbuf[2] = device_specific;
    }

    if !params.dbd {
        let blocks = namespace.nsze();
        let block_size = namespace.block_size();
        if params.ten_byte && params.llbaa {
            outbuf[4] = LONGLBA;
            outbuf[6..8].copy_from_slice(&(LONG_BLOCK_DESCRIPTOR_LEN as u16).to_be_bytes());
            outbuf.extend_from_slice(&blocks.to_be_bytes());
            outbuf.extend_from_slice(&[0; 4]);
            outbuf.extend_from_slice(&block_size.to_be_bytes());
        } else {
            if params.ten_byte {
                outbuf[6..8].copy_from_slice(&(SHORT_BLOCK_DESCRIPTOR_LEN as u16).to_be_bytes());
            } else {
                outbuf[3] = SHORT_BLOCK_DESCRIPTOR_LEN as u8;
            }
            // A block count that does not fit reads as all ones.
            let blocks = u32::try_from(blocks).unwrap_or(u32::MAX);
            outbuf.extend_from_slice(&blocks.to_be_bytes());
            // Density code 0, then the three byte block length.
            outbuf.push(0);
            outbuf.extend_from_slice(&block_size.to_be_bytes()[1..]);
        }
    }

    match params.page_code {
        MODE_PAGE_ALL => {
            for page_code in [
                MODE_PAGE_READ_WRITE_ERROR_RECOVERY,
                MODE_PAGE_CACHING,
                MODE_PAGE_CONTROL,
            ] {
                fill_page(page_code, page_control, unit, &mut outbuf)?;
            }
        }
        page_code => fill_page(page_code, page_control, unit, &mut outbuf)?,
    }

    if params.ten_byte {
        let len = (outbuf.len() - 2) as u16;
        outbuf[0..2].copy_from_slice(&len.to_be_bytes());
    } else {
        outbuf[0] = u8::try_from(outbuf.len() - 1).unwrap_or(u8::MAX);
    }
    write_data_in(data, &outbuf, params.alloc_len)
}

// Appends the mode page `page_code` to `outbuf`.
fn fill_page(
    page_code: u8,
    page_control: PageControl,
    unit: &LogicalUnit,
    outbuf: &mut Vec<u8>,
) -> Result<()> {
    // page[0]: page code
    // page[1]: page length
    match page_code {
        MODE_PAGE_READ_WRITE_ERROR_RECOVERY => {
            let mut page = vec![0u8; READ_WRITE_ERROR_RECOVERY_PAGE_LEN as usize + 2];
            page[0] = page_code;
            page[1] = READ_WRITE_ERROR_RECOVERY_PAGE_LEN;
            if page_control != PageControl::Changeable {
                page[2] = AWRE;
            }
            outbuf.extend_from_slice(&page);
        }
        MODE_PAGE_CACHING => {
            let mut page = vec![0u8; CACHING_PAGE_LEN as usize + 2];
            page[0] = page_code;
            page[1] = CACHING_PAGE_LEN;
            let controller = unit.identify_controller()?;
            let wce = if controller.vwc_present() {
                match page_control {
                    PageControl::Changeable => true,
                    PageControl::Default => unit.write_cache_enabled(FeatureSelect::Default)?,
                    _ => unit.write_cache_enabled(FeatureSelect::Current)?,
                }
            } else {
                false
            };
            if wce {
                page[2] = WCE;
            }
            outbuf.extend_from_slice(&page);
        }
        MODE_PAGE_CONTROL => {
            let mut page = vec![0u8; CONTROL_PAGE_LEN as usize + 2];
            page[0] = page_code;
            page[1] = CONTROL_PAGE_LEN;
            if page_control != PageControl::Changeable && unit.descriptor_sense() {
                page[2] = D_SENSE;
            }
            outbuf.extend_from_slice(&page);
        }
        _ => return Err(TranslateError::InvalidField),
    }
    Ok(())
}

pub(crate) fn mode_select(
    params: ModeSelectParams,
    unit: &LogicalUnit,
    data: &mut DataTransfer,
) -> Result<usize> {
    // Vendor specific parameter lists are not accepted.
    if !params.pf {
        return Err(TranslateError::InvalidField);
    }
    if params.param_list_len == 0 {
        return Ok(0);
    }
    let list = data_out(data, params.param_list_len)?;
    let header_len = header_len(params.ten_byte);
    if list.len() < header_len {
        return Err(TranslateError::ParamListLength);
    }
    let (block_desc_len, long_lba) = if params.ten_byte {
        (
            u16::from_be_bytes([list[6], list[7]]) as usize,
            list[4] & LONGLBA != 0,
        )
    } else {
        (list[3] as usize, false)
    };
    let pages_offset = header_len + block_desc_len;
    if pages_offset > list.len() {
        return Err(TranslateError::ParamListLength);
    }
    if block_desc_len != 0 {
        check_block_descriptor(&list[header_len..pages_offset], long_lba, unit)?;
    }

    // Validate every page before changing anything.
    let mut wce = None;
    let mut offset = pages_offset;
    while offset < list.len() {
        if list.len() - offset < 2 {
            return Err(TranslateError::ParamListLength);
        }
        let page_code = list[offset] & 0x3f;
        if list[offset] & SPF != 0 {
            return Err(TranslateError::InvalidParamField);
        }
        let page_len = list[offset + 1];
        let end = offset + 2 + page_len as usize;
        if end > list.len() {
            return Err(TranslateError::ParamListLength);
        }
        let page = &list[offset..end];
        match (page_code, page_len) {
            (MODE_PAGE_READ_WRITE_ERROR_RECOVERY, READ_WRITE_ERROR_RECOVERY_PAGE_LEN) => {}
            (MODE_PAGE_CACHING, CACHING_PAGE_LEN) => wce = Some(page[2] & WCE != 0),
            (MODE_PAGE_CONTROL, CONTROL_PAGE_LEN) => {
                if (page[2] & D_SENSE != 0) != unit.descriptor_sense() {
                    return Err(TranslateError::InvalidParamField);
                }
            }
            _ => return Err(TranslateError::InvalidParamField),
        }
        offset = end;
    }

    if let Some(enable) = wce {
        let controller = unit.identify_controller()?;
        if controller.vwc_present() {
            unit.set_write_cache(enable, params.sp)?;
        } else if enable {
            return Err(TranslateError::InvalidParamField);
        }
    }
    Ok(params.param_list_len)
}

// The block length in a block descriptor has to be the formatted one.
fn check_block_descriptor(desc: &[u8], long_lba: bool, unit: &LogicalUnit) -> Result<()> {
    let block_len = match (long_lba, desc.len()) {
        (false, SHORT_BLOCK_DESCRIPTOR_LEN) => u32::from_be_bytes([0, desc[5], desc[6], desc[7]]),
        (true, LONG_BLOCK_DESCRIPTOR_LEN) => {
            u32::from_be_bytes([desc[12], desc[13], desc[14], desc[15]])
        }
        _ => return Err(TranslateError::ParamListLength),
    };
    let namespace = unit.identify_namespace()?;
    if block_len != namespace.block_size() {
        return Err(TranslateError::InvalidParamField);
    }
    Ok(())
}
