// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! LOG SENSE, built from the SMART / Health Information log.

use log::warn;
use nvme::SmartLog;
use passthru::DataTransfer;
use scsi::constants::*;

use crate::commands::LogSense;
use crate::data::write_data_in;
use crate::unit::LogicalUnit;
use crate::Result;
use crate::TranslateError;

const SUPPORTED_LOG_PAGES: [u8; 4] = [
    LOG_PAGE_SUPPORTED_PAGES,
    LOG_PAGE_TEMPERATURE,
    LOG_PAGE_SOLID_STATE_MEDIA,
    LOG_PAGE_INFORMATIONAL_EXCEPTIONS,
];

// Parameter control byte: FORMAT AND LINKING set to a binary list.
const BINARY_LIST: u8 = 0x03;

// Temperature page parameters.
const TEMPERATURE: u16 = 0x0000;
const REFERENCE_TEMPERATURE: u16 = 0x0001;
// Solid State Media page parameter.
const PERCENTAGE_USED_ENDURANCE_INDICATOR: u16 = 0x0001;
// Informational Exceptions page parameter.
const INFORMATIONAL_EXCEPTIONS_GENERAL: u16 = 0x0000;

/// Degrees Celsius that could not be read.
const TEMPERATURE_UNKNOWN: u8 = 0xff;

const KELVIN_OFFSET: i32 = 273;

/// One log parameter: its code and value bytes.
struct LogParameter {
    code: u16,
    value: Vec<u8>,
}

impl LogParameter {
    fn new(code: u16, value: Vec<u8>) -> Self {
        LogParameter { code, value }
    }
}

fn celsius_byte(celsius: Option<i32>) -> u8 {
    match celsius {
        Some(c) => c.clamp(0, TEMPERATURE_UNKNOWN as i32 - 1) as u8,
        None => TEMPERATURE_UNKNOWN,
    }
}

fn kelvin_byte(kelvin: u16) -> u8 {
    match kelvin {
        0 => TEMPERATURE_UNKNOWN,
        k => celsius_byte(Some(k as i32 - KELVIN_OFFSET)),
    }
}

pub(crate) fn log_sense(
    command: &LogSense,
    unit: &LogicalUnit,
    data: &mut DataTransfer,
) -> Result<usize> {
    // Log parameters cannot be saved.
    if command.save_parameters() || command.subpage_code() != 0 {
        return Err(TranslateError::InvalidField);
    }
    let page_code = command.page_code();
    let outbuf = match page_code {
        LOG_PAGE_SUPPORTED_PAGES => {
            let mut outbuf = vec![page_code, 0];
            outbuf.extend_from_slice(&(SUPPORTED_LOG_PAGES.len() as u16).to_be_bytes());
            outbuf.extend_from_slice(&SUPPORTED_LOG_PAGES);
            outbuf
        }
        LOG_PAGE_TEMPERATURE | LOG_PAGE_SOLID_STATE_MEDIA | LOG_PAGE_INFORMATIONAL_EXCEPTIONS => {
            let smart = unit.smart_log()?;
            let params = match page_code {
                LOG_PAGE_TEMPERATURE => {
                    let controller = unit.identify_controller()?;
                    temperature_params(&smart, controller.wctemp())
                }
                LOG_PAGE_SOLID_STATE_MEDIA => solid_state_media_params(&smart),
                _ => informational_exceptions_params(&smart),
            };
            build_page(page_code, &params, command.param_pointer())?
        }
        _ => {
            warn!("unsupported log page code: {:#x?}", page_code);
            return Err(TranslateError::InvalidField);
        }
    };
    write_data_in(data, &outbuf, command.alloc_len())
}

/// Lays out the parameters whose codes are at least `param_pointer`.
fn build_page(page_code: u8, params: &[LogParameter], param_pointer: u16) -> Result<Vec<u8>> {
    if params.iter().all(|p| p.code < param_pointer) {
        return Err(TranslateError::InvalidField);
    }
    let mut outbuf = vec![page_code, 0, 0, 0];
    for param in params.iter().filter(|p| p.code >= param_pointer) {
        outbuf.extend_from_slice(&param.code.to_be_bytes());
        outbuf.push(BINARY_LIST);
        outbuf.push(param.value.len() as u8);
        outbuf.extend_from_slice(&param.value);
    }
    let page_len = (outbuf.len() - 4) as u16;
    outbuf[2..4].copy_from_slice(&page_len.to_be_bytes());
    Ok(outbuf)
}

fn temperature_params(smart: &SmartLog, wctemp: u16) -> Vec<LogParameter> {
    vec![
        LogParameter::new(TEMPERATURE, vec![0, celsius_byte(smart.temperature_celsius())]),
        LogParameter::new(REFERENCE_TEMPERATURE, vec![0, kelvin_byte(wctemp)]),
    ]
}

fn solid_state_media_params(smart: &SmartLog) -> Vec<LogParameter> {
    vec![LogParameter::new(
        PERCENTAGE_USED_ENDURANCE_INDICATOR,
        vec![0, 0, 0, smart.percentage_used()],
    )]
}

fn informational_exceptions_params(smart: &SmartLog) -> Vec<LogParameter> {
    let (asc, ascq) = if smart.critical_warning() != 0 {
        (ASC_FAILURE_PREDICTION_THRESHOLD_EXCEEDED, 0)
    } else {
        (ASC_NO_ADDITIONAL_SENSE, 0)
    };
    vec![LogParameter::new(
        INFORMATIONAL_EXCEPTIONS_GENERAL,
        vec![asc, ascq, celsius_byte(smart.temperature_celsius())],
    )]
}
