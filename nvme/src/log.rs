// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

/// Size of the SMART / Health Information log page.
pub const SMART_LOG_LEN: usize = 512;

const CRITICAL_WARNING: usize = 0;
const COMPOSITE_TEMPERATURE: usize = 1;
const AVAILABLE_SPARE: usize = 3;
const AVAILABLE_SPARE_THRESHOLD: usize = 4;
const PERCENTAGE_USED: usize = 5;
const DATA_UNITS_READ: usize = 32;
const DATA_UNITS_WRITTEN: usize = 48;
const POWER_CYCLES: usize = 112;
const POWER_ON_HOURS: usize = 128;
const UNSAFE_SHUTDOWNS: usize = 144;
const MEDIA_ERRORS: usize = 160;

/// Bits of the Critical Warning field.
pub mod critical_warning {
    pub const SPARE_BELOW_THRESHOLD: u8 = 1 << 0;
    pub const TEMPERATURE: u8 = 1 << 1;
    pub const RELIABILITY_DEGRADED: u8 = 1 << 2;
    pub const READ_ONLY: u8 = 1 << 3;
    pub const VOLATILE_BACKUP_FAILED: u8 = 1 << 4;
}

/// Difference between Kelvin and degrees Celsius.
const KELVIN_OFFSET: i32 = 273;

/// SMART / Health Information log page (log identifier 02h).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmartLog {
    data: [u8; SMART_LOG_LEN],
}

impl Default for SmartLog {
    fn default() -> Self {
        SmartLog {
            data: [0u8; SMART_LOG_LEN],
        }
    }
}

impl SmartLog {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut log = SmartLog::default();
        let len = bytes.len().min(SMART_LOG_LEN);
        log.data[..len].copy_from_slice(&bytes[..len]);
        log
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn critical_warning(&self) -> u8 {
        self.data[CRITICAL_WARNING]
    }

    /// Composite temperature in Kelvin.
    pub fn temperature_kelvin(&self) -> u16 {
        u16::from_le_bytes([
            self.data[COMPOSITE_TEMPERATURE],
            self.data[COMPOSITE_TEMPERATURE + 1],
        ])
    }

    /// Composite temperature in degrees Celsius, or `None` if not reported.
    pub fn temperature_celsius(&self) -> Option<i32> {
        match self.temperature_kelvin() {
            0 => None,
            k => Some(k as i32 - KELVIN_OFFSET),
        }
    }

    pub fn available_spare(&self) -> u8 {
        self.data[AVAILABLE_SPARE]
    }

    pub fn available_spare_threshold(&self) -> u8 {
        self.data[AVAILABLE_SPARE_THRESHOLD]
    }

    /// Estimate of the life used, which may exceed 100.
    pub fn percentage_used(&self) -> u8 {
        self.data[PERCENTAGE_USED]
    }

    pub fn data_units_read(&self) -> u128 {
        self.counter(DATA_UNITS_READ)
    }

    pub fn data_units_written(&self) -> u128 {
        self.counter(DATA_UNITS_WRITTEN)
    }

    pub fn power_cycles(&self) -> u128 {
        self.counter(POWER_CYCLES)
    }

    pub fn power_on_hours(&self) -> u128 {
        self.counter(POWER_ON_HOURS)
    }

    pub fn unsafe_shutdowns(&self) -> u128 {
        self.counter(UNSAFE_SHUTDOWNS)
    }

    pub fn media_errors(&self) -> u128 {
        self.counter(MEDIA_ERRORS)
    }

    fn counter(&self, offset: usize) -> u128 {
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&self.data[offset..offset + 16]);
        u128::from_le_bytes(bytes)
    }
}
