// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Fixed and descriptor format sense data.
//!
//! Details are in SPC-4 t10 revision 37, section 4.5:
//! <https://www.t10.org/cgi-bin/ac.pl?t=f&f=spc4r37.pdf>

/// The largest sense buffer a device server may return.
pub const SENSE_BUFFER_LEN: usize = 252;

/// Length of fixed format sense data as built by `Sense::write`.
pub const FIXED_SENSE_LEN: usize = 18;
/// Length of the descriptor format sense data header.
pub const DESCRIPTOR_SENSE_HEADER_LEN: usize = 8;

// Fixed format offsets.
pub const FIXED_RESPONSE_CODE: usize = 0;
pub const FIXED_SENSE_KEY: usize = 2;
pub const FIXED_INFORMATION: usize = 3;
pub const FIXED_ADDITIONAL_LENGTH: usize = 7;
pub const FIXED_COMMAND_SPECIFIC_INFORMATION: usize = 8;
pub const FIXED_ASC: usize = 12;
pub const FIXED_ASCQ: usize = 13;

// Descriptor format offsets.
pub const DESCRIPTOR_SENSE_KEY: usize = 1;
pub const DESCRIPTOR_ASC: usize = 2;
pub const DESCRIPTOR_ASCQ: usize = 3;
pub const DESCRIPTOR_ADDITIONAL_LENGTH: usize = 7;

const RESPONSE_CODE_MASK: u8 = 0x7f;
const FIXED_CURRENT: u8 = 0x70;
const FIXED_DEFERRED: u8 = 0x71;
const DESCRIPTOR_CURRENT: u8 = 0x72;
const DESCRIPTOR_DEFERRED: u8 = 0x73;

/// The two sense data layouts, discriminated by the response code.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SenseFormat {
    Fixed,
    Descriptor,
}

impl SenseFormat {
    /// Returns the format of `sense`, or `None` if the response code is not one of 0x70-0x73.
    pub fn of(sense: &[u8]) -> Option<Self> {
        match sense.first()? & RESPONSE_CODE_MASK {
            FIXED_CURRENT | FIXED_DEFERRED => Some(Self::Fixed),
            DESCRIPTOR_CURRENT | DESCRIPTOR_DEFERRED => Some(Self::Descriptor),
            _ => None,
        }
    }
}

/// Sense code representation
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Sense {
    /// Provides generic information describing an error or exception condition.
    pub key: u8,
    /// Additional Sense Code.
    /// Indicates further information related to the error or exception reported in the key field.
    pub asc: u8,
    /// Additional Sense Code Qualifier.
    /// Indicates further detailed information related to the additional sense code.
    pub ascq: u8,
}

impl Sense {
    pub const fn new(key: u8, asc: u8, ascq: u8) -> Self {
        Sense { key, asc, ascq }
    }

    /// Reads the sense key, ASC and ASCQ from either format. Fields past the end of a truncated
    /// buffer read as zero.
    pub fn parse(sense: &[u8]) -> Option<Self> {
        let byte = |i: usize| sense.get(i).copied().unwrap_or(0);
        match SenseFormat::of(sense)? {
            SenseFormat::Fixed => Some(Sense {
                key: byte(FIXED_SENSE_KEY) & 0x0f,
                asc: byte(FIXED_ASC),
                ascq: byte(FIXED_ASCQ),
            }),
            SenseFormat::Descriptor => Some(Sense {
                key: byte(DESCRIPTOR_SENSE_KEY) & 0x0f,
                asc: byte(DESCRIPTOR_ASC),
                ascq: byte(DESCRIPTOR_ASCQ),
            }),
        }
    }

    /// Writes current-error sense data in `format` to `buf` and returns the number of bytes
    /// written, which is smaller than the full sense length if `buf` is short.
    pub fn write(&self, format: SenseFormat, buf: &mut [u8]) -> usize {
        let mut sense_data = [0u8; FIXED_SENSE_LEN];
        let len = match format {
            SenseFormat::Fixed => {
                sense_data[FIXED_RESPONSE_CODE] = FIXED_CURRENT;
                // sense_data[1]: Obsolete
                sense_data[FIXED_SENSE_KEY] = self.key;
                // Additional length. The data is 18 bytes, and this byte is 8th.
                sense_data[FIXED_ADDITIONAL_LENGTH] = (FIXED_SENSE_LEN - 8) as u8;
                sense_data[FIXED_ASC] = self.asc;
                sense_data[FIXED_ASCQ] = self.ascq;
                FIXED_SENSE_LEN
            }
            SenseFormat::Descriptor => {
                sense_data[0] = DESCRIPTOR_CURRENT;
                sense_data[DESCRIPTOR_SENSE_KEY] = self.key;
                sense_data[DESCRIPTOR_ASC] = self.asc;
                sense_data[DESCRIPTOR_ASCQ] = self.ascq;
                // sense_data[7]: Additional sense length, which is 0 in this case.
                DESCRIPTOR_SENSE_HEADER_LEN
            }
        };
        let n = len.min(buf.len());
        buf[..n].copy_from_slice(&sense_data[..n]);
        n
    }
}

/// One sense data descriptor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SenseDescriptor<'a> {
    /// DESCRIPTOR TYPE
    pub code: u8,
    /// The whole descriptor, starting at the type byte.
    pub bytes: &'a [u8],
}

impl SenseDescriptor<'_> {
    /// The ADDITIONAL LENGTH field: the number of bytes following it.
    pub fn additional_length(&self) -> u8 {
        self.bytes[1]
    }
}

/// Iterates the descriptors of descriptor format sense data. Yields nothing for fixed format
/// data. A descriptor running past the end of the sense data ends the iteration.
pub struct Descriptors<'a> {
    remaining: &'a [u8],
}

pub fn descriptors(sense: &[u8]) -> Descriptors<'_> {
    let remaining = match SenseFormat::of(sense) {
        Some(SenseFormat::Descriptor) if sense.len() > DESCRIPTOR_SENSE_HEADER_LEN => {
            let end = (DESCRIPTOR_SENSE_HEADER_LEN + sense[DESCRIPTOR_ADDITIONAL_LENGTH] as usize)
                .min(sense.len());
            &sense[DESCRIPTOR_SENSE_HEADER_LEN..end]
        }
        _ => &[],
    };
    Descriptors { remaining }
}

impl<'a> Iterator for Descriptors<'a> {
    type Item = SenseDescriptor<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.len() < 2 {
            return None;
        }
        let len = 2 + self.remaining[1] as usize;
        if len > self.remaining.len() {
            self.remaining = &[];
            return None;
        }
        let (bytes, rest) = self.remaining.split_at(len);
        self.remaining = rest;
        Some(SenseDescriptor {
            code: bytes[0],
            bytes,
        })
    }
}
