// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Access to the data phase of a SCSI command.

use std::cmp;

use passthru::DataTransfer;
use passthru::Error;

use crate::Result;

/// Copies emulated parameter data into the data-in buffer, truncated to the allocation length
/// and to the buffer. Returns the number of bytes copied.
pub(crate) fn write_data_in(
    data: &mut DataTransfer,
    response: &[u8],
    alloc_len: usize,
) -> Result<usize> {
    match data {
        DataTransfer::None => Ok(0),
        DataTransfer::FromDevice(buf) => {
            let len = cmp::min(cmp::min(response.len(), alloc_len), buf.len());
            buf[..len].copy_from_slice(&response[..len]);
            Ok(len)
        }
        DataTransfer::ToDevice(_) => Err(Error::BadParameter(
            "data-in command given a write buffer".to_string(),
        )
        .into()),
    }
}

/// Returns the first `len` bytes of the data-in buffer.
pub(crate) fn data_in<'b>(data: &'b mut DataTransfer, len: usize) -> Result<&'b mut [u8]> {
    match data {
        DataTransfer::FromDevice(buf) => {
            if buf.len() >= len {
                Ok(&mut buf[..len])
            } else {
                Err(Error::BadParameter(format!(
                    "{} byte read buffer for a {} byte transfer",
                    buf.len(),
                    len
                ))
                .into())
            }
        }
        _ => Err(Error::BadParameter(format!("{} byte transfer needs a read buffer", len)).into()),
    }
}

/// Returns the first `len` bytes of the data-out buffer. A zero length needs no buffer.
pub(crate) fn data_out<'b>(data: &'b DataTransfer, len: usize) -> Result<&'b [u8]> {
    match data {
        DataTransfer::None if len == 0 => Ok(&[]),
        DataTransfer::ToDevice(buf) if buf.len() >= len => Ok(&buf[..len]),
        DataTransfer::ToDevice(buf) => Err(Error::BadParameter(format!(
            "{} byte write buffer for a {} byte transfer",
            buf.len(),
            len
        ))
        .into()),
        _ => Err(Error::BadParameter(format!("{} byte transfer needs a write buffer", len)).into()),
    }
}
