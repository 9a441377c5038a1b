// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! ATA commands and their translation to SCSI ATA PASS-THROUGH.

pub mod sat;
mod taskfile;

pub use taskfile::is_extended_only;
pub use taskfile::status;
pub use taskfile::AtaCommand;
pub use taskfile::AtaProtocol;
pub use taskfile::CommandType;
pub use taskfile::Direction;
pub use taskfile::LengthLocation;
pub use taskfile::Rtfr;
pub use taskfile::Taskfile;
pub use taskfile::TransferUnit;
pub use taskfile::DEVICE_LBA;
