// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! NVMe submission and completion queue entries and the admin data structures the SCSI
//! translation reads.

mod command;
mod completion;
mod identify;
mod log;

pub use command::*;
pub use completion::command_specific;
pub use completion::generic;
pub use completion::media_error;
pub use completion::NvmeCompletion;
pub use completion::NvmeStatus;
pub use completion::StatusCodeType;
pub use identify::IdentifyController;
pub use identify::IdentifyNamespace;
pub use identify::LbaFormat;
pub use identify::IDENTIFY_DATA_LEN;
pub use log::critical_warning;
pub use log::SmartLog;
pub use log::SMART_LOG_LEN;
