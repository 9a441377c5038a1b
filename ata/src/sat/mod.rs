// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! SCSI / ATA Translation: ATA commands carried in ATA PASS-THROUGH CDBs.

mod cdb;
mod passthrough;
mod rtfr;
#[cfg(test)]
mod test_helpers;

pub use cdb::build_sat_cdb;
pub use cdb::SatCdb;
pub use cdb::SatOptions;
pub use cdb::SAT_CDB_MAX_LEN;
pub use passthrough::send_sat_passthrough;
pub use passthrough::SatOutcome;
pub use rtfr::extract_rtfrs;
pub use rtfr::parse_fixed_format_sense;
pub use rtfr::read_passthrough_results_log;
pub use rtfr::rtfrs_from_descriptor_sense;
pub use rtfr::rtfrs_from_fixed_format_sense;
pub use rtfr::AtaReturnDescriptor;
pub use rtfr::FixedFormatRtfrs;
pub use rtfr::ATA_RETURN_DESCRIPTOR_ADDITIONAL_LENGTH;
