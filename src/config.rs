// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fs::File;
use std::io;
use std::io::BufReader;
use std::path::Path;
use std::path::PathBuf;

use passthru::DeviceConfig;
use remain::sorted;
use thiserror::Error;

#[sorted]
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to open config file {0}: {1}")]
    Open(PathBuf, io::Error),
    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, serde_json::Error),
}

/// Reads a [`DeviceConfig`] from a JSON file.
pub fn load_device_config(path: &Path) -> Result<DeviceConfig, ConfigError> {
    let file = File::open(path).map_err(|e| ConfigError::Open(path.to_path_buf(), e))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use passthru::InterfaceType;

    use super::*;

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"interface": "ata", "force-16-byte-sat": true}"#)
            .unwrap();
        let config = load_device_config(file.path()).unwrap();
        assert_eq!(config.interface, InterfaceType::Ata);
        assert!(config.force_16_byte_sat);
        assert_eq!(config.timeout_secs, 15);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"interface": "ata", "queue-depth": 32}"#)
            .unwrap();
        assert!(matches!(
            load_device_config(file.path()),
            Err(ConfigError::Parse(..))
        ));
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_device_config(&dir.path().join("absent.json")),
            Err(ConfigError::Open(..))
        ));
    }
}
