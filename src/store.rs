//! # Device Store
//!
//! Persists the address of the last robot that connected successfully, so the
//! next launch can reconnect to it first.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{BridgeError, Result};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_device_address: Option<String>,
}

/// Key-value file holding the last connected address
#[derive(Debug)]
pub struct DeviceStore {
    path: PathBuf,
    last_address: Option<String>,
}

impl DeviceStore {
    /// Open the store at `path`
    ///
    /// A missing file means nothing was saved yet. A corrupt file is logged
    /// and treated the same way.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let last_address = match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<StoredState>(&contents) {
                Ok(state) => state.last_device_address,
                Err(e) => {
                    warn!("Ignoring unreadable device store {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                debug!("No device store at {}: {}", path.display(), e);
                None
            }
        };

        Self { path, last_address }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_address(&self) -> Option<&str> {
        self.last_address.as_deref()
    }

    /// Remember `address` and write it to disk
    ///
    /// # Errors
    ///
    /// Returns `Store` if the file cannot be serialized, `Io` if it cannot be
    /// written. The in-memory value is updated either way.
    pub fn save_last_address(&mut self, address: &str) -> Result<()> {
        if self.last_address.as_deref() == Some(address) {
            return Ok(());
        }
        self.last_address = Some(address.to_string());

        let state = StoredState {
            last_device_address: self.last_address.clone(),
        };
        let contents = toml::to_string(&state).map_err(|e| BridgeError::Store(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, contents)?;
        debug!("Saved last device address {} to {}", address, self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_has_no_address() {
        let dir = tempfile::tempdir().unwrap();
        let store = DeviceStore::open(dir.path().join("state.toml"));
        assert_eq!(store.last_address(), None);
    }

    #[test]
    fn test_saved_address_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.toml");

        let mut store = DeviceStore::open(&path);
        store.save_last_address("00:11:22:33:44:55").unwrap();
        assert_eq!(store.last_address(), Some("00:11:22:33:44:55"));

        let reopened = DeviceStore::open(&path);
        assert_eq!(reopened.last_address(), Some("00:11:22:33:44:55"));

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("last_device_address"));
    }

    #[test]
    fn test_overwrite_address() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");

        let mut store = DeviceStore::open(&path);
        store.save_last_address("/dev/rfcomm0").unwrap();
        store.save_last_address("/dev/rfcomm1").unwrap();

        assert_eq!(DeviceStore::open(&path).last_address(), Some("/dev/rfcomm1"));
    }

    #[test]
    fn test_corrupt_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.toml");
        fs::write(&path, "this is = = not toml").unwrap();

        let store = DeviceStore::open(&path);
        assert_eq!(store.last_address(), None);
    }
}
