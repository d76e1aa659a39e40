//! On-disk configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{TrackerError, TrackerResult};
use crate::reconcile::ReconcilerConfig;
use crate::remote::BackendConfig;

/// File name looked up in the data directory
pub const CONFIG_FILE_NAME: &str = "passtrack.json";

/// Contents of `passtrack.json`. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub reconciler: ReconcilerConfig,
    pub backend: BackendConfig,
}

impl TrackerConfig {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> TrackerResult<Self> {
        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&raw)
            .map_err(|e| TrackerError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Load `passtrack.json` from a data directory
    pub fn load_from_dir(data_dir: impl AsRef<Path>) -> TrackerResult<Self> {
        Self::load(data_dir.as_ref().join(CONFIG_FILE_NAME))
    }
}
