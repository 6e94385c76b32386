use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use shelf_store::StoreOptions;
use shelf_types::{CodecKind, IdKind};

use crate::error::{OdmError, OdmResult};

/// Settings for [`Shelf::open_with_config`](crate::Shelf::open_with_config).
///
/// ```toml
/// path = "data/app.shelf"
/// file_mode = 0o600
/// codec = "json"
/// ids = "uuid-v7"
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShelfConfig {
    /// Data file location. `None` keeps everything in memory.
    pub path: Option<PathBuf>,
    /// Unix permission bits for the data file.
    pub file_mode: u32,
    pub read_only: bool,
    pub create_if_missing: bool,
    pub sync_writes: bool,
    pub codec: CodecKind,
    pub ids: IdKind,
}

impl Default for ShelfConfig {
    fn default() -> Self {
        Self {
            path: None,
            file_mode: 0o600,
            read_only: false,
            create_if_missing: true,
            sync_writes: true,
            codec: CodecKind::default(),
            ids: IdKind::default(),
        }
    }
}

impl ShelfConfig {
    pub fn from_toml_str(text: &str) -> OdmResult<Self> {
        toml::from_str(text).map_err(|e| OdmError::Config(e.to_string()))
    }

    /// Read and parse a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> OdmResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| OdmError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> OdmResult<String> {
        toml::to_string(self).map_err(|e| OdmError::Config(e.to_string()))
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            read_only: self.read_only,
            create_if_missing: self.create_if_missing,
            sync_writes: self.sync_writes,
        }
    }
}
