use crate::error::{FlavpError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_STORAGE_KEY: &str = "flavp_web_state_v1";
pub const DEFAULT_EXPORT_FILE_NAME: &str = "flavp-data.json";

/// Where and under which names the application state is kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct FlavpConfig {
    #[schemars(description = "Key the state document is stored under")]
    pub storage_key: String,

    #[schemars(description = "Directory used by the file-backed store")]
    pub data_dir: PathBuf,

    #[schemars(description = "Suggested file name for JSON exports")]
    pub export_file_name: String,
}

impl Default for FlavpConfig {
    fn default() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            data_dir: PathBuf::from("."),
            export_file_name: DEFAULT_EXPORT_FILE_NAME.to_string(),
        }
    }
}

impl FlavpConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    pub fn from_json_str(data: &str) -> Result<Self> {
        let config: FlavpConfig = serde_json::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage_key.trim().is_empty() {
            return Err(FlavpError::InvalidConfig(
                "storage_key must not be empty".to_string(),
            ));
        }
        if self.export_file_name.trim().is_empty() {
            return Err(FlavpError::InvalidConfig(
                "export_file_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Full path an export would be written to inside the data directory.
    pub fn export_path(&self) -> PathBuf {
        self.data_dir.join(&self.export_file_name)
    }
}
