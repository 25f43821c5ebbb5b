use std::fs;
use std::path::Path;

use seq_core::SequenceError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "config.json";

fn default_test_directory() -> String {
    "tests".to_string()
}

/// Tool configuration persisted next to the runner. Missing keys fall back
/// to defaults on load, so hand-edited or older files keep working.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    #[serde(default = "default_test_directory")]
    pub test_directory: String,
    #[serde(default)]
    pub last_sequence_file: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            test_directory: default_test_directory(),
            last_sequence_file: String::new(),
        }
    }
}

impl ToolConfig {
    pub fn load(path: &Path) -> Result<Self, SequenceError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path).map_err(|error| {
            SequenceError::new(
                "CONFIG_READ",
                format!("Failed to read {}: {}", path.display(), error),
            )
        })?;
        serde_json::from_str(&raw).map_err(|error| {
            SequenceError::new(
                "CONFIG_INVALID",
                format!("Invalid config {}: {}", path.display(), error),
            )
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), SequenceError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|error| {
                SequenceError::new(
                    "CONFIG_WRITE",
                    format!("Failed to create {}: {}", parent.display(), error),
                )
            })?;
        }
        let payload = serde_json::to_string_pretty(self).map_err(|error| {
            SequenceError::new("CONFIG_WRITE", format!("Failed to serialize config: {}", error))
        })?;
        fs::write(path, payload).map_err(|error| {
            SequenceError::new(
                "CONFIG_WRITE",
                format!("Failed to write {}: {}", path.display(), error),
            )
        })
    }
}
