//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.

use plenum_domain::{MeetingId, Viewer};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Configuration validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("viewer.uid cannot be empty")]
    EmptyViewerUid,

    #[error("meeting.default cannot be blank")]
    BlankMeeting,
}

/// Identity the live view is computed for (`[viewer]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileViewerConfig {
    pub uid: String,
    /// Display name recorded on voter records. Falls back to the uid.
    pub name: Option<String>,
}

impl Default for FileViewerConfig {
    fn default() -> Self {
        Self {
            uid: "anonymous".to_string(),
            name: None,
        }
    }
}

impl FileViewerConfig {
    pub fn to_viewer(&self) -> Viewer {
        let name = self.name.clone().unwrap_or_else(|| self.uid.clone());
        Viewer::new(self.uid.as_str(), name)
    }
}

/// Local receipt storage (`[receipts]`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileReceiptsConfig {
    /// Receipt file. Defaults to `<data dir>/plenum/receipts.json`.
    pub path: Option<PathBuf>,
    /// Keep receipts in memory only.
    pub ephemeral: bool,
}

impl FileReceiptsConfig {
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path
            .clone()
            .or_else(|| dirs::data_dir().map(|d| d.join("plenum").join("receipts.json")))
    }
}

/// Log destinations (`[logging]`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    /// JSONL audit log of issued commands and resolved outcomes
    pub audit_log: Option<PathBuf>,
    /// Diagnostic log file, in addition to stderr
    pub file: Option<PathBuf>,
}

/// Meeting selection (`[meeting]`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileMeetingConfig {
    /// Meeting code used when none is given on the command line
    pub default: Option<String>,
}

impl FileMeetingConfig {
    pub fn meeting_id(&self) -> Option<MeetingId> {
        self.default.as_deref().map(MeetingId::from)
    }
}

/// Raw output configuration from TOML (`[output]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOutputConfig {
    /// Enable colored terminal output
    pub color: bool,
}

impl Default for FileOutputConfig {
    fn default() -> Self {
        Self { color: true }
    }
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub viewer: FileViewerConfig,
    pub receipts: FileReceiptsConfig,
    pub logging: FileLoggingConfig,
    pub meeting: FileMeetingConfig,
    pub output: FileOutputConfig,
}

impl FileConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.viewer.uid.trim().is_empty() {
            return Err(ConfigValidationError::EmptyViewerUid);
        }

        if let Some(meeting) = &self.meeting.default
            && meeting.trim().is_empty()
        {
            return Err(ConfigValidationError::BlankMeeting);
        }

        Ok(())
    }
}
