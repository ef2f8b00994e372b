//! Configuration file loading for plenum
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `PLENUM_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./plenum.toml` or `./.plenum.toml`
//! 4. Global: `$XDG_CONFIG_HOME/plenum/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    ConfigValidationError, FileConfig, FileLoggingConfig, FileMeetingConfig, FileOutputConfig,
    FileReceiptsConfig, FileViewerConfig,
};
pub use loader::ConfigLoader;
