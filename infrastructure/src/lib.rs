//! Infrastructure layer for plenum
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer, including configuration file loading.

pub mod config;
pub mod logging;
pub mod receipt;
pub mod store;

// Re-export commonly used types
pub use config::{
    ConfigLoader, ConfigValidationError, FileConfig, FileLoggingConfig, FileMeetingConfig,
    FileOutputConfig, FileReceiptsConfig, FileViewerConfig,
};
pub use logging::JsonlAuditLogger;
pub use receipt::JsonFileReceiptStore;
pub use store::{FixtureError, MeetingFixture, MemoryDocumentStore, StoreFixture};
