//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod audit_logger;
pub mod command_gateway;
pub mod document_store;
pub mod receipt_store;
