//! Core domain concepts shared across all subdomains.
//!
//! - [`ids`]: typed identifiers for meetings, sessions, proposals, options, votes and voters
//! - [`error::DomainError`]: domain-level errors

pub mod error;
pub mod ids;
