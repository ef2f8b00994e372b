//! Domain error types

use thiserror::Error;

/// Domain-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid session type: {0}")]
    InvalidSessionType(String),

    #[error("Invalid vote publicity: {0}")]
    InvalidPublicity(String),

    #[error("Invalid for/against/abstain value: {0}")]
    InvalidForAgainstAbstain(String),

    #[error("Invalid proposal close state: {0}")]
    InvalidClosedAs(String),
}
