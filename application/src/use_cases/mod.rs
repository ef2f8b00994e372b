//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod cast_vote;
pub mod close_session;
pub mod resolve_outcome;
pub mod sync_voting;
