//! Domain layer for plenum
//!
//! This crate contains the voting data model and the pure rules of the live
//! deliberation engine. It has no dependencies on infrastructure or
//! presentation concerns.
//!
//! # Core Concepts
//!
//! ## Visibility
//!
//! Every voting session is `OPEN` or `CLOSED` and `PUBLIC` or `PRIVATE`.
//! Those two axes decide which feeds the engine holds for a session and which
//! parts of the vote records a viewer may see (see [`visibility`]).
//!
//! ## Aggregation
//!
//! A session view is recomputed from scratch on every change
//! (see [`aggregation`]), so it depends only on the current inputs and never
//! on the order they arrived in.
//!
//! ## Outcome
//!
//! Closed sessions resolve to `Decided`, `Tie` or `NoVotes`
//! (see [`outcome`]).

pub mod aggregation;
pub mod core;
pub mod outcome;
pub mod receipt;
pub mod visibility;
pub mod voting;

// Re-export commonly used types
pub use aggregation::{
    HydratedChoice, HydratedOption, SessionInputs, SessionView, hydrate_session, sort_sessions,
    tally,
};
pub use crate::core::{
    error::DomainError,
    ids::{MeetingId, OptionId, ProposalId, SessionId, VoteId, VoterUid},
};
pub use outcome::{Decision, Outcome, OutcomeError, ProposalClose, resolve};
pub use receipt::ReceiptKey;
pub use visibility::{Feed, FeedDiff, FeedSet, OwnVoteSource, VisibilityState};
pub use voting::{
    ClosedAs, ForAgainstAbstain, Proposal, StoredVoteOption, Viewer, Vote, VoteOption,
    VotePublicity, Voter, VotingSession, VotingSessionType,
};
