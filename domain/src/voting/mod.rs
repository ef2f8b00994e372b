//! Voting data model.
//!
//! - [`session::VotingSession`]: a bounded decision event with options and an open/closed lifecycle
//! - [`session::VoteOption`]: PROPOSAL or FOR/AGAINST/ABSTAIN option, immutable after creation
//! - [`ballot::Vote`] / [`ballot::Voter`]: choice records and participation records
//! - [`proposal::Proposal`]: externally owned proposal snapshot

pub mod ballot;
pub mod proposal;
pub mod session;

pub use ballot::{Viewer, Vote, Voter};
pub use proposal::{ClosedAs, Proposal};
pub use session::{
    ForAgainstAbstain, StoredVoteOption, VoteOption, VotePublicity, VotingSession,
    VotingSessionType,
};
