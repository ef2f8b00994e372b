//! Write API port
//!
//! Commands that mutate stored state. Each one is awaited only to observe
//! its own success or failure; nothing here retries.

use async_trait::async_trait;
use plenum_domain::{ClosedAs, MeetingId, OptionId, ProposalId, SessionId, Viewer, VoteId};
use serde::Serialize;
use thiserror::Error;

/// Failure of a single write command.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CommandError {
    #[error("Command rejected: {0}")]
    Rejected(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Write side of the store.
#[async_trait]
pub trait CommandGateway: Send + Sync {
    /// Cast a vote. Returns the id of the created vote document, which the
    /// caller keeps as a receipt on PRIVATE sessions.
    async fn cast_vote(
        &self,
        meeting_id: &MeetingId,
        session_id: &SessionId,
        option_id: &OptionId,
        voter: &Viewer,
    ) -> Result<VoteId, CommandError>;

    /// Close a proposal as accepted or rejected.
    async fn close_proposal(
        &self,
        meeting_id: &MeetingId,
        proposal_id: &ProposalId,
        closed_as: ClosedAs,
    ) -> Result<(), CommandError>;

    /// Close a voting session.
    async fn close_voting_session(
        &self,
        meeting_id: &MeetingId,
        session_id: &SessionId,
        closed_by: &Viewer,
    ) -> Result<(), CommandError>;
}
