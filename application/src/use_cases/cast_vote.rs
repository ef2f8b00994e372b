//! Cast vote use case.
//!
//! Validates the choice against the session record, issues `castVote`, and
//! on PRIVATE sessions keeps the returned vote id as a device-local receipt.
//! The receipt is the only way this device can later find its own private
//! vote again.

use crate::ports::audit_logger::{AuditEvent, AuditLogger, NoAuditLogger};
use crate::ports::command_gateway::{CommandError, CommandGateway};
use crate::ports::receipt_store::ReceiptStore;
use plenum_domain::{MeetingId, OptionId, ReceiptKey, Viewer, VoteId, VotingSession};
use std::sync::Arc;
use tracing::{info, warn};

/// Input for the [`CastVoteUseCase`].
#[derive(Debug, Clone)]
pub struct CastVoteInput {
    pub meeting_id: MeetingId,
    /// Current record of the session being voted in.
    pub session: VotingSession,
    pub option_id: OptionId,
    pub voter: Viewer,
}

impl CastVoteInput {
    pub fn new(
        meeting_id: impl Into<MeetingId>,
        session: VotingSession,
        option_id: impl Into<OptionId>,
        voter: Viewer,
    ) -> Self {
        Self {
            meeting_id: meeting_id.into(),
            session,
            option_id: option_id.into(),
            voter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastVoteOutput {
    pub vote_id: VoteId,
    /// Whether a receipt was written. Always false on PUBLIC sessions.
    pub receipt_saved: bool,
}

pub struct CastVoteUseCase {
    gateway: Arc<dyn CommandGateway>,
    receipts: Arc<dyn ReceiptStore>,
    audit_logger: Arc<dyn AuditLogger>,
}

impl CastVoteUseCase {
    pub fn new(gateway: Arc<dyn CommandGateway>, receipts: Arc<dyn ReceiptStore>) -> Self {
        Self {
            gateway,
            receipts,
            audit_logger: Arc::new(NoAuditLogger),
        }
    }

    pub fn with_audit_logger(mut self, logger: Arc<dyn AuditLogger>) -> Self {
        self.audit_logger = logger;
        self
    }

    pub async fn execute(&self, input: CastVoteInput) -> Result<CastVoteOutput, CommandError> {
        let session = &input.session;
        if !session.open {
            return Err(CommandError::Rejected(format!(
                "voting session {} is closed",
                session.id
            )));
        }
        if session.option(&input.option_id).is_none() {
            return Err(CommandError::Rejected(format!(
                "option {} does not belong to voting session {}",
                input.option_id, session.id
            )));
        }

        let vote_id = self
            .gateway
            .cast_vote(&input.meeting_id, &session.id, &input.option_id, &input.voter)
            .await?;
        info!("Vote {} cast in session {}", vote_id, session.id);

        let private = session.vote_publicity.is_private();
        let receipt_saved = if private {
            let key = ReceiptKey::new(input.meeting_id.clone(), session.id.clone());
            match self.receipts.put(&key, &vote_id) {
                Ok(()) => true,
                Err(e) => {
                    // The vote is already recorded; only the local pointer is lost.
                    warn!("Could not store receipt for {}: {}", key, e);
                    false
                }
            }
        } else {
            false
        };

        self.audit_logger.log(AuditEvent::new(
            "vote_cast",
            serde_json::json!({
                "meeting_id": input.meeting_id,
                "session_id": session.id,
                "publicity": session.vote_publicity,
                "receipt_saved": receipt_saved,
            }),
        ));

        Ok(CastVoteOutput {
            vote_id,
            receipt_saved,
        })
    }
}
