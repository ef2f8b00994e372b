//! Close voting session use case.

use crate::ports::audit_logger::{AuditEvent, AuditLogger, NoAuditLogger};
use crate::ports::command_gateway::{CommandError, CommandGateway};
use plenum_domain::{MeetingId, Viewer, VotingSession};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseSessionOutput {
    Closed,
    /// The session was already closed; nothing was sent.
    AlreadyClosed,
}

pub struct CloseSessionUseCase {
    gateway: Arc<dyn CommandGateway>,
    audit_logger: Arc<dyn AuditLogger>,
}

impl CloseSessionUseCase {
    pub fn new(gateway: Arc<dyn CommandGateway>) -> Self {
        Self {
            gateway,
            audit_logger: Arc::new(NoAuditLogger),
        }
    }

    pub fn with_audit_logger(mut self, logger: Arc<dyn AuditLogger>) -> Self {
        self.audit_logger = logger;
        self
    }

    pub async fn execute(
        &self,
        meeting_id: &MeetingId,
        session: &VotingSession,
        closed_by: &Viewer,
    ) -> Result<CloseSessionOutput, CommandError> {
        if !session.open {
            debug!("Session {} is already closed", session.id);
            return Ok(CloseSessionOutput::AlreadyClosed);
        }

        self.gateway
            .close_voting_session(meeting_id, &session.id, closed_by)
            .await?;
        info!("Closed voting session {}", session.id);

        self.audit_logger.log(AuditEvent::new(
            "session_closed",
            serde_json::json!({
                "meeting_id": meeting_id,
                "session_id": session.id,
                "closed_by": closed_by.uid,
            }),
        ));

        Ok(CloseSessionOutput::Closed)
    }
}
