//! Resolve outcome use case.
//!
//! Turns a closed session's view into an [`Outcome`] and issues the
//! resulting proposal closes. All closes of one batch are sent concurrently
//! and each failure is reported against its proposal; a failed close never
//! cancels the others. A tie or an empty ballot issues nothing.

use crate::ports::audit_logger::{AuditEvent, AuditLogger, NoAuditLogger};
use crate::ports::command_gateway::{CommandError, CommandGateway};
use futures::future::join_all;
use plenum_domain::{
    MeetingId, Outcome, OutcomeError, ProposalClose, SessionId, SessionView, resolve,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// A proposal close the write API refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloseFailure {
    pub close: ProposalClose,
    pub error: CommandError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeReport {
    pub session_id: SessionId,
    pub outcome: Outcome,
    pub applied: Vec<ProposalClose>,
    pub failures: Vec<CloseFailure>,
}

impl OutcomeReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct ResolveOutcomeUseCase {
    gateway: Arc<dyn CommandGateway>,
    audit_logger: Arc<dyn AuditLogger>,
}

impl ResolveOutcomeUseCase {
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

    /// Resolve `view` and apply the result.
    ///
    /// The view must come from a closed session whose bulk votes have been
    /// delivered; otherwise nothing is sent.
    pub async fn execute(
        &self,
        meeting_id: &MeetingId,
        view: &SessionView,
    ) -> Result<OutcomeReport, OutcomeError> {
        if view.is_open() {
            return Err(OutcomeError::SessionStillOpen(view.id().clone()));
        }
        let votes = view
            .votes
            .as_deref()
            .ok_or_else(|| OutcomeError::VotesUnavailable(view.id().clone()))?;

        let outcome = resolve(&view.session, votes)?;
        info!("Session {} resolved: {}", view.id(), outcome);
        self.audit_logger.log(AuditEvent::new(
            "outcome_resolved",
            serde_json::json!({
                "meeting_id": meeting_id,
                "session_id": view.id(),
                "outcome": outcome,
                "total_votes": view.total_votes,
            }),
        ));

        let closes = outcome.closes().to_vec();
        let results = join_all(closes.iter().map(|close| {
            self.gateway
                .close_proposal(meeting_id, &close.proposal_id, close.closed_as)
        }))
        .await;

        let mut applied = Vec::new();
        let mut failures = Vec::new();
        for (close, result) in closes.into_iter().zip(results) {
            match result {
                Ok(()) => {
                    info!("Closed proposal {}", close);
                    self.audit_logger.log(AuditEvent::new(
                        "proposal_closed",
                        serde_json::json!({
                            "meeting_id": meeting_id,
                            "session_id": view.id(),
                            "proposal_id": close.proposal_id,
                            "closed_as": close.closed_as,
                        }),
                    ));
                    applied.push(close);
                }
                Err(error) => {
                    warn!("Failed to close proposal {}: {}", close, error);
                    self.audit_logger.log(AuditEvent::new(
                        "proposal_close_failed",
                        serde_json::json!({
                            "meeting_id": meeting_id,
                            "session_id": view.id(),
                            "proposal_id": close.proposal_id,
                            "closed_as": close.closed_as,
                            "error": error.to_string(),
                        }),
                    ));
                    failures.push(CloseFailure { close, error });
                }
            }
        }

        Ok(OutcomeReport {
            session_id: view.id().clone(),
            outcome,
            applied,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::cast_vote::tests::MockGateway;
    use chrono::DateTime;
    use plenum_domain::{
        ClosedAs, ForAgainstAbstain, Proposal, ProposalId, SessionInputs, Viewer, Vote, VoteOption,
        VotePublicity, VotingSession, VotingSessionType, hydrate_session,
    };
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingLogger {
        events: Mutex<Vec<&'static str>>,
    }

    impl AuditLogger for RecordingLogger {
        fn log(&self, event: AuditEvent) {
            self.events.lock().unwrap().push(event.event_type);
        }
    }

    fn one_of(proposals: &[&str]) -> VotingSession {
        let mut session = VotingSession::new(
            "s1",
            "Pick one",
            VotingSessionType::OneOfProposals,
            VotePublicity::Public,
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        );
        for p in proposals {
            session = session.with_option(format!("o-{p}"), VoteOption::proposal(*p));
        }
        session
    }

    fn fab(target: &str) -> VotingSession {
        VotingSession::new(
            "s1",
            "Motion",
            VotingSessionType::ForAgainstAbstain,
            VotePublicity::Private,
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        )
        .with_option("o-target", VoteOption::proposal(target))
        .with_option("for", VoteOption::for_against_abstain(ForAgainstAbstain::For))
        .with_option(
            "against",
            VoteOption::for_against_abstain(ForAgainstAbstain::Against),
        )
    }

    fn closed_view(mut session: VotingSession, ballots: &[&str]) -> SessionView {
        session.close(None, session.created_at);
        let votes: Vec<Vote> = ballots
            .iter()
            .enumerate()
            .map(|(i, option)| Vote::anonymous(format!("v{i}"), "s1", *option))
            .collect();
        let proposals: HashMap<ProposalId, Proposal> = session
            .proposal_ids
            .iter()
            .map(|id| {
                let p = Proposal::new(id.clone(), "text", "u", "U", session.created_at);
                (id.clone(), p)
            })
            .collect();
        let inputs = SessionInputs {
            votes: Some(&votes),
            ..SessionInputs::default()
        };
        hydrate_session(&session, inputs, &proposals, &"chair".into())
    }

    #[tokio::test]
    async fn test_winner_accepted_others_rejected() {
        let gateway = Arc::new(MockGateway::default());
        let logger = Arc::new(RecordingLogger::default());
        let use_case = ResolveOutcomeUseCase::new(gateway.clone()).with_audit_logger(logger.clone());
        let view = closed_view(one_of(&["p1", "p2", "p3"]), &["o-p2", "o-p2", "o-p1"]);

        let report = use_case.execute(&"m1".into(), &view).await.unwrap();

        assert!(report.outcome.is_decided());
        assert!(report.is_complete());
        assert_eq!(report.applied[0], ProposalClose::accepted("p2"));
        let mut closed = gateway.closed_proposals.lock().unwrap().clone();
        closed.sort();
        assert_eq!(
            closed,
            vec![
                (ProposalId::from("p1"), ClosedAs::Rejected),
                (ProposalId::from("p2"), ClosedAs::Accepted),
                (ProposalId::from("p3"), ClosedAs::Rejected),
            ]
        );
        let events = logger.events.lock().unwrap();
        assert_eq!(events.iter().filter(|e| **e == "proposal_closed").count(), 3);
        assert_eq!(events[0], "outcome_resolved");
    }

    #[tokio::test]
    async fn test_tie_issues_nothing() {
        let gateway = Arc::new(MockGateway::default());
        let use_case = ResolveOutcomeUseCase::new(gateway.clone());
        let view = closed_view(one_of(&["p1", "p2"]), &["o-p1", "o-p2"]);

        let report = use_case.execute(&"m1".into(), &view).await.unwrap();

        assert!(report.outcome.is_tie());
        assert!(report.applied.is_empty());
        assert!(gateway.closed_proposals.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_votes_issues_nothing() {
        let gateway = Arc::new(MockGateway::default());
        let use_case = ResolveOutcomeUseCase::new(gateway.clone());
        let view = closed_view(fab("p1"), &[]);

        let report = use_case.execute(&"m1".into(), &view).await.unwrap();

        assert_eq!(report.outcome, Outcome::NoVotes);
        assert!(gateway.closed_proposals.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_for_against_rejects_target() {
        let gateway = Arc::new(MockGateway::default());
        let use_case = ResolveOutcomeUseCase::new(gateway.clone());
        let view = closed_view(fab("p1"), &["against", "against", "for"]);

        let report = use_case.execute(&"m1".into(), &view).await.unwrap();

        assert_eq!(report.applied, vec![ProposalClose::rejected("p1")]);
    }

    #[tokio::test]
    async fn test_partial_failure_reported_per_proposal() {
        let gateway = Arc::new(MockGateway::failing(&["p3"]));
        let logger = Arc::new(RecordingLogger::default());
        let use_case = ResolveOutcomeUseCase::new(gateway.clone()).with_audit_logger(logger.clone());
        let view = closed_view(one_of(&["p1", "p2", "p3"]), &["o-p1"]);

        let report = use_case.execute(&"m1".into(), &view).await.unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.applied.len(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].close, ProposalClose::rejected("p3"));
        assert!(
            logger
                .events
                .lock()
                .unwrap()
                .contains(&"proposal_close_failed")
        );
    }

    #[tokio::test]
    async fn test_open_session_refused() {
        let gateway = Arc::new(MockGateway::default());
        let use_case = ResolveOutcomeUseCase::new(gateway.clone());
        let session = one_of(&["p1"]);
        let view = hydrate_session(
            &session,
            SessionInputs::default(),
            &HashMap::new(),
            &Viewer::new("chair", "Chair").uid,
        );

        let err = use_case.execute(&"m1".into(), &view).await.unwrap_err();

        assert_eq!(err, OutcomeError::SessionStillOpen("s1".into()));
        assert!(gateway.closed_proposals.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_votes_refused() {
        let use_case = ResolveOutcomeUseCase::new(Arc::new(MockGateway::default()));
        let mut view = closed_view(one_of(&["p1"]), &["o-p1"]);
        view.votes = None;

        let err = use_case.execute(&"m1".into(), &view).await.unwrap_err();

        assert_eq!(err, OutcomeError::VotesUnavailable("s1".into()));
    }
}
