//! Outcome resolution for closed voting sessions.
//!
//! Resolution is pure: it turns a closed session and its votes into an
//! [`Outcome`] plus the list of proposal closes to issue. Issuing them is the
//! application layer's job.
//!
//! # Rules
//!
//! **FOR-AGAINST-ABSTAIN**: compare FOR against AGAINST (ABSTAIN never
//! counts). Equal counts are a [`Outcome::Tie`]; otherwise the single target
//! proposal is closed as ACCEPTED or REJECTED.
//!
//! **ONE-OF-PROPOSALS**: tally proposal-typed options only. A unique maximum
//! wins and is ACCEPTED, every other proposal of the session is REJECTED.
//! A shared maximum is a [`Outcome::Tie`] and nothing is closed.
//!
//! When no vote counts toward the comparison at all the result is
//! [`Outcome::NoVotes`].

use crate::aggregation::tally;
use crate::core::ids::{OptionId, ProposalId, SessionId};
use crate::voting::{ClosedAs, ForAgainstAbstain, Vote, VotingSession, VotingSessionType};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that prevent resolving a session at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutcomeError {
    #[error("Voting session {0} is still open")]
    SessionStillOpen(SessionId),

    #[error("Votes of session {0} are not available")]
    VotesUnavailable(SessionId),

    #[error("FOR-AGAINST-ABSTAIN session {session} must reference exactly one proposal, found {found}")]
    TargetProposal { session: SessionId, found: usize },
}

/// One `closeProposal` command to issue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProposalClose {
    pub proposal_id: ProposalId,
    pub closed_as: ClosedAs,
}

impl ProposalClose {
    pub fn accepted(proposal_id: impl Into<ProposalId>) -> Self {
        Self {
            proposal_id: proposal_id.into(),
            closed_as: ClosedAs::Accepted,
        }
    }

    pub fn rejected(proposal_id: impl Into<ProposalId>) -> Self {
        Self {
            proposal_id: proposal_id.into(),
            closed_as: ClosedAs::Rejected,
        }
    }
}

impl fmt::Display for ProposalClose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.proposal_id, self.closed_as)
    }
}

/// A decided session: the proposal the vote was about (or the winner) and
/// every close to issue, the decided one first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub proposal_id: ProposalId,
    pub closed_as: ClosedAs,
    pub closes: Vec<ProposalClose>,
}

/// Result of resolving a closed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// A winner (or a FOR/AGAINST verdict) exists; commands must be issued.
    Decided(Decision),
    /// No strict plurality. Needs human disambiguation; nothing is closed.
    Tie(Vec<ProposalId>),
    /// Nothing counted toward the comparison; nothing is closed.
    NoVotes,
}

impl Outcome {
    pub fn is_tie(&self) -> bool {
        matches!(self, Outcome::Tie(_))
    }

    pub fn is_decided(&self) -> bool {
        matches!(self, Outcome::Decided(_))
    }

    /// Commands this outcome requires.
    pub fn closes(&self) -> &[ProposalClose] {
        match self {
            Outcome::Decided(decision) => &decision.closes,
            Outcome::Tie(_) | Outcome::NoVotes => &[],
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Decided(d) => write!(f, "Decided: {} {}", d.proposal_id, d.closed_as),
            Outcome::Tie(ids) => {
                let ids: Vec<_> = ids.iter().map(|id| id.as_str()).collect();
                write!(f, "Tie between {}", ids.join(", "))
            }
            Outcome::NoVotes => write!(f, "No votes"),
        }
    }
}

/// Resolve a closed session from its votes.
pub fn resolve(session: &VotingSession, votes: &[Vote]) -> Result<Outcome, OutcomeError> {
    if session.open {
        return Err(OutcomeError::SessionStillOpen(session.id.clone()));
    }

    match session.session_type {
        VotingSessionType::ForAgainstAbstain => resolve_for_against(session, votes),
        VotingSessionType::OneOfProposals => Ok(resolve_one_of(session, votes)),
    }
}

fn resolve_for_against(session: &VotingSession, votes: &[Vote]) -> Result<Outcome, OutcomeError> {
    let mut targets: Vec<&ProposalId> = Vec::new();
    for (_, proposal_id) in session.proposal_options() {
        if !targets.contains(&proposal_id) {
            targets.push(proposal_id);
        }
    }
    for proposal_id in &session.proposal_ids {
        if !targets.contains(&proposal_id) {
            targets.push(proposal_id);
        }
    }
    let [target] = targets.as_slice() else {
        return Err(OutcomeError::TargetProposal {
            session: session.id.clone(),
            found: targets.len(),
        });
    };

    let counts = tally(session, votes);
    let count_of = |choice| {
        session
            .for_against_abstain_option(choice)
            .and_then(|id| counts.get(id))
            .copied()
            .unwrap_or(0)
    };
    let votes_for = count_of(ForAgainstAbstain::For);
    let votes_against = count_of(ForAgainstAbstain::Against);

    if votes_for == 0 && votes_against == 0 {
        return Ok(Outcome::NoVotes);
    }
    if votes_for == votes_against {
        return Ok(Outcome::Tie(vec![(*target).clone()]));
    }

    let close = if votes_for > votes_against {
        ProposalClose::accepted((*target).clone())
    } else {
        ProposalClose::rejected((*target).clone())
    };
    Ok(Outcome::Decided(Decision {
        proposal_id: close.proposal_id.clone(),
        closed_as: close.closed_as,
        closes: vec![close],
    }))
}

fn resolve_one_of(session: &VotingSession, votes: &[Vote]) -> Outcome {
    let counts = tally(session, votes);

    // Several options may reference the same proposal; their votes add up.
    let mut per_proposal: Vec<(&ProposalId, usize)> = Vec::new();
    for (option_id, proposal_id) in session.proposal_options() {
        let count = counts.get::<OptionId>(option_id).copied().unwrap_or(0);
        match per_proposal.iter_mut().find(|(p, _)| *p == proposal_id) {
            Some((_, total)) => *total += count,
            None => per_proposal.push((proposal_id, count)),
        }
    }

    let max = per_proposal.iter().map(|(_, c)| *c).max().unwrap_or(0);
    if max == 0 {
        return Outcome::NoVotes;
    }

    let leaders: Vec<ProposalId> = per_proposal
        .iter()
        .filter(|(_, c)| *c == max)
        .map(|(p, _)| (*p).clone())
        .collect();
    if leaders.len() != 1 {
        return Outcome::Tie(leaders);
    }
    let winner = &leaders[0];

    let mut closes = vec![ProposalClose::accepted(winner.clone())];
    closes.extend(
        per_proposal
            .iter()
            .filter(|(p, _)| *p != winner)
            .map(|(p, _)| ProposalClose::rejected((*p).clone())),
    );

    Outcome::Decided(Decision {
        proposal_id: winner.clone(),
        closed_as: ClosedAs::Accepted,
        closes,
    })
}
