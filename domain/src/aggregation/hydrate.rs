//! Pure recompute of a session view from the current input lists.
//!
//! [`hydrate_session`] is total: any combination of present, missing or
//! duplicated inputs yields a view, and the view depends only on the
//! *contents* of the inputs, never on the order they arrived in.

use super::view::{HydratedChoice, HydratedOption, SessionView};
use crate::core::ids::{OptionId, ProposalId, VoterUid};
use crate::visibility::{OwnVoteSource, VisibilityState};
use crate::voting::{Proposal, Vote, VoteOption, Voter, VotingSession};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// The per-session inputs held by the engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionInputs<'a> {
    /// Bulk votes, when that feed is held.
    pub votes: Option<&'a [Vote]>,
    pub voters: &'a [Voter],
    /// Result of the own-vote feed (live query or receipt lookup).
    pub own_vote: Option<&'a Vote>,
}

/// Build the hydrated view of one session for `viewer`.
pub fn hydrate_session(
    session: &VotingSession,
    inputs: SessionInputs<'_>,
    proposals: &HashMap<ProposalId, Proposal>,
    viewer: &VoterUid,
) -> SessionView {
    let state = VisibilityState::of(session);

    let options = hydrate_options(session, proposals);
    let voters = normalize_voters(session, inputs.voters);
    let has_voted = voters.iter().any(|v| &v.voter_uid == viewer);

    let raw_votes = inputs
        .votes
        .filter(|_| state.votes_readable())
        .map(|votes| normalize_votes(session, votes));

    let my_vote_option_id = match state.own_vote_source() {
        OwnVoteSource::BulkVotes => raw_votes
            .as_ref()
            .and_then(|votes| votes.iter().find(|v| v.is_cast_by(viewer)))
            .map(|v| v.option_id.clone()),
        OwnVoteSource::LiveQuery | OwnVoteSource::Receipt => inputs
            .own_vote
            .filter(|v| v.session_id == session.id)
            .map(|v| v.option_id.clone()),
    };

    let votes = raw_votes.map(|votes| {
        if state.is_private() {
            votes.iter().map(Vote::anonymized).collect()
        } else {
            votes
        }
    });

    let tallies = votes
        .as_deref()
        .map(|votes| tally(session, votes))
        .unwrap_or_default();
    let total_votes = tallies.values().sum();

    SessionView {
        session: session.clone(),
        state,
        options,
        has_voted,
        my_vote_option_id,
        votes,
        voters,
        tallies,
        total_votes,
    }
}

/// Per-option vote counts. Every option id of the session is present.
///
/// Only votes of `session` count, each vote id once; votes naming an unknown
/// option are ignored.
pub fn tally(session: &VotingSession, votes: &[Vote]) -> BTreeMap<OptionId, usize> {
    let mut counts: BTreeMap<OptionId, usize> =
        session.options.iter().map(|o| (o.id.clone(), 0)).collect();
    let mut seen = BTreeSet::new();
    for vote in votes
        .iter()
        .filter(|v| v.session_id == session.id)
        .filter(|v| seen.insert(&v.id))
    {
        if let Some(count) = counts.get_mut(&vote.option_id) {
            *count += 1;
        }
    }
    counts
}

fn hydrate_options(
    session: &VotingSession,
    proposals: &HashMap<ProposalId, Proposal>,
) -> Vec<HydratedOption> {
    session
        .options
        .iter()
        .filter_map(|stored| {
            let choice = match &stored.option {
                VoteOption::Proposal { proposal_id, label } => HydratedChoice::Proposal {
                    // Unloaded or deleted proposal: drop the option.
                    proposal: proposals.get(proposal_id)?.clone(),
                    label: label.clone(),
                },
                VoteOption::ForAgainstAbstain { vote, label } => {
                    HydratedChoice::ForAgainstAbstain {
                        vote: *vote,
                        label: label.clone(),
                    }
                }
            };
            Some(HydratedOption {
                id: stored.id.clone(),
                choice,
            })
        })
        .collect()
}

fn normalize_voters(session: &VotingSession, voters: &[Voter]) -> Vec<Voter> {
    let mut seen = BTreeSet::new();
    let mut out: Vec<Voter> = voters
        .iter()
        .filter(|v| v.session_id == session.id)
        .filter(|v| seen.insert(v.voter_uid.clone()))
        .cloned()
        .collect();
    out.sort_by(|a, b| {
        a.voter_name
            .cmp(&b.voter_name)
            .then_with(|| a.voter_uid.cmp(&b.voter_uid))
    });
    out
}

fn normalize_votes(session: &VotingSession, votes: &[Vote]) -> Vec<Vote> {
    let mut seen = BTreeSet::new();
    let mut out: Vec<Vote> = votes
        .iter()
        .filter(|v| v.session_id == session.id)
        .filter(|v| seen.insert(v.id.clone()))
        .cloned()
        .collect();
    out.sort_by(|a, b| a.id.cmp(&b.id));
    out
}

/// Order sessions newest first; equal timestamps fall back to id.
pub fn sort_sessions(sessions: &mut [VotingSession]) {
    sessions.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}
