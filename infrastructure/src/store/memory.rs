//! In-process document store.
//!
//! Holds meetings in memory and answers both ports: live queries through
//! [`DocumentStore`] and writes through [`CommandGateway`]. Every write
//! re-evaluates the live queries it can affect and pushes a fresh full
//! snapshot to each of them.
//!
//! The store enforces the read rules a hosted backend would:
//!
//! - bulk votes of an OPEN session are denied,
//! - votes of PRIVATE sessions are stored without identity,
//! - the own-vote query only matches votes carrying the caller's uid.

use super::fixture::StoreFixture;
use async_trait::async_trait;
use chrono::Utc;
use plenum_application::ports::command_gateway::{CommandError, CommandGateway};
use plenum_application::ports::document_store::{
    DocumentStore, Query, Snapshot, SnapshotSink, StoreError, SubscriptionHandle, VoteRef,
};
use plenum_domain::{
    ClosedAs, MeetingId, OptionId, Proposal, ProposalId, SessionId, Viewer, Vote, VoteId, Voter,
    VotingSession, sort_sessions,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Default)]
struct MeetingState {
    sessions: BTreeMap<SessionId, VotingSession>,
    proposals: BTreeMap<ProposalId, Proposal>,
    votes: Vec<Vote>,
    voters: Vec<Voter>,
}

impl MeetingState {
    fn evaluate(&self, query: &Query) -> Result<Snapshot, StoreError> {
        match query {
            Query::Sessions { .. } => {
                let mut sessions: Vec<_> = self.sessions.values().cloned().collect();
                sort_sessions(&mut sessions);
                Ok(Snapshot::Sessions(sessions))
            }
            Query::Votes { session_id, .. } => {
                if self.sessions.get(session_id).is_some_and(|s| s.open) {
                    return Err(StoreError::PermissionDenied(query.to_string()));
                }
                Ok(Snapshot::Votes(self.votes_of(session_id).cloned().collect()))
            }
            Query::Voters { session_id, .. } => Ok(Snapshot::Voters(
                self.voters
                    .iter()
                    .filter(|v| &v.session_id == session_id)
                    .cloned()
                    .collect(),
            )),
            Query::OwnVote {
                session_id,
                voter_uid,
                ..
            } => Ok(Snapshot::Votes(
                self.votes_of(session_id)
                    .filter(|v| v.is_cast_by(voter_uid))
                    .cloned()
                    .collect(),
            )),
            Query::Proposal { proposal_id, .. } => Ok(Snapshot::Proposal(
                self.proposals.get(proposal_id).cloned().map(Box::new),
            )),
        }
    }

    fn votes_of<'a>(&'a self, session_id: &'a SessionId) -> impl Iterator<Item = &'a Vote> {
        self.votes.iter().filter(move |v| &v.session_id == session_id)
    }
}

/// What a write touched, for deciding which live queries to refresh.
#[derive(Debug, Clone)]
enum Change {
    Session(SessionId),
    Proposal(ProposalId),
}

impl Change {
    fn affects(&self, query: &Query) -> bool {
        match (self, query) {
            (Change::Session(_), Query::Sessions { .. }) => true,
            (Change::Session(id), query) => query.session_id() == Some(id),
            (Change::Proposal(id), Query::Proposal { proposal_id, .. }) => proposal_id == id,
            (Change::Proposal(_), _) => false,
        }
    }
}

struct Subscriber {
    query: Query,
    sink: SnapshotSink,
}

#[derive(Default)]
struct Inner {
    meetings: HashMap<MeetingId, MeetingState>,
    subscribers: HashMap<u64, Subscriber>,
    next_key: u64,
}

impl Inner {
    fn notify(&mut self, meeting_id: &MeetingId, change: Change) {
        self.subscribers.retain(|_, s| !s.sink.is_closed());
        let empty = MeetingState::default();
        let meeting = self.meetings.get(meeting_id).unwrap_or(&empty);
        for subscriber in self.subscribers.values() {
            if subscriber.query.meeting_id() == meeting_id && change.affects(&subscriber.query) {
                deliver(meeting, subscriber);
            }
        }
    }
}

fn deliver(meeting: &MeetingState, subscriber: &Subscriber) {
    match meeting.evaluate(&subscriber.query) {
        Ok(snapshot) => subscriber.sink.snapshot(snapshot),
        Err(error) => subscriber.sink.error(error),
    };
}

/// Memory-backed document store and write API.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store seeded with every meeting of `fixture`.
    pub fn from_fixture(fixture: StoreFixture) -> Self {
        let store = Self::new();
        if let Ok(mut inner) = store.inner.lock() {
            for (meeting_id, seed) in fixture.meetings {
                let meeting = inner.meetings.entry(meeting_id.into()).or_default();
                for session in seed.voting_sessions {
                    meeting.sessions.insert(session.id.clone(), session);
                }
                for proposal in seed.proposals {
                    meeting.proposals.insert(proposal.id.clone(), proposal);
                }
                meeting.votes.extend(seed.votes);
                meeting.voters.extend(seed.voters);
            }
        }
        store
    }

    /// Insert or replace a session.
    pub fn put_session(&self, meeting_id: &MeetingId, session: VotingSession) {
        self.write(meeting_id, |meeting| {
            let id = session.id.clone();
            meeting.sessions.insert(id.clone(), session);
            Some(Change::Session(id))
        });
    }

    /// Delete a session together with its votes and voters.
    pub fn remove_session(&self, meeting_id: &MeetingId, session_id: &SessionId) {
        self.write(meeting_id, |meeting| {
            meeting.sessions.remove(session_id)?;
            meeting.votes.retain(|v| &v.session_id != session_id);
            meeting.voters.retain(|v| &v.session_id != session_id);
            Some(Change::Session(session_id.clone()))
        });
    }

    /// Insert or replace a proposal.
    pub fn put_proposal(&self, meeting_id: &MeetingId, proposal: Proposal) {
        self.write(meeting_id, |meeting| {
            let id = proposal.id.clone();
            meeting.proposals.insert(id.clone(), proposal);
            Some(Change::Proposal(id))
        });
    }

    pub fn remove_proposal(&self, meeting_id: &MeetingId, proposal_id: &ProposalId) {
        self.write(meeting_id, |meeting| {
            meeting.proposals.remove(proposal_id)?;
            Some(Change::Proposal(proposal_id.clone()))
        });
    }

    /// Current stored copy of a proposal.
    pub fn proposal(&self, meeting_id: &MeetingId, proposal_id: &ProposalId) -> Option<Proposal> {
        let inner = self.lock().ok()?;
        inner.meetings.get(meeting_id)?.proposals.get(proposal_id).cloned()
    }

    /// Current stored copy of a session.
    pub fn session(&self, meeting_id: &MeetingId, session_id: &SessionId) -> Option<VotingSession> {
        let inner = self.lock().ok()?;
        inner.meetings.get(meeting_id)?.sessions.get(session_id).cloned()
    }

    /// Number of live queries not yet released.
    pub fn subscriber_count(&self) -> usize {
        self.lock()
            .map(|mut inner| {
                inner.subscribers.retain(|_, s| !s.sink.is_closed());
                inner.subscribers.len()
            })
            .unwrap_or(0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }

    /// Apply `f` to one meeting and refresh the queries it affected.
    fn write(&self, meeting_id: &MeetingId, f: impl FnOnce(&mut MeetingState) -> Option<Change>) {
        let Ok(mut inner) = self.lock() else {
            return;
        };
        let meeting = inner.meetings.entry(meeting_id.clone()).or_default();
        if let Some(change) = f(meeting) {
            inner.notify(meeting_id, change);
        }
    }

    fn command<T>(
        &self,
        meeting_id: &MeetingId,
        f: impl FnOnce(&mut MeetingState) -> Result<(T, Option<Change>), CommandError>,
    ) -> Result<T, CommandError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| CommandError::Transport("store lock poisoned".to_string()))?;
        let meeting = inner
            .meetings
            .get_mut(meeting_id)
            .ok_or_else(|| CommandError::NotFound(format!("meeting {meeting_id}")))?;
        let (value, change) = f(meeting)?;
        if let Some(change) = change {
            inner.notify(meeting_id, change);
        }
        Ok(value)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn subscribe(&self, query: Query, sink: SnapshotSink) -> Result<SubscriptionHandle, StoreError> {
        let mut inner = self.lock()?;
        inner.next_key += 1;
        let key = inner.next_key;

        let subscriber = Subscriber {
            query: query.clone(),
            sink: sink.clone(),
        };
        match inner.meetings.get(query.meeting_id()) {
            Some(meeting) => deliver(meeting, &subscriber),
            None => deliver(&MeetingState::default(), &subscriber),
        }
        inner.subscribers.insert(key, subscriber);
        debug!("Live query {} registered as {}", query, key);

        let state = Arc::clone(&self.inner);
        Ok(SubscriptionHandle::new(sink.id(), move || {
            if let Ok(mut inner) = state.lock() {
                inner.subscribers.remove(&key);
            }
        }))
    }

    async fn get_once(&self, vote: &VoteRef) -> Result<Option<Vote>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.meetings.get(&vote.meeting_id).and_then(|meeting| {
            meeting
                .votes_of(&vote.session_id)
                .find(|v| v.id == vote.vote_id)
                .cloned()
        }))
    }
}

#[async_trait]
impl CommandGateway for MemoryDocumentStore {
    async fn cast_vote(
        &self,
        meeting_id: &MeetingId,
        session_id: &SessionId,
        option_id: &OptionId,
        voter: &Viewer,
    ) -> Result<VoteId, CommandError> {
        self.command(meeting_id, |meeting| {
            let session = meeting
                .sessions
                .get(session_id)
                .ok_or_else(|| CommandError::NotFound(format!("voting session {session_id}")))?;
            if !session.open {
                return Err(CommandError::Rejected(format!(
                    "voting session {session_id} is closed"
                )));
            }
            if session.option(option_id).is_none() {
                return Err(CommandError::Rejected(format!(
                    "unknown option {option_id}"
                )));
            }
            if meeting
                .voters
                .iter()
                .any(|v| &v.session_id == session_id && v.voter_uid == voter.uid)
            {
                return Err(CommandError::Rejected(format!(
                    "{} already voted in {session_id}",
                    voter.uid
                )));
            }

            let vote_id = VoteId::from(Uuid::new_v4().to_string());
            let vote = if session.vote_publicity.is_private() {
                Vote::anonymous(vote_id.clone(), session_id.clone(), option_id.clone())
            } else {
                Vote::public(vote_id.clone(), session_id.clone(), option_id.clone(), voter)
            };
            meeting.votes.push(vote);
            meeting.voters.push(Voter::new(session_id.clone(), voter));
            Ok((vote_id, Some(Change::Session(session_id.clone()))))
        })
    }

    async fn close_proposal(
        &self,
        meeting_id: &MeetingId,
        proposal_id: &ProposalId,
        closed_as: ClosedAs,
    ) -> Result<(), CommandError> {
        self.command(meeting_id, |meeting| {
            let proposal = meeting
                .proposals
                .get_mut(proposal_id)
                .ok_or_else(|| CommandError::NotFound(format!("proposal {proposal_id}")))?;
            match proposal.closed_as {
                Some(current) if current == closed_as => Ok(((), None)),
                Some(current) => Err(CommandError::Rejected(format!(
                    "proposal {proposal_id} is already {current}"
                ))),
                None => {
                    proposal.close(closed_as);
                    info!("Proposal {} closed as {}", proposal_id, closed_as);
                    Ok(((), Some(Change::Proposal(proposal_id.clone()))))
                }
            }
        })
    }

    async fn close_voting_session(
        &self,
        meeting_id: &MeetingId,
        session_id: &SessionId,
        closed_by: &Viewer,
    ) -> Result<(), CommandError> {
        self.command(meeting_id, |meeting| {
            let session = meeting
                .sessions
                .get_mut(session_id)
                .ok_or_else(|| CommandError::NotFound(format!("voting session {session_id}")))?;
            if !session.open {
                return Ok(((), None));
            }
            session.close(Some(closed_by.uid.to_string()), Utc::now());
            info!("Voting session {} closed by {}", session_id, closed_by.uid);
            Ok(((), Some(Change::Session(session_id.clone()))))
        })
    }
}
