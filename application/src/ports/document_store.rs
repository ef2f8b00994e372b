//! Document store port
//!
//! The store is an external collaborator. The engine only needs two things
//! from it: live queries that push ordered snapshots until released, and a
//! one-shot fetch of a single vote document.
//!
//! Every live query delivers into a [`SnapshotSink`] tagged with an
//! engine-allocated [`SubscriptionId`]. All sinks of one engine feed the same
//! inbox, so deliveries from independent queries are processed one at a time
//! but in no guaranteed order.

use async_trait::async_trait;
use plenum_domain::{
    MeetingId, Proposal, ProposalId, SessionId, Vote, VoteId, Voter, VoterUid, VotingSession,
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;

/// Failures reported by the store. Non-fatal to the engine.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StoreError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store error: {0}")]
    Other(String),
}

/// A live query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Query {
    /// Voting sessions of a meeting, newest first.
    Sessions { meeting_id: MeetingId },
    /// All vote records of a session.
    Votes {
        meeting_id: MeetingId,
        session_id: SessionId,
    },
    /// All voter records of a session.
    Voters {
        meeting_id: MeetingId,
        session_id: SessionId,
    },
    /// Vote records of a session cast by one voter.
    OwnVote {
        meeting_id: MeetingId,
        session_id: SessionId,
        voter_uid: VoterUid,
    },
    /// A single proposal document.
    Proposal {
        meeting_id: MeetingId,
        proposal_id: ProposalId,
    },
}

impl Query {
    pub fn meeting_id(&self) -> &MeetingId {
        match self {
            Query::Sessions { meeting_id }
            | Query::Votes { meeting_id, .. }
            | Query::Voters { meeting_id, .. }
            | Query::OwnVote { meeting_id, .. }
            | Query::Proposal { meeting_id, .. } => meeting_id,
        }
    }

    /// Session the query is scoped to, if any.
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Query::Votes { session_id, .. }
            | Query::Voters { session_id, .. }
            | Query::OwnVote { session_id, .. } => Some(session_id),
            Query::Sessions { .. } | Query::Proposal { .. } => None,
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Sessions { meeting_id } => write!(f, "meetings/{meeting_id}/votingSessions"),
            Query::Votes {
                meeting_id,
                session_id,
            } => write!(f, "meetings/{meeting_id}/votingSessions/{session_id}/votes"),
            Query::Voters {
                meeting_id,
                session_id,
            } => write!(f, "meetings/{meeting_id}/votingSessions/{session_id}/voters"),
            Query::OwnVote {
                meeting_id,
                session_id,
                voter_uid,
            } => write!(
                f,
                "meetings/{meeting_id}/votingSessions/{session_id}/votes?voterUid={voter_uid}"
            ),
            Query::Proposal {
                meeting_id,
                proposal_id,
            } => write!(f, "meetings/{meeting_id}/proposals/{proposal_id}"),
        }
    }
}

/// Reference to a single vote document, for one-shot fetches.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VoteRef {
    pub meeting_id: MeetingId,
    pub session_id: SessionId,
    pub vote_id: VoteId,
}

/// The full current result of a live query.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Sessions(Vec<VotingSession>),
    /// Answer to both [`Query::Votes`] and [`Query::OwnVote`].
    Votes(Vec<Vote>),
    Voters(Vec<Voter>),
    /// `None` when the proposal does not exist (or was deleted).
    Proposal(Option<Box<Proposal>>),
}

/// Engine-allocated id of one subscription or one-shot fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Message delivered to the engine inbox.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Snapshot {
        id: SubscriptionId,
        snapshot: Snapshot,
    },
    Error {
        id: SubscriptionId,
        error: StoreError,
    },
    /// Completion of a one-shot vote fetch.
    Fetched {
        id: SubscriptionId,
        result: Result<Option<Vote>, StoreError>,
    },
}

impl StoreEvent {
    pub fn id(&self) -> SubscriptionId {
        match self {
            StoreEvent::Snapshot { id, .. }
            | StoreEvent::Error { id, .. }
            | StoreEvent::Fetched { id, .. } => *id,
        }
    }
}

/// Delivery end of one subscription.
///
/// Snapshots and errors travel as distinct events, so an error on one
/// subscription never ends any other.
#[derive(Debug, Clone)]
pub struct SnapshotSink {
    id: SubscriptionId,
    tx: mpsc::UnboundedSender<StoreEvent>,
}

impl SnapshotSink {
    pub fn new(id: SubscriptionId, tx: mpsc::UnboundedSender<StoreEvent>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Push a snapshot. Returns `false` once the engine has gone away.
    pub fn snapshot(&self, snapshot: Snapshot) -> bool {
        self.tx
            .send(StoreEvent::Snapshot {
                id: self.id,
                snapshot,
            })
            .is_ok()
    }

    /// Push an error. Returns `false` once the engine has gone away.
    pub fn error(&self, error: StoreError) -> bool {
        self.tx.send(StoreEvent::Error { id: self.id, error }).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Owner of a live subscription's resources.
///
/// [`unsubscribe`](Self::unsubscribe) releases them deterministically;
/// dropping the handle does the same.
pub struct SubscriptionHandle {
    id: SubscriptionId,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionHandle {
    pub fn new(id: SubscriptionId, release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            id,
            release: Some(Box::new(release)),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn unsubscribe(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("released", &self.release.is_none())
            .finish()
    }
}

/// Read side of the document store.
///
/// Authorization is the store's concern: it may answer any query with
/// [`StoreError::PermissionDenied`] on the sink's error path.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Start a live query. The store pushes the current result right away
    /// and again after every change, until the handle is released.
    fn subscribe(&self, query: Query, sink: SnapshotSink)
    -> Result<SubscriptionHandle, StoreError>;

    /// Fetch one vote document once.
    async fn get_once(&self, vote: &VoteRef) -> Result<Option<Vote>, StoreError>;
}
