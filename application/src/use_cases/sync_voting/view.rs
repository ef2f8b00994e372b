//! Caller-facing view produced by the sync engine.

use crate::ports::document_store::StoreError;
use plenum_domain::{MeetingId, SessionId, SessionView};
use serde::Serialize;
use std::fmt;

/// A non-fatal subscription failure, tagged with the feed it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncError {
    pub feed: String,
    pub error: StoreError,
}

impl SyncError {
    pub fn new(feed: impl Into<String>, error: StoreError) -> Self {
        Self {
            feed: feed.into(),
            error,
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.feed, self.error)
    }
}

/// Consistent merged view of one meeting for one viewer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VotingView {
    pub meeting_id: Option<MeetingId>,
    pub open_sessions: Vec<SessionView>,
    pub closed_sessions: Vec<SessionView>,
    /// Most recent subscription failure, if any.
    pub error: Option<SyncError>,
    /// True until the session directory has answered once.
    pub loading: bool,
}

impl VotingView {
    pub fn sessions(&self) -> impl Iterator<Item = &SessionView> {
        self.open_sessions.iter().chain(self.closed_sessions.iter())
    }

    pub fn session(&self, id: &SessionId) -> Option<&SessionView> {
        self.sessions().find(|s| s.id() == id)
    }
}
