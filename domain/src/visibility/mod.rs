//! Visibility policy for voting sessions.
//!
//! Every session is in one of four states keyed by `(open, vote_publicity)`.
//! The state decides which live feeds the engine must hold for that session
//! and where the viewer's own choice comes from:
//!
//! ```text
//! ┌───────────────┬───────────┬──────────────────────────┬───────────────────────────┐
//! │ State         │ voters    │ bulk votes               │ own vote                  │
//! ├───────────────┼───────────┼──────────────────────────┼───────────────────────────┤
//! │ OpenPublic    │ live, all │ none                     │ live, filtered to viewer  │
//! │ OpenPrivate   │ live, all │ none                     │ one-shot, via receipt     │
//! │ ClosedPublic  │ live, all │ live, identity-bearing   │ derived from bulk votes   │
//! │ ClosedPrivate │ live, all │ live, identity-stripped  │ one-shot, via receipt     │
//! └───────────────┴───────────┴──────────────────────────┴───────────────────────────┘
//! ```
//!
//! Reconciliation is a set difference between the feeds held and the feeds
//! required, so applying the same state twice is a no-op.

use crate::voting::{VotePublicity, VotingSession};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Visibility state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisibilityState {
    OpenPublic,
    OpenPrivate,
    ClosedPublic,
    ClosedPrivate,
}

impl VisibilityState {
    pub fn new(open: bool, publicity: VotePublicity) -> Self {
        match (open, publicity) {
            (true, VotePublicity::Public) => VisibilityState::OpenPublic,
            (true, VotePublicity::Private) => VisibilityState::OpenPrivate,
            (false, VotePublicity::Public) => VisibilityState::ClosedPublic,
            (false, VotePublicity::Private) => VisibilityState::ClosedPrivate,
        }
    }

    pub fn of(session: &VotingSession) -> Self {
        Self::new(session.open, session.vote_publicity)
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self,
            VisibilityState::OpenPublic | VisibilityState::OpenPrivate
        )
    }

    pub fn is_private(&self) -> bool {
        matches!(
            self,
            VisibilityState::OpenPrivate | VisibilityState::ClosedPrivate
        )
    }

    /// Whether bulk vote records may be read.
    pub fn votes_readable(&self) -> bool {
        !self.is_open()
    }

    /// Where the viewer's own choice is taken from.
    pub fn own_vote_source(&self) -> OwnVoteSource {
        match self {
            VisibilityState::OpenPublic => OwnVoteSource::LiveQuery,
            VisibilityState::ClosedPublic => OwnVoteSource::BulkVotes,
            VisibilityState::OpenPrivate | VisibilityState::ClosedPrivate => {
                OwnVoteSource::Receipt
            }
        }
    }

    /// Feeds the engine must hold while a session is in this state.
    pub fn required_feeds(&self) -> FeedSet {
        let mut feeds = FeedSet::new();
        feeds.insert(Feed::Voters);
        if self.votes_readable() {
            feeds.insert(Feed::Votes);
        }
        match self.own_vote_source() {
            OwnVoteSource::LiveQuery => feeds.insert(Feed::OwnVoteLive),
            OwnVoteSource::Receipt => feeds.insert(Feed::OwnVoteReceipt),
            OwnVoteSource::BulkVotes => false,
        };
        feeds
    }
}

impl fmt::Display for VisibilityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VisibilityState::OpenPublic => write!(f, "OPEN_PUBLIC"),
            VisibilityState::OpenPrivate => write!(f, "OPEN_PRIVATE"),
            VisibilityState::ClosedPublic => write!(f, "CLOSED_PUBLIC"),
            VisibilityState::ClosedPrivate => write!(f, "CLOSED_PRIVATE"),
        }
    }
}

/// Source of the viewer's own choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnVoteSource {
    /// Live query over votes filtered to the viewer's uid.
    LiveQuery,
    /// One-shot fetch of the vote document named by the local receipt.
    Receipt,
    /// Picked out of the bulk votes; needs no feed of its own.
    BulkVotes,
}

/// A per-session sub-subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feed {
    Voters,
    Votes,
    OwnVoteLive,
    OwnVoteReceipt,
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Feed::Voters => write!(f, "voters"),
            Feed::Votes => write!(f, "votes"),
            Feed::OwnVoteLive => write!(f, "own-vote"),
            Feed::OwnVoteReceipt => write!(f, "own-vote-receipt"),
        }
    }
}

pub type FeedSet = BTreeSet<Feed>;

/// Feeds to stop and feeds to start when moving from `held` to `required`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedDiff {
    pub stop: Vec<Feed>,
    pub start: Vec<Feed>,
}

impl FeedDiff {
    pub fn between(held: &FeedSet, required: &FeedSet) -> Self {
        Self {
            stop: held.difference(required).copied().collect(),
            start: required.difference(held).copied().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stop.is_empty() && self.start.is_empty()
    }
}
