//! JSON seed data for the in-memory store.
//!
//! ```json
//! {
//!   "meetings": {
//!     "AGM": {
//!       "votingSessions": [ ... ],
//!       "proposals": [ ... ],
//!       "votes": [ ... ],
//!       "voters": [ ... ]
//!     }
//!   }
//! }
//! ```

use plenum_domain::{Proposal, Vote, Voter, VotingSession};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Could not read fixture {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid fixture {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// Documents of one meeting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MeetingFixture {
    pub voting_sessions: Vec<VotingSession>,
    pub proposals: Vec<Proposal>,
    pub votes: Vec<Vote>,
    pub voters: Vec<Voter>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreFixture {
    /// Keyed by meeting code.
    pub meetings: BTreeMap<String, MeetingFixture>,
}

impl StoreFixture {
    pub fn load(path: &Path) -> Result<Self, FixtureError> {
        let content = std::fs::read_to_string(path).map_err(|source| FixtureError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| FixtureError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}
