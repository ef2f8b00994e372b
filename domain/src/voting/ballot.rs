//! Votes, voter records and the viewing participant.

use crate::core::ids::{OptionId, SessionId, VoteId, VoterUid};
use serde::{Deserialize, Serialize};

/// A cast vote. Append-only.
///
/// `voter_uid` and `voter_name` are present only on PUBLIC sessions; a PRIVATE
/// vote record never carries the identity of whoever cast it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: VoteId,
    pub session_id: SessionId,
    pub option_id: OptionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voter_uid: Option<VoterUid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voter_name: Option<String>,
}

impl Vote {
    /// A vote without identity, as stored on PRIVATE sessions.
    pub fn anonymous(
        id: impl Into<VoteId>,
        session_id: impl Into<SessionId>,
        option_id: impl Into<OptionId>,
    ) -> Self {
        Self {
            id: id.into(),
            session_id: session_id.into(),
            option_id: option_id.into(),
            voter_uid: None,
            voter_name: None,
        }
    }

    /// A vote carrying its voter's identity, as stored on PUBLIC sessions.
    pub fn public(
        id: impl Into<VoteId>,
        session_id: impl Into<SessionId>,
        option_id: impl Into<OptionId>,
        voter: &Viewer,
    ) -> Self {
        Self {
            voter_uid: Some(voter.uid.clone()),
            voter_name: Some(voter.name.clone()),
            ..Self::anonymous(id, session_id, option_id)
        }
    }

    /// Copy of this vote with any identity removed.
    pub fn anonymized(&self) -> Self {
        Self {
            voter_uid: None,
            voter_name: None,
            ..self.clone()
        }
    }

    pub fn is_cast_by(&self, uid: &VoterUid) -> bool {
        self.voter_uid.as_ref() == Some(uid)
    }
}

/// Proof of participation in a session, independent of the choice made.
/// Always identity-bearing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voter {
    pub session_id: SessionId,
    pub voter_uid: VoterUid,
    pub voter_name: String,
}

impl Voter {
    pub fn new(session_id: impl Into<SessionId>, voter: &Viewer) -> Self {
        Self {
            session_id: session_id.into(),
            voter_uid: voter.uid.clone(),
            voter_name: voter.name.clone(),
        }
    }
}

/// The participant a live view is computed for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub uid: VoterUid,
    pub name: String,
}

impl Viewer {
    pub fn new(uid: impl Into<VoterUid>, name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
        }
    }
}
