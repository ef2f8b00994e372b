//! Proposal snapshot, as hydrated into PROPOSAL-typed vote options.

use crate::core::error::DomainError;
use crate::core::ids::{ProposalId, VoterUid};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal state of a closed proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClosedAs {
    Accepted,
    Rejected,
}

impl fmt::Display for ClosedAs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClosedAs::Accepted => write!(f, "ACCEPTED"),
            ClosedAs::Rejected => write!(f, "REJECTED"),
        }
    }
}

impl std::str::FromStr for ClosedAs {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ACCEPTED" => Ok(ClosedAs::Accepted),
            "REJECTED" => Ok(ClosedAs::Rejected),
            _ => Err(DomainError::InvalidClosedAs(s.to_string())),
        }
    }
}

/// A proposal owned outside this engine. Read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    pub id: ProposalId,
    pub description: String,
    pub proposer_uid: VoterUid,
    pub proposer_name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub supporter_uids: Vec<VoterUid>,
    #[serde(default)]
    pub supporter_names: Vec<String>,
    pub open: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_as: Option<ClosedAs>,
    /// The proposal this one amends, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_proposal: Option<ProposalId>,
}

impl Proposal {
    pub fn new(
        id: impl Into<ProposalId>,
        description: impl Into<String>,
        proposer_uid: impl Into<VoterUid>,
        proposer_name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            proposer_uid: proposer_uid.into(),
            proposer_name: proposer_name.into(),
            created_at,
            supporter_uids: Vec::new(),
            supporter_names: Vec::new(),
            open: true,
            closed_as: None,
            base_proposal: None,
        }
    }

    pub fn close(&mut self, closed_as: ClosedAs) {
        self.open = false;
        self.closed_as = Some(closed_as);
    }
}
