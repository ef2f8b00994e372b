//! Voting session entity and its vote options.

use crate::core::error::DomainError;
use crate::core::ids::{OptionId, ProposalId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the options of a session are shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VotingSessionType {
    /// Pick one proposal among several (optionally with a blank option).
    #[serde(rename = "ONE-OF-PROPOSALS")]
    OneOfProposals,
    /// Vote for, against or abstain on exactly one proposal.
    #[serde(rename = "FOR-AGAINST-ABSTAIN")]
    ForAgainstAbstain,
}

impl fmt::Display for VotingSessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VotingSessionType::OneOfProposals => write!(f, "ONE-OF-PROPOSALS"),
            VotingSessionType::ForAgainstAbstain => write!(f, "FOR-AGAINST-ABSTAIN"),
        }
    }
}

impl std::str::FromStr for VotingSessionType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ONE-OF-PROPOSALS" => Ok(VotingSessionType::OneOfProposals),
            "FOR-AGAINST-ABSTAIN" => Ok(VotingSessionType::ForAgainstAbstain),
            _ => Err(DomainError::InvalidSessionType(s.to_string())),
        }
    }
}

/// Whether the link between a voter and their choice is ever exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VotePublicity {
    Public,
    Private,
}

impl VotePublicity {
    pub fn is_private(&self) -> bool {
        matches!(self, VotePublicity::Private)
    }
}

impl fmt::Display for VotePublicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VotePublicity::Public => write!(f, "PUBLIC"),
            VotePublicity::Private => write!(f, "PRIVATE"),
        }
    }
}

impl std::str::FromStr for VotePublicity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PUBLIC" => Ok(VotePublicity::Public),
            "PRIVATE" => Ok(VotePublicity::Private),
            _ => Err(DomainError::InvalidPublicity(s.to_string())),
        }
    }
}

/// Choice on a FOR-AGAINST-ABSTAIN option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ForAgainstAbstain {
    For,
    Against,
    Abstain,
}

impl fmt::Display for ForAgainstAbstain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForAgainstAbstain::For => write!(f, "FOR"),
            ForAgainstAbstain::Against => write!(f, "AGAINST"),
            ForAgainstAbstain::Abstain => write!(f, "ABSTAIN"),
        }
    }
}

impl std::str::FromStr for ForAgainstAbstain {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FOR" => Ok(ForAgainstAbstain::For),
            "AGAINST" => Ok(ForAgainstAbstain::Against),
            "ABSTAIN" => Ok(ForAgainstAbstain::Abstain),
            _ => Err(DomainError::InvalidForAgainstAbstain(s.to_string())),
        }
    }
}

/// A vote option as stored on the session. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VoteOption {
    #[serde(rename = "PROPOSAL")]
    Proposal {
        #[serde(rename = "proposalId")]
        proposal_id: ProposalId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    #[serde(rename = "FORAGAINSTABSTAIN")]
    ForAgainstAbstain {
        vote: ForAgainstAbstain,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
}

impl VoteOption {
    pub fn proposal(proposal_id: impl Into<ProposalId>) -> Self {
        VoteOption::Proposal {
            proposal_id: proposal_id.into(),
            label: None,
        }
    }

    pub fn for_against_abstain(vote: ForAgainstAbstain) -> Self {
        VoteOption::ForAgainstAbstain { vote, label: None }
    }

    /// The referenced proposal, for PROPOSAL-typed options.
    pub fn proposal_id(&self) -> Option<&ProposalId> {
        match self {
            VoteOption::Proposal { proposal_id, .. } => Some(proposal_id),
            VoteOption::ForAgainstAbstain { .. } => None,
        }
    }

    pub fn label(&self) -> Option<&str> {
        match self {
            VoteOption::Proposal { label, .. } | VoteOption::ForAgainstAbstain { label, .. } => {
                label.as_deref()
            }
        }
    }
}

/// A vote option entry keyed by its option id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredVoteOption {
    pub id: OptionId,
    #[serde(flatten)]
    pub option: VoteOption,
}

impl StoredVoteOption {
    pub fn new(id: impl Into<OptionId>, option: VoteOption) -> Self {
        Self {
            id: id.into(),
            option,
        }
    }
}

/// A bounded decision event within a meeting.
///
/// `open` moves from `true` to `false` exactly once, through the close
/// command. Options never change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotingSession {
    pub id: SessionId,
    pub label: String,
    #[serde(rename = "type")]
    pub session_type: VotingSessionType,
    pub open: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_by: Option<String>,
    pub vote_publicity: VotePublicity,
    #[serde(default)]
    pub options: Vec<StoredVoteOption>,
    /// Denormalized ids of every proposal the options reference.
    #[serde(default)]
    pub proposal_ids: Vec<ProposalId>,
}

impl VotingSession {
    /// Create an open session with no options.
    pub fn new(
        id: impl Into<SessionId>,
        label: impl Into<String>,
        session_type: VotingSessionType,
        vote_publicity: VotePublicity,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            session_type,
            open: true,
            created_at,
            closed_at: None,
            closed_by: None,
            vote_publicity,
            options: Vec::new(),
            proposal_ids: Vec::new(),
        }
    }

    /// Append an option, keeping `proposal_ids` in sync.
    pub fn with_option(mut self, id: impl Into<OptionId>, option: VoteOption) -> Self {
        if let Some(proposal_id) = option.proposal_id()
            && !self.proposal_ids.contains(proposal_id)
        {
            self.proposal_ids.push(proposal_id.clone());
        }
        self.options.push(StoredVoteOption::new(id, option));
        self
    }

    /// Mark the session closed.
    pub fn close(&mut self, closed_by: Option<String>, closed_at: DateTime<Utc>) {
        self.open = false;
        self.closed_at = Some(closed_at);
        self.closed_by = closed_by;
    }

    pub fn option(&self, id: &OptionId) -> Option<&StoredVoteOption> {
        self.options.iter().find(|o| &o.id == id)
    }

    /// `(option id, proposal id)` for every PROPOSAL-typed option.
    pub fn proposal_options(&self) -> impl Iterator<Item = (&OptionId, &ProposalId)> {
        self.options
            .iter()
            .filter_map(|o| o.option.proposal_id().map(|p| (&o.id, p)))
    }

    /// Option id carrying the given FOR/AGAINST/ABSTAIN choice, if any.
    pub fn for_against_abstain_option(&self, choice: ForAgainstAbstain) -> Option<&OptionId> {
        self.options.iter().find_map(|o| match &o.option {
            VoteOption::ForAgainstAbstain { vote, .. } if *vote == choice => Some(&o.id),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_session_round_trips_store_format() {
        let json = serde_json::json!({
            "id": "s1",
            "label": "Budget",
            "type": "FOR-AGAINST-ABSTAIN",
            "open": true,
            "createdAt": "2023-11-14T22:13:20Z",
            "votePublicity": "PRIVATE",
            "options": [
                { "id": "o1", "type": "PROPOSAL", "proposalId": "p1" },
                { "id": "o2", "type": "FORAGAINSTABSTAIN", "vote": "FOR", "label": "Yes" }
            ],
            "proposalIds": ["p1"]
        });

        let session: VotingSession = serde_json::from_value(json).unwrap();
        assert_eq!(session.session_type, VotingSessionType::ForAgainstAbstain);
        assert_eq!(session.vote_publicity, VotePublicity::Private);
        assert_eq!(session.created_at, ts());
        assert_eq!(session.options.len(), 2);
        assert_eq!(
            session.options[1].option,
            VoteOption::ForAgainstAbstain {
                vote: ForAgainstAbstain::For,
                label: Some("Yes".to_string())
            }
        );
    }

    #[test]
    fn test_with_option_tracks_proposal_ids() {
        let session = VotingSession::new(
            "s1",
            "Pick one",
            VotingSessionType::OneOfProposals,
            VotePublicity::Public,
            ts(),
        )
        .with_option("o1", VoteOption::proposal("p1"))
        .with_option("o2", VoteOption::proposal("p2"))
        .with_option("o3", VoteOption::proposal("p1"))
        .with_option("blank", VoteOption::for_against_abstain(ForAgainstAbstain::Abstain));

        assert_eq!(
            session.proposal_ids,
            vec![ProposalId::from("p1"), ProposalId::from("p2")]
        );
        assert_eq!(session.proposal_options().count(), 3);
        assert_eq!(
            session.for_against_abstain_option(ForAgainstAbstain::Abstain),
            Some(&OptionId::from("blank"))
        );
        assert!(session.for_against_abstain_option(ForAgainstAbstain::For).is_none());
    }

    #[test]
    fn test_close_sets_metadata() {
        let mut session = VotingSession::new(
            "s1",
            "x",
            VotingSessionType::OneOfProposals,
            VotePublicity::Public,
            ts(),
        );
        session.close(Some("admin".to_string()), ts());
        assert!(!session.open);
        assert_eq!(session.closed_by.as_deref(), Some("admin"));
        assert_eq!(session.closed_at, Some(ts()));
    }

    #[test]
    fn test_enum_from_str() {
        assert_eq!(
            "one-of-proposals".parse::<VotingSessionType>().ok(),
            Some(VotingSessionType::OneOfProposals)
        );
        assert_eq!(
            "private".parse::<VotePublicity>().ok(),
            Some(VotePublicity::Private)
        );
        assert_eq!(
            "Against".parse::<ForAgainstAbstain>().ok(),
            Some(ForAgainstAbstain::Against)
        );
        assert!("maybe".parse::<ForAgainstAbstain>().is_err());
    }
}
