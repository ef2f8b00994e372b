//! Hydrated per-session view.

use crate::core::ids::{OptionId, SessionId};
use crate::visibility::VisibilityState;
use crate::voting::{
    ForAgainstAbstain, Proposal, Vote, VotePublicity, Voter, VotingSession, VotingSessionType,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A vote option with any proposal reference replaced by the proposal itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HydratedOption {
    pub id: OptionId,
    pub choice: HydratedChoice,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HydratedChoice {
    #[serde(rename = "PROPOSAL")]
    Proposal {
        proposal: Proposal,
        label: Option<String>,
    },
    #[serde(rename = "FORAGAINSTABSTAIN")]
    ForAgainstAbstain {
        vote: ForAgainstAbstain,
        label: Option<String>,
    },
}

impl HydratedOption {
    /// Label to show for this option.
    pub fn display_label(&self) -> String {
        match &self.choice {
            HydratedChoice::Proposal { proposal, label } => label
                .clone()
                .unwrap_or_else(|| proposal.description.clone()),
            HydratedChoice::ForAgainstAbstain { vote, label } => {
                label.clone().unwrap_or_else(|| vote.to_string())
            }
        }
    }
}

/// Everything a viewer may see about one session at this instant.
///
/// `votes` is `None` while bulk votes are not readable (the session is open).
/// On PRIVATE sessions every vote in it is identity-free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionView {
    pub session: VotingSession,
    pub state: VisibilityState,
    pub options: Vec<HydratedOption>,
    pub has_voted: bool,
    pub my_vote_option_id: Option<OptionId>,
    pub votes: Option<Vec<Vote>>,
    pub voters: Vec<Voter>,
    /// Votes per option id. Empty while votes are not readable.
    pub tallies: BTreeMap<OptionId, usize>,
    pub total_votes: usize,
}

impl SessionView {
    pub fn id(&self) -> &SessionId {
        &self.session.id
    }

    pub fn session_type(&self) -> VotingSessionType {
        self.session.session_type
    }

    pub fn publicity(&self) -> VotePublicity {
        self.session.vote_publicity
    }

    pub fn is_open(&self) -> bool {
        self.session.open
    }

    pub fn tally(&self, option_id: &OptionId) -> usize {
        self.tallies.get(option_id).copied().unwrap_or(0)
    }
}
