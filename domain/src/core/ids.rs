//! Identifier value objects.
//!
//! Every document the engine touches is addressed by an opaque string id.
//! Wrapping each kind in its own newtype keeps a session id from being passed
//! where a proposal id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Meeting code; scopes every session, vote and proposal.
    MeetingId
);
string_id!(
    /// Voting session document id.
    SessionId
);
string_id!(
    /// Proposal document id.
    ProposalId
);
string_id!(
    /// Id of a vote option within a session.
    OptionId
);
string_id!(
    /// Vote document id. Also the opaque value stored in a receipt.
    VoteId
);
string_id!(
    /// Authenticated user id of a participant.
    VoterUid
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_as_str() {
        let id = SessionId::new("s-1");
        assert_eq!(id.as_str(), "s-1");
        assert_eq!(id.to_string(), "s-1");
    }

    #[test]
    fn test_serializes_transparently() {
        let id = ProposalId::from("p-7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"p-7\"");
        let back: ProposalId = serde_json::from_str("\"p-7\"").unwrap();
        assert_eq!(back, id);
    }
}
