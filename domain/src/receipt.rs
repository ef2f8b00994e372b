//! Private-vote receipts.
//!
//! A receipt maps `(meeting, session)` to the id of the vote document this
//! device cast. It is the only way to find one's own PRIVATE vote, since those
//! records carry no identity. A missing receipt means "not voted from this
//! device"; the voter record stays the authoritative participation signal.

use crate::core::ids::{MeetingId, SessionId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key of a stored receipt.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReceiptKey {
    pub meeting_id: MeetingId,
    pub session_id: SessionId,
}

impl ReceiptKey {
    pub fn new(meeting_id: impl Into<MeetingId>, session_id: impl Into<SessionId>) -> Self {
        Self {
            meeting_id: meeting_id.into(),
            session_id: session_id.into(),
        }
    }

    /// Flat `"<meeting>/<session>"` form used by file-backed stores.
    ///
    /// `%` and `/` inside either id are percent-encoded, so distinct keys
    /// never share a storage key.
    pub fn storage_key(&self) -> String {
        format!(
            "{}/{}",
            escape(self.meeting_id.as_str()),
            escape(self.session_id.as_str())
        )
    }
}

fn escape(component: &str) -> String {
    component.replace('%', "%25").replace('/', "%2F")
}

impl fmt::Display for ReceiptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}
