//! Application layer for plenum
//!
//! This crate contains the live voting sync engine, the command use cases and
//! the port definitions they run against. It depends only on the domain layer.

pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use ports::{
    audit_logger::{AuditEvent, AuditLogger, NoAuditLogger},
    command_gateway::{CommandError, CommandGateway},
    document_store::{
        DocumentStore, Query, Snapshot, SnapshotSink, StoreError, StoreEvent, SubscriptionHandle,
        SubscriptionId, VoteRef,
    },
    receipt_store::{InMemoryReceiptStore, ReceiptError, ReceiptStore},
};
pub use use_cases::cast_vote::{CastVoteInput, CastVoteOutput, CastVoteUseCase};
pub use use_cases::close_session::{CloseSessionOutput, CloseSessionUseCase};
pub use use_cases::resolve_outcome::{CloseFailure, OutcomeReport, ResolveOutcomeUseCase};
pub use use_cases::sync_voting::{
    SyncError, VotingSync, VotingSyncEngine, VotingSyncHandle, VotingView,
};
