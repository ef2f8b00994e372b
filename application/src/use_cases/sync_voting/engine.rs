//! Event-driven runtime around [`VotingSync`].
//!
//! One task owns the sync state. Store deliveries and caller commands arrive
//! on channels and are applied strictly one at a time, so no lock guards the
//! session tables. After each step the recomputed view is published on a
//! `watch` channel when it actually changed.

use super::state::VotingSync;
use super::view::VotingView;
use crate::ports::document_store::{DocumentStore, StoreEvent};
use crate::ports::receipt_store::ReceiptStore;
use plenum_domain::{MeetingId, SessionId, Viewer};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
enum SyncCommand {
    SetMeeting(Option<MeetingId>),
    RefreshOwnVote(SessionId),
}

/// Entry point for running the live sync engine.
pub struct VotingSyncEngine;

impl VotingSyncEngine {
    /// Spawn the engine on the current tokio runtime. No meeting is selected
    /// until [`VotingSyncHandle::set_meeting`] is called.
    pub fn spawn<S, R>(store: Arc<S>, receipts: Arc<R>, viewer: Viewer) -> VotingSyncHandle
    where
        S: DocumentStore + ?Sized + 'static,
        R: ReceiptStore + ?Sized + 'static,
    {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let sync = VotingSync::new(store, receipts, viewer, event_tx);
        let (view_tx, view_rx) = watch::channel(sync.view());
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run(sync, event_rx, command_rx, view_tx, cancel.clone()));

        VotingSyncHandle {
            commands: command_tx,
            view: view_rx,
            cancel,
            task: Some(task),
        }
    }
}

async fn run<S, R>(
    mut sync: VotingSync<S, R>,
    mut events: mpsc::UnboundedReceiver<StoreEvent>,
    mut commands: mpsc::UnboundedReceiver<SyncCommand>,
    view: watch::Sender<VotingView>,
    cancel: CancellationToken,
) where
    S: DocumentStore + ?Sized + 'static,
    R: ReceiptStore + ?Sized + 'static,
{
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            command = commands.recv() => match command {
                Some(SyncCommand::SetMeeting(meeting_id)) => sync.set_meeting(meeting_id),
                Some(SyncCommand::RefreshOwnVote(session_id)) => sync.refresh_own_vote(&session_id),
                None => break,
            },
            Some(event) = events.recv() => sync.handle(event),
        }

        // Coalesce whatever is already queued into a single publication.
        while let Ok(event) = events.try_recv() {
            sync.handle(event);
        }
        publish(&sync, &view);
    }

    sync.release_all();
    debug!("Voting sync engine stopped");
}

fn publish<S, R>(sync: &VotingSync<S, R>, view: &watch::Sender<VotingView>)
where
    S: DocumentStore + ?Sized + 'static,
    R: ReceiptStore + ?Sized + 'static,
{
    let next = sync.view();
    view.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
}

/// Caller side of a running engine. Dropping it stops the engine.
pub struct VotingSyncHandle {
    commands: mpsc::UnboundedSender<SyncCommand>,
    view: watch::Receiver<VotingView>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl VotingSyncHandle {
    /// Receiver of every published view.
    pub fn view(&self) -> watch::Receiver<VotingView> {
        self.view.clone()
    }

    /// Latest published view.
    pub fn current(&self) -> VotingView {
        self.view.borrow().clone()
    }

    /// Change the meeting scope. `None` releases everything.
    pub fn set_meeting(&self, meeting_id: Option<MeetingId>) {
        self.send(SyncCommand::SetMeeting(meeting_id));
    }

    /// Re-read the receipt of a PRIVATE session, e.g. right after this
    /// device cast a vote in it.
    pub fn refresh_own_vote(&self, session_id: SessionId) {
        self.send(SyncCommand::RefreshOwnVote(session_id));
    }

    /// Stop the engine and wait until every subscription is released.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!("Voting sync engine task failed: {}", e);
        }
    }

    fn send(&self, command: SyncCommand) {
        if self.commands.send(command).is_err() {
            warn!("Voting sync engine is no longer running");
        }
    }
}

impl Drop for VotingSyncHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
