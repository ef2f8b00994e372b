//! Subscription manager and aggregator state.
//!
//! [`VotingSync`] owns every live feed of one meeting in an explicit table
//! keyed by session id and proposal id. Each directory snapshot reconciles
//! that table against what the sessions now require:
//!
//! 1. feeds of sessions that left the directory are released,
//! 2. feeds no longer required by a session's visibility state are released,
//! 3. proposal feeds no session references anymore are released,
//! 4. only then are missing feeds started.
//!
//! Feeds that are still required are left untouched, so reconciling the same
//! directory twice does nothing. A receipt feed that found no receipt is the
//! exception: it looks again once the viewer shows up among the voters or the
//! session changes visibility state.
//!
//! The view is never patched. [`VotingSync::view`] recomputes it from the
//! cached lists every time.

use super::view::{SyncError, VotingView};
use crate::ports::document_store::{
    DocumentStore, Query, Snapshot, SnapshotSink, StoreError, StoreEvent, SubscriptionHandle,
    SubscriptionId, VoteRef,
};
use crate::ports::receipt_store::ReceiptStore;
use plenum_domain::{
    Feed, FeedDiff, FeedSet, MeetingId, Proposal, ProposalId, ReceiptKey, SessionId,
    SessionInputs, Viewer, VisibilityState, Vote, Voter, VotingSession, hydrate_session,
    sort_sessions,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What keeps a feed alive.
enum FeedSource {
    Live(SubscriptionHandle),
    Fetch(JoinHandle<()>),
    /// Receipt feed with no receipt: nothing to fetch.
    Idle,
}

struct ActiveFeed {
    id: SubscriptionId,
    source: FeedSource,
}

impl ActiveFeed {
    fn release(self) {
        match self.source {
            FeedSource::Live(handle) => handle.unsubscribe(),
            FeedSource::Fetch(task) => task.abort(),
            FeedSource::Idle => {}
        }
    }
}

/// Where deliveries for a subscription id go.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Route {
    Directory,
    Session { session_id: SessionId, feed: Feed },
    Proposal(ProposalId),
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Directory => write!(f, "session directory"),
            Route::Session { session_id, feed } => write!(f, "{feed} of session {session_id}"),
            Route::Proposal(id) => write!(f, "proposal {id}"),
        }
    }
}

#[derive(Default)]
struct SessionEntry {
    feeds: BTreeMap<Feed, ActiveFeed>,
    votes: Option<Vec<Vote>>,
    voters: Vec<Voter>,
    own_vote: Option<Vote>,
}

impl SessionEntry {
    fn held(&self) -> FeedSet {
        self.feeds.keys().copied().collect()
    }

    fn clear(&mut self, feed: Feed) {
        match feed {
            Feed::Voters => self.voters.clear(),
            Feed::Votes => self.votes = None,
            Feed::OwnVoteLive | Feed::OwnVoteReceipt => self.own_vote = None,
        }
    }

    fn inputs(&self) -> SessionInputs<'_> {
        SessionInputs {
            votes: self.votes.as_deref(),
            voters: &self.voters,
            own_vote: self.own_vote.as_ref(),
        }
    }
}

/// Live sync state for one viewer.
pub struct VotingSync<S, R>
where
    S: DocumentStore + ?Sized + 'static,
    R: ReceiptStore + ?Sized + 'static,
{
    store: Arc<S>,
    receipts: Arc<R>,
    viewer: Viewer,
    inbox: mpsc::UnboundedSender<StoreEvent>,
    next_id: u64,
    meeting_id: Option<MeetingId>,
    directory: Option<ActiveFeed>,
    loaded: bool,
    sessions: Vec<VotingSession>,
    entries: HashMap<SessionId, SessionEntry>,
    proposal_feeds: HashMap<ProposalId, ActiveFeed>,
    proposals: HashMap<ProposalId, Proposal>,
    routes: HashMap<SubscriptionId, Route>,
    /// Latest failure and the route it came from.
    last_error: Option<(Route, SyncError)>,
}

impl<S, R> VotingSync<S, R>
where
    S: DocumentStore + ?Sized + 'static,
    R: ReceiptStore + ?Sized + 'static,
{
    /// Create the state. Every feed it starts delivers into `inbox`.
    pub fn new(
        store: Arc<S>,
        receipts: Arc<R>,
        viewer: Viewer,
        inbox: mpsc::UnboundedSender<StoreEvent>,
    ) -> Self {
        Self {
            store,
            receipts,
            viewer,
            inbox,
            next_id: 0,
            meeting_id: None,
            directory: None,
            loaded: false,
            sessions: Vec::new(),
            entries: HashMap::new(),
            proposal_feeds: HashMap::new(),
            proposals: HashMap::new(),
            routes: HashMap::new(),
            last_error: None,
        }
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn meeting_id(&self) -> Option<&MeetingId> {
        self.meeting_id.as_ref()
    }

    /// Number of feeds currently held, directory included.
    pub fn active_feeds(&self) -> usize {
        self.routes.len()
    }

    /// Switch the meeting scope. Everything held for the previous meeting is
    /// released before the new directory is subscribed.
    pub fn set_meeting(&mut self, meeting_id: Option<MeetingId>) {
        if self.meeting_id == meeting_id {
            return;
        }

        info!(
            "Switching meeting scope from {:?} to {:?}",
            self.meeting_id.as_ref().map(|m| m.as_str()),
            meeting_id.as_ref().map(|m| m.as_str())
        );
        self.release_all();
        self.meeting_id = meeting_id;
        self.loaded = false;
        self.last_error = None;

        let Some(meeting_id) = self.meeting_id.clone() else {
            return;
        };
        let id = self.allocate(Route::Directory);
        match self.subscribe(id, Query::Sessions { meeting_id }) {
            Ok(source) => self.directory = Some(ActiveFeed { id, source }),
            Err(error) => {
                self.routes.remove(&id);
                self.fail(Route::Directory, error);
            }
        }
    }

    /// Release every feed and drop every cached record.
    pub fn release_all(&mut self) {
        if let Some(feed) = self.directory.take() {
            feed.release();
        }
        for (_, entry) in self.entries.drain() {
            for (_, feed) in entry.feeds {
                feed.release();
            }
        }
        for (_, feed) in self.proposal_feeds.drain() {
            feed.release();
        }
        self.routes.clear();
        self.sessions.clear();
        self.proposals.clear();
        self.last_error = None;
    }

    /// Look up the receipt of `session_id` again if its receipt feed has not
    /// found one yet. Call after a private vote was cast from this device.
    pub fn refresh_own_vote(&mut self, session_id: &SessionId) {
        let Some(meeting_id) = self.meeting_id.clone() else {
            return;
        };
        let Some(id) = self
            .entries
            .get(session_id)
            .filter(|entry| entry.own_vote.is_none())
            .and_then(|entry| entry.feeds.get(&Feed::OwnVoteReceipt))
            .filter(|feed| match &feed.source {
                FeedSource::Idle => true,
                FeedSource::Fetch(task) => task.is_finished(),
                FeedSource::Live(_) => false,
            })
            .map(|feed| feed.id)
        else {
            return;
        };

        let source = self.fetch_own_vote(id, &meeting_id, session_id);
        if let Some(feed) = self
            .entries
            .get_mut(session_id)
            .and_then(|entry| entry.feeds.get_mut(&Feed::OwnVoteReceipt))
        {
            feed.source = source;
        }
    }

    /// Apply one delivery from the inbox.
    pub fn handle(&mut self, event: StoreEvent) {
        let id = event.id();
        let Some(route) = self.routes.get(&id).cloned() else {
            debug!("Dropping stale delivery for subscription {}", id);
            return;
        };

        match event {
            StoreEvent::Snapshot { snapshot, .. } => {
                self.clear_error(|failed| failed == &route);
                self.apply_snapshot(route, snapshot);
            }
            StoreEvent::Error { error, .. } => self.fail(route, error),
            StoreEvent::Fetched { result, .. } => match result {
                Ok(vote) => {
                    self.clear_error(|failed| failed == &route);
                    if let Route::Session { session_id, .. } = &route
                        && let Some(entry) = self.entries.get_mut(session_id)
                    {
                        entry.own_vote = vote;
                    }
                }
                Err(error) => self.fail(route, error),
            },
        }
    }

    /// Recompute the full view from the current lists.
    pub fn view(&self) -> VotingView {
        let mut view = VotingView {
            meeting_id: self.meeting_id.clone(),
            open_sessions: Vec::new(),
            closed_sessions: Vec::new(),
            error: self.last_error.as_ref().map(|(_, error)| error.clone()),
            loading: self.meeting_id.is_some() && !self.loaded,
        };

        for session in &self.sessions {
            let inputs = self
                .entries
                .get(&session.id)
                .map(SessionEntry::inputs)
                .unwrap_or_default();
            let hydrated = hydrate_session(session, inputs, &self.proposals, &self.viewer.uid);
            if hydrated.is_open() {
                view.open_sessions.push(hydrated);
            } else {
                view.closed_sessions.push(hydrated);
            }
        }

        view
    }

    fn apply_snapshot(&mut self, route: Route, snapshot: Snapshot) {
        match (route, snapshot) {
            (Route::Directory, Snapshot::Sessions(sessions)) => self.apply_directory(sessions),
            (
                Route::Session {
                    session_id,
                    feed: Feed::Voters,
                },
                Snapshot::Voters(voters),
            ) => {
                let voted = voters.iter().any(|v| v.voter_uid == self.viewer.uid);
                if let Some(entry) = self.entries.get_mut(&session_id) {
                    entry.voters = voters;
                }
                if voted {
                    self.refresh_own_vote(&session_id);
                }
            }
            (
                Route::Session {
                    session_id,
                    feed: Feed::Votes,
                },
                Snapshot::Votes(votes),
            ) => {
                if let Some(entry) = self.entries.get_mut(&session_id) {
                    entry.votes = Some(votes);
                }
            }
            (
                Route::Session {
                    session_id,
                    feed: Feed::OwnVoteLive,
                },
                Snapshot::Votes(mut votes),
            ) => {
                if let Some(entry) = self.entries.get_mut(&session_id) {
                    votes.sort_by(|a, b| a.id.cmp(&b.id));
                    entry.own_vote = votes.into_iter().next();
                }
            }
            (Route::Proposal(proposal_id), Snapshot::Proposal(proposal)) => match proposal {
                Some(proposal) => {
                    self.proposals.insert(proposal_id, *proposal);
                }
                None => {
                    debug!("Proposal {} is missing from the store", proposal_id);
                    self.proposals.remove(&proposal_id);
                }
            },
            (route, _) => warn!("Ignoring snapshot of unexpected kind for {}", route),
        }
    }

    fn apply_directory(&mut self, mut sessions: Vec<VotingSession>) {
        let mut seen = HashSet::new();
        sessions.retain(|s| seen.insert(s.id.clone()));
        sort_sessions(&mut sessions);
        self.loaded = true;

        let Some(meeting_id) = self.meeting_id.clone() else {
            return;
        };
        let previous: HashMap<SessionId, VisibilityState> = self
            .sessions
            .iter()
            .map(|s| (s.id.clone(), VisibilityState::of(s)))
            .collect();

        let listed: HashSet<&SessionId> = sessions.iter().map(|s| &s.id).collect();
        let removed: Vec<SessionId> = self
            .entries
            .keys()
            .filter(|id| !listed.contains(id))
            .cloned()
            .collect();
        for session_id in removed {
            if let Some(entry) = self.entries.remove(&session_id) {
                debug!(
                    "Session {} left the directory, releasing {} feeds",
                    session_id,
                    entry.feeds.len()
                );
                for (_, feed) in entry.feeds {
                    self.routes.remove(&feed.id);
                    feed.release();
                }
            }
            self.clear_error(|failed| {
                matches!(failed, Route::Session { session_id: s, .. } if s == &session_id)
            });
        }

        let mut starts: Vec<(SessionId, Feed)> = Vec::new();
        let mut stopped: Vec<Route> = Vec::new();
        let mut changed: Vec<SessionId> = Vec::new();
        for session in &sessions {
            let state = VisibilityState::of(session);
            if previous.get(&session.id).is_some_and(|before| *before != state) {
                changed.push(session.id.clone());
            }
            let entry = self.entries.entry(session.id.clone()).or_default();
            let diff = FeedDiff::between(&entry.held(), &state.required_feeds());
            for feed in diff.stop {
                if let Some(active) = entry.feeds.remove(&feed) {
                    debug!(
                        "Stopping {} feed of session {} ({})",
                        feed, session.id, state
                    );
                    self.routes.remove(&active.id);
                    active.release();
                }
                entry.clear(feed);
                stopped.push(Route::Session {
                    session_id: session.id.clone(),
                    feed,
                });
            }
            starts.extend(diff.start.into_iter().map(|feed| (session.id.clone(), feed)));
        }
        for route in stopped {
            self.clear_error(|failed| failed == &route);
        }

        // Recomputed from the whole session set on every update: an id stays
        // subscribed while any session references it.
        let needed: BTreeSet<ProposalId> = sessions
            .iter()
            .flat_map(|s| s.proposal_options().map(|(_, p)| p.clone()))
            .collect();
        let unneeded: Vec<ProposalId> = self
            .proposal_feeds
            .keys()
            .filter(|id| !needed.contains(*id))
            .cloned()
            .collect();
        for proposal_id in unneeded {
            if let Some(feed) = self.proposal_feeds.remove(&proposal_id) {
                debug!("Releasing proposal {}", proposal_id);
                self.routes.remove(&feed.id);
                feed.release();
            }
            self.proposals.remove(&proposal_id);
            self.clear_error(|failed| failed == &Route::Proposal(proposal_id.clone()));
        }

        self.sessions = sessions;

        for (session_id, feed) in starts {
            self.start_session_feed(&meeting_id, session_id, feed);
        }
        for proposal_id in needed {
            if !self.proposal_feeds.contains_key(&proposal_id) {
                self.start_proposal_feed(&meeting_id, proposal_id);
            }
        }
        for session_id in changed {
            self.refresh_own_vote(&session_id);
        }
    }

    fn start_session_feed(&mut self, meeting_id: &MeetingId, session_id: SessionId, feed: Feed) {
        let route = Route::Session {
            session_id: session_id.clone(),
            feed,
        };
        let id = self.allocate(route.clone());

        let source = match feed {
            Feed::Voters => self.subscribe(
                id,
                Query::Voters {
                    meeting_id: meeting_id.clone(),
                    session_id: session_id.clone(),
                },
            ),
            Feed::Votes => self.subscribe(
                id,
                Query::Votes {
                    meeting_id: meeting_id.clone(),
                    session_id: session_id.clone(),
                },
            ),
            Feed::OwnVoteLive => self.subscribe(
                id,
                Query::OwnVote {
                    meeting_id: meeting_id.clone(),
                    session_id: session_id.clone(),
                    voter_uid: self.viewer.uid.clone(),
                },
            ),
            Feed::OwnVoteReceipt => Ok(self.fetch_own_vote(id, meeting_id, &session_id)),
        };

        match source {
            Ok(source) => {
                debug!("Started {} feed {} of session {}", feed, id, session_id);
                if let Some(entry) = self.entries.get_mut(&session_id) {
                    entry.feeds.insert(feed, ActiveFeed { id, source });
                }
            }
            Err(error) => {
                self.routes.remove(&id);
                self.fail(route, error);
            }
        }
    }

    fn start_proposal_feed(&mut self, meeting_id: &MeetingId, proposal_id: ProposalId) {
        let route = Route::Proposal(proposal_id.clone());
        let id = self.allocate(route.clone());
        let query = Query::Proposal {
            meeting_id: meeting_id.clone(),
            proposal_id: proposal_id.clone(),
        };
        match self.subscribe(id, query) {
            Ok(source) => {
                debug!("Hydrating proposal {} via {}", proposal_id, id);
                self.proposal_feeds
                    .insert(proposal_id, ActiveFeed { id, source });
            }
            Err(error) => {
                self.routes.remove(&id);
                self.fail(route, error);
            }
        }
    }

    /// Look up the local receipt and, if there is one, fetch the vote it names.
    fn fetch_own_vote(
        &self,
        id: SubscriptionId,
        meeting_id: &MeetingId,
        session_id: &SessionId,
    ) -> FeedSource {
        let key = ReceiptKey::new(meeting_id.clone(), session_id.clone());
        match self.receipts.get(&key) {
            Ok(Some(vote_id)) => {
                let store = Arc::clone(&self.store);
                let inbox = self.inbox.clone();
                let vote = VoteRef {
                    meeting_id: meeting_id.clone(),
                    session_id: session_id.clone(),
                    vote_id,
                };
                FeedSource::Fetch(tokio::spawn(async move {
                    let result = store.get_once(&vote).await;
                    let _ = inbox.send(StoreEvent::Fetched { id, result });
                }))
            }
            Ok(None) => {
                debug!("No receipt for {}", key);
                FeedSource::Idle
            }
            Err(e) => {
                warn!("Could not read receipt {}: {}", key, e);
                FeedSource::Idle
            }
        }
    }

    fn subscribe(&self, id: SubscriptionId, query: Query) -> Result<FeedSource, StoreError> {
        let sink = SnapshotSink::new(id, self.inbox.clone());
        self.store.subscribe(query, sink).map(FeedSource::Live)
    }

    fn allocate(&mut self, route: Route) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.routes.insert(id, route);
        id
    }

    fn fail(&mut self, route: Route, error: StoreError) {
        warn!("Subscription to {} failed: {}", route, error);
        if route == Route::Directory {
            self.loaded = true;
        }
        let error = SyncError::new(route.to_string(), error);
        self.last_error = Some((route, error));
    }

    /// Drop the surfaced error if it came from a route that has since
    /// recovered or been released.
    fn clear_error(&mut self, resolved: impl Fn(&Route) -> bool) {
        if self
            .last_error
            .as_ref()
            .is_some_and(|(route, _)| resolved(route))
        {
            debug!("Clearing recovered sync error");
            self.last_error = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::receipt_store::InMemoryReceiptStore;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use plenum_domain::{
        ForAgainstAbstain, OptionId, VoteId, VoteOption, VotePublicity, VotingSessionType,
    };
    use std::sync::Mutex;

    // === Mock store ===

    #[derive(Default)]
    struct MockInner {
        sinks: HashMap<Query, SnapshotSink>,
        subscribed: Vec<Query>,
        released: Vec<Query>,
        documents: HashMap<VoteId, Vote>,
        denied: HashSet<Query>,
    }

    #[derive(Default)]
    struct MockStore {
        inner: Arc<Mutex<MockInner>>,
    }

    impl MockStore {
        fn emit(&self, query: &Query, snapshot: Snapshot) {
            let sink = self.inner.lock().unwrap().sinks.get(query).cloned();
            sink.expect("query is not subscribed").snapshot(snapshot);
        }

        fn emit_error(&self, query: &Query, error: StoreError) {
            let sink = self.inner.lock().unwrap().sinks.get(query).cloned();
            sink.expect("query is not subscribed").error(error);
        }

        fn sink(&self, query: &Query) -> SnapshotSink {
            self.inner.lock().unwrap().sinks[query].clone()
        }

        fn is_live(&self, query: &Query) -> bool {
            self.inner.lock().unwrap().sinks.contains_key(query)
        }

        fn subscribed(&self, f: impl Fn(&Query) -> bool) -> usize {
            self.inner.lock().unwrap().subscribed.iter().filter(|q| f(q)).count()
        }

        fn released(&self, f: impl Fn(&Query) -> bool) -> usize {
            self.inner.lock().unwrap().released.iter().filter(|q| f(q)).count()
        }
    }

    #[async_trait]
    impl DocumentStore for MockStore {
        fn subscribe(
            &self,
            query: Query,
            sink: SnapshotSink,
        ) -> Result<SubscriptionHandle, StoreError> {
            let mut inner = self.inner.lock().unwrap();
            if inner.denied.contains(&query) {
                return Err(StoreError::PermissionDenied(query.to_string()));
            }
            inner.subscribed.push(query.clone());
            inner.sinks.insert(query.clone(), sink.clone());
            let state = Arc::clone(&self.inner);
            Ok(SubscriptionHandle::new(sink.id(), move || {
                let mut inner = state.lock().unwrap();
                inner.sinks.remove(&query);
                inner.released.push(query);
            }))
        }

        async fn get_once(&self, vote: &VoteRef) -> Result<Option<Vote>, StoreError> {
            Ok(self.inner.lock().unwrap().documents.get(&vote.vote_id).cloned())
        }
    }

    // === Fixtures ===

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn meeting() -> MeetingId {
        MeetingId::from("m1")
    }

    fn ada() -> Viewer {
        Viewer::new("ada", "Ada")
    }

    fn session(id: &str, publicity: VotePublicity, proposals: &[&str], secs: i64) -> VotingSession {
        let mut session = VotingSession::new(
            id,
            id,
            VotingSessionType::OneOfProposals,
            publicity,
            ts(secs),
        );
        for (i, p) in proposals.iter().enumerate() {
            session = session.with_option(format!("{id}-o{i}"), VoteOption::proposal(*p));
        }
        session.with_option(
            format!("{id}-blank"),
            VoteOption::for_against_abstain(ForAgainstAbstain::Abstain),
        )
    }

    fn closed(mut session: VotingSession) -> VotingSession {
        session.close(None, ts(100));
        session
    }

    fn proposal(id: &str) -> Snapshot {
        Snapshot::Proposal(Some(Box::new(Proposal::new(
            id,
            format!("Proposal {id}"),
            "u",
            "U",
            ts(0),
        ))))
    }

    fn sessions_q() -> Query {
        Query::Sessions {
            meeting_id: meeting(),
        }
    }

    fn voters_q(session: &str) -> Query {
        Query::Voters {
            meeting_id: meeting(),
            session_id: session.into(),
        }
    }

    fn votes_q(session: &str) -> Query {
        Query::Votes {
            meeting_id: meeting(),
            session_id: session.into(),
        }
    }

    fn own_q(session: &str) -> Query {
        Query::OwnVote {
            meeting_id: meeting(),
            session_id: session.into(),
            voter_uid: ada().uid,
        }
    }

    fn proposal_q(id: &str) -> Query {
        Query::Proposal {
            meeting_id: meeting(),
            proposal_id: id.into(),
        }
    }

    fn in_session(session: &'static str) -> impl Fn(&Query) -> bool {
        move |q| q.session_id().map(|s| s.as_str()) == Some(session)
    }

    struct Harness {
        sync: VotingSync<MockStore, InMemoryReceiptStore>,
        store: Arc<MockStore>,
        receipts: Arc<InMemoryReceiptStore>,
        inbox: mpsc::UnboundedReceiver<StoreEvent>,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(MockStore::default());
            let receipts = Arc::new(InMemoryReceiptStore::new());
            let (tx, inbox) = mpsc::unbounded_channel();
            let sync = VotingSync::new(store.clone(), receipts.clone(), ada(), tx);
            Self {
                sync,
                store,
                receipts,
                inbox,
            }
        }

        fn joined() -> Self {
            let mut h = Self::new();
            h.sync.set_meeting(Some(meeting()));
            h
        }

        fn pump(&mut self) {
            while let Ok(event) = self.inbox.try_recv() {
                self.sync.handle(event);
            }
        }

        fn directory(&mut self, sessions: Vec<VotingSession>) {
            self.store.emit(&sessions_q(), Snapshot::Sessions(sessions));
            self.pump();
        }

        fn emit(&mut self, query: &Query, snapshot: Snapshot) {
            self.store.emit(query, snapshot);
            self.pump();
        }
    }

    // === Tests ===

    #[test]
    fn test_loading_until_directory_answers() {
        let mut h = Harness::joined();
        assert!(h.sync.view().loading);

        h.directory(vec![
            session("old", VotePublicity::Public, &[], 1),
            closed(session("done", VotePublicity::Public, &[], 5)),
            session("new", VotePublicity::Public, &[], 9),
        ]);

        let view = h.sync.view();
        assert!(!view.loading);
        let open: Vec<_> = view.open_sessions.iter().map(|s| s.id().as_str()).collect();
        assert_eq!(open, vec!["new", "old"]);
        assert_eq!(view.closed_sessions.len(), 1);
    }

    #[test]
    fn test_open_private_never_subscribes_bulk_votes() {
        let mut h = Harness::joined();
        h.directory(vec![session("s1", VotePublicity::Private, &["p1"], 1)]);
        h.directory(vec![session("s1", VotePublicity::Private, &["p1"], 1)]);

        assert_eq!(h.store.subscribed(|q| matches!(q, Query::Votes { .. })), 0);
        assert_eq!(h.store.subscribed(|q| matches!(q, Query::OwnVote { .. })), 0);
        assert!(h.store.is_live(&voters_q("s1")));
    }

    #[test]
    fn test_reconciliation_is_idempotent() {
        let mut h = Harness::joined();
        let sessions = vec![session("s1", VotePublicity::Public, &["p1"], 1)];
        h.directory(sessions.clone());
        let before = h.sync.active_feeds();
        h.directory(sessions);

        assert_eq!(h.sync.active_feeds(), before);
        assert_eq!(h.store.subscribed(in_session("s1")), 2);
        assert_eq!(h.store.subscribed(|q| matches!(q, Query::Proposal { .. })), 1);
        assert_eq!(h.store.released(|_| true), 0);
    }

    #[test]
    fn test_closing_public_session_swaps_own_vote_for_bulk_votes() {
        let mut h = Harness::joined();
        h.directory(vec![session("s1", VotePublicity::Public, &["p1"], 1)]);
        h.emit(&proposal_q("p1"), proposal("p1"));
        h.emit(
            &own_q("s1"),
            Snapshot::Votes(vec![Vote::public("v1", "s1", "s1-o0", &ada())]),
        );

        let view = h.sync.view();
        let s1 = view.session(&"s1".into()).unwrap();
        assert_eq!(s1.my_vote_option_id, Some(OptionId::from("s1-o0")));
        assert!(s1.votes.is_none());

        h.directory(vec![closed(session("s1", VotePublicity::Public, &["p1"], 1))]);
        assert!(!h.store.is_live(&own_q("s1")));
        assert!(h.store.is_live(&votes_q("s1")));
        assert_eq!(h.store.subscribed(|q| *q == voters_q("s1")), 1);

        let bob = Viewer::new("bob", "Bob");
        h.emit(
            &votes_q("s1"),
            Snapshot::Votes(vec![
                Vote::public("v1", "s1", "s1-o0", &ada()),
                Vote::public("v2", "s1", "s1-blank", &bob),
            ]),
        );
        let view = h.sync.view();
        let s1 = view.session(&"s1".into()).unwrap();
        assert_eq!(s1.my_vote_option_id, Some(OptionId::from("s1-o0")));
        assert_eq!(s1.total_votes, 2);
    }

    #[test]
    fn test_removed_session_releases_every_feed() {
        let mut h = Harness::joined();
        h.directory(vec![
            closed(session("gone", VotePublicity::Private, &["p1"], 1)),
            session("kept", VotePublicity::Public, &["p2"], 2),
        ]);
        assert_eq!(h.store.subscribed(in_session("gone")), 2);

        h.directory(vec![session("kept", VotePublicity::Public, &["p2"], 2)]);

        assert_eq!(
            h.store.subscribed(in_session("gone")),
            h.store.released(in_session("gone"))
        );
        assert_eq!(h.store.released(in_session("kept")), 0);
        // p1 is referenced by no remaining session.
        assert!(!h.store.is_live(&proposal_q("p1")));
        assert!(h.store.is_live(&proposal_q("p2")));
        assert!(h.sync.view().session(&"gone".into()).is_none());
    }

    #[test]
    fn test_shared_proposal_subscribed_once_and_kept_while_referenced() {
        let mut h = Harness::joined();
        h.directory(vec![
            session("a", VotePublicity::Public, &["p1", "p2"], 1),
            session("b", VotePublicity::Public, &["p1"], 2),
        ]);
        assert_eq!(h.store.subscribed(|q| *q == proposal_q("p1")), 1);

        h.directory(vec![session("b", VotePublicity::Public, &["p1"], 2)]);
        assert!(h.store.is_live(&proposal_q("p1")));
        assert!(!h.store.is_live(&proposal_q("p2")));
        assert_eq!(h.store.subscribed(|q| *q == proposal_q("p1")), 1);
    }

    #[test]
    fn test_missing_proposal_only_degrades_its_session() {
        let mut h = Harness::joined();
        h.directory(vec![
            session("a", VotePublicity::Public, &["p1", "gone"], 1),
            session("b", VotePublicity::Public, &["p1"], 2),
        ]);
        h.emit(&proposal_q("p1"), proposal("p1"));
        h.emit(&proposal_q("gone"), Snapshot::Proposal(None));

        let view = h.sync.view();
        let a = view.session(&"a".into()).unwrap();
        let b = view.session(&"b".into()).unwrap();
        let a_ids: Vec<_> = a.options.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(a_ids, vec!["a-o0", "a-blank"]);
        assert_eq!(b.options.len(), 2);
        assert!(view.error.is_none());
    }

    #[test]
    fn test_meeting_change_releases_before_subscribing_and_drops_stale() {
        let mut h = Harness::joined();
        h.directory(vec![session("s1", VotePublicity::Public, &["p1"], 1)]);
        let stale = h.store.sink(&voters_q("s1"));
        let live_before = h.store.subscribed(|_| true);

        h.sync.set_meeting(Some(MeetingId::from("m2")));

        assert_eq!(h.store.released(|_| true), live_before);
        assert!(h.sync.view().loading);
        assert_eq!(h.sync.active_feeds(), 1);

        stale.snapshot(Snapshot::Voters(vec![Voter::new("s1", &ada())]));
        h.pump();
        let view = h.sync.view();
        assert!(view.open_sessions.is_empty());
        assert_eq!(view.meeting_id, Some(MeetingId::from("m2")));
    }

    #[test]
    fn test_same_meeting_is_noop() {
        let mut h = Harness::joined();
        h.sync.set_meeting(Some(meeting()));
        assert_eq!(h.store.subscribed(|_| true), 1);
        assert_eq!(h.store.released(|_| true), 0);
    }

    #[test]
    fn test_subscription_error_is_non_fatal() {
        let mut h = Harness::joined();
        h.directory(vec![session("s1", VotePublicity::Public, &[], 1)]);
        h.store
            .emit_error(&voters_q("s1"), StoreError::PermissionDenied("voters".to_string()));
        h.pump();

        h.emit(
            &own_q("s1"),
            Snapshot::Votes(vec![Vote::public("v1", "s1", "s1-blank", &ada())]),
        );

        let view = h.sync.view();
        let error = view.error.as_ref().unwrap();
        assert!(matches!(error.error, StoreError::PermissionDenied(_)));
        assert!(error.feed.contains("voters of session s1"));
        assert_eq!(
            view.session(&"s1".into()).unwrap().my_vote_option_id,
            Some(OptionId::from("s1-blank"))
        );
    }

    #[test]
    fn test_denied_subscribe_is_retried_on_next_directory() {
        let mut h = Harness::joined();
        h.store.inner.lock().unwrap().denied.insert(voters_q("s1"));
        h.directory(vec![session("s1", VotePublicity::Public, &[], 1)]);
        assert!(h.sync.view().error.is_some());
        assert!(!h.store.is_live(&voters_q("s1")));

        h.store.inner.lock().unwrap().denied.clear();
        h.directory(vec![session("s1", VotePublicity::Public, &[], 1)]);
        assert!(h.store.is_live(&voters_q("s1")));
    }

    #[tokio::test]
    async fn test_private_own_vote_found_through_receipt() {
        let mut h = Harness::joined();
        h.receipts
            .put(&ReceiptKey::new("m1", "s1"), &VoteId::from("v9"))
            .unwrap();
        h.store
            .inner
            .lock()
            .unwrap()
            .documents
            .insert("v9".into(), Vote::anonymous("v9", "s1", "s1-o0"));

        h.directory(vec![session("s1", VotePublicity::Private, &["p1"], 1)]);
        let event = h.inbox.recv().await.unwrap();
        h.sync.handle(event);

        let view = h.sync.view();
        assert_eq!(
            view.session(&"s1".into()).unwrap().my_vote_option_id,
            Some(OptionId::from("s1-o0"))
        );
    }

    #[tokio::test]
    async fn test_private_without_receipt_has_no_own_vote_but_has_voted() {
        let mut h = Harness::joined();
        h.directory(vec![session("s1", VotePublicity::Private, &[], 1)]);
        h.emit(&voters_q("s1"), Snapshot::Voters(vec![Voter::new("s1", &ada())]));

        let view = h.sync.view();
        let s1 = view.session(&"s1".into()).unwrap();
        assert!(s1.has_voted);
        assert!(s1.my_vote_option_id.is_none());
    }

    #[test]
    fn test_closed_private_votes_are_identity_free() {
        let mut h = Harness::joined();
        h.directory(vec![closed(session("s1", VotePublicity::Private, &[], 1))]);
        h.emit(
            &votes_q("s1"),
            Snapshot::Votes(vec![
                Vote::public("v1", "s1", "s1-blank", &ada()),
                Vote::anonymous("v2", "s1", "s1-blank"),
            ]),
        );

        let view = h.sync.view();
        let s1 = view.session(&"s1".into()).unwrap();
        let votes = s1.votes.as_ref().unwrap();
        assert!(votes.iter().all(|v| v.voter_uid.is_none() && v.voter_name.is_none()));
        assert_eq!(s1.tally(&"s1-blank".into()), 2);
    }

    #[test]
    fn test_view_independent_of_delivery_order() {
        let sessions = vec![closed(session("s1", VotePublicity::Public, &["p1", "p2"], 1))];
        let bob = Viewer::new("bob", "Bob");
        let votes = Snapshot::Votes(vec![
            Vote::public("v1", "s1", "s1-o0", &ada()),
            Vote::public("v2", "s1", "s1-o1", &bob),
        ]);
        let voters = Snapshot::Voters(vec![Voter::new("s1", &ada()), Voter::new("s1", &bob)]);

        let mut first = Harness::joined();
        first.directory(sessions.clone());
        first.emit(&votes_q("s1"), votes.clone());
        first.emit(&voters_q("s1"), voters.clone());
        first.emit(&proposal_q("p1"), proposal("p1"));
        first.emit(&proposal_q("p2"), proposal("p2"));

        let mut second = Harness::joined();
        second.directory(sessions.clone());
        second.emit(&proposal_q("p2"), proposal("p2"));
        second.emit(&voters_q("s1"), voters.clone());
        second.emit(&proposal_q("p1"), proposal("p1"));
        second.emit(&votes_q("s1"), Snapshot::Votes(vec![]));
        second.emit(&votes_q("s1"), votes);
        second.directory(sessions);

        assert_eq!(first.sync.view(), second.sync.view());
    }

    #[test]
    fn test_release_all_balances_subscriptions() {
        let mut h = Harness::joined();
        h.directory(vec![
            session("a", VotePublicity::Public, &["p1"], 1),
            closed(session("b", VotePublicity::Private, &["p2"], 2)),
        ]);
        h.sync.release_all();

        assert_eq!(h.store.subscribed(|_| true), h.store.released(|_| true));
        assert_eq!(h.sync.active_feeds(), 0);
    }

    fn store_receipt(h: &Harness, vote: Vote) {
        h.receipts
            .put(&ReceiptKey::new("m1", vote.session_id.clone()), &vote.id)
            .unwrap();
        h.store
            .inner
            .lock()
            .unwrap()
            .documents
            .insert(vote.id.clone(), vote);
    }

    fn my_vote(h: &Harness, session: &str) -> Option<OptionId> {
        h.sync
            .view()
            .session(&session.into())
            .unwrap()
            .my_vote_option_id
            .clone()
    }

    #[tokio::test]
    async fn test_receipt_written_later_is_found_once_viewer_has_voted() {
        let mut h = Harness::joined();
        h.directory(vec![session("s1", VotePublicity::Private, &[], 1)]);
        assert_eq!(my_vote(&h, "s1"), None);

        store_receipt(&h, Vote::anonymous("v7", "s1", "s1-blank"));
        h.emit(&voters_q("s1"), Snapshot::Voters(vec![Voter::new("s1", &ada())]));
        let event = h.inbox.recv().await.unwrap();
        h.sync.handle(event);

        assert_eq!(my_vote(&h, "s1"), Some(OptionId::from("s1-blank")));
    }

    #[tokio::test]
    async fn test_receipt_rechecked_when_private_session_closes() {
        let mut h = Harness::joined();
        h.directory(vec![session("s1", VotePublicity::Private, &[], 1)]);
        store_receipt(&h, Vote::anonymous("v7", "s1", "s1-blank"));

        h.directory(vec![closed(session("s1", VotePublicity::Private, &[], 1))]);
        let event = h.inbox.recv().await.unwrap();
        h.sync.handle(event);

        assert_eq!(my_vote(&h, "s1"), Some(OptionId::from("s1-blank")));
    }

    #[tokio::test]
    async fn test_refresh_own_vote_reads_new_receipt() {
        let mut h = Harness::joined();
        h.directory(vec![session("s1", VotePublicity::Private, &[], 1)]);
        store_receipt(&h, Vote::anonymous("v7", "s1", "s1-blank"));

        h.sync.refresh_own_vote(&"s1".into());
        let event = h.inbox.recv().await.unwrap();
        h.sync.handle(event);
        assert_eq!(my_vote(&h, "s1"), Some(OptionId::from("s1-blank")));

        // Found: a second refresh does not fetch again.
        h.sync.refresh_own_vote(&"s1".into());
        tokio::task::yield_now().await;
        assert!(h.inbox.try_recv().is_err());
    }

    #[test]
    fn test_error_cleared_when_failing_feed_recovers() {
        let mut h = Harness::joined();
        h.directory(vec![session("s1", VotePublicity::Public, &[], 1)]);
        h.store
            .emit_error(&voters_q("s1"), StoreError::Unavailable("offline".to_string()));
        h.pump();
        assert!(h.sync.view().error.is_some());

        h.emit(&voters_q("s1"), Snapshot::Voters(vec![]));
        assert!(h.sync.view().error.is_none());
    }

    #[test]
    fn test_error_cleared_when_failing_session_leaves() {
        let mut h = Harness::joined();
        h.directory(vec![
            session("s1", VotePublicity::Public, &[], 1),
            session("s2", VotePublicity::Public, &[], 2),
        ]);
        h.store
            .emit_error(&voters_q("s1"), StoreError::Unavailable("offline".to_string()));
        h.pump();

        h.directory(vec![session("s2", VotePublicity::Public, &[], 2)]);
        assert!(h.sync.view().error.is_none());
    }
}
