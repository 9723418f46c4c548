//! Operation routing between a local document and a sync server
//!
//! [`SyncRouter`] queues locally executed operations, and on each sync
//! cycle pulls the server's new operations, rebases the queue past them,
//! pushes the rebased queue and hands back the transformed remote
//! operations for replay into the local document.
//!
//! Once a transform fails the router latches into a conflicted state and
//! refuses further traffic; the session must be reloaded from the server.

use ops::OpSpec;
use tracing::{debug, info, warn};

use crate::server::{RemoteChanges, ServerError, SyncServer};
use crate::transformer::{transform, TransformError};

/// Push retry bound while closing a router
const CLOSE_RETRY_LIMIT: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    /// Local and remote operations could not be reconciled
    #[error("unresolvable edit conflict: {0}")]
    UnresolvableConflict(TransformError),
    /// A previous cycle latched the conflict state
    #[error("session is conflicted and must be reloaded")]
    Conflicted,
    #[error("router is closed")]
    Closed,
    #[error(transparent)]
    Server(#[from] ServerError),
}

/// Remote operations rebased past the local queue, ready to execute
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayBatch {
    pub specs: Vec<OpSpec>,
    /// Server sequence the local state corresponds to after replay
    pub sequence: u64,
}

/// Client-side sync state machine for one member of one session
pub struct SyncRouter<S> {
    server: S,
    session_id: String,
    member_id: String,
    /// Last server sequence incorporated into the local document
    sequence: u64,
    /// Locally executed operations not yet accepted by the server
    unsynced: Vec<OpSpec>,
    has_conflict: bool,
    closed: bool,
    connected: bool,
}

impl<S: SyncServer> SyncRouter<S> {
    pub fn new(
        server: S,
        session_id: impl Into<String>,
        member_id: impl Into<String>,
        sequence: u64,
    ) -> Self {
        Self {
            server,
            session_id: session_id.into(),
            member_id: member_id.into(),
            sequence,
            unsynced: Vec::new(),
            has_conflict: false,
            closed: false,
            connected: true,
        }
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn is_conflicted(&self) -> bool {
        self.has_conflict
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// True when local operations are waiting for the server
    pub fn has_unsynced_ops(&self) -> bool {
        !self.unsynced.is_empty()
    }

    /// Records a locally executed operation for the next sync cycle
    pub fn enqueue(&mut self, spec: OpSpec) -> Result<(), RouterError> {
        if self.closed {
            return Err(RouterError::Closed);
        }
        if self.has_conflict {
            return Err(RouterError::Conflicted);
        }
        self.unsynced.push(spec);
        Ok(())
    }

    /// Runs one pull, rebase, push round trip.
    ///
    /// The returned batch holds remote operations rebased past the local
    /// queue; the caller replays them into the document. A retryable push
    /// failure keeps the queue intact for the next cycle.
    pub async fn sync_cycle(&mut self) -> Result<ReplayBatch, RouterError> {
        if self.closed {
            return Err(RouterError::Closed);
        }
        if self.has_conflict {
            return Err(RouterError::Conflicted);
        }

        let remote = match self.pull_remote().await {
            Ok(remote) => remote,
            Err(error) => {
                self.connected = false;
                return Err(error.into());
            }
        };
        self.connected = true;

        let replay = if remote.specs.is_empty() {
            ReplayBatch {
                specs: Vec::new(),
                sequence: self.sequence,
            }
        } else {
            // server operations win ties, so they go in as the b side
            let local = std::mem::take(&mut self.unsynced);
            let result = match transform(local, remote.specs) {
                Ok(result) => result,
                Err(error) => {
                    warn!(%error, "sync conflict, session latched");
                    self.has_conflict = true;
                    return Err(RouterError::UnresolvableConflict(error));
                }
            };
            self.unsynced = result.ops_a;
            self.sequence = remote.sequence;
            ReplayBatch {
                specs: result.ops_b,
                sequence: remote.sequence,
            }
        };

        if !self.unsynced.is_empty() {
            match self
                .server
                .push(
                    &self.session_id,
                    &self.member_id,
                    self.sequence,
                    self.unsynced.clone(),
                )
                .await
            {
                Ok(sequence) => {
                    debug!(
                        count = self.unsynced.len(),
                        sequence, "pushed local operations"
                    );
                    self.unsynced.clear();
                    self.sequence = sequence;
                }
                Err(error) if error.is_retryable() => {
                    // keep the queue; the next cycle pulls and rebases again
                    debug!(%error, "push deferred");
                    self.connected = matches!(error, ServerError::SeqOutOfDate);
                }
                Err(error) => {
                    self.connected = false;
                    return Err(error.into());
                }
            }
        }

        Ok(replay)
    }

    /// Drains the unsynced queue and closes the router.
    ///
    /// Runs up to [`CLOSE_RETRY_LIMIT`] sync cycles; operations still
    /// queued after that are lost and reported as an error.
    pub async fn close(&mut self) -> Result<Vec<ReplayBatch>, RouterError> {
        if self.closed {
            return Err(RouterError::Closed);
        }
        let mut batches = Vec::new();
        let mut attempts = 0;
        while !self.unsynced.is_empty() && attempts < CLOSE_RETRY_LIMIT {
            attempts += 1;
            match self.sync_cycle().await {
                Ok(batch) => batches.push(batch),
                Err(RouterError::Server(error)) if error.is_retryable() => {
                    debug!(%error, attempt = attempts, "close retry");
                }
                Err(error) => {
                    self.closed = true;
                    return Err(error);
                }
            }
        }
        self.closed = true;
        if self.unsynced.is_empty() {
            info!(session = %self.session_id, "session closed");
            Ok(batches)
        } else {
            warn!(
                count = self.unsynced.len(),
                "closing with unsynced operations"
            );
            Err(RouterError::Server(ServerError::ServiceUnavailable))
        }
    }

    async fn pull_remote(&self) -> Result<RemoteChanges, ServerError> {
        self.server
            .get_remote_changes(&self.session_id, &self.member_id, self.sequence)
            .await
    }
}

/// Router for a single-member session: every operation is accepted as soon
/// as it is enqueued and nothing ever arrives from outside.
#[derive(Debug, Default)]
pub struct TrivialRouter {
    played_back: Vec<OpSpec>,
}

impl TrivialRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, spec: OpSpec) {
        self.played_back.push(spec);
    }

    /// All operations routed so far, in execution order
    pub fn history(&self) -> &[OpSpec] {
        &self.played_back
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ops::OpBody;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn insert(member: &str, position: usize, text: &str) -> OpSpec {
        OpSpec::new(
            member,
            OpBody::InsertText {
                position,
                text: text.into(),
            },
        )
    }

    /// In-memory server with a scriptable failure for the next push
    #[derive(Default)]
    struct MockServer {
        state: Arc<Mutex<MockState>>,
    }

    #[derive(Default)]
    struct MockState {
        log: Vec<OpSpec>,
        fail_next_push: Option<ServerError>,
        pushes: u32,
    }

    impl MockServer {
        fn shared(&self) -> Arc<Mutex<MockState>> {
            self.state.clone()
        }
    }

    #[async_trait::async_trait]
    impl SyncServer for MockServer {
        async fn get_remote_changes(
            &self,
            _session_id: &str,
            member_id: &str,
            since: u64,
        ) -> Result<RemoteChanges, ServerError> {
            let state = self.state.lock();
            let specs: Vec<OpSpec> = state.log[since as usize..]
                .iter()
                .filter(|spec| spec.memberid != member_id)
                .cloned()
                .collect();
            Ok(RemoteChanges {
                specs,
                sequence: state.log.len() as u64,
            })
        }

        async fn push(
            &self,
            _session_id: &str,
            _member_id: &str,
            _based_on: u64,
            specs: Vec<OpSpec>,
        ) -> Result<u64, ServerError> {
            let mut state = self.state.lock();
            state.pushes += 1;
            if let Some(error) = state.fail_next_push.take() {
                return Err(error);
            }
            state.log.extend(specs);
            Ok(state.log.len() as u64)
        }
    }

    #[tokio::test]
    async fn test_push_and_pull_round_trip() {
        let server = MockServer::default();
        let state = server.shared();
        let mut router = SyncRouter::new(server, "doc-1", "alice", 0);

        router.enqueue(insert("alice", 1, "hi")).unwrap();
        let batch = router.sync_cycle().await.unwrap();
        assert!(batch.specs.is_empty());
        assert!(!router.has_unsynced_ops());
        assert_eq!(router.sequence(), 1);
        assert_eq!(state.lock().log.len(), 1);
    }

    #[tokio::test]
    async fn test_remote_ops_are_rebased_past_local_queue() {
        let server = MockServer::default();
        let state = server.shared();
        // bob already committed an insert at position 1
        state.lock().log.push(insert("bob", 1, "B"));

        let mut router = SyncRouter::new(server, "doc-1", "alice", 0);
        router.enqueue(insert("alice", 1, "A")).unwrap();
        let batch = router.sync_cycle().await.unwrap();

        // bob's op wins the tie and replays at its own position; alice's
        // queued op was pushed shifted past it
        assert_eq!(
            batch.specs[0].body,
            OpBody::InsertText {
                position: 1,
                text: "B".into()
            }
        );
        let log = &state.lock().log;
        assert_eq!(
            log[1].body,
            OpBody::InsertText {
                position: 2,
                text: "A".into()
            }
        );
    }

    #[tokio::test]
    async fn test_unresolvable_conflict_latches_router() {
        let server = MockServer::default();
        let state = server.shared();
        state.lock().log.push(OpSpec::new(
            "bob",
            OpBody::SetParagraphStyle {
                position: 0,
                style_name: "P1".into(),
            },
        ));

        let mut router = SyncRouter::new(server, "doc-1", "alice", 0);
        router.enqueue(insert("alice", 1, "A")).unwrap();
        let error = router.sync_cycle().await.unwrap_err();
        assert!(matches!(error, RouterError::UnresolvableConflict(_)));
        assert!(router.is_conflicted());

        // everything after the latch is refused
        assert_eq!(
            router.enqueue(insert("alice", 2, "B")).unwrap_err(),
            RouterError::Conflicted
        );
        assert_eq!(
            router.sync_cycle().await.unwrap_err(),
            RouterError::Conflicted
        );
    }

    #[tokio::test]
    async fn test_retryable_push_failure_keeps_queue() {
        let server = MockServer::default();
        let state = server.shared();
        state.lock().fail_next_push = Some(ServerError::ServiceUnavailable);

        let mut router = SyncRouter::new(server, "doc-1", "alice", 0);
        router.enqueue(insert("alice", 1, "A")).unwrap();

        let batch = router.sync_cycle().await.unwrap();
        assert!(batch.specs.is_empty());
        assert!(router.has_unsynced_ops());
        assert!(!router.is_connected());

        // the next cycle succeeds and drains the queue
        router.sync_cycle().await.unwrap();
        assert!(!router.has_unsynced_ops());
        assert!(router.is_connected());
        assert_eq!(state.lock().log.len(), 1);
    }

    #[tokio::test]
    async fn test_close_drains_queue() {
        let server = MockServer::default();
        let state = server.shared();
        state.lock().fail_next_push = Some(ServerError::SeqOutOfDate);

        let mut router = SyncRouter::new(server, "doc-1", "alice", 0);
        router.enqueue(insert("alice", 1, "A")).unwrap();
        router.close().await.unwrap();
        assert_eq!(state.lock().log.len(), 1);
        assert!(state.lock().pushes >= 2);

        assert_eq!(
            router.sync_cycle().await.unwrap_err(),
            RouterError::Closed
        );
    }

    #[test]
    fn test_trivial_router_records_history() {
        let mut router = TrivialRouter::new();
        router.enqueue(insert("solo", 1, "x"));
        router.enqueue(insert("solo", 2, "y"));
        assert_eq!(router.history().len(), 2);
    }
}
