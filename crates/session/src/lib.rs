//! # Vellum session
//!
//! Wires a [`Document`], a sync router and an optional undo manager into
//! one editing session. Local operations flow through
//! [`Session::enqueue`]: they get a wall-clock timestamp, execute against
//! the document, feed the undo history and queue up for the server.
//! [`Session::sync`] runs one round trip and replays the rebased remote
//! operations, bracketed by batch events so observers can defer expensive
//! work until the batch ends. Replayed operations feed the undo history
//! like local ones; a snapshot restore replays only what was recorded.

pub mod config;
pub mod scheduler;

use chrono::Utc;
use collab::{ReplayBatch, RouterError, SyncRouter, SyncServer, TrivialRouter};
use ops::{Document, EventNotifier, OpSpec, SubscriptionId};
use tracing::{debug, info, warn};
use undo::TrivialUndoManager;
use uuid::Uuid;

pub use config::SessionConfig;
pub use scheduler::SyncScheduler;

/// Session lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// A replay of remote operations is about to execute
    BatchStart,
    /// The replay finished; the document matches this server sequence
    BatchEnd { sequence: u64 },
}

enum Backend {
    /// Single-member session, nothing ever arrives from outside
    Local(TrivialRouter),
    Shared(SyncRouter<Box<dyn SyncServer>>),
}

/// One member's editing session over one document
pub struct Session {
    session_id: String,
    member_id: String,
    doc: Document,
    backend: Backend,
    undo: Option<TrivialUndoManager>,
    notifier: EventNotifier<SessionEvent>,
}

impl Session {
    /// Session without a server; operations apply immediately and undo is
    /// fully available
    pub fn local(config: &SessionConfig, member_id: impl Into<String>) -> Self {
        Self::build(
            config,
            Uuid::new_v4().to_string(),
            member_id.into(),
            Backend::Local(TrivialRouter::new()),
        )
    }

    /// Session synchronized through `server`, joining at `sequence`
    pub fn shared(
        config: &SessionConfig,
        server: impl SyncServer + 'static,
        session_id: impl Into<String>,
        member_id: impl Into<String>,
        sequence: u64,
    ) -> Self {
        let session_id = session_id.into();
        let member_id = member_id.into();
        let router = SyncRouter::new(
            Box::new(server) as Box<dyn SyncServer>,
            session_id.clone(),
            member_id.clone(),
            sequence,
        );
        Self::build(config, session_id, member_id, Backend::Shared(router))
    }

    fn build(
        config: &SessionConfig,
        session_id: String,
        member_id: String,
        backend: Backend,
    ) -> Self {
        info!(session = %session_id, member = %member_id, "session opened");
        Self {
            session_id,
            member_id,
            doc: Document::new(config.bucket_size),
            backend,
            undo: config.undo_enabled.then(TrivialUndoManager::new),
            notifier: EventNotifier::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn member_id(&self) -> &str {
        &self.member_id
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    /// Replaces the session's document with loaded content; call before
    /// any operations execute
    pub fn load_document(&mut self, doc: Document) {
        self.doc = doc;
    }

    pub fn subscribe(
        &mut self,
        callback: impl FnMut(&SessionEvent) + Send + 'static,
    ) -> SubscriptionId {
        self.notifier.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.notifier.unsubscribe(id);
    }

    /// Marks the restore point for undo; call once the document holds its
    /// loaded content and initial cursors
    pub fn save_initial_state(&mut self) {
        if let Some(undo) = &mut self.undo {
            undo.save_initial_state(&self.doc);
        }
    }

    /// Executes a locally authored operation and queues it for sync.
    ///
    /// Returns `Ok(false)` when the document rejected the operation; the
    /// document is untouched and nothing is queued.
    pub fn enqueue(&mut self, mut spec: OpSpec) -> Result<bool, RouterError> {
        if spec.timestamp.is_none() {
            spec.timestamp = Some(Utc::now().timestamp_millis().max(0) as u64);
        }
        if !spec.execute(&mut self.doc) {
            debug!(optype = spec.optype(), "operation rejected");
            return Ok(false);
        }
        if let Some(undo) = &mut self.undo {
            undo.on_operation_executed(&spec);
        }
        match &mut self.backend {
            Backend::Local(router) => router.enqueue(spec),
            Backend::Shared(router) => router.enqueue(spec)?,
        }
        Ok(true)
    }

    /// Runs one sync round trip and replays remote operations.
    ///
    /// Returns the server sequence the document now corresponds to.
    pub async fn sync(&mut self) -> Result<u64, RouterError> {
        let batch = match &mut self.backend {
            Backend::Local(_) => return Ok(0),
            Backend::Shared(router) => router.sync_cycle().await?,
        };
        self.replay(batch)
    }

    /// Drains pending local operations and shuts the session down
    pub async fn close(&mut self) -> Result<(), RouterError> {
        let batches = match &mut self.backend {
            Backend::Local(_) => return Ok(()),
            Backend::Shared(router) => router.close().await?,
        };
        for batch in batches {
            self.replay(batch)?;
        }
        Ok(())
    }

    fn replay(&mut self, batch: ReplayBatch) -> Result<u64, RouterError> {
        let sequence = batch.sequence;
        if batch.specs.is_empty() {
            return Ok(sequence);
        }
        self.notifier.emit(&SessionEvent::BatchStart);
        for spec in &batch.specs {
            if !spec.execute(&mut self.doc) {
                warn!(
                    optype = spec.optype(),
                    member = %spec.memberid,
                    "remote operation rejected"
                );
                continue;
            }
            // remote operations enter the undo record too; a snapshot
            // restore replays the recorded history and nothing else
            if let Some(undo) = &mut self.undo {
                undo.on_operation_executed(spec);
            }
        }
        self.notifier.emit(&SessionEvent::BatchEnd { sequence });
        Ok(sequence)
    }

    /// Undoes up to `states` local undo states
    pub fn undo(&mut self, states: usize) -> usize {
        match &mut self.undo {
            Some(undo) => undo.move_backward(&mut self.doc, states),
            None => 0,
        }
    }

    /// Redoes up to `states` undone states
    pub fn redo(&mut self, states: usize) -> usize {
        match &mut self.undo {
            Some(undo) => undo.move_forward(&mut self.doc, states),
            None => 0,
        }
    }

    pub fn undo_manager(&self) -> Option<&TrivialUndoManager> {
        self.undo.as_ref()
    }

    /// Operation log of a local session; `None` for shared sessions
    pub fn local_history(&self) -> Option<&[OpSpec]> {
        match &self.backend {
            Backend::Local(router) => Some(router.history()),
            Backend::Shared(_) => None,
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_id", &self.session_id)
            .field("member_id", &self.member_id)
            .field("undo", &self.undo.is_some())
            .finish()
    }
}
