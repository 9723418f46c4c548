//! Sync server contract
//!
//! The router talks to any backend through [`SyncServer`]: fetch the
//! operations committed after a known sequence number, and push a batch of
//! local operations based on one. Sequence numbers are assigned by the
//! server and increase by one per committed operation.

use async_trait::async_trait;
use ops::OpSpec;

/// Failures reported by a sync backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServerError {
    /// The push was based on a stale sequence; pull and rebase first
    #[error("push based on an out of date sequence")]
    SeqOutOfDate,
    /// The backend is temporarily unreachable
    #[error("sync service unavailable")]
    ServiceUnavailable,
    #[error("sync server error: {0}")]
    Other(String),
}

impl ServerError {
    /// True when retrying the same call later can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServerError::SeqOutOfDate | ServerError::ServiceUnavailable)
    }
}

/// Operations committed by other members since a fetch's `since` sequence
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteChanges {
    pub specs: Vec<OpSpec>,
    /// Sequence number of the last spec, or the `since` value when empty
    pub sequence: u64,
}

/// Backend used to exchange operations for a shared editing session
#[async_trait]
pub trait SyncServer: Send + Sync {
    /// Fetches operations committed after `since`
    async fn get_remote_changes(
        &self,
        session_id: &str,
        member_id: &str,
        since: u64,
    ) -> Result<RemoteChanges, ServerError>;

    /// Commits `specs` on top of sequence `based_on`, returning the new
    /// head sequence
    async fn push(
        &self,
        session_id: &str,
        member_id: &str,
        based_on: u64,
        specs: Vec<OpSpec>,
    ) -> Result<u64, ServerError>;
}

#[async_trait]
impl<T: SyncServer + ?Sized> SyncServer for Box<T> {
    async fn get_remote_changes(
        &self,
        session_id: &str,
        member_id: &str,
        since: u64,
    ) -> Result<RemoteChanges, ServerError> {
        (**self).get_remote_changes(session_id, member_id, since).await
    }

    async fn push(
        &self,
        session_id: &str,
        member_id: &str,
        based_on: u64,
        specs: Vec<OpSpec>,
    ) -> Result<u64, ServerError> {
        (**self).push(session_id, member_id, based_on, specs).await
    }
}
