//! A `QservNotifier` that retries its RPCs to the Qserv czar with the
//! standard exponential backoff. The RPC transport itself is out of scope;
//! [`QservRpc`] is the seam a concrete transport would implement.

use std::sync::Arc;

use async_trait::async_trait;
use backoff::{Backoff, BackoffConfig};
use observability_deps::tracing::warn;

use crate::controller::{QservNotifier, QservRemoveOutcome};

/// The low-level RPC surface against the Qserv czar's chunk-mapping service.
/// Transient failures (timeouts, connection resets) should be returned as
/// `Err`; `remove_chunk_db` reports "chunk in use" as a successful outcome,
/// not an error, since it is an expected, non-retryable response.
#[async_trait]
pub trait QservRpc: Send + Sync {
    async fn add_chunk_db(&self, worker: &str, chunk: u32, databases: &[String]) -> Result<(), QservRpcError>;
    async fn remove_chunk_db(&self, worker: &str, chunk: u32, force: bool) -> Result<QservRemoveOutcome, QservRpcError>;
}

#[derive(Debug)]
pub struct QservRpcError {
    pub reason: String,
}

impl std::fmt::Display for QservRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "qserv rpc failed: {}", self.reason)
    }
}

impl std::error::Error for QservRpcError {}

/// Retries [`QservRpc`] calls with [`backoff::Backoff`] until they succeed.
/// `add_replica` is best-effort and fire-and-forget from its caller's point
/// of view, so it retries indefinitely in the background rather than
/// propagating failure; `remove_replica` is awaited by `DeleteReplicaJob`,
/// so it retries only the RPC's transient failures and passes a definitive
/// `ChunkInUse`/`Failed` outcome straight through.
pub struct BackoffQservNotifier {
    rpc: Arc<dyn QservRpc>,
    config: BackoffConfig,
}

impl BackoffQservNotifier {
    pub fn new(rpc: Arc<dyn QservRpc>, config: BackoffConfig) -> Self {
        Self { rpc, config }
    }
}

#[async_trait]
impl QservNotifier for BackoffQservNotifier {
    async fn add_replica(&self, worker: &str, chunk: u32, databases: &[String]) {
        let mut backoff = Backoff::new(&self.config);
        let result = backoff
            .retry_all_errors("qserv_add_chunk_db", || self.rpc.add_chunk_db(worker, chunk, databases))
            .await;
        if result.is_err() {
            warn!(worker, chunk, "qserv add_chunk_db retry loop exited without succeeding");
        }
    }

    async fn remove_replica(&self, worker: &str, chunk: u32, force: bool) -> QservRemoveOutcome {
        let mut backoff = Backoff::new(&self.config);
        match backoff.retry_all_errors("qserv_remove_chunk_db", || self.rpc.remove_chunk_db(worker, chunk, force)).await {
            Ok(outcome) => outcome,
            Err(_) => QservRemoveOutcome::Failed,
        }
    }
}
