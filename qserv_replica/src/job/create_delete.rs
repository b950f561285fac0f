//! CreateReplica / DeleteReplica (§4.7): the leaf jobs every composite
//! planner (FixUp, Replicate, Rebalance) schedules.

use futures::future::join_all;
use observability_deps::tracing::info;

use crate::controller::{Controller, DeleteRequest, QservRemoveOutcome, ReplicateRequest};
use crate::error::{ReplicaError, ReplicaResult};
use crate::types::{ExtendedState, JobId, RequestExtendedState};

use super::JobHandle;

#[derive(Debug, Clone)]
pub struct CreateReplicaResult {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

pub struct CreateReplicaJob {
    pub handle: JobHandle<CreateReplicaResult>,
    family: String,
    chunk: u32,
    src: String,
    dst: String,
}

impl CreateReplicaJob {
    pub fn new(family: impl Into<String>, chunk: u32, src: impl Into<String>, dst: impl Into<String>, parent_id: Option<JobId>) -> Self {
        Self { handle: JobHandle::new(parent_id, 0), family: family.into(), chunk, src: src.into(), dst: dst.into() }
    }

    /// Validates configuration, then fans out one replication request per
    /// database the database service reports at `src`. Notifies Qserv of
    /// the addition only once every request has succeeded.
    pub async fn run(&self, controller: &Controller) -> ReplicaResult<CreateReplicaResult> {
        self.handle.mark_in_progress();

        if self.src == self.dst {
            self.handle.finish(ExtendedState::ConfigError, CreateReplicaResult { succeeded: Vec::new(), failed: Vec::new() });
            return Err(ReplicaError::ConfigError { reason: format!("source and destination workers are both '{}'", self.src) });
        }

        let existing_at_dst = controller.db_service.replicas_at(self.chunk, &self.dst);
        if !existing_at_dst.is_empty() {
            self.handle.finish(ExtendedState::ConfigError, CreateReplicaResult { succeeded: Vec::new(), failed: Vec::new() });
            return Err(ReplicaError::ConfigError {
                reason: format!("destination '{}' already holds chunk {} of {:?}", self.dst, self.chunk, existing_at_dst),
            });
        }

        let source_databases = controller.db_service.replicas_at(self.chunk, &self.src);
        if source_databases.is_empty() {
            self.handle.finish(ExtendedState::ConfigError, CreateReplicaResult { succeeded: Vec::new(), failed: Vec::new() });
            return Err(ReplicaError::ConfigError {
                reason: format!("source '{}' holds no replica of chunk {}", self.src, self.chunk),
            });
        }

        let cancel = self.handle.cancellation_token();
        let requests = source_databases.iter().map(|db| ReplicateRequest {
            family: self.family.clone(),
            chunk: self.chunk,
            database: db.clone(),
            src: self.src.clone(),
            dst: self.dst.clone(),
        });

        let futures = requests.map(|req| {
            let workers = controller.workers.clone();
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    workers.stop(&req.dst, &format!("replicate {} chunk {}", req.database, req.chunk)).await;
                    return (req.database, RequestExtendedState::Failed);
                }
                match workers.replicate(&req).await {
                    Ok(()) => (req.database, RequestExtendedState::Success),
                    Err(_) => (req.database, RequestExtendedState::Failed),
                }
            }
        });

        let outcomes = join_all(futures).await;
        let succeeded: Vec<String> = outcomes.iter().filter(|(_, s)| *s == RequestExtendedState::Success).map(|(db, _)| db.clone()).collect();
        let failed: Vec<String> = outcomes.iter().filter(|(_, s)| *s != RequestExtendedState::Success).map(|(db, _)| db.clone()).collect();

        let all_ok = failed.is_empty() && !self.handle.is_cancelled();
        if all_ok {
            controller.qserv.add_replica(&self.dst, self.chunk, &succeeded).await;
        }

        let extended_state = if self.handle.is_cancelled() {
            ExtendedState::Cancelled
        } else if all_ok {
            ExtendedState::Success
        } else {
            ExtendedState::Failed
        };
        let result = CreateReplicaResult { succeeded, failed };
        self.handle.finish(extended_state, result.clone());
        Ok(result)
    }
}

#[derive(Debug, Clone)]
pub struct DeleteReplicaResult {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

pub struct DeleteReplicaJob {
    pub handle: JobHandle<DeleteReplicaResult>,
    family: String,
    chunk: u32,
    worker: String,
    auto_notify: bool,
}

impl DeleteReplicaJob {
    pub fn new(family: impl Into<String>, chunk: u32, worker: impl Into<String>, auto_notify: bool, parent_id: Option<JobId>) -> Self {
        Self { handle: JobHandle::new(parent_id, 0), family: family.into(), chunk, worker: worker.into(), auto_notify }
    }

    /// If auto-notify is on, asks Qserv to mark the replica unused before
    /// any worker-side delete RPC is issued — `QSERV_CHUNK_IN_USE` ends the
    /// job without touching the worker.
    pub async fn run(&self, controller: &Controller) -> ReplicaResult<DeleteReplicaResult> {
        self.handle.mark_in_progress();

        let databases = controller.db_service.replicas_at(self.chunk, &self.worker);
        if databases.is_empty() {
            let empty = DeleteReplicaResult { succeeded: Vec::new(), failed: Vec::new() };
            self.handle.finish(ExtendedState::ConfigError, empty);
            return Err(ReplicaError::ConfigError {
                reason: format!("worker '{}' holds no replica of chunk {}", self.worker, self.chunk),
            });
        }

        if self.auto_notify {
            match controller.qserv.remove_replica(&self.worker, self.chunk, true).await {
                QservRemoveOutcome::ChunkInUse => {
                    let empty = DeleteReplicaResult { succeeded: Vec::new(), failed: Vec::new() };
                    self.handle.finish(ExtendedState::QservChunkInUse, empty.clone());
                    info!(family = %self.family, chunk = self.chunk, worker = %self.worker, "chunk in use, delete skipped");
                    return Ok(empty);
                }
                QservRemoveOutcome::Failed => {
                    let empty = DeleteReplicaResult { succeeded: Vec::new(), failed: Vec::new() };
                    self.handle.finish(ExtendedState::QservFailed, empty.clone());
                    return Ok(empty);
                }
                QservRemoveOutcome::Success => {}
            }
        }

        let requests = databases.iter().map(|db| DeleteRequest {
            family: self.family.clone(),
            chunk: self.chunk,
            database: db.clone(),
            worker: self.worker.clone(),
        });
        let futures = requests.map(|req| {
            let workers = controller.workers.clone();
            async move {
                match workers.delete(&req).await {
                    Ok(()) => (req.database, RequestExtendedState::Success),
                    Err(_) => (req.database, RequestExtendedState::Failed),
                }
            }
        });
        let outcomes = join_all(futures).await;
        let succeeded: Vec<String> = outcomes.iter().filter(|(_, s)| *s == RequestExtendedState::Success).map(|(db, _)| db.clone()).collect();
        let failed: Vec<String> = outcomes.iter().filter(|(_, s)| *s != RequestExtendedState::Success).map(|(db, _)| db.clone()).collect();

        let extended_state = if failed.is_empty() { ExtendedState::Success } else { ExtendedState::Failed };
        let result = DeleteReplicaResult { succeeded, failed };
        self.handle.finish(extended_state, result.clone());
        Ok(result)
    }
}
