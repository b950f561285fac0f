//! The Controller facade: owns the chunk locker, a handle to worker RPC
//! endpoints, a local database-services handle, Qserv notification and a
//! config snapshot. Concrete worker RPC transport, the configuration store
//! and the message store surfaced to the SQL-proxy front end are all out of
//! scope here — this module only defines the seams a job drives.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ReplicaResult;
use crate::locker::ChunkLocker;
use crate::types::Replica;

/// One worker-targeted leaf replication request.
#[derive(Debug, Clone)]
pub struct ReplicateRequest {
    pub family: String,
    pub chunk: u32,
    pub database: String,
    pub src: String,
    pub dst: String,
}

/// One worker-targeted leaf delete request.
#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub family: String,
    pub chunk: u32,
    pub database: String,
    pub worker: String,
}

/// Outcome of asking Qserv to stop serving a replica before it is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QservRemoveOutcome {
    Success,
    ChunkInUse,
    Failed,
}

/// The worker RPC surface a job dispatches leaf requests through. The
/// concrete transport (gRPC, XRootD, …) is out of scope; jobs only see this
/// trait.
#[async_trait]
pub trait WorkerClient: Send + Sync {
    async fn find_all_replicas(&self, worker: &str, database: &str) -> ReplicaResult<Vec<Replica>>;
    async fn replicate(&self, req: &ReplicateRequest) -> ReplicaResult<()>;
    async fn delete(&self, req: &DeleteRequest) -> ReplicaResult<()>;
    /// Best-effort stop RPC for a request a job is cancelling.
    async fn stop(&self, worker: &str, request_label: &str);
}

/// The local database-services handle Create/Delete consult for existing
/// replicas before launching leaf requests — a metadata store, not a worker
/// RPC.
pub trait DatabaseService: Send + Sync {
    /// Databases participating in `family`.
    fn participating_databases(&self, family: &str) -> Vec<String>;
    /// Databases for which `worker` is recorded as already holding a
    /// replica of `chunk`.
    fn replicas_at(&self, chunk: u32, worker: &str) -> Vec<String>;
}

/// Fire-and-forget (mostly) notifications to Qserv about replica changes.
#[async_trait]
pub trait QservNotifier: Send + Sync {
    /// Best-effort; does not affect job outcome.
    async fn add_replica(&self, worker: &str, chunk: u32, databases: &[String]);
    /// Gates the DeleteReplica job: called before worker-side delete
    /// requests are launched.
    async fn remove_replica(&self, worker: &str, chunk: u32, force: bool) -> QservRemoveOutcome;
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub enabled_workers: Vec<String>,
    pub auto_notify: bool,
}

/// Owns the process-wide chunk locker and the collaborators jobs dispatch
/// through. Cheaply cloneable (every field is an `Arc`); the natural way to
/// hand one to many concurrently-running jobs.
#[derive(Clone)]
pub struct Controller {
    pub locker: Arc<ChunkLocker>,
    pub workers: Arc<dyn WorkerClient>,
    pub db_service: Arc<dyn DatabaseService>,
    pub qserv: Arc<dyn QservNotifier>,
    pub config: Arc<ControllerConfig>,
}

impl Controller {
    pub fn new(
        workers: Arc<dyn WorkerClient>,
        db_service: Arc<dyn DatabaseService>,
        qserv: Arc<dyn QservNotifier>,
        config: ControllerConfig,
    ) -> Self {
        Self { locker: Arc::new(ChunkLocker::new()), workers, db_service, qserv, config: Arc::new(config) }
    }
}
