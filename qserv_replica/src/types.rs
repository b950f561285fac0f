//! The data model shared by the chunk locker, the request tracker and every
//! job: chunks, replicas, job/request state machines and the disposition
//! snapshot `FindAllJob` produces.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Process-wide monotonic source of [`JobId`]s.
static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one job instance. Jobs never reuse an id, even across restarts
/// of the same logical operation (a FixUp job that restarts its planning
/// pass keeps its id; a brand new job gets a new one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl JobId {
    pub fn new() -> Self {
        Self(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// A chunk number reserved by convention to mean "present on every worker",
/// excluded from Rebalance's per-worker counts.
pub const OVERFLOW_CHUNK: u32 = u32::MAX;

/// `{family, number}` — the locker's key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Chunk {
    pub family: String,
    pub number: u32,
}

impl Chunk {
    pub fn new(family: impl Into<String>, number: u32) -> Self {
        Self { family: family.into(), number }
    }
}

/// A replica's worker-reported status. The source's status enum carries
/// additional transitional values (e.g. `IN_PROGRESS`); only the two values
/// the disposition computation distinguishes are modeled here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicaStatus {
    Complete,
    Incomplete,
}

/// `{database, chunk, worker, status}`. Equality across workers is by
/// `(chunk, database, worker)`, which is exactly this struct's derived
/// `PartialEq` since `status` does not participate in identity comparisons
/// anywhere replicas are deduplicated — callers that care about status
/// compare it explicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Replica {
    pub database: String,
    pub chunk: u32,
    pub worker: String,
    pub status: ReplicaStatus,
}

impl Replica {
    pub fn new(database: impl Into<String>, chunk: u32, worker: impl Into<String>, status: ReplicaStatus) -> Self {
        Self { database: database.into(), chunk, worker: worker.into(), status }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.status, ReplicaStatus::Complete)
    }
}

/// A leaf request's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestState {
    Created,
    InProgress,
    Finished,
}

/// A leaf request's outcome once `state == Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestExtendedState {
    None,
    Success,
    Failed,
}

/// A job's lifecycle state. `CREATED -> IN_PROGRESS -> FINISHED`, never
/// backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Created,
    InProgress,
    Finished,
}

/// A finished job's outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtendedState {
    None,
    Success,
    Failed,
    Cancelled,
    ConfigError,
    QservChunkInUse,
    QservFailed,
}

/// The output of a [`crate::job::find_all::FindAllJob`]: the replica
/// disposition of one family across all enabled workers, plus the derived
/// per-chunk/per-worker predicates every planner job consumes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Disposition {
    /// Every replica reported, keyed by chunk.
    pub replicas: BTreeMap<u32, Vec<Replica>>,
    /// Whether a worker responded to its `find_all_replicas` request. A
    /// worker missing from this map, or mapped to `false`, contributes no
    /// chunks to `replicas`.
    pub reported: BTreeMap<String, bool>,
}

impl Disposition {
    /// Sorted union of databases participating in `chunk`.
    pub fn databases(&self, chunk: u32) -> Vec<String> {
        let mut dbs: Vec<String> = self
            .replicas
            .get(&chunk)
            .map(|rs| rs.iter().map(|r| r.database.clone()).collect())
            .unwrap_or_default();
        dbs.sort();
        dbs.dedup();
        dbs
    }

    /// Workers holding a COMPLETE replica of `(chunk, database)`.
    pub fn complete_workers(&self, chunk: u32, database: &str) -> Vec<String> {
        let mut workers: Vec<String> = self
            .replicas
            .get(&chunk)
            .into_iter()
            .flatten()
            .filter(|r| r.database == database && r.is_complete())
            .map(|r| r.worker.clone())
            .collect();
        workers.sort();
        workers.dedup();
        workers
    }

    /// Every worker that holds at least one replica (of any status) of
    /// `chunk`, used by Replicate's occupancy counter.
    pub fn workers_holding(&self, chunk: u32) -> Vec<String> {
        let mut workers: Vec<String> = self
            .replicas
            .get(&chunk)
            .into_iter()
            .flatten()
            .map(|r| r.worker.clone())
            .collect();
        workers.sort();
        workers.dedup();
        workers
    }

    /// `worker` has a replica (any status) for every database of `chunk`.
    pub fn is_colocated(&self, chunk: u32, worker: &str) -> bool {
        let dbs = self.databases(chunk);
        if dbs.is_empty() {
            return false;
        }
        let held: std::collections::HashSet<&str> = self
            .replicas
            .get(&chunk)
            .into_iter()
            .flatten()
            .filter(|r| r.worker == worker)
            .map(|r| r.database.as_str())
            .collect();
        dbs.iter().all(|db| held.contains(db.as_str()))
    }

    /// `worker` is colocated for `chunk` AND every one of its replicas there
    /// is COMPLETE.
    pub fn is_good(&self, chunk: u32, worker: &str) -> bool {
        if !self.is_colocated(chunk, worker) {
            return false;
        }
        self.replicas
            .get(&chunk)
            .into_iter()
            .flatten()
            .filter(|r| r.worker == worker)
            .all(|r| r.is_complete())
    }

    /// Every chunk number that appears in the disposition, sorted.
    pub fn chunks(&self) -> Vec<u32> {
        self.replicas.keys().copied().collect()
    }

    /// Count of good replicas `worker` holds, excluding [`OVERFLOW_CHUNK`].
    pub fn good_chunk_count(&self, worker: &str) -> usize {
        self.chunks().into_iter().filter(|&c| c != OVERFLOW_CHUNK && self.is_good(c, worker)).count()
    }

    /// Every worker seen either in `reported` or as a replica holder.
    pub fn workers(&self) -> Vec<String> {
        let mut ws: Vec<String> = self.reported.keys().cloned().collect();
        for rs in self.replicas.values() {
            ws.extend(rs.iter().map(|r| r.worker.clone()));
        }
        ws.sort();
        ws.dedup();
        ws
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disposition() -> Disposition {
        let mut d = Disposition::default();
        d.reported.insert("w1".into(), true);
        d.reported.insert("w2".into(), true);
        d.replicas.insert(
            1,
            vec![
                Replica::new("db1", 1, "w1", ReplicaStatus::Complete),
                Replica::new("db2", 1, "w1", ReplicaStatus::Complete),
                Replica::new("db1", 1, "w2", ReplicaStatus::Complete),
                Replica::new("db2", 1, "w2", ReplicaStatus::Incomplete),
            ],
        );
        d
    }

    #[test]
    fn good_requires_colocation_and_completeness() {
        let d = disposition();
        assert!(d.is_good(1, "w1"));
        assert!(d.is_colocated(1, "w2"));
        assert!(!d.is_good(1, "w2"));
    }

    #[test]
    fn databases_is_sorted_and_deduped() {
        let d = disposition();
        assert_eq!(d.databases(1), vec!["db1".to_string(), "db2".to_string()]);
    }

    #[test]
    fn complete_workers_excludes_incomplete() {
        let d = disposition();
        assert_eq!(d.complete_workers(1, "db2"), vec!["w1".to_string()]);
    }

    #[test]
    fn overflow_chunk_excluded_from_good_count() {
        let mut d = disposition();
        d.replicas.insert(
            OVERFLOW_CHUNK,
            vec![Replica::new("db1", OVERFLOW_CHUNK, "w1", ReplicaStatus::Complete), Replica::new("db2", OVERFLOW_CHUNK, "w1", ReplicaStatus::Complete)],
        );
        assert_eq!(d.good_chunk_count("w1"), 1);
    }
}
