//! Replicate (§4.9): brings every chunk up to a target replication level,
//! picking destinations by current occupancy and admitting backlog
//! requests by a live load-balance metric as earlier ones complete. Each
//! fully-succeeded placement posts one Qserv `add_replica` notification for
//! the databases it created, mirroring `CreateReplicaJob`'s ordering.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::controller::{Controller, ReplicateRequest};
use crate::tracker::{RequestTracker, TrackedRequest};
use crate::types::{Chunk, ExtendedState, JobId, RequestExtendedState, OVERFLOW_CHUNK};

use super::batch::run_with_admission;
use super::find_all::FindAllJob;
use super::JobHandle;

/// Requests admitted at once before the load-balance admission policy takes
/// over. The source ties this to destination-worker diversity times
/// worker-side thread concurrency; a fixed constant is the idiomatic stand-in
/// here since neither of those is configurable in this crate.
const INITIAL_BATCH: usize = 8;

struct TrackedReplicate {
    req: ReplicateRequest,
    state: RequestExtendedState,
}

impl TrackedRequest for TrackedReplicate {
    fn extended_state(&self) -> RequestExtendedState {
        self.state
    }

    fn describe(&self) -> String {
        format!("replicate {} chunk {} {} -> {}", self.req.database, self.req.chunk, self.req.src, self.req.dst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReplicateResult {
    pub placements: u64,
    pub replicas_created: u64,
    pub failed_locks: u64,
    pub planning_restarts: u32,
}

pub struct ReplicateJob {
    pub handle: JobHandle<ReplicateResult>,
    family: String,
    databases: Vec<String>,
    target_level: u32,
}

impl ReplicateJob {
    pub fn new(family: impl Into<String>, databases: Vec<String>, target_level: u32, parent_id: Option<JobId>) -> Self {
        Self { handle: JobHandle::new(parent_id, 0), family: family.into(), databases, target_level }
    }

    pub async fn run(&self, controller: &Controller) -> ReplicateResult {
        self.handle.mark_in_progress();
        let mut planning_restarts = 0u32;
        let mut total_failed_locks = 0u64;
        let mut total_placements = 0u64;
        let mut tracker: RequestTracker<TrackedReplicate> = RequestTracker::new();

        loop {
            let find_all = FindAllJob::new(self.family.clone(), self.databases.clone(), Some(self.handle.id()));
            let disposition = find_all.run(controller).await;

            let mut occupancy: HashMap<String, usize> = disposition
                .workers()
                .into_iter()
                .map(|w| {
                    let count = disposition.chunks().iter().filter(|&&c| disposition.workers_holding(c).iter().any(|x| x == &w)).count();
                    (w, count)
                })
                .collect();

            let mut scheduled: Vec<ReplicateRequest> = Vec::new();
            let mut locked = Vec::new();
            let mut wave_failed_locks = 0u64;
            // Which databases were scheduled for each (chunk, destination)
            // placement, so a single `add_replica` can be posted per
            // placement once every one of its requests has succeeded.
            let mut expected: HashMap<(u32, String), Vec<String>> = HashMap::new();

            for chunk in disposition.chunks() {
                if chunk == OVERFLOW_CHUNK {
                    continue;
                }
                let good_count = disposition.workers().iter().filter(|w| disposition.is_good(chunk, w)).count() as i64;
                let deficit = self.target_level as i64 - good_count;
                if deficit <= 0 {
                    continue;
                }
                let key = Chunk::new(&self.family, chunk);
                if !controller.locker.try_lock(&key, self.handle.id()) {
                    wave_failed_locks += 1;
                    continue;
                }
                locked.push(key);

                let holders = disposition.workers_holding(chunk);
                let mut candidates: Vec<String> = disposition
                    .workers()
                    .into_iter()
                    .filter(|w| disposition.reported.get(w) == Some(&true) && !holders.contains(w))
                    .collect();
                candidates.sort_by_key(|w| occupancy.get(w).copied().unwrap_or(0));

                let dbs = disposition.databases(chunk);
                for _ in 0..deficit.min(candidates.len() as i64) {
                    let dst = candidates.remove(0);
                    for db in &dbs {
                        if let Some(src) = disposition.complete_workers(chunk, db).into_iter().next() {
                            scheduled.push(ReplicateRequest { family: self.family.clone(), chunk, database: db.clone(), src, dst: dst.clone() });
                            expected.entry((chunk, dst.clone())).or_default().push(db.clone());
                        }
                    }
                    *occupancy.entry(dst.clone()).or_insert(0) += 1;
                    total_placements += 1;
                    // Re-sort so the next destination picked for this chunk (or
                    // the next chunk) sees this placement's occupancy bump.
                    candidates.sort_by_key(|w| occupancy.get(w).copied().unwrap_or(0));
                }
            }

            for req in &scheduled {
                tracker.add(&TrackedReplicate { req: req.clone(), state: RequestExtendedState::None });
            }

            let active: Arc<Mutex<HashMap<String, usize>>> = Arc::new(Mutex::new(HashMap::new()));
            let workers = controller.workers.clone();
            let outcomes = run_with_admission(
                scheduled,
                INITIAL_BATCH,
                |backlog| {
                    let active = active.lock();
                    let idx = (0..backlog.len())
                        .min_by_key(|&i| {
                            let req = &backlog[i];
                            active.get(&req.dst).copied().unwrap_or(0) + active.get(&req.src).copied().unwrap_or(0)
                        })
                        .unwrap();
                    drop(active);
                    backlog.remove(idx)
                },
                move |req| {
                    let workers = workers.clone();
                    let active = active.clone();
                    async move {
                        *active.lock().entry(req.dst.clone()).or_insert(0) += 1;
                        *active.lock().entry(req.src.clone()).or_insert(0) += 1;
                        let state =
                            if workers.replicate(&req).await.is_ok() { RequestExtendedState::Success } else { RequestExtendedState::Failed };
                        *active.lock().get_mut(&req.dst).unwrap() -= 1;
                        *active.lock().get_mut(&req.src).unwrap() -= 1;
                        TrackedReplicate { req, state }
                    }
                },
            )
            .await;

            // A placement's destination is only notified once every database
            // scheduled for it succeeded; a partial placement is left for the
            // next planning wave to retry rather than advertised to Qserv.
            let mut succeeded_dbs: HashMap<(u32, String), Vec<String>> = HashMap::new();
            for outcome in &outcomes {
                if outcome.state == RequestExtendedState::Success {
                    succeeded_dbs.entry((outcome.req.chunk, outcome.req.dst.clone())).or_default().push(outcome.req.database.clone());
                }
            }
            for (key, dbs) in &succeeded_dbs {
                if expected.get(key).map(Vec::len) == Some(dbs.len()) {
                    let (chunk, dst) = key;
                    controller.qserv.add_replica(dst, *chunk, dbs).await;
                }
            }

            for outcome in outcomes {
                tracker.on_finish(outcome);
            }

            for chunk in &locked {
                controller.locker.release(chunk);
            }

            total_failed_locks += wave_failed_locks;
            if wave_failed_locks > 0 {
                planning_restarts += 1;
                continue;
            }
            break;
        }

        controller.locker.release_all(self.handle.id());
        let extended_state = if tracker.all_succeeded() { ExtendedState::Success } else { ExtendedState::Failed };
        let result = ReplicateResult {
            placements: total_placements,
            replicas_created: tracker.success(),
            failed_locks: total_failed_locks,
            planning_restarts,
        };
        self.handle.finish(extended_state, result.clone());
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use async_trait::async_trait;

    use crate::controller::{Controller, ControllerConfig, DatabaseService, DeleteRequest, QservNotifier, QservRemoveOutcome, WorkerClient};
    use crate::error::ReplicaResult;
    use crate::types::{Replica, ReplicaStatus};

    use super::*;

    struct FakeWorkers;
    #[async_trait]
    impl WorkerClient for FakeWorkers {
        async fn find_all_replicas(&self, worker: &str, _database: &str) -> ReplicaResult<Vec<Replica>> {
            if worker == "w1" {
                Ok(vec![Replica::new("db1", 1, "w1", ReplicaStatus::Complete)])
            } else {
                Ok(Vec::new())
            }
        }
        async fn replicate(&self, _req: &ReplicateRequest) -> ReplicaResult<()> {
            Ok(())
        }
        async fn delete(&self, _req: &DeleteRequest) -> ReplicaResult<()> {
            Ok(())
        }
        async fn stop(&self, _worker: &str, _label: &str) {}
    }

    struct FakeDb;
    impl DatabaseService for FakeDb {
        fn participating_databases(&self, _family: &str) -> Vec<String> {
            vec!["db1".into()]
        }
        fn replicas_at(&self, _chunk: u32, _worker: &str) -> Vec<String> {
            Vec::new()
        }
    }

    #[derive(Default)]
    struct FakeQserv {
        added: StdMutex<Vec<(String, u32, Vec<String>)>>,
    }
    #[async_trait]
    impl QservNotifier for FakeQserv {
        async fn add_replica(&self, worker: &str, chunk: u32, databases: &[String]) {
            self.added.lock().unwrap().push((worker.to_string(), chunk, databases.to_vec()));
        }
        async fn remove_replica(&self, _worker: &str, _chunk: u32, _force: bool) -> QservRemoveOutcome {
            QservRemoveOutcome::Success
        }
    }

    #[tokio::test]
    async fn replicates_to_reach_target_level() {
        let qserv = Arc::new(FakeQserv::default());
        let controller = Controller::new(
            Arc::new(FakeWorkers),
            Arc::new(FakeDb),
            qserv.clone(),
            ControllerConfig { enabled_workers: vec!["w1".into(), "w2".into(), "w3".into()], auto_notify: true },
        );
        let job = ReplicateJob::new("fam", vec!["db1".to_string()], 3, None);

        let result = job.run(&controller).await;

        assert_eq!(result.placements, 2);
        assert_eq!(result.replicas_created, 2);
        assert_eq!(job.handle.extended_state(), ExtendedState::Success);
        assert!(controller.locker.locked_by(job.handle.id()).is_empty());

        let added = qserv.added.lock().unwrap();
        assert_eq!(added.len(), 2);
        assert!(added.iter().all(|(_, chunk, dbs)| *chunk == 1 && dbs == &["db1".to_string()]));
    }
}
