//! Rebalance (§4.10): computes a `chunk -> src -> dst` move plan that levels
//! worker occupancy toward the family average, then (outside estimate mode)
//! executes it as a batch of create-then-purge moves, each one a
//! `CreateReplicaJob` followed by a `DeleteReplicaJob` so the usual
//! Qserv-notification ordering invariants apply to every move.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::controller::Controller;
use crate::tracker::{RequestTracker, TrackedRequest};
use crate::types::{Chunk, ExtendedState, JobId, RequestExtendedState, OVERFLOW_CHUNK};

use super::batch::run_with_admission;
use super::create_delete::{CreateReplicaJob, DeleteReplicaJob};
use super::find_all::FindAllJob;
use super::JobHandle;

const INITIAL_BATCH: usize = 8;

/// One planned move: `chunk` currently good on `src`, to be created on `dst`
/// and then purged from `src`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub chunk: u32,
    pub src: String,
    pub dst: String,
}

struct TrackedMove {
    mv: PlannedMove,
    state: RequestExtendedState,
}

impl TrackedRequest for TrackedMove {
    fn extended_state(&self) -> RequestExtendedState {
        self.state
    }

    fn describe(&self) -> String {
        format!("move chunk {} {} -> {}", self.mv.chunk, self.mv.src, self.mv.dst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RebalanceResult {
    pub average: usize,
    pub plan: Vec<PlannedMove>,
    pub moves_completed: u64,
    pub failed_locks: u64,
}

pub struct RebalanceJob {
    pub handle: JobHandle<RebalanceResult>,
    family: String,
    databases: Vec<String>,
    estimate_only: bool,
}

impl RebalanceJob {
    pub fn new(family: impl Into<String>, databases: Vec<String>, estimate_only: bool, parent_id: Option<JobId>) -> Self {
        Self { handle: JobHandle::new(parent_id, 0), family: family.into(), databases, estimate_only }
    }

    /// Greedy planner: sources (above average) walked in descending order of
    /// current good-chunk count, each over-count chunk assigned to whichever
    /// eligible destination (below average, not already holding the chunk)
    /// currently holds the fewest good chunks. Never moves more out of a
    /// source than `count(src) - average`.
    fn plan(&self, disposition: &crate::types::Disposition) -> (usize, Vec<PlannedMove>) {
        let workers = disposition.workers();
        if workers.is_empty() {
            return (0, Vec::new());
        }
        let mut counts: HashMap<String, i64> = workers.iter().map(|w| (w.clone(), disposition.good_chunk_count(w) as i64)).collect();
        let total: i64 = counts.values().sum();
        let average = (total / workers.len() as i64).max(0);

        let mut sources: Vec<String> = workers.iter().filter(|w| counts[*w] > average).cloned().collect();
        sources.sort_by_key(|w| std::cmp::Reverse(counts[w]));

        let mut plan = Vec::new();
        for src in &sources {
            let mut quota = counts[src] - average;
            if quota <= 0 {
                continue;
            }
            let mut chunks: Vec<u32> = disposition.chunks().into_iter().filter(|&c| c != OVERFLOW_CHUNK && disposition.is_good(c, src)).collect();
            chunks.sort_by_key(|&c| std::cmp::Reverse(c));

            for chunk in chunks {
                if quota <= 0 {
                    break;
                }
                let holders = disposition.workers_holding(chunk);
                let dst = workers
                    .iter()
                    .filter(|w| *w != src && !holders.contains(*w) && counts[*w] < average)
                    .min_by_key(|w| counts[*w])
                    .cloned();
                let Some(dst) = dst else { continue };

                plan.push(PlannedMove { chunk, src: src.clone(), dst: dst.clone() });
                *counts.get_mut(&dst).unwrap() += 1;
                *counts.get_mut(src).unwrap() -= 1;
                quota -= 1;
            }
        }

        (average.max(0) as usize, plan)
    }

    pub async fn run(&self, controller: &Controller) -> RebalanceResult {
        self.handle.mark_in_progress();

        let find_all = FindAllJob::new(self.family.clone(), self.databases.clone(), Some(self.handle.id()));
        let disposition = find_all.run(controller).await;
        let (average, plan) = self.plan(&disposition);

        if self.estimate_only {
            let result = RebalanceResult { average, plan: plan.clone(), moves_completed: 0, failed_locks: 0 };
            self.handle.finish(ExtendedState::Success, result.clone());
            return result;
        }

        let mut tracker: RequestTracker<TrackedMove> = RequestTracker::new();
        let mut locked = Vec::new();
        let mut failed_locks = 0u64;
        let mut admissible = Vec::new();

        for mv in plan.clone() {
            let key = Chunk::new(&self.family, mv.chunk);
            if !controller.locker.try_lock(&key, self.handle.id()) {
                failed_locks += 1;
                continue;
            }
            locked.push(key);
            admissible.push(mv);
        }

        for mv in &admissible {
            tracker.add(&TrackedMove { mv: mv.clone(), state: RequestExtendedState::None });
        }

        let active: Arc<Mutex<HashMap<String, usize>>> = Arc::new(Mutex::new(HashMap::new()));
        let controller_for_move = controller.clone();
        let family = self.family.clone();
        let parent_id = Some(self.handle.id());
        let outcomes = run_with_admission(
            admissible,
            INITIAL_BATCH,
            |backlog| {
                let active = active.lock();
                let idx = (0..backlog.len())
                    .min_by_key(|&i| {
                        let mv: &PlannedMove = &backlog[i];
                        active.get(&mv.dst).copied().unwrap_or(0) + active.get(&mv.src).copied().unwrap_or(0)
                    })
                    .unwrap();
                drop(active);
                backlog.remove(idx)
            },
            move |mv: PlannedMove| {
                let controller = controller_for_move.clone();
                let active = active.clone();
                let family = family.clone();
                async move {
                    *active.lock().entry(mv.dst.clone()).or_insert(0) += 1;
                    *active.lock().entry(mv.src.clone()).or_insert(0) += 1;

                    // A move is a create-then-purge pair: the create half
                    // notifies Qserv only on full success, the delete half
                    // gates on Qserv's in-use check before touching the
                    // worker, exactly as a standalone Create/DeleteReplica
                    // job pair would.
                    let create = CreateReplicaJob::new(family.clone(), mv.chunk, mv.src.clone(), mv.dst.clone(), parent_id);
                    let create_ok = create.run(&controller).await.is_ok() && create.handle.extended_state() == ExtendedState::Success;
                    let ok = create_ok && {
                        let delete =
                            DeleteReplicaJob::new(family.clone(), mv.chunk, mv.src.clone(), controller.config.auto_notify, parent_id);
                        let _ = delete.run(&controller).await;
                        delete.handle.extended_state() == ExtendedState::Success
                    };

                    *active.lock().get_mut(&mv.dst).unwrap() -= 1;
                    *active.lock().get_mut(&mv.src).unwrap() -= 1;
                    TrackedMove { mv, state: if ok { RequestExtendedState::Success } else { RequestExtendedState::Failed } }
                }
            },
        )
        .await;
        for outcome in outcomes {
            tracker.on_finish(outcome);
        }

        for chunk in &locked {
            controller.locker.release(chunk);
        }
        controller.locker.release_all(self.handle.id());

        let extended_state = if tracker.all_succeeded() { ExtendedState::Success } else { ExtendedState::Failed };
        let result = RebalanceResult { average, plan, moves_completed: tracker.success(), failed_locks };
        self.handle.finish(extended_state, result.clone());
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{atomic::{AtomicUsize, Ordering}, Arc};

    use async_trait::async_trait;

    use crate::controller::{
        Controller, ControllerConfig, DatabaseService, DeleteRequest, QservNotifier, QservRemoveOutcome, ReplicateRequest, WorkerClient,
    };
    use crate::error::ReplicaResult;
    use crate::types::{Replica, ReplicaStatus};

    use super::*;

    struct FakeWorkers;
    #[async_trait]
    impl WorkerClient for FakeWorkers {
        async fn find_all_replicas(&self, worker: &str, _database: &str) -> ReplicaResult<Vec<Replica>> {
            // worker0 holds 9 good chunks, worker1 holds 6, worker2 holds 3.
            let count = match worker {
                "w0" => 9,
                "w1" => 6,
                "w2" => 3,
                _ => 0,
            };
            Ok((0..count).map(|i| Replica::new("db1", i, worker, ReplicaStatus::Complete)).collect())
        }
        async fn replicate(&self, _req: &ReplicateRequest) -> ReplicaResult<()> {
            Ok(())
        }
        async fn delete(&self, _req: &DeleteRequest) -> ReplicaResult<()> {
            Ok(())
        }
        async fn stop(&self, _worker: &str, _label: &str) {}
    }

    /// Mirrors `FakeWorkers`' chunk ownership: a chunk id below a worker's
    /// count is already replicated there, matching the replicas `FindAllJob`
    /// discovers through `FakeWorkers::find_all_replicas`.
    struct FakeDb;
    impl DatabaseService for FakeDb {
        fn participating_databases(&self, _family: &str) -> Vec<String> {
            vec!["db1".into()]
        }
        fn replicas_at(&self, chunk: u32, worker: &str) -> Vec<String> {
            let count = match worker {
                "w0" => 9,
                "w1" => 6,
                "w2" => 3,
                _ => 0,
            };
            if chunk < count {
                vec!["db1".into()]
            } else {
                Vec::new()
            }
        }
    }

    #[derive(Default)]
    struct FakeQserv {
        adds: AtomicUsize,
        removes: AtomicUsize,
        chunk_in_use: bool,
    }
    #[async_trait]
    impl QservNotifier for FakeQserv {
        async fn add_replica(&self, _worker: &str, _chunk: u32, _databases: &[String]) {
            self.adds.fetch_add(1, Ordering::SeqCst);
        }
        async fn remove_replica(&self, _worker: &str, _chunk: u32, _force: bool) -> QservRemoveOutcome {
            self.removes.fetch_add(1, Ordering::SeqCst);
            if self.chunk_in_use {
                QservRemoveOutcome::ChunkInUse
            } else {
                QservRemoveOutcome::Success
            }
        }
    }

    fn controller_with(qserv: Arc<FakeQserv>) -> Controller {
        Controller::new(
            Arc::new(FakeWorkers),
            Arc::new(FakeDb),
            qserv,
            ControllerConfig { enabled_workers: vec!["w0".into(), "w1".into(), "w2".into()], auto_notify: true },
        )
    }

    fn controller() -> Controller {
        controller_with(Arc::new(FakeQserv::default()))
    }

    #[tokio::test]
    async fn estimate_mode_plans_but_launches_nothing() {
        let controller = controller();
        let job = RebalanceJob::new("fam", vec!["db1".to_string()], true, None);

        let result = job.run(&controller).await;

        assert_eq!(result.average, 6);
        assert_eq!(result.plan.len(), 3);
        assert!(result.plan.iter().all(|mv| mv.src == "w0" && mv.dst == "w2"));
        assert_eq!(result.moves_completed, 0);
        assert!(controller.locker.locked_by(job.handle.id()).is_empty());
    }

    #[tokio::test]
    async fn plan_never_sends_a_chunk_to_a_worker_already_holding_it() {
        let controller = controller();
        let job = RebalanceJob::new("fam", vec!["db1".to_string()], true, None);
        let result = job.run(&controller).await;

        for mv in &result.plan {
            assert_ne!(mv.src, mv.dst);
        }
    }

    #[tokio::test]
    async fn plan_respects_the_average_quota_per_source() {
        let controller = controller();
        let job = RebalanceJob::new("fam", vec!["db1".to_string()], true, None);
        let result = job.run(&controller).await;

        let moved_from_w0 = result.plan.iter().filter(|mv| mv.src == "w0").count();
        assert_eq!(moved_from_w0, 9 - result.average);
    }

    #[tokio::test]
    async fn executing_mode_completes_the_planned_moves() {
        let qserv = Arc::new(FakeQserv::default());
        let controller = controller_with(qserv.clone());
        let job = RebalanceJob::new("fam", vec!["db1".to_string()], false, None);

        let result = job.run(&controller).await;

        assert_eq!(result.moves_completed, result.plan.len() as u64);
        assert_eq!(job.handle.extended_state(), ExtendedState::Success);
        assert!(controller.locker.locked_by(job.handle.id()).is_empty());

        // Each completed move is a create-then-purge pair: one `add_replica`
        // (from the create half) and one `remove_replica` gate check (from
        // the delete half) per move.
        let moves = result.plan.len();
        assert_eq!(qserv.adds.load(Ordering::SeqCst), moves);
        assert_eq!(qserv.removes.load(Ordering::SeqCst), moves);
    }

    #[tokio::test]
    async fn a_move_skips_the_worker_delete_when_qserv_reports_the_chunk_in_use() {
        let qserv = Arc::new(FakeQserv { chunk_in_use: true, ..Default::default() });
        let controller = controller_with(qserv.clone());
        let job = RebalanceJob::new("fam", vec!["db1".to_string()], false, None);

        let result = job.run(&controller).await;

        // The create half still succeeds and notifies; the purge half is
        // gated off by the in-use check, so the move as a whole does not
        // count as completed.
        assert_eq!(result.moves_completed, 0);
        assert!(qserv.adds.load(Ordering::SeqCst) > 0);
        assert_eq!(job.handle.extended_state(), ExtendedState::Failed);
    }
}
