//! FindAll (§4.6): fires one `find_all_replicas` request per (enabled
//! worker × database) pair and folds the responses into a [`Disposition`].

use futures::future::join_all;
use observability_deps::tracing::warn;

use crate::controller::Controller;
use crate::types::{Disposition, ExtendedState};

use super::JobHandle;

/// One (worker, database) `find_all_replicas` call's outcome.
enum Outcome {
    Replicas { worker: String, database: String, replicas: Vec<crate::types::Replica> },
    WorkerFailed { worker: String },
}

pub struct FindAllJob {
    pub handle: JobHandle<Disposition>,
    family: String,
    databases: Vec<String>,
}

impl FindAllJob {
    pub fn new(family: impl Into<String>, databases: Vec<String>, parent_id: Option<crate::types::JobId>) -> Self {
        Self { handle: JobHandle::new(parent_id, 0), family: family.into(), databases }
    }

    /// Run to completion, recording the disposition on `self.handle` and
    /// returning it. The job is successful iff every launched request
    /// succeeded — a worker that fails to respond is recorded as
    /// `reported=false` rather than failing the job outright.
    pub async fn run(&self, controller: &Controller) -> Disposition {
        self.handle.mark_in_progress();

        let pairs = controller
            .config
            .enabled_workers
            .iter()
            .flat_map(|worker| self.databases.iter().map(move |db| (worker.clone(), db.clone())));

        let futures = pairs.map(|(worker, db)| {
            let workers = controller.workers.clone();
            async move {
                match workers.find_all_replicas(&worker, &db).await {
                    Ok(replicas) => Outcome::Replicas { worker, database: db, replicas },
                    Err(err) => {
                        warn!(worker, database = %db, %err, "find_all_replicas failed");
                        Outcome::WorkerFailed { worker }
                    }
                }
            }
        });

        let results = join_all(futures).await;

        let mut disposition = Disposition::default();
        for worker in &controller.config.enabled_workers {
            disposition.reported.entry(worker.clone()).or_insert(true);
        }

        let mut all_ok = true;
        for outcome in results {
            match outcome {
                Outcome::Replicas { worker: _, database: _, replicas } => {
                    for r in replicas {
                        disposition.replicas.entry(r.chunk).or_insert_with(Vec::new).push(r);
                    }
                }
                Outcome::WorkerFailed { worker } => {
                    all_ok = false;
                    disposition.reported.insert(worker, false);
                }
            }
        }

        let extended_state = if all_ok { ExtendedState::Success } else { ExtendedState::Failed };
        self.handle.finish(extended_state, disposition.clone());
        disposition
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use crate::controller::{Controller, ControllerConfig, DatabaseService, DeleteRequest, QservNotifier, QservRemoveOutcome, ReplicateRequest, WorkerClient};
    use crate::error::{ReplicaError, ReplicaResult};
    use crate::types::{Replica, ReplicaStatus};

    use super::*;

    struct FakeWorkers;

    #[async_trait]
    impl WorkerClient for FakeWorkers {
        async fn find_all_replicas(&self, worker: &str, database: &str) -> ReplicaResult<Vec<Replica>> {
            if worker == "w-down" {
                return Err(ReplicaError::RequestFailure { worker: worker.into(), reason: "timeout".into() });
            }
            Ok(vec![Replica::new(database, 1, worker, ReplicaStatus::Complete)])
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

    struct FakeQserv;
    #[async_trait]
    impl QservNotifier for FakeQserv {
        async fn add_replica(&self, _worker: &str, _chunk: u32, _databases: &[String]) {}
        async fn remove_replica(&self, _worker: &str, _chunk: u32, _force: bool) -> QservRemoveOutcome {
            QservRemoveOutcome::Success
        }
    }

    fn controller(workers: Vec<&str>) -> Controller {
        Controller::new(
            Arc::new(FakeWorkers),
            Arc::new(FakeDb),
            Arc::new(FakeQserv),
            ControllerConfig { enabled_workers: workers.into_iter().map(String::from).collect(), auto_notify: true },
        )
    }

    #[tokio::test]
    async fn a_down_worker_is_marked_unreported_not_job_failure() {
        let controller = controller(vec!["w1", "w-down"]);
        let job = FindAllJob::new("family", vec!["db1".to_string()], None);

        let disposition = job.run(&controller).await;

        assert_eq!(disposition.reported.get("w1"), Some(&true));
        assert_eq!(disposition.reported.get("w-down"), Some(&false));
        assert!(disposition.is_good(1, "w1"));
        assert_eq!(job.handle.extended_state(), ExtendedState::Failed);
    }

    #[tokio::test]
    async fn all_workers_responding_is_success() {
        let controller = controller(vec!["w1", "w2"]);
        let job = FindAllJob::new("family", vec!["db1".to_string()], None);

        job.run(&controller).await;

        assert_eq!(job.handle.extended_state(), ExtendedState::Success);
    }
}
