//! Job plumbing shared by every job kind: id/parent/priority/state
//! bookkeeping, idempotent cancellation and a typed result accessor valid
//! only once the job reaches FINISHED.
//!
//! Each job kind (`find_all`, `create_delete`, `fixup`, `replicate`,
//! `rebalance`) drives its own planning loop against a [`JobHandle`]; the
//! handle itself knows nothing about replication, only about the state
//! machine every job shares.

pub mod batch;
pub mod create_delete;
pub mod find_all;
pub mod fixup;
pub mod rebalance;
pub mod replicate;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::types::{ExtendedState, JobId, JobState};

/// Shared state/result bookkeeping for one job instance. A job driver holds
/// an `Arc<JobHandle<T>>`, mutates it as its planning pass progresses, and
/// calls [`JobHandle::finish`] exactly once the terminal state is reached.
pub struct JobHandle<T> {
    id: JobId,
    parent_id: Option<JobId>,
    priority: i32,
    state_tx: watch::Sender<JobState>,
    extended_state: Mutex<ExtendedState>,
    result: Mutex<Option<T>>,
    finished_once: Mutex<bool>,
    cancel: CancellationToken,
}

impl<T> JobHandle<T> {
    pub fn new(parent_id: Option<JobId>, priority: i32) -> Self {
        let (state_tx, _) = watch::channel(JobState::Created);
        Self {
            id: JobId::new(),
            parent_id,
            priority,
            state_tx,
            extended_state: Mutex::new(ExtendedState::None),
            result: Mutex::new(None),
            finished_once: Mutex::new(false),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn parent_id(&self) -> Option<JobId> {
        self.parent_id
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn state(&self) -> JobState {
        *self.state_tx.borrow()
    }

    pub fn extended_state(&self) -> ExtendedState {
        *self.extended_state.lock()
    }

    /// Move the job from CREATED to IN_PROGRESS. A no-op if already past
    /// CREATED (starting an already-started job is not an error).
    pub fn mark_in_progress(&self) {
        if *self.state_tx.borrow() == JobState::Created {
            let _ = self.state_tx.send(JobState::InProgress);
        }
    }

    /// Request cancellation. Idempotent — safe to call any number of times,
    /// from any thread, at any point in the job's lifecycle.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Transition to FINISHED and record the result. Idempotent: a second
    /// call (e.g. a cancelled job's driver racing its own completion path)
    /// is a no-op, guaranteeing the on-finish transition — and whatever
    /// callback a caller hangs off `wait()` — happens exactly once.
    pub fn finish(&self, extended_state: ExtendedState, result: T) {
        let mut fired = self.finished_once.lock();
        if *fired {
            return;
        }
        *fired = true;
        *self.extended_state.lock() = extended_state;
        *self.result.lock() = Some(result);
        let _ = self.state_tx.send(JobState::Finished);
    }

    /// Block until the job reaches FINISHED.
    pub async fn wait(&self) {
        let mut rx = self.state_tx.subscribe();
        while *rx.borrow() != JobState::Finished {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// The job's typed result. Valid only after FINISHED.
    pub fn result(&self) -> T
    where
        T: Clone,
    {
        assert_eq!(self.state(), JobState::Finished, "job result accessed before FINISHED");
        self.result.lock().clone().expect("a FINISHED job always has a result")
    }
}
