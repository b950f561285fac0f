//! A process-wide `(family, chunk) -> JobId` mapping. The only mutable
//! process-wide object this crate defines — pass it down as a handle (see
//! [`crate::controller::Controller`]), never reach for a singleton.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::types::{Chunk, JobId};

/// Advisory mutual exclusion over chunks: nothing stops a caller from
/// mutating a chunk without holding its lock, but no two jobs may hold the
/// same chunk's lock concurrently.
#[derive(Debug, Default)]
pub struct ChunkLocker {
    held: Mutex<HashMap<Chunk, JobId>>,
}

impl ChunkLocker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire `chunk` for `job`. Returns `false` without side effects if
    /// another job already holds it; re-locking a chunk already held by
    /// `job` itself succeeds (idempotent).
    pub fn try_lock(&self, chunk: &Chunk, job: JobId) -> bool {
        let mut held = self.held.lock();
        match held.get(chunk) {
            Some(&holder) if holder != job => false,
            _ => {
                held.insert(chunk.clone(), job);
                true
            }
        }
    }

    /// Release one chunk, if held.
    pub fn release(&self, chunk: &Chunk) {
        self.held.lock().remove(chunk);
    }

    /// Release every chunk held by `job`. Called on job termination
    /// (success, failure or cancellation) so a job's locks never outlive
    /// it — the RAII discipline the source expresses via the JobId's
    /// destructor.
    pub fn release_all(&self, job: JobId) {
        self.held.lock().retain(|_, holder| *holder != job);
    }

    /// Snapshot of every chunk currently held by `job`.
    pub fn locked_by(&self, job: JobId) -> Vec<Chunk> {
        self.held.lock().iter().filter(|(_, &holder)| holder == job).map(|(chunk, _)| chunk.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_locker_is_rejected_until_release() {
        let locker = ChunkLocker::new();
        let chunk = Chunk::new("f", 7);
        let a = JobId::new();
        let b = JobId::new();

        assert!(locker.try_lock(&chunk, a));
        assert!(!locker.try_lock(&chunk, b));

        locker.release(&chunk);
        assert!(locker.try_lock(&chunk, b));
    }

    #[test]
    fn relocking_by_the_same_job_succeeds() {
        let locker = ChunkLocker::new();
        let chunk = Chunk::new("f", 1);
        let a = JobId::new();
        assert!(locker.try_lock(&chunk, a));
        assert!(locker.try_lock(&chunk, a));
    }

    #[test]
    fn release_all_frees_every_chunk_held_by_a_job() {
        let locker = ChunkLocker::new();
        let a = JobId::new();
        let b = JobId::new();
        let c1 = Chunk::new("f", 1);
        let c2 = Chunk::new("f", 2);
        locker.try_lock(&c1, a);
        locker.try_lock(&c2, a);

        locker.release_all(a);

        assert!(locker.locked_by(a).is_empty());
        assert!(locker.try_lock(&c1, b));
        assert!(locker.try_lock(&c2, b));
    }
}
