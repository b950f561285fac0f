//! A generic per-job aggregator over leaf request outcomes. Every job type
//! in [`crate::job`] owns one [`RequestTracker`] and consults it to decide
//! when planning is done: all requests it launched have finished.

use std::fmt;

use observability_deps::tracing::{info, warn};

use crate::types::RequestExtendedState;

/// What a tracker needs to know about a leaf request to aggregate it. Leaf
/// request types (`ReplicateRequest`, `DeleteRequest`, …) implement this
/// directly; [`AnyRequestTracker`] tracks `Box<dyn TrackedRequest>` so one
/// job (Rebalance) can track create- and delete-requests side by side.
pub trait TrackedRequest: fmt::Debug + Send + Sync {
    fn extended_state(&self) -> RequestExtendedState;

    /// A short label for post-mortem printouts, e.g. `"replicate chunk 7 db
    /// Object -> worker-3"`.
    fn describe(&self) -> String;
}

impl TrackedRequest for Box<dyn TrackedRequest> {
    fn extended_state(&self) -> RequestExtendedState {
        (**self).extended_state()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Type-erased tracker for jobs that launch more than one kind of leaf
/// request.
pub type AnyRequestTracker = RequestTracker<Box<dyn TrackedRequest>>;

/// Monotonic counters `{launched, finished, success}` plus the failed
/// requests seen so far, kept for the optional post-mortem printout.
#[derive(Debug)]
pub struct RequestTracker<R> {
    launched: u64,
    finished: u64,
    success: u64,
    failures: Vec<R>,
}

impl<R> Default for RequestTracker<R> {
    fn default() -> Self {
        Self { launched: 0, finished: 0, success: 0, failures: Vec::new() }
    }
}

impl<R: TrackedRequest> RequestTracker<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a leaf request was launched. Call this before the
    /// request is dispatched, not after it returns, so `launched` always
    /// reflects requests that may still be in flight.
    pub fn add(&mut self, _req: &R) {
        self.launched += 1;
    }

    /// Record a leaf request's completion.
    pub fn on_finish(&mut self, req: R) {
        self.finished += 1;
        match req.extended_state() {
            RequestExtendedState::Success => self.success += 1,
            _ => {
                warn!(request = %req.describe(), "leaf request failed");
                self.failures.push(req);
            }
        }
    }

    pub fn launched(&self) -> u64 {
        self.launched
    }

    pub fn finished(&self) -> u64 {
        self.finished
    }

    pub fn success(&self) -> u64 {
        self.success
    }

    /// `true` once every launched request has finished.
    pub fn is_complete(&self) -> bool {
        self.finished == self.launched
    }

    /// The job is successful iff every launched request succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.is_complete() && self.success == self.launched
    }

    pub fn failures(&self) -> &[R] {
        &self.failures
    }

    /// Periodic progress line, suitable for a job driver loop to call on a
    /// timer while requests are in flight.
    pub fn log_progress(&self, job_label: &str) {
        info!(job = job_label, launched = self.launched, finished = self.finished, success = self.success, "progress");
    }

    /// Prepare the tracker for a fresh planning wave. Only valid once every
    /// previously launched request has finished — calling it mid-flight is
    /// a bug in the job driver, not a recoverable condition.
    pub fn reset(&mut self) {
        assert_eq!(self.finished, self.launched, "RequestTracker::reset called with requests still in flight");
        self.launched = 0;
        self.finished = 0;
        self.success = 0;
        self.failures.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FakeRequest {
        ok: bool,
    }

    impl TrackedRequest for FakeRequest {
        fn extended_state(&self) -> RequestExtendedState {
            if self.ok {
                RequestExtendedState::Success
            } else {
                RequestExtendedState::Failed
            }
        }

        fn describe(&self) -> String {
            format!("fake(ok={})", self.ok)
        }
    }

    #[test]
    fn accounting_holds_launched_ge_finished_ge_success() {
        let mut t = RequestTracker::new();
        let a = FakeRequest { ok: true };
        let b = FakeRequest { ok: false };
        t.add(&a);
        t.add(&b);
        assert_eq!((t.launched(), t.finished(), t.success()), (2, 0, 0));

        t.on_finish(a);
        assert_eq!((t.launched(), t.finished(), t.success()), (2, 1, 1));
        assert!(!t.all_succeeded());

        t.on_finish(b);
        assert_eq!((t.launched(), t.finished(), t.success()), (2, 2, 1));
        assert!(t.is_complete());
        assert!(!t.all_succeeded());
        assert_eq!(t.failures().len(), 1);
    }

    #[test]
    fn all_succeeded_requires_full_completion() {
        let mut t = RequestTracker::new();
        let a = FakeRequest { ok: true };
        t.add(&a);
        t.on_finish(a);
        assert!(t.all_succeeded());
    }

    #[test]
    #[should_panic(expected = "reset called with requests still in flight")]
    fn reset_is_fatal_when_requests_are_pending() {
        let mut t = RequestTracker::new();
        let a = FakeRequest { ok: true };
        t.add(&a);
        t.reset();
    }

    #[test]
    fn type_erased_tracker_accepts_heterogeneous_requests() {
        let mut t: AnyRequestTracker = RequestTracker::new();
        let create: Box<dyn TrackedRequest> = Box::new(FakeRequest { ok: true });
        let delete: Box<dyn TrackedRequest> = Box::new(FakeRequest { ok: true });
        t.add(&create);
        t.add(&delete);
        t.on_finish(create);
        t.on_finish(delete);
        assert!(t.all_succeeded());
    }
}
