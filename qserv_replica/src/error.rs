//! The Core B error kinds from the error-handling design: config errors at
//! job start, RPC/tracker failures, Qserv-side delete-path outcomes, and
//! lock contention during planning.

use snafu::Snafu;

#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum ReplicaError {
    #[snafu(display("job configuration error: {reason}"))]
    ConfigError { reason: String },

    #[snafu(display("request to worker '{worker}' failed: {reason}"))]
    RequestFailure { worker: String, reason: String },

    #[snafu(display("chunk {chunk} of family '{family}' is reported in use by Qserv"))]
    QservChunkInUse { family: String, chunk: u32 },

    #[snafu(display("Qserv notification failed: {reason}"))]
    QservFailure { reason: String },

    #[snafu(display("could not lock chunk {chunk} of family '{family}': held by {holder}"))]
    LockContention { family: String, chunk: u32, holder: String },
}

pub type ReplicaResult<T> = Result<T, ReplicaError>;
