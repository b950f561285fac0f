//! Replica orchestration: chunk locking, request tracking, the Controller
//! facade and the FindAll/Create/Delete/FixUp/Replicate/Rebalance job family
//! that keep a Qserv worker fleet's chunk replicas at their configured
//! replication level and colocated across databases.

pub mod controller;
pub mod error;
pub mod job;
pub mod locker;
pub mod qserv;
pub mod tracker;
pub mod types;

pub use controller::{Controller, ControllerConfig};
pub use error::{ReplicaError, ReplicaResult};
pub use types::{Chunk, Disposition, JobId, Replica, ReplicaStatus};
