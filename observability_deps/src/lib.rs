//! A crate containing our logging and tracing utilities
//!
//! These utilities are kept in their own crate both for easier
//! reuse in other projects as well as to avoid churn in other
//! crates that depend on this one simply because a tracing version
//! was bumped.
//!
//! This crate started as a straight re-export of the `tracing`
//! crate's API so that the rest of the workspace has one place to
//! pin a version from.

pub use tracing;
