//! Rewrites a parsed `SELECT` statement's WHERE clause against partitioning
//! metadata: spatial restrictor expansion ([`spatial`]) and secondary-index
//! restrictor discovery ([`secondary_index`]).
//!
//! Both passes run once, in that order, over the same statement; their
//! combined findings are returned as a [`QueryContext`] for the query
//! dispatcher the rest of this crate does not implement.

pub mod error;
pub mod metadata;
pub mod secondary_index;
pub mod spatial;

use observability_deps::tracing::debug;

use crate::ir::{FromList, SelectStmt};

pub use error::{AnalysisError, AnalysisResult};
pub use metadata::{MetadataReader, PartTableParams};

/// The taxonomy named in the restrictor-dispatch error policy: `Area`
/// restrictors come from the spatial pass, `SIndex`/`SIndexBetween` from
/// the secondary-index pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestrictorKind {
    Area,
    SIndex,
    SIndexBetween,
}

/// One restrictor handed to the query dispatcher, independent of how it
/// ended up rendered into the WHERE clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRestrictor {
    pub kind: RestrictorKind,
    pub params: Vec<String>,
}

/// Accumulates restrictors discovered by both analysis passes for
/// downstream query-plan dispatch. Dispatch happens once, after both passes
/// run — see [`analyze`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryContext {
    pub restrictors: Vec<DispatchRestrictor>,
}

/// Run the spatial and secondary-index passes over `stmt` in sequence,
/// mutating its WHERE clause in place, and return the restrictors collected
/// for dispatch.
pub fn analyze(stmt: &mut SelectStmt, metadata: &dyn MetadataReader) -> AnalysisResult<QueryContext> {
    let mut ctx = QueryContext::default();
    let Some(from_list) = stmt.from_list.as_ref() else {
        return Ok(ctx);
    };
    validate_from_list(from_list, metadata)?;

    if let Some(where_clause) = stmt.where_clause.as_mut() {
        spatial::expand(where_clause, from_list, metadata, &mut ctx)?;
        secondary_index::discover(where_clause, from_list, metadata, &mut ctx);
    }

    debug!(restrictors = ctx.restrictors.len(), "analysis passes complete");
    Ok(ctx)
}

fn validate_from_list(from_list: &FromList, metadata: &dyn MetadataReader) -> AnalysisResult<()> {
    for table in from_list.walk() {
        if !table.db.is_empty() && !metadata.is_known_db(&table.db) {
            return Err(AnalysisError::UnknownDatabase { db: table.db.clone() });
        }
        if !metadata.is_known_table(&table.db, &table.table) {
            return Err(AnalysisError::UnknownTable { db: table.db.clone(), table: table.table.clone() });
        }
    }
    Ok(())
}
