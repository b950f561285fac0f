//! The typed, serializable query intermediate representation.
//!
//! IR nodes are constructed during parsing, possibly mutated in place by
//! the analysis passes in [`crate::analysis`] (which may prepend or replace
//! sub-trees), and finally rendered back to SQL by [`crate::render`]. They
//! are never shared across queries: each query owns its own tree.

pub mod bool_term;
pub mod column_ref;
pub mod select;
pub mod table_ref;
pub mod value_expr;
pub mod where_clause;

pub use bool_term::{
    BetweenPredicate, BoolFactor, BoolFactorTerm, BoolTerm, CompOp, CompPredicate, InPredicate,
    LikePredicate, NullPredicate,
};
pub use column_ref::ColumnRef;
pub use select::{
    CallStmt, FromList, GroupByClause, HavingClause, OrderByClause, OrderByTerm, OrderDirection,
    SelectList, SelectStmt, SetGlobalStmt, Statement, LIMIT_UNSET,
};
pub use table_ref::{JoinKind, JoinRef, JoinSpec, TableRef};
pub use value_expr::{FuncExpr, Op, ValueExpr, ValueFactor, AGGREGATE_NAMES};
pub use where_clause::{AreaRestrictor, WhereClause};
