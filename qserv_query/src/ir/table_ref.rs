use serde::{Deserialize, Serialize};

use super::bool_term::BoolTerm;
use super::column_ref::ColumnRef;

/// `db.table [AS alias]` plus any number of trailing joins, forming a
/// left-linear list: `FROM a JOIN b JOIN c` is one `TableRef` for `a` whose
/// `joins` are `[JoinRef(b), JoinRef(c)]`, not a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub db: String,
    pub table: String,
    pub alias: String,
    pub joins: Vec<JoinRef>,
}

impl TableRef {
    pub fn new(db: impl Into<String>, table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self { db: db.into(), table: table.into(), alias: alias.into(), joins: Vec::new() }
    }

    /// The name a qualified reference to this table should carry in
    /// generated SQL and in restrictor lookups: the alias if one was given,
    /// otherwise the bare table name.
    pub fn effective_alias(&self) -> &str {
        if self.alias.is_empty() {
            &self.table
        } else {
            &self.alias
        }
    }

    /// Depth-first walk of this table reference and everything reachable
    /// through its `joins`, in FROM-clause order.
    pub fn walk(&self) -> TableRefWalk<'_> {
        TableRefWalk { stack: vec![self] }
    }
}

pub struct TableRefWalk<'a> {
    stack: Vec<&'a TableRef>,
}

impl<'a> Iterator for TableRefWalk<'a> {
    type Item = &'a TableRef;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        for j in next.joins.iter().rev() {
            self.stack.push(&j.right);
        }
        Some(next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinKind {
    Default,
    Inner,
    Left,
    Right,
    Full,
    Cross,
    Union,
}

/// `JOIN <right> [USING(col) | ON <pred>]`.
///
/// Invariant: a natural join carries no [`JoinSpec`] (`spec` is `None`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRef {
    pub right: Box<TableRef>,
    pub kind: JoinKind,
    pub natural: bool,
    pub spec: Option<JoinSpec>,
}

impl JoinRef {
    pub fn new(right: TableRef, kind: JoinKind, natural: bool, spec: Option<JoinSpec>) -> Self {
        debug_assert!(!(natural && spec.is_some()), "a natural join must carry no spec");
        Self { right: Box::new(right), kind, natural, spec }
    }
}

/// Exactly one of `using` or `on` is set for a non-natural join that
/// specifies one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinSpec {
    pub using: Option<Vec<ColumnRef>>,
    pub on: Option<Box<BoolTerm>>,
}

impl JoinSpec {
    pub fn using(columns: Vec<ColumnRef>) -> Self {
        Self { using: Some(columns), on: None }
    }

    pub fn on(pred: BoolTerm) -> Self {
        Self { using: None, on: Some(Box::new(pred)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_visits_left_linear_chain_in_order() {
        let c = TableRef::new("", "C", "c");
        let mut b = TableRef::new("", "B", "b");
        b.joins.push(JoinRef::new(c, JoinKind::Inner, false, None));
        let mut a = TableRef::new("", "A", "a");
        a.joins.push(JoinRef::new(b, JoinKind::Default, false, None));

        let names: Vec<&str> = a.walk().map(|t| t.table.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }
}
