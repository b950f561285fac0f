use serde::{Deserialize, Serialize};

use super::table_ref::TableRef;
use super::value_expr::ValueExpr;
use super::where_clause::WhereClause;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SelectList {
    pub items: Vec<ValueExpr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FromList {
    pub tables: Vec<TableRef>,
}

impl FromList {
    /// Depth-first walk of every table reference in the FROM list,
    /// following joins, in clause order.
    pub fn walk(&self) -> impl Iterator<Item = &TableRef> {
        self.tables.iter().flat_map(|t| t.walk())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupByClause {
    pub items: Vec<ValueExpr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HavingClause {
    pub condition: super::bool_term::BoolTerm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderByTerm {
    pub expr: ValueExpr,
    pub direction: Option<OrderDirection>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderByClause {
    pub terms: Vec<OrderByTerm>,
}

/// `<0` means "unset" (no `LIMIT` clause was present), matching the
/// source's convention of using a sentinel rather than `Option<u64>` so the
/// renderer can tell "no limit" from "`LIMIT 0`" using one field.
pub const LIMIT_UNSET: i64 = -1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectStmt {
    pub select_list: SelectList,
    pub from_list: Option<FromList>,
    pub where_clause: Option<WhereClause>,
    pub group_by: Option<GroupByClause>,
    pub having: Option<HavingClause>,
    pub order_by: Option<OrderByClause>,
    pub distinct: bool,
    pub limit: i64,
}

impl Default for SelectStmt {
    fn default() -> Self {
        Self {
            select_list: SelectList::default(),
            from_list: None,
            where_clause: None,
            group_by: None,
            having: None,
            order_by: None,
            distinct: false,
            limit: LIMIT_UNSET,
        }
    }
}

impl SelectStmt {
    pub fn has_limit(&self) -> bool {
        self.limit >= 0
    }
}

/// `CALL QSERV_MANAGER('<string>')`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallStmt {
    pub constant: String,
}

/// `SET GLOBAL <name> = <literal>`; `var_value` is the literal's source
/// text (always string-typed per the grammar rule this adapter accepts —
/// boolean literals are rejected before this type is constructed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetGlobalStmt {
    pub var_name: String,
    pub var_value: String,
}

/// The root of a parsed statement: either a `SELECT`-family query or one of
/// the two administrative forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    Select(SelectStmt),
    Call(CallStmt),
    SetGlobal(SetGlobalStmt),
}
