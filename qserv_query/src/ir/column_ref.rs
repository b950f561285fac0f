use serde::{Deserialize, Serialize};
use std::fmt;

/// A reference to a column, optionally qualified by database and table.
///
/// Any of `db` or `table` may be empty, in which case the qualifier is
/// omitted when the reference is rendered back to SQL. Equality ignores
/// empty prefixes: `ColumnRef::new("", "", "x")` compares equal to any
/// `ColumnRef` whose `column` is `"x"`, regardless of `db`/`table`, as long
/// as the non-empty qualifiers (if any) agree. This mirrors how the query
/// planner resolves a bare column name against whatever table it turns out
/// to belong to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnRef {
    pub db: String,
    pub table: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(db: impl Into<String>, table: impl Into<String>, column: impl Into<String>) -> Self {
        Self { db: db.into(), table: table.into(), column: column.into() }
    }

    pub fn bare(column: impl Into<String>) -> Self {
        Self::new("", "", column)
    }

    pub fn is_qualified(&self) -> bool {
        !self.db.is_empty() || !self.table.is_empty()
    }
}

/// Equality ignores empty prefixes, per the identity rule in the data model:
/// a field that is empty on either side is treated as "unconstrained" rather
/// than "the empty string", so `db.t.c` equals `t.c` equals `c`.
impl PartialEq for ColumnRef {
    fn eq(&self, other: &Self) -> bool {
        fn fields_eq(a: &str, b: &str) -> bool {
            a.is_empty() || b.is_empty() || a == b
        }
        self.column == other.column && fields_eq(&self.db, &other.db) && fields_eq(&self.table, &other.table)
    }
}

impl Eq for ColumnRef {}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.db.is_empty() {
            write!(f, "{}.", self.db)?;
        }
        if !self.table.is_empty() {
            write!(f, "{}.", self.table)?;
        }
        write!(f, "{}", self.column)
    }
}
