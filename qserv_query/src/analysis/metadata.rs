//! Partitioning metadata lookups the analysis passes depend on.
//!
//! The catalog metadata service itself (CSS in the source) is out of
//! scope; callers supply an implementation of [`MetadataReader`], typically
//! backed by whatever configuration store or cache they maintain.

/// Partitioning parameters for one table, as looked up by (db, table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartTableParams {
    /// `(lonCol, latCol, subChunkCol)`, used by the spatial pass.
    pub part_cols: [String; 3],
    /// Columns in this table that carry a secondary index.
    pub sec_index_cols: Vec<String>,
    /// The column that is this table's family director key, if this table
    /// itself is a director. Empty if this table has no director column of
    /// its own (e.g. it is a child table whose director lives elsewhere).
    pub dir_col: String,
    /// `(db, table)` of the family's director table. Equal to this table's
    /// own `(db, table)` when this table *is* the director.
    pub dir_db: String,
    pub dir_table: String,
    pub is_chunked: bool,
}

pub trait MetadataReader: Send + Sync {
    fn is_known_db(&self, db: &str) -> bool;
    fn is_known_table(&self, db: &str, table: &str) -> bool;

    /// `None` means "not a partitioned table" — callers treat that as a
    /// reason to silently skip the table, not as an error.
    fn part_table_params(&self, db: &str, table: &str) -> Option<PartTableParams>;
}

#[cfg(test)]
pub mod test_support {
    use std::collections::HashMap;

    use super::{MetadataReader, PartTableParams};

    #[derive(Default)]
    pub struct StaticMetadata {
        pub tables: HashMap<(String, String), PartTableParams>,
    }

    impl StaticMetadata {
        pub fn with_table(mut self, db: &str, table: &str, params: PartTableParams) -> Self {
            self.tables.insert((db.to_string(), table.to_string()), params);
            self
        }
    }

    impl MetadataReader for StaticMetadata {
        fn is_known_db(&self, db: &str) -> bool {
            db.is_empty() || self.tables.keys().any(|(d, _)| d == db)
        }

        fn is_known_table(&self, db: &str, table: &str) -> bool {
            self.tables.contains_key(&(db.to_string(), table.to_string()))
                || (db.is_empty() && self.tables.keys().any(|(_, t)| t == table))
        }

        fn part_table_params(&self, db: &str, table: &str) -> Option<PartTableParams> {
            if let Some(p) = self.tables.get(&(db.to_string(), table.to_string())) {
                return Some(p.clone());
            }
            if db.is_empty() {
                return self.tables.iter().find(|((_, t), _)| t == table).map(|(_, p)| p.clone());
            }
            None
        }
    }
}
