use snafu::Snafu;

#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[snafu(display("unknown database '{db}' referenced in FROM clause"))]
    UnknownDatabase { db: String },

    #[snafu(display("unknown table '{db}.{table}' referenced in FROM clause"))]
    UnknownTable { db: String, table: String },

    #[snafu(display(
        "query has {count} spatial restrictor(s) but no chunked table in its FROM clause"
    ))]
    NoChunkedTableForRestrictor { count: usize },
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
