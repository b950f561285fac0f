use snafu::Snafu;

/// Errors raised while driving the adapter stack from a parse-event stream.
///
/// `Unsupported` corresponds to the source's `adapter_execution_error`: a
/// grammar construct was recognized but is not (or cannot be) represented
/// in the IR, e.g. an `ESCAPE` clause on `LIKE`. `OrderError` corresponds
/// to `adapter_order_error`: the event stream reached a shape the driver
/// has no handler for — either a bug in the adapter that produced the
/// event, or a child reporting a kind of built node its parent never
/// expects.
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[snafu(display("Error parsing query, near \"{fragment}\", {reason}"))]
    Unsupported { fragment: String, reason: String },

    #[snafu(display("qserv cannot parse query near \"{fragment}\": {reason}"))]
    OrderError { fragment: String, reason: String },
}

impl ParseError {
    pub fn unsupported(fragment: impl Into<String>, reason: impl Into<String>) -> Self {
        ParseError::Unsupported { fragment: fragment.into(), reason: reason.into() }
    }

    pub fn order(fragment: impl Into<String>, reason: impl Into<String>) -> Self {
        ParseError::OrderError { fragment: fragment.into(), reason: reason.into() }
    }

    /// The short, user-facing message. Detailed diagnostics (adapter stack
    /// names, the full query text, a parse-tree dump) are logged at error
    /// level by the driver when the error is raised, not carried on the
    /// error value itself.
    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
