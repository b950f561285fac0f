use observability_deps::tracing::warn;
use serde::{Deserialize, Serialize};

use crate::ir::{CompOp, JoinKind, OrderDirection, Op};

use super::error::{ParseError, ParseResult};

/// A half-open `[start, end)` byte range into the original query text,
/// carried by every enter event so errors can quote the offending
/// fragment. This is the Rust stand-in for the antlr4 terminal-node
/// character span the source uses for the same purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn fragment<'a>(&self, source: &'a str) -> &'a str {
        source.get(self.start..self.end).unwrap_or(source)
    }
}

/// The semantic payload of one grammar-rule "enter" event. The external
/// parse-tree walker (out of scope for this crate) is expected to resolve
/// terminal tokens and literal text itself and hand over already-typed
/// values here, the same way a generated antlr4 context exposes typed
/// accessor methods to the hand-written adapter classes it drives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EnterPayload {
    Root,
    SimpleSelect { distinct: bool },
    SelectList,
    SelectItem { alias: Option<String> },
    FromClause,
    TableSource { db: String, table: String, alias: String },
    JoinPart { kind: JoinKind, natural: bool },
    JoinSpecUsing { columns: Vec<String> },
    JoinSpecOn,
    GroupByClause,
    HavingClause,
    OrderByClause,
    OrderByItem { direction: Option<OrderDirection> },
    PredicateExpression,
    LogicalExpression { is_and: bool },
    NotExpression,
    BinaryComparisonPredicate { op: CompOp },
    InPredicate { has_not: bool },
    BetweenPredicate { has_not: bool },
    LikePredicate { has_not: bool, has_escape: bool },
    IsNullPredicate { has_not: bool },
    QservFunctionSpec { name: String, args: Vec<String> },
    NestedExpressionAtom,
    CallStatement { constant: String },
    SetGlobalStatement { var_name: String, is_bool_literal: bool, var_value: String },
    ValueExpression,
    /// A binary arithmetic/bitwise operator between two factors of the
    /// enclosing `ValueExpression`. Delivered as a leaf, the same as the
    /// atom variants below: it has no children of its own to wait for.
    BinaryArithOp { op: Op },
    /// A `LIMIT n` clause on the enclosing `SimpleSelect`. Delivered as a
    /// leaf, the same as `BinaryArithOp`: the row count is a token, not a
    /// built child.
    Limit { n: i64 },
    FunctionCall { name: String, is_agg: bool },
    ColumnRefAtom { db: String, table: String, column: String },
    ConstAtom { text: String },
    StarAtom { table: String },
    /// A grammar fragment the driver recognized as explicitly rejected,
    /// e.g. `WITH`, `ROLLUP`, `STRAIGHT_JOIN`. Carries the reason used to
    /// build the `ParseError::Unsupported` message.
    Rejected { reason: String },
}

/// Validate an identifier per the parse driver's identifier rules:
/// `_`-prefixed names are rejected outright, back-quoted names are
/// unquoted, and keywords used where an identifier is permitted are
/// accepted with a warning rather than an error.
pub fn normalize_identifier(raw: &str, span: Span, source: &str, is_keyword: bool) -> ParseResult<String> {
    let unquoted = raw.strip_prefix('`').and_then(|s| s.strip_suffix('`')).unwrap_or(raw);
    if unquoted.starts_with('_') {
        return Err(ParseError::unsupported(
            span.fragment(source),
            format!("identifiers may not start with '_': \"{unquoted}\""),
        ));
    }
    if is_keyword {
        warn!(identifier = unquoted, "keyword used as identifier");
    }
    Ok(unquoted.to_string())
}
