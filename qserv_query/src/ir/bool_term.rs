use serde::{Deserialize, Serialize};

use super::value_expr::ValueExpr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompOp {
    Eq,
    Lt,
    Gt,
    NotEqNe,
    NotEqBang,
    NullSafeEq,
    Le,
    Ge,
}

impl CompOp {
    pub fn render(self) -> &'static str {
        match self {
            CompOp::Eq => "=",
            CompOp::Lt => "<",
            CompOp::Gt => ">",
            CompOp::NotEqNe => "<>",
            CompOp::NotEqBang => "!=",
            CompOp::NullSafeEq => "<=>",
            CompOp::Le => "<=",
            CompOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompPredicate {
    pub left: ValueExpr,
    pub op: CompOp,
    pub right: ValueExpr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InPredicate {
    pub value: ValueExpr,
    pub has_not: bool,
    pub candidates: Vec<ValueExpr>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetweenPredicate {
    pub value: ValueExpr,
    pub has_not: bool,
    pub min_value: ValueExpr,
    pub max_value: ValueExpr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikePredicate {
    pub value: ValueExpr,
    pub has_not: bool,
    pub pattern: ValueExpr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NullPredicate {
    pub value: ValueExpr,
    pub has_not: bool,
}

/// One element of a [`BoolFactor`]'s term list.
///
/// `PassTerm` carries opaque punctuation (`"("`, `")"`, a bare keyword) that
/// the parser preserved verbatim rather than modeling structurally.
/// `BoolTermFactor` injects a whole [`BoolTerm`] where a factor is expected,
/// used to represent a parenthesized sub-expression in a WHERE clause
/// without losing its original grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolFactorTerm {
    Comp(CompPredicate),
    In(InPredicate),
    Between(BetweenPredicate),
    Like(LikePredicate),
    Null(NullPredicate),
    Pass(String),
    BoolTermFactor(Box<BoolTerm>),
}

/// A conjunction of [`BoolFactorTerm`]s, optionally negated and/or
/// parenthesized as written in the source query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoolFactor {
    pub terms: Vec<BoolFactorTerm>,
    pub has_not: bool,
    pub has_parentheses: bool,
}

impl BoolFactor {
    pub fn new(terms: Vec<BoolFactorTerm>) -> Self {
        Self { terms, has_not: false, has_parentheses: false }
    }

    /// Wrap `inner` so it renders as `( inner )`, preserving the
    /// parenthesization of a `NestedExpressionAtom` in a WHERE clause. The
    /// parentheses are represented with explicit [`BoolFactorTerm::Pass`]
    /// tokens rather than a flag, since that's the only factor-term shape
    /// the renderer needs to special-case.
    pub fn parenthesized(inner: BoolTerm) -> Self {
        Self {
            terms: vec![
                BoolFactorTerm::Pass("(".to_string()),
                BoolFactorTerm::BoolTermFactor(Box::new(inner)),
                BoolFactorTerm::Pass(")".to_string()),
            ],
            has_not: false,
            has_parentheses: true,
        }
    }
}

/// A boolean expression tree, required by [`crate::ir::where_clause::WhereClause`]
/// to have "CNF shape": the root, if any, is an [`BoolTerm::Or`] of
/// [`BoolTerm::And`]s of [`BoolTerm::Factor`]s. Analysis passes rely on this
/// shape and do not attempt to normalize an arbitrary tree into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoolTerm {
    Factor(BoolFactor),
    And(Vec<BoolTerm>),
    Or(Vec<BoolTerm>),
}

impl BoolTerm {
    /// Merge same-kind adjacent terms together, as the parse driver's
    /// `LogicalExpression` adapter does when folding a run of `AND`- or
    /// `OR`-joined operands: `(a AND b) AND c` collapses to one `And([a, b,
    /// c])` rather than nesting `And([And([a, b]), c])`.
    pub fn merge_and(mut terms: Vec<BoolTerm>) -> BoolTerm {
        let mut flat = Vec::with_capacity(terms.len());
        for t in terms.drain(..) {
            match t {
                BoolTerm::And(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        BoolTerm::And(flat)
    }

    pub fn merge_or(mut terms: Vec<BoolTerm>) -> BoolTerm {
        let mut flat = Vec::with_capacity(terms.len());
        for t in terms.drain(..) {
            match t {
                BoolTerm::Or(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        BoolTerm::Or(flat)
    }

    /// The AND-term directly under the root OR-term, if the tree is
    /// currently in the "single top-level AND" shape that
    /// `prepend_and`/analysis passes require. Mirrors `getRootAndTerm`:
    /// an OR-term with anything other than exactly one child has no single
    /// global AND to return.
    pub fn as_single_and_terms(&self) -> Option<&[BoolTerm]> {
        match self {
            BoolTerm::Or(terms) if terms.len() == 1 => match &terms[0] {
                BoolTerm::And(inner) => Some(inner),
                _ => None,
            },
            BoolTerm::And(inner) => Some(inner),
            _ => None,
        }
    }
}
