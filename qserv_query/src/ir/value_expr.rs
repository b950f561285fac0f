use serde::{Deserialize, Serialize};

use super::column_ref::ColumnRef;

/// Arithmetic/bitwise operator that follows a [`ValueFactor`] in a
/// [`ValueExpr`]'s term list. `None` marks the tail of the sequence: it is
/// never a binary join, it is "no operator follows".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    None,
    Plus,
    Minus,
    Multiply,
    Divide,
    Div,
    Mod,
    Modulo,
    BitAnd,
    BitOr,
    BitXor,
    BitShiftLeft,
    BitShiftRight,
}

impl Op {
    /// Relative binding strength, used by the renderer to decide whether a
    /// sub-expression needs parenthesization when nested inside another.
    /// Multiplicative/bitwise-shift operators bind tighter than additive
    /// ones; bitwise AND/OR/XOR bind loosest.
    pub fn precedence(self) -> u8 {
        match self {
            Op::None => 0,
            Op::BitOr | Op::BitXor => 1,
            Op::BitAnd => 2,
            Op::BitShiftLeft | Op::BitShiftRight => 3,
            Op::Plus | Op::Minus => 4,
            Op::Multiply | Op::Divide | Op::Div | Op::Mod | Op::Modulo => 5,
        }
    }

    pub fn render(self) -> &'static str {
        match self {
            Op::None => "",
            Op::Plus => "+",
            Op::Minus => "-",
            Op::Multiply => "*",
            Op::Divide => "/",
            Op::Div => "DIV",
            Op::Mod => "MOD",
            Op::Modulo => "%",
            Op::BitAnd => "&",
            Op::BitOr => "|",
            Op::BitXor => "^",
            Op::BitShiftLeft => "<<",
            Op::BitShiftRight => ">>",
        }
    }
}

/// A call to a named function, e.g. `scisql_s2PtInBox(a, b, 1, 2, 3, 4)` or
/// an aggregate like `SUM(flux)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncExpr {
    pub name: String,
    pub params: Vec<ValueExpr>,
}

impl FuncExpr {
    pub fn new(name: impl Into<String>, params: Vec<ValueExpr>) -> Self {
        Self { name: name.into(), params }
    }
}

pub const AGGREGATE_NAMES: &[&str] = &["AVG", "MIN", "MAX", "SUM", "COUNT"];

/// One operand of a [`ValueExpr`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueFactor {
    ColumnRef(ColumnRef),
    /// A literal, carried as its original source text (so integers,
    /// floats and quoted strings round-trip byte-for-byte).
    Const(String),
    /// `table.*` or bare `*`; `table` is empty for the latter.
    Star(String),
    Function(FuncExpr),
    /// Same shape as `Function`, but `name` is asserted (see
    /// [`AGGREGATE_NAMES`]) to be a recognized aggregate.
    AggFunc(FuncExpr),
    /// A parenthesized sub-expression used as a factor, e.g. `(a + b) * c`.
    Expr(Box<ValueExpr>),
}

impl ValueFactor {
    pub fn agg_func(func: FuncExpr) -> Result<Self, String> {
        if AGGREGATE_NAMES.contains(&func.name.to_ascii_uppercase().as_str()) {
            Ok(ValueFactor::AggFunc(func))
        } else {
            Err(format!("'{}' is not a recognized aggregate function", func.name))
        }
    }
}

/// An ordered sequence of `(factor, operator)` pairs: `a + b * c` is
/// `[(a, Plus), (b, Multiply), (c, None)]`.
///
/// Invariant: non-empty, and `Op::None` appears exactly at the last pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueExpr {
    terms: Vec<(ValueFactor, Op)>,
    pub alias: Option<String>,
}

impl ValueExpr {
    /// A `ValueExpr` consisting of a single factor and no operator.
    pub fn simple(factor: ValueFactor) -> Self {
        Self { terms: vec![(factor, Op::None)], alias: None }
    }

    /// Build from a non-empty sequence of terms, normalizing the last
    /// entry's operator to `Op::None` regardless of what was passed in.
    pub fn from_terms(mut terms: Vec<(ValueFactor, Op)>) -> Result<Self, String> {
        if terms.is_empty() {
            return Err("ValueExpr must have at least one term".to_string());
        }
        if let Some(last) = terms.last_mut() {
            last.1 = Op::None;
        }
        Ok(Self { terms, alias: None })
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn terms(&self) -> &[(ValueFactor, Op)] {
        &self.terms
    }

    pub fn is_compound(&self) -> bool {
        self.terms.len() > 1
    }

    /// If this expression is exactly one bare column reference, return it.
    /// Used by analysis passes that need to treat "a predicate operand is a
    /// column" and "is a literal" as mutually exclusive cases.
    pub fn as_column_ref(&self) -> Option<&ColumnRef> {
        match self.terms.as_slice() {
            [(ValueFactor::ColumnRef(cr), Op::None)] => Some(cr),
            _ => None,
        }
    }

    /// If this expression is exactly one constant, return its literal text.
    pub fn as_literal(&self) -> Option<&str> {
        match self.terms.as_slice() {
            [(ValueFactor::Const(s), Op::None)] => Some(s.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_terms_normalizes_trailing_op() {
        let expr = ValueExpr::from_terms(vec![
            (ValueFactor::Const("1".into()), Op::Plus),
            (ValueFactor::Const("2".into()), Op::Multiply),
        ])
        .unwrap();
        assert_eq!(expr.terms().last().unwrap().1, Op::None);
    }

    #[test]
    fn rejects_empty_term_list() {
        assert!(ValueExpr::from_terms(vec![]).is_err());
    }

    #[test]
    fn agg_func_rejects_unknown_name() {
        let fe = FuncExpr::new("NOT_AN_AGG", vec![]);
        assert!(ValueFactor::agg_func(fe).is_err());
    }
}
