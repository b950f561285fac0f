use serde::{Deserialize, Serialize};

use super::bool_term::BoolTerm;

/// A spatial predicate written as `qserv_areaspec_<shape>(...)` in the
/// source query. Each variant carries its arguments verbatim as strings, to
/// be rendered into scisql UDF calls (or reported as literal values) by the
/// spatial analysis pass without re-parsing numeric text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AreaRestrictor {
    /// `qserv_areaspec_box(lonMin, latMin, lonMax, latMax)`.
    Box(Vec<String>),
    /// `qserv_areaspec_circle(lon, lat, radiusArcsec)`.
    Circle(Vec<String>),
    /// `qserv_areaspec_ellipse(lon, lat, semiMajorArcsec, semiMinorArcsec, posAngleDeg)`.
    Ellipse(Vec<String>),
    /// `qserv_areaspec_poly(...)`; vertex list, packed at render time.
    Poly(Vec<String>),
}

impl AreaRestrictor {
    pub fn args(&self) -> &[String] {
        match self {
            AreaRestrictor::Box(a)
            | AreaRestrictor::Circle(a)
            | AreaRestrictor::Ellipse(a)
            | AreaRestrictor::Poly(a) => a,
        }
    }

    /// The `qserv_areaspec_*` spelling used in the original WHERE clause,
    /// and the `scisql_*` UDF it expands to under the spatial analysis pass.
    pub fn names(&self) -> (&'static str, &'static str) {
        match self {
            AreaRestrictor::Box(_) => ("qserv_areaspec_box", "scisql_s2PtInBox"),
            AreaRestrictor::Circle(_) => ("qserv_areaspec_circle", "scisql_s2PtInCircle"),
            AreaRestrictor::Ellipse(_) => ("qserv_areaspec_ellipse", "scisql_s2PtInEllipse"),
            AreaRestrictor::Poly(_) => ("qserv_areaspec_poly", "scisql_s2PtInCPoly"),
        }
    }
}

/// The full `WHERE` clause: an optional CNF-shaped boolean tree, plus any
/// spatial restrictors lifted out of it during parsing (they are rendered
/// as a syntactic prefix to the root term, not folded into it, so the
/// spatial analysis pass can find and rewrite them without walking the
/// whole tree looking for `qserv_areaspec_*` calls).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WhereClause {
    pub root: Option<BoolTerm>,
    pub area_restrictors: Vec<AreaRestrictor>,
}

impl WhereClause {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `term` immediately before the existing top-level AND terms,
    /// creating a root AND term if none exists yet. Mirrors
    /// `WhereClause::prependAndTerm`: the clause must be in "zero or one
    /// top-level AND term" shape, or this is a logic error on the caller's
    /// part (an analysis pass invariant, not a user-facing condition).
    pub fn prepend_and_terms(&mut self, mut new_terms: Vec<BoolTerm>) {
        let existing = match self.root.take() {
            None => Vec::new(),
            Some(BoolTerm::Or(mut terms)) => {
                if terms.is_empty() {
                    Vec::new()
                } else if terms.len() == 1 {
                    match terms.pop().unwrap() {
                        BoolTerm::And(inner) => inner,
                        other => vec![other],
                    }
                } else {
                    panic!("WhereClause root has more than one top-level OR branch; no single global AND term");
                }
            }
            Some(BoolTerm::And(inner)) => inner,
            Some(other) => vec![other],
        };
        new_terms.extend(existing);
        self.root = Some(BoolTerm::Or(vec![BoolTerm::And(new_terms)]));
    }

    pub fn clear_area_restrictors(&mut self) {
        self.area_restrictors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::bool_term::{BoolFactor, BoolFactorTerm, CompOp, CompPredicate};
    use crate::ir::column_ref::ColumnRef;
    use crate::ir::value_expr::{ValueExpr, ValueFactor};

    fn comp(col: &str, lit: &str) -> BoolTerm {
        BoolTerm::Factor(BoolFactor::new(vec![BoolFactorTerm::Comp(CompPredicate {
            left: ValueExpr::simple(ValueFactor::ColumnRef(ColumnRef::bare(col))),
            op: CompOp::Eq,
            right: ValueExpr::simple(ValueFactor::Const(lit.to_string())),
        })]))
    }

    #[test]
    fn prepend_creates_root_and_term_when_absent() {
        let mut wc = WhereClause::new();
        wc.prepend_and_terms(vec![comp("a", "1")]);
        let terms = wc.root.as_ref().unwrap().as_single_and_terms().unwrap();
        assert_eq!(terms.len(), 1);
    }

    #[test]
    fn prepend_inserts_before_existing_terms() {
        let mut wc = WhereClause::new();
        wc.root = Some(BoolTerm::Or(vec![BoolTerm::And(vec![comp("x", "1")])]));
        wc.prepend_and_terms(vec![comp("a", "2"), comp("b", "3")]);
        let terms = wc.root.as_ref().unwrap().as_single_and_terms().unwrap();
        assert_eq!(terms.len(), 3);
        assert_eq!(terms[2], comp("x", "1"));
    }
}
