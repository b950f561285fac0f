//! Secondary-index restrictor discovery: scans the WHERE clause's top-level
//! AND terms for equality/IN/BETWEEN predicates over a column that some
//! table in the FROM list exposes as a secondary index.

use std::collections::HashSet;

use crate::ir::{BoolFactorTerm, BoolTerm, CompOp, FromList, WhereClause};

use super::metadata::MetadataReader;
use super::{DispatchRestrictor, QueryContext, RestrictorKind};

pub fn discover(where_clause: &WhereClause, from_list: &FromList, metadata: &dyn MetadataReader, ctx: &mut QueryContext) {
    let Some(root) = where_clause.root.as_ref() else { return };
    let Some(and_terms) = root.as_single_and_terms() else { return };

    for term in and_terms {
        let mut seen = HashSet::new();
        scan_term(term, from_list, metadata, &mut seen, ctx);
    }
}

fn scan_term(
    term: &BoolTerm,
    from_list: &FromList,
    metadata: &dyn MetadataReader,
    seen: &mut HashSet<String>,
    ctx: &mut QueryContext,
) {
    let BoolTerm::Factor(factor) = term else { return };
    for factor_term in &factor.terms {
        match factor_term {
            BoolFactorTerm::Comp(comp) if comp.op == CompOp::Eq => {
                let (Some(col), Some(lit)) = (comp.left.as_column_ref(), comp.right.as_literal()) else { continue };
                try_restrict(col, &[lit.to_string()], RestrictorKind::SIndex, from_list, metadata, seen, ctx);
            }
            BoolFactorTerm::In(in_pred) => {
                let Some(col) = in_pred.value.as_column_ref() else { continue };
                let Some(literals) = in_pred.candidates.iter().map(|c| c.as_literal()).collect::<Option<Vec<_>>>()
                else {
                    continue;
                };
                let literals: Vec<String> = literals.into_iter().map(str::to_string).collect();
                try_restrict(col, &literals, RestrictorKind::SIndex, from_list, metadata, seen, ctx);
            }
            BoolFactorTerm::Between(between) => {
                let Some(col) = between.value.as_column_ref() else { continue };
                let (Some(min), Some(max)) = (between.min_value.as_literal(), between.max_value.as_literal()) else {
                    continue;
                };
                try_restrict(
                    col,
                    &[min.to_string(), max.to_string()],
                    RestrictorKind::SIndexBetween,
                    from_list,
                    metadata,
                    seen,
                    ctx,
                );
            }
            _ => {}
        }
    }
}

fn try_restrict(
    col: &crate::ir::ColumnRef,
    literals: &[String],
    kind: RestrictorKind,
    from_list: &FromList,
    metadata: &dyn MetadataReader,
    seen: &mut HashSet<String>,
    ctx: &mut QueryContext,
) {
    if seen.contains(&col.column) {
        return;
    }
    let Some((db, table)) = resolve_secondary_index_origin(col, from_list, metadata) else { return };
    seen.insert(col.column.clone());

    let mut params = vec![db, table, col.column.clone()];
    params.extend(literals.iter().cloned());
    ctx.restrictors.push(DispatchRestrictor { kind, params });
}

/// The first table in the FROM list (ambiguity is tolerated, first match
/// wins) that exposes `col` as a secondary index, redirected to the
/// family's director table when this table has one of its own.
fn resolve_secondary_index_origin(
    col: &crate::ir::ColumnRef,
    from_list: &FromList,
    metadata: &dyn MetadataReader,
) -> Option<(String, String)> {
    for table in from_list.walk() {
        if !col.table.is_empty() && col.table != table.table && col.table != table.effective_alias() {
            continue;
        }
        let Some(params) = metadata.part_table_params(&table.db, &table.table) else { continue };
        if !params.sec_index_cols.iter().any(|c| c == &col.column) {
            continue;
        }
        if !params.dir_col.is_empty() && params.dir_col == col.column && params.dir_table != table.table {
            return Some((params.dir_db, params.dir_table));
        }
        return Some((table.db.clone(), table.table.clone()));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::super::metadata::test_support::StaticMetadata;
    use super::super::metadata::PartTableParams;
    use super::*;
    use crate::ir::{BoolFactor, ColumnRef, CompPredicate, InPredicate, TableRef, ValueExpr, ValueFactor};

    fn params(sec_index: &[&str]) -> PartTableParams {
        PartTableParams {
            part_cols: ["lon".into(), "lat".into(), "chunkId".into()],
            sec_index_cols: sec_index.iter().map(|s| s.to_string()).collect(),
            dir_col: String::new(),
            dir_db: String::new(),
            dir_table: String::new(),
            is_chunked: true,
        }
    }

    #[test]
    fn in_predicate_over_secondary_index_column() {
        let metadata = StaticMetadata::default().with_table("", "Obj", params(&["objectId"]));
        let from_list = FromList { tables: vec![TableRef::new("", "Obj", "")] };
        let in_pred = BoolTerm::Factor(BoolFactor::new(vec![BoolFactorTerm::In(InPredicate {
            value: ValueExpr::simple(ValueFactor::ColumnRef(ColumnRef::bare("objectId"))),
            has_not: false,
            candidates: vec!["1".into(), "2".into(), "3".into()]
                .into_iter()
                .map(|c| ValueExpr::simple(ValueFactor::Const(c)))
                .collect(),
        })]));
        let wc = WhereClause { root: Some(BoolTerm::And(vec![in_pred])), area_restrictors: Vec::new() };
        let mut ctx = QueryContext::default();

        discover(&wc, &from_list, &metadata, &mut ctx);

        assert_eq!(ctx.restrictors.len(), 1);
        let r = &ctx.restrictors[0];
        assert_eq!(r.kind, RestrictorKind::SIndex);
        assert_eq!(r.params, vec!["", "Obj", "objectId", "1", "2", "3"]);
    }

    #[test]
    fn director_redirect_rewrites_table() {
        let mut dir_params = params(&["objectId"]);
        dir_params.dir_col = "objectId".to_string();
        dir_params.dir_table = "Object".to_string();
        dir_params.dir_db = "".to_string();
        let metadata = StaticMetadata::default().with_table("", "Source", dir_params);
        let from_list = FromList { tables: vec![TableRef::new("", "Source", "")] };
        let comp = BoolTerm::Factor(BoolFactor::new(vec![BoolFactorTerm::Comp(CompPredicate {
            left: ValueExpr::simple(ValueFactor::ColumnRef(ColumnRef::bare("objectId"))),
            op: CompOp::Eq,
            right: ValueExpr::simple(ValueFactor::Const("42".into())),
        })]));
        let wc = WhereClause { root: Some(BoolTerm::And(vec![comp])), area_restrictors: Vec::new() };
        let mut ctx = QueryContext::default();

        discover(&wc, &from_list, &metadata, &mut ctx);

        assert_eq!(ctx.restrictors[0].params, vec!["", "Object", "objectId", "42"]);
    }

    #[test]
    fn non_literal_operand_is_skipped_without_error() {
        let metadata = StaticMetadata::default().with_table("", "Obj", params(&["objectId"]));
        let from_list = FromList { tables: vec![TableRef::new("", "Obj", "")] };
        let comp = BoolTerm::Factor(BoolFactor::new(vec![BoolFactorTerm::Comp(CompPredicate {
            left: ValueExpr::simple(ValueFactor::ColumnRef(ColumnRef::bare("objectId"))),
            op: CompOp::Eq,
            right: ValueExpr::simple(ValueFactor::ColumnRef(ColumnRef::bare("otherCol"))),
        })]));
        let wc = WhereClause { root: Some(BoolTerm::And(vec![comp])), area_restrictors: Vec::new() };
        let mut ctx = QueryContext::default();

        discover(&wc, &from_list, &metadata, &mut ctx);

        assert!(ctx.restrictors.is_empty());
    }
}
