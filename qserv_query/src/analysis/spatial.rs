//! Spatial restrictor expansion: turns `qserv_areaspec_*` calls lifted out
//! of the WHERE clause during parsing into `scisql_*` UDF comparisons, one
//! per qualifying chunked table reference.

use crate::ir::{
    AreaRestrictor, BoolFactor, BoolFactorTerm, BoolTerm, ColumnRef, CompOp, CompPredicate, FromList, FuncExpr,
    TableRef, ValueExpr, ValueFactor, WhereClause,
};

use super::error::{AnalysisError, AnalysisResult};
use super::metadata::MetadataReader;
use super::{DispatchRestrictor, QueryContext, RestrictorKind};

pub fn expand(
    where_clause: &mut WhereClause,
    from_list: &FromList,
    metadata: &dyn MetadataReader,
    ctx: &mut QueryContext,
) -> AnalysisResult<()> {
    if where_clause.area_restrictors.is_empty() {
        return Ok(());
    }

    let chunked_tables = chunked_table_refs(from_list, metadata);
    if chunked_tables.is_empty() {
        return Err(AnalysisError::NoChunkedTableForRestrictor { count: where_clause.area_restrictors.len() });
    }

    let mut comparisons = Vec::new();
    for restrictor in &where_clause.area_restrictors {
        for (table, lon_col, lat_col) in &chunked_tables {
            comparisons.push(comparison_term(restrictor, table.effective_alias(), lon_col, lat_col));
            ctx.restrictors.push(DispatchRestrictor {
                kind: RestrictorKind::Area,
                params: dispatch_params(restrictor, table.effective_alias()),
            });
        }
    }

    where_clause.prepend_and_terms(comparisons);
    where_clause.clear_area_restrictors();
    Ok(())
}

/// Every chunked table reachable in the FROM list, paired with its
/// `(lonCol, latCol)` partitioning columns. Non-partitioned and
/// non-chunked tables are silently omitted, per the analysis error policy.
fn chunked_table_refs<'a>(
    from_list: &'a FromList,
    metadata: &dyn MetadataReader,
) -> Vec<(&'a TableRef, String, String)> {
    from_list
        .walk()
        .filter_map(|t| {
            let params = metadata.part_table_params(&t.db, &t.table)?;
            if !params.is_chunked {
                return None;
            }
            let [lon, lat, _sub_chunk] = params.part_cols;
            Some((t, lon, lat))
        })
        .collect()
}

fn comparison_term(restrictor: &AreaRestrictor, alias: &str, lon_col: &str, lat_col: &str) -> BoolTerm {
    let (_, udf_name) = restrictor.names();
    let mut params = vec![
        ValueExpr::simple(ValueFactor::ColumnRef(ColumnRef::new("", alias, lon_col))),
        ValueExpr::simple(ValueFactor::ColumnRef(ColumnRef::new("", alias, lat_col))),
    ];
    params.extend(restrictor_args(restrictor).into_iter().map(|a| ValueExpr::simple(ValueFactor::Const(a))));

    let call = ValueExpr::simple(ValueFactor::Function(FuncExpr::new(udf_name, params)));
    let one = ValueExpr::simple(ValueFactor::Const("1".to_string()));
    BoolTerm::Factor(BoolFactor::new(vec![BoolFactorTerm::Comp(CompPredicate {
        left: call,
        op: CompOp::Eq,
        right: one,
    })]))
}

/// Arguments passed to the UDF call for one restrictor. All shapes but
/// `Poly` pass their arguments through unchanged; `Poly`'s vertex list is
/// packed into a single string literal (`USE_STRING` in the source), since
/// the UDF takes a variable-length vertex list as one SQL argument.
fn restrictor_args(restrictor: &AreaRestrictor) -> Vec<String> {
    match restrictor {
        AreaRestrictor::Poly(vertices) => vec![format!("'{}'", vertices.join(","))],
        other => other.args().to_vec(),
    }
}

fn dispatch_params(restrictor: &AreaRestrictor, alias: &str) -> Vec<String> {
    let mut params = vec![alias.to_string()];
    params.extend(restrictor.args().iter().cloned());
    params
}
