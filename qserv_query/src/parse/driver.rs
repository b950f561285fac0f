//! Drives the adapter stack in [`super::frame`] from a stream of
//! [`EnterPayload`]/exit events, the idiomatic-Rust rework of the source's
//! antlr4 `ParseListener` + per-rule adapter-class dispatch.
//!
//! A caller (a lexer/grammar front end, out of scope for this crate) feeds
//! events in pre-order: [`ParseDriver::enter`] for a rule's opening, any
//! number of nested enters/exits for its children, then
//! [`ParseDriver::exit`] for its closing. [`ParseDriver::finish`] extracts
//! the resulting [`Statement`] once the stream is exhausted.

use crate::ir::{AreaRestrictor, ColumnRef, JoinSpec, Statement, ValueFactor};

use super::error::{ParseError, ParseResult};
use super::event::{normalize_identifier, EnterPayload, Span};
use super::frame::{Built, Frame};

pub struct ParseDriver {
    stack: Vec<Frame>,
    source: String,
    result: Option<Statement>,
}

impl ParseDriver {
    pub fn new(source: impl Into<String>) -> Self {
        Self { stack: Vec::new(), source: source.into(), result: None }
    }

    /// Enter one grammar rule instance. Rules with no children of their own
    /// (value atoms, a `JoinSpecUsing`'s column list, a `QservFunctionSpec`
    /// call, an arithmetic operator token, a `LIMIT` row count) are resolved
    /// and delivered to the current top frame immediately rather than
    /// pushed; everything else is pushed and waits for its matching
    /// [`ParseDriver::exit`].
    pub fn enter(&mut self, payload: EnterPayload, span: Span) -> ParseResult<()> {
        match payload {
            EnterPayload::ColumnRefAtom { db, table, column } => {
                let cr = ColumnRef::new(
                    normalize_identifier(&db, span, &self.source, false)?,
                    normalize_identifier(&table, span, &self.source, false)?,
                    normalize_identifier(&column, span, &self.source, false)?,
                );
                self.deliver(Built::ValueFactor(ValueFactor::ColumnRef(cr)), span)
            }
            EnterPayload::ConstAtom { text } => self.deliver(Built::ValueFactor(ValueFactor::Const(text)), span),
            EnterPayload::StarAtom { table } => {
                let table = if table.is_empty() {
                    String::new()
                } else {
                    normalize_identifier(&table, span, &self.source, false)?
                };
                self.deliver(Built::ValueFactor(ValueFactor::Star(table)), span)
            }
            EnterPayload::BinaryArithOp { op } => {
                let frame = self.top_mut(span)?;
                frame.push_op(op, span, &self.source)
            }
            EnterPayload::Limit { n } => {
                let frame = self.top_mut(span)?;
                frame.set_limit(n, span, &self.source)
            }
            EnterPayload::JoinSpecUsing { columns } => {
                let mut cols = Vec::with_capacity(columns.len());
                for c in &columns {
                    cols.push(ColumnRef::bare(normalize_identifier(c, span, &self.source, false)?));
                }
                self.deliver(Built::JoinSpec(JoinSpec::using(cols)), span)
            }
            EnterPayload::QservFunctionSpec { name, args } => {
                let restrictor = area_restrictor_from_spec(&name, args, span, &self.source)?;
                self.deliver(Built::AreaRestrictor(restrictor), span)
            }
            payload => {
                let frame = Frame::from_enter(payload, span, &self.source)?;
                self.stack.push(frame);
                Ok(())
            }
        }
    }

    /// Exit the innermost open rule, handing its result up to its new
    /// parent (or, if this was the outermost `Root` rule, recording the
    /// final statement for [`ParseDriver::finish`]).
    pub fn exit(&mut self, span: Span) -> ParseResult<()> {
        let frame = self
            .stack
            .pop()
            .ok_or_else(|| ParseError::order(span.fragment(&self.source), "exit event with no matching enter"))?;

        if self.stack.is_empty() {
            return match frame {
                Frame::Root(root) => {
                    self.result = Some(root.result.ok_or_else(|| {
                        ParseError::order(span.fragment(&self.source), "Root closed with no statement inside it")
                    })?);
                    Ok(())
                }
                other => Err(ParseError::order(
                    span.fragment(&self.source),
                    format!("{} closed at the top of the stack; expected Root", other.name()),
                )),
            };
        }

        for built in frame.finish(span, &self.source)? {
            self.deliver(built, span)?;
        }
        Ok(())
    }

    /// Take the parsed statement. Errors if any rule is still open (an
    /// unbalanced enter/exit stream).
    pub fn finish(mut self) -> ParseResult<Statement> {
        if !self.stack.is_empty() {
            return Err(ParseError::order(self.source.as_str(), "event stream ended with unclosed rules"));
        }
        self.result.take().ok_or_else(|| ParseError::order(self.source.as_str(), "no statement was produced"))
    }

    fn top_mut(&mut self, span: Span) -> ParseResult<&mut Frame> {
        self.stack
            .last_mut()
            .ok_or_else(|| ParseError::order(span.fragment(&self.source), "event with nothing on the stack"))
    }

    fn deliver(&mut self, built: Built, span: Span) -> ParseResult<()> {
        let source = self.source.clone();
        self.top_mut(span)?.handle(built, span, &source)
    }
}

fn area_restrictor_from_spec(
    name: &str,
    args: Vec<String>,
    span: Span,
    source: &str,
) -> ParseResult<AreaRestrictor> {
    match name.to_ascii_lowercase().as_str() {
        "qserv_areaspec_box" => Ok(AreaRestrictor::Box(args)),
        "qserv_areaspec_circle" => Ok(AreaRestrictor::Circle(args)),
        "qserv_areaspec_ellipse" => Ok(AreaRestrictor::Ellipse(args)),
        "qserv_areaspec_poly" => Ok(AreaRestrictor::Poly(args)),
        other => Err(ParseError::unsupported(
            span.fragment(source),
            format!("'{other}' is not a supported qserv area spec shape"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CompOp, JoinKind, Op};

    fn sp(start: usize, end: usize) -> Span {
        Span::new(start, end)
    }

    /// `SELECT objectId, ra_PS FROM Object WHERE objectId IN (100, 200)`
    #[test]
    fn drives_select_with_in_predicate() {
        let source = "SELECT objectId, ra_PS FROM Object WHERE objectId IN (100, 200)";
        let mut d = ParseDriver::new(source);

        d.enter(EnterPayload::Root, sp(0, source.len())).unwrap();
        d.enter(EnterPayload::SimpleSelect { distinct: false }, sp(0, source.len())).unwrap();

        d.enter(EnterPayload::SelectList, sp(7, 23)).unwrap();
        d.enter(EnterPayload::SelectItem { alias: None }, sp(7, 15)).unwrap();
        d.enter(EnterPayload::ValueExpression, sp(7, 15)).unwrap();
        d.enter(EnterPayload::ColumnRefAtom { db: String::new(), table: String::new(), column: "objectId".into() }, sp(7, 15))
            .unwrap();
        d.exit(sp(7, 15)).unwrap(); // ValueExpression
        d.exit(sp(7, 15)).unwrap(); // SelectItem
        d.enter(EnterPayload::SelectItem { alias: None }, sp(17, 23)).unwrap();
        d.enter(EnterPayload::ValueExpression, sp(17, 23)).unwrap();
        d.enter(EnterPayload::ColumnRefAtom { db: String::new(), table: String::new(), column: "ra_PS".into() }, sp(17, 23))
            .unwrap();
        d.exit(sp(17, 23)).unwrap();
        d.exit(sp(17, 23)).unwrap();
        d.exit(sp(7, 23)).unwrap(); // SelectList

        d.enter(EnterPayload::FromClause, sp(29, source.len())).unwrap();
        d.enter(EnterPayload::TableSource { db: String::new(), table: "Object".into(), alias: String::new() }, sp(34, 40))
            .unwrap();
        d.exit(sp(34, 40)).unwrap();

        d.enter(EnterPayload::PredicateExpression, sp(41, source.len())).unwrap();
        d.enter(EnterPayload::InPredicate { has_not: false }, sp(41, source.len())).unwrap();
        d.enter(EnterPayload::ValueExpression, sp(41, 49)).unwrap();
        d.enter(EnterPayload::ColumnRefAtom { db: String::new(), table: String::new(), column: "objectId".into() }, sp(41, 49))
            .unwrap();
        d.exit(sp(41, 49)).unwrap();
        d.enter(EnterPayload::ValueExpression, sp(54, 57)).unwrap();
        d.enter(EnterPayload::ConstAtom { text: "100".into() }, sp(54, 57)).unwrap();
        d.exit(sp(54, 57)).unwrap();
        d.enter(EnterPayload::ValueExpression, sp(59, 62)).unwrap();
        d.enter(EnterPayload::ConstAtom { text: "200".into() }, sp(59, 62)).unwrap();
        d.exit(sp(59, 62)).unwrap();
        d.exit(sp(41, source.len())).unwrap(); // InPredicate
        d.exit(sp(41, source.len())).unwrap(); // PredicateExpression

        d.exit(sp(29, source.len())).unwrap(); // FromClause
        d.exit(sp(0, source.len())).unwrap(); // SimpleSelect
        d.exit(sp(0, source.len())).unwrap(); // Root

        let stmt = d.finish().unwrap();
        let select = match stmt {
            Statement::Select(s) => s,
            _ => panic!("expected a SELECT statement"),
        };
        assert_eq!(select.select_list.items.len(), 2);
        let from = select.from_list.unwrap();
        assert_eq!(from.tables[0].table, "Object");
        let where_clause = select.where_clause.unwrap();
        assert!(where_clause.area_restrictors.is_empty());
        let terms = where_clause.root.unwrap();
        let ands = terms.as_single_and_terms().unwrap();
        assert_eq!(ands.len(), 1);
    }

    /// `SELECT * FROM Object WHERE qserv_areaspec_box(0.1, -6, 4, 6) AND x > 1`
    #[test]
    fn spatial_restrictor_bubbles_past_logical_expression() {
        let source = "SELECT * FROM Object WHERE qserv_areaspec_box(0.1, -6, 4, 6) AND x > 1";
        let mut d = ParseDriver::new(source);

        d.enter(EnterPayload::Root, sp(0, source.len())).unwrap();
        d.enter(EnterPayload::SimpleSelect { distinct: false }, sp(0, source.len())).unwrap();
        d.enter(EnterPayload::SelectList, sp(7, 8)).unwrap();
        d.enter(EnterPayload::SelectItem { alias: None }, sp(7, 8)).unwrap();
        d.enter(EnterPayload::ValueExpression, sp(7, 8)).unwrap();
        d.enter(EnterPayload::StarAtom { table: String::new() }, sp(7, 8)).unwrap();
        d.exit(sp(7, 8)).unwrap();
        d.exit(sp(7, 8)).unwrap();
        d.exit(sp(7, 8)).unwrap();

        d.enter(EnterPayload::FromClause, sp(14, source.len())).unwrap();
        d.enter(EnterPayload::TableSource { db: String::new(), table: "Object".into(), alias: String::new() }, sp(14, 20))
            .unwrap();
        d.exit(sp(14, 20)).unwrap();

        d.enter(EnterPayload::PredicateExpression, sp(27, source.len())).unwrap();
        d.enter(EnterPayload::LogicalExpression { is_and: true }, sp(27, source.len())).unwrap();

        d.enter(
            EnterPayload::QservFunctionSpec {
                name: "qserv_areaspec_box".into(),
                args: vec!["0.1".into(), "-6".into(), "4".into(), "6".into()],
            },
            sp(27, 61),
        )
        .unwrap();

        d.enter(EnterPayload::BinaryComparisonPredicate { op: CompOp::Gt }, sp(66, 71)).unwrap();
        d.enter(EnterPayload::ValueExpression, sp(66, 67)).unwrap();
        d.enter(EnterPayload::ColumnRefAtom { db: String::new(), table: String::new(), column: "x".into() }, sp(66, 67))
            .unwrap();
        d.exit(sp(66, 67)).unwrap();
        d.enter(EnterPayload::ValueExpression, sp(70, 71)).unwrap();
        d.enter(EnterPayload::ConstAtom { text: "1".into() }, sp(70, 71)).unwrap();
        d.exit(sp(70, 71)).unwrap();
        d.exit(sp(66, 71)).unwrap(); // BinaryComparisonPredicate

        d.exit(sp(27, source.len())).unwrap(); // LogicalExpression
        d.exit(sp(27, source.len())).unwrap(); // PredicateExpression
        d.exit(sp(14, source.len())).unwrap(); // FromClause
        d.exit(sp(0, source.len())).unwrap(); // SimpleSelect
        d.exit(sp(0, source.len())).unwrap(); // Root

        let stmt = d.finish().unwrap();
        let select = match stmt {
            Statement::Select(s) => s,
            _ => panic!("expected a SELECT statement"),
        };
        let where_clause = select.where_clause.unwrap();
        assert_eq!(where_clause.area_restrictors.len(), 1);
        assert!(matches!(where_clause.area_restrictors[0], AreaRestrictor::Box(_)));
        let ands = where_clause.root.unwrap().as_single_and_terms().unwrap().to_vec();
        assert_eq!(ands.len(), 1);
    }

    #[test]
    fn arithmetic_value_expression_orders_factors_and_ops() {
        let source = "SELECT a + b * c FROM T";
        let mut d = ParseDriver::new(source);
        d.enter(EnterPayload::Root, sp(0, source.len())).unwrap();
        d.enter(EnterPayload::SimpleSelect { distinct: false }, sp(0, source.len())).unwrap();
        d.enter(EnterPayload::SelectList, sp(7, 16)).unwrap();
        d.enter(EnterPayload::SelectItem { alias: None }, sp(7, 16)).unwrap();
        d.enter(EnterPayload::ValueExpression, sp(7, 16)).unwrap();
        d.enter(EnterPayload::ColumnRefAtom { db: String::new(), table: String::new(), column: "a".into() }, sp(7, 8))
            .unwrap();
        d.enter(EnterPayload::BinaryArithOp { op: Op::Plus }, sp(9, 10)).unwrap();
        d.enter(EnterPayload::ColumnRefAtom { db: String::new(), table: String::new(), column: "b".into() }, sp(11, 12))
            .unwrap();
        d.enter(EnterPayload::BinaryArithOp { op: Op::Multiply }, sp(13, 14)).unwrap();
        d.enter(EnterPayload::ColumnRefAtom { db: String::new(), table: String::new(), column: "c".into() }, sp(15, 16))
            .unwrap();
        d.exit(sp(7, 16)).unwrap();
        d.exit(sp(7, 16)).unwrap();
        d.exit(sp(7, 16)).unwrap();

        d.enter(EnterPayload::FromClause, sp(22, 23)).unwrap();
        d.enter(EnterPayload::TableSource { db: String::new(), table: "T".into(), alias: String::new() }, sp(22, 23))
            .unwrap();
        d.exit(sp(22, 23)).unwrap();
        d.exit(sp(22, 23)).unwrap();

        d.exit(sp(0, source.len())).unwrap();
        d.exit(sp(0, source.len())).unwrap();

        let stmt = d.finish().unwrap();
        let select = match stmt {
            Statement::Select(s) => s,
            _ => panic!("expected a SELECT statement"),
        };
        let expr = &select.select_list.items[0];
        let terms = expr.terms();
        assert_eq!(terms.len(), 3);
        assert_eq!(terms[0].1, Op::Plus);
        assert_eq!(terms[1].1, Op::Multiply);
        assert_eq!(terms[2].1, Op::None);
    }

    /// `SELECT objectId FROM Object LIMIT 10`
    #[test]
    fn limit_clause_reaches_the_select_stmt() {
        let source = "SELECT objectId FROM Object LIMIT 10";
        let mut d = ParseDriver::new(source);
        d.enter(EnterPayload::Root, sp(0, source.len())).unwrap();
        d.enter(EnterPayload::SimpleSelect { distinct: false }, sp(0, source.len())).unwrap();
        d.enter(EnterPayload::SelectList, sp(7, 16)).unwrap();
        d.enter(EnterPayload::SelectItem { alias: None }, sp(7, 16)).unwrap();
        d.enter(EnterPayload::ValueExpression, sp(7, 16)).unwrap();
        d.enter(EnterPayload::ColumnRefAtom { db: String::new(), table: String::new(), column: "objectId".into() }, sp(7, 16))
            .unwrap();
        d.exit(sp(7, 16)).unwrap();
        d.exit(sp(7, 16)).unwrap();
        d.exit(sp(7, 16)).unwrap();

        d.enter(EnterPayload::FromClause, sp(22, 28)).unwrap();
        d.enter(EnterPayload::TableSource { db: String::new(), table: "Object".into(), alias: String::new() }, sp(22, 28))
            .unwrap();
        d.exit(sp(22, 28)).unwrap();
        d.exit(sp(22, 28)).unwrap();

        d.enter(EnterPayload::Limit { n: 10 }, sp(29, source.len())).unwrap();

        d.exit(sp(0, source.len())).unwrap();
        d.exit(sp(0, source.len())).unwrap();

        let stmt = d.finish().unwrap();
        let select = match stmt {
            Statement::Select(s) => s,
            _ => panic!("expected a SELECT statement"),
        };
        assert_eq!(select.limit, 10);
    }

    #[test]
    fn join_part_with_using_clause() {
        let source = "SELECT * FROM A JOIN B USING(id)";
        let mut d = ParseDriver::new(source);
        d.enter(EnterPayload::Root, sp(0, source.len())).unwrap();
        d.enter(EnterPayload::SimpleSelect { distinct: false }, sp(0, source.len())).unwrap();
        d.enter(EnterPayload::SelectList, sp(7, 8)).unwrap();
        d.enter(EnterPayload::SelectItem { alias: None }, sp(7, 8)).unwrap();
        d.enter(EnterPayload::ValueExpression, sp(7, 8)).unwrap();
        d.enter(EnterPayload::StarAtom { table: String::new() }, sp(7, 8)).unwrap();
        d.exit(sp(7, 8)).unwrap();
        d.exit(sp(7, 8)).unwrap();
        d.exit(sp(7, 8)).unwrap();

        d.enter(EnterPayload::FromClause, sp(14, source.len())).unwrap();
        d.enter(EnterPayload::TableSource { db: String::new(), table: "A".into(), alias: String::new() }, sp(14, 15))
            .unwrap();
        d.enter(EnterPayload::JoinPart { kind: JoinKind::Default, natural: false }, sp(16, source.len())).unwrap();
        d.enter(EnterPayload::TableSource { db: String::new(), table: "B".into(), alias: String::new() }, sp(21, 22))
            .unwrap();
        d.exit(sp(21, 22)).unwrap();
        d.enter(EnterPayload::JoinSpecUsing { columns: vec!["id".into()] }, sp(23, 33)).unwrap();
        d.exit(sp(16, source.len())).unwrap(); // JoinPart
        d.exit(sp(14, 15)).unwrap(); // TableSource A
        d.exit(sp(14, source.len())).unwrap(); // FromClause
        d.exit(sp(0, source.len())).unwrap();
        d.exit(sp(0, source.len())).unwrap();

        let stmt = d.finish().unwrap();
        let select = match stmt {
            Statement::Select(s) => s,
            _ => panic!("expected a SELECT statement"),
        };
        let from = select.from_list.unwrap();
        let a = &from.tables[0];
        assert_eq!(a.table, "A");
        assert_eq!(a.joins.len(), 1);
        let join = &a.joins[0];
        assert_eq!(join.right.table, "B");
        let spec = join.spec.as_ref().unwrap();
        assert_eq!(spec.using.as_ref().unwrap()[0], ColumnRef::bare("id"));
    }
}
