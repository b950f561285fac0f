//! The adapter stack itself, reworked from the source's inheritance-based
//! dispatch into a stack of tagged variants: each [`Frame`] is an owned
//! builder for one grammar rule instance, and a child reports what it
//! built to its immediate parent via [`Frame::handle`] instead of calling a
//! virtual method through a weak back-pointer.

use crate::ir::*;

use super::error::ParseError;
use super::event::{normalize_identifier, EnterPayload, Span};

/// What one frame hands up to its parent when it is popped. A frame may
/// hand up more than one value — see [`Frame::finish`] — most notably a
/// `LogicalExpression`/`PredicateExpression` forwarding an
/// [`AreaRestrictor`] that a `QservFunctionSpec` child produced alongside
/// (or instead of) a `BoolTerm`.
#[derive(Debug, Clone)]
pub enum Built {
    Statement(Statement),
    SelectList(SelectList),
    TableRef(TableRef),
    JoinRef(JoinRef),
    JoinSpec(JoinSpec),
    FromClauseResult {
        from_list: FromList,
        where_clause: Option<WhereClause>,
        group_by: Option<GroupByClause>,
        having: Option<HavingClause>,
    },
    GroupBy(GroupByClause),
    Having(HavingClause),
    OrderBy(OrderByClause),
    OrderByTerm(OrderByTerm),
    BoolTerm(BoolTerm),
    ValueExpr(ValueExpr),
    ValueFactor(ValueFactor),
    AreaRestrictor(AreaRestrictor),
}

fn order_error(span: Span, source: &str, reason: impl Into<String>) -> ParseError {
    ParseError::order(span.fragment(source), reason)
}

fn bug(span: Span, source: &str, adapter: &str, reason: impl std::fmt::Display) -> ParseError {
    ParseError::unsupported(span.fragment(source), format!("{adapter}: {reason}"))
}

pub struct RootFrame {
    pub result: Option<Statement>,
}

pub struct SimpleSelectFrame {
    pub distinct: bool,
    pub select_list: Option<SelectList>,
    pub from: Option<Built>, // holds FromClauseResult
    pub order_by: Option<OrderByClause>,
    pub limit: i64,
}

pub struct SelectListFrame {
    pub items: Vec<ValueExpr>,
}

pub struct SelectItemFrame {
    pub alias: Option<String>,
    pub expr: Option<ValueExpr>,
}

pub struct FromClauseFrame {
    pub tables: Vec<TableRef>,
    pub where_root: Option<BoolTerm>,
    pub area_restrictors: Vec<AreaRestrictor>,
    pub group_by: Option<GroupByClause>,
    pub having: Option<HavingClause>,
}

pub struct TableSourceFrame {
    pub db: String,
    pub table: String,
    pub alias: String,
    pub joins: Vec<JoinRef>,
}

pub struct JoinPartFrame {
    pub kind: JoinKind,
    pub natural: bool,
    pub right: Option<TableRef>,
    pub spec: Option<JoinSpec>,
}

pub struct JoinSpecOnFrame {
    pub inner: Option<BoolTerm>,
}

pub struct GroupByClauseFrame {
    pub items: Vec<ValueExpr>,
}

pub struct HavingClauseFrame {
    pub inner: Option<BoolTerm>,
}

pub struct OrderByClauseFrame {
    pub terms: Vec<OrderByTerm>,
}

pub struct OrderByItemFrame {
    pub direction: Option<OrderDirection>,
    pub expr: Option<ValueExpr>,
}

pub struct PredicateExpressionFrame {
    pub inner: Option<Built>,
    pub restrictors: Vec<AreaRestrictor>,
}

pub struct LogicalExpressionFrame {
    pub is_and: bool,
    pub terms: Vec<BoolTerm>,
    pub restrictors: Vec<AreaRestrictor>,
}

pub struct NestedExpressionAtomFrame {
    pub inner: Option<BoolTerm>,
    pub restrictors: Vec<AreaRestrictor>,
}

pub struct CompPredicateFrame {
    pub op: CompOp,
    pub left: Option<ValueExpr>,
    pub right: Option<ValueExpr>,
}

pub struct InPredicateFrame {
    pub has_not: bool,
    pub value: Option<ValueExpr>,
    pub candidates: Vec<ValueExpr>,
}

pub struct BetweenPredicateFrame {
    pub has_not: bool,
    pub value: Option<ValueExpr>,
    pub min_value: Option<ValueExpr>,
    pub max_value: Option<ValueExpr>,
}

pub struct LikePredicateFrame {
    pub has_not: bool,
    pub value: Option<ValueExpr>,
    pub pattern: Option<ValueExpr>,
}

pub struct NullPredicateFrame {
    pub has_not: bool,
    pub value: Option<ValueExpr>,
}

pub struct ValueExpressionFrame {
    pub factors: Vec<ValueFactor>,
    pub ops: Vec<Op>,
}

pub struct FunctionCallFrame {
    pub name: String,
    pub is_agg: bool,
    pub params: Vec<ValueExpr>,
}

pub struct CallStatementFrame {
    pub constant: String,
}

pub struct SetGlobalFrame {
    pub var_name: String,
    pub var_value: String,
}

/// One grammar-rule instance's builder state, held on the adapter stack
/// between its enter and exit events.
pub enum Frame {
    Root(RootFrame),
    SimpleSelect(SimpleSelectFrame),
    SelectList(SelectListFrame),
    SelectItem(SelectItemFrame),
    FromClause(FromClauseFrame),
    TableSource(TableSourceFrame),
    JoinPart(JoinPartFrame),
    JoinSpecOn(JoinSpecOnFrame),
    GroupByClause(GroupByClauseFrame),
    HavingClause(HavingClauseFrame),
    OrderByClause(OrderByClauseFrame),
    OrderByItem(OrderByItemFrame),
    PredicateExpression(PredicateExpressionFrame),
    LogicalExpression(LogicalExpressionFrame),
    NestedExpressionAtom(NestedExpressionAtomFrame),
    CompPredicate(CompPredicateFrame),
    InPredicate(InPredicateFrame),
    BetweenPredicate(BetweenPredicateFrame),
    LikePredicate(LikePredicateFrame),
    NullPredicate(NullPredicateFrame),
    ValueExpression(ValueExpressionFrame),
    FunctionCall(FunctionCallFrame),
    CallStatement(CallStatementFrame),
    SetGlobal(SetGlobalFrame),
}

impl Frame {
    pub fn name(&self) -> &'static str {
        match self {
            Frame::Root(_) => "Root",
            Frame::SimpleSelect(_) => "SimpleSelect",
            Frame::SelectList(_) => "SelectList",
            Frame::SelectItem(_) => "SelectItem",
            Frame::FromClause(_) => "FromClause",
            Frame::TableSource(_) => "TableSource",
            Frame::JoinPart(_) => "JoinPart",
            Frame::JoinSpecOn(_) => "JoinSpecOn",
            Frame::GroupByClause(_) => "GroupByClause",
            Frame::HavingClause(_) => "HavingClause",
            Frame::OrderByClause(_) => "OrderByClause",
            Frame::OrderByItem(_) => "OrderByItem",
            Frame::PredicateExpression(_) => "PredicateExpression",
            Frame::LogicalExpression(_) => "LogicalExpression",
            Frame::NestedExpressionAtom(_) => "NestedExpressionAtom",
            Frame::CompPredicate(_) => "BinaryComparasionPredicate",
            Frame::InPredicate(_) => "InPredicate",
            Frame::BetweenPredicate(_) => "BetweenPredicate",
            Frame::LikePredicate(_) => "LikePredicate",
            Frame::NullPredicate(_) => "IsNullPredicate",
            Frame::ValueExpression(_) => "ValueExpression",
            Frame::FunctionCall(_) => "FunctionCall",
            Frame::CallStatement(_) => "CallStatement",
            Frame::SetGlobal(_) => "SetGlobalStatement",
        }
    }

    /// Build the initial frame for a freshly-entered rule. Performs the
    /// equivalent of the source's `checkContext`: payload variants that
    /// name an explicitly-rejected construct, or that carry a flag this
    /// adapter does not support, fail here rather than being pushed.
    pub fn from_enter(payload: EnterPayload, span: Span, source: &str) -> Result<Self, ParseError> {
        use EnterPayload::*;
        Ok(match payload {
            Root => Frame::Root(RootFrame { result: None }),
            SimpleSelect { distinct } => Frame::SimpleSelect(SimpleSelectFrame {
                distinct,
                select_list: None,
                from: None,
                order_by: None,
                limit: LIMIT_UNSET,
            }),
            SelectList => Frame::SelectList(SelectListFrame { items: Vec::new() }),
            SelectItem { alias } => Frame::SelectItem(SelectItemFrame { alias, expr: None }),
            FromClause => Frame::FromClause(FromClauseFrame {
                tables: Vec::new(),
                where_root: None,
                area_restrictors: Vec::new(),
                group_by: None,
                having: None,
            }),
            TableSource { db, table, alias } => {
                let db = normalize_identifier(&db, span, source, false)?;
                let table = normalize_identifier(&table, span, source, false)?;
                let alias =
                    if alias.is_empty() { String::new() } else { normalize_identifier(&alias, span, source, false)? };
                Frame::TableSource(TableSourceFrame { db, table, alias, joins: Vec::new() })
            }
            JoinPart { kind, natural } => Frame::JoinPart(JoinPartFrame { kind, natural, right: None, spec: None }),
            JoinSpecUsing { .. } => {
                return Err(bug(span, source, "JoinSpec", "USING columns must be handled at enter, not pushed"));
            }
            JoinSpecOn => Frame::JoinSpecOn(JoinSpecOnFrame { inner: None }),
            GroupByClause => Frame::GroupByClause(GroupByClauseFrame { items: Vec::new() }),
            HavingClause => Frame::HavingClause(HavingClauseFrame { inner: None }),
            OrderByClause => Frame::OrderByClause(OrderByClauseFrame { terms: Vec::new() }),
            OrderByItem { direction } => Frame::OrderByItem(OrderByItemFrame { direction, expr: None }),
            PredicateExpression => {
                Frame::PredicateExpression(PredicateExpressionFrame { inner: None, restrictors: Vec::new() })
            }
            LogicalExpression { is_and } => {
                Frame::LogicalExpression(LogicalExpressionFrame { is_and, terms: Vec::new(), restrictors: Vec::new() })
            }
            NotExpression => {
                return Err(bug(span, source, "NotExpression", "NOT expressions are folded into BoolFactor::has_not"));
            }
            BinaryComparisonPredicate { op } => {
                Frame::CompPredicate(CompPredicateFrame { op, left: None, right: None })
            }
            InPredicate { has_not } => {
                Frame::InPredicate(InPredicateFrame { has_not, value: None, candidates: Vec::new() })
            }
            BetweenPredicate { has_not } => Frame::BetweenPredicate(BetweenPredicateFrame {
                has_not,
                value: None,
                min_value: None,
                max_value: None,
            }),
            LikePredicate { has_not, has_escape } => {
                if has_escape {
                    return Err(ParseError::unsupported(span.fragment(source), "LIKE ... ESCAPE is not supported"));
                }
                Frame::LikePredicate(LikePredicateFrame { has_not, value: None, pattern: None })
            }
            IsNullPredicate { has_not } => Frame::NullPredicate(NullPredicateFrame { has_not, value: None }),
            QservFunctionSpec { .. } => {
                return Err(bug(span, source, "QservFunctionSpec", "handled as a leaf, not pushed"));
            }
            NestedExpressionAtom => {
                Frame::NestedExpressionAtom(NestedExpressionAtomFrame { inner: None, restrictors: Vec::new() })
            }
            CallStatement { constant } => Frame::CallStatement(CallStatementFrame { constant }),
            SetGlobalStatement { var_name, is_bool_literal, var_value } => {
                if is_bool_literal {
                    return Err(order_error(
                        span,
                        source,
                        format!("SET GLOBAL {var_name} = {var_value}: boolean literals are not supported"),
                    ));
                }
                Frame::SetGlobal(SetGlobalFrame { var_name, var_value })
            }
            ValueExpression => Frame::ValueExpression(ValueExpressionFrame { factors: Vec::new(), ops: Vec::new() }),
            FunctionCall { name, is_agg } => {
                Frame::FunctionCall(FunctionCallFrame { name, is_agg, params: Vec::new() })
            }
            ColumnRefAtom { .. } | ConstAtom { .. } | StarAtom { .. } | BinaryArithOp { .. } => {
                return Err(bug(span, source, "ValueAtom", "atoms are delivered as leaves, not pushed"));
            }
            Limit { .. } => return Err(bug(span, source, "SimpleSelect", "LIMIT is delivered as a leaf, not pushed")),
            Rejected { reason } => return Err(ParseError::unsupported(span.fragment(source), reason)),
        })
    }

    /// Feed a child's built value into this frame. Mirrors a `handle...`
    /// call the child makes on its parent in the source.
    pub fn handle(&mut self, built: Built, span: Span, source: &str) -> Result<(), ParseError> {
        match (self, built) {
            (Frame::Root(f), Built::Statement(s)) => {
                if f.result.is_some() {
                    return Err(bug(span, source, "Root", "more than one top-level statement"));
                }
                f.result = Some(s);
            }
            (Frame::SimpleSelect(f), Built::SelectList(sl)) => f.select_list = Some(sl),
            (Frame::SimpleSelect(f), built @ Built::FromClauseResult { .. }) => f.from = Some(built),
            (Frame::SimpleSelect(f), Built::OrderBy(ob)) => f.order_by = Some(ob),
            (Frame::SelectList(f), Built::ValueExpr(v)) => f.items.push(v),
            (Frame::SelectItem(f), Built::ValueExpr(v)) => f.expr = Some(v),
            (Frame::FromClause(f), Built::TableRef(t)) => f.tables.push(t),
            (Frame::FromClause(f), Built::BoolTerm(b)) => {
                if f.where_root.is_some() {
                    return Err(bug(span, source, "FromClause", "more than one WHERE predicate"));
                }
                // A WHERE clause with a single predicate and no enclosing
                // LogicalExpression arrives as a bare Factor; normalize to
                // the one-element And the CNF-shape invariant requires.
                f.where_root = Some(match b {
                    and_or @ (BoolTerm::And(_) | BoolTerm::Or(_)) => and_or,
                    factor => BoolTerm::And(vec![factor]),
                });
            }
            (Frame::FromClause(f), Built::AreaRestrictor(ar)) => f.area_restrictors.push(ar),
            (Frame::FromClause(f), Built::GroupBy(gb)) => f.group_by = Some(gb),
            (Frame::FromClause(f), Built::Having(h)) => f.having = Some(h),
            (Frame::TableSource(f), Built::JoinRef(j)) => f.joins.push(j),
            (Frame::JoinPart(f), Built::TableRef(t)) => {
                if f.right.is_some() {
                    return Err(bug(span, source, "JoinPart", "more than one joined table"));
                }
                f.right = Some(t);
            }
            (Frame::JoinPart(f), Built::JoinSpec(s)) => f.spec = Some(s),
            (Frame::JoinSpecOn(f), Built::BoolTerm(b)) => f.inner = Some(b),
            (Frame::GroupByClause(f), Built::ValueExpr(v)) => f.items.push(v),
            (Frame::HavingClause(f), Built::BoolTerm(b)) => f.inner = Some(b),
            (Frame::OrderByClause(f), Built::OrderByTerm(t)) => f.terms.push(t),
            (Frame::OrderByItem(f), Built::ValueExpr(v)) => f.expr = Some(v),
            (Frame::PredicateExpression(f), Built::AreaRestrictor(ar)) => f.restrictors.push(ar),
            (Frame::PredicateExpression(f), built) => {
                if f.inner.is_some() {
                    return Err(bug(span, source, "PredicateExpression", "more than one child result"));
                }
                f.inner = Some(built);
            }
            (Frame::LogicalExpression(f), Built::BoolTerm(b)) => f.terms.push(b),
            (Frame::LogicalExpression(f), Built::AreaRestrictor(ar)) => f.restrictors.push(ar),
            (Frame::NestedExpressionAtom(f), Built::BoolTerm(b)) => f.inner = Some(b),
            (Frame::NestedExpressionAtom(f), Built::AreaRestrictor(ar)) => f.restrictors.push(ar),
            (Frame::CompPredicate(f), Built::ValueExpr(v)) => {
                if f.left.is_none() {
                    f.left = Some(v);
                } else if f.right.is_none() {
                    f.right = Some(v);
                } else {
                    return Err(bug(span, source, "BinaryComparasionPredicate", "more than two operands"));
                }
            }
            (Frame::InPredicate(f), Built::ValueExpr(v)) => {
                if f.value.is_none() {
                    f.value = Some(v);
                } else {
                    f.candidates.push(v);
                }
            }
            (Frame::BetweenPredicate(f), Built::ValueExpr(v)) => {
                if f.value.is_none() {
                    f.value = Some(v);
                } else if f.min_value.is_none() {
                    f.min_value = Some(v);
                } else if f.max_value.is_none() {
                    f.max_value = Some(v);
                } else {
                    return Err(bug(span, source, "BetweenPredicate", "more than three operands"));
                }
            }
            (Frame::LikePredicate(f), Built::ValueExpr(v)) => {
                if f.value.is_none() {
                    f.value = Some(v);
                } else {
                    f.pattern = Some(v);
                }
            }
            (Frame::NullPredicate(f), Built::ValueExpr(v)) => f.value = Some(v),
            (Frame::ValueExpression(f), Built::ValueFactor(factor)) => {
                if f.factors.len() != f.ops.len() {
                    return Err(bug(span, source, "ValueExpression", "two factors with no operator between them"));
                }
                f.factors.push(factor);
            }
            (Frame::FunctionCall(f), Built::ValueExpr(v)) => f.params.push(v),
            (frame, built) => {
                return Err(order_error(
                    span,
                    source,
                    format!("{} cannot accept a {:?} child here", frame.name(), std::mem::discriminant(&built)),
                ));
            }
        }
        Ok(())
    }

    /// Record a binary operator between the two factors straddling it in an
    /// in-progress `ValueExpression`. Unlike [`Frame::handle`] this is not
    /// something a child rule reports on exit; it is delivered straight from
    /// a leaf event, since operators are tokens, not built values.
    pub fn push_op(&mut self, op: Op, span: Span, source: &str) -> Result<(), ParseError> {
        match self {
            Frame::ValueExpression(f) => {
                if f.ops.len() + 1 != f.factors.len() {
                    return Err(bug(span, source, "ValueExpression", "operator with no preceding factor"));
                }
                f.ops.push(op);
                Ok(())
            }
            frame => Err(bug(span, source, frame.name(), "received an operator but is not a ValueExpression")),
        }
    }

    /// Record a `LIMIT` row count on the enclosing `SimpleSelect`. Like
    /// [`Frame::push_op`], delivered straight from a leaf event rather than
    /// reported by a popped child.
    pub fn set_limit(&mut self, n: i64, span: Span, source: &str) -> Result<(), ParseError> {
        match self {
            Frame::SimpleSelect(f) => {
                f.limit = n;
                Ok(())
            }
            frame => Err(bug(span, source, frame.name(), "received a LIMIT but is not a SimpleSelect")),
        }
    }

    /// Pop this frame, producing what it hands up to its parent. A frame
    /// may hand up more than one value (see [`Built`]'s doc comment).
    pub fn finish(self, span: Span, source: &str) -> Result<Vec<Built>, ParseError> {
        Ok(match self {
            Frame::Root(_) => unreachable!("Root is popped by ParseDriver::finish, not Frame::finish"),
            Frame::SimpleSelect(f) => {
                let select_list = f.select_list.ok_or_else(|| bug(span, source, "SimpleSelect", "missing select list"))?;
                let (from_list, where_clause, group_by, having) = match f.from {
                    Some(Built::FromClauseResult { from_list, where_clause, group_by, having }) => {
                        (Some(from_list), where_clause, group_by, having)
                    }
                    None => (None, None, None, None),
                    Some(_) => return Err(bug(span, source, "SimpleSelect", "unexpected FROM child kind")),
                };
                vec![Built::Statement(Statement::Select(SelectStmt {
                    select_list,
                    from_list,
                    where_clause,
                    group_by,
                    having,
                    order_by: f.order_by,
                    distinct: f.distinct,
                    limit: f.limit,
                }))]
            }
            Frame::SelectList(f) => vec![Built::SelectList(SelectList { items: f.items })],
            Frame::SelectItem(f) => {
                let mut expr = f.expr.ok_or_else(|| bug(span, source, "SelectItem", "missing expression"))?;
                if let Some(alias) = f.alias {
                    expr = expr.with_alias(alias);
                }
                vec![Built::ValueExpr(expr)]
            }
            Frame::FromClause(f) => {
                let where_clause = if f.where_root.is_some() || !f.area_restrictors.is_empty() {
                    Some(WhereClause { root: f.where_root, area_restrictors: f.area_restrictors })
                } else {
                    None
                };
                vec![Built::FromClauseResult {
                    from_list: FromList { tables: f.tables },
                    where_clause,
                    group_by: f.group_by,
                    having: f.having,
                }]
            }
            Frame::TableSource(f) => {
                vec![Built::TableRef(TableRef { db: f.db, table: f.table, alias: f.alias, joins: f.joins })]
            }
            Frame::JoinPart(f) => {
                let right = f.right.ok_or_else(|| bug(span, source, "JoinPart", "missing joined table"))?;
                if f.natural && f.spec.is_some() {
                    return Err(ParseError::unsupported(span.fragment(source), "a NATURAL join may not carry USING/ON"));
                }
                vec![Built::JoinRef(JoinRef::new(right, f.kind, f.natural, f.spec))]
            }
            Frame::JoinSpecOn(f) => {
                let inner = f.inner.ok_or_else(|| bug(span, source, "JoinSpecOn", "missing ON predicate"))?;
                vec![Built::JoinSpec(JoinSpec::on(inner))]
            }
            Frame::GroupByClause(f) => vec![Built::GroupBy(GroupByClause { items: f.items })],
            Frame::HavingClause(f) => {
                let inner = f.inner.ok_or_else(|| bug(span, source, "HavingClause", "missing condition"))?;
                vec![Built::Having(HavingClause { condition: inner })]
            }
            Frame::OrderByClause(f) => vec![Built::OrderBy(OrderByClause { terms: f.terms })],
            Frame::OrderByItem(f) => {
                let expr = f.expr.ok_or_else(|| bug(span, source, "OrderByItem", "missing expression"))?;
                vec![Built::OrderByTerm(OrderByTerm { expr, direction: f.direction })]
            }
            Frame::PredicateExpression(f) => {
                let mut out = Vec::with_capacity(1 + f.restrictors.len());
                if let Some(inner) = f.inner {
                    out.push(inner);
                }
                out.extend(f.restrictors.into_iter().map(Built::AreaRestrictor));
                if out.is_empty() {
                    return Err(bug(span, source, "PredicateExpression", "no child produced a result"));
                }
                out
            }
            Frame::LogicalExpression(f) => {
                let mut out = Vec::with_capacity(1 + f.restrictors.len());
                if !f.terms.is_empty() {
                    let merged = if f.is_and { BoolTerm::merge_and(f.terms) } else { BoolTerm::merge_or(f.terms) };
                    out.push(Built::BoolTerm(merged));
                }
                out.extend(f.restrictors.into_iter().map(Built::AreaRestrictor));
                if out.is_empty() {
                    return Err(bug(span, source, "LogicalExpression", "no operands"));
                }
                out
            }
            Frame::NestedExpressionAtom(f) => {
                let mut out = Vec::with_capacity(1 + f.restrictors.len());
                if let Some(inner) = f.inner {
                    out.push(Built::BoolTerm(BoolTerm::Factor(BoolFactor::parenthesized(inner))));
                }
                out.extend(f.restrictors.into_iter().map(Built::AreaRestrictor));
                if out.is_empty() {
                    return Err(bug(span, source, "NestedExpressionAtom", "missing inner term"));
                }
                out
            }
            Frame::CompPredicate(f) => {
                let left = f.left.ok_or_else(|| bug(span, source, "BinaryComparasionPredicate", "missing left operand"))?;
                let right = f.right.ok_or_else(|| bug(span, source, "BinaryComparasionPredicate", "missing right operand"))?;
                vec![Built::BoolTerm(BoolTerm::Factor(BoolFactor::new(vec![BoolFactorTerm::Comp(CompPredicate {
                    left,
                    op: f.op,
                    right,
                })])))]
            }
            Frame::InPredicate(f) => {
                let value = f.value.ok_or_else(|| bug(span, source, "InPredicate", "missing operand"))?;
                vec![Built::BoolTerm(BoolTerm::Factor(BoolFactor::new(vec![BoolFactorTerm::In(InPredicate {
                    value,
                    has_not: f.has_not,
                    candidates: f.candidates,
                })])))]
            }
            Frame::BetweenPredicate(f) => {
                let value = f.value.ok_or_else(|| bug(span, source, "BetweenPredicate", "missing operand"))?;
                let min_value = f.min_value.ok_or_else(|| bug(span, source, "BetweenPredicate", "missing lower bound"))?;
                let max_value = f.max_value.ok_or_else(|| bug(span, source, "BetweenPredicate", "missing upper bound"))?;
                vec![Built::BoolTerm(BoolTerm::Factor(BoolFactor::new(vec![BoolFactorTerm::Between(
                    BetweenPredicate { value, has_not: f.has_not, min_value, max_value },
                )])))]
            }
            Frame::LikePredicate(f) => {
                let value = f.value.ok_or_else(|| bug(span, source, "LikePredicate", "missing operand"))?;
                let pattern = f.pattern.ok_or_else(|| bug(span, source, "LikePredicate", "missing pattern"))?;
                vec![Built::BoolTerm(BoolTerm::Factor(BoolFactor::new(vec![BoolFactorTerm::Like(LikePredicate {
                    value,
                    has_not: f.has_not,
                    pattern,
                })])))]
            }
            Frame::NullPredicate(f) => {
                let value = f.value.ok_or_else(|| bug(span, source, "IsNullPredicate", "missing operand"))?;
                vec![Built::BoolTerm(BoolTerm::Factor(BoolFactor::new(vec![BoolFactorTerm::Null(NullPredicate {
                    value,
                    has_not: f.has_not,
                })])))]
            }
            Frame::ValueExpression(f) => {
                if f.ops.len() + 1 != f.factors.len() {
                    return Err(bug(span, source, "ValueExpression", "trailing operator with no following factor"));
                }
                let mut ops = f.ops;
                ops.push(Op::None);
                let terms: Vec<(ValueFactor, Op)> = f.factors.into_iter().zip(ops).collect();
                let expr =
                    ValueExpr::from_terms(terms).map_err(|reason| bug(span, source, "ValueExpression", reason))?;
                vec![Built::ValueExpr(expr)]
            }
            Frame::FunctionCall(f) => {
                let fe = FuncExpr::new(f.name, f.params);
                let factor = if f.is_agg {
                    ValueFactor::agg_func(fe).map_err(|reason| bug(span, source, "FunctionCall", reason))?
                } else {
                    ValueFactor::Function(fe)
                };
                vec![Built::ValueFactor(factor)]
            }
            Frame::CallStatement(f) => vec![Built::Statement(Statement::Call(CallStmt { constant: f.constant }))],
            Frame::SetGlobal(f) => {
                vec![Built::Statement(Statement::SetGlobal(SetGlobalStmt { var_name: f.var_name, var_value: f.var_value }))]
            }
        })
    }
}
