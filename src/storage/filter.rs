//! Compiles raw `WHERE` / `ORDER BY` text into something the in-memory engine
//! can evaluate against a row.

use std::cmp::Ordering;

use sqlparser::ast as sql_ast;
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

use crate::core::{ModelError, Result, Row, Value};

use super::pattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Column(String),
    Literal(Value),
    Compare {
        left: Box<Filter>,
        op: CompareOp,
        right: Box<Filter>,
    },
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
    Not(Box<Filter>),
    IsNull {
        expr: Box<Filter>,
        negated: bool,
    },
    InList {
        expr: Box<Filter>,
        list: Vec<Filter>,
        negated: bool,
    },
    Like {
        expr: Box<Filter>,
        pattern: Box<Filter>,
        negated: bool,
        case_insensitive: bool,
    },
    Between {
        expr: Box<Filter>,
        low: Box<Filter>,
        high: Box<Filter>,
        negated: bool,
    },
}

fn parse_single_query(sql: &str) -> Result<sql_ast::Query> {
    let mut statements = Parser::parse_sql(&MySqlDialect {}, sql)?;
    if statements.len() != 1 {
        return Err(ModelError::ParseError(format!(
            "Expected a single statement, got {}",
            statements.len()
        )));
    }
    match statements.remove(0) {
        sql_ast::Statement::Query(query) => Ok(*query),
        other => Err(ModelError::ParseError(format!("Expected a query, got: {}", other))),
    }
}

impl Filter {
    pub fn parse(raw: &str) -> Result<Self> {
        let query = parse_single_query(&format!("SELECT * FROM t WHERE {}", raw))?;
        let sql_ast::SetExpr::Select(select) = *query.body else {
            return Err(ModelError::ParseError(format!("Unsupported filter: {}", raw)));
        };
        let selection = select
            .selection
            .ok_or_else(|| ModelError::ParseError(format!("Empty filter: {}", raw)))?;
        Self::convert(selection)
    }

    fn convert(expr: sql_ast::Expr) -> Result<Self> {
        use sql_ast::BinaryOperator as Op;

        match expr {
            sql_ast::Expr::Identifier(ident) => Ok(Self::Column(ident.value)),
            sql_ast::Expr::CompoundIdentifier(idents) => idents
                .into_iter()
                .last()
                .map(|ident| Self::Column(ident.value))
                .ok_or_else(|| ModelError::ParseError("Empty identifier".into())),
            sql_ast::Expr::Value(value) => Ok(Self::Literal(convert_value(&value.value)?)),
            sql_ast::Expr::Nested(inner) => Self::convert(*inner),
            sql_ast::Expr::BinaryOp { left, op, right } => {
                let left = Box::new(Self::convert(*left)?);
                let right = Box::new(Self::convert(*right)?);
                let op = match op {
                    Op::And => return Ok(Self::And(left, right)),
                    Op::Or => return Ok(Self::Or(left, right)),
                    Op::Eq => CompareOp::Eq,
                    Op::NotEq => CompareOp::NotEq,
                    Op::Lt => CompareOp::Lt,
                    Op::LtEq => CompareOp::LtEq,
                    Op::Gt => CompareOp::Gt,
                    Op::GtEq => CompareOp::GtEq,
                    other => {
                        return Err(ModelError::ParseError(format!(
                            "Unsupported operator: {}",
                            other
                        )));
                    }
                };
                Ok(Self::Compare { left, op, right })
            }
            sql_ast::Expr::UnaryOp { op, expr } => match op {
                sql_ast::UnaryOperator::Not => Ok(Self::Not(Box::new(Self::convert(*expr)?))),
                sql_ast::UnaryOperator::Minus => match Self::convert(*expr)? {
                    Self::Literal(Value::Integer(i)) => Ok(Self::Literal(Value::Integer(-i))),
                    Self::Literal(Value::Float(f)) => Ok(Self::Literal(Value::Float(-f))),
                    other => Err(ModelError::ParseError(format!("Cannot negate {:?}", other))),
                },
                other => Err(ModelError::ParseError(format!("Unsupported operator: {}", other))),
            },
            sql_ast::Expr::IsNull(inner) => Ok(Self::IsNull {
                expr: Box::new(Self::convert(*inner)?),
                negated: false,
            }),
            sql_ast::Expr::IsNotNull(inner) => Ok(Self::IsNull {
                expr: Box::new(Self::convert(*inner)?),
                negated: true,
            }),
            sql_ast::Expr::InList { expr, list, negated, .. } => Ok(Self::InList {
                expr: Box::new(Self::convert(*expr)?),
                list: list.into_iter().map(Self::convert).collect::<Result<Vec<_>>>()?,
                negated,
            }),
            sql_ast::Expr::Like { negated, expr, pattern, escape_char, .. } => {
                Self::like(*expr, *pattern, negated, escape_char.is_some(), false)
            }
            sql_ast::Expr::ILike { negated, expr, pattern, escape_char, .. } => {
                Self::like(*expr, *pattern, negated, escape_char.is_some(), true)
            }
            sql_ast::Expr::Between { expr, negated, low, high, .. } => Ok(Self::Between {
                expr: Box::new(Self::convert(*expr)?),
                low: Box::new(Self::convert(*low)?),
                high: Box::new(Self::convert(*high)?),
                negated,
            }),
            other => Err(ModelError::ParseError(format!(
                "Unsupported filter expression: {}",
                other
            ))),
        }
    }

    fn like(
        expr: sql_ast::Expr,
        pattern: sql_ast::Expr,
        negated: bool,
        has_escape: bool,
        case_insensitive: bool,
    ) -> Result<Self> {
        if has_escape {
            return Err(ModelError::ParseError("LIKE ESCAPE is not supported".into()));
        }
        Ok(Self::Like {
            expr: Box::new(Self::convert(expr)?),
            pattern: Box::new(Self::convert(pattern)?),
            negated,
            case_insensitive,
        })
    }

    /// True only when the filter evaluates to TRUE (NULL counts as no match).
    pub fn matches(&self, row: &Row) -> Result<bool> {
        Ok(matches!(self.eval(row)?, Value::Boolean(true)))
    }

    fn eval(&self, row: &Row) -> Result<Value> {
        match self {
            Self::Column(name) => Ok(row.get(name).cloned().unwrap_or(Value::Null)),
            Self::Literal(value) => Ok(value.clone()),
            Self::Compare { left, op, right } => {
                let left = left.eval(row)?;
                let right = right.eval(row)?;
                if left.is_null() || right.is_null() {
                    return Ok(Value::Null);
                }
                let ordering = match left.compare(&right) {
                    Ok(ordering) => ordering,
                    // Mismatched types never compare equal
                    Err(_) => return Ok(Value::Boolean(*op == CompareOp::NotEq)),
                };
                Ok(Value::Boolean(match op {
                    CompareOp::Eq => ordering == Ordering::Equal,
                    CompareOp::NotEq => ordering != Ordering::Equal,
                    CompareOp::Lt => ordering == Ordering::Less,
                    CompareOp::LtEq => ordering != Ordering::Greater,
                    CompareOp::Gt => ordering == Ordering::Greater,
                    CompareOp::GtEq => ordering != Ordering::Less,
                }))
            }
            Self::And(left, right) => {
                let (l, r) = (truth(&left.eval(row)?), truth(&right.eval(row)?));
                Ok(match (l, r) {
                    (Some(false), _) | (_, Some(false)) => Value::Boolean(false),
                    (Some(true), Some(true)) => Value::Boolean(true),
                    _ => Value::Null,
                })
            }
            Self::Or(left, right) => {
                let (l, r) = (truth(&left.eval(row)?), truth(&right.eval(row)?));
                Ok(match (l, r) {
                    (Some(true), _) | (_, Some(true)) => Value::Boolean(true),
                    (Some(false), Some(false)) => Value::Boolean(false),
                    _ => Value::Null,
                })
            }
            Self::Not(inner) => Ok(match truth(&inner.eval(row)?) {
                Some(b) => Value::Boolean(!b),
                None => Value::Null,
            }),
            Self::IsNull { expr, negated } => {
                Ok(Value::Boolean(expr.eval(row)?.is_null() != *negated))
            }
            Self::InList { expr, list, negated } => {
                let value = expr.eval(row)?;
                if value.is_null() {
                    return Ok(Value::Null);
                }
                let mut found = false;
                for item in list {
                    if value.sql_eq(&item.eval(row)?) {
                        found = true;
                        break;
                    }
                }
                Ok(Value::Boolean(found != *negated))
            }
            Self::Like { expr, pattern, negated, case_insensitive } => {
                let value = expr.eval(row)?;
                let pattern = pattern.eval(row)?;
                if value.is_null() || pattern.is_null() {
                    return Ok(Value::Null);
                }
                let matched = pattern::like(&value.to_string(), &pattern.to_string(), *case_insensitive)?;
                Ok(Value::Boolean(matched != *negated))
            }
            Self::Between { expr, low, high, negated } => {
                let value = expr.eval(row)?;
                let (low, high) = (low.eval(row)?, high.eval(row)?);
                if value.is_null() || low.is_null() || high.is_null() {
                    return Ok(Value::Null);
                }
                let inside = matches!(value.compare(&low), Ok(o) if o != Ordering::Less)
                    && matches!(value.compare(&high), Ok(o) if o != Ordering::Greater);
                Ok(Value::Boolean(inside != *negated))
            }
        }
    }
}

fn truth(value: &Value) -> Option<bool> {
    match value {
        Value::Null => None,
        other => Some(other.as_bool()),
    }
}

fn convert_value(value: &sql_ast::Value) -> Result<Value> {
    match value {
        sql_ast::Value::Number(n, _) => {
            if let Ok(i) = n.parse::<i64>() {
                Ok(Value::Integer(i))
            } else {
                n.parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| ModelError::ParseError(format!("Invalid number: {}", n)))
            }
        }
        sql_ast::Value::SingleQuotedString(s) | sql_ast::Value::DoubleQuotedString(s) => {
            Ok(Value::Text(s.clone()))
        }
        sql_ast::Value::Boolean(b) => Ok(Value::Boolean(*b)),
        sql_ast::Value::Null => Ok(Value::Null),
        other => Err(ModelError::ParseError(format!("Unsupported literal: {}", other))),
    }
}

/// One `ORDER BY` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

pub fn parse_order(order: &str) -> Result<Vec<SortKey>> {
    let query = parse_single_query(&format!("SELECT * FROM t ORDER BY {}", order))?;
    let Some(order_by) = query.order_by else {
        return Ok(Vec::new());
    };

    match order_by.kind {
        sql_ast::OrderByKind::Expressions(exprs) => exprs
            .into_iter()
            .map(|term| {
                let column = match Filter::convert(term.expr)? {
                    Filter::Column(column) => column,
                    other => {
                        return Err(ModelError::ParseError(format!(
                            "Only columns can be ordered by, got {:?}",
                            other
                        )));
                    }
                };
                Ok(SortKey {
                    column,
                    descending: term.options.asc.map(|asc| !asc).unwrap_or(false),
                })
            })
            .collect(),
        sql_ast::OrderByKind::All(_) => Err(ModelError::ParseError("ORDER BY ALL is not supported".into())),
    }
}

/// Orders rows by the given keys; incomparable values keep their relative order.
pub fn sort_rows(rows: &mut [Row], keys: &[SortKey]) {
    rows.sort_by(|a, b| {
        for key in keys {
            let left = a.get(&key.column).unwrap_or(&Value::Null);
            let right = b.get(&key.column).unwrap_or(&Value::Null);
            let ordering = left.compare(right).unwrap_or(Ordering::Equal);
            let ordering = if key.descending { ordering.reverse() } else { ordering };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fields;

    fn row() -> Row {
        fields([
            ("id", Value::Integer(3)),
            ("name", Value::from("Central")),
            ("zone", Value::Null),
            ("active", Value::Boolean(true)),
        ])
    }

    #[test]
    fn test_comparison_and_logic() {
        let filter = Filter::parse("id >= 3 AND (name = 'Central' OR id = 9)").unwrap();
        assert!(filter.matches(&row()).unwrap());

        let filter = Filter::parse("NOT id = 3").unwrap();
        assert!(!filter.matches(&row()).unwrap());
    }

    #[test]
    fn test_backtick_identifiers_and_double_quotes() {
        let filter = Filter::parse("`name` = \"Central\" AND `active` = 1").unwrap();
        assert!(filter.matches(&row()).unwrap());
    }

    #[test]
    fn test_null_semantics() {
        assert!(Filter::parse("zone IS NULL").unwrap().matches(&row()).unwrap());
        assert!(!Filter::parse("zone = 1").unwrap().matches(&row()).unwrap());
        assert!(!Filter::parse("NOT zone = 1").unwrap().matches(&row()).unwrap());
    }

    #[test]
    fn test_in_like_between() {
        assert!(Filter::parse("id IN (1, 2, 3)").unwrap().matches(&row()).unwrap());
        assert!(Filter::parse("id NOT IN (4, 5)").unwrap().matches(&row()).unwrap());
        assert!(Filter::parse("name LIKE 'Cen%'").unwrap().matches(&row()).unwrap());
        assert!(Filter::parse("id BETWEEN 1 AND 3").unwrap().matches(&row()).unwrap());
        assert!(Filter::parse("id > -1").unwrap().matches(&row()).unwrap());
    }

    #[test]
    fn test_rejects_multiple_statements() {
        assert!(Filter::parse("1 = 1; DROP TABLE t").is_err());
    }

    #[test]
    fn test_parse_order() {
        let keys = parse_order("age DESC, `name`").unwrap();
        assert_eq!(
            keys,
            vec![
                SortKey { column: "age".into(), descending: true },
                SortKey { column: "name".into(), descending: false },
            ]
        );
    }

    #[test]
    fn test_sort_rows_puts_nulls_last() {
        let mut rows = vec![
            fields([("age", Value::Null)]),
            fields([("age", Value::Integer(30))]),
            fields([("age", Value::Integer(20))]),
        ];
        sort_rows(&mut rows, &[SortKey { column: "age".into(), descending: false }]);
        assert_eq!(rows[0]["age"], Value::Integer(20));
        assert_eq!(rows[2]["age"], Value::Null);
    }
}
