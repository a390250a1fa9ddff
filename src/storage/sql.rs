//! SQL text for the operations of [`Storage`](super::Storage).
//!
//! Identifiers are backtick-quoted and values are inlined with
//! [`Value::sql_literal`] / [`Value::sql_comparison`], so a relational adapter
//! can send the text as is.

use crate::core::{FieldMap, Value};

use super::{Limit, Predicate, Selection, WriteMode};

pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Renders the `WHERE` body, or `None` when the predicate matches everything.
pub fn render_predicate(predicate: &Predicate) -> Option<String> {
    if predicate.is_all() {
        return None;
    }
    match predicate {
        Predicate::All => None,
        Predicate::Raw(raw) => Some(raw.trim().to_string()),
        Predicate::Fields(map) => Some(
            map.iter()
                .map(|(column, value)| format!("{} {}", quote_ident(column), value.sql_comparison()))
                .collect::<Vec<_>>()
                .join(" AND "),
        ),
    }
}

pub fn render_select(
    table: &str,
    selection: &Selection,
    predicate: &Predicate,
    order: Option<&str>,
    limit: Option<Limit>,
) -> String {
    let what = match selection {
        Selection::All => "*".to_string(),
        Selection::Count => "COUNT(*)".to_string(),
        Selection::Columns(columns) => columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", "),
    };

    let mut sql = format!("SELECT {} FROM {}", what, quote_ident(table));
    if let Some(filter) = render_predicate(predicate) {
        sql.push_str(" WHERE ");
        sql.push_str(&filter);
    }
    if let Some(order) = order.map(str::trim).filter(|o| !o.is_empty()) {
        sql.push_str(" ORDER BY ");
        sql.push_str(order);
    }
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    sql
}

pub fn render_insert(table: &str, fields: &FieldMap, mode: WriteMode) -> String {
    let columns: Vec<&str> = fields.keys().map(String::as_str).collect();
    let values: Vec<Value> = fields.values().cloned().collect();
    render_insert_batch(table, &columns, std::slice::from_ref(&values), mode)
}

pub fn render_insert_batch<S: AsRef<str>>(
    table: &str,
    columns: &[S],
    rows: &[Vec<Value>],
    mode: WriteMode,
) -> String {
    let columns = columns
        .iter()
        .map(|c| quote_ident(c.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    let rows = rows
        .iter()
        .map(|row| {
            row.iter()
                .map(Value::sql_literal)
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("),(");

    format!(
        "{} INTO {} ({}) VALUES ({})",
        mode.keyword(),
        quote_ident(table),
        columns,
        rows
    )
}

pub fn render_update(table: &str, fields: &FieldMap, predicate: &Predicate) -> String {
    let assignments = fields
        .iter()
        .map(|(column, value)| format!("{} = {}", quote_ident(column), value.sql_literal()))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!("UPDATE {} SET {}", quote_ident(table), assignments);
    if let Some(filter) = render_predicate(predicate) {
        sql.push_str(" WHERE ");
        sql.push_str(&filter);
    }
    sql
}

pub fn render_delete(table: &str, predicate: &Predicate, limit: Option<u64>) -> String {
    let mut sql = format!("DELETE FROM {}", quote_ident(table));
    if let Some(filter) = render_predicate(predicate) {
        sql.push_str(" WHERE ");
        sql.push_str(&filter);
    }
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    sql
}
