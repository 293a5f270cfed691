//! JSON row store.
//!
//! Every table lives in `records` as `(table_name, id, body)`. Equality
//! filters and ordering run in SQLite through `json_extract`; the rest of
//! the filter set is evaluated on the decoded rows with
//! [`Filter::matches`], the same matcher that routes change events, so a
//! row is returned by a query exactly when a subscription with the same
//! filter would see it.

use anyhow::{Result, anyhow};
use chrono::{SecondsFormat, Utc};
use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;
use serde_json::{Map, Value};
use uuid::Uuid;

use prosync_types::{Filter, FilterOp, Order, Query};

use crate::Database;

/// Timestamp format of backend-filled columns. Fixed width, so text
/// ordering is chronological.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Fill the columns the backend owns: a v4 `id`, and `created_at` /
/// `updated_at` when absent.
pub fn apply_defaults(row: &mut Map<String, Value>) {
    if row.get("id").is_none_or(Value::is_null) {
        row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
    }
    let now = now_timestamp();
    for column in ["created_at", "updated_at"] {
        if row.get(column).is_none_or(Value::is_null) {
            row.insert(column.into(), Value::String(now.clone()));
        }
    }
}

/// Text form of a row id, as stored in the `id` column.
pub fn id_text(row: &Map<String, Value>) -> Option<String> {
    match row.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl Database {
    pub fn select_rows(&self, query: &Query) -> Result<Vec<Value>> {
        self.with_conn(|conn| {
            let rows = query_matching(conn, &query.table, &query.filters, &query.order)?
                .into_iter()
                .map(|(_, body)| body);
            Ok(match query.limit {
                Some(limit) => rows.take(limit).collect(),
                None => rows.collect(),
            })
        })
    }

    /// Insert one row, applying backend defaults. Fails with a SQLite
    /// constraint error if the id is taken.
    pub fn insert_row(&self, table: &str, row: Value) -> Result<Value> {
        let Value::Object(mut row) = row else {
            return Err(anyhow!("row for {} is not a JSON object", table));
        };
        apply_defaults(&mut row);
        let id = id_text(&row).ok_or_else(|| anyhow!("row for {} has a non-scalar id", table))?;
        let body = Value::Object(row);

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO records (table_name, id, body) VALUES (?1, ?2, ?3)",
                (table, &id, body.to_string()),
            )?;
            Ok(())
        })?;
        Ok(body)
    }

    /// Merge `patch` into every matching row. Returns `(old, new)` pairs.
    /// `id` is immutable and ignored in patches; `updated_at` is bumped
    /// on rows that carry it unless the patch sets it.
    pub fn update_rows(&self, table: &str, filters: &[Filter], patch: &Map<String, Value>) -> Result<Vec<(Value, Value)>> {
        self.with_conn(|conn| {
            let matching = query_matching(conn, table, filters, &[])?;
            let now = now_timestamp();
            let mut changed = Vec::with_capacity(matching.len());

            for (seq, old) in matching {
                let mut new = old.clone();
                if let Value::Object(fields) = &mut new {
                    for (key, value) in patch {
                        if key != "id" {
                            fields.insert(key.clone(), value.clone());
                        }
                    }
                    if fields.contains_key("updated_at") && !patch.contains_key("updated_at") {
                        fields.insert("updated_at".into(), Value::String(now.clone()));
                    }
                }
                conn.execute(
                    "UPDATE records SET body = ?1 WHERE seq = ?2",
                    (new.to_string(), seq),
                )?;
                changed.push((old, new));
            }
            Ok(changed)
        })
    }

    /// Delete every matching row and return the deleted rows.
    pub fn delete_rows(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>> {
        self.with_conn(|conn| {
            let matching = query_matching(conn, table, filters, &[])?;
            let mut deleted = Vec::with_capacity(matching.len());
            for (seq, old) in matching {
                conn.execute("DELETE FROM records WHERE seq = ?1", [seq])?;
                deleted.push(old);
            }
            Ok(deleted)
        })
    }

    pub fn count_rows(&self, table: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM records WHERE table_name = ?1",
                [table],
                |row| row.get(0),
            )?;
            Ok(n as usize)
        })
    }
}

fn json_path(column: &str) -> SqlValue {
    SqlValue::Text(format!("$.{}", column))
}

/// SQLite value `json_extract` yields for a JSON scalar. `None` for values
/// that cannot be compared in SQL.
fn sql_scalar(value: &Value) -> Option<SqlValue> {
    match value {
        Value::String(s) => Some(SqlValue::Text(s.clone())),
        Value::Bool(b) => Some(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(SqlValue::Integer(i)),
            None => n.as_f64().map(SqlValue::Real),
        },
        _ => None,
    }
}

/// Matching rows with their `seq`, in query order (insertion order last).
fn query_matching(
    conn: &Connection,
    table: &str,
    filters: &[Filter],
    order: &[Order],
) -> Result<Vec<(i64, Value)>> {
    let mut sql = String::from("SELECT seq, body FROM records WHERE table_name = ?");
    let mut params = vec![SqlValue::Text(table.to_string())];

    for f in filters.iter().filter(|f| f.op == FilterOp::Eq) {
        if let Some(bound) = sql_scalar(&f.value) {
            sql.push_str(" AND json_extract(body, ?) = ?");
            params.push(json_path(&f.column));
            params.push(bound);
        }
    }

    sql.push_str(" ORDER BY ");
    for o in order {
        // Nulls last ascending, first descending
        let dir = if o.ascending { "ASC" } else { "DESC" };
        sql.push_str(&format!(
            "(json_extract(body, ?) IS NULL) {dir}, json_extract(body, ?) {dir}, "
        ));
        params.push(json_path(&o.column));
        params.push(json_path(&o.column));
    }
    sql.push_str("seq ASC");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut matching = Vec::with_capacity(rows.len());
    for (seq, body) in rows {
        let body: Value = serde_json::from_str(&body)?;
        if filters.iter().all(|f| f.matches(&body)) {
            matching.push((seq, body));
        }
    }
    Ok(matching)
}
