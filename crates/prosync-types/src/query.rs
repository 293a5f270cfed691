//! Table query model shared by every backend implementation.
//!
//! A [`Query`] is one table read: a conjunction of column filters, an
//! ordering and an optional limit. Backends translate it into their own
//! dialect (PostgREST query strings, SQLite `json_extract` predicates).

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Case-sensitive pattern with `%` and `_` wildcards.
    Like,
    /// Case-insensitive pattern with `%` and `_` wildcards.
    ILike,
    /// `IS NULL` test; the filter value is ignored.
    IsNull,
    /// Membership in a JSON array of values.
    In,
}

impl FilterOp {
    /// PostgREST operator keyword.
    pub fn keyword(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Like => "like",
            FilterOp::ILike => "ilike",
            FilterOp::IsNull => "is",
            FilterOp::In => "in",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

impl Filter {
    pub fn new(column: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Eq, value)
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::new(column, FilterOp::IsNull, Value::Null)
    }

    /// PostgREST right-hand side, e.g. `eq.42` or `in.(a,b)`.
    pub fn to_postgrest(&self) -> String {
        match self.op {
            FilterOp::IsNull => "is.null".to_string(),
            FilterOp::In => {
                let items: Vec<String> = self
                    .value
                    .as_array()
                    .map(|items| items.iter().map(scalar_text).collect())
                    .unwrap_or_default();
                format!("in.({})", items.join(","))
            }
            FilterOp::Like | FilterOp::ILike => {
                // PostgREST accepts `*` as a URL-safe alias for `%`
                format!("{}.{}", self.op.keyword(), scalar_text(&self.value).replace('%', "*"))
            }
            _ => format!("{}.{}", self.op.keyword(), scalar_text(&self.value)),
        }
    }

    /// Realtime filter expression, e.g. `channel_id=eq.<uuid>`.
    pub fn to_realtime(&self) -> String {
        format!("{}={}", self.column, self.to_postgrest())
    }

    /// Evaluate the filter against a row held in memory. Used to route
    /// change events to subscriptions.
    pub fn matches(&self, row: &Value) -> bool {
        let field = row.get(&self.column).unwrap_or(&Value::Null);
        match self.op {
            FilterOp::Eq => scalar_eq(field, &self.value),
            FilterOp::Neq => !scalar_eq(field, &self.value),
            FilterOp::IsNull => field.is_null(),
            FilterOp::In => self
                .value
                .as_array()
                .is_some_and(|items| items.iter().any(|v| scalar_eq(field, v))),
            FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
                match compare(field, &self.value) {
                    Some(ord) => match self.op {
                        FilterOp::Gt => ord.is_gt(),
                        FilterOp::Gte => ord.is_ge(),
                        FilterOp::Lt => ord.is_lt(),
                        _ => ord.is_le(),
                    },
                    None => false,
                }
            }
            FilterOp::Like | FilterOp::ILike => {
                let (Some(text), Some(pattern)) = (field.as_str(), self.value.as_str()) else {
                    return false;
                };
                if self.op == FilterOp::ILike {
                    like_match(&text.to_lowercase(), &pattern.to_lowercase())
                } else {
                    like_match(text, pattern)
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn to_postgrest(&self) -> String {
        format!(
            "{}.{}",
            self.column,
            if self.ascending { "asc" } else { "desc" }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub table: String,
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn is_null(self, column: impl Into<String>) -> Self {
        self.filter(Filter::is_null(column))
    }

    pub fn gte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::new(column, FilterOp::Gte, value))
    }

    pub fn lt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::new(column, FilterOp::Lt, value))
    }

    pub fn ilike(self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        let pattern: String = pattern.into();
        self.filter(Filter::new(column, FilterOp::ILike, pattern))
    }

    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.order.push(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Every column name referenced by the query.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.filters
            .iter()
            .map(|f| f.column.as_str())
            .chain(self.order.iter().map(|o| o.column.as_str()))
    }

    /// PostgREST query-string pairs, in a stable order.
    pub fn to_postgrest_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), "*".to_string())];
        for f in &self.filters {
            pairs.push((f.column.clone(), f.to_postgrest()));
        }
        if !self.order.is_empty() {
            let order: Vec<String> = self.order.iter().map(Order::to_postgrest).collect();
            pairs.push(("order".to_string(), order.join(",")));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit".to_string(), limit.to_string()));
        }
        pairs
    }
}

/// Table and column names are interpolated into backend dialects, so they
/// are restricted to plain identifiers.
pub fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 63
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit())
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => {
            // Timestamps written by different clients differ in fractional
            // digits and offset notation.
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(a), Ok(b)) => Some(a.cmp(&b)),
                _ => Some(x.cmp(y)),
            }
        }
        _ => None,
    }
}

/// SQL `LIKE` semantics: `%` matches any run, `_` matches one character.
fn like_match(text: &str, pattern: &str) -> bool {
    let t: Vec<char> = text.chars().collect();
    let p: Vec<char> = pattern.chars().collect();
    let (mut ti, mut pi) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '_' || p[pi] == t[ti]) {
            ti += 1;
            pi += 1;
        } else if pi < p.len() && p[pi] == '%' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '%' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn postgrest_pairs_encode_filters_order_and_limit() {
        let q = Query::table("tasks")
            .eq("board_id", "B1")
            .is_null("parent_id")
            .order_by("position", true)
            .order_by("created_at", false)
            .limit(50);

        let pairs = q.to_postgrest_pairs();
        assert_eq!(
            pairs,
            vec![
                ("select".into(), "*".into()),
                ("board_id".into(), "eq.B1".into()),
                ("parent_id".into(), "is.null".into()),
                ("order".into(), "position.asc,created_at.desc".into()),
                ("limit".into(), "50".into()),
            ]
        );
    }

    #[test]
    fn in_and_like_filters() {
        let f = Filter::new("status", FilterOp::In, json!(["open", "pending"]));
        assert_eq!(f.to_postgrest(), "in.(open,pending)");
        assert!(f.matches(&json!({"status": "pending"})));
        assert!(!f.matches(&json!({"status": "closed"})));

        let f = Filter::new("title", FilterOp::ILike, "%vpn%");
        assert_eq!(f.to_postgrest(), "ilike.*vpn*");
        assert!(f.matches(&json!({"title": "Reset VPN token"})));
        assert!(!Filter::new("title", FilterOp::Like, "%vpn%").matches(&json!({"title": "Reset VPN token"})));
    }

    #[test]
    fn realtime_filter_expression() {
        let f = Filter::eq("channel_id", "c-1");
        assert_eq!(f.to_realtime(), "channel_id=eq.c-1");
    }

    #[test]
    fn numeric_comparisons_ignore_representation() {
        assert!(Filter::eq("n", 3).matches(&json!({"n": 3.0})));
        assert!(Filter::new("n", FilterOp::Gte, 3).matches(&json!({"n": 4})));
        assert!(!Filter::new("n", FilterOp::Lt, 3).matches(&json!({"n": "2"})));
    }

    #[test]
    fn timestamps_compare_chronologically() {
        let after = Filter::new("started_at", FilterOp::Gte, "2026-10-19T08:00:00Z");
        assert!(after.matches(&json!({"started_at": "2026-10-19T08:00:00.500Z"})));
        assert!(after.matches(&json!({"started_at": "2026-10-19T10:00:00+02:00"})));
        assert!(!after.matches(&json!({"started_at": "2026-10-19T07:59:59.999999Z"})));
    }

    #[test]
    fn like_wildcards() {
        assert!(like_match("KB-12", "KB-__"));
        assert!(like_match("anything", "%"));
        assert!(like_match("abcabd", "%abd"));
        assert!(!like_match("abc", "ab"));
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("board_id"));
        assert!(!is_identifier("board_id') OR 1=1 --"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier(""));
    }
}
