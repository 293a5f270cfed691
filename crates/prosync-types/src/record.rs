//! The single decoding boundary between loosely-typed backend rows and
//! typed records.
//!
//! Every entity declares its table and identity through [`Record`]. Rows
//! go through [`decode`], which fails with a [`DecodeError`] when a
//! required column is missing or has the wrong shape. Nullable columns are
//! defaulted by the record's own `#[serde(default)]` attributes, so the
//! coercion rules live next to the field they apply to.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

/// A typed row of a backend table.
pub trait Record: DeserializeOwned + Serialize + Clone + Send + Sync + 'static {
    /// Backend table the record lives in.
    const TABLE: &'static str;

    fn id(&self) -> Uuid;
}

#[derive(Debug, thiserror::Error)]
#[error("malformed {table} row: {source}")]
pub struct DecodeError {
    pub table: &'static str,
    /// Raw `id` column of the offending row, when it had one.
    pub id: Option<String>,
    #[source]
    pub source: serde_json::Error,
}

/// Decode one row into `T`.
pub fn decode<T: Record>(row: Value) -> Result<T, DecodeError> {
    let id = row
        .get("id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    serde_json::from_value(row).map_err(|source| DecodeError {
        table: T::TABLE,
        id,
        source,
    })
}

/// Decode a batch of rows, failing on the first malformed one.
pub fn decode_all<T: Record>(rows: Vec<Value>) -> Result<Vec<T>, DecodeError> {
    rows.into_iter().map(decode).collect()
}

/// Serialize a payload into a row object. Payload structs are plain
/// derives, so failure here means a non-object payload type.
pub fn to_row<P: Serialize>(payload: &P) -> Result<Value, serde_json::Error> {
    let value = serde_json::to_value(payload)?;
    if !value.is_object() {
        return Err(serde::ser::Error::custom("row payload must serialize to an object"));
    }
    Ok(value)
}

/// Serde helpers for columns that may come back as `null`.
pub mod nullable {
    use serde::{Deserialize, Deserializer};

    /// Treat an explicit `null` the same as a missing column.
    pub fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Default + Deserialize<'de>,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::ChatMessage;
    use serde_json::json;

    #[test]
    fn missing_nullable_columns_default() {
        let id = Uuid::new_v4();
        let row = json!({
            "id": id,
            "channel_id": Uuid::new_v4(),
            "author_id": Uuid::new_v4(),
            "body": null,
            "reactions": null,
            "created_at": "2026-03-01T09:00:00Z",
        });

        let msg: ChatMessage = decode(row).unwrap();
        assert_eq!(msg.id, id);
        assert_eq!(msg.body, "");
        assert!(msg.reactions.is_empty());
        assert!(!msg.pinned);
        assert!(msg.parent_id.is_none());
    }

    #[test]
    fn missing_scope_key_is_an_error() {
        let row = json!({
            "id": "6c1b3c2e-8d4f-4a55-9d1e-1f2a3b4c5d6e",
            "author_id": Uuid::new_v4(),
            "body": "hello",
            "created_at": "2026-03-01T09:00:00Z",
        });

        let err = decode::<ChatMessage>(row).unwrap_err();
        assert_eq!(err.table, "chat_messages");
        assert_eq!(err.id.as_deref(), Some("6c1b3c2e-8d4f-4a55-9d1e-1f2a3b4c5d6e"));
        assert!(err.to_string().contains("channel_id"));
    }

    #[test]
    fn to_row_rejects_scalars() {
        assert!(to_row(&42).is_err());
        assert!(to_row(&json!({"a": 1})).is_ok());
    }
}
