//! Typed table operations shared by the services. Every row read through
//! here passes the decode boundary.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use prosync_remote::{RemoteClient, Subscription};
use prosync_types::record::to_row;
use prosync_types::{ChannelSpec, Filter, Query, Record, decode, decode_all};

use crate::ServiceError;

pub(crate) fn by_id(id: Uuid) -> [Filter; 1] {
    [Filter::eq("id", id.to_string())]
}

pub(crate) fn current_user<R: RemoteClient>(remote: &R) -> Result<Uuid, ServiceError> {
    remote
        .session()
        .map(|s| s.user_id())
        .ok_or(ServiceError::NotSignedIn)
}

pub(crate) async fn fetch_all<T: Record, R: RemoteClient>(remote: &R, query: Query) -> Result<Vec<T>, ServiceError> {
    let rows = remote.select(&query).await?;
    Ok(decode_all(rows)?)
}

pub(crate) async fn fetch_first<T: Record, R: RemoteClient>(remote: &R, query: Query) -> Result<Option<T>, ServiceError> {
    let rows = remote.select(&query.limit(1)).await?;
    match rows.into_iter().next() {
        Some(row) => Ok(Some(decode(row)?)),
        None => Ok(None),
    }
}

pub(crate) async fn fetch_one<T: Record, R: RemoteClient>(remote: &R, id: Uuid) -> Result<T, ServiceError> {
    fetch_first(remote, Query::table(T::TABLE).eq("id", id.to_string()))
        .await?
        .ok_or(ServiceError::NotFound { entity: T::TABLE, id })
}

pub(crate) async fn insert<T: Record, P: Serialize, R: RemoteClient>(remote: &R, payload: &P) -> Result<T, ServiceError> {
    let row = remote.insert(T::TABLE, to_row(payload)?).await?;
    Ok(decode(row)?)
}

pub(crate) async fn update<T: Record, R: RemoteClient>(remote: &R, id: Uuid, patch: Value) -> Result<T, ServiceError> {
    let rows = remote.update(T::TABLE, &by_id(id), patch).await?;
    match rows.into_iter().next() {
        Some(row) => Ok(decode(row)?),
        None => Err(ServiceError::NotFound { entity: T::TABLE, id }),
    }
}

pub(crate) async fn delete<T: Record, R: RemoteClient>(remote: &R, id: Uuid) -> Result<(), ServiceError> {
    let rows = remote.delete(T::TABLE, &by_id(id)).await?;
    if rows.is_empty() {
        return Err(ServiceError::NotFound { entity: T::TABLE, id });
    }
    Ok(())
}

pub(crate) async fn subscribe<T: Record, R: RemoteClient>(
    remote: &R,
    scope: Option<(&str, Uuid)>,
) -> Result<Subscription, ServiceError> {
    let spec = match scope {
        Some((column, id)) => ChannelSpec::scoped(T::TABLE, column, id.to_string()),
        None => ChannelSpec::table(T::TABLE),
    };
    Ok(remote.subscribe(spec).await?)
}

/// Trimmed value of a required text field.
pub(crate) fn required(field: &str, value: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}
