//! The remote data client seam.
//!
//! Everything above this crate talks to the backend through
//! [`RemoteClient`] and [`AuthProvider`], handed down explicitly as
//! `Arc<R>`. [`HttpRemote`] speaks to a hosted backend; the embedded
//! backend in `prosync-db` implements the same traits for offline use
//! and tests.

pub mod config;
pub mod error;
pub mod http;
pub mod realtime;
pub mod subscription;

use std::future::Future;

use serde_json::Value;

use prosync_types::api::{Credentials, ObjectUpload, Session};
use prosync_types::query::is_identifier;
use prosync_types::{ChannelSpec, Filter, Query};

pub use config::{ConfigError, RemoteConfig};
pub use error::RemoteError;
pub use http::HttpRemote;
pub use subscription::Subscription;

/// Table, storage and realtime operations of the backend.
pub trait RemoteClient: Send + Sync + 'static {
    /// Read every row matching the query.
    fn select(&self, query: &Query) -> impl Future<Output = Result<Vec<Value>, RemoteError>> + Send;

    /// Insert one row and return it as stored, with backend defaults applied.
    fn insert(&self, table: &str, row: Value) -> impl Future<Output = Result<Value, RemoteError>> + Send;

    /// Merge `patch` into every row matching all filters. Returns the
    /// updated rows.
    fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> impl Future<Output = Result<Vec<Value>, RemoteError>> + Send;

    /// Delete every row matching all filters. Returns the deleted rows.
    fn delete(&self, table: &str, filters: &[Filter]) -> impl Future<Output = Result<Vec<Value>, RemoteError>> + Send;

    fn upload(
        &self,
        bucket: &str,
        path: &str,
        object: ObjectUpload,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn download(&self, bucket: &str, path: &str) -> impl Future<Output = Result<Vec<u8>, RemoteError>> + Send;

    fn remove(&self, bucket: &str, paths: &[String]) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Open a realtime subscription. The returned handle releases the
    /// subscription when dropped.
    fn subscribe(&self, spec: ChannelSpec) -> impl Future<Output = Result<Subscription, RemoteError>> + Send;

    /// Current session, if signed in.
    fn session(&self) -> Option<Session>;
}

/// Password authentication against the backend's auth service.
pub trait AuthProvider: Send + Sync + 'static {
    fn sign_up(&self, credentials: &Credentials) -> impl Future<Output = Result<Session, RemoteError>> + Send;

    fn sign_in(&self, credentials: &Credentials) -> impl Future<Output = Result<Session, RemoteError>> + Send;

    fn sign_out(&self) -> impl Future<Output = Result<(), RemoteError>> + Send;
}

/// Reject table and column names that are not plain identifiers.
pub fn validate_query(query: &Query) -> Result<(), RemoteError> {
    validate_table(&query.table)?;
    for column in query.columns() {
        if !is_identifier(column) {
            return Err(RemoteError::InvalidQuery(format!("bad column name '{}'", column)));
        }
    }
    Ok(())
}

pub fn validate_table(table: &str) -> Result<(), RemoteError> {
    if !is_identifier(table) {
        return Err(RemoteError::InvalidQuery(format!("bad table name '{}'", table)));
    }
    Ok(())
}

/// Writes that affect rows by filter must name at least one filter, so a
/// missing predicate never turns into a whole-table update or delete.
pub fn validate_write(table: &str, filters: &[Filter]) -> Result<(), RemoteError> {
    validate_table(table)?;
    if filters.is_empty() {
        return Err(RemoteError::InvalidQuery(format!(
            "refusing unfiltered write on '{}'",
            table
        )));
    }
    for f in filters {
        if !is_identifier(&f.column) {
            return Err(RemoteError::InvalidQuery(format!("bad column name '{}'", f.column)));
        }
    }
    Ok(())
}
