use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::Value;

use prosync_db::{LocalBackend, LocalClient};
use prosync_remote::{RemoteClient, RemoteError, Subscription};
use prosync_types::api::{ObjectUpload, Session};
use prosync_types::{ChannelSpec, Filter, Query};

/// Wraps a client, counting inserts and failing them on demand.
pub struct Probe<R> {
    inner: R,
    pub inserts: AtomicUsize,
    pub fail_inserts: AtomicBool,
}

impl<R> Probe<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            inserts: AtomicUsize::new(0),
            fail_inserts: AtomicBool::new(false),
        }
    }

    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }
}

impl<R: RemoteClient> RemoteClient for Probe<R> {
    async fn select(&self, query: &Query) -> Result<Vec<Value>, RemoteError> {
        self.inner.select(query).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(RemoteError::Http {
                status: 503,
                message: "service unavailable".into(),
            });
        }
        self.inner.insert(table, row).await
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<Vec<Value>, RemoteError> {
        self.inner.update(table, filters, patch).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>, RemoteError> {
        self.inner.delete(table, filters).await
    }

    async fn upload(&self, bucket: &str, path: &str, object: ObjectUpload) -> Result<(), RemoteError> {
        self.inner.upload(bucket, path, object).await
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, RemoteError> {
        self.inner.download(bucket, path).await
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), RemoteError> {
        self.inner.remove(bucket, paths).await
    }

    async fn subscribe(&self, spec: ChannelSpec) -> Result<Subscription, RemoteError> {
        self.inner.subscribe(spec).await
    }

    fn session(&self) -> Option<Session> {
        self.inner.session()
    }
}

pub fn signed_in(email: &str) -> (LocalBackend, Arc<Probe<LocalClient>>) {
    let backend = LocalBackend::in_memory().unwrap();
    let client = backend.client_for(email).unwrap();
    (backend, Arc::new(Probe::new(client)))
}

pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}

/// Give in-flight realtime echoes time to land.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}
