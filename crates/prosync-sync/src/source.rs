use std::future::Future;
use std::marker::PhantomData;

use prosync_remote::Subscription;
use prosync_services::ServiceError;
use prosync_types::{ChangeEvent, Record};

/// One scope of one table: the bulk read and the realtime subscription a
/// view keeps in step.
pub trait Source: Send + Sync + 'static {
    type Item: Record;

    /// Short description for logs and notices, e.g. `messages of #general`.
    fn label(&self) -> String;

    fn fetch(&self) -> impl Future<Output = Result<Vec<Self::Item>, ServiceError>> + Send;

    fn subscribe(&self) -> impl Future<Output = Result<Subscription, ServiceError>> + Send;

    /// Whether a record belongs in the view. Defaults to everything the
    /// scope delivers.
    fn keep(&self, _item: &Self::Item) -> bool {
        true
    }
}

/// A realtime subscription narrowed to the records of one table.
/// Releases the backend subscription when dropped.
pub struct ScopedSubscription<T> {
    inner: Subscription,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> ScopedSubscription<T> {
    pub async fn open<S>(source: &S) -> Result<Self, ServiceError>
    where
        S: Source<Item = T>,
    {
        let inner = source.subscribe().await?;
        Ok(Self {
            inner,
            _record: PhantomData,
        })
    }

    pub fn label(&self) -> &str {
        self.inner.label()
    }

    /// Next event on `T`'s table. `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            let event = self.inner.recv().await?;
            if event.table == T::TABLE {
                return Some(event);
            }
        }
    }
}

impl<T> std::fmt::Debug for ScopedSubscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedSubscription")
            .field("inner", &self.inner)
            .finish()
    }
}
