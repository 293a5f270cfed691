use tokio::sync::mpsc;

use prosync_types::ChangeEvent;

/// An open realtime subscription.
///
/// Owns the event stream and the release hook of its backend. Dropping
/// the handle (or calling [`Subscription::close`]) releases the
/// subscription at the backend exactly once.
pub struct Subscription {
    label: String,
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        label: impl Into<String>,
        events: mpsc::UnboundedReceiver<ChangeEvent>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            events,
            release: Some(Box::new(release)),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Next change event. `None` once the backend side has gone away.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Next already-delivered event, without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        self.events.try_recv().ok()
    }

    pub fn close(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            tracing::debug!("Releasing subscription {}", self.label);
            release();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
