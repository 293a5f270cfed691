use std::sync::Arc;

use prosync_db::{LocalBackend, LocalClient};

/// A fresh in-memory backend and a client signed in as `email`.
pub fn signed_in(email: &str) -> (LocalBackend, Arc<LocalClient>) {
    let backend = LocalBackend::in_memory().unwrap();
    let client = Arc::new(backend.client_for(email).unwrap());
    (backend, client)
}
