use std::path::Path;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use prosync_remote::{
    AuthProvider, RemoteClient, RemoteError, Subscription, validate_query, validate_table,
    validate_write,
};
use prosync_types::api::{Claims, Credentials, ObjectUpload, Session, UserIdentity};
use prosync_types::{ChangeEvent, ChannelSpec, Filter, Query};

use crate::auth::{self, NO_PASSWORD, TOKEN_TTL_SECS};
use crate::{ChangeFeed, Database};

const MIN_PASSWORD_LEN: usize = 6;

struct Shared {
    db: Database,
    feed: ChangeFeed,
    jwt_secret: String,
}

/// The embedded backend: one store, one change feed, any number of
/// clients.
#[derive(Clone)]
pub struct LocalBackend {
    shared: Arc<Shared>,
}

impl LocalBackend {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        Ok(Self::from_database(Database::open(path)?))
    }

    pub fn in_memory() -> anyhow::Result<Self> {
        Ok(Self::from_database(Database::open_in_memory()?))
    }

    fn from_database(db: Database) -> Self {
        Self {
            shared: Arc::new(Shared {
                db,
                feed: ChangeFeed::new(),
                jwt_secret: Uuid::new_v4().to_string(),
            }),
        }
    }

    /// A new client with its own (empty) session.
    pub fn client(&self) -> LocalClient {
        LocalClient {
            shared: self.shared.clone(),
            session: RwLock::new(None),
        }
    }

    /// A client already signed in as `email`, creating the account if
    /// needed. Accounts created here have no password.
    pub fn client_for(&self, email: &str) -> anyhow::Result<LocalClient> {
        let email = normalize_email(email);
        let user_id = match self.shared.db.get_user_by_email(&email)? {
            Some(user) => user.id.parse::<Uuid>()?,
            None => {
                let id = Uuid::new_v4();
                self.shared.db.create_user(&id.to_string(), &email, NO_PASSWORD)?;
                info!("Created local account {}", email);
                id
            }
        };

        let client = self.client();
        let session = issue_session(&self.shared.jwt_secret, user_id, &email)?;
        client.set_session(Some(session));
        Ok(client)
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.shared.feed
    }

    pub fn database(&self) -> &Database {
        &self.shared.db
    }

    /// Validate an access token issued by this backend.
    pub fn verify_token(&self, token: &str) -> Result<Claims, RemoteError> {
        auth::verify_token(&self.shared.jwt_secret, token)
            .map_err(|e| RemoteError::Unauthorized(e.to_string()))
    }
}

/// A client of the embedded backend.
pub struct LocalClient {
    shared: Arc<Shared>,
    session: RwLock<Option<Session>>,
}

impl LocalClient {
    pub fn set_session(&self, session: Option<Session>) {
        if let Ok(mut guard) = self.session.write() {
            *guard = session;
        }
    }

    fn feed(&self) -> &ChangeFeed {
        &self.shared.feed
    }

    /// Run a store operation on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T, RemoteError>
    where
        F: FnOnce(&Database, &str) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let shared = self.shared.clone();
        tokio::task::spawn_blocking(move || f(&shared.db, &shared.jwt_secret))
            .await
            .map_err(|e| RemoteError::Backend(format!("store task failed: {}", e)))?
            .map_err(store_error)
    }
}

impl RemoteClient for LocalClient {
    async fn select(&self, query: &Query) -> Result<Vec<Value>, RemoteError> {
        validate_query(query)?;
        let query = query.clone();
        self.blocking(move |db, _| db.select_rows(&query)).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, RemoteError> {
        validate_table(table)?;
        if !row.is_object() {
            return Err(RemoteError::InvalidQuery(format!("row for '{}' must be an object", table)));
        }

        let owned = table.to_string();
        let row = self.blocking(move |db, _| db.insert_row(&owned, row)).await?;
        self.feed().publish(ChangeEvent::insert(table, row.clone()));
        Ok(row)
    }

    async fn update(&self, table: &str, filters: &[Filter], patch: Value) -> Result<Vec<Value>, RemoteError> {
        validate_write(table, filters)?;
        let Value::Object(patch) = patch else {
            return Err(RemoteError::InvalidQuery(format!("patch for '{}' must be an object", table)));
        };

        let owned = table.to_string();
        let filters = filters.to_vec();
        let changed = self
            .blocking(move |db, _| db.update_rows(&owned, &filters, &patch))
            .await?;

        let mut rows = Vec::with_capacity(changed.len());
        for (old, new) in changed {
            self.feed().publish(ChangeEvent::update(table, old, new.clone()));
            rows.push(new);
        }
        Ok(rows)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>, RemoteError> {
        validate_write(table, filters)?;

        let owned = table.to_string();
        let filters = filters.to_vec();
        let deleted = self.blocking(move |db, _| db.delete_rows(&owned, &filters)).await?;
        for old in &deleted {
            self.feed().publish(ChangeEvent::delete(table, old.clone()));
        }
        Ok(deleted)
    }

    async fn upload(&self, bucket: &str, path: &str, object: ObjectUpload) -> Result<(), RemoteError> {
        let (bucket, path) = (bucket.to_string(), path.trim_start_matches('/').to_string());
        let size = object.bytes.len();
        let label = format!("{}/{}", bucket, path);
        self.blocking(move |db, _| {
            db.put_object(&bucket, &path, &object.content_type, &object.bytes, object.upsert)
        })
        .await?;
        debug!("Stored {} bytes at {}", size, label);
        Ok(())
    }

    async fn download(&self, bucket: &str, path: &str) -> Result<Vec<u8>, RemoteError> {
        let (owned_bucket, owned_path) = (bucket.to_string(), path.trim_start_matches('/').to_string());
        self.blocking(move |db, _| db.get_object(&owned_bucket, &owned_path))
            .await?
            .map(|obj| obj.data)
            .ok_or_else(|| RemoteError::NotFound(format!("object {}/{}", bucket, path)))
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<(), RemoteError> {
        let bucket = bucket.to_string();
        let paths = paths.to_vec();
        self.blocking(move |db, _| db.remove_objects(&bucket, &paths)).await?;
        Ok(())
    }

    async fn subscribe(&self, spec: ChannelSpec) -> Result<Subscription, RemoteError> {
        validate_table(&spec.table)?;
        Ok(self.feed().subscribe(spec))
    }

    fn session(&self) -> Option<Session> {
        self.session.read().ok().and_then(|s| s.clone())
    }
}

impl AuthProvider for LocalClient {
    async fn sign_up(&self, credentials: &Credentials) -> Result<Session, RemoteError> {
        let email = normalize_email(&credentials.email);
        if !email.contains('@') {
            return Err(RemoteError::Http {
                status: 422,
                message: "unable to validate email address".into(),
            });
        }
        if credentials.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(RemoteError::Http {
                status: 422,
                message: format!("password should be at least {} characters", MIN_PASSWORD_LEN),
            });
        }

        let password = credentials.password.clone();
        let session = self
            .blocking(move |db, secret| {
                if db.get_user_by_email(&email)?.is_some() {
                    return Err(anyhow::Error::new(AccountExists));
                }
                let hash = auth::hash_password(&password)?;
                let id = Uuid::new_v4();
                db.create_user(&id.to_string(), &email, &hash)?;
                issue_session(secret, id, &email)
            })
            .await?;

        info!("Signed up {}", session.user.id);
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<Session, RemoteError> {
        let email = normalize_email(&credentials.email);
        let password = credentials.password.clone();
        let session = self
            .blocking(move |db, secret| {
                let user = db.get_user_by_email(&email)?;
                match user {
                    Some(user) if auth::verify_password(&password, &user.password) => {
                        issue_session(secret, user.id.parse()?, &user.email).map(Some)
                    }
                    _ => Ok(None),
                }
            })
            .await?;

        match session {
            Some(session) => {
                info!("Signed in {}", session.user.id);
                self.set_session(Some(session.clone()));
                Ok(session)
            }
            None => {
                warn!("Rejected sign-in for {}", credentials.email);
                Err(RemoteError::Unauthorized("invalid login credentials".into()))
            }
        }
    }

    async fn sign_out(&self) -> Result<(), RemoteError> {
        self.set_session(None);
        Ok(())
    }
}

#[derive(Debug)]
struct AccountExists;

impl std::fmt::Display for AccountExists {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("user already registered")
    }
}

impl std::error::Error for AccountExists {}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn issue_session(secret: &str, user_id: Uuid, email: &str) -> anyhow::Result<Session> {
    let access_token = auth::create_token(secret, user_id, email)?;
    Ok(Session {
        access_token,
        refresh_token: None,
        expires_in: Some(TOKEN_TTL_SECS),
        user: UserIdentity {
            id: user_id,
            email: Some(email.to_string()),
            created_at: Some(chrono::Utc::now()),
        },
    })
}

/// Map store failures onto the client error surface.
fn store_error(err: anyhow::Error) -> RemoteError {
    if err.downcast_ref::<AccountExists>().is_some() {
        return RemoteError::Conflict(err.to_string());
    }
    if let Some(sqlite) = err.downcast_ref::<rusqlite::Error>() {
        if sqlite.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation) {
            return RemoteError::Conflict(sqlite.to_string());
        }
    }
    error!("Local store error: {:#}", err);
    RemoteError::Backend(err.to_string())
}
