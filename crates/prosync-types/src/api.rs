use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- JWT Claims --

/// Access-token claims. The embedded backend issues tokens with exactly
/// these claims; hosted tokens carry more, which are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// The signed-in user as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Token response of the password grant, also used as the in-memory
/// session of a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub user: UserIdentity,
}

impl Session {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }
}

// -- Storage --

/// One object upload.
#[derive(Debug, Clone)]
pub struct ObjectUpload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    /// Overwrite an existing object at the same path.
    pub upsert: bool,
}

impl ObjectUpload {
    pub fn new(bytes: Vec<u8>, content_type: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
            upsert: false,
        }
    }
}
