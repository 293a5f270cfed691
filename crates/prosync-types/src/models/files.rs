use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::{Record, nullable};

/// Storage bucket holding every vault object.
pub const VAULT_BUCKET: &str = "vault";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultFile {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub folder: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub content_type: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub size_bytes: i64,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub current_version: i64,
    /// Object path of the current version.
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub storage_path: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub starred: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for VaultFile {
    const TABLE: &'static str = "vault_files";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileVersion {
    pub id: Uuid,
    pub file_id: Uuid,
    pub version: i64,
    pub storage_path: String,
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub size_bytes: i64,
    /// Hex SHA-256 of the object bytes.
    #[serde(default, deserialize_with = "nullable::or_default")]
    pub checksum: String,
    #[serde(default)]
    pub uploaded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Record for FileVersion {
    const TABLE: &'static str = "vault_file_versions";

    fn id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewVaultFile {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub folder: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub current_version: i64,
    pub storage_path: String,
    pub starred: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewFileVersion {
    pub file_id: Uuid,
    pub version: i64,
    pub storage_path: String,
    pub size_bytes: i64,
    pub checksum: String,
    pub uploaded_by: Uuid,
}

/// Object path of one version: `{owner}/{file}/v{n}/{name}`.
pub fn object_path(owner_id: Uuid, file_id: Uuid, version: i64, name: &str) -> String {
    let safe_name: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{}/{}/v{}/{}", owner_id, file_id, version, safe_name)
}
