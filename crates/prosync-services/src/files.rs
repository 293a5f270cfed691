use std::sync::Arc;

use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use uuid::Uuid;

use prosync_remote::RemoteClient;
use prosync_types::{Filter, Query};
use prosync_types::api::ObjectUpload;
use prosync_types::models::files::{
    FileVersion, NewFileVersion, NewVaultFile, VAULT_BUCKET, VaultFile, object_path,
};

use crate::ServiceError;
use crate::rows::{self, current_user, required};

/// Hex SHA-256 of an object.
pub fn checksum(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Versioned personal file storage. Each version is a separate object;
/// the file row points at the current one.
pub struct FileVaultService<R> {
    remote: Arc<R>,
}

impl<R> Clone for FileVaultService<R> {
    fn clone(&self) -> Self {
        Self {
            remote: self.remote.clone(),
        }
    }
}

impl<R: RemoteClient> FileVaultService<R> {
    pub fn new(remote: Arc<R>) -> Self {
        Self { remote }
    }

    /// The current user's files, optionally in one folder.
    pub async fn list_files(&self, folder: Option<&str>) -> Result<Vec<VaultFile>, ServiceError> {
        let owner_id = current_user(&*self.remote)?;
        let mut query = Query::table("vault_files").eq("owner_id", owner_id.to_string());
        if let Some(folder) = folder {
            query = query.eq("folder", folder.trim());
        }
        rows::fetch_all(&*self.remote, query.order_by("name", true))
            .await
            .inspect_err(|e| error!("Failed to list files: {}", e))
    }

    pub async fn get_file(&self, id: Uuid) -> Result<VaultFile, ServiceError> {
        rows::fetch_one(&*self.remote, id)
            .await
            .inspect_err(|e| error!("Failed to load file {}: {}", id, e))
    }

    /// Store the object, then the file row and its first version row.
    /// The object is removed again if the rows cannot be written.
    pub async fn upload_file(
        &self,
        name: &str,
        folder: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<VaultFile, ServiceError> {
        let owner_id = current_user(&*self.remote)?;
        let name = required("File name", name)?;

        let id = Uuid::new_v4();
        let path = object_path(owner_id, id, 1, &name);
        let size_bytes = bytes.len() as i64;
        let digest = checksum(&bytes);

        self.remote
            .upload(VAULT_BUCKET, &path, ObjectUpload::new(bytes, content_type))
            .await
            .map_err(ServiceError::from)
            .inspect_err(|e| error!("Failed to upload {}: {}", name, e))?;

        let file = NewVaultFile {
            id,
            owner_id,
            name: name.clone(),
            folder: folder.trim().to_string(),
            content_type: content_type.to_string(),
            size_bytes,
            current_version: 1,
            storage_path: path.clone(),
            starred: false,
        };
        let version = NewFileVersion {
            file_id: id,
            version: 1,
            storage_path: path.clone(),
            size_bytes,
            checksum: digest,
            uploaded_by: owner_id,
        };

        let result: Result<VaultFile, ServiceError> = async {
            let file: VaultFile = rows::insert(&*self.remote, &file).await?;
            let _: FileVersion = rows::insert(&*self.remote, &version).await?;
            Ok(file)
        }
        .await;

        match result {
            Ok(file) => {
                info!("Uploaded {} ({} bytes)", file.name, size_bytes);
                Ok(file)
            }
            Err(e) => {
                error!("Failed to record upload of {}: {}", name, e);
                if let Err(cleanup) = self.remote.remove(VAULT_BUCKET, &[path]).await {
                    warn!("Orphaned object for {}: {}", name, cleanup);
                }
                Err(e)
            }
        }
    }

    /// Add a new version and make it current.
    pub async fn upload_version(&self, file_id: Uuid, content_type: &str, bytes: Vec<u8>) -> Result<VaultFile, ServiceError> {
        let uploaded_by = current_user(&*self.remote)?;

        let result: Result<VaultFile, ServiceError> = async {
            let file: VaultFile = rows::fetch_one(&*self.remote, file_id).await?;
            let version = file.current_version + 1;
            let path = object_path(file.owner_id, file.id, version, &file.name);
            let size_bytes = bytes.len() as i64;
            let digest = checksum(&bytes);

            self.remote
                .upload(VAULT_BUCKET, &path, ObjectUpload::new(bytes, content_type))
                .await?;

            let row = NewFileVersion {
                file_id,
                version,
                storage_path: path.clone(),
                size_bytes,
                checksum: digest,
                uploaded_by,
            };
            let _: FileVersion = rows::insert(&*self.remote, &row).await?;

            rows::update(
                &*self.remote,
                file_id,
                json!({
                    "current_version": version,
                    "storage_path": path,
                    "size_bytes": size_bytes,
                    "content_type": content_type,
                }),
            )
            .await
        }
        .await;

        let file = result.inspect_err(|e| error!("Failed to upload new version of {}: {}", file_id, e))?;
        info!("{} is now at version {}", file.name, file.current_version);
        Ok(file)
    }

    /// Versions of a file, newest first.
    pub async fn list_versions(&self, file_id: Uuid) -> Result<Vec<FileVersion>, ServiceError> {
        let query = Query::table("vault_file_versions")
            .eq("file_id", file_id.to_string())
            .order_by("version", false);
        rows::fetch_all(&*self.remote, query)
            .await
            .inspect_err(|e| error!("Failed to list versions of {}: {}", file_id, e))
    }

    /// Contents of the current version, or of `version` when given.
    pub async fn download(&self, file_id: Uuid, version: Option<i64>) -> Result<Vec<u8>, ServiceError> {
        let result: Result<Vec<u8>, ServiceError> = async {
            let path = match version {
                None => {
                    let file: VaultFile = rows::fetch_one(&*self.remote, file_id).await?;
                    file.storage_path
                }
                Some(n) => {
                    let query = Query::table("vault_file_versions")
                        .eq("file_id", file_id.to_string())
                        .eq("version", n);
                    let row: Option<FileVersion> = rows::fetch_first(&*self.remote, query).await?;
                    row.map(|v| v.storage_path).ok_or_else(|| {
                        ServiceError::validation(format!("File has no version {}", n))
                    })?
                }
            };
            Ok(self.remote.download(VAULT_BUCKET, &path).await?)
        }
        .await;

        result.inspect_err(|e| error!("Failed to download {}: {}", file_id, e))
    }

    pub async fn rename_file(&self, id: Uuid, name: &str) -> Result<VaultFile, ServiceError> {
        let name = required("File name", name)?;
        rows::update(&*self.remote, id, json!({ "name": name }))
            .await
            .inspect_err(|e| error!("Failed to rename file {}: {}", id, e))
    }

    pub async fn set_starred(&self, id: Uuid, starred: bool) -> Result<VaultFile, ServiceError> {
        rows::update(&*self.remote, id, json!({ "starred": starred }))
            .await
            .inspect_err(|e| error!("Failed to star file {}: {}", id, e))
    }

    /// Remove every version object, the version rows and the file row.
    pub async fn delete_file(&self, id: Uuid) -> Result<(), ServiceError> {
        let result: Result<(), ServiceError> = async {
            let file: VaultFile = rows::fetch_one(&*self.remote, id).await?;
            let versions = self.list_versions(id).await?;

            let mut paths: Vec<String> = versions.into_iter().map(|v| v.storage_path).collect();
            if !paths.contains(&file.storage_path) && !file.storage_path.is_empty() {
                paths.push(file.storage_path.clone());
            }
            self.remote.remove(VAULT_BUCKET, &paths).await?;
            self.remote
                .delete("vault_file_versions", &[Filter::eq("file_id", id.to_string())])
                .await?;
            rows::delete::<VaultFile, _>(&*self.remote, id).await
        }
        .await;

        result.inspect_err(|e| error!("Failed to delete file {}: {}", id, e))?;
        info!("Deleted file {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_is_hex_sha256() {
        assert_eq!(
            checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
