//! Blob persistence.

use std::path::{Path, PathBuf};

use crate::error::VaultError;

/// Read and atomically replace whole files.
#[async_trait::async_trait]
pub trait BlobStorage: Send + Sync {
    /// Read the file at `path`. A missing file is `Ok(None)`.
    async fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, VaultError>;

    /// Replace the file at `path` with `bytes`. Readers never observe a
    /// partially written file.
    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), VaultError>;

    /// Remove the file at `path`. A missing file is not an error.
    async fn remove(&self, path: &Path) -> Result<(), VaultError>;
}

/// Local filesystem storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

#[async_trait::async_trait]
impl BlobStorage for LocalFs {
    async fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, VaultError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<(), VaultError> {
        write_file_atomic(path, bytes).await.map_err(Into::into)
    }

    async fn remove(&self, path: &Path) -> Result<(), VaultError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Write to a sibling temp file, restrict it to the owner, then rename over
/// `path`.
pub(crate) async fn write_file_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = temp_path(path);
    if let Err(e) = write_and_rename(&tmp, path, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

async fn write_and_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    tokio::fs::write(tmp, bytes).await?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(tmp, std::fs::Permissions::from_mode(0o600)).await?;
    }

    tokio::fs::rename(tmp, path).await
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
