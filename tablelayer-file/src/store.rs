use std::{
    io::ErrorKind,
    path::PathBuf,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use bson::Document;
use chrono::Local;
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWrite,
};
use tracing::{debug, info};

use tablelayer_core::{
    blob::{BlobContext, BlobId, BlobStore, BlobStoreFactory, BlobWriter},
    capability::Operation,
    config::FieldRule,
    error::{DatabaseError, DatabaseResult},
};

use crate::config::FileBlobConfig;

/// Stores each object as a file under one directory.
#[derive(Debug)]
pub struct FileBlobStore {
    dir: PathBuf,
    readonly: bool,
    counter: AtomicU64,
}

impl FileBlobStore {
    pub fn new(dir: impl Into<PathBuf>, readonly: bool) -> Self {
        Self {
            dir: dir.into(),
            readonly,
            counter: AtomicU64::new(0),
        }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn next_id(&self) -> BlobId {
        let sequence = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", Local::now().format("%Y%m%d%H%M%S"), sequence)
    }

    /// Resolves an id to its file. Ids never contain path separators.
    fn object_path(&self, id: &str) -> DatabaseResult<PathBuf> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DatabaseError::NotFound(format!("BLOB {id:?}")));
        }

        Ok(self.dir.join(id))
    }
}

fn not_found(id: &str, err: std::io::Error) -> DatabaseError {
    if err.kind() == ErrorKind::NotFound {
        DatabaseError::NotFound(format!("BLOB {id:?}"))
    } else {
        DatabaseError::Io(err)
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn writer(&self) -> DatabaseResult<(BlobId, BlobWriter)> {
        if self.readonly {
            return Err(DatabaseError::PermissionDenied(Operation::WriteBlob));
        }

        let id = self.next_id();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.object_path(&id)?)
            .await?;

        debug!(%id, dir = %self.dir.display(), "blob created");
        Ok((id, Box::new(file)))
    }

    async fn read(&self, id: &str, writer: &mut (dyn AsyncWrite + Send + Unpin)) -> DatabaseResult<u64> {
        let mut file = fs::File::open(self.object_path(id)?)
            .await
            .map_err(|e| not_found(id, e))?;

        Ok(tokio::io::copy(&mut file, writer).await?)
    }

    async fn remove(&self, id: &str) -> DatabaseResult<()> {
        if self.readonly {
            return Err(DatabaseError::PermissionDenied(Operation::RemoveBlob));
        }

        fs::remove_file(self.object_path(id)?)
            .await
            .map_err(|e| not_found(id, e))?;

        debug!(id, "blob removed");
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FileBlobStoreFactory;

#[async_trait]
impl BlobStoreFactory for FileBlobStoreFactory {
    async fn build(&self, config: &Document, context: BlobContext) -> DatabaseResult<Arc<dyn BlobStore>> {
        let config = FileBlobConfig::from_section(config)?;
        info!(dir = %config.path.display(), readonly = context.readonly, "file blob store ready");

        Ok(Arc::new(FileBlobStore::new(config.path, context.readonly)))
    }

    fn rules(&self) -> &'static [FieldRule] {
        FileBlobConfig::RULES
    }
}
