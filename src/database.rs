use serde::{de::DeserializeOwned, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tokio::{fs, sync::RwLock, time};
use tracing::error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Codec(String),
    #[error("Database error: {0}")]
    Custom(String),
}

#[derive(Debug)]
struct DatabaseInner<T> {
    data: T,
    path: PathBuf,
}

/// A whole-file bincode store. Writes go through [`Database::write`], which
/// persists to disk before the new state becomes visible to readers.
#[derive(Clone, Debug)]
pub struct Database<T: Serialize + DeserializeOwned + Default + Send + Sync + Clone + 'static> {
    inner: Arc<RwLock<DatabaseInner<T>>>,
}

impl<T: Serialize + DeserializeOwned + Default + Send + Sync + Clone + 'static> Database<T> {
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self, DbError> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                error!("Failed to create database directory: {}", e);
                DbError::Io(e)
            })?;
        }

        let data = if path.exists() {
            match fs::read(&path).await {
                Ok(bytes) => match bincode::deserialize(&bytes) {
                    Ok(data) => data,
                    Err(e) => {
                        error!("Failed to deserialize database {}: {}", path.display(), e);
                        T::default()
                    }
                },
                Err(e) => {
                    error!("Failed to read database {}: {}", path.display(), e);
                    T::default()
                }
            }
        } else {
            T::default()
        };

        Ok(Self {
            inner: Arc::new(RwLock::new(DatabaseInner { data, path })),
        })
    }

    async fn save(&self, data: &T) -> Result<(), DbError> {
        let path = {
            let guard = self.inner.read().await;
            guard.path.clone()
        };

        let bytes = bincode::serialize(data).map_err(|e| DbError::Codec(e.to_string()))?;

        match time::timeout(Duration::from_secs(5), write_atomic(&path, bytes)).await {
            Ok(result) => result,
            Err(_) => {
                error!("Database save operation timed out");
                Err(DbError::Custom("Save operation timed out".into()))
            }
        }
    }

    pub async fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&T) -> R,
    {
        let guard = self.inner.read().await;
        f(&guard.data)
    }

    pub async fn write<F, R>(&self, f: F) -> Result<R, DbError>
    where
        F: FnOnce(&mut T) -> Result<R, String>,
    {
        let mut data = {
            let guard = self.inner.read().await;
            guard.data.clone()
        };
        let result = f(&mut data).map_err(DbError::Custom)?;

        self.save(&data).await?;

        let mut guard = self.inner.write().await;
        guard.data = data;

        Ok(result)
    }
}

// Write through a sibling temp file so a crash mid-save never truncates the
// live database.
async fn write_atomic(path: &Path, bytes: Vec<u8>) -> Result<(), DbError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}
