//! JSON-file backend: one file per document under a data directory.

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::future::BoxFuture;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::fs;
use tracing::debug;

use crate::dao::{
    game_store::{GAME_STATE_KEY, GameStore, ROSTER_KEY},
    models::{GameStateEntity, RosterEntity},
    storage::{StorageError, StorageResult},
};

/// Failures of the file backend.
#[derive(Debug, Error)]
pub enum FileStoreError {
    /// The data directory could not be created or inspected.
    #[error("data directory `{path}` is not usable")]
    DataDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Reading a document file failed.
    #[error("failed to read `{path}`")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Writing or renaming a document file failed.
    #[error("failed to write `{path}`")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<FileStoreError> for StorageError {
    fn from(err: FileStoreError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}

/// Game store writing one JSON file per document.
#[derive(Clone)]
pub struct FileGameStore {
    root: Arc<Path>,
}

impl FileGameStore {
    /// Open the store, creating `root` when it does not exist yet.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, FileStoreError> {
        let root: PathBuf = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|source| FileStoreError::DataDir {
                path: root.clone(),
                source,
            })?;
        Ok(Self {
            root: Arc::from(root),
        })
    }

    fn document_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    async fn read_document<T: DeserializeOwned>(&self, key: &'static str) -> StorageResult<Option<T>> {
        let path = self.document_path(key);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(FileStoreError::Read { path, source }.into()),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| StorageError::corrupt(key, err.to_string()))
    }

    /// Write to a sibling temp file then rename over the target, so readers never see
    /// a half-written document.
    async fn write_document<T: Serialize>(&self, key: &'static str, value: &T) -> StorageResult<()> {
        let path = self.document_path(key);
        let tmp = self.root.join(format!("{key}.json.tmp"));
        let raw = serde_json::to_vec_pretty(value)
            .map_err(|err| StorageError::corrupt(key, err.to_string()))?;

        fs::write(&tmp, raw)
            .await
            .map_err(|source| FileStoreError::Write {
                path: tmp.clone(),
                source,
            })?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|source| FileStoreError::Write {
                path: path.clone(),
                source,
            })?;
        debug!(path = %path.display(), "document written");
        Ok(())
    }

    async fn check_root(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&*self.root)
            .await
            .map_err(|source| FileStoreError::DataDir {
                path: self.root.to_path_buf(),
                source,
            })?;
        if metadata.is_dir() {
            Ok(())
        } else {
            Err(FileStoreError::DataDir {
                path: self.root.to_path_buf(),
                source: io::Error::other("not a directory"),
            }
            .into())
        }
    }
}

impl GameStore for FileGameStore {
    fn load_game_state(&self) -> BoxFuture<'static, StorageResult<Option<GameStateEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.read_document(GAME_STATE_KEY).await })
    }

    fn save_game_state(&self, game: GameStateEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.write_document(GAME_STATE_KEY, &game).await })
    }

    fn load_roster(&self) -> BoxFuture<'static, StorageResult<Option<RosterEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.read_document(ROSTER_KEY).await })
    }

    fn save_roster(&self, roster: RosterEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.write_document(ROSTER_KEY, &roster).await })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.check_root().await })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            fs::create_dir_all(&*store.root)
                .await
                .map_err(|source| FileStoreError::DataDir {
                    path: store.root.to_path_buf(),
                    source,
                })?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::game::{GameState, fixtures};

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("puzzle-sync-{name}-{}", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn documents_survive_reopen() {
        let dir = scratch_dir("reopen");
        let store = FileGameStore::open(&dir).await.unwrap();
        let entity = GameStateEntity::from(&GameState::blank(fixtures::rounds()));
        store.save_game_state(entity.clone()).await.unwrap();

        let reopened = FileGameStore::open(&dir).await.unwrap();
        assert_eq!(reopened.load_game_state().await.unwrap(), Some(entity));
        assert!(reopened.load_roster().await.unwrap().is_none());
        assert!(!dir.join("state.json.tmp").exists());

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn garbage_file_is_reported_corrupt() {
        let dir = scratch_dir("garbage");
        let store = FileGameStore::open(&dir).await.unwrap();
        std::fs::write(dir.join("players.json"), "[1, 2").unwrap();

        let err = store.load_roster().await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { document: "players", .. }));

        let _ = std::fs::remove_dir_all(dir);
    }
}
