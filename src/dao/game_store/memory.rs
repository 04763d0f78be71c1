//! Process-local store keeping each document as serialized JSON text.
//!
//! Holding text rather than typed values means a structurally incompatible document
//! fails on read exactly like it would with a durable backend.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::dao::{
    game_store::{GAME_STATE_KEY, GameStore, ROSTER_KEY},
    models::{GameStateEntity, RosterEntity},
    storage::{StorageError, StorageResult},
};

/// Failure reported while the in-memory store is switched offline.
#[derive(Debug, Error)]
#[error("in-memory store is offline")]
pub struct MemoryStoreOffline;

/// Game store kept in process memory.
#[derive(Clone, Default)]
pub struct MemoryGameStore {
    documents: Arc<DashMap<&'static str, String>>,
    offline: Arc<AtomicBool>,
    reject_roster_writes: Arc<AtomicBool>,
}

impl MemoryGameStore {
    /// Empty store, online.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every operation fails until switched back online.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Fail roster writes only, leaving reads and game state writes working.
    pub fn set_reject_roster_writes(&self, reject: bool) {
        self.reject_roster_writes.store(reject, Ordering::SeqCst);
    }

    /// Overwrite a document with raw text, bypassing serialization.
    pub fn put_raw(&self, key: &'static str, raw: impl Into<String>) {
        self.documents.insert(key, raw.into());
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StorageError::unavailable(
                "memory store offline".into(),
                MemoryStoreOffline,
            ))
        } else {
            Ok(())
        }
    }

    fn load<T: DeserializeOwned>(&self, key: &'static str) -> StorageResult<Option<T>> {
        self.ensure_online()?;
        let Some(raw) = self.documents.get(key).map(|entry| entry.value().clone()) else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|err| StorageError::corrupt(key, err.to_string()))
    }

    fn save<T: Serialize>(&self, key: &'static str, value: &T) -> StorageResult<()> {
        self.ensure_online()?;
        let raw =
            serde_json::to_string(value).map_err(|err| StorageError::corrupt(key, err.to_string()))?;
        self.documents.insert(key, raw);
        Ok(())
    }
}

impl GameStore for MemoryGameStore {
    fn load_game_state(&self) -> BoxFuture<'static, StorageResult<Option<GameStateEntity>>> {
        let result = self.load(GAME_STATE_KEY);
        Box::pin(async move { result })
    }

    fn save_game_state(&self, game: GameStateEntity) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.save(GAME_STATE_KEY, &game);
        Box::pin(async move { result })
    }

    fn load_roster(&self) -> BoxFuture<'static, StorageResult<Option<RosterEntity>>> {
        let result = self.load(ROSTER_KEY);
        Box::pin(async move { result })
    }

    fn save_roster(&self, roster: RosterEntity) -> BoxFuture<'static, StorageResult<()>> {
        let result = if self.reject_roster_writes.load(Ordering::SeqCst) {
            Err(StorageError::unavailable(
                "memory store rejected roster write".into(),
                MemoryStoreOffline,
            ))
        } else {
            self.save(ROSTER_KEY, &roster)
        };
        Box::pin(async move { result })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.ensure_online();
        Box::pin(async move { result })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.health_check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_documents_load_as_none() {
        let store = MemoryGameStore::new();
        assert!(store.load_game_state().await.unwrap().is_none());
        assert!(store.load_roster().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn incompatible_document_fails_hard() {
        let store = MemoryGameStore::new();
        store.put_raw(GAME_STATE_KEY, r#"{"accessCode":"ABCD"}"#);
        let err = store.load_game_state().await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { document: "state", .. }));
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = MemoryGameStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.health_check().await,
            Err(StorageError::Unavailable { .. })
        ));
        store.set_offline(false);
        assert!(store.health_check().await.is_ok());
    }
}
