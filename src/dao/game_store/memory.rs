//! Process-local store used for development, tests and single-instance deployments.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;

use crate::dao::{
    game_store::GameStore,
    models::GameEntity,
    storage::{ETag, StorageError, StorageResult, Versioned},
};

/// In-memory [`GameStore`] guarding each document with a version counter.
#[derive(Clone, Default)]
pub struct MemoryGameStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    documents: DashMap<String, StoredDocument>,
    last_version: AtomicU64,
    offline: AtomicBool,
}

struct StoredDocument {
    entity: GameEntity,
    etag: ETag,
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the backend going away (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.inner.offline.store(!available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> StorageResult<()> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                "in-memory store offline".into(),
                io::Error::from(io::ErrorKind::NotConnected),
            ));
        }
        Ok(())
    }

    fn next_etag(&self) -> ETag {
        let version = self.inner.last_version.fetch_add(1, Ordering::SeqCst) + 1;
        ETag::new(format!("W/\"{version}\""))
    }

    fn read_now(&self, key: &str) -> StorageResult<Versioned<GameEntity>> {
        self.ensure_available()?;
        let document = self
            .inner
            .documents
            .get(key)
            .ok_or_else(|| StorageError::NotFound { key: key.into() })?;
        Ok(Versioned::new(
            document.entity.clone(),
            document.etag.clone(),
        ))
    }

    fn create_now(&self, key: &str, entity: GameEntity) -> StorageResult<ETag> {
        self.ensure_available()?;
        match self.inner.documents.entry(key.to_string()) {
            Entry::Occupied(_) => Err(StorageError::VersionConflict { key: key.into() }),
            Entry::Vacant(slot) => {
                let etag = self.next_etag();
                slot.insert(StoredDocument {
                    entity,
                    etag: etag.clone(),
                });
                Ok(etag)
            }
        }
    }

    fn replace_now(&self, key: &str, entity: GameEntity, expected: &ETag) -> StorageResult<ETag> {
        self.ensure_available()?;
        // The shard write lock held by `get_mut` makes the compare-and-swap atomic.
        let mut document = self
            .inner
            .documents
            .get_mut(key)
            .ok_or_else(|| StorageError::NotFound { key: key.into() })?;
        if &document.etag != expected {
            return Err(StorageError::VersionConflict { key: key.into() });
        }
        let etag = self.next_etag();
        document.entity = entity;
        document.etag = etag.clone();
        Ok(etag)
    }
}

impl GameStore for MemoryGameStore {
    fn read(&self, key: &str) -> BoxFuture<'static, StorageResult<Versioned<GameEntity>>> {
        let result = self.read_now(key);
        Box::pin(async move { result })
    }

    fn create(&self, key: &str, entity: GameEntity) -> BoxFuture<'static, StorageResult<ETag>> {
        let result = self.create_now(key, entity);
        Box::pin(async move { result })
    }

    fn replace(
        &self,
        key: &str,
        entity: GameEntity,
        expected: ETag,
    ) -> BoxFuture<'static, StorageResult<ETag>> {
        let result = self.replace_now(key, entity, &expected);
        Box::pin(async move { result })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.ensure_available();
        Box::pin(async move { result })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.health_check()
    }
}
