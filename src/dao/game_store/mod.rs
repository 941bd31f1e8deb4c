#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;

use crate::dao::models::GameEntity;
use crate::dao::storage::{ETag, StorageResult, Versioned};
use futures::future::BoxFuture;

/// Abstraction over a keyed document store with optimistic concurrency.
///
/// Every stored document carries an [`ETag`]; writes to an existing document
/// must present the token they read and fail with
/// [`StorageError::VersionConflict`](crate::dao::storage::StorageError::VersionConflict)
/// when it no longer matches.
pub trait GameStore: Send + Sync {
    /// Read a document and its token; fails with `NotFound` if absent.
    fn read(&self, key: &str) -> BoxFuture<'static, StorageResult<Versioned<GameEntity>>>;
    /// Create a document; fails with `VersionConflict` if it already exists.
    fn create(&self, key: &str, entity: GameEntity) -> BoxFuture<'static, StorageResult<ETag>>;
    /// Replace a document only if its token still equals `expected`.
    fn replace(
        &self,
        key: &str,
        entity: GameEntity,
        expected: ETag,
    ) -> BoxFuture<'static, StorageResult<ETag>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
