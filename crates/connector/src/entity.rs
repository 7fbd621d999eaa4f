//! Non-transactional entity CRUD.
//!
//! [`EntityService`] stores caller-supplied records as JSON in one
//! collection. Writes are unconditional upserts and run outside any
//! transaction.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use docstore_common_storage::{
    EntityKey, KeyQuery, StorageBackend, StorageError, StorageResult, decode_entity, encode_entity,
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, instrument, warn};

/// Entity contract: save, update, retrieve, delete and existence checks.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Stores `entity` under `entity_id`, replacing any existing record.
    async fn save<T>(&self, entity_id: &str, entity: &T) -> StorageResult<EntityKey>
    where
        T: Serialize + Sync + ?Sized;

    /// Stores `entity` under `entity_id`. Identical to
    /// [`save`](Self::save); the store has no separate update primitive.
    async fn update<T>(&self, entity_id: &str, entity: &T) -> StorageResult<EntityKey>
    where
        T: Serialize + Sync + ?Sized;

    /// Reads and decodes the record under `entity_id`.
    ///
    /// An absent record is [`StorageError::NotFound`].
    async fn retrieve<T>(&self, entity_id: &str) -> StorageResult<T>
    where
        T: DeserializeOwned + Send;

    /// Deletes the record under `entity_id`.
    ///
    /// Returns `true` when the delete **failed** and `false` when it
    /// succeeded. Use [`EntityService::try_delete`] for the error itself.
    async fn delete(&self, entity_id: &str) -> bool;

    /// Returns whether `query` matches at least one entity. Query failures
    /// read as "does not exist".
    async fn exist(&self, query: &KeyQuery) -> bool;
}

/// [`EntityStore`] over one collection of a [`StorageBackend`].
#[derive(Clone)]
pub struct EntityService {
    backend: Arc<dyn StorageBackend>,
    collection: String,
}

impl fmt::Debug for EntityService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityService").field("collection", &self.collection).finish_non_exhaustive()
    }
}

impl EntityService {
    /// Creates a service storing entities in `collection`.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>, collection: impl Into<String>) -> Self {
        Self { backend, collection: collection.into() }
    }

    /// Returns the collection entities live in.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn key(&self, entity_id: &str) -> StorageResult<EntityKey> {
        EntityKey::new(self.collection.as_str(), entity_id)
    }

    /// Decodes the record under `entity_id` into `dst`.
    ///
    /// `dst` is left untouched on failure.
    ///
    /// # Errors
    ///
    /// As [`EntityStore::retrieve`].
    pub async fn retrieve_into<T>(&self, entity_id: &str, dst: &mut T) -> StorageResult<()>
    where
        T: DeserializeOwned + Send,
    {
        *dst = self.retrieve(entity_id).await?;
        Ok(())
    }

    /// Deletes the record under `entity_id`.
    ///
    /// Deleting an absent record succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] for an invalid id and any error
    /// the store reports.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn try_delete(&self, entity_id: &str) -> StorageResult<()> {
        let key = self.key(entity_id)?;
        self.backend.delete(&key).await
    }

    /// Returns whether an entity with `entity_id` exists in this service's
    /// collection.
    pub async fn exists(&self, entity_id: &str) -> bool {
        match self.key(entity_id) {
            Ok(key) => self.exist(&KeyQuery::for_key(&key)).await,
            Err(_) => false,
        }
    }

    async fn put<T>(&self, entity_id: &str, entity: &T) -> StorageResult<EntityKey>
    where
        T: Serialize + Sync + ?Sized,
    {
        let key = self.key(entity_id)?;
        let value = encode_entity(entity)?;
        let stored = self.backend.put(&key, value).await?;
        debug!(key = %stored, "entity stored");
        Ok(stored)
    }
}

#[async_trait]
impl EntityStore for EntityService {
    #[instrument(skip(self, entity), fields(collection = %self.collection))]
    async fn save<T>(&self, entity_id: &str, entity: &T) -> StorageResult<EntityKey>
    where
        T: Serialize + Sync + ?Sized,
    {
        self.put(entity_id, entity).await
    }

    #[instrument(skip(self, entity), fields(collection = %self.collection))]
    async fn update<T>(&self, entity_id: &str, entity: &T) -> StorageResult<EntityKey>
    where
        T: Serialize + Sync + ?Sized,
    {
        self.put(entity_id, entity).await
    }

    #[instrument(skip(self), fields(collection = %self.collection))]
    async fn retrieve<T>(&self, entity_id: &str) -> StorageResult<T>
    where
        T: DeserializeOwned + Send,
    {
        let key = self.key(entity_id)?;
        match self.backend.get(&key).await? {
            Some(bytes) => decode_entity(&bytes),
            None => Err(StorageError::not_found(key.to_string())),
        }
    }

    async fn delete(&self, entity_id: &str) -> bool {
        match self.try_delete(entity_id).await {
            Ok(()) => false,
            Err(err) => {
                warn!(entity_id, error = %err, "entity delete failed");
                true
            },
        }
    }

    #[instrument(skip(self, query), fields(collection = query.collection()))]
    async fn exist(&self, query: &KeyQuery) -> bool {
        match self.backend.count(query).await {
            Ok(count) => count > 0,
            Err(err) => {
                debug!(error = %err, "existence query failed");
                false
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use docstore_common_storage::{MemoryBackend, assert_invalid_key, assert_not_found};
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Application {
        name: String,
        seats: u32,
    }

    fn service() -> EntityService {
        EntityService::new(Arc::new(MemoryBackend::new()), "application")
    }

    fn app(seats: u32) -> Application {
        Application { name: "billing".into(), seats }
    }

    #[tokio::test]
    async fn test_save_then_retrieve() {
        let entities = service();
        let key = entities.save("app-1", &app(4)).await.unwrap();
        assert_eq!(key.collection(), "application");
        assert_eq!(key.name(), "app-1");

        let loaded: Application = entities.retrieve("app-1").await.unwrap();
        assert_eq!(loaded, app(4));
    }

    #[tokio::test]
    async fn test_update_overwrites() {
        let entities = service();
        entities.save("app-1", &app(4)).await.unwrap();
        entities.update("app-1", &app(9)).await.unwrap();

        let mut loaded = app(0);
        entities.retrieve_into("app-1", &mut loaded).await.unwrap();
        assert_eq!(loaded.seats, 9);
    }

    #[tokio::test]
    async fn test_retrieve_missing_is_not_found() {
        let entities = service();
        let result = entities.retrieve::<Application>("ghost").await;
        assert_not_found!(result);
    }

    #[tokio::test]
    async fn test_retrieve_into_leaves_dst_on_failure() {
        let entities = service();
        let mut dst = app(1);
        assert!(entities.retrieve_into("ghost", &mut dst).await.is_err());
        assert_eq!(dst, app(1));
    }

    #[tokio::test]
    async fn test_save_empty_id_is_invalid_key() {
        let entities = service();
        let result = entities.save("", &app(1)).await;
        assert_invalid_key!(result);
    }

    #[tokio::test]
    async fn test_delete_polarity() {
        let entities = service();
        entities.save("app-1", &app(1)).await.unwrap();

        assert!(!entities.delete("app-1").await, "successful delete reports false");
        assert!(!entities.exists("app-1").await);
        assert!(entities.delete("").await, "failed delete reports true");
    }

    #[tokio::test]
    async fn test_exist_queries() {
        let entities = service();
        entities.save("app-1", &app(1)).await.unwrap();

        assert!(entities.exists("app-1").await);
        assert!(!entities.exists("app-2").await);
        assert!(!entities.exists("").await);

        let whole = KeyQuery::new("application").unwrap();
        assert!(entities.exist(&whole).await);
        let other = KeyQuery::new("elsewhere").unwrap();
        assert!(!entities.exist(&other).await);
    }
}
