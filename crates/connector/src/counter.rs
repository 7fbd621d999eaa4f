//! Atomic counters over a transactional store.
//!
//! Each counter is one entity holding `{"Amount": n}`. Every operation runs a
//! read-modify-write inside a single store transaction, so concurrent
//! increments on the same counter serialize instead of losing updates. An
//! absent counter reads as zero and decrements clamp at zero.
//!
//! The [`AtomicCounter`] methods report plain success flags and amounts.
//! Failures are logged, passed to an optional [`CounterErrorHook`] and then
//! swallowed. Callers that need the error use the `try_*` methods on
//! [`CounterService`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use docstore_common_storage::MemoryBackend;
//! use docstore_connector::{AtomicCounter, CounterService};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let counters = CounterService::new(Arc::new(MemoryBackend::new()), "counters");
//!
//! assert!(counters.increment("visits", 5).await);
//! assert!(counters.decrement("visits", 100).await);
//! assert_eq!(counters.count("visits").await, 0);
//! # });
//! ```

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use docstore_common_storage::{
    EntityKey, StorageBackend, StorageError, Transaction, decode_entity, encode_entity,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// The stored form of a counter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    /// Current value.
    #[serde(rename = "Amount")]
    pub amount: u64,
}

/// Errors from counter operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CounterError {
    /// The store failed, or the entity id is not a valid key.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// An increment would exceed `u64::MAX`.
    #[error("Counter overflow: {current} + {delta}")]
    Overflow {
        /// Amount before the increment.
        current: u64,
        /// Requested increment.
        delta: u64,
    },
}

/// Which counter operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterOperation {
    /// Read the current amount.
    Count,
    /// Add to the amount.
    Increment,
    /// Subtract from the amount, clamping at zero.
    Decrement,
}

impl fmt::Display for CounterOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Count => "count",
            Self::Increment => "increment",
            Self::Decrement => "decrement",
        })
    }
}

/// Receives counter failures that the boolean API swallows.
pub trait CounterErrorHook: Send + Sync {
    /// Called once per failed operation, after the transaction is released.
    fn on_error(&self, operation: CounterOperation, entity_id: &str, error: &CounterError);
}

impl<F> CounterErrorHook for F
where
    F: Fn(CounterOperation, &str, &CounterError) + Send + Sync,
{
    fn on_error(&self, operation: CounterOperation, entity_id: &str, error: &CounterError) {
        self(operation, entity_id, error);
    }
}

/// Counter contract: read, add and clamped subtract.
#[async_trait]
pub trait AtomicCounter: Send + Sync {
    /// Returns the counter's amount, or 0 if it is absent or the read fails.
    async fn count(&self, entity_id: &str) -> u64;

    /// Adds `delta`. Returns whether the change was committed.
    async fn increment(&self, entity_id: &str, delta: u64) -> bool;

    /// Subtracts `delta`, clamping at zero. Returns whether the change was
    /// committed.
    async fn decrement(&self, entity_id: &str, delta: u64) -> bool;
}

/// [`AtomicCounter`] over one collection of a [`StorageBackend`].
#[derive(Clone)]
pub struct CounterService {
    backend: Arc<dyn StorageBackend>,
    collection: String,
    hook: Option<Arc<dyn CounterErrorHook>>,
}

impl fmt::Debug for CounterService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterService")
            .field("collection", &self.collection)
            .field("hook", &self.hook.is_some())
            .finish_non_exhaustive()
    }
}

impl CounterService {
    /// Creates a service storing counters in `collection`.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>, collection: impl Into<String>) -> Self {
        Self { backend, collection: collection.into(), hook: None }
    }

    /// Installs a hook that observes swallowed failures.
    #[must_use]
    pub fn with_error_hook(mut self, hook: impl CounterErrorHook + 'static) -> Self {
        self.hook = Some(Arc::new(hook));
        self
    }

    /// Returns the collection counters live in.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Reads the counter's amount inside a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CounterError::Storage`] if the key is invalid, the
    /// transaction cannot be opened or committed, or the stored record is
    /// not a counter.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn try_count(&self, entity_id: &str) -> Result<u64, CounterError> {
        self.run(entity_id, CounterOperation::Count, 0).await
    }

    /// Adds `delta` inside a transaction and returns the committed amount.
    ///
    /// # Errors
    ///
    /// As [`try_count`](Self::try_count), plus [`CounterError::Overflow`].
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn try_increment(&self, entity_id: &str, delta: u64) -> Result<u64, CounterError> {
        self.run(entity_id, CounterOperation::Increment, delta).await
    }

    /// Subtracts `delta`, clamping at zero, and returns the committed amount.
    ///
    /// # Errors
    ///
    /// As [`try_count`](Self::try_count).
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn try_decrement(&self, entity_id: &str, delta: u64) -> Result<u64, CounterError> {
        self.run(entity_id, CounterOperation::Decrement, delta).await
    }

    async fn run(
        &self,
        entity_id: &str,
        operation: CounterOperation,
        delta: u64,
    ) -> Result<u64, CounterError> {
        let key = EntityKey::new(self.collection.as_str(), entity_id)?;
        let mut txn = self.backend.transaction().await?;

        match stage(txn.as_mut(), &key, operation, delta).await {
            Ok(amount) => {
                txn.commit().await?;
                debug!(amount, "counter committed");
                Ok(amount)
            },
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    debug!(error = %rollback_err, "counter rollback failed");
                }
                Err(err)
            },
        }
    }

    fn report(&self, operation: CounterOperation, entity_id: &str, error: &CounterError) {
        warn!(entity_id, %operation, error = %error, "counter operation failed");
        if let Some(hook) = &self.hook {
            hook.on_error(operation, entity_id, error);
        }
    }
}

/// Reads the current amount and buffers the updated record.
async fn stage(
    txn: &mut dyn Transaction,
    key: &EntityKey,
    operation: CounterOperation,
    delta: u64,
) -> Result<u64, CounterError> {
    let current = match txn.get(key).await? {
        Some(bytes) => decode_entity::<Counter>(&bytes)?.amount,
        None => 0,
    };

    let amount = match operation {
        CounterOperation::Count => return Ok(current),
        CounterOperation::Increment => {
            current.checked_add(delta).ok_or(CounterError::Overflow { current, delta })?
        },
        CounterOperation::Decrement => current.saturating_sub(delta),
    };

    txn.put(key.clone(), encode_entity(&Counter { amount })?);
    Ok(amount)
}

#[async_trait]
impl AtomicCounter for CounterService {
    async fn count(&self, entity_id: &str) -> u64 {
        self.try_count(entity_id).await.unwrap_or_else(|err| {
            self.report(CounterOperation::Count, entity_id, &err);
            0
        })
    }

    async fn increment(&self, entity_id: &str, delta: u64) -> bool {
        match self.try_increment(entity_id, delta).await {
            Ok(_) => true,
            Err(err) => {
                self.report(CounterOperation::Increment, entity_id, &err);
                false
            },
        }
    }

    async fn decrement(&self, entity_id: &str, delta: u64) -> bool {
        match self.try_decrement(entity_id, delta).await {
            Ok(_) => true,
            Err(err) => {
                self.report(CounterOperation::Decrement, entity_id, &err);
                false
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use docstore_common_storage::MemoryBackend;
    use parking_lot::Mutex;
    use proptest::prelude::*;

    use super::*;

    fn service() -> (MemoryBackend, CounterService) {
        let backend = MemoryBackend::new();
        let service = CounterService::new(Arc::new(backend.clone()), "counters");
        (backend, service)
    }

    #[test]
    fn test_counter_record_shape() {
        let bytes = encode_entity(&Counter { amount: 7 }).unwrap();
        assert_eq!(bytes, br#"{"Amount":7}"#);
    }

    #[tokio::test]
    async fn test_absent_counter_counts_zero() {
        let (_, counters) = service();
        assert_eq!(counters.count("never-touched").await, 0);
    }

    #[tokio::test]
    async fn test_increment_then_count() {
        let (_, counters) = service();
        assert!(counters.increment("visits", 3).await);
        assert!(counters.increment("visits", 4).await);
        assert_eq!(counters.count("visits").await, 7);
    }

    #[tokio::test]
    async fn test_decrement_clamps_at_zero() {
        let (_, counters) = service();
        assert!(counters.increment("stock", 3).await);
        assert!(counters.decrement("stock", 100).await);
        assert_eq!(counters.count("stock").await, 0);
    }

    #[tokio::test]
    async fn test_zero_delta_writes_record() {
        let (backend, counters) = service();
        assert!(counters.increment("idle", 0).await);
        let key = EntityKey::new("counters", "idle").unwrap();
        let stored = backend.get(&key).await.unwrap().expect("record written");
        assert_eq!(decode_entity::<Counter>(&stored).unwrap(), Counter { amount: 0 });
    }

    #[tokio::test]
    async fn test_empty_entity_id_fails_without_panic() {
        let (_, counters) = service();
        assert!(!counters.increment("", 1).await);
        assert!(!counters.decrement("", 1).await);
        assert_eq!(counters.count("").await, 0);
        assert!(matches!(
            counters.try_increment("", 1).await,
            Err(CounterError::Storage(StorageError::InvalidKey { .. }))
        ));
    }

    #[tokio::test]
    async fn test_overflow_fails_and_leaves_amount() {
        let (_, counters) = service();
        assert_eq!(counters.try_increment("big", u64::MAX).await.unwrap(), u64::MAX);
        assert!(matches!(
            counters.try_increment("big", 1).await,
            Err(CounterError::Overflow { current: u64::MAX, delta: 1 })
        ));
        assert_eq!(counters.count("big").await, u64::MAX);
    }

    #[tokio::test]
    async fn test_corrupt_record_reports_to_hook() {
        let (backend, counters) = service();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let counters =
            counters.with_error_hook(move |op: CounterOperation, id: &str, err: &CounterError| {
                sink.lock().push((op, id.to_owned(), err.to_string()));
            });

        let key = EntityKey::new("counters", "garbled").unwrap();
        backend.put(&key, b"not json".to_vec()).await.unwrap();

        assert!(!counters.increment("garbled", 1).await);
        assert_eq!(counters.count("garbled").await, 0);

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, CounterOperation::Increment);
        assert_eq!(seen[0].1, "garbled");
        assert_eq!(seen[1].0, CounterOperation::Count);
    }

    #[tokio::test]
    async fn test_failed_operation_releases_entity() {
        let backend = MemoryBackend::with_lock_timeout(std::time::Duration::from_millis(100));
        let counters = CounterService::new(Arc::new(backend.clone()), "counters");

        let key = EntityKey::new("counters", "garbled").unwrap();
        backend.put(&key, b"not json".to_vec()).await.unwrap();
        assert!(!counters.increment("garbled", 1).await);

        // The rollback released the claim, so a plain write goes through.
        backend.put(&key, encode_entity(&Counter { amount: 2 }).unwrap()).await.unwrap();
        assert_eq!(counters.count("garbled").await, 2);
    }

    #[derive(Debug, Clone, Copy)]
    enum Step {
        Inc(u32),
        Dec(u32),
    }

    fn arb_step() -> impl Strategy<Value = Step> {
        prop_oneof![(0u32..1000).prop_map(Step::Inc), (0u32..1000).prop_map(Step::Dec)]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn counter_matches_clamped_running_sum(steps in proptest::collection::vec(arb_step(), 0..20)) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            rt.block_on(async {
                let (_, counters) = service();
                let mut expected = 0u64;
                for step in steps {
                    match step {
                        Step::Inc(d) => {
                            prop_assert!(counters.increment("c", u64::from(d)).await);
                            expected += u64::from(d);
                        },
                        Step::Dec(d) => {
                            prop_assert!(counters.decrement("c", u64::from(d)).await);
                            expected = expected.saturating_sub(u64::from(d));
                        },
                    }
                    prop_assert_eq!(counters.count("c").await, expected);
                }
                Ok(())
            })?;
        }
    }
}
