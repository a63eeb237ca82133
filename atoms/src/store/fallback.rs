use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{KvStore, SharedStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingWrite {
    Put,
    Delete,
}

/// Dual-write store: the primary is authoritative, the local copy keeps
/// serving when the primary is unreachable.
///
/// Only `StoreError::Unavailable` from the primary diverts a call to the
/// local copy. A key the local copy does not hold stays `Unavailable` during
/// an outage rather than reading as missing. Writes that land locally are tracked as pending until
/// [`KvStore::reconcile`] replays them, so the two copies never drift apart
/// permanently. Replay is last-write-wins.
pub struct FallbackKvStore {
    primary: SharedStore,
    local: SharedStore,
    pending: Mutex<BTreeMap<String, PendingWrite>>,
}

impl FallbackKvStore {
    pub fn new(primary: SharedStore, local: SharedStore) -> Self {
        Self {
            primary,
            local,
            pending: Mutex::new(BTreeMap::new()),
        }
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    async fn park(&self, key: &str, write: PendingWrite) {
        self.pending.lock().await.insert(key.to_string(), write);
    }
}

#[async_trait]
impl KvStore for FallbackKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let parked = self.pending.lock().await.get(key).copied();
        match parked {
            Some(PendingWrite::Delete) => return Ok(None),
            Some(PendingWrite::Put) => return self.local.get(key).await,
            None => {}
        }

        match self.primary.get(key).await {
            Err(StoreError::Unavailable(reason)) => {
                tracing::warn!("Primary store unreachable ({}), reading {} locally", reason, key);
                // A local miss says nothing about the primary; callers must not treat it as absent
                match self.local.get(key).await? {
                    Some(value) => Ok(Some(value)),
                    None => Err(StoreError::Unavailable(reason)),
                }
            }
            other => other,
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        match self.primary.set(key, value.clone()).await {
            Ok(()) => {
                self.pending.lock().await.remove(key);
                if let Err(e) = self.local.set(key, value).await {
                    tracing::warn!("Local copy of {} not refreshed: {}", key, e);
                }
                Ok(())
            }
            Err(StoreError::Unavailable(reason)) => {
                tracing::warn!("Primary store unreachable ({}), writing {} locally", reason, key);
                self.local.set(key, value).await?;
                self.park(key, PendingWrite::Put).await;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        match self.primary.del(key).await {
            Ok(()) => {
                self.pending.lock().await.remove(key);
                self.local.del(key).await
            }
            Err(StoreError::Unavailable(reason)) => {
                tracing::warn!("Primary store unreachable ({}), deleting {} locally", reason, key);
                self.local.del(key).await?;
                self.park(key, PendingWrite::Delete).await;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn get_by_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>, StoreError> {
        let primary_entries = match self.primary.get_by_prefix(prefix).await {
            Ok(entries) => entries,
            Err(StoreError::Unavailable(reason)) => {
                tracing::warn!("Primary store unreachable ({}), scanning {} locally", reason, prefix);
                return self.local.get_by_prefix(prefix).await;
            }
            Err(e) => return Err(e),
        };

        let mut merged: BTreeMap<String, Value> = primary_entries.into_iter().collect();

        let parked: Vec<(String, PendingWrite)> = self
            .pending
            .lock()
            .await
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, w)| (k.clone(), *w))
            .collect();

        for (key, write) in parked {
            match write {
                PendingWrite::Delete => {
                    merged.remove(&key);
                }
                PendingWrite::Put => {
                    if let Some(value) = self.local.get(&key).await? {
                        merged.insert(key, value);
                    }
                }
            }
        }

        Ok(merged.into_iter().collect())
    }

    async fn reconcile(&self) -> Result<usize, StoreError> {
        let parked: Vec<(String, PendingWrite)> = self
            .pending
            .lock()
            .await
            .iter()
            .map(|(k, w)| (k.clone(), *w))
            .collect();

        let mut replayed = 0;
        for (key, write) in parked {
            let result = match write {
                PendingWrite::Put => match self.local.get(&key).await? {
                    Some(value) => self.primary.set(&key, value).await,
                    None => Ok(()),
                },
                PendingWrite::Delete => self.primary.del(&key).await,
            };

            match result {
                Ok(()) => {
                    self.pending.lock().await.remove(&key);
                    replayed += 1;
                }
                Err(StoreError::Unavailable(reason)) => {
                    tracing::warn!(
                        "Primary store still unreachable ({}), {} writes stay parked",
                        reason,
                        self.pending.lock().await.len()
                    );
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        if replayed > 0 {
            tracing::info!("Replayed {} parked writes into the primary store", replayed);
        }
        Ok(replayed)
    }
}
