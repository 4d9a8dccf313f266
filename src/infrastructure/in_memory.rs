use crate::domain::outcome::{BatchResult, BatchState};
use crate::domain::ports::BatchStore;
use crate::error::{DispatchError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, watch};

/// A thread-safe, process-local batch store.
///
/// Each claimed batch id owns a `watch` slot that starts empty and is filled
/// exactly once by `save`. Claiming is an insert-if-absent performed under
/// the write lock, so two concurrent claims of the same id cannot both win.
#[derive(Default, Clone)]
pub struct InMemoryBatchStore {
    slots: Arc<RwLock<HashMap<String, watch::Sender<Option<BatchResult>>>>>,
}

impl InMemoryBatchStore {
    /// Creates a new, empty in-memory batch store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BatchStore for InMemoryBatchStore {
    async fn claim(&self, batch_id: &str) -> Result<bool> {
        let mut slots = self.slots.write().await;
        match slots.entry(batch_id.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(entry) => {
                let (slot, _) = watch::channel(None);
                entry.insert(slot);
                Ok(true)
            }
        }
    }

    async fn get(&self, batch_id: &str) -> Result<Option<BatchResult>> {
        let slots = self.slots.read().await;
        Ok(slots.get(batch_id).and_then(|slot| slot.borrow().clone()))
    }

    async fn save(&self, batch_id: &str, result: BatchResult) -> Result<()> {
        let slots = self.slots.read().await;
        let slot = slots
            .get(batch_id)
            .ok_or_else(|| DispatchError::NotClaimed(batch_id.to_string()))?;

        let mut saved = false;
        slot.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(result);
            saved = true;
            true
        });

        if saved {
            Ok(())
        } else {
            Err(DispatchError::AlreadySaved(batch_id.to_string()))
        }
    }

    async fn state(&self, batch_id: &str) -> Result<BatchState> {
        let slots = self.slots.read().await;
        Ok(match slots.get(batch_id) {
            None => BatchState::Unclaimed,
            Some(slot) if slot.borrow().is_some() => BatchState::Complete,
            Some(_) => BatchState::InFlight,
        })
    }

    async fn wait_for(&self, batch_id: &str, timeout: Duration) -> Result<Option<BatchResult>> {
        let mut receiver = {
            let slots = self.slots.read().await;
            match slots.get(batch_id) {
                Some(slot) => slot.subscribe(),
                None => return Err(DispatchError::BatchNotFound(batch_id.to_string())),
            }
        };

        match tokio::time::timeout(timeout, receiver.wait_for(Option::is_some)).await {
            Ok(Ok(result)) => Ok((*result).clone()),
            Ok(Err(_)) => Err(DispatchError::BatchNotFound(batch_id.to_string())),
            Err(_) => Ok(None),
        }
    }
}
