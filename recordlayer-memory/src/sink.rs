//! A change sink that keeps events in memory.

use async_trait::async_trait;
use mea::rwlock::RwLock;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use recordlayer_core::{
    error::{RecordStoreError, RecordStoreResult},
    notify::{ChangeEvent, ChangeSink, Operation},
};

/// Collects published [`ChangeEvent`]s, in publish order.
///
/// Clones share the same event list, so a test can hand one clone to an adapter and inspect
/// another. [`fail_deliveries`](MemoryChangeSink::fail_deliveries) makes every publish fail,
/// which is useful for checking that writes survive notification outages.
#[derive(Debug, Clone, Default)]
pub struct MemoryChangeSink {
    events: Arc<RwLock<Vec<ChangeEvent>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryChangeSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events received so far.
    pub async fn events(&self) -> Vec<ChangeEvent> {
        self.events.read().await.clone()
    }

    /// Events of one kind received so far.
    pub async fn events_of(&self, operation: Operation) -> Vec<ChangeEvent> {
        self.events
            .read()
            .await
            .iter()
            .filter(|event| event.operation == operation)
            .cloned()
            .collect()
    }

    pub async fn clear(&self) {
        self.events.write().await.clear();
    }

    /// While enabled, publishing fails with [`RecordStoreError::Notification`] and the event is
    /// dropped.
    pub fn fail_deliveries(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChangeSink for MemoryChangeSink {
    async fn publish(&self, event: ChangeEvent) -> RecordStoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RecordStoreError::Notification(format!(
                "delivery of event {} disabled",
                event.id
            )));
        }

        self.events.write().await.push(event);
        Ok(())
    }
}
