//! In-memory backends.
//!
//! Used by the CLI's local runs and by tests. Each backend can be told to
//! fail so partial-failure paths are reachable without a network.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{AppError, Result};
use crate::models::{
    CatalogItem, InventoryRecord, Notification, ObjectLocation, PriceClass, QueuedRowMessage,
};
use crate::storage::{
    CatalogStore, MessageChannel, NotificationTopic, ObjectReader, ObjectStore, UploadSigner,
    WriteOutcome,
};

// --- Object store ---

/// Object store keeping whole objects in memory.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<ObjectLocation, Vec<u8>>>,
    fail_copy: AtomicBool,
    fail_delete: AtomicBool,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, location: &ObjectLocation, bytes: impl Into<Vec<u8>>) {
        self.objects.lock().insert(location.clone(), bytes.into());
    }

    pub fn contains(&self, location: &ObjectLocation) -> bool {
        self.objects.lock().contains_key(location)
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.lock().keys().map(|l| l.key.clone()).collect();
        keys.sort();
        keys
    }

    pub fn set_copy_failure(&self, fail: bool) {
        self.fail_copy.store(fail, Ordering::SeqCst);
    }

    pub fn set_delete_failure(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn open(&self, location: &ObjectLocation) -> Result<ObjectReader> {
        let bytes = self
            .objects
            .lock()
            .get(location)
            .cloned()
            .ok_or_else(|| AppError::not_found(&location.bucket, &location.key))?;
        Ok(Box::pin(Cursor::new(bytes)))
    }

    async fn copy(&self, from: &ObjectLocation, to: &ObjectLocation) -> Result<()> {
        if self.fail_copy.load(Ordering::SeqCst) {
            return Err(AppError::storage(format!("copy {from} -> {to} rejected")));
        }
        let mut objects = self.objects.lock();
        let bytes = objects
            .get(from)
            .cloned()
            .ok_or_else(|| AppError::not_found(&from.bucket, &from.key))?;
        objects.insert(to.clone(), bytes);
        Ok(())
    }

    async fn delete(&self, location: &ObjectLocation) -> Result<()> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(AppError::storage(format!("delete {location} rejected")));
        }
        // Deleting a missing key succeeds, as in S3.
        self.objects.lock().remove(location);
        Ok(())
    }
}

// --- Signer ---

/// Signer producing inspectable fake URLs.
#[derive(Debug, Default, Clone)]
pub struct MemorySigner;

#[async_trait]
impl UploadSigner for MemorySigner {
    async fn presign_put(
        &self,
        location: &ObjectLocation,
        content_type: &str,
        expires_in: Duration,
    ) -> Result<String> {
        Ok(format!(
            "memory://{}/{}?content-type={}&expires={}",
            location.bucket,
            location.key,
            content_type,
            expires_in.as_secs()
        ))
    }
}

// --- Queue ---

#[derive(Debug, Clone)]
struct StoredMessage {
    message_id: String,
    body: String,
    receive_count: u32,
}

#[derive(Debug, Default)]
struct QueueState {
    next_id: u64,
    sent: usize,
    ready: VecDeque<StoredMessage>,
    in_flight: HashMap<String, StoredMessage>,
    dead_letters: Vec<QueuedRowMessage>,
}

/// At-least-once queue with receive / acknowledge / redeliver semantics.
#[derive(Debug)]
pub struct MemoryQueue {
    state: Mutex<QueueState>,
    max_receive_count: u32,
    fail_after: Mutex<Option<usize>>,
}

impl MemoryQueue {
    /// Messages received `max_receive_count` times without acknowledgement
    /// are moved to the dead-letter list on release.
    pub fn new(max_receive_count: u32) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            max_receive_count: max_receive_count.max(1),
            fail_after: Mutex::new(None),
        }
    }

    /// Make every send after the first `sends` fail.
    pub fn fail_after(&self, sends: usize) {
        *self.fail_after.lock() = Some(sends);
    }

    /// Take up to `max` ready messages; they stay in flight until
    /// acknowledged or released.
    pub fn receive(&self, max: usize) -> Vec<QueuedRowMessage> {
        let mut state = self.state.lock();
        let mut batch = Vec::new();
        while batch.len() < max {
            let Some(mut message) = state.ready.pop_front() else {
                break;
            };
            message.receive_count += 1;
            let receipt = format!("{}-{}", message.message_id, message.receive_count);
            batch.push(QueuedRowMessage {
                message_id: message.message_id.clone(),
                receipt_handle: Some(receipt.clone()),
                body: message.body.clone(),
                receive_count: message.receive_count,
            });
            state.in_flight.insert(receipt, message);
        }
        batch
    }

    /// Delete delivered messages from the queue.
    pub fn ack(&self, batch: &[QueuedRowMessage]) {
        let mut state = self.state.lock();
        for message in batch {
            if let Some(receipt) = &message.receipt_handle {
                state.in_flight.remove(receipt);
            }
        }
    }

    /// Return delivered messages for redelivery, dead-lettering those that
    /// have used up their receives. Returns how many were dead-lettered.
    pub fn release(&self, batch: &[QueuedRowMessage]) -> usize {
        let mut state = self.state.lock();
        let mut dead = 0;
        for message in batch {
            let Some(stored) = message
                .receipt_handle
                .as_ref()
                .and_then(|receipt| state.in_flight.remove(receipt))
            else {
                continue;
            };
            if stored.receive_count >= self.max_receive_count {
                state.dead_letters.push(message.clone());
                dead += 1;
            } else {
                state.ready.push_back(stored);
            }
        }
        dead
    }

    /// Bodies of messages waiting for delivery, in queue order.
    pub fn pending_bodies(&self) -> Vec<String> {
        self.state.lock().ready.iter().map(|m| m.body.clone()).collect()
    }

    pub fn pending(&self) -> usize {
        self.state.lock().ready.len()
    }

    pub fn in_flight(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    pub fn dead_letters(&self) -> Vec<QueuedRowMessage> {
        self.state.lock().dead_letters.clone()
    }
}

#[async_trait]
impl MessageChannel for MemoryQueue {
    async fn send(&self, body: &str) -> Result<()> {
        let limit = *self.fail_after.lock();
        let mut state = self.state.lock();
        if limit.is_some_and(|limit| state.sent >= limit) {
            return Err(AppError::queue("queue unavailable"));
        }
        state.next_id += 1;
        state.sent += 1;
        let message_id = format!("msg-{:06}", state.next_id);
        state.ready.push_back(StoredMessage {
            message_id,
            body: body.to_string(),
            receive_count: 0,
        });
        Ok(())
    }
}

// --- Catalog ---

#[derive(Debug, Default)]
struct CatalogState {
    products: HashMap<String, CatalogItem>,
    stocks: HashMap<String, InventoryRecord>,
    notified: HashSet<String>,
}

/// Catalog with the same all-or-nothing create semantics as the real tables.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    state: Mutex<CatalogState>,
    fail_writes: AtomicBool,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_write_failure(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn product(&self, id: &str) -> Option<CatalogItem> {
        self.state.lock().products.get(id).cloned()
    }

    pub fn stock(&self, product_id: &str) -> Option<InventoryRecord> {
        self.state.lock().stocks.get(product_id).cloned()
    }

    pub fn product_count(&self) -> usize {
        self.state.lock().products.len()
    }

    pub fn stock_count(&self) -> usize {
        self.state.lock().stocks.len()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn create_product(
        &self,
        item: &CatalogItem,
        stock: &InventoryRecord,
    ) -> Result<WriteOutcome> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::datastore("table unavailable"));
        }
        let mut state = self.state.lock();
        if state.products.contains_key(&item.id) || state.stocks.contains_key(&stock.product_id) {
            return Ok(WriteOutcome::AlreadyExists);
        }
        state.products.insert(item.id.clone(), item.clone());
        state
            .stocks
            .insert(stock.product_id.clone(), stock.clone());
        Ok(WriteOutcome::Created)
    }

    async fn is_notified(&self, product_id: &str) -> Result<bool> {
        Ok(self.state.lock().notified.contains(product_id))
    }

    async fn mark_notified(&self, product_id: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::datastore("table unavailable"));
        }
        let mut state = self.state.lock();
        if !state.products.contains_key(product_id) {
            return Err(AppError::datastore(format!("product {product_id} does not exist")));
        }
        state.notified.insert(product_id.to_string());
        Ok(())
    }
}

// --- Topic ---

/// Topic recording published notifications and routing them by price.
#[derive(Debug)]
pub struct MemoryTopic {
    price_threshold: u64,
    published: Mutex<Vec<Notification>>,
    fail_publish: AtomicBool,
}

impl MemoryTopic {
    pub fn new(price_threshold: u64) -> Self {
        Self {
            price_threshold,
            published: Mutex::new(Vec::new()),
            fail_publish: AtomicBool::new(false),
        }
    }

    pub fn set_publish_failure(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<Notification> {
        self.published.lock().clone()
    }

    /// Notifications a subscriber of `class` would have received.
    pub fn delivered_to(&self, class: PriceClass) -> Vec<Notification> {
        self.published
            .lock()
            .iter()
            .filter(|n| class.accepts(n.price, self.price_threshold))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationTopic for MemoryTopic {
    async fn publish(&self, notification: &Notification) -> Result<()> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(AppError::notification("topic unavailable"));
        }
        self.published.lock().push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str) -> (CatalogItem, InventoryRecord) {
        (
            CatalogItem {
                id: id.into(),
                title: "T".into(),
                description: "D".into(),
                price: 10,
            },
            InventoryRecord {
                product_id: id.into(),
                count: 1,
            },
        )
    }

    #[tokio::test]
    async fn test_queue_redelivers_then_dead_letters() {
        let queue = MemoryQueue::new(2);
        queue.send("a").await.unwrap();

        let first = queue.receive(10);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].receive_count, 1);
        assert_eq!(queue.release(&first), 0);

        let second = queue.receive(10);
        assert_eq!(second[0].receive_count, 2);
        assert!(second[0].receipt_handle != first[0].receipt_handle);
        assert_eq!(queue.release(&second), 1);

        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.dead_letters().len(), 1);
    }

    #[tokio::test]
    async fn test_queue_ack_removes_in_flight() {
        let queue = MemoryQueue::new(3);
        queue.send("a").await.unwrap();
        queue.send("b").await.unwrap();

        let batch = queue.receive(1);
        assert_eq!(queue.in_flight(), 1);
        queue.ack(&batch);
        assert_eq!(queue.in_flight(), 0);
        assert_eq!(queue.pending_bodies(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_queue_fail_after() {
        let queue = MemoryQueue::new(3);
        queue.fail_after(1);
        assert!(queue.send("a").await.is_ok());
        assert!(matches!(queue.send("b").await, Err(AppError::Queue(_))));
    }

    #[tokio::test]
    async fn test_catalog_create_if_absent() {
        let catalog = MemoryCatalog::new();
        let (item, stock) = product("1");

        assert_eq!(
            catalog.create_product(&item, &stock).await.unwrap(),
            WriteOutcome::Created
        );

        let changed = CatalogItem {
            title: "Other".into(),
            ..item.clone()
        };
        assert_eq!(
            catalog.create_product(&changed, &stock).await.unwrap(),
            WriteOutcome::AlreadyExists
        );
        assert_eq!(catalog.product("1").unwrap().title, "T");
        assert_eq!(catalog.product_count(), 1);
        assert_eq!(catalog.stock_count(), 1);
    }

    #[tokio::test]
    async fn test_catalog_notified_marker() {
        let catalog = MemoryCatalog::new();
        let (item, stock) = product("1");

        assert!(catalog.mark_notified("1").await.is_err());
        catalog.create_product(&item, &stock).await.unwrap();
        assert!(!catalog.is_notified("1").await.unwrap());

        catalog.mark_notified("1").await.unwrap();
        assert!(catalog.is_notified("1").await.unwrap());
    }

    #[tokio::test]
    async fn test_object_store_copy_failure_keeps_source() {
        let store = MemoryObjectStore::new();
        let source = ObjectLocation::new("b", "uploaded/a.csv");
        store.put(&source, "x");
        store.set_copy_failure(true);

        let dest = ObjectLocation::new("b", "parsed/a.csv");
        assert!(store.copy(&source, &dest).await.is_err());
        assert!(store.contains(&source));
        assert!(!store.contains(&dest));
    }
}
