//! Observable store of upload records, keyed by object id.
//!
//! Every write replaces a whole record and is followed by one notification, so
//! observers never see a partially updated record. Commits are serialized: listeners
//! receive changes in commit order. Listeners may read the store but must not write
//! to it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use classlift_core::{AssetDescriptor, UploadFile, UploadRecord};
use tokio::sync::watch;

/// Point-in-time copy of every record, ordered by object id.
pub type UploadSnapshot = BTreeMap<String, UploadRecord>;

type Listener = Arc<dyn Fn(&StoreChange) + Send + Sync>;

/// One committed write. `record` is `None` when the key was removed.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    pub object_id: String,
    pub record: Option<UploadRecord>,
}

pub struct UploadStateStore {
    records: RwLock<UploadSnapshot>,
    commit_lock: Mutex<()>,
    listeners: RwLock<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
    next_attempt: AtomicU64,
    snapshot_tx: watch::Sender<UploadSnapshot>,
}

impl UploadStateStore {
    pub fn new() -> Arc<Self> {
        let (snapshot_tx, _) = watch::channel(UploadSnapshot::new());
        Arc::new(Self {
            records: RwLock::new(UploadSnapshot::new()),
            commit_lock: Mutex::new(()),
            listeners: RwLock::new(Vec::new()),
            next_listener_id: AtomicU64::new(1),
            next_attempt: AtomicU64::new(1),
            snapshot_tx,
        })
    }

    /// Begin a new attempt for `descriptor`: allocate its sequence number and write
    /// the `Init` record in one commit, replacing any record under the same id.
    ///
    /// Attempt numbers are strictly increasing in commit order, so the record always
    /// belongs to the latest attempt started for its id. Returns the new record and
    /// the one it replaced.
    pub fn start_attempt(
        &self,
        descriptor: &AssetDescriptor,
        file: UploadFile,
    ) -> (UploadRecord, Option<UploadRecord>) {
        let _commit = self.begin_commit();
        let attempt = self.next_attempt.fetch_add(1, Ordering::SeqCst);
        let record = UploadRecord::init(descriptor, file, attempt);
        let previous = self
            .records_mut()
            .insert(record.object_id.clone(), record.clone());
        self.publish(StoreChange {
            object_id: record.object_id.clone(),
            record: Some(record.clone()),
        });
        (record, previous)
    }

    /// Replace the record stored under `record.object_id`, last write wins.
    pub fn set_record(&self, record: UploadRecord) {
        let _commit = self.begin_commit();
        let object_id = record.object_id.clone();
        self.records_mut().insert(object_id.clone(), record.clone());
        self.publish(StoreChange {
            object_id,
            record: Some(record),
        });
    }

    /// Apply `update` to a copy of the record and commit it, but only if the record
    /// still exists and still belongs to `attempt`. Unchanged copies are not committed.
    ///
    /// Returns whether the record is still owned by `attempt`.
    pub fn update_attempt<F>(&self, object_id: &str, attempt: u64, update: F) -> bool
    where
        F: FnOnce(&mut UploadRecord),
    {
        let _commit = self.begin_commit();
        let updated = {
            let mut records = self.records_mut();
            let current = match records.get_mut(object_id) {
                Some(record) if record.attempt == attempt => record,
                _ => return false,
            };

            let mut next = current.clone();
            update(&mut next);
            next.object_id = current.object_id.clone();
            next.attempt = attempt;
            if next == *current {
                return true;
            }
            *current = next.clone();
            next
        };

        self.publish(StoreChange {
            object_id: object_id.to_string(),
            record: Some(updated),
        });
        true
    }

    pub fn get_record(&self, object_id: &str) -> Option<UploadRecord> {
        self.records().get(object_id).cloned()
    }

    pub fn get_all(&self) -> UploadSnapshot {
        self.records().clone()
    }

    pub fn contains(&self, object_id: &str) -> bool {
        self.records().contains_key(object_id)
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    /// Delete the key. Removing an absent key is a no-op and notifies nobody.
    pub fn remove_record(&self, object_id: &str) -> Option<UploadRecord> {
        let _commit = self.begin_commit();
        let removed = self.records_mut().remove(object_id)?;
        self.publish(StoreChange {
            object_id: object_id.to_string(),
            record: None,
        });
        Some(removed)
    }

    /// Register a listener called after every committed write.
    ///
    /// The listener stays registered until the returned [`Subscription`] is disposed
    /// or dropped.
    pub fn subscribe<F>(self: &Arc<Self>, listener: F) -> Subscription
    where
        F: Fn(&StoreChange) + Send + Sync + 'static,
    {
        let id = self.next_listener_id.fetch_add(1, Ordering::SeqCst);
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));

        Subscription {
            store: Arc::downgrade(self),
            id,
        }
    }

    /// Reactive snapshot, refreshed after every committed write.
    pub fn observe(&self) -> watch::Receiver<UploadSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn unsubscribe(&self, id: u64) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(listener_id, _)| *listener_id != id);
    }

    fn begin_commit(&self) -> MutexGuard<'_, ()> {
        self.commit_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn records(&self) -> std::sync::RwLockReadGuard<'_, UploadSnapshot> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn records_mut(&self) -> std::sync::RwLockWriteGuard<'_, UploadSnapshot> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs with the commit lock held and the records lock released.
    fn publish(&self, change: StoreChange) {
        let snapshot = self.records().clone();
        self.snapshot_tx.send_replace(snapshot);

        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&change);
        }
    }
}

/// Disposer returned by [`UploadStateStore::subscribe`].
#[must_use = "the listener is removed when the subscription is dropped"]
pub struct Subscription {
    store: Weak<UploadStateStore>,
    id: u64,
}

impl Subscription {
    /// Stop receiving notifications.
    pub fn dispose(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classlift_core::{ObjectType, UploadStatus};

    fn record(object_id: &str, attempt: u64) -> UploadRecord {
        UploadRecord::init(
            &AssetDescriptor::new(ObjectType::Videos, object_id),
            UploadFile::new("lesson.mp4", "video/mp4", vec![0u8; 8]),
            attempt,
        )
    }

    fn recording_listener(
        store: &Arc<UploadStateStore>,
    ) -> (Subscription, Arc<Mutex<Vec<StoreChange>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription =
            store.subscribe(move |change| sink.lock().unwrap().push(change.clone()));
        (subscription, seen)
    }

    #[test]
    fn test_set_and_get_record() {
        let store = UploadStateStore::new();
        store.set_record(record("id1", 1));

        let stored = store.get_record("id1").unwrap();
        assert_eq!(stored.status, UploadStatus::Init);
        assert_eq!(stored.progress, 0);
        assert!(store.get_record("missing").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_set_record_replaces_whole_record() {
        let store = UploadStateStore::new();
        let mut first = record("id1", 1);
        first.message = Some("stale".to_string());
        first.status = UploadStatus::ErrSize;
        store.set_record(first);

        store.set_record(record("id1", 2));
        let stored = store.get_record("id1").unwrap();
        assert_eq!(stored.attempt, 2);
        assert_eq!(stored.status, UploadStatus::Init);
        assert_eq!(stored.message, None);
    }

    #[test]
    fn test_remove_record() {
        let store = UploadStateStore::new();
        store.set_record(record("id1", 1));

        assert!(store.remove_record("id1").is_some());
        assert!(store.get_record("id1").is_none());
        assert!(store.remove_record("id1").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_all_is_ordered_snapshot() {
        let store = UploadStateStore::new();
        store.set_record(record("b", 1));
        store.set_record(record("a", 2));

        let all = store.get_all();
        assert_eq!(all.keys().cloned().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_update_attempt_requires_matching_attempt() {
        let store = UploadStateStore::new();
        store.set_record(record("id1", 2));

        assert!(!store.update_attempt("id1", 1, |r| r.status = UploadStatus::Success));
        assert_eq!(store.get_record("id1").unwrap().status, UploadStatus::Init);

        assert!(store.update_attempt("id1", 2, |r| r.status = UploadStatus::Uploading));
        assert_eq!(
            store.get_record("id1").unwrap().status,
            UploadStatus::Uploading
        );
    }

    #[test]
    fn test_update_attempt_on_absent_key_is_noop() {
        let store = UploadStateStore::new();
        let (_subscription, seen) = recording_listener(&store);

        assert!(!store.update_attempt("gone", 1, |r| r.progress = 50));
        assert!(store.get_record("gone").is_none());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_update_attempt_cannot_rekey_record() {
        let store = UploadStateStore::new();
        store.set_record(record("id1", 1));

        store.update_attempt("id1", 1, |r| {
            r.object_id = "other".to_string();
            r.attempt = 99;
            r.progress = 10;
        });

        let stored = store.get_record("id1").unwrap();
        assert_eq!(stored.object_id, "id1");
        assert_eq!(stored.attempt, 1);
        assert_eq!(stored.progress, 10);
        assert!(store.get_record("other").is_none());
    }

    #[test]
    fn test_listeners_see_every_commit_in_order() {
        let store = UploadStateStore::new();
        let (_subscription, seen) = recording_listener(&store);

        store.set_record(record("id1", 1));
        store.update_attempt("id1", 1, |r| r.status = UploadStatus::Uploading);
        store.update_attempt("id1", 1, |r| r.progress = 40);
        store.remove_record("id1");

        let changes = seen.lock().unwrap();
        assert_eq!(changes.len(), 4);
        assert_eq!(changes[0].record.as_ref().unwrap().status, UploadStatus::Init);
        assert_eq!(
            changes[1].record.as_ref().unwrap().status,
            UploadStatus::Uploading
        );
        assert_eq!(changes[2].record.as_ref().unwrap().progress, 40);
        assert_eq!(changes[3].record, None);
        assert!(changes.iter().all(|c| c.object_id == "id1"));
    }

    #[test]
    fn test_unchanged_update_does_not_notify() {
        let store = UploadStateStore::new();
        store.set_record(record("id1", 1));
        let (_subscription, seen) = recording_listener(&store);

        assert!(store.update_attempt("id1", 1, |r| r.progress = 0));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_listener_can_read_store() {
        let store = UploadStateStore::new();
        let reader = store.clone();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _subscription = store.subscribe(move |change| {
            let current = reader.get_record(&change.object_id);
            sink.lock().unwrap().push(current.map(|r| r.status));
        });

        store.set_record(record("id1", 1));
        assert_eq!(*seen.lock().unwrap(), vec![Some(UploadStatus::Init)]);
    }

    #[test]
    fn test_dispose_stops_notifications() {
        let store = UploadStateStore::new();
        let (subscription, seen) = recording_listener(&store);
        assert_eq!(store.listener_count(), 1);

        store.set_record(record("id1", 1));
        subscription.dispose();
        assert_eq!(store.listener_count(), 0);
        store.set_record(record("id2", 2));

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_start_attempt_writes_init_with_increasing_attempts() {
        let store = UploadStateStore::new();
        let (_subscription, seen) = recording_listener(&store);
        let descriptor = AssetDescriptor::new(ObjectType::Videos, "id1");
        let file = UploadFile::new("lesson.mp4", "video/mp4", vec![0u8; 8]);

        let (first, previous) = store.start_attempt(&descriptor, file.clone());
        assert!(previous.is_none());
        store.update_attempt("id1", first.attempt, |r| r.status = UploadStatus::ErrUpload);

        let (second, previous) = store.start_attempt(&descriptor, file);
        assert!(second.attempt > first.attempt);
        assert_eq!(previous.unwrap().status, UploadStatus::ErrUpload);
        assert_eq!(store.get_record("id1").unwrap(), second);
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_concurrent_start_attempt_keeps_latest_attempt() {
        let store = UploadStateStore::new();
        let descriptor = AssetDescriptor::new(ObjectType::Videos, "id1");

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let descriptor = descriptor.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let file = UploadFile::new("lesson.mp4", "video/mp4", vec![0u8; 8]);
                        store.start_attempt(&descriptor, file);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        let stored = store.get_record("id1").unwrap();
        let (latest, _) = store.start_attempt(&descriptor, stored.file.clone());
        assert_eq!(latest.attempt, stored.attempt + 1);
    }

    #[tokio::test]
    async fn test_observe_tracks_writes() {
        let store = UploadStateStore::new();
        let mut rx = store.observe();
        assert!(rx.borrow().is_empty());

        store.set_record(record("id1", 1));
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().contains_key("id1"));

        store.remove_record("id1");
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_empty());
    }
}
