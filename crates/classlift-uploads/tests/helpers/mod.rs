//! Test helpers: in-memory policy clients and storage uploaders.
//!
//! Run from workspace root: `cargo test -p classlift-uploads`.

#![allow(dead_code)]

pub mod fakes;

use std::sync::{Arc, Mutex};

use classlift_core::{UploadFile, UploadRecord};
use classlift_uploads::{StoreChange, Subscription, UploadStateStore};

pub fn video_file() -> UploadFile {
    UploadFile::new("lesson.mp4", "video/mp4", vec![0u8; 2048])
}

/// Records every committed write for later assertions.
pub fn record_changes(
    store: &Arc<UploadStateStore>,
) -> (Subscription, Arc<Mutex<Vec<StoreChange>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let subscription = store.subscribe(move |change| sink.lock().unwrap().push(change.clone()));
    (subscription, seen)
}

/// Records written for one object id, in commit order (removals skipped).
pub fn history_of(changes: &[StoreChange], object_id: &str) -> Vec<UploadRecord> {
    changes
        .iter()
        .filter(|c| c.object_id == object_id)
        .filter_map(|c| c.record.clone())
        .collect()
}

/// Yield to spawned attempts until `condition` holds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}
