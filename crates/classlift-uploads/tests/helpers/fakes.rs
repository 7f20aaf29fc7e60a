//! Scripted PolicyClient and StorageUploader implementations.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use classlift_api_client::PolicyClient;
use classlift_core::{AssetDescriptor, FileMeta, PolicyError, UploadError, UploadFile, UploadPolicy};
use classlift_storage::{ProgressCallback, StorageUploader};
use tokio::sync::oneshot;

pub fn s3_policy() -> UploadPolicy {
    UploadPolicy::new(
        "https://s3.example/",
        vec![("key".to_string(), "foo".to_string())],
    )
}

/// Answers every request with the same result.
pub struct FixedPolicyClient {
    result: Result<UploadPolicy, PolicyError>,
    pub requests: Mutex<Vec<(AssetDescriptor, FileMeta)>>,
}

impl FixedPolicyClient {
    pub fn ok(policy: UploadPolicy) -> Self {
        Self {
            result: Ok(policy),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn err(error: PolicyError) -> Self {
        Self {
            result: Err(error),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl PolicyClient for FixedPolicyClient {
    async fn request_upload_policy(
        &self,
        descriptor: &AssetDescriptor,
        file: &FileMeta,
    ) -> Result<UploadPolicy, PolicyError> {
        self.requests
            .lock()
            .unwrap()
            .push((descriptor.clone(), file.clone()));
        self.result.clone()
    }
}

/// Each request waits for the reply sent through the matching [`PolicyGate`].
/// Requests consume gates in call order.
pub struct GatedPolicyClient {
    replies: Mutex<VecDeque<oneshot::Receiver<Result<UploadPolicy, PolicyError>>>>,
    started: AtomicUsize,
}

pub struct PolicyGate(oneshot::Sender<Result<UploadPolicy, PolicyError>>);

impl PolicyGate {
    pub fn release(self, reply: Result<UploadPolicy, PolicyError>) {
        let _ = self.0.send(reply);
    }
}

impl GatedPolicyClient {
    pub fn new(count: usize) -> (Self, Vec<PolicyGate>) {
        let mut replies = VecDeque::new();
        let mut gates = Vec::new();
        for _ in 0..count {
            let (tx, rx) = oneshot::channel();
            replies.push_back(rx);
            gates.push(PolicyGate(tx));
        }
        (
            Self {
                replies: Mutex::new(replies),
                started: AtomicUsize::new(0),
            },
            gates,
        )
    }

    /// Number of requests that have reached the client so far.
    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PolicyClient for GatedPolicyClient {
    async fn request_upload_policy(
        &self,
        _descriptor: &AssetDescriptor,
        _file: &FileMeta,
    ) -> Result<UploadPolicy, PolicyError> {
        let reply = self.replies.lock().unwrap().pop_front();
        self.started.fetch_add(1, Ordering::SeqCst);
        match reply {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(PolicyError::generic("gate dropped"))),
            None => Err(PolicyError::generic("no scripted reply left")),
        }
    }
}

/// Emits scripted progress values, then returns a fixed result.
pub struct ScriptedUploader {
    progress: Vec<u8>,
    result: Result<(), UploadError>,
    pub uploads: Mutex<Vec<(UploadPolicy, UploadFile)>>,
}

impl ScriptedUploader {
    pub fn ok(progress: Vec<u8>) -> Self {
        Self {
            progress,
            result: Ok(()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn err(progress: Vec<u8>, error: UploadError) -> Self {
        Self {
            progress,
            result: Err(error),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl StorageUploader for ScriptedUploader {
    async fn upload(
        &self,
        policy: &UploadPolicy,
        file: &UploadFile,
        on_progress: ProgressCallback,
    ) -> Result<(), UploadError> {
        self.uploads
            .lock()
            .unwrap()
            .push((policy.clone(), file.clone()));
        for percent in &self.progress {
            tokio::task::yield_now().await;
            on_progress(*percent);
        }
        self.result.clone()
    }
}

/// Emits `before`, then blocks the first transfer until the returned sender fires,
/// then emits `after` and succeeds. Later transfers run straight through.
pub struct GatedUploader {
    before: Vec<u8>,
    after: Vec<u8>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    reached_gate: AtomicBool,
}

impl GatedUploader {
    pub fn new(before: Vec<u8>, after: Vec<u8>) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                before,
                after,
                gate: Mutex::new(Some(rx)),
                reached_gate: AtomicBool::new(false),
            },
            tx,
        )
    }

    /// Whether the first transfer is parked on the gate (or has passed it).
    pub fn reached_gate(&self) -> bool {
        self.reached_gate.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageUploader for GatedUploader {
    async fn upload(
        &self,
        _policy: &UploadPolicy,
        _file: &UploadFile,
        on_progress: ProgressCallback,
    ) -> Result<(), UploadError> {
        for percent in &self.before {
            on_progress(*percent);
        }
        let gate = self.gate.lock().unwrap().take();
        if let Some(rx) = gate {
            self.reached_gate.store(true, Ordering::SeqCst);
            let _ = rx.await;
        }
        for percent in &self.after {
            on_progress(*percent);
        }
        Ok(())
    }
}
