//! Classlift Storage Library
//!
//! This crate performs the second phase of an upload: the direct transfer of a file
//! to object storage using a policy obtained from the application server.
//!
//! # Wire format
//!
//! One `multipart/form-data` POST to the policy URL. The policy form fields come
//! first, in the order the server issued them, followed by the file under the
//! field name `file`. Any 2xx answer is a success.

pub mod http;
pub mod progress;
pub mod traits;

// Re-export commonly used types
pub use http::HttpStorageUploader;
pub use progress::{ProgressCallback, ProgressReporter, TransferProgress};
pub use traits::StorageUploader;
