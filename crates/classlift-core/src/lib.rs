//! Classlift Core Library
//!
//! This crate provides the domain models, error types and configuration shared by
//! every classlift component: the policy client, the storage uploader and the
//! upload orchestrator.

pub mod config;
pub mod error;
pub mod files;
pub mod models;

// Re-export commonly used types
pub use config::ClientConfig;
pub use error::{
    ErrorMetadata, FileError, PolicyError, PolicyErrorKind, UploadError, UploadErrorKind,
};
pub use files::{format_size, guess_mime_type};
pub use models::{
    AssetDescriptor, FileMeta, ObjectType, ParentRef, UploadFile, UploadPolicy, UploadRecord,
    UploadStatus,
};
