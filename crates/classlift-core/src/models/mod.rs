//! Domain models for the upload engine

pub mod asset;
pub mod policy;
pub mod upload;

pub use asset::{AssetDescriptor, ObjectType, ParentRef};
pub use policy::UploadPolicy;
pub use upload::{FileMeta, UploadFile, UploadRecord, UploadStatus};
