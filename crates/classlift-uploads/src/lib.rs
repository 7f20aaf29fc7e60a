//! Classlift Uploads Library
//!
//! The public face of the upload engine. [`UploadOrchestrator`] runs each upload
//! attempt as a two-phase flow (policy, then transfer) and records every step in the
//! [`UploadStateStore`], which UI collaborators observe to render progress and
//! retry affordances.
//!
//! # Attempts
//!
//! Every `add_upload` call starts a new attempt with a fresh sequence number. Writes
//! from an attempt commit only while the stored record still belongs to it, so a
//! reset or a newer attempt silently discards late responses of older ones.

pub mod orchestrator;
pub mod store;

// Re-export commonly used types
pub use orchestrator::{CompletionCallback, UploadHandle, UploadOrchestrator};
pub use store::{StoreChange, Subscription, UploadSnapshot, UploadStateStore};
