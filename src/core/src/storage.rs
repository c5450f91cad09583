//! Storage subsystem
//!
//! Delivery of finished artifacts.
//!
//! Components:
//! - `storage_trait`: the ArtifactStore trait defining a uniform API.
//! - `file_storage`: filesystem-backed implementation writing one HTML file per artifact.

pub mod file_storage;
pub mod storage_trait;

pub use file_storage::FileArtifactStore;
pub use storage_trait::ArtifactStore;
