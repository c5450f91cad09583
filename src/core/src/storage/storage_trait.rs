//! Artifact Store Trait
//!
//! This module defines the `ArtifactStore` trait, the interface through which
//! generated viewer documents leave the capture context.
//!
//! Implementors of this trait are responsible for:
//! - Persisting an artifact under its file name
//! - Reading a stored artifact back
//! - Listing what has been stored
//!
//! All methods return a `Result` to handle potential storage errors.

use std::path::PathBuf;

use crate::error_handling::types::StorageError;
use crate::report_generation::assembler::Artifact;

/// The `ArtifactStore` trait defines the interface for artifact delivery backends.
pub trait ArtifactStore: Send + Sync {
    /// Saves an artifact and returns where it was written.
    ///
    /// - `artifact` - The `Artifact` to be saved; its `filename` names the entry.
    fn save_artifact(&self, artifact: &Artifact) -> Result<PathBuf, StorageError>;

    /// Returns the HTML of a stored artifact.
    fn load_artifact(&self, filename: &str) -> Result<String, StorageError>;

    /// File names of every stored artifact, sorted.
    fn list_artifacts(&self) -> Result<Vec<String>, StorageError>;
}
