use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, error, info};

use crate::configuration::types::CaptureConfig;
use crate::error_handling::types::StorageError;
use crate::report_generation::assembler::Artifact;
use crate::storage::storage_trait::ArtifactStore;

pub const OUTPUT_DIR_ENV: &str = "BUGSTREAM_OUTPUT_DIR";

/// Writes each artifact as `<base_path>/<filename>`.
pub struct FileArtifactStore {
    base_path: PathBuf,
}

impl FileArtifactStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path).map_err(|e| {
            error!("Failed to create output dir {}: {}", base_path.display(), e);
            StorageError::WriteFailed
        })?;
        info!("FileArtifactStore initialized at {}", base_path.display());
        Ok(Self { base_path })
    }

    /// Construct FileArtifactStore using env var BUGSTREAM_OUTPUT_DIR if set, otherwise current directory.
    pub fn new_default() -> Result<Self, StorageError> {
        if let Ok(dir) = std::env::var(OUTPUT_DIR_ENV) {
            info!("Using FileArtifactStore from {}: {}", OUTPUT_DIR_ENV, dir);
            return Self::new(PathBuf::from(dir));
        }
        let cwd = std::env::current_dir().map_err(|e| {
            error!("Failed to get current dir: {}", e);
            StorageError::ReadFailed
        })?;
        info!("Using FileArtifactStore at current directory: {}", cwd.display());
        Self::new(cwd)
    }

    /// `output_dir` from the configuration, else [`FileArtifactStore::new_default`].
    pub fn from_config(config: &CaptureConfig) -> Result<Self, StorageError> {
        match &config.output_dir {
            Some(dir) => Self::new(dir),
            None => Self::new_default(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Artifact names are bare file names; anything that could leave the base
    /// directory is refused.
    fn path_for(&self, filename: &str) -> Result<PathBuf, StorageError> {
        let bare = !filename.is_empty()
            && filename != "."
            && filename != ".."
            && !filename.contains(['/', '\\']);
        if !bare {
            error!("Refusing artifact name {:?}", filename);
            return Err(StorageError::InvalidName(filename.to_string()));
        }
        Ok(self.base_path.join(filename))
    }
}

impl ArtifactStore for FileArtifactStore {
    fn save_artifact(&self, artifact: &Artifact) -> Result<PathBuf, StorageError> {
        let path = self.path_for(&artifact.filename)?;
        fs::write(&path, artifact.html.as_bytes()).map_err(|e| {
            error!("Write failed {}: {}", path.display(), e);
            StorageError::WriteFailed
        })?;
        info!("Saved artifact {} ({} bytes)", path.display(), artifact.html.len());
        Ok(path)
    }

    fn load_artifact(&self, filename: &str) -> Result<String, StorageError> {
        let path = self.path_for(filename)?;
        let html = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::NotFound
            } else {
                error!("Read failed {}: {}", path.display(), e);
                StorageError::ReadFailed
            }
        })?;
        debug!("Read {} byte(s) from {}", html.len(), path.display());
        Ok(html)
    }

    fn list_artifacts(&self) -> Result<Vec<String>, StorageError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| {
            error!("Failed to read output dir {}: {}", self.base_path.display(), e);
            StorageError::ReadFailed
        })?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                error!("Dir entry error: {}", e);
                StorageError::ReadFailed
            })?;
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("html") {
                if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        debug!("Found {} artifact(s) in {}", names.len(), self.base_path.display());
        Ok(names)
    }
}
