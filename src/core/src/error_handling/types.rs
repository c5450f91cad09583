use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    NotInRange(String),
    InvalidPattern(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::NotInRange(e) => write!(f, "Value out of range: {}", e),
            ConfigError::InvalidPattern(e) => write!(f, "Invalid sensitive key pattern: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

#[derive(Debug)]
pub enum CaptureError {
    TraceSourceFailed(String),
    RecorderAlreadyActive(&'static str),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::TraceSourceFailed(e) => write!(f, "Trace source failed to start: {}", e),
            CaptureError::RecorderAlreadyActive(name) => {
                write!(f, "Recorder already active: {}", name)
            }
        }
    }
}

impl std::error::Error for CaptureError {}

/// Raised when a network call is driven through an invalid lifecycle transition.
#[derive(Debug, PartialEq, Eq)]
pub enum CorrelationError {
    UnknownCall(String),
    NotInFlight(String),
    AlreadySent(String),
}

impl fmt::Display for CorrelationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationError::UnknownCall(id) => write!(f, "Unknown correlation id: {}", id),
            CorrelationError::NotInFlight(id) => write!(f, "Call {} is not in flight", id),
            CorrelationError::AlreadySent(id) => write!(f, "Call {} was already sent", id),
        }
    }
}

impl std::error::Error for CorrelationError {}

#[derive(Debug)]
pub enum ReportError {
    SerializationFailed(serde_json::Error),
    CompressionFailed(std::io::Error),
    DecodingFailed(String),
    MissingDataIsland,
    TemplateMissing(String),
    UnsupportedVersion(String),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::SerializationFailed(e) => write!(f, "Failed to serialize report data: {}", e),
            ReportError::CompressionFailed(e) => write!(f, "Compression failed: {}", e),
            ReportError::DecodingFailed(e) => write!(f, "Failed to decode report data: {}", e),
            ReportError::MissingDataIsland => write!(f, "Artifact has no embedded report data"),
            ReportError::TemplateMissing(e) => write!(f, "Viewer template missing: {}", e),
            ReportError::UnsupportedVersion(v) => write!(f, "Unsupported report version: {}", v),
        }
    }
}

impl std::error::Error for ReportError {}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        ReportError::SerializationFailed(err)
    }
}

#[derive(Debug)]
pub enum StorageError {
    WriteFailed,
    ReadFailed,
    NotFound,
    InvalidName(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::WriteFailed => write!(f, "Storage write failed"),
            StorageError::ReadFailed => write!(f, "Storage read failed"),
            StorageError::NotFound => write!(f, "Artifact not found"),
            StorageError::InvalidName(name) => write!(f, "Invalid artifact name: {}", name),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug)]
pub enum ControllerError {
    ConfigurationError(ConfigError),
    ReportError(ReportError),
    StorageError(StorageError),
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            ControllerError::ReportError(e) => write!(f, "Report generation failed: {}", e),
            ControllerError::StorageError(e) => write!(f, "Storage error: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {}

impl From<ReportError> for ControllerError {
    fn from(err: ReportError) -> Self {
        ControllerError::ReportError(err)
    }
}

impl From<StorageError> for ControllerError {
    fn from(err: StorageError) -> Self {
        ControllerError::StorageError(err)
    }
}

impl From<ConfigError> for ControllerError {
    fn from(err: ConfigError) -> Self {
        ControllerError::ConfigurationError(err)
    }
}
