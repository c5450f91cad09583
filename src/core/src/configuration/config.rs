use super::types::*;
use crate::error_handling::types::ConfigError;
use clap::Parser;
use log::{debug, info};
use regex::RegexBuilder;
use serde::Deserialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Application configuration, loaded either from a TOML file or from the command line.
///
/// The file form holds everything under a `[capture]` table:
///
/// ```toml
/// [capture]
/// window_ms = 30000
/// max_request_body = 50000
/// max_response_body = 100000
/// sensitive_patterns = ["session[_-]?id", "pin"]
/// mask_token = "********"
/// output_dir = "/tmp/bugstream"
/// ```
///
/// # Fields Overview
///
/// - `capture`: the [`CaptureConfig`] handed to the orchestrator, the sanitizer and the
///   network correlator
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
}

/// Command-line flags. Each one overrides the matching file or default value.
#[derive(Parser, Debug, Clone)]
#[command(name = "bugstream")]
struct CaptureArgs {
    /// Optional TOML configuration file
    ///
    /// # Command Line
    /// Use `--config <PATH>` to load the base configuration from a file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rolling window kept by every stream buffer, in milliseconds
    ///
    /// # Command Line
    /// Use `--window-ms <MS>` or the `BUGSTREAM_WINDOW_MS` environment variable
    #[arg(long, env = "BUGSTREAM_WINDOW_MS")]
    window_ms: Option<u64>,

    /// Request body truncation limit, in characters
    #[arg(long, env = "BUGSTREAM_MAX_REQUEST_BODY")]
    max_request_body: Option<usize>,

    /// Response body truncation limit, in characters
    #[arg(long, env = "BUGSTREAM_MAX_RESPONSE_BODY")]
    max_response_body: Option<usize>,

    /// Additional sensitive key pattern. May be repeated.
    #[arg(long = "sensitive-pattern")]
    sensitive_patterns: Vec<String>,

    /// Token written in place of redacted values
    #[arg(long)]
    mask_token: Option<String>,

    /// Directory receiving generated artifacts
    #[arg(long, env = "BUGSTREAM_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,
}

impl Config {
    /// Loads the configuration from a TOML file and validates it.
    ///
    /// # Errors
    /// - [`ConfigError::IoError`] when the file cannot be read
    /// - [`ConfigError::TomlError`] when the content is not valid TOML for this schema
    /// - any validation error from [`Config::validate`]
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        debug!("Parsed configuration: {:?}", config.capture);
        Ok(config)
    }

    /// Builds the configuration from command-line style arguments, the first one
    /// being the program name. `bugstream list` forwards its own arguments here.
    ///
    /// When `--config` is given the file is loaded first, then every flag that was set
    /// overrides the file value.
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let args =
            CaptureArgs::try_parse_from(args).map_err(|e| ConfigError::NotInRange(e.to_string()))?;

        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };

        let capture = &mut config.capture;
        if let Some(window_ms) = args.window_ms {
            capture.window_ms = window_ms;
        }
        if let Some(max) = args.max_request_body {
            capture.max_request_body = max;
        }
        if let Some(max) = args.max_response_body {
            capture.max_response_body = max;
        }
        capture.sensitive_patterns.extend(args.sensitive_patterns);
        if let Some(token) = args.mask_token {
            capture.mask_token = token;
        }
        if args.output_dir.is_some() {
            capture.output_dir = args.output_dir;
        }

        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges and compiles every extra sensitive pattern once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let capture = &self.capture;
        if capture.window_ms == 0 {
            return Err(ConfigError::NotInRange(
                "window_ms must be greater than 0".to_string(),
            ));
        }
        if capture.max_request_body == 0 || capture.max_response_body == 0 {
            return Err(ConfigError::NotInRange(
                "body truncation limits must be greater than 0".to_string(),
            ));
        }
        if capture.mask_token.is_empty() {
            return Err(ConfigError::NotInRange(
                "mask_token must not be empty".to_string(),
            ));
        }
        for pattern in &capture.sensitive_patterns {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| ConfigError::InvalidPattern(format!("{}: {}", pattern, e)))?;
        }
        Ok(())
    }
}
