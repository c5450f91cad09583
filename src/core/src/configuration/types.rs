use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_WINDOW_MS: u64 = 60_000;
pub const DEFAULT_MAX_REQUEST_BODY: usize = 50_000;
pub const DEFAULT_MAX_RESPONSE_BODY: usize = 100_000;
pub const DEFAULT_MASK_TOKEN: &str = "********";
pub const DEFAULT_KEYBOARD_MASK: char = '*';

/// Tunables for one capture context.
///
/// Every field has a default so a partial `[capture]` table (or none at all)
/// is valid input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Rolling history kept by each stream buffer, in milliseconds.
    pub window_ms: u64,
    /// Request bodies longer than this many characters are truncated.
    pub max_request_body: usize,
    /// Response bodies longer than this many characters are truncated.
    pub max_response_body: usize,
    /// Extra case-insensitive key patterns, appended to the built-in list.
    pub sensitive_patterns: Vec<String>,
    /// Replacement for redacted values.
    pub mask_token: String,
    /// Replacement for keys typed into password fields.
    pub keyboard_mask: char,
    /// Where generated artifacts are written. `None` means the store decides.
    pub output_dir: Option<PathBuf>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            window_ms: DEFAULT_WINDOW_MS,
            max_request_body: DEFAULT_MAX_REQUEST_BODY,
            max_response_body: DEFAULT_MAX_RESPONSE_BODY,
            sensitive_patterns: Vec::new(),
            mask_token: DEFAULT_MASK_TOKEN.to_string(),
            keyboard_mask: DEFAULT_KEYBOARD_MASK,
            output_dir: None,
        }
    }
}
