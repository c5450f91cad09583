use serde::{Deserialize, Serialize};

use crate::data_capture::host::PageInfo;
use crate::data_capture::types::{ConsoleEntry, KeyboardEntry, NetworkEntry, TraceEvent};

/// Format version written into every report.
pub const REPORT_VERSION: &str = "2.0.0";

/// Highest major version this build can read.
pub const SUPPORTED_MAJOR_VERSION: u64 = 2;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportMetadata {
    pub url: String,
    pub title: String,
    /// When the snapshot was taken.
    pub timestamp: i64,
    pub user_agent: String,
    pub screen_width: u32,
    pub screen_height: u32,
    /// Last trace event timestamp minus the first one, 0 without events.
    pub duration: i64,
}

impl ReportMetadata {
    pub fn from_page(page: PageInfo, timestamp: i64, duration: i64) -> Self {
        Self {
            url: page.url,
            title: page.title,
            timestamp,
            user_agent: page.user_agent,
            screen_width: page.screen_width,
            screen_height: page.screen_height,
            duration,
        }
    }
}

/// Frozen copy of every stream at one moment.
///
/// Stream fields missing from an encoded report read back as empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub version: String,
    #[serde(default)]
    pub metadata: ReportMetadata,
    #[serde(default)]
    pub events: Vec<TraceEvent>,
    #[serde(default)]
    pub console: Vec<ConsoleEntry>,
    #[serde(default)]
    pub network: Vec<NetworkEntry>,
    #[serde(default)]
    pub keyboard: Vec<KeyboardEntry>,
}

impl Report {
    /// An empty report at the current format version.
    pub fn new(metadata: ReportMetadata) -> Self {
        Self {
            version: REPORT_VERSION.to_string(),
            metadata,
            events: Vec::new(),
            console: Vec::new(),
            network: Vec::new(),
            keyboard: Vec::new(),
        }
    }

    /// Leading numeric component of `version`.
    pub fn major_version(&self) -> Option<u64> {
        self.version.split('.').next()?.trim().parse().ok()
    }

    pub fn is_supported(&self) -> bool {
        self.major_version()
            .is_some_and(|major| major <= SUPPORTED_MAJOR_VERSION)
    }

    pub fn record_count(&self) -> usize {
        self.events.len() + self.console.len() + self.network.len() + self.keyboard.len()
    }
}
