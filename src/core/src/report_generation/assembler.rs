use chrono::{DateTime, Utc};
use log::{debug, info};

use super::compression::{decode_report, encode_report};
use super::types::Report;
use super::viewer;
use crate::error_handling::types::ReportError;

/// A finished viewer document and the name it should be saved under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub filename: String,
    pub html: String,
}

/// `bugstream-report-YYYYMMDDTHHMMSS.html`, in UTC.
pub fn artifact_filename(at: DateTime<Utc>) -> String {
    format!("bugstream-report-{}.html", at.format("%Y%m%dT%H%M%S"))
}

/// Turns reports into viewer artifacts.
#[derive(Debug, Clone, Default)]
pub struct ReportAssembler;

impl ReportAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Encodes `report` and embeds it in the viewer template.
    ///
    /// Either a complete artifact is returned or nothing is: a serialization or
    /// compression failure aborts the whole operation.
    pub fn assemble(&self, report: &Report) -> Result<Artifact, ReportError> {
        let taken_at =
            DateTime::<Utc>::from_timestamp_millis(report.metadata.timestamp).unwrap_or_else(Utc::now);
        let encoded = encode_report(report)?;
        debug!(
            "encoded {} record(s) into {} base64 characters",
            report.record_count(),
            encoded.len()
        );

        let title = format!("BugStream Report - {}", taken_at.format("%Y-%m-%d %H:%M:%S UTC"));
        let html = viewer::render(&encoded, &title)?;
        let filename = artifact_filename(taken_at);
        info!("assembled artifact {} ({} bytes)", filename, html.len());
        Ok(Artifact { filename, html })
    }
}

/// Reads the report back out of a viewer document.
///
/// # Errors
/// - [`ReportError::MissingDataIsland`] if the document carries no report
/// - [`ReportError::DecodingFailed`] if the payload is corrupt
/// - [`ReportError::UnsupportedVersion`] if the report's major version is newer
///   than this build understands
pub fn decode_artifact(html: &str) -> Result<Report, ReportError> {
    let encoded = viewer::extract_data_island(html)?;
    let report = decode_report(encoded)?;
    if !report.is_supported() {
        return Err(ReportError::UnsupportedVersion(report.version));
    }
    Ok(report)
}
