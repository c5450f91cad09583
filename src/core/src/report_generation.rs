//! Report generation: the versioned snapshot format, its compressed text
//! encoding and the self-contained viewer artifact that embeds it.

pub mod assembler;
pub mod compression;
pub mod types;
pub mod viewer;

pub use assembler::{artifact_filename, decode_artifact, Artifact, ReportAssembler};
pub use compression::{decode_report, encode_report};
pub use types::{Report, ReportMetadata, REPORT_VERSION};
