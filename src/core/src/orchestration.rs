//! Capture orchestration: owns the four stream buffers and recorders of one
//! capture context.

pub mod capture_orchestrator;
pub mod types;

pub use capture_orchestrator::CaptureOrchestrator;
pub use types::{CaptureState, StreamCounts};
