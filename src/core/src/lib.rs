pub mod configuration;
pub mod controller;
pub mod data_capture;
pub mod error_handling;
pub mod orchestration;
pub mod report_generation;
pub mod sanitizer;
pub mod storage;

pub use controller::*;
pub use orchestration::CaptureOrchestrator;
