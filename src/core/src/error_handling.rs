//! Error types shared by every subsystem of the capture pipeline.

pub mod types;
