//! Privacy redaction applied to records before they are buffered.

pub mod patterns;
pub mod sanitizer;

pub use patterns::{KeyMatcher, BUILTIN_PATTERNS};
pub use sanitizer::Sanitizer;
