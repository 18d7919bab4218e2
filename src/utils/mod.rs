//! Shared helpers used by several modules.

pub mod json_extraction;

pub use json_extraction::{find_closing, try_extract_json, JsonExtractionResult};
