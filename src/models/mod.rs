//! Model inventory and definitions
//!
//! Provides functionality for:
//! - Parsing `ollama list` output into model records
//! - Reading and rewriting model definition files
//! - Synthesizing definitions for bare GGUF artifacts

pub mod definition;
pub mod parser;
pub mod record;

pub use definition::{Dialect, Family, ModelDefinition, detect_family, synthesize};
pub use parser::{is_header, parse_inventory, parse_line};
pub use record::{ModelRecord, derive_full_name, records_from_payload, records_to_payload};
