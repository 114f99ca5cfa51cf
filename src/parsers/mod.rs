pub mod code_blocks;
pub mod extension;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub use code_blocks::{explanation, parse_generated_code};
pub use extension::{extension_for, sanitize_filename};

/// One file recovered from a fenced code block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ParsedFile {
    /// Never empty.
    pub filename: String,
    pub content: String,
    pub language: String,
}
