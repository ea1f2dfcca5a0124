use serde::{Deserialize, Serialize};

use crate::is_media_file;

/// Configuration for source tree enumeration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Also pick up non-media files (they are copied verbatim)
    pub copy_non_media: bool,
    /// Custom ignore patterns (glob, relative to the source root)
    pub custom_ignore: Vec<String>,
}

impl ScanConfig {
    /// Create a new ScanConfig with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable/disable copying of non-media files
    pub fn with_copy_non_media(mut self, copy: bool) -> Self {
        self.copy_non_media = copy;
        self
    }

    /// Set custom ignore patterns
    pub fn with_custom_ignore(mut self, patterns: Vec<String>) -> Self {
        self.custom_ignore = patterns;
        self
    }

    /// Add one custom ignore pattern
    pub fn add_ignore(mut self, pattern: impl Into<String>) -> Self {
        self.custom_ignore.push(pattern.into());
        self
    }

    /// Whether a file with this name passes the extension filter
    pub fn wants_file(&self, file_name: &str) -> bool {
        self.copy_non_media || is_media_file(file_name)
    }
}
