//! cloudstrm - `.strm` link generator for cloud-mounted media libraries
//!
//! Indexes monitored source trees, detects newly appeared media files and
//! writes small pointer files (`.strm`) into a library tree. Each pointer
//! holds either a local path or a cloud gateway URL, optionally under an
//! AI-normalised file and folder name.

pub mod classify;
pub mod engine;
pub mod episode;
pub mod error;
pub mod index;
pub mod link;
pub mod mapping;
pub mod materialize;
pub mod namer;
pub mod scanner;
pub mod schedule;
pub mod settings;

pub use engine::{ScanEngine, ScanMode, ScanOutcome, ScanReport, SCAN_ACTION};
pub use episode::EpisodeTag;
pub use error::{Result, StrmError};
pub use index::KnownFileIndex;
pub use mapping::{AddressingMode, GatewayKind, Scheme, SourceRootMapping};
pub use materialize::{LinkMaterializer, LinkOutcome};
pub use namer::{FolderDescriptor, FolderNamer, MediaType, ResolvedNames};
pub use schedule::CronSchedule;
pub use settings::{PluginConfig, ScanSettings};

/// cloudstrm version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Extension given to pointer files
pub const POINTER_EXTENSION: &str = "strm";

/// File extensions treated as media (lowercase, without the dot)
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "ts", "iso", "rmvb", "avi", "mov", "mpeg", "mpg", "wmv", "3gp", "asf", "m4v",
    "flv", "m2ts", "strm", "tp", "f4v",
];

/// Check if a file name or path has a media extension (case-insensitive)
pub fn is_media_file(name: &str) -> bool {
    std::path::Path::new(name)
        .extension()
        .map(|ext| MEDIA_EXTENSIONS.contains(&ext.to_string_lossy().to_lowercase().as_str()))
        .unwrap_or(false)
}
