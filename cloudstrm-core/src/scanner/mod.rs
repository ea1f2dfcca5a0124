//! Source tree enumeration
//!
//! Walks a mapping's source root, drops ignored and unwanted files and groups
//! what is left by parent folder so naming can be done once per folder.

mod config;
mod ignore;

pub use config::ScanConfig;
pub use ignore::{build_globset, IgnoreRules, ALWAYS_IGNORE, SKIP_DIRS};

use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::mapping::SourceRootMapping;
use crate::{is_media_file, Result, StrmError};

/// New files sharing one parent folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderBatch {
    pub folder: PathBuf,
    pub files: Vec<String>,
}

impl FolderBatch {
    /// File name handed to the naming oracle for this folder: the first media
    /// file. `None` when the folder holds no media, since only pointers use
    /// the folder descriptor.
    pub fn sample_file_name(&self) -> Option<String> {
        self.files
            .iter()
            .find(|f| is_media_file(f))
            .and_then(|f| Path::new(f).file_name())
            .map(|n| n.to_string_lossy().into_owned())
    }
}

/// Group file paths by parent folder, in sorted folder order.
///
/// Files keep their relative order within a folder.
pub fn group_by_folder<I>(files: I) -> Vec<FolderBatch>
where
    I: IntoIterator<Item = String>,
{
    let mut groups: BTreeMap<PathBuf, Vec<String>> = BTreeMap::new();

    for file in files {
        let folder = Path::new(&file)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        groups.entry(folder).or_default().push(file);
    }

    groups
        .into_iter()
        .map(|(folder, files)| FolderBatch { folder, files })
        .collect()
}

/// Enumerates candidate files under source roots
#[derive(Debug, Clone)]
pub struct Scanner {
    config: ScanConfig,
    rules: IgnoreRules,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Result<Self> {
        let rules = IgnoreRules::new(&config.custom_ignore)?;
        Ok(Self { config, rules })
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// All wanted files under one mapping's source root, sorted by path.
    ///
    /// Unreadable entries below the root are logged and skipped; a missing
    /// or unreadable root is an error.
    pub fn enumerate(&self, mapping: &SourceRootMapping) -> Result<Vec<String>> {
        let root = Path::new(&mapping.source_root);
        if !root.is_dir() {
            return Err(StrmError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("source root {} is not a directory", mapping.source_root),
            )));
        }

        tracing::info!("Scanning directory: {}", mapping.source_root);

        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                !(e.depth() > 0
                    && e.file_type().is_dir()
                    && IgnoreRules::skip_dir(&e.file_name().to_string_lossy()))
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(
                        "Skipping unreadable entry under {}: {}",
                        mapping.source_root,
                        e
                    );
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let Some(path) = entry.path().to_str() else {
                tracing::warn!("Skipping non UTF-8 path: {:?}", entry.path());
                continue;
            };

            let relative = path.strip_prefix(mapping.source_root.as_str()).unwrap_or(path);
            if self.rules.should_ignore(relative) {
                continue;
            }

            if !self.config.wants_file(&entry.file_name().to_string_lossy()) {
                continue;
            }

            files.push(path.to_string());
        }

        tracing::debug!("Found {} candidate files under {}", files.len(), mapping.source_root);
        Ok(files)
    }

    /// Enumerate several roots in parallel.
    ///
    /// Results come back in the order of `mappings`; a failing root yields
    /// its error without affecting the others.
    pub fn enumerate_all<'a>(
        &self,
        mappings: &'a [SourceRootMapping],
    ) -> Vec<(&'a SourceRootMapping, Result<Vec<String>>)> {
        mappings
            .par_iter()
            .map(|mapping| (mapping, self.enumerate(mapping)))
            .collect()
    }
}
