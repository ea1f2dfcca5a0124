//! Pointer file creation
//!
//! For one source file: work out where its pointer goes (optionally under AI
//! names), and write the pointer unless one is already there. Non-media
//! files are copied verbatim when copy mode is on.

use std::fs;
use std::path::{Path, PathBuf};

use crate::link::link_target;
use crate::mapping::SourceRootMapping;
use crate::namer::FolderDescriptor;
use crate::{is_media_file, Result, StrmError, POINTER_EXTENSION};

/// What happened to one source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// A new pointer was written
    Created(PathBuf),
    /// A pointer already existed at the computed path and was left alone
    Exists(PathBuf),
    /// A non-media file was copied
    Copied(PathBuf),
    /// Not media and copy mode is off
    Skipped,
}

/// Writes pointer files for one mapping's source files
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkMaterializer {
    copy_non_media: bool,
}

impl LinkMaterializer {
    pub fn new(copy_non_media: bool) -> Self {
        Self { copy_non_media }
    }

    /// Process one source file.
    ///
    /// `descriptor` is the folder's naming answer, if any; without it the
    /// pointer keeps the source file's name and folder.
    pub fn materialize(
        &self,
        source_file: &str,
        descriptor: Option<&FolderDescriptor>,
        mapping: &SourceRootMapping,
    ) -> Result<LinkOutcome> {
        let dest_file = mapping.destination_for(source_file)?;

        if is_media_file(&dest_file) {
            self.write_pointer(source_file, &dest_file, descriptor, mapping)
        } else if self.copy_non_media {
            copy_file(source_file, &dest_file)
        } else {
            Ok(LinkOutcome::Skipped)
        }
    }

    fn write_pointer(
        &self,
        source_file: &str,
        dest_file: &str,
        descriptor: Option<&FolderDescriptor>,
        mapping: &SourceRootMapping,
    ) -> Result<LinkOutcome> {
        let dest = Path::new(dest_file);
        let mut video_name = file_name(dest)?;
        let mut dest_dir = dest
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(&mapping.dest_root));

        if let Some(descriptor) = descriptor {
            let original_name = file_name(Path::new(source_file))?;
            if let Some(names) = descriptor.resolve_names(&original_name) {
                tracing::info!("Renaming: {} -> {}", original_name, names.file_name);
                video_name = names.file_name;
                if !names.folder_name.is_empty() {
                    dest_dir = renamed_folder(
                        &dest_dir,
                        Path::new(&mapping.dest_root),
                        &names.folder_name,
                    );
                }
            }
        }

        fs::create_dir_all(&dest_dir)?;

        let stem = Path::new(&video_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| video_name.clone());
        let pointer = dest_dir.join(format!("{}.{}", stem, POINTER_EXTENSION));

        if pointer.exists() {
            tracing::debug!("Pointer already exists: {}", pointer.display());
            return Ok(LinkOutcome::Exists(pointer));
        }

        let final_dest = dest_dir.join(&video_name);
        let content = link_target(mapping, source_file, &final_dest.to_string_lossy())?;

        fs::write(&pointer, content.as_bytes())?;
        tracing::info!("Created: {}", pointer.display());

        Ok(LinkOutcome::Created(pointer))
    }
}

/// Replace the leaf of `dest_dir` with `folder_name`.
///
/// A file sitting directly in the destination root gets a new folder under
/// the root instead, so the root itself is never renamed.
fn renamed_folder(dest_dir: &Path, dest_root: &Path, folder_name: &str) -> PathBuf {
    if dest_dir == dest_root {
        return dest_root.join(folder_name);
    }

    match dest_dir.parent() {
        Some(parent) => parent.join(folder_name),
        None => dest_dir.join(folder_name),
    }
}

fn copy_file(source_file: &str, dest_file: &str) -> Result<LinkOutcome> {
    let dest = PathBuf::from(dest_file);
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source_file, &dest)?;
    tracing::info!("Copied: {}", dest.display());
    Ok(LinkOutcome::Copied(dest))
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            StrmError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("no file name in {}", path.display()),
            ))
        })
}
