//! Scan orchestration
//!
//! A pass enumerates every monitored root, keeps the files the index does not
//! know yet (or all files on a rebuild), groups them by parent folder and
//! materializes each group. Files that were processed are added to the index,
//! which is persisted once at the end of the pass.
//!
//! Only one pass runs at a time per engine; a second trigger while a pass is
//! in flight is refused instead of queued.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::classify::lookup_key;
use crate::index::KnownFileIndex;
use crate::mapping::SourceRootMapping;
use crate::materialize::{LinkMaterializer, LinkOutcome};
use crate::namer::{FolderDescriptor, FolderNamer};
use crate::scanner::{group_by_folder, FolderBatch, Scanner};
use crate::settings::ScanSettings;
use crate::Result;

/// Remote command action that triggers an incremental scan
pub const SCAN_ACTION: &str = "cloudstrm_scan";

/// Kind of pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Process every file and replace the index
    Rebuild,
    /// Process only files missing from the index
    Incremental,
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::Rebuild => write!(f, "rebuild"),
            ScanMode::Incremental => write!(f, "incremental"),
        }
    }
}

/// Counters for one pass
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub mode: ScanMode,
    /// Roots that could not be enumerated
    pub roots_failed: usize,
    pub folders: usize,
    /// Files handed to the materializer
    pub new_files: usize,
    pub pointers_created: usize,
    pub pointers_existing: usize,
    pub files_copied: usize,
    pub skipped: usize,
    /// Files that errored and stay out of the index
    pub failed: usize,
    /// Entries in the persisted index after the pass. A pass that processed
    /// nothing leaves the stored index untouched, so this is its size.
    pub index_size: usize,
    pub index_saved: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ScanReport {
    fn new(mode: ScanMode) -> Self {
        let now = Utc::now();
        Self {
            mode,
            roots_failed: 0,
            folders: 0,
            new_files: 0,
            pointers_created: 0,
            pointers_existing: 0,
            files_copied: 0,
            skipped: 0,
            failed: 0,
            index_size: 0,
            index_saved: false,
            started_at: now,
            finished_at: now,
        }
    }

    fn record(&mut self, outcome: &LinkOutcome) {
        match outcome {
            LinkOutcome::Created(_) => self.pointers_created += 1,
            LinkOutcome::Exists(_) => self.pointers_existing += 1,
            LinkOutcome::Copied(_) => self.files_copied += 1,
            LinkOutcome::Skipped => self.skipped += 1,
        }
    }

    /// Files that made it into the index this pass
    pub fn processed(&self) -> usize {
        self.pointers_created + self.pointers_existing + self.files_copied + self.skipped
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} scan: {} new files in {} folders, {} created, {} existing, {} copied, \
             {} failed ({} ms)",
            self.mode,
            self.new_files,
            self.folders,
            self.pointers_created,
            self.pointers_existing,
            self.files_copied,
            self.failed,
            self.duration().num_milliseconds()
        )
    }
}

/// Result of a scan request
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    Completed(ScanReport),
    /// Another pass was in flight
    AlreadyRunning,
    /// Scanning is switched off in the settings
    Disabled,
    NoMappings,
    /// A remote command that is not ours
    Ignored,
}

/// Releases the running flag when dropped
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives scans for one set of settings
#[derive(Debug)]
pub struct ScanEngine {
    settings: ScanSettings,
    scanner: Scanner,
    materializer: LinkMaterializer,
    namer: Option<FolderNamer>,
    running: AtomicBool,
    /// Set from `force_rebuild`, cleared by the first scan
    pending_rebuild: AtomicBool,
}

impl ScanEngine {
    /// Engine with the naming client described by `settings.naming`
    pub fn new(settings: ScanSettings) -> Result<Self> {
        let namer = match &settings.naming {
            Some(config) => Some(FolderNamer::with_chat_api(config.clone())?),
            None => None,
        };
        Self::with_namer(settings, namer)
    }

    /// Engine with an explicit namer, or none to keep source names
    pub fn with_namer(settings: ScanSettings, namer: Option<FolderNamer>) -> Result<Self> {
        let scanner = Scanner::new(settings.scan.clone())?;
        let materializer = LinkMaterializer::new(settings.scan.copy_non_media);
        let pending_rebuild = AtomicBool::new(settings.force_rebuild);
        Ok(Self {
            settings,
            scanner,
            materializer,
            namer,
            running: AtomicBool::new(false),
            pending_rebuild,
        })
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    pub fn namer(&self) -> Option<&FolderNamer> {
        self.namer.as_ref()
    }

    pub fn index_path(&self) -> PathBuf {
        self.settings.index_path()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run an incremental pass.
    ///
    /// Falls back to a rebuild when the stored index is missing, empty or
    /// unreadable, and on the first scan of an engine built with
    /// `force_rebuild`.
    pub fn scan(&self) -> ScanOutcome {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            tracing::warn!("Scan already running, skipping");
            return ScanOutcome::AlreadyRunning;
        };

        if !self.settings.enabled {
            tracing::info!("Scanning is disabled");
            return ScanOutcome::Disabled;
        }
        if self.settings.mappings.is_empty() {
            tracing::warn!("No monitored directories configured");
            return ScanOutcome::NoMappings;
        }

        match self.stored_index() {
            Some(index) => ScanOutcome::Completed(self.run_pass(ScanMode::Incremental, index)),
            None => {
                ScanOutcome::Completed(self.run_pass(ScanMode::Rebuild, KnownFileIndex::new()))
            }
        }
    }

    /// Reprocess every file and replace the index
    pub fn rebuild(&self) -> ScanOutcome {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            tracing::warn!("Scan already running, skipping rebuild");
            return ScanOutcome::AlreadyRunning;
        };

        if self.settings.mappings.is_empty() {
            tracing::warn!("No monitored directories configured");
            return ScanOutcome::NoMappings;
        }

        ScanOutcome::Completed(self.run_pass(ScanMode::Rebuild, KnownFileIndex::new()))
    }

    /// Handle a remote command; only [`SCAN_ACTION`] is recognised
    pub fn handle_command(&self, action: &str) -> ScanOutcome {
        if action != SCAN_ACTION {
            tracing::debug!("Ignoring command: {}", action);
            return ScanOutcome::Ignored;
        }
        tracing::info!("Received remote scan command");
        self.scan()
    }

    fn stored_index(&self) -> Option<KnownFileIndex> {
        if self.pending_rebuild.swap(false, Ordering::AcqRel) {
            tracing::info!("Rebuild requested");
            return None;
        }

        let path = self.index_path();
        match KnownFileIndex::load(&path) {
            Ok(Some(index)) if !index.is_empty() => Some(index),
            Ok(_) => {
                tracing::info!("No known files at {}, rebuilding", path.display());
                None
            }
            Err(e) => {
                tracing::error!("Could not read index {}: {}, rebuilding", path.display(), e);
                None
            }
        }
    }

    fn run_pass(&self, mode: ScanMode, mut index: KnownFileIndex) -> ScanReport {
        let mut report = ScanReport::new(mode);
        tracing::info!("Starting {} scan", mode);

        for (mapping, files) in self.scanner.enumerate_all(&self.settings.mappings) {
            let files = match files {
                Ok(files) => files,
                Err(e) => {
                    tracing::error!("Skipping {}: {}", mapping.source_root, e);
                    report.roots_failed += 1;
                    continue;
                }
            };

            let candidates = match mode {
                ScanMode::Rebuild => files,
                ScanMode::Incremental => index.unknown(files),
            };
            if candidates.is_empty() {
                continue;
            }

            for batch in group_by_folder(candidates) {
                self.process_batch(&batch, mapping, &mut index, &mut report);
            }
        }

        let path = self.index_path();
        if report.processed() > 0 {
            match index.save(&path) {
                Ok(()) => report.index_saved = true,
                Err(e) => tracing::error!("Could not save index {}: {}", path.display(), e),
            }
        }
        report.index_size = if report.index_saved {
            index.len()
        } else {
            KnownFileIndex::load(&path).ok().flatten().map_or(0, |stored| stored.len())
        };

        report.finished_at = Utc::now();
        tracing::info!("{}", report);
        report
    }

    fn process_batch(
        &self,
        batch: &FolderBatch,
        mapping: &SourceRootMapping,
        index: &mut KnownFileIndex,
        report: &mut ScanReport,
    ) {
        tracing::info!(
            "Processing folder: {} ({} files)",
            batch.folder.display(),
            batch.files.len()
        );
        report.folders += 1;
        report.new_files += batch.files.len();

        let descriptor = self.describe(batch);

        for file in &batch.files {
            match self.materializer.materialize(file, descriptor.as_ref(), mapping) {
                Ok(outcome) => {
                    report.record(&outcome);
                    index.insert(file.clone());
                }
                Err(e) => {
                    tracing::error!("Failed to process {}: {}", file, e);
                    report.failed += 1;
                }
            }
        }
    }

    fn describe(&self, batch: &FolderBatch) -> Option<FolderDescriptor> {
        let namer = self.namer.as_ref()?;
        let sample = batch.sample_file_name()?;
        let key = lookup_key(&batch.folder);
        let descriptor = namer.folder_info(&key, &sample)?;
        tracing::info!("Folder info: {} -> {}", key, descriptor.label());
        Some(descriptor)
    }
}
