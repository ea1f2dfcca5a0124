//! Configuration
//!
//! [`PluginConfig`] is the persisted, user-edited document. [`ScanSettings`]
//! is the immutable value a scan runs with; it is rebuilt from the config on
//! every load instead of being mutated in place.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::index::INDEX_FILE_NAME;
use crate::mapping::{parse_mappings, Scheme, SourceRootMapping};
use crate::namer::{ChatApiConfig, DEFAULT_API_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT};
use crate::scanner::{IgnoreRules, ScanConfig};
use crate::schedule::CronSchedule;
use crate::{Result, StrmError};

/// Persisted configuration, keyed like the original plugin settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Master switch for scheduled scans
    pub enabled: bool,
    /// Run one scan as soon as the scheduler starts, then clear the flag
    pub onlyonce: bool,
    /// Force an index rebuild on the next scan, then clear the flag
    pub rebuild: bool,
    /// Five-field cron expression for incremental scans
    pub cron: Option<String>,
    /// Five-field cron expression for index rebuilds
    pub rebuild_cron: Option<String>,
    /// One mapping per line, see [`crate::mapping`]
    pub monitor_confs: String,
    /// Copy non-media files next to the pointers
    pub copy_files: bool,
    /// Use https for gateway URLs
    pub https: bool,
    pub enable_ai_naming: bool,
    pub deepseek_api_key: Option<String>,
    pub api_url: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Where the known-file index lives
    pub data_dir: Option<PathBuf>,
    /// Extra glob patterns to ignore, relative to each source root
    pub exclude: Vec<String>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            onlyonce: false,
            rebuild: false,
            cron: None,
            rebuild_cron: None,
            monitor_confs: String::new(),
            copy_files: false,
            https: false,
            enable_ai_naming: true,
            deepseek_api_key: None,
            api_url: None,
            model: None,
            timeout_secs: None,
            data_dir: None,
            exclude: Vec::new(),
        }
    }
}

impl PluginConfig {
    /// Load a JSON config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| StrmError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Write the config back as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Immutable settings for one engine instance
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub enabled: bool,
    pub mappings: Vec<SourceRootMapping>,
    pub scan: ScanConfig,
    /// Naming API settings; `None` disables AI naming
    pub naming: Option<ChatApiConfig>,
    pub data_dir: PathBuf,
    /// Ignore the stored index and rebuild on the next scan
    pub force_rebuild: bool,
    /// Run one scan as soon as a scheduler starts
    pub run_once: bool,
    pub scan_schedule: Option<CronSchedule>,
    pub rebuild_schedule: Option<CronSchedule>,
}

impl ScanSettings {
    /// Settings with no mappings, naming off, storing data in `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            mappings: Vec::new(),
            scan: ScanConfig::default(),
            naming: None,
            data_dir: data_dir.into(),
            force_rebuild: false,
            run_once: false,
            scan_schedule: None,
            rebuild_schedule: None,
        }
    }

    pub fn with_mapping(mut self, mapping: SourceRootMapping) -> Self {
        self.mappings.push(mapping);
        self
    }

    pub fn with_scan_config(mut self, scan: ScanConfig) -> Self {
        self.scan = scan;
        self
    }

    pub fn with_naming(mut self, naming: ChatApiConfig) -> Self {
        self.naming = Some(naming);
        self
    }

    pub fn with_force_rebuild(mut self, force: bool) -> Self {
        self.force_rebuild = force;
        self
    }

    /// Build settings from a persisted config.
    ///
    /// Problems (bad mapping lines, bad patterns, bad cron expressions,
    /// missing API key) are
    /// returned next to the settings; the affected piece is left out and
    /// everything else is kept.
    pub fn from_config(
        config: &PluginConfig,
        default_data_dir: &Path,
    ) -> (Self, Vec<StrmError>) {
        let scheme = Scheme::from_https(config.https);
        let parsed = parse_mappings(&config.monitor_confs, scheme);
        let mut issues = parsed.errors;

        if parsed.mappings.is_empty() {
            issues.push(StrmError::Config(
                "no monitored directories configured".to_string(),
            ));
        }

        let exclude = match IgnoreRules::new(&config.exclude) {
            Ok(_) => config.exclude.clone(),
            Err(e) => {
                issues.push(e);
                Vec::new()
            }
        };

        let mut schedule = |expr: Option<&str>| match CronSchedule::parse_optional(expr) {
            Ok(schedule) => schedule,
            Err(e) => {
                issues.push(e);
                None
            }
        };
        let scan_schedule = schedule(config.cron.as_deref());
        let rebuild_schedule = schedule(config.rebuild_cron.as_deref());

        let naming = if config.enable_ai_naming {
            match config.deepseek_api_key.as_deref().map(str::trim) {
                Some(key) if !key.is_empty() => Some(
                    ChatApiConfig::new(key)
                        .with_api_url(config.api_url.as_deref().unwrap_or(DEFAULT_API_URL))
                        .with_model(config.model.as_deref().unwrap_or(DEFAULT_MODEL))
                        .with_timeout(
                            config
                                .timeout_secs
                                .map(Duration::from_secs)
                                .unwrap_or(DEFAULT_TIMEOUT),
                        ),
                ),
                _ => {
                    issues.push(StrmError::Config(
                        "AI naming is enabled but no API key is set; naming disabled".to_string(),
                    ));
                    None
                }
            }
        } else {
            None
        };

        let settings = Self {
            enabled: config.enabled,
            mappings: parsed.mappings,
            scan: ScanConfig::new()
                .with_copy_non_media(config.copy_files)
                .with_custom_ignore(exclude),
            naming,
            data_dir: config
                .data_dir
                .clone()
                .unwrap_or_else(|| default_data_dir.to_path_buf()),
            force_rebuild: config.rebuild,
            run_once: config.onlyonce,
            scan_schedule,
            rebuild_schedule,
        };

        (settings, issues)
    }

    /// Location of the known-file index
    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join(INDEX_FILE_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::AddressingMode;
    use tempfile::TempDir;

    fn config() -> PluginConfig {
        PluginConfig {
            enabled: true,
            monitor_confs: concat!(
                "/cloud/movies#/strm/movies#/mnt/movies\n",
                "/quark#/strm/quark#cd2#/quark#host:5244"
            )
            .to_string(),
            https: true,
            cron: Some("*/30 * * * *".to_string()),
            deepseek_api_key: Some("sk-test".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_match_plugin() {
        let config: PluginConfig = serde_json::from_str("{}").unwrap();
        assert!(!config.enabled);
        assert!(config.enable_ai_naming);
        assert!(config.exclude.is_empty());
    }

    #[test]
    fn test_from_config() {
        let (settings, issues) = ScanSettings::from_config(&config(), Path::new("/data"));

        assert!(issues.is_empty(), "{:?}", issues);
        assert_eq!(settings.mappings.len(), 2);
        assert_eq!(settings.index_path(), PathBuf::from("/data/cloudstrm_files.json"));
        assert_eq!(settings.naming.as_ref().unwrap().api_url, DEFAULT_API_URL);
        assert_eq!(settings.scan_schedule.as_ref().unwrap().as_str(), "*/30 * * * *");
        assert!(settings.rebuild_schedule.is_none());
        match &settings.mappings[1].mode {
            AddressingMode::Gateway { scheme, .. } => assert_eq!(*scheme, Scheme::Https),
            other => panic!("unexpected mode {:?}", other),
        }
    }

    #[test]
    fn test_missing_api_key_disables_naming() {
        let mut cfg = config();
        cfg.deepseek_api_key = Some("  ".to_string());
        let (settings, issues) = ScanSettings::from_config(&cfg, Path::new("/data"));

        assert!(settings.naming.is_none());
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_naming_switched_off() {
        let mut cfg = config();
        cfg.enable_ai_naming = false;
        let (settings, issues) = ScanSettings::from_config(&cfg, Path::new("/data"));

        assert!(settings.naming.is_none());
        assert!(issues.is_empty());
    }

    #[test]
    fn test_bad_lines_and_patterns_are_reported() {
        let mut cfg = config();
        cfg.monitor_confs.push_str("\n/only#two");
        cfg.exclude = vec!["a[".to_string()];
        let (settings, issues) = ScanSettings::from_config(&cfg, Path::new("/data"));

        assert_eq!(settings.mappings.len(), 2);
        assert!(settings.scan.custom_ignore.is_empty());
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn test_bad_cron_disables_only_that_job() {
        let mut cfg = config();
        cfg.rebuild_cron = Some("0 25 * * *".to_string());
        let (settings, issues) = ScanSettings::from_config(&cfg, Path::new("/data"));

        assert!(settings.scan_schedule.is_some());
        assert!(settings.rebuild_schedule.is_none());
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn test_data_dir_override() {
        let mut cfg = config();
        cfg.data_dir = Some(PathBuf::from("/var/lib/cloudstrm"));
        let (settings, _) = ScanSettings::from_config(&cfg, Path::new("/data"));
        assert_eq!(settings.data_dir, PathBuf::from("/var/lib/cloudstrm"));
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let cfg = config();
        cfg.save(&path).unwrap();
        assert_eq!(PluginConfig::load(&path).unwrap(), cfg);
    }

    #[test]
    fn test_load_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{\"enabled\": \"yes\"}").unwrap();

        assert!(matches!(PluginConfig::load(&path), Err(StrmError::Config(_))));
    }
}
