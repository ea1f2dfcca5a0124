//! Known-file index
//!
//! The set of source paths that have already been processed, shared by all
//! mappings. Membership is exact string equality; paths are never
//! normalised. Entries are only ever added.
//!
//! On disk the index is a JSON array of path strings. Saves go through a
//! temporary file in the same directory that is renamed over the old index,
//! so a crash mid-write leaves the previous index intact.

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use crate::Result;

/// File name of the index inside the data directory
pub const INDEX_FILE_NAME: &str = "cloudstrm_files.json";

/// Ordered set of known source file paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnownFileIndex {
    /// Insertion order, as persisted
    paths: Vec<String>,
    lookup: HashSet<String>,
}

impl KnownFileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.lookup.contains(path)
    }

    /// Add a path, returns true if it was not known yet
    pub fn insert(&mut self, path: impl Into<String>) -> bool {
        let path = path.into();
        if self.lookup.contains(&path) {
            return false;
        }
        self.lookup.insert(path.clone());
        self.paths.push(path);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    /// Keep only the paths not present in the index
    pub fn unknown<I>(&self, candidates: I) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        candidates.into_iter().filter(|p| !self.contains(p)).collect()
    }

    /// Load an index file.
    ///
    /// Returns `Ok(None)` if the file does not exist. An empty file loads as
    /// an empty index.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Some(Self::new()));
        }

        let paths: Vec<String> = serde_json::from_str(&content)?;
        Ok(Some(paths.into_iter().collect()))
    }

    /// Atomically replace the index file with the current contents
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let json = serde_json::to_vec(&self.paths)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path)?;

        tracing::debug!("Saved {} known files to {}", self.len(), path.display());
        Ok(())
    }
}

impl FromIterator<String> for KnownFileIndex {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut index = Self::new();
        for path in iter {
            index.insert(path);
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_insert_dedups() {
        let mut index = KnownFileIndex::new();
        assert!(index.insert("/a.mkv"));
        assert!(!index.insert("/a.mkv"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_exact_string_membership() {
        let index: KnownFileIndex = vec!["/m/a.mkv".to_string()].into_iter().collect();
        assert!(index.contains("/m/a.mkv"));
        assert!(!index.contains("/m//a.mkv"));
        assert!(!index.contains("/m/./a.mkv"));
    }

    #[test]
    fn test_unknown() {
        let index: KnownFileIndex = vec!["A".to_string(), "B".to_string()].into_iter().collect();
        let new = index.unknown(vec!["A".to_string(), "B".to_string(), "C".to_string()]);
        assert_eq!(new, vec!["C".to_string()]);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join(INDEX_FILE_NAME);

        let index: KnownFileIndex = vec!["/m/b.mkv".to_string(), "/m/a.mkv".to_string()]
            .into_iter()
            .collect();
        index.save(&path).unwrap();

        let loaded = KnownFileIndex::load(&path).unwrap().unwrap();
        assert_eq!(loaded, index);
        assert_eq!(loaded.iter().collect::<Vec<_>>(), vec!["/m/b.mkv", "/m/a.mkv"]);
    }

    #[test]
    fn test_on_disk_format_is_json_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(INDEX_FILE_NAME);
        let index: KnownFileIndex = vec!["/m/a.mkv".to_string()].into_iter().collect();
        index.save(&path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"["/m/a.mkv"]"#);
    }

    #[test]
    fn test_save_overwrites_previous() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(INDEX_FILE_NAME);

        let mut index = KnownFileIndex::new();
        index.insert("/a");
        index.save(&path).unwrap();
        index.insert("/b");
        index.save(&path).unwrap();

        assert_eq!(KnownFileIndex::load(&path).unwrap().unwrap().len(), 2);
        // No temp files left behind
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_load_missing_and_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(INDEX_FILE_NAME);
        assert!(KnownFileIndex::load(&path).unwrap().is_none());

        std::fs::write(&path, "").unwrap();
        assert!(KnownFileIndex::load(&path).unwrap().unwrap().is_empty());
    }

    #[test]
    fn test_load_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(INDEX_FILE_NAME);
        std::fs::write(&path, "[\"/a\",").unwrap();
        assert!(KnownFileIndex::load(&path).is_err());
    }
}
