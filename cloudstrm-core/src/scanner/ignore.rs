use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::Result;

/// Path fragments that are ALWAYS ignored - recycle bins, NAS metadata and
/// hidden entries. Matched as substrings of the path relative to its source
/// root (with a leading `/`).
pub const ALWAYS_IGNORE: &[&str] = &[
    "/@Recycle",
    "/#recycle",
    "/.",
    "/@eaDir",
];

/// Directory names never descended into
pub const SKIP_DIRS: &[&str] = &["extrafanart"];

/// Compiled ignore rules: the fixed markers plus user globs
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    custom: GlobSet,
    custom_count: usize,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self {
            custom: GlobSet::empty(),
            custom_count: 0,
        }
    }
}

impl IgnoreRules {
    /// Compile user-supplied glob patterns (matched against the relative path
    /// without its leading `/`)
    pub fn new(custom_ignore: &[String]) -> Result<Self> {
        let patterns: Vec<&str> = custom_ignore.iter().map(|s| s.as_str()).collect();
        Ok(Self {
            custom: build_globset(&patterns)?,
            custom_count: patterns.len(),
        })
    }

    /// Check if a path relative to its source root should be ignored
    pub fn should_ignore(&self, relative: &str) -> bool {
        let rooted = if relative.starts_with('/') {
            relative.to_string()
        } else {
            format!("/{}", relative)
        };

        if ALWAYS_IGNORE.iter().any(|marker| rooted.contains(marker)) {
            return true;
        }

        self.custom_count > 0 && self.custom.is_match(rooted.trim_start_matches('/'))
    }

    /// Whether traversal should not enter a directory with this name
    pub fn skip_dir(name: &str) -> bool {
        SKIP_DIRS.contains(&name)
    }
}

/// Build a GlobSet from a slice of pattern strings
pub fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();

    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_always_ignore_markers() {
        let rules = IgnoreRules::default();

        assert!(rules.should_ignore("/@Recycle/a.mkv"));
        assert!(rules.should_ignore("/movies/#recycle/a.mkv"));
        assert!(rules.should_ignore("/movies/@eaDir/a.mkv"));
        assert!(rules.should_ignore("/movies/.hidden.mkv"));
        assert!(rules.should_ignore(".cache/a.mkv"));

        assert!(!rules.should_ignore("/movies/A (2020)/a.mkv"));
        assert!(!rules.should_ignore("movies/a.b.mkv"));
    }

    #[test]
    fn test_custom_ignore() {
        let rules = IgnoreRules::new(&["**/sample/**".to_string(), "*.part".to_string()]).unwrap();

        assert!(rules.should_ignore("/A/sample/a.mkv"));
        assert!(rules.should_ignore("a.part"));
        assert!(!rules.should_ignore("/A/a.mkv"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(IgnoreRules::new(&["a[".to_string()]).is_err());
    }

    #[test]
    fn test_skip_dir() {
        assert!(IgnoreRules::skip_dir("extrafanart"));
        assert!(!IgnoreRules::skip_dir("extras"));
    }

    #[test]
    fn test_build_globset() {
        let globset = build_globset(&["*.nfo", "subs/**"]).unwrap();

        assert!(globset.is_match("movie.nfo"));
        assert!(globset.is_match("subs/en.srt"));
        assert!(!globset.is_match("movie.mkv"));
    }
}
