//! Season folder detection
//!
//! A season folder (`Season 2`, `S02`, `第二季`) names a season rather than a
//! title, so naming lookups for its files go to the parent folder instead.
//! Only one level of indirection is applied: `show/season/disc` layouts are
//! not recognised.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static SEASON_FOLDER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // S01, S1, Season 1, season.01, Show.S02.1080p
        // The letter before `s` must not be a latin letter so that titles like
        // "Pegasus 2" are not taken for seasons; at most three digits keeps
        // years out.
        Regex::new(r"(?i)(?:^|[^a-z])s(?:eason)?[\s._-]*0?[0-9]{1,3}(?:[^0-9]|$)").unwrap(),
        // 第一季, 第1季, 第 十 季
        Regex::new(r"第\s*[0-9一二三四五六七八九十]+\s*季").unwrap(),
    ]
});

/// Whether a folder name denotes a season/volume rather than a title
pub fn is_season_folder(name: &str) -> bool {
    SEASON_FOLDER_PATTERNS.iter().any(|pattern| pattern.is_match(name))
}

/// Name to key a naming lookup on for files living in `folder`.
///
/// Season folders defer to their parent's name; everything else uses its own
/// name. A season folder with no usable parent name falls back to itself.
pub fn lookup_key(folder: &Path) -> String {
    let name = folder_name(folder);

    if is_season_folder(&name) {
        if let Some(parent) = folder.parent().map(folder_name).filter(|p| !p.is_empty()) {
            tracing::info!("Season folder detected, using parent folder: {}", parent);
            return parent;
        }
    }

    name
}

fn folder_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_season_folders() {
        assert!(is_season_folder("Season 2"));
        assert!(is_season_folder("season 02"));
        assert!(is_season_folder("Season2"));
        assert!(is_season_folder("S02"));
        assert!(is_season_folder("s1"));
        assert!(is_season_folder("Show.S02.1080p"));
        assert!(is_season_folder("第二季"));
        assert!(is_season_folder("第2季"));
        assert!(is_season_folder("示例剧 第 十 季"));
    }

    #[test]
    fn test_title_folders() {
        assert!(!is_season_folder("流浪地球 (2023)"));
        assert!(!is_season_folder("飞驰人生2 (2024) 4K"));
        assert!(!is_season_folder("Pegasus 2"));
        assert!(!is_season_folder("Movies 2023"));
        assert!(!is_season_folder("Specials"));
    }

    #[test]
    fn test_lookup_key_uses_parent_for_season() {
        let folder = PathBuf::from("/media/tv/示例剧 (2022)/Season 2");
        assert_eq!(lookup_key(&folder), "示例剧 (2022)");
    }

    #[test]
    fn test_lookup_key_uses_self_for_title() {
        let folder = PathBuf::from("/media/movies/流浪地球 (2023)");
        assert_eq!(lookup_key(&folder), "流浪地球 (2023)");
    }

    #[test]
    fn test_lookup_key_single_level_only() {
        // show/season/disc: the disc folder is not a season folder, so it keys on itself
        let folder = PathBuf::from("/media/tv/示例剧/Season 1/Disc 1");
        assert_eq!(lookup_key(&folder), "Disc 1");
    }

    #[test]
    fn test_lookup_key_season_at_root() {
        assert_eq!(lookup_key(Path::new("S01")), "S01");
    }
}
