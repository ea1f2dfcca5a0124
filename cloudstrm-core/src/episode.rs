//! Season/episode extraction from media filenames
//!
//! Rules are tried in a fixed order and the first one that matches wins,
//! even if a later rule would have produced a different answer.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// A (season, episode) pair parsed from a filename
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EpisodeTag {
    pub season: u32,
    pub episode: u32,
}

impl EpisodeTag {
    pub fn new(season: u32, episode: u32) -> Self {
        Self { season, episode }
    }
}

impl fmt::Display for EpisodeTag {
    /// Renders as `S01E03`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "S{:02}E{:02}", self.season, self.episode)
    }
}

/// Extraction rules in priority order.
///
/// Two capture groups mean (season, episode); one group means an episode
/// in season 1.
static EPISODE_RULES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        // S01E01, s1e2
        ("s00e00", Regex::new(r"[Ss]([0-9]{1,2})[Ee]([0-9]{1,2})").unwrap()),
        // 第1季第1集
        ("season_episode_zh", Regex::new(r"第\s*([0-9]+)\s*季.*?第\s*([0-9]+)\s*集").unwrap()),
        // EP01, E01
        ("ep00", Regex::new(r"[Ee][Pp]?([0-9]{1,2})").unwrap()),
        // 第1集
        ("episode_zh", Regex::new(r"第\s*([0-9]+)\s*集").unwrap()),
        // 01.mkv, .01.mkv
        ("leading_number", Regex::new(r"^\.?([0-9]{1,2})\.").unwrap()),
        // Show - 01.mkv
        ("bare_number", Regex::new(r"[^0-9]([0-9]{1,2})\.").unwrap()),
    ]
});

/// Extract an [`EpisodeTag`] from a filename.
///
/// Returns `None` when no rule matches.
pub fn extract(filename: &str) -> Option<EpisodeTag> {
    for (name, rule) in EPISODE_RULES.iter() {
        let Some(captures) = rule.captures(filename) else {
            continue;
        };

        let tag = match (captures.get(1), captures.get(2)) {
            (Some(season), Some(episode)) => {
                match (season.as_str().parse(), episode.as_str().parse()) {
                    (Ok(s), Ok(e)) => Some(EpisodeTag::new(s, e)),
                    _ => None,
                }
            }
            (Some(episode), None) => episode.as_str().parse().ok().map(|e| EpisodeTag::new(1, e)),
            _ => None,
        };

        match tag {
            Some(tag) => {
                tracing::debug!("Episode rule {} matched {}: {}", name, filename, tag);
                return Some(tag);
            }
            // Matched but the number did not fit; fall through to the next rule
            None => continue,
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_s00e00_any_case() {
        assert_eq!(extract("Show.S03E07.1080p.mkv"), Some(EpisodeTag::new(3, 7)));
        assert_eq!(extract("show.s03e07.mkv"), Some(EpisodeTag::new(3, 7)));
        assert_eq!(extract("S03e07.mkv"), Some(EpisodeTag::new(3, 7)));
    }

    #[test]
    fn test_chinese_season_episode() {
        assert_eq!(extract("示例剧 第2季 第10集.mp4"), Some(EpisodeTag::new(2, 10)));
    }

    #[test]
    fn test_ep_defaults_to_season_one() {
        assert_eq!(extract("EP5.mkv"), Some(EpisodeTag::new(1, 5)));
        assert_eq!(extract("Show EP05.mkv"), Some(EpisodeTag::new(1, 5)));
        assert_eq!(extract("Show E12.mkv"), Some(EpisodeTag::new(1, 12)));
    }

    #[test]
    fn test_chinese_episode() {
        assert_eq!(extract("示例剧 第8集.mkv"), Some(EpisodeTag::new(1, 8)));
    }

    #[test]
    fn test_leading_number() {
        assert_eq!(extract("03.mkv"), Some(EpisodeTag::new(1, 3)));
        assert_eq!(extract(".04.mkv"), Some(EpisodeTag::new(1, 4)));
    }

    #[test]
    fn test_bare_number() {
        assert_eq!(extract("示例剧 - 11.mkv"), Some(EpisodeTag::new(1, 11)));
    }

    #[test]
    fn test_no_match() {
        assert_eq!(extract("random.mkv"), None);
        assert_eq!(extract("movie.mkv"), None);
    }

    #[test]
    fn test_first_rule_wins() {
        // Both S01E02 and the bare "05." would match; S##E## has priority
        assert_eq!(extract("S01E02 - 05.mkv"), Some(EpisodeTag::new(1, 2)));
        // 第N季第M集 beats the later 第M集 rule
        assert_eq!(extract("第3季第4集.mkv"), Some(EpisodeTag::new(3, 4)));
    }

    #[test]
    fn test_display_zero_pads() {
        assert_eq!(EpisodeTag::new(1, 3).to_string(), "S01E03");
        assert_eq!(EpisodeTag::new(12, 104).to_string(), "S12E104");
    }
}
