use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

use crate::episode;

/// Kind of media a folder holds, as reported by the naming oracle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub enum MediaType {
    Movie,
    Tv,
    /// Anything the oracle answered that is neither `movie` nor `tv`
    Other(String),
}

impl From<&str> for MediaType {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "movie" => MediaType::Movie,
            "tv" => MediaType::Tv,
            other => MediaType::Other(other.to_string()),
        }
    }
}

impl From<MediaType> for String {
    fn from(t: MediaType) -> Self {
        match t {
            MediaType::Movie => "movie".to_string(),
            MediaType::Tv => "tv".to_string(),
            MediaType::Other(s) => s,
        }
    }
}

impl<'de> Deserialize<'de> for MediaType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = lenient_string(deserializer)?;
        Ok(MediaType::from(raw.as_str()))
    }
}

impl Default for MediaType {
    fn default() -> Self {
        MediaType::Other(String::new())
    }
}

/// Structured description of one folder, as returned by the naming oracle.
///
/// Field names follow the oracle's JSON contract. Every field is optional on
/// the wire: missing or `null` values become empty strings and numbers are
/// accepted where strings are expected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderDescriptor {
    #[serde(rename = "type", default)]
    pub media_type: MediaType,
    #[serde(default, deserialize_with = "lenient_string")]
    pub chinese_title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub english_title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub year: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub season: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub episode: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub quality: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub audio: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub other: String,
    #[serde(rename = "folder_name", default, deserialize_with = "lenient_string")]
    pub canonical_folder_name: String,
}

/// Final names derived from a descriptor for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNames {
    /// New file name, original extension kept
    pub file_name: String,
    /// New leaf folder name; empty means "keep the folder as is"
    pub folder_name: String,
}

impl FolderDescriptor {
    /// Short human label used in logs
    pub fn label(&self) -> String {
        collapse_whitespace(&format!(
            "{} {} ({})",
            self.chinese_title, self.english_title, self.year
        ))
    }

    /// `chineseTitle englishTitle`, skipping whichever is empty
    fn title(&self) -> String {
        [self.chinese_title.as_str(), self.english_title.as_str()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// ` - quality audio other`, or empty when all three are empty
    fn details_suffix(&self) -> String {
        let details: Vec<&str> = [self.quality.as_str(), self.audio.as_str(), self.other.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();

        if details.is_empty() {
            String::new()
        } else {
            format!(" - {}", details.join(" "))
        }
    }

    fn year_suffix(&self) -> String {
        if self.year.is_empty() {
            String::new()
        } else {
            format!(" ({})", self.year)
        }
    }

    /// Derive the final file and folder names for `original_filename`.
    ///
    /// Returns `None` when the media type is neither movie nor tv.
    pub fn resolve_names(&self, original_filename: &str) -> Option<ResolvedNames> {
        let original = Path::new(original_filename);
        let ext = original
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut name = self.title();
        if name.is_empty() {
            name = original
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
        }

        match self.media_type {
            MediaType::Movie => {
                name.push_str(&self.year_suffix());
                name.push_str(&self.details_suffix());
            }
            MediaType::Tv => {
                name.push_str(&self.year_suffix());
                match episode::extract(original_filename) {
                    Some(tag) => {
                        name.push(' ');
                        name.push_str(&tag.to_string());
                    }
                    None => {
                        tracing::warn!("Could not extract episode number: {}", original_filename);
                    }
                }
                name.push_str(&self.details_suffix());
            }
            MediaType::Other(ref kind) => {
                tracing::warn!("Unknown media type '{}' for {}", kind, original_filename);
                return None;
            }
        }

        let file_name = format!("{}{}", sanitize(&name), ext);

        Some(ResolvedNames {
            file_name,
            folder_name: sanitize(&self.folder_name()),
        })
    }

    fn folder_name(&self) -> String {
        if !self.canonical_folder_name.is_empty() {
            return self.canonical_folder_name.clone();
        }

        let title = self.title();
        if !title.is_empty() {
            return format!("{}{}", title, self.year_suffix());
        }

        if !self.chinese_title.is_empty() {
            return format!("{}{}", self.chinese_title, self.year_suffix());
        }

        String::new()
    }
}

/// Collapse whitespace runs and make the name safe as a single path component
fn sanitize(name: &str) -> String {
    collapse_whitespace(name).replace(['/', '\\'], "-")
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_space = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !last_space {
                out.push(' ');
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = false;
        }
    }
    out
}

/// Accept a string, number, bool or null where a string is expected
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}
