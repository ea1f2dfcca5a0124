//! Monitored directory mappings
//!
//! Each non-comment line of the monitor configuration maps one source root
//! to a destination root plus an addressing mode:
//!
//! ```text
//! /mnt/cloud/movies#/library/movies#/mnt/cloud/movies          local mirror
//! /quark/movies#/library/movies#cd2#/quark#192.168.1.10:19798  gateway
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::{Result, StrmError};

/// URL scheme used for gateway links
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Http,
    Https,
}

impl Scheme {
    pub fn from_https(https: bool) -> Self {
        if https {
            Scheme::Https
        } else {
            Scheme::Http
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cloud gateway flavour; each has its own URL shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayKind {
    /// CloudDrive2 static file URLs (`cd2`, also accepted as `gatewayA`)
    CloudDrive,
    /// Alist WebDAV URLs (`alist`, also accepted as `gatewayB`)
    Alist,
    /// Unrecognised cloud type; links for this mapping cannot be built
    Unknown(String),
}

impl From<&str> for GatewayKind {
    fn from(s: &str) -> Self {
        match s.trim() {
            "cd2" | "gatewayA" => GatewayKind::CloudDrive,
            "alist" | "gatewayB" => GatewayKind::Alist,
            other => GatewayKind::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for GatewayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayKind::CloudDrive => f.write_str("cd2"),
            GatewayKind::Alist => f.write_str("alist"),
            GatewayKind::Unknown(s) => f.write_str(s),
        }
    }
}

/// How pointer content is addressed for a mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressingMode {
    /// Pointer holds a filesystem path under `library_root`
    LocalMirror { library_root: String },
    /// Pointer holds a URL to a cloud gateway
    Gateway {
        kind: GatewayKind,
        mount_path: String,
        service_host: String,
        scheme: Scheme,
    },
}

/// One monitored source root and where its links go
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRootMapping {
    pub source_root: String,
    pub dest_root: String,
    pub mode: AddressingMode,
}

impl SourceRootMapping {
    pub fn local(
        source_root: impl Into<String>,
        dest_root: impl Into<String>,
        library_root: impl Into<String>,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            dest_root: dest_root.into(),
            mode: AddressingMode::LocalMirror {
                library_root: library_root.into(),
            },
        }
    }

    pub fn gateway(
        source_root: impl Into<String>,
        dest_root: impl Into<String>,
        kind: GatewayKind,
        mount_path: impl Into<String>,
        service_host: impl Into<String>,
        scheme: Scheme,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            dest_root: dest_root.into(),
            mode: AddressingMode::Gateway {
                kind,
                mount_path: mount_path.into(),
                service_host: service_host.into(),
                scheme,
            },
        }
    }

    /// Parse one configuration line.
    ///
    /// Returns `Ok(None)` for blank and comment lines.
    pub fn parse_line(line: &str, scheme: Scheme) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let parts: Vec<&str> = line.split('#').map(str::trim).collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(StrmError::Mapping(format!("empty field in '{}'", line)));
        }

        match parts.as_slice() {
            [source, dest, library] => Ok(Some(Self::local(*source, *dest, *library))),
            [source, dest, cloud_type, mount_path, host] => Ok(Some(Self::gateway(
                *source,
                *dest,
                GatewayKind::from(*cloud_type),
                *mount_path,
                *host,
                scheme,
            ))),
            _ => Err(StrmError::Mapping(format!(
                "expected 3 or 5 '#'-separated fields, got {} in '{}'",
                parts.len(),
                line
            ))),
        }
    }

    /// Swap the source-root prefix of `source_file` for the destination root
    pub fn destination_for(&self, source_file: &str) -> Result<String> {
        let rest = source_file
            .strip_prefix(&self.source_root)
            .ok_or_else(|| StrmError::PathOutsideRoot {
                path: source_file.to_string(),
                root: self.source_root.clone(),
            })?;
        Ok(format!("{}{}", self.dest_root, rest))
    }

    /// Whether one source root is nested in the other, compared by path component
    pub fn overlaps(&self, other: &SourceRootMapping) -> bool {
        let (a, b) = (Path::new(&self.source_root), Path::new(&other.source_root));
        a.starts_with(b) || b.starts_with(a)
    }
}

/// Result of parsing a whole multi-line monitor configuration
#[derive(Debug, Default)]
pub struct ParsedMappings {
    pub mappings: Vec<SourceRootMapping>,
    /// Rejected lines and unknown cloud types, with the reason
    pub errors: Vec<StrmError>,
}

/// Parse every line, keeping good mappings and collecting errors for the rest.
///
/// A mapping with an unknown cloud type is kept and also reported.
///
/// A mapping whose source root overlaps an earlier one is rejected so routing
/// stays unambiguous.
pub fn parse_mappings(text: &str, scheme: Scheme) -> ParsedMappings {
    let mut parsed = ParsedMappings::default();

    for (lineno, line) in text.lines().enumerate() {
        match SourceRootMapping::parse_line(line, scheme) {
            Ok(Some(mapping)) => {
                // Kept so copy mode still works; pointer creation fails per file
                if let AddressingMode::Gateway {
                    kind: GatewayKind::Unknown(kind),
                    ..
                } = &mapping.mode
                {
                    parsed.errors.push(StrmError::UnsupportedCloudType(format!(
                        "line {}: '{}', links under {} will fail",
                        lineno + 1,
                        kind,
                        mapping.source_root
                    )));
                }

                if let Some(existing) = parsed.mappings.iter().find(|m| m.overlaps(&mapping)) {
                    parsed.errors.push(StrmError::Mapping(format!(
                        "line {}: source root {} overlaps {}",
                        lineno + 1,
                        mapping.source_root,
                        existing.source_root
                    )));
                    continue;
                }

                parsed.mappings.push(mapping);
            }
            Ok(None) => {}
            Err(StrmError::Mapping(msg)) => {
                parsed.errors.push(StrmError::Mapping(format!("line {}: {}", lineno + 1, msg)))
            }
            Err(e) => parsed.errors.push(e),
        }
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_local_mirror() {
        let line = "/cloud/movies#/strm/movies#/mnt/movies";
        let m = SourceRootMapping::parse_line(line, Scheme::Http).unwrap().unwrap();
        assert_eq!(m.source_root, "/cloud/movies");
        assert_eq!(m.dest_root, "/strm/movies");
        assert_eq!(
            m.mode,
            AddressingMode::LocalMirror { library_root: "/mnt/movies".into() }
        );
    }

    #[test]
    fn test_parse_gateway() {
        let line = "/quark/tv#/strm/tv#cd2#/quark#host:5244";
        let m = SourceRootMapping::parse_line(line, Scheme::Https).unwrap().unwrap();
        match m.mode {
            AddressingMode::Gateway { kind, mount_path, service_host, scheme } => {
                assert_eq!(kind, GatewayKind::CloudDrive);
                assert_eq!(mount_path, "/quark");
                assert_eq!(service_host, "host:5244");
                assert_eq!(scheme, Scheme::Https);
            }
            other => panic!("unexpected mode {:?}", other),
        }
    }

    #[test]
    fn test_gateway_aliases() {
        assert_eq!(GatewayKind::from("gatewayA"), GatewayKind::CloudDrive);
        assert_eq!(GatewayKind::from("alist"), GatewayKind::Alist);
        assert_eq!(GatewayKind::from("gatewayB"), GatewayKind::Alist);
        assert_eq!(GatewayKind::from("s3"), GatewayKind::Unknown("s3".into()));
    }

    #[test]
    fn test_skips_blank_and_comment_lines() {
        assert!(SourceRootMapping::parse_line("", Scheme::Http).unwrap().is_none());
        assert!(SourceRootMapping::parse_line("   ", Scheme::Http).unwrap().is_none());
        assert!(SourceRootMapping::parse_line("#/a#/b#/c", Scheme::Http).unwrap().is_none());
    }

    #[test]
    fn test_rejects_malformed_lines() {
        assert!(SourceRootMapping::parse_line("/a#/b", Scheme::Http).is_err());
        assert!(SourceRootMapping::parse_line("/a#/b#c#d", Scheme::Http).is_err());
        assert!(SourceRootMapping::parse_line("/a##/c", Scheme::Http).is_err());
    }

    #[test]
    fn test_destination_for() {
        let m = SourceRootMapping::local("/cloud/movies", "/strm/movies", "/mnt/movies");
        assert_eq!(
            m.destination_for("/cloud/movies/A (2020)/a.mkv").unwrap(),
            "/strm/movies/A (2020)/a.mkv"
        );
        assert!(m.destination_for("/elsewhere/a.mkv").is_err());
    }

    #[test]
    fn test_parse_mappings_collects_errors() {
        let text = "\
# comment
/cloud/movies#/strm/movies#/mnt/movies

/broken#line
/quark#/strm/quark#alist#/quark#host:5244
/cloud/movies/4k#/strm/4k#/mnt/4k
";
        let parsed = parse_mappings(text, Scheme::Http);
        assert_eq!(parsed.mappings.len(), 2);
        assert_eq!(parsed.errors.len(), 2);
    }

    #[test]
    fn test_unknown_cloud_type_is_kept_and_reported() {
        let parsed = parse_mappings("/s3#/strm/s3#s3#/s3#host", Scheme::Http);
        assert_eq!(parsed.mappings.len(), 1);
        assert_eq!(parsed.errors.len(), 1);
        assert!(matches!(parsed.errors[0], StrmError::UnsupportedCloudType(_)));
    }

    #[test]
    fn test_sibling_roots_sharing_a_name_prefix_do_not_overlap() {
        let text = "/cloud/movies#/strm/movies#/mnt/movies\n/cloud/movies4k#/strm/4k#/mnt/4k";
        let parsed = parse_mappings(text, Scheme::Http);
        assert_eq!(parsed.mappings.len(), 2);
        assert!(parsed.errors.is_empty(), "{:?}", parsed.errors);

        let movies = &parsed.mappings[0];
        let nested = SourceRootMapping::local("/cloud/movies/4k", "/strm/4k", "/mnt/4k");
        assert!(movies.overlaps(&nested));
        assert!(nested.overlaps(movies));
    }
}
