//! Pointer content resolution
//!
//! Turns a source/destination pair into the text written inside a `.strm`
//! file: a library path for local mirrors, or a gateway URL.

use crate::mapping::{AddressingMode, GatewayKind, SourceRootMapping};
use crate::{Result, StrmError};

/// Content to write into the pointer for `source_file`.
///
/// `dest_file` is the (possibly renamed) destination path of the media file;
/// it is only used in local-mirror mode. Gateway URLs are always built from
/// the original source path.
pub fn link_target(
    mapping: &SourceRootMapping,
    source_file: &str,
    dest_file: &str,
) -> Result<String> {
    match &mapping.mode {
        AddressingMode::LocalMirror { library_root } => {
            let rest = dest_file
                .strip_prefix(&mapping.dest_root)
                .ok_or_else(|| StrmError::PathOutsideRoot {
                    path: dest_file.to_string(),
                    root: mapping.dest_root.clone(),
                })?;
            Ok(format!("{}{}", library_root, rest))
        }
        AddressingMode::Gateway {
            kind,
            mount_path,
            service_host,
            scheme,
        } => {
            let encoded = encode_cloud_path(source_file, mount_path);
            match kind {
                GatewayKind::CloudDrive => Ok(format!(
                    "{scheme}://{service_host}/static/{scheme}/{service_host}/False/{encoded}"
                )),
                GatewayKind::Alist => Ok(format!("{scheme}://{service_host}/dav/{encoded}")),
                GatewayKind::Unknown(other) => Err(StrmError::UnsupportedCloudType(other.clone())),
            }
        }
    }
}

/// Path relative to the cloud mount, percent-encoded as one URL segment.
///
/// Backslashes are normalised to `/` and the mount prefix is removed when it
/// ends on a path boundary. Every reserved character (including `/`) is
/// encoded.
pub fn encode_cloud_path(source_file: &str, mount_path: &str) -> String {
    let normalized = source_file.replace('\\', "/");
    let mount = mount_path.replace('\\', "/");
    let mount = mount.trim_end_matches('/');

    let relative = match normalized.strip_prefix(mount) {
        Some(rest) if !mount.is_empty() && (rest.is_empty() || rest.starts_with('/')) => rest,
        _ => {
            tracing::debug!("{} is not under cloud mount {}", normalized, mount_path);
            normalized.as_str()
        }
    };

    urlencoding::encode(relative.trim_start_matches('/')).into_owned()
}
