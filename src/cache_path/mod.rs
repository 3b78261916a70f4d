//! Content-addressed thumbnail paths and atomic publishing
//!
//! A thumbnail's file name carries a SHA-256 over the serialized options
//! and the source modification time, so any change to either produces a
//! new path and old thumbnails are simply never looked up again.
//!
//! Files are published by writing a uniquely named temp file in the target
//! directory and renaming it into place. Readers observe either no file or
//! a complete one.

use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::error::ThumbError;
use crate::options::ThumbOptions;

/// Extension of the sidecar descriptor written next to a thumbnail path
pub const DESCRIPTOR_EXTENSION: &str = "opt";

/// Hex SHA-256 of the serialized options followed by the source mtime
pub fn cache_key(options: &ThumbOptions, mtime: Option<u64>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(options.fingerprint_source().as_bytes());
    if let Some(mtime) = mtime {
        hasher.update(mtime.to_string().as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Modification time in whole seconds since the epoch, if the file exists
pub async fn source_mtime(path: &Path) -> Option<u64> {
    let metadata = tokio::fs::metadata(path).await.ok()?;
    let modified = metadata.modified().ok()?;
    modified
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs())
}

/// Thumbnail path for `source`, mirroring its folder below `source_root`
/// under `thumbs_root`: `<thumbs_root>/<folder>/<stem>-<key>.<ext>`.
///
/// Sources outside `source_root`, or whose folder climbs out of it with
/// `..`, land directly in `thumbs_root`.
pub fn derive_thumb_path(source: &Path, source_root: &Path, thumbs_root: &Path, key: &str) -> PathBuf {
    let source = normalize(source);
    let source_root = normalize(source_root);

    let mut path = thumbs_root.to_path_buf();
    if let Some(folder) = source.parent() {
        if let Ok(relative) = folder.strip_prefix(&source_root) {
            if relative.components().all(|c| matches!(c, Component::Normal(_))) {
                path.push(relative);
            }
        }
    }

    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match source.extension() {
        Some(ext) => format!("{}-{}.{}", stem, key, ext.to_string_lossy()),
        None => format!("{}-{}", stem, key),
    };
    path.push(file_name);
    path
}

/// Sidecar descriptor path for a thumbnail path: the full thumbnail file
/// name plus `.opt`, so `cat-K.jpg` and `cat-K.png` get distinct sidecars.
pub fn descriptor_path(thumb_path: &Path) -> PathBuf {
    let name = thumb_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    thumb_path.with_file_name(format!("{}.{}", name, DESCRIPTOR_EXTENSION))
}

/// Whether `path` names a sidecar descriptor
pub fn is_descriptor(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext == DESCRIPTOR_EXTENSION)
        .unwrap_or(false)
}

/// Whether two thumbnail paths name the same source variant, differing at
/// most in the cache key: same folder, same stem before the key, same
/// extension.
pub fn same_thumbnail_family(a: &Path, b: &Path) -> bool {
    fn family(path: &Path) -> (Option<&Path>, Option<&str>, Option<&std::ffi::OsStr>) {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.rsplit_once('-').map(|(base, _)| base).unwrap_or(s));
        (path.parent(), stem, path.extension())
    }
    family(&normalize(a)) == family(&normalize(b))
}

/// `/`-separated path of `path` relative to `root`
pub fn relative_url_path(root: &Path, path: &Path) -> Option<String> {
    let relative = normalize(path);
    let relative = relative.strip_prefix(normalize(root)).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Lexically drop `.` components so `./thumbs/a` and `thumbs/a` compare equal
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4()))
}

/// Write `data` to a private temp file beside `path`, then rename it into
/// place. Concurrent writers of the same path each publish a complete file;
/// the last rename wins.
pub async fn publish_atomic(path: &Path, data: &[u8]) -> Result<(), ThumbError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let temp_path = temp_path_for(path);
    if let Err(e) = tokio::fs::write(&temp_path, data).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    Ok(())
}

/// Publish `data` at `path` only if nothing exists there yet.
///
/// Returns `true` when this call created the file. The file appears
/// complete or not at all.
pub async fn publish_no_clobber(path: &Path, data: &[u8]) -> Result<bool, ThumbError> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let temp_path = temp_path_for(path);
    if let Err(e) = tokio::fs::write(&temp_path, data).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }

    // hard_link fails with AlreadyExists instead of replacing
    let linked = tokio::fs::hard_link(&temp_path, path).await;
    let _ = tokio::fs::remove_file(&temp_path).await;

    match linked {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.into()),
    }
}
