//! Consistent shard-store snapshots for file-based replication.
//!
//! A snapshot is a gzip'd tarball of the shard directory (index segments,
//! meta files, and the internal key store), written as a
//! `store.replicate.*` temp file inside the shard directory itself. The
//! read side unpacks it next to the target and swaps it in with a rename.

use crate::error::Result;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::path::{Path, PathBuf};
use tar::{Archive, Builder};

pub const REPLICATE_PREFIX: &str = "store.replicate.";
const MANIFEST_FILE: &str = "store.meta.json";

/// Write a snapshot of `shard_dir` and return the temp file path. The
/// caller removes the file once it has been shipped.
pub fn write_snapshot(shard_dir: &Path) -> Result<PathBuf> {
    let tmp = tempfile::Builder::new()
        .prefix(REPLICATE_PREFIX)
        .tempfile_in(shard_dir)?;

    let encoder = GzEncoder::new(tmp, Compression::fast());
    let mut archive = Builder::new(encoder);
    append_dir_filtered(&mut archive, shard_dir, Path::new(""))?;
    let encoder = archive.into_inner()?;
    let tmp = encoder.finish()?;

    let (_, path) = tmp
        .keep()
        .map_err(|e| crate::error::SkilletError::Io(e.to_string()))?;
    Ok(path)
}

/// In-flight snapshots live in the directory being archived; skip them.
fn append_dir_filtered<W: std::io::Write>(
    archive: &mut Builder<W>,
    dir: &Path,
    relative: &Path,
) -> Result<()> {
    let entries: Vec<_> = std::fs::read_dir(dir)?.collect::<std::io::Result<Vec<_>>>()?;

    for entry in entries {
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(REPLICATE_PREFIX) {
            continue;
        }
        let path = entry.path();
        let rel = relative.join(&name);
        if path.is_dir() {
            archive.append_dir(&rel, &path)?;
            append_dir_filtered(archive, &path, &rel)?;
        } else {
            archive.append_path_with_name(&path, &rel)?;
        }
    }
    Ok(())
}

/// Unpack a snapshot into `dest`, replacing whatever store was there.
///
/// The archive is unpacked into a sibling temp directory and renamed into
/// place, so readers never observe a half-written store. A minimal store
/// manifest is added when the snapshot lacks one.
pub fn restore_snapshot(data: &[u8], dest: &Path) -> Result<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| crate::error::SkilletError::Io("destination has no parent".to_string()))?;
    std::fs::create_dir_all(parent)?;

    let unpack = tempfile::Builder::new()
        .prefix("store.tmp.")
        .tempdir_in(parent)?;
    let mut archive = Archive::new(GzDecoder::new(data));
    archive.unpack(unpack.path())?;

    let manifest = unpack.path().join(MANIFEST_FILE);
    if !manifest.exists() {
        let body = serde_json::json!({"storage": "mmap", "index_type": "inverted"});
        std::fs::write(&manifest, serde_json::to_vec_pretty(&body)?)?;
    }

    if dest.exists() {
        std::fs::remove_dir_all(dest)?;
    }
    std::fs::rename(unpack.into_path(), dest)?;
    Ok(())
}
