use std::fs::{self, Permissions};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::time_utils::current_unix_timestamp;

/// Writes bytes using a temp file + rename so readers never observe partial data.
///
/// The temp file and destination are given `mode` explicitly (vault state is
/// always private); the rename is re-verified by statting the destination.
pub fn write_bytes_atomic(path: &Path, content: &[u8], mode: u32) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("destination path cannot be empty");
    }
    if path.exists() && path.is_dir() {
        bail!("destination path '{}' is a directory", path.display());
    }

    let parent_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent_dir)
        .with_context(|| format!("failed to create {}", parent_dir.display()))?;

    let temp_name = format!(
        ".{}.tmp-{}-{}",
        path.file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("vault"),
        std::process::id(),
        current_unix_timestamp()
    );
    let temp_path = parent_dir.join(temp_name);
    fs::write(&temp_path, content)
        .with_context(|| format!("failed to write temporary file {}", temp_path.display()))?;
    fs::set_permissions(&temp_path, Permissions::from_mode(mode))
        .with_context(|| format!("failed to chmod temporary file {}", temp_path.display()))?;

    fs::rename(&temp_path, path).with_context(|| {
        format!(
            "failed to rename temporary file {} to {}",
            temp_path.display(),
            path.display()
        )
    })?;

    let actual_mode = fs::metadata(path)
        .with_context(|| format!("failed to stat {} after rename", path.display()))?
        .permissions()
        .mode()
        & 0o777;
    if actual_mode != mode {
        bail!(
            "post-rename mode mismatch for {}: expected {:o}, found {:o}",
            path.display(),
            mode,
            actual_mode
        );
    }
    Ok(())
}

/// Creates `dir` (and parents) with `mode` if it does not already exist, then
/// re-asserts `mode` even if the directory pre-existed with different bits.
pub fn ensure_dir_mode(dir: &Path, mode: u32) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    fs::set_permissions(dir, Permissions::from_mode(mode))
        .with_context(|| format!("failed to chmod {}", dir.display()))?;
    Ok(())
}
