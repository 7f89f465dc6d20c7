pub mod cache_file;
pub mod portfolio_store;
pub mod settings_store;

use std::path::Path;

use crate::errors::CoreError;

/// Write via a sibling temp file and rename, creating parent directories.
/// A crash mid-write leaves the previous file intact.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
