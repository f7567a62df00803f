//! File system utils.

use std::{
    fs::File,
    io::{self, Write},
    path::Path,
};

pub struct FsHandler;

impl FsHandler {
    /// Replace `path` with `content` all at once.
    ///
    /// The content goes to a temporary file in the same directory which is then
    /// renamed over the target, so readers see either the old or the new file.
    /// An existing file keeps its permissions; a new one is world readable.
    /// Returns `false` without touching the file when it already holds `content`.
    pub fn write_atomic(path: &Path, content: &str) -> io::Result<bool> {
        if let Ok(existing) = std::fs::read(path) {
            if existing == content.as_bytes() {
                tracing::debug!(path = %path.display(), "Content unchanged, skipping write");
                return Ok(false);
            }
        }

        let permissions = match std::fs::metadata(path) {
            Ok(metadata) => Some(metadata.permissions()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e),
        };

        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        if !parent.exists() {
            std::fs::create_dir_all(parent)?;
            tracing::debug!("Created directory: {}", parent.display());
        }

        let mut file = tempfile::NamedTempFile::new_in(parent)?;
        file.write_all(content.as_bytes())?;
        match permissions {
            Some(permissions) => file.as_file().set_permissions(permissions)?,
            None => set_default_permissions(file.as_file())?,
        }
        file.as_file().sync_all()?;
        file.persist(path).map_err(|e| e.error)?;

        Ok(true)
    }
}

#[cfg(unix)]
fn set_default_permissions(file: &File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(std::fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_default_permissions(_file: &File) -> io::Result<()> {
    Ok(())
}
