use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

pub(crate) const KEY_MODE: u32 = 0o600;
pub(crate) const CERT_MODE: u32 = 0o644;

/// Writes through a temp file in the target directory and renames it into
/// place, so readers see either the old file or the complete new one.
pub(crate) fn write_atomic(path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
    Staged::new(path, contents, mode)?.commit()
}

/// A fully written, synced temp file next to its target, not yet renamed.
pub(crate) struct Staged {
    file: NamedTempFile,
    target: PathBuf,
}

impl Staged {
    pub(crate) fn new(path: &Path, contents: &[u8], mode: u32) -> io::Result<Self> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let mut file = NamedTempFile::new_in(parent)?;
        file.write_all(contents)?;
        file.as_file().sync_all()?;
        set_mode(file.as_file(), mode)?;
        Ok(Self {
            file,
            target: path.to_path_buf(),
        })
    }

    pub(crate) fn commit(self) -> io::Result<()> {
        self.file.persist(&self.target).map_err(|error| error.error)?;
        Ok(())
    }
}

/// Stages every file before renaming any, so a failed write leaves the
/// previous files untouched.
pub(crate) fn write_all_atomic(files: &[(&Path, &[u8], u32)]) -> io::Result<()> {
    let staged = files
        .iter()
        .map(|(path, contents, mode)| Staged::new(path, contents, *mode))
        .collect::<io::Result<Vec<_>>>()?;
    for file in staged {
        file.commit()?;
    }
    Ok(())
}

pub(crate) async fn read_optional(path: &Path) -> io::Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(Some(contents)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error),
    }
}

#[cfg(unix)]
fn set_mode(file: &fs::File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    file.set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &fs::File, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
pub(crate) async fn restrict_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, fs::Permissions::from_mode(mode)).await
}

#[cfg(not(unix))]
pub(crate) async fn restrict_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}
