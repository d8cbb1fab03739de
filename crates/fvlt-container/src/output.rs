//! Atomic output files and default output naming
//!
//! Output goes to a temp file beside the destination and is renamed into
//! place only by [`AtomicOutput::commit`]. Dropping an uncommitted output
//! deletes the temp file, so a failed pipeline never leaves a partial file.

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use fvlt_core::FvltResult;
use tempfile::NamedTempFile;

pub(crate) struct AtomicOutput {
    tmp: NamedTempFile,
    dest: PathBuf,
    overwrite: bool,
}

impl AtomicOutput {
    pub(crate) fn create(dest: &Path, overwrite: bool) -> FvltResult<Self> {
        if !overwrite && dest.exists() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", dest.display()),
            )
            .into());
        }

        let dir = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let tmp = NamedTempFile::new_in(dir)?;
        tracing::trace!(tmp = %tmp.path().display(), dest = %dest.display(), "staging output");

        Ok(Self {
            tmp,
            dest: dest.to_path_buf(),
            overwrite,
        })
    }

    pub(crate) fn file(&mut self) -> &mut File {
        self.tmp.as_file_mut()
    }

    /// Flush to disk and move the temp file to its destination.
    pub(crate) fn commit(mut self) -> FvltResult<()> {
        self.tmp.as_file_mut().flush()?;
        self.tmp.as_file().sync_all()?;

        let persisted = if self.overwrite {
            self.tmp.persist(&self.dest)
        } else {
            self.tmp.persist_noclobber(&self.dest)
        };
        persisted.map_err(|e| e.error)?;
        Ok(())
    }
}

/// `secret.txt` → `secret.txt.enc`
pub fn default_encrypted_path(input: &Path, extension: &str) -> PathBuf {
    let mut name: OsString = input.as_os_str().to_owned();
    name.push(extension);
    PathBuf::from(name)
}

/// Where a decrypted container lands when no output is given.
///
/// Prefers the name stored in the header, placed beside the container. An
/// unusable stored name falls back to stripping `extension` from the
/// container path, or appending `.decrypted` if it lacks that extension.
pub fn default_decrypted_path(input: &Path, stored_name: Option<&str>, extension: &str) -> PathBuf {
    if let Some(name) = stored_name.and_then(sanitize_stored_name) {
        let candidate = input.with_file_name(name);
        if candidate != input {
            return candidate;
        }
    }

    let raw = input.to_string_lossy();
    match raw.strip_suffix(extension) {
        Some(stem) if !stem.is_empty() && !stem.ends_with(std::path::MAIN_SEPARATOR) => {
            PathBuf::from(stem)
        }
        _ => {
            let mut name: OsString = input.as_os_str().to_owned();
            name.push(".decrypted");
            PathBuf::from(name)
        }
    }
}

/// Accept a stored name only if it is a single plain path component.
pub fn sanitize_stored_name(name: &str) -> Option<&str> {
    if name.is_empty() || name.chars().any(char::is_control) {
        return None;
    }
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains(['/', '\\']) => Some(name),
        _ => None,
    }
}
