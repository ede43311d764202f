//! Local filesystem source and sink
//!
//! Opens files for the path-based entry points and maps open failures to
//! [`SourceError`] so callers can tell a missing file from a permission
//! problem.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::SourceError;

/// A file opened for reading.
pub struct LocalSource {
    file: File,
    path: PathBuf,
}

impl LocalSource {
    /// Open a local file for reading.
    ///
    /// # Errors
    /// Returns `SourceError::NotFound` if the file doesn't exist.
    /// Returns `SourceError::PermissionDenied` if access is denied.
    /// Returns `SourceError::FileSystemError` for other I/O errors.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| map_open_error(&path, e))?;
        Ok(Self { file, path })
    }

    /// Get the path to the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the file in bytes.
    pub fn len(&self) -> Result<u64, SourceError> {
        let metadata = self.file.metadata().map_err(|e| {
            SourceError::FileSystemError(format!(
                "Failed to get metadata for {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(metadata.len())
    }

    pub fn is_empty(&self) -> Result<bool, SourceError> {
        Ok(self.len()? == 0)
    }
}

impl Read for LocalSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

/// A file created (or truncated) for writing.
pub struct LocalSink {
    file: File,
    path: PathBuf,
}

impl LocalSink {
    /// Create or truncate a local file for writing.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| map_open_error(&path, e))?;
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush and sync the file to disk.
    pub fn sync(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_all()
    }
}

impl Write for LocalSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

fn map_open_error(path: &Path, e: io::Error) -> SourceError {
    match e.kind() {
        io::ErrorKind::NotFound => SourceError::NotFound(path.display().to_string()),
        io::ErrorKind::PermissionDenied => {
            SourceError::PermissionDenied(path.display().to_string())
        }
        _ => SourceError::FileSystemError(format!("{}: {}", path.display(), e)),
    }
}
