//! # JSON File Store
//!
//! Persists the collection as a single JSON array.
//!
//! - A missing file loads as an empty collection
//! - Saves go to a uniquely named sibling temp file which is then renamed
//!   over the target, so readers never observe a half-written array
//! - Corrupt content is an error, never silently treated as empty

use super::RecordStore;
use crate::formats::{records_from_bytes, records_to_bytes};
use crate::primitives::MAX_STORE_FILE_SIZE;
use crate::{Devis, DevisError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Record store backed by one JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file holding an empty collection.
    ///
    /// An existing file is left alone unless `force` is set.
    pub fn init(&self, force: bool) -> Result<(), DevisError> {
        if self.path.exists() && !force {
            return Err(DevisError::Io(format!(
                "{} already exists. Use --force to overwrite.",
                self.path.display()
            )));
        }
        self.save(&[])
    }
}

impl RecordStore for JsonFileStore {
    fn load(&self) -> Result<Vec<Devis>, DevisError> {
        match read_bounded(&self.path)? {
            Some(bytes) => records_from_bytes(&bytes),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, records: &[Devis]) -> Result<(), DevisError> {
        let bytes = records_to_bytes(records)?;
        write_atomic(&self.path, &bytes)
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

/// Read a whole file after checking its size. `None` if it does not exist.
pub(crate) fn read_bounded(path: &Path) -> Result<Option<Vec<u8>>, DevisError> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(DevisError::Io(format!(
                "Cannot read metadata of {}: {}",
                path.display(),
                e
            )));
        }
    };

    if metadata.len() > MAX_STORE_FILE_SIZE {
        return Err(DevisError::Serialization(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_STORE_FILE_SIZE
        )));
    }

    std::fs::read(path)
        .map(Some)
        .map_err(|e| DevisError::Io(format!("Read {}: {}", path.display(), e)))
}

/// Write `bytes` to `path` through a uniquely named temp file in the same
/// directory, then rename it over the target.
///
/// Each save gets its own temp file, so overlapping saves (from threads or
/// from separate processes) never share one. The last rename wins.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DevisError> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            std::fs::create_dir_all(parent)
                .map_err(|e| DevisError::Io(format!("Create {}: {}", parent.display(), e)))?;
            parent
        }
        None => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|e| DevisError::Io(format!("Create temp file in {}: {}", dir.display(), e)))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| DevisError::Io(format!("Write {}: {}", tmp.path().display(), e)))?;
    tmp.persist(path)
        .map(|_| ())
        .map_err(|e| DevisError::Io(format!("Rename onto {}: {}", path.display(), e.error)))
}

// =============================================================================
// TESTS
// =============================================================================
