//! Random-access view over a fully received export archive.
//!
//! The raw body is spooled into an anonymous temporary file, so only the
//! entry currently being read is ever decompressed into memory.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::{debug, info};
use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::{GdocError, Result};

/// Upper bound on the buffer reserved from an entry's declared size.
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

pub struct Archive {
    zip: ZipArchive<File>,
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("entries", &self.zip.len())
            .finish()
    }
}

impl Archive {
    /// Opens a spooled body. When `save_as` is given, a verbatim copy of the
    /// bytes is written there before the container is parsed.
    pub fn from_spool(mut spool: File, save_as: Option<&Path>) -> Result<Self> {
        spool
            .seek(SeekFrom::Start(0))
            .map_err(|e| GdocError::io("rewinding archive spool", e))?;

        if let Some(path) = save_as {
            persist_copy(&mut spool, path)?;
            spool
                .seek(SeekFrom::Start(0))
                .map_err(|e| GdocError::io("rewinding archive spool", e))?;
        }

        let zip = ZipArchive::new(spool)?;
        info!(entries = zip.len(), "Archive materialized");
        Ok(Self { zip })
    }

    /// Builds an archive from bytes already in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut spool =
            tempfile::tempfile().map_err(|e| GdocError::io("creating archive spool", e))?;
        spool
            .write_all(bytes)
            .map_err(|e| GdocError::io("writing archive spool", e))?;
        Self::from_spool(spool, None)
    }

    pub fn len(&self) -> usize {
        self.zip.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zip.len() == 0
    }

    /// Entry names in central directory order.
    pub fn names(&self) -> Vec<String> {
        self.zip.file_names().map(str::to_string).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.zip.file_names().any(|n| n == name)
    }

    /// Reads one entry fully. `Ok(None)` when the archive has no such entry.
    pub fn read_entry(&mut self, name: &str) -> Result<Option<Vec<u8>>> {
        let mut entry = match self.zip.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut bytes = Vec::with_capacity(preallocation(entry.size()));
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| GdocError::io(format!("reading archive entry {name}"), e))?;
        Ok(Some(bytes))
    }

    /// Opens one entry for the duration of `f`. The entry is closed as soon as
    /// `f` returns.
    pub fn open_entry<T>(&mut self, name: &str, f: impl FnOnce(&mut dyn Read) -> T) -> Result<T> {
        let mut entry = self.zip.by_name(name)?;
        debug!(entry = name, size = entry.size(), "Opened archive entry");
        Ok(f(&mut entry))
    }
}

/// Declared sizes come from the archive headers and are not trusted beyond
/// [`MAX_PREALLOCATION`].
fn preallocation(declared: u64) -> usize {
    usize::try_from(declared.min(MAX_PREALLOCATION)).unwrap_or(0)
}

fn persist_copy(spool: &mut File, path: &Path) -> Result<()> {
    let context = || format!("saving raw archive to {}", path.display());
    let mut out = File::create(path).map_err(|e| GdocError::io(context(), e))?;
    let copied = io::copy(spool, &mut out).map_err(|e| GdocError::io(context(), e))?;
    out.flush().map_err(|e| GdocError::io(context(), e))?;
    info!(path = %path.display(), bytes = copied, "Saved raw archive copy");
    Ok(())
}
