//! Output directory for fetched pages.

use fetch_reactor::{CollectSink, SlotIndex};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A directory holding one `<slot>.<extension>` file per fetched page.
#[derive(Debug, Clone)]
pub struct OutputDir {
    path: PathBuf,
    extension: String,
}

impl OutputDir {
    /// Remove `path` with everything in it, then create it empty.
    ///
    /// Destructive: whatever was there before is gone.
    pub fn recreate(
        path: impl Into<PathBuf>,
        extension: impl Into<String>,
    ) -> Result<Self, OutputError> {
        let path = path.into();

        match fs::remove_dir_all(&path) {
            Ok(()) => debug!(path = %path.display(), "removed previous output"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(source) => return Err(OutputError::Remove { path, source }),
        }

        if let Err(source) = fs::create_dir_all(&path) {
            return Err(OutputError::Create { path, source });
        }

        Ok(Self {
            path,
            extension: extension.into(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File that holds the page for `slot`.
    pub fn file_path(&self, slot: SlotIndex) -> PathBuf {
        self.path.join(format!("{slot}.{}", self.extension))
    }

    /// Write one page verbatim.
    pub fn write(&self, slot: SlotIndex, page: &[u8]) -> Result<PathBuf, OutputError> {
        let path = self.file_path(slot);
        fs::write(&path, page).map_err(|source| OutputError::Write {
            path: path.clone(),
            source,
        })?;
        debug!(slot, bytes = page.len(), path = %path.display(), "page written");
        Ok(path)
    }

    /// Write every page in `sink`. Slots without a result get no file.
    ///
    /// Returns the number of files written.
    pub fn write_all(&self, sink: &CollectSink) -> Result<usize, OutputError> {
        let mut written = 0;
        for (slot, page) in sink.iter() {
            self.write(slot, page)?;
            written += 1;
        }
        Ok(written)
    }
}
