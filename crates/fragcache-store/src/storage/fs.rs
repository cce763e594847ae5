//! Filesystem storage backend.
//!
//! Layout:
//!
//! ```text
//! <root>/<profile>/<key>.<extension>   cache entries
//! <root>/<profile>/.master.tag         generation marker (zero bytes)
//! ```
//!
//! Freshness lives in file modification times only. Copying or touching
//! files outside the engine (backup and restore, `touch`, rsync without
//! `--times`) silently changes what the engine considers fresh.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use tracing::debug;

use super::{Location, Slot, Stamp, Storage};
use crate::error::StoreError;

/// Default file extension of cache entries.
pub const DEFAULT_EXTENSION: &str = "entry";

/// File name of the generation marker inside a profile directory.
pub const MARKER_FILE: &str = ".master.tag";

/// Stores each record as a file under a root directory.
#[derive(Debug)]
pub struct FsStorage {
    root: PathBuf,
    extension: String,
    tmp_counter: AtomicU64,
}

impl FsStorage {
    /// Creates a backend rooted at `root` using the default extension.
    ///
    /// Nothing is created on disk until the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: DEFAULT_EXTENSION.to_string(),
            tmp_counter: AtomicU64::new(0),
        }
    }

    /// Sets the file extension used for entries.
    ///
    /// # Errors
    ///
    /// Fails if the extension is empty, contains a path separator, or would
    /// let an entry file name collide with the marker file.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Result<Self, StoreError> {
        let extension = extension.into();

        if extension.is_empty() {
            return Err(StoreError::InvalidConfig(
                "entry extension cannot be empty".to_string(),
            ));
        }
        if extension.contains(['/', '\\']) {
            return Err(StoreError::InvalidConfig(format!(
                "entry extension '{extension}' contains a path separator"
            )));
        }
        if MARKER_FILE.ends_with(&format!(".{extension}")) {
            return Err(StoreError::InvalidConfig(format!(
                "entry extension '{extension}' collides with the marker file"
            )));
        }

        self.extension = extension;
        Ok(self)
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the entry file extension.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Returns the file path backing a location.
    pub fn path_for(&self, location: &Location) -> PathBuf {
        let dir = self.root.join(location.profile().as_str());
        match location.slot() {
            Slot::Entry(key) => dir.join(format!("{}.{}", key, self.extension)),
            Slot::Marker => dir.join(MARKER_FILE),
        }
    }

    fn temp_path(&self, target: &Path) -> PathBuf {
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let file_name = target
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        target.with_file_name(format!(".{}.{}-{}.tmp", file_name, std::process::id(), n))
    }

    fn write_file(tmp: &Path, path: &Path, bytes: &[u8], modified: SystemTime) -> io::Result<()> {
        let mut file = File::create(tmp)?;
        file.write_all(bytes)?;
        // Explicit stamp: identical content must still look freshly written.
        file.set_modified(modified)?;
        drop(file);
        fs::rename(tmp, path)
    }
}

impl Storage for FsStorage {
    fn stamp(&self, location: &Location) -> Result<Stamp, StoreError> {
        let path = self.path_for(location);
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.modified().map_or(Stamp::Unknown, Stamp::At)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Stamp::Missing),
            Err(e) => Err(StoreError::path(path, e)),
        }
    }

    fn load(&self, location: &Location) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(location);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::path(path, e)),
        }
    }

    fn store(
        &self,
        location: &Location,
        bytes: &[u8],
        modified: SystemTime,
    ) -> Result<(), StoreError> {
        let path = self.path_for(location);

        if let Some(dir) = path.parent()
            && !dir.is_dir()
        {
            fs::create_dir_all(dir).map_err(|e| StoreError::path(dir, e))?;
            debug!(profile = %location.profile(), dir = %dir.display(), "Created profile directory");
        }

        // Write beside the target and rename so readers never see a torn file.
        let tmp = self.temp_path(&path);
        if let Err(e) = Self::write_file(&tmp, &path, bytes, modified) {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::path(path, e));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "fs"
    }
}
