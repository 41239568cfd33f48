//! Record store: named text blobs kept under a data directory.
//!
//! Every logical entity (compressor logs, loans, nitrox fills, roles,
//! inventory, club config) is one named blob. Reads take a shared lock,
//! writes go through a locked temp file that is renamed over the target.

use crate::{Error, Result};
use fs2::FileExt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Storage backend for named text blobs
pub trait RecordStore {
    /// Read the whole blob. Fails with `Error::Store` if it doesn't exist.
    fn read(&self, name: &str) -> Result<String>;

    /// Replace the blob with `text`
    fn write(&self, name: &str, text: &str) -> Result<()>;

    fn exists(&self, name: &str) -> bool;
}

/// Directory-backed store
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`. The directory is created lazily on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains("..") || Path::new(name).is_absolute() {
            return Err(Error::Store(format!("Invalid blob name {:?}", name)));
        }
        Ok(self.root.join(name))
    }
}

impl RecordStore for FileStore {
    fn read(&self, name: &str) -> Result<String> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Err(Error::Store(format!("{} not found in {:?}", name, self.root)));
        }

        let file = File::open(&path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        tracing::debug!("Read {} bytes from {:?}", contents.len(), path);
        Ok(contents)
    }

    fn write(&self, name: &str, text: &str) -> Result<()> {
        let path = self.path_for(name)?;
        let parent = path
            .parent()
            .ok_or_else(|| Error::Store(format!("{:?} has no parent directory", path)))?;
        std::fs::create_dir_all(parent)?;

        // Temp file in the same directory so the rename is atomic
        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            writer.write_all(text.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;
        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Wrote {} bytes to {:?}", text.len(), path);
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.path_for(name).map(|p| p.exists()).unwrap_or(false)
    }
}
