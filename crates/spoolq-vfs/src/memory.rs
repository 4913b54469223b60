use std::collections::{BTreeSet, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use spoolq_error::{QueueError, Result};
use spoolq_types::OpenFlags;

use crate::traits::{Vfs, VfsFile};

/// Shared storage for one file in the memory VFS.
///
/// Multiple `MemoryFile` handles can reference the same underlying storage
/// via `Arc<Mutex<..>>`, mirroring how separate opens of one on-disk file
/// observe each other's writes.
#[derive(Debug, Default)]
struct FileStorage {
    data: Vec<u8>,
}

/// Shared state for the entire memory VFS.
#[derive(Debug, Default)]
struct MemoryVfsInner {
    files: HashMap<PathBuf, Arc<Mutex<FileStorage>>>,
    dirs: BTreeSet<PathBuf>,
}

/// An in-memory VFS for testing and hosts without a real filesystem.
///
/// All files live in memory with no persistence. Cloning shares the
/// underlying state, so several engine instances can see the same "disk".
#[derive(Debug, Clone, Default)]
pub struct MemoryVfs {
    inner: Arc<Mutex<MemoryVfsInner>>,
}

impl MemoryVfs {
    /// Create a new empty in-memory VFS.
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_err() -> QueueError {
    QueueError::FsAccess(io::Error::other("MemoryVfs lock poisoned"))
}

fn not_found(path: &Path) -> QueueError {
    QueueError::FsAccess(io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such entry: {}", path.display()),
    ))
}

fn already_exists(path: &Path) -> QueueError {
    QueueError::FsAccess(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("entry exists: {}", path.display()),
    ))
}

impl Vfs for MemoryVfs {
    type File = MemoryFile;

    fn name(&self) -> &'static str {
        "memory"
    }

    fn create_dir(&self, path: &Path) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| lock_err())?;
        if inner.dirs.contains(path) {
            return Err(already_exists(path));
        }
        // Only the leaf may be missing; parents must already exist, except
        // for top-level paths which have no tracked parent.
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && parent != Path::new("/")
            && !inner.dirs.contains(parent)
        {
            return Err(not_found(parent));
        }
        inner.dirs.insert(path.to_path_buf());
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| lock_err())?;
        if !inner.dirs.contains(path) {
            return Err(not_found(path));
        }
        inner.dirs.retain(|d| !d.starts_with(path));
        inner.files.retain(|f, _| !f.starts_with(path));
        Ok(())
    }

    fn dir_exists(&self, path: &Path) -> Result<bool> {
        Ok(self
            .inner
            .lock()
            .map_err(|_| lock_err())?
            .dirs
            .contains(path))
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self
            .inner
            .lock()
            .map_err(|_| lock_err())?
            .files
            .contains_key(path))
    }

    #[allow(clippy::significant_drop_tightening)]
    fn open(&self, path: &Path, flags: OpenFlags) -> Result<Self::File> {
        let mut inner = self.inner.lock().map_err(|_| lock_err())?;

        let storage = if let Some(existing) = inner.files.get(path) {
            if flags.contains(OpenFlags::CREATE_NEW) {
                return Err(already_exists(path));
            }
            let storage = Arc::clone(existing);
            if flags.contains(OpenFlags::TRUNCATE) {
                storage.lock().map_err(|_| lock_err())?.data.clear();
            }
            storage
        } else if flags.creates() {
            // Creating a file requires its directory to exist.
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !inner.dirs.contains(parent)
            {
                return Err(not_found(parent));
            }
            let storage = Arc::new(Mutex::new(FileStorage::default()));
            inner.files.insert(path.to_path_buf(), Arc::clone(&storage));
            storage
        } else {
            return Err(not_found(path));
        };

        Ok(MemoryFile { storage })
    }

    fn delete(&self, path: &Path) -> Result<()> {
        let mut inner = self.inner.lock().map_err(|_| lock_err())?;
        if inner.files.remove(path).is_none() {
            return Err(not_found(path));
        }
        Ok(())
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        let inner = self.inner.lock().map_err(|_| lock_err())?;
        if !inner.dirs.contains(path) {
            return Err(not_found(path));
        }
        let mut names: Vec<String> = inner
            .files
            .keys()
            .filter(|f| f.parent() == Some(path))
            .filter_map(|f| f.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        names.sort();
        Ok(names)
    }
}

/// A file handle in the memory VFS.
///
/// Reads and writes operate on a shared `Vec<u8>` protected by a mutex.
#[derive(Debug)]
pub struct MemoryFile {
    storage: Arc<Mutex<FileStorage>>,
}

impl VfsFile for MemoryFile {
    #[allow(clippy::cast_possible_truncation)]
    fn read(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let storage = self.storage.lock().map_err(|_| lock_err())?;

        let offset = offset as usize;
        let file_len = storage.data.len();

        if offset >= file_len {
            drop(storage);
            buf.fill(0);
            return Ok(0);
        }

        let available = file_len - offset;
        let to_read = buf.len().min(available);
        buf[..to_read].copy_from_slice(&storage.data[offset..offset + to_read]);
        drop(storage);

        // Zero-fill the rest if short read.
        if to_read < buf.len() {
            buf[to_read..].fill(0);
        }

        Ok(to_read)
    }

    #[allow(clippy::cast_possible_truncation, clippy::significant_drop_tightening)]
    fn write(&mut self, buf: &[u8], offset: u64) -> Result<()> {
        let mut storage = self.storage.lock().map_err(|_| lock_err())?;

        let offset = offset as usize;
        let end = offset + buf.len();

        if end > storage.data.len() {
            storage.data.resize(end, 0);
        }

        storage.data[offset..end].copy_from_slice(buf);
        Ok(())
    }

    fn file_size(&self) -> Result<u64> {
        Ok(self.storage.lock().map_err(|_| lock_err())?.data.len() as u64)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
