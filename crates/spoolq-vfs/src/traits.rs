use std::path::Path;

use spoolq_error::Result;
use spoolq_types::OpenFlags;

/// A filesystem implementation the queue engine can run on.
///
/// This trait abstracts the narrow set of operations the engine needs:
/// directory lifecycle for queue directories, file lifecycle for the
/// header, LUT, lock, and payload files, and a listing primitive for the
/// orphan sweep. Backends: real files ([`crate::UnixVfs`]), in-memory
/// ([`crate::MemoryVfs`]), or custom implementations over embedded flash
/// filesystems.
pub trait Vfs: Send + Sync {
    /// The file handle type produced by this VFS.
    type File: VfsFile;

    /// The name of this VFS (e.g., "unix", "memory").
    fn name(&self) -> &'static str;

    /// Create a directory. Fails if it already exists or the parent is
    /// missing.
    fn create_dir(&self, path: &Path) -> Result<()>;

    /// Remove a directory and everything inside it.
    fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// Whether a directory exists at `path`.
    fn dir_exists(&self, path: &Path) -> Result<bool>;

    /// Whether a file exists at `path`.
    fn exists(&self, path: &Path) -> Result<bool>;

    /// Open a file.
    ///
    /// `flags` carries exactly one access bit plus creation behavior.
    /// `CREATE_NEW` must be atomic with respect to concurrent creators:
    /// it is the arbiter the lock protocol builds on.
    fn open(&self, path: &Path, flags: OpenFlags) -> Result<Self::File>;

    /// Delete a file.
    fn delete(&self, path: &Path) -> Result<()>;

    /// List the names of the files directly inside `path`.
    fn list_dir(&self, path: &Path) -> Result<Vec<String>>;
}

/// A file handle opened by a VFS.
///
/// All I/O is positioned; handles carry no cursor. Dropping a handle
/// releases it, but callers that care about the close outcome call
/// [`VfsFile::close`] explicitly.
pub trait VfsFile: Send {
    /// Read up to `buf.len()` bytes starting at byte offset `offset`.
    ///
    /// Returns the number of bytes actually read. On a short read the
    /// remaining bytes in `buf` are zeroed.
    fn read(&mut self, buf: &mut [u8], offset: u64) -> Result<usize>;

    /// Write all of `buf` starting at byte offset `offset`.
    fn write(&mut self, buf: &[u8], offset: u64) -> Result<()>;

    /// Current file size in bytes.
    fn file_size(&self) -> Result<u64>;

    /// Close the file. After this call the handle must not be used.
    fn close(&mut self) -> Result<()>;
}
