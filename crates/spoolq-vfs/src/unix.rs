//! Unix VFS implementation over `std::fs`.
//!
//! All I/O is positioned (`read_at`/`write_at`); nothing here touches the
//! process working directory, and `CREATE_NEW` maps to `O_EXCL` so the
//! kernel arbitrates concurrent lock-file creation.

use std::fs::{self, File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;

use spoolq_error::{QueueError, Result};
use spoolq_types::OpenFlags;

use crate::traits::{Vfs, VfsFile};

/// The default VFS for POSIX hosts.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixVfs;

impl UnixVfs {
    /// Create a new Unix VFS.
    pub fn new() -> Self {
        Self
    }
}

fn invalid_flags(flags: OpenFlags) -> QueueError {
    QueueError::FsAccess(std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        format!("unsupported open flags: {flags:?}"),
    ))
}

impl Vfs for UnixVfs {
    type File = UnixFile;

    fn name(&self) -> &'static str {
        "unix"
    }

    fn create_dir(&self, path: &Path) -> Result<()> {
        fs::create_dir(path)?;
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path)?;
        Ok(())
    }

    fn dir_exists(&self, path: &Path) -> Result<bool> {
        match fs::metadata(path) {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, path: &Path) -> Result<bool> {
        match fs::metadata(path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn open(&self, path: &Path, flags: OpenFlags) -> Result<Self::File> {
        let mut opts = OpenOptions::new();
        if flags.contains(OpenFlags::READ_ONLY) {
            opts.read(true);
        } else if flags.contains(OpenFlags::WRITE_ONLY) {
            opts.write(true);
        } else if flags.contains(OpenFlags::READ_WRITE) {
            opts.read(true).write(true);
        } else {
            return Err(invalid_flags(flags));
        }
        if flags.contains(OpenFlags::CREATE_NEW) {
            opts.create_new(true);
        } else if flags.contains(OpenFlags::CREATE) {
            opts.create(true);
        }
        if flags.contains(OpenFlags::TRUNCATE) {
            opts.truncate(true);
        }
        let file = opts.open(path)?;
        Ok(UnixFile { file })
    }

    fn delete(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        Ok(())
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// A file handle backed by a real file descriptor.
#[derive(Debug)]
pub struct UnixFile {
    file: File,
}

impl VfsFile for UnixFile {
    fn read(&mut self, buf: &mut [u8], offset: u64) -> Result<usize> {
        let mut total = 0;
        while total < buf.len() {
            match self.file.read_at(&mut buf[total..], offset + total as u64) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        // Zero-fill the rest if short read.
        if total < buf.len() {
            buf[total..].fill(0);
        }
        Ok(total)
    }

    fn write(&mut self, buf: &[u8], offset: u64) -> Result<()> {
        self.file.write_all_at(buf, offset)?;
        Ok(())
    }

    fn file_size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn close(&mut self) -> Result<()> {
        // The descriptor is released on drop; nothing is buffered.
        Ok(())
    }
}
