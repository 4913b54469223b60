//! The on-disk lock protocol.
//!
//! Three lock-file names express who has a queue open:
//!
//! - `.rolock` — one or more readers; its single byte is the reader count.
//! - `.wolock` — exactly one write-only opener.
//! - `.rwlock` — exactly one read/write opener.
//!
//! At most one of the three exists at any instant. Lock files are created
//! with `CREATE_NEW`, so on filesystems where directory-entry creation is
//! atomic the create itself arbitrates between racing openers. The
//! `.rolock` counter update is a cooperative read-modify-write: it keeps
//! well-behaved processes honest, it is not adversarial-safe.

use std::path::Path;

use spoolq_error::{QueueError, Result};
use spoolq_types::{AccessType, OpenFlags};
use spoolq_vfs::{Vfs, VfsFile};
use tracing::trace;

/// Reader lock file: 1-byte reader count.
pub const RO_LOCK: &str = ".rolock";
/// Write-only lock file: empty.
pub const WO_LOCK: &str = ".wolock";
/// Read/write lock file: empty.
pub const RW_LOCK: &str = ".rwlock";

/// The sharing state a queue directory's lock files encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// No lock file present.
    Unlocked,
    /// `.rolock` present with this reader count.
    Readers(u8),
    /// `.wolock` present.
    WriteOnly,
    /// `.rwlock` present.
    ReadWrite,
}

impl LockState {
    /// Whether any opener holds the queue.
    #[inline]
    pub fn is_held(self) -> bool {
        !matches!(self, Self::Unlocked)
    }

    /// Whether a writer (write-only or read/write) holds the queue.
    #[inline]
    pub fn writer_present(self) -> bool {
        matches!(self, Self::WriteOnly | Self::ReadWrite)
    }

    /// Whether a reader-capable lock (`.rolock` or `.rwlock`) is present.
    #[inline]
    pub fn reader_present(self) -> bool {
        matches!(self, Self::Readers(_) | Self::ReadWrite)
    }
}

fn read_reader_count<V: Vfs>(vfs: &V, dir: &Path) -> Result<u8> {
    let mut file = vfs.open(&dir.join(RO_LOCK), OpenFlags::READ_ONLY)?;
    let mut count = [0u8; 1];
    let n = file.read(&mut count, 0)?;
    file.close()?;
    if n != 1 {
        return Err(QueueError::corrupt("reader lock file holds no count"));
    }
    Ok(count[0])
}

/// Inspect the lock files of the queue at `dir`.
pub fn inspect<V: Vfs>(vfs: &V, dir: &Path) -> Result<LockState> {
    if vfs.exists(&dir.join(WO_LOCK))? {
        return Ok(LockState::WriteOnly);
    }
    if vfs.exists(&dir.join(RW_LOCK))? {
        return Ok(LockState::ReadWrite);
    }
    if vfs.exists(&dir.join(RO_LOCK))? {
        return Ok(LockState::Readers(read_reader_count(vfs, dir)?));
    }
    Ok(LockState::Unlocked)
}

/// Establish (or join) the lock appropriate for `access`.
///
/// The caller has already checked compatibility via [`inspect`]; this only
/// performs the filesystem transition.
pub fn acquire<V: Vfs>(vfs: &V, dir: &Path, access: AccessType) -> Result<()> {
    match access {
        AccessType::ReadOnly => {
            if vfs.exists(&dir.join(RO_LOCK))? {
                // Another reader got here first; join by bumping the count.
                let mut file = vfs.open(&dir.join(RO_LOCK), OpenFlags::READ_WRITE)?;
                let mut count = [0u8; 1];
                let n = file.read(&mut count, 0)?;
                if n != 1 {
                    file.close()?;
                    return Err(QueueError::corrupt("reader lock file holds no count"));
                }
                count[0] += 1;
                file.write(&count, 0)?;
                file.close()?;
                trace!(dir = %dir.display(), readers = count[0], "reader lock joined");
            } else {
                let flags = OpenFlags::WRITE_ONLY | OpenFlags::CREATE_NEW;
                let mut file = vfs.open(&dir.join(RO_LOCK), flags)?;
                file.write(&[1u8], 0)?;
                file.close()?;
                trace!(dir = %dir.display(), "reader lock created");
            }
        }
        AccessType::WriteOnly | AccessType::ReadWrite => {
            let name = if access == AccessType::WriteOnly {
                WO_LOCK
            } else {
                RW_LOCK
            };
            let flags = OpenFlags::WRITE_ONLY | OpenFlags::CREATE_NEW;
            let mut file = vfs.open(&dir.join(name), flags)?;
            file.close()?;
            trace!(dir = %dir.display(), lock = name, "writer lock created");
        }
    }
    Ok(())
}

/// Release whichever lock is present, per the close rules: decrement the
/// reader count (deleting at zero), or delete an exclusive lock outright.
pub fn release<V: Vfs>(vfs: &V, dir: &Path) -> Result<()> {
    if vfs.exists(&dir.join(RO_LOCK))? {
        let count = read_reader_count(vfs, dir)?;
        let remaining = count.saturating_sub(1);
        if remaining == 0 {
            vfs.delete(&dir.join(RO_LOCK))?;
            trace!(dir = %dir.display(), "reader lock removed");
        } else {
            let mut file = vfs.open(&dir.join(RO_LOCK), OpenFlags::READ_WRITE)?;
            file.write(&[remaining], 0)?;
            file.close()?;
            trace!(dir = %dir.display(), readers = remaining, "reader lock released");
        }
    }
    if vfs.exists(&dir.join(WO_LOCK))? {
        vfs.delete(&dir.join(WO_LOCK))?;
        trace!(dir = %dir.display(), "write-only lock removed");
    }
    if vfs.exists(&dir.join(RW_LOCK))? {
        vfs.delete(&dir.join(RW_LOCK))?;
        trace!(dir = %dir.display(), "read-write lock removed");
    }
    Ok(())
}
