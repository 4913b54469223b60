//! spoolq — persistent file-backed FIFO queues.
//!
//! Each queue is a directory on a filesystem: a fixed metadata record, a
//! circular lookup table, one small file per live entry, and a lock file
//! arbitrating access between processes. Queue contents survive restarts
//! and power loss to the extent the underlying filesystem's primitives do.
//!
//! ```
//! use spoolq::{
//!     AccessMode, AccessType, EngineConfig, MemoryVfs, QueueEngine, QueueFlags,
//! };
//!
//! # fn main() -> spoolq::Result<()> {
//! let engine = QueueEngine::new(MemoryVfs::new(), EngineConfig::new("/queues"))?;
//!
//! engine.create("events", 16, 256, QueueFlags::RANDOM_ACCESS)?;
//! let h = engine.open("events", AccessType::ReadWrite, AccessMode::BinaryPacked)?;
//!
//! engine.enqueue(h, b"hello")?;
//! assert_eq!(engine.get_length(h)?, 1);
//!
//! let mut buf = [0u8; 256];
//! let n = engine.dequeue(h, &mut buf)?;
//! assert_eq!(&buf[..n], b"hello");
//!
//! engine.close(h)?;
//! engine.destroy("events")?;
//! # Ok(())
//! # }
//! ```

pub use spoolq_core::{EngineConfig, QueueEngine, QueueStats};
pub use spoolq_error::{QueueError, Result, StatusCode};
pub use spoolq_types::{
    AccessMode, AccessType, OpenFlags, QueueFlags, QueueHandle, SeekTarget, limits,
};
pub use spoolq_vfs::{MemoryVfs, Vfs, VfsFile};
#[cfg(unix)]
pub use spoolq_vfs::UnixVfs;
