//! Filesystem port for the spoolq queue engine.
//!
//! The engine performs every filesystem action through the [`Vfs`] /
//! [`VfsFile`] trait pair, always with absolute paths rooted at its base
//! directory — it never touches the process working directory. Two backends
//! ship here: [`UnixVfs`] over `std::fs` and [`MemoryVfs`] for tests and
//! host environments without a real filesystem.

pub mod memory;
pub mod traits;
#[cfg(unix)]
pub mod unix;

pub use memory::MemoryVfs;
pub use traits::{Vfs, VfsFile};
#[cfg(unix)]
pub use unix::UnixVfs;
