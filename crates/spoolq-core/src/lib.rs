//! The spoolq queue engine.
//!
//! A queue is a directory of small files: a fixed-size `.header` record, a
//! `.lut` circular index, one payload file per live entry, and at most one
//! lock file expressing who has the queue open. The engine layers four
//! pieces over the filesystem port:
//!
//! - [`layout`] — encoding/decoding of the header and LUT, payload naming.
//! - [`lock`] — the `.rolock`/`.wolock`/`.rwlock` inter-process protocol.
//! - [`handle`] — the fixed-capacity process-local handle table.
//! - [`engine`] — the public operations (create, destroy, open, close,
//!   enqueue, dequeue, seek, get_entry, get_length).

pub mod config;
pub mod engine;
pub mod handle;
pub mod layout;
pub mod lock;

pub use config::EngineConfig;
pub use engine::{QueueEngine, QueueStats};
